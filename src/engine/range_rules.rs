// ==========================================
// 门店活动排班校验系统 - 区间规则引擎
// ==========================================
// 输入: [start, end] 已提交排班 + 指定运行的有效提案
// 输出: RangeValidationResult {critical, warning, info, stats}
// 快速冲突检查: 仅重复排班 + 请假（审批提交前使用）
// ==========================================

use chrono::{Duration, Local, NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::config::{ConfigManager, ScheduleSettings};
use crate::domain::issue::{Issue, RangeStats, RangeValidationResult, RuleKind, Severity};
use crate::domain::schedule::{RecordSource, ScheduleRecord};
use crate::domain::types::{EventCondition, RotationKind};
use crate::engine::daily_rules::missing_pair_issue;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::repositories::ValidationRepositories;
use crate::engine::schedule_core::ScheduleCore;
use crate::engine::snapshot::ScheduleSnapshot;
use crate::repository::assignment_repo::select_assignments_in_range;
use crate::repository::employee_repo::{select_employee, select_time_off_overlapping};
use crate::repository::event_repo::{select_event, select_events_by_refs};
use crate::repository::{RepositoryError, RepositoryResult, SCHEDULE_SYNC_KEY};

// ==========================================
// ConflictCheck - 快速冲突检查结果
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    TimeOff,
    DoubleBooking,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictCheck {
    pub has_conflict: bool,
    pub kind: Option<ConflictKind>,
    pub details: Map<String, JsonValue>,
}

impl ConflictCheck {
    fn clear() -> Self {
        Self {
            has_conflict: false,
            kind: None,
            details: Map::new(),
        }
    }

    fn conflict(kind: ConflictKind, details: Map<String, JsonValue>) -> Self {
        Self {
            has_conflict: true,
            kind: Some(kind),
            details,
        }
    }
}

// ==========================================
// RangeRuleEngine - 区间规则引擎
// ==========================================
pub struct RangeRuleEngine {
    repos: ValidationRepositories,
    config: Arc<ConfigManager>,
}

impl RangeRuleEngine {
    pub fn new(repos: ValidationRepositories, config: Arc<ConfigManager>) -> Self {
        Self { repos, config }
    }

    /// 区间校验（以当前本地时间判断数据新鲜度）
    ///
    /// # 参数
    /// - include_pending: true 为审批前（合并提案），false 为审批后
    /// - run_id: 参与合并的排班运行
    pub fn verify_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        include_pending: bool,
        run_id: Option<&str>,
    ) -> EngineResult<RangeValidationResult> {
        self.verify_range_at(start, end, include_pending, run_id, Local::now().naive_local())
    }

    /// 区间校验（指定当前时间）
    #[instrument(skip(self))]
    pub fn verify_range_at(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        include_pending: bool,
        run_id: Option<&str>,
        now: NaiveDateTime,
    ) -> EngineResult<RangeValidationResult> {
        if start > end {
            return Err(EngineError::InvalidInput(format!(
                "start date {} is after end date {}",
                start, end
            )));
        }
        let settings = self.config.settings()?;

        let mut issues = Vec::new();
        issues.extend(self.check_freshness(&settings, now)?);

        let proposals = match (include_pending, run_id) {
            (true, Some(run_id)) => self.repos.proposal_repo.list_active_for_run(run_id, start, end)?,
            _ => Vec::new(),
        };

        let snapshot = {
            let conn = self.repos.lock_conn()?;
            let mut snapshot = ScheduleSnapshot::load(&conn, start, end)?;
            snapshot.ensure_events(&conn, proposals.iter().map(|p| p.event_ref))?;
            snapshot
        };

        let committed = snapshot.committed_records(&settings);
        let pending = snapshot.pending_records(&proposals, &settings);
        let mut records: Vec<ScheduleRecord> = committed.iter().chain(pending.iter()).cloned().collect();
        records.sort_by_key(|r| r.schedule_datetime);

        issues.extend(check_time_off(&snapshot, &records));
        issues.extend(check_double_booking(&snapshot, &records));
        issues.extend(check_out_of_window(&snapshot, &records));
        issues.extend(check_unscheduled_lightweight(&snapshot, &pending, start, end));
        issues.extend(check_rotation_coverage(&snapshot, &records));

        if include_pending {
            issues.push(
                Issue::info(
                    RuleKind::SupervisorPairingDeferred,
                    "Supervisor pairing is created during approval and is not checked before it",
                )
                .with_detail("start_date", start)
                .with_detail("end_date", end)
                .with_detail("run_id", run_id),
            );
        } else {
            issues.extend(check_pairing_post_approval(&snapshot));
        }

        let employees: HashSet<&str> = records.iter().map(|r| r.employee_id.as_str()).collect();
        let stats = RangeStats {
            days: (end - start).num_days() + 1,
            committed_records: committed.len(),
            pending_records: pending.len(),
            employees_involved: employees.len(),
            critical_count: issues.iter().filter(|i| i.severity == Severity::Critical).count(),
            warning_count: issues.iter().filter(|i| i.severity == Severity::Warning).count(),
            info_count: issues.iter().filter(|i| i.severity == Severity::Info).count(),
        };

        let mut result = RangeValidationResult {
            start_date: start,
            end_date: end,
            include_pending,
            run_id: run_id.map(str::to_string),
            critical: Vec::new(),
            warning: Vec::new(),
            info: Vec::new(),
            stats,
        };
        for issue in issues {
            match issue.severity {
                Severity::Critical => result.critical.push(issue),
                Severity::Warning => result.warning.push(issue),
                Severity::Info => result.info.push(issue),
            }
        }

        info!(
            critical = result.stats.critical_count,
            warning = result.stats.warning_count,
            committed = result.stats.committed_records,
            pending = result.stats.pending_records,
            "区间校验完成"
        );
        Ok(result)
    }

    /// 快速冲突检查（仅重复排班 + 请假）
    pub fn quick_conflict_check(
        &self,
        employee_id: &str,
        timestamp: NaiveDateTime,
        event_ref: i64,
    ) -> EngineResult<ConflictCheck> {
        let settings = self.config.settings()?;
        let conn = self.repos.lock_conn()?;
        Ok(Self::check_conflict_in(&conn, &settings, employee_id, timestamp, event_ref, None)?)
    }

    /// 在给定连接（可为事务）上执行快速冲突检查
    ///
    /// # 参数
    /// - ignore_assignment_id: 排除的排班（改时间/换人时排除自身）
    pub fn check_conflict_in(
        conn: &Connection,
        settings: &ScheduleSettings,
        employee_id: &str,
        timestamp: NaiveDateTime,
        event_ref: i64,
        ignore_assignment_id: Option<i64>,
    ) -> RepositoryResult<ConflictCheck> {
        let event = select_event(conn, event_ref)?
            .ok_or_else(|| RepositoryError::not_found("event_window", event_ref))?;
        let date = timestamp.date();

        // 1. 请假优先
        if let Some(time_off) = select_time_off_overlapping(conn, Some(employee_id), date, date)?
            .into_iter()
            .next()
        {
            let mut details = Map::new();
            details.insert("employee_id".into(), employee_id.into());
            details.insert("date".into(), date.to_string().into());
            details.insert("time_off_id".into(), time_off.time_off_id.into());
            details.insert("time_off_start".into(), time_off.start_date.to_string().into());
            details.insert("time_off_end".into(), time_off.end_date.to_string().into());
            debug!(employee_id, date = %date, "快速检查: 请假冲突");
            return Ok(ConflictCheck::conflict(ConflictKind::TimeOff, details));
        }

        // 2. 重复排班（跨午夜的记录也需比较，取前后各一天）
        let existing: Vec<_> = select_assignments_in_range(
            conn,
            date - Duration::days(1),
            date + Duration::days(1),
            Some(employee_id),
        )?
        .into_iter()
        .filter(|a| Some(a.assignment_id) != ignore_assignment_id)
        .collect();
        let refs: Vec<i64> = existing.iter().map(|a| a.event_ref).collect::<BTreeSet<_>>().into_iter().collect();
        let events = select_events_by_refs(conn, &refs)?;
        let role = select_employee(conn, employee_id)?.map(|e| e.role);

        let requested = ScheduleRecord {
            source: RecordSource::Pending,
            record_id: 0,
            event_ref,
            employee_id: employee_id.to_string(),
            schedule_datetime: timestamp,
            event_type: event.event_type,
            project_name: event.project_name.clone(),
            duration_minutes: settings.duration_minutes(event.event_type, event.estimated_minutes),
        };

        for a in existing {
            let Some(e) = events.get(&a.event_ref) else {
                warn!(assignment_id = a.assignment_id, "排班引用的活动不存在，跳过冲突比较");
                continue;
            };
            let other = ScheduleRecord {
                source: RecordSource::Committed,
                record_id: a.assignment_id,
                event_ref: a.event_ref,
                employee_id: a.employee_id.clone(),
                schedule_datetime: a.schedule_datetime,
                event_type: e.event_type,
                project_name: e.project_name.clone(),
                duration_minutes: settings.duration_minutes(e.event_type, e.estimated_minutes),
            };
            if ScheduleCore::is_double_booking(&requested, &other, role) {
                let mut details = Map::new();
                details.insert("employee_id".into(), employee_id.into());
                details.insert("requested_start".into(), requested.schedule_datetime.to_string().into());
                details.insert("requested_end".into(), requested.end_datetime().to_string().into());
                details.insert("conflicting_assignment_id".into(), other.record_id.into());
                details.insert("conflicting_event_ref".into(), other.event_ref.into());
                details.insert("conflicting_start".into(), other.schedule_datetime.to_string().into());
                details.insert("conflicting_end".into(), other.end_datetime().to_string().into());
                debug!(employee_id, conflicting = other.record_id, "快速检查: 重复排班");
                return Ok(ConflictCheck::conflict(ConflictKind::DoubleBooking, details));
            }
        }

        Ok(ConflictCheck::clear())
    }

    fn check_freshness(&self, settings: &ScheduleSettings, now: NaiveDateTime) -> EngineResult<Option<Issue>> {
        let threshold = settings.stale_sync_hours;
        let issue = match self.repos.sync_state_repo.last_synced_at(SCHEDULE_SYNC_KEY)? {
            None => Some(
                Issue::warning(RuleKind::DataStale, "Schedule data has never been synced")
                    .with_detail("last_synced_at", Option::<NaiveDateTime>::None)
                    .with_detail("threshold_hours", threshold),
            ),
            Some(synced_at) if now - synced_at > Duration::hours(threshold) => {
                let age_hours = (now - synced_at).num_hours();
                Some(
                    Issue::warning(
                        RuleKind::DataStale,
                        format!("Schedule data was last synced {} hours ago", age_hours),
                    )
                    .with_detail("last_synced_at", synced_at)
                    .with_detail("age_hours", age_hours)
                    .with_detail("threshold_hours", threshold),
                )
            }
            Some(_) => None,
        };
        Ok(issue)
    }
}

/// 记录标识（assignment_id / proposal_id）写入详情
fn with_record_ref(issue: Issue, record: &ScheduleRecord) -> Issue {
    issue
        .with_detail("source", record.source)
        .with_detail(record.id_key(), record.record_id)
}

fn record_summary(record: &ScheduleRecord) -> JsonValue {
    let mut map = Map::new();
    map.insert("source".into(), serde_json::to_value(record.source).unwrap_or(JsonValue::Null));
    map.insert(record.id_key().into(), record.record_id.into());
    map.insert("event_ref".into(), record.event_ref.into());
    map.insert("event_type".into(), record.event_type.to_db_str().into());
    map.insert("start".into(), record.schedule_datetime.to_string().into());
    map.insert("end".into(), record.end_datetime().to_string().into());
    JsonValue::Object(map)
}

// ==========================================
// Critical: 请假冲突
// ==========================================
fn check_time_off(snapshot: &ScheduleSnapshot, records: &[ScheduleRecord]) -> Vec<Issue> {
    records
        .iter()
        .filter_map(|r| {
            let time_off = snapshot.availability.get(&r.employee_id)?.time_off_on(r.date())?;
            Some(with_record_ref(
                Issue::critical(
                    RuleKind::TimeOffConflict,
                    format!("{} is scheduled on {} during approved time off", r.employee_id, r.date()),
                )
                .with_detail("employee_id", &r.employee_id)
                .with_detail("date", r.date())
                .with_detail("time_off_id", time_off.time_off_id),
                r,
            ))
        })
        .collect()
}

// ==========================================
// Critical: 重复排班
// ==========================================
fn check_double_booking(snapshot: &ScheduleSnapshot, records: &[ScheduleRecord]) -> Vec<Issue> {
    ScheduleCore::find_double_bookings(records, |emp| snapshot.role_of(emp))
        .into_iter()
        .map(|(i, j)| {
            let (a, b) = (&records[i], &records[j]);
            Issue::critical(
                RuleKind::DoubleBooking,
                format!(
                    "{} is double-booked: {} overlaps {}",
                    a.employee_id, a.project_name, b.project_name
                ),
            )
            .with_detail("employee_id", &a.employee_id)
            .with_detail("date", a.date())
            .with_detail("records", vec![record_summary(a), record_summary(b)])
        })
        .collect()
}

// ==========================================
// Critical: 超出活动窗口
// ==========================================
fn check_out_of_window(snapshot: &ScheduleSnapshot, records: &[ScheduleRecord]) -> Vec<Issue> {
    records
        .iter()
        .filter_map(|r| {
            let event = snapshot.event(r.event_ref)?;
            (!event.contains(r.schedule_datetime)).then(|| {
                with_record_ref(
                    Issue::critical(
                        RuleKind::OutOfWindow,
                        format!(
                            "{} is scheduled at {}, outside its window {} to {}",
                            event.project_name, r.schedule_datetime, event.start_datetime, event.due_datetime
                        ),
                    )
                    .with_detail("employee_id", &r.employee_id)
                    .with_detail("event_ref", r.event_ref)
                    .with_detail("schedule_datetime", r.schedule_datetime)
                    .with_detail("window_start", event.start_datetime)
                    .with_detail("window_due", event.due_datetime),
                    r,
                )
            })
        })
        .collect()
}

// ==========================================
// Warning: 未排班的轻量活动
// ==========================================
fn check_unscheduled_lightweight(
    snapshot: &ScheduleSnapshot,
    pending: &[ScheduleRecord],
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<Issue> {
    let covered: HashSet<i64> = pending.iter().map(|r| r.event_ref).collect();
    let mut events: Vec<_> = snapshot
        .events
        .values()
        .filter(|e| {
            e.event_type.is_role_gated_lightweight()
                && e.overlaps_dates(start, end)
                && e.condition == EventCondition::Unstaffed
                && !e.is_scheduled
                && !covered.contains(&e.event_ref)
        })
        .collect();
    events.sort_by_key(|e| e.event_ref);

    events
        .into_iter()
        .map(|e| {
            Issue::warning(
                RuleKind::UnscheduledLightweight,
                format!("{} ({}) has not been scheduled", e.project_name, e.event_type),
            )
            .with_detail("event_ref", e.event_ref)
            .with_detail("event_type", e.event_type)
            .with_detail("project_name", &e.project_name)
            .with_detail("due_date", e.due_datetime.date())
        })
        .collect()
}

// ==========================================
// Warning: 主 Lead 轮值覆盖缺口
// ==========================================
fn check_rotation_coverage(snapshot: &ScheduleSnapshot, records: &[ScheduleRecord]) -> Vec<Issue> {
    snapshot
        .dates()
        .into_iter()
        .filter_map(|date| {
            let lead = snapshot.rotation.employee_for(RotationKind::PrimaryLead, date)?;
            let covered = records
                .iter()
                .any(|r| r.employee_id == lead && r.date() == date && r.event_type.is_core());
            (!covered).then(|| {
                Issue::warning(
                    RuleKind::RotationCoverageGap,
                    format!("Primary lead {} has no Core event on {}", lead, date),
                )
                .with_detail("employee_id", lead)
                .with_detail("date", date)
                .with_detail("rotation", RotationKind::PrimaryLead)
            })
        })
        .collect()
}

// ==========================================
// Warning: 审批后配对核对
// ==========================================
fn check_pairing_post_approval(snapshot: &ScheduleSnapshot) -> Vec<Issue> {
    let mut issues = Vec::new();
    for date in snapshot.dates() {
        let day = snapshot.day_assignments(date);
        let supervisor_numbers: HashSet<String> = day
            .iter()
            .filter(|(_, e)| e.event_type.is_supervisor())
            .filter_map(|(_, e)| e.event_number())
            .collect();
        for (core, event) in day.iter().filter(|(_, e)| e.event_type.is_core()) {
            if let Some(number) = event.event_number() {
                if !supervisor_numbers.contains(&number) {
                    issues.push(missing_pair_issue(core, &number, date));
                }
            }
        }
    }
    issues
}
