// ==========================================
// 门店活动排班校验系统 - 单日规则引擎
// ==========================================
// 输入: 某一日期的已提交排班 + 参考数据快照
// 输出: ValidationResult (fail / warning / pass)
// 红线: 规则违反只产生 Issue，不返回错误
// ==========================================

use chrono::{Duration, NaiveDate};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::config::{ConfigManager, ScheduleSettings};
use crate::domain::employee::AvailabilityVerdict;
use crate::domain::issue::{Issue, RuleKind, ValidationResult};
use crate::domain::schedule::{Assignment, EventWindow};
use crate::domain::types::{EventCondition, EventType, RotationKind};
use crate::engine::error::EngineResult;
use crate::engine::repositories::ValidationRepositories;
use crate::engine::schedule_core::{format_slot, ScheduleCore};
use crate::engine::snapshot::ScheduleSnapshot;

type DayRow<'a> = (&'a Assignment, &'a EventWindow);

// ==========================================
// DailyRuleEngine - 单日规则引擎
// ==========================================
pub struct DailyRuleEngine {
    repos: ValidationRepositories,
    config: Arc<ConfigManager>,
}

impl DailyRuleEngine {
    pub fn new(repos: ValidationRepositories, config: Arc<ConfigManager>) -> Self {
        Self { repos, config }
    }

    /// 校验某一天
    #[instrument(skip(self))]
    pub fn verify_day(&self, date: NaiveDate) -> EngineResult<ValidationResult> {
        let settings = self.config.settings()?;
        let snapshot = self.repos.load_snapshot(date, date)?;
        let result = ValidationResult::new(date, Self::evaluate(&snapshot, &settings, date));

        info!(
            date = %date,
            status = ?result.status,
            critical = result.summary.critical,
            warning = result.summary.warning,
            "单日校验完成"
        );
        Ok(result)
    }

    /// 在快照上执行全部单日规则（快照须覆盖 date）
    pub fn evaluate(snapshot: &ScheduleSnapshot, settings: &ScheduleSettings, date: NaiveDate) -> Vec<Issue> {
        let day = snapshot.day_assignments(date);

        let mut issues = Vec::new();
        issues.extend(check_core_daily_limit(&day, date));
        issues.extend(check_availability(snapshot, &day, date));
        issues.extend(check_core_times(&day, settings, date));
        issues.extend(check_supervisor_pairing(snapshot, &day, date));
        issues.extend(check_role_restricted(snapshot, &day, date));
        issues.extend(check_due_tomorrow(snapshot, date));
        issues.extend(check_juicer(snapshot, &day, date));

        debug!(date = %date, assignments = day.len(), issues = issues.len(), "单日规则执行完毕");
        issues
    }
}

// ==========================================
// 规则 1: 每人每日 Core 上限
// ==========================================
fn check_core_daily_limit(day: &[DayRow], date: NaiveDate) -> Vec<Issue> {
    let mut by_employee: BTreeMap<&str, Vec<i64>> = BTreeMap::new();
    for (a, e) in day {
        if e.event_type.is_core() {
            by_employee.entry(a.employee_id.as_str()).or_default().push(a.assignment_id);
        }
    }

    by_employee
        .into_iter()
        .filter(|(_, ids)| ids.len() > 1)
        .map(|(employee_id, ids)| {
            Issue::critical(
                RuleKind::CoreDailyLimit,
                format!("{} has {} Core events on {}", employee_id, ids.len(), date),
            )
            .with_detail("employee_id", employee_id)
            .with_detail("date", date)
            .with_detail("count", ids.len())
            .with_detail("assignment_ids", ids)
        })
        .collect()
}

// ==========================================
// 规则 2: 请假 > 日期覆盖 > 每周模式
// ==========================================
fn check_availability(snapshot: &ScheduleSnapshot, day: &[DayRow], date: NaiveDate) -> Vec<Issue> {
    let mut by_employee: BTreeMap<&str, Vec<i64>> = BTreeMap::new();
    for (a, _) in day {
        by_employee.entry(a.employee_id.as_str()).or_default().push(a.assignment_id);
    }

    let mut issues = Vec::new();
    for (employee_id, ids) in by_employee {
        match snapshot.verdict(employee_id, date) {
            AvailabilityVerdict::Available => {}
            AvailabilityVerdict::TimeOff { time_off_id, start_date, end_date } => {
                issues.push(
                    Issue::critical(
                        RuleKind::TimeOffConflict,
                        format!("{} is scheduled on {} during approved time off", employee_id, date),
                    )
                    .with_detail("employee_id", employee_id)
                    .with_detail("date", date)
                    .with_detail("time_off_id", time_off_id)
                    .with_detail("time_off_start", start_date)
                    .with_detail("time_off_end", end_date)
                    .with_detail("assignment_ids", ids),
                );
            }
            verdict => {
                let source = match verdict {
                    AvailabilityVerdict::OverrideUnavailable => "override",
                    _ => "weekly",
                };
                issues.push(
                    Issue::critical(
                        RuleKind::AvailabilityConflict,
                        format!("{} is not available on {} ({})", employee_id, date.format("%A"), source),
                    )
                    .with_detail("employee_id", employee_id)
                    .with_detail("date", date)
                    .with_detail("source", source)
                    .with_detail("assignment_ids", ids),
                );
            }
        }
    }
    issues
}

// ==========================================
// 规则 3: Core 时段有效性 + 时段负载
// ==========================================
fn check_core_times(day: &[DayRow], settings: &ScheduleSettings, date: NaiveDate) -> Vec<Issue> {
    let cores: Vec<&Assignment> = day
        .iter()
        .filter(|(_, e)| e.event_type.is_core())
        .map(|(a, _)| *a)
        .collect();
    if cores.is_empty() {
        return Vec::new();
    }

    let valid_slots: Vec<String> = settings.core_slots.iter().map(|t| format_slot(*t)).collect();
    let mut issues: Vec<Issue> = cores
        .iter()
        .filter(|a| !settings.is_core_slot(a.clock_time()))
        .map(|a| {
            Issue::warning(
                RuleKind::InvalidCoreTime,
                format!(
                    "Core assignment {} starts at {}, which is not a configured slot",
                    a.assignment_id,
                    format_slot(a.clock_time())
                ),
            )
            .with_detail("assignment_id", a.assignment_id)
            .with_detail("employee_id", &a.employee_id)
            .with_detail("event_ref", a.event_ref)
            .with_detail("date", date)
            .with_detail("scheduled_time", format_slot(a.clock_time()))
            .with_detail("valid_slots", &valid_slots)
        })
        .collect();

    let counts: Vec<_> = settings
        .core_slots
        .iter()
        .map(|slot| (*slot, cores.iter().filter(|a| a.clock_time() == *slot).count()))
        .collect();
    let overloaded: Vec<String> = counts
        .iter()
        .filter(|(_, c)| *c >= settings.slot_overload_threshold)
        .map(|(t, _)| format_slot(*t))
        .collect();
    let empty: Vec<String> = counts
        .iter()
        .filter(|(_, c)| *c == 0)
        .map(|(t, _)| format_slot(*t))
        .collect();

    if !overloaded.is_empty() && !empty.is_empty() {
        issues.push(
            Issue::warning(
                RuleKind::SlotLoadImbalance,
                format!(
                    "Slots {} are overloaded while {} are empty on {}",
                    overloaded.join(", "),
                    empty.join(", "),
                    date
                ),
            )
            .with_detail("date", date)
            .with_detail("slot_counts", ScheduleCore::to_slot_counts(&counts))
            .with_detail("overloaded_slots", overloaded)
            .with_detail("empty_slots", empty),
        );
    }
    issues
}

// ==========================================
// 规则 4: Core / Supervisor 配对
// ==========================================
fn check_supervisor_pairing(snapshot: &ScheduleSnapshot, day: &[DayRow], date: NaiveDate) -> Vec<Issue> {
    let supervisors: Vec<(&Assignment, String)> = day
        .iter()
        .filter(|(_, e)| e.event_type.is_supervisor())
        .filter_map(|(a, e)| e.event_number().map(|n| (*a, n)))
        .collect();

    let mut issues = Vec::new();
    for (core, event) in day.iter().filter(|(_, e)| e.event_type.is_core()) {
        let Some(number) = event.event_number() else {
            continue;
        };
        let paired: Vec<&Assignment> = supervisors
            .iter()
            .filter(|(_, n)| *n == number)
            .map(|(a, _)| *a)
            .collect();

        if paired.is_empty() {
            issues.push(missing_pair_issue(core, &number, date));
            continue;
        }

        for sup in paired {
            let Some(role) = snapshot.role_of(&sup.employee_id) else {
                continue;
            };
            if !role.can_work(EventType::Supervisor) {
                issues.push(
                    Issue::warning(
                        RuleKind::SupervisorRoleMismatch,
                        format!(
                            "Supervisor event {} is held by {} ({}), not a supervisor or lead",
                            number, sup.employee_id, role
                        ),
                    )
                    .with_detail("assignment_id", sup.assignment_id)
                    .with_detail("core_assignment_id", core.assignment_id)
                    .with_detail("employee_id", &sup.employee_id)
                    .with_detail("role", role)
                    .with_detail("event_number", &number)
                    .with_detail("date", date),
                );
            }
        }
    }
    issues
}

/// 缺少配对 Supervisor（单日与区间规则共用）
pub(crate) fn missing_pair_issue(core: &Assignment, number: &str, date: NaiveDate) -> Issue {
    Issue::warning(
        RuleKind::MissingSupervisorPair,
        format!("Core event {} on {} has no Supervisor event scheduled", number, date),
    )
    .with_detail("core_assignment_id", core.assignment_id)
    .with_detail("event_ref", core.event_ref)
    .with_detail("event_number", number)
    .with_detail("employee_id", &core.employee_id)
    .with_detail("date", date)
}

// ==========================================
// 规则 5: 角色限定的轻量活动
// ==========================================
fn check_role_restricted(snapshot: &ScheduleSnapshot, day: &[DayRow], date: NaiveDate) -> Vec<Issue> {
    day.iter()
        .filter(|(_, e)| e.event_type.is_role_gated_lightweight())
        .filter_map(|(a, e)| {
            let role = snapshot.role_of(&a.employee_id)?;
            (!role.can_work(e.event_type)).then(|| {
                Issue::critical(
                    RuleKind::RoleRestrictedEvent,
                    format!("{} event {} is assigned to {} ({})", e.event_type, e.event_ref, a.employee_id, role),
                )
                .with_detail("assignment_id", a.assignment_id)
                .with_detail("employee_id", &a.employee_id)
                .with_detail("event_ref", e.event_ref)
                .with_detail("event_type", e.event_type)
                .with_detail("role", role)
                .with_detail("date", date)
            })
        })
        .collect()
}

// ==========================================
// 规则 6: 次日截止但未排班
// ==========================================
fn check_due_tomorrow(snapshot: &ScheduleSnapshot, date: NaiveDate) -> Vec<Issue> {
    let tomorrow = date + Duration::days(1);
    let mut due: Vec<&EventWindow> = snapshot
        .events
        .values()
        .filter(|e| {
            e.due_datetime.date() == tomorrow
                && e.event_type.is_required()
                && e.condition == EventCondition::Unstaffed
                && !e.is_scheduled
        })
        .collect();
    due.sort_by_key(|e| e.event_ref);

    due.into_iter()
        .map(|e| {
            Issue::critical(
                RuleKind::DueTomorrowUnscheduled,
                format!("{} ({}) is due {} and is still unscheduled", e.project_name, e.event_type, tomorrow),
            )
            .with_detail("event_ref", e.event_ref)
            .with_detail("project_name", &e.project_name)
            .with_detail("event_type", e.event_type)
            .with_detail("due_date", tomorrow)
        })
        .collect()
}

// ==========================================
// 规则 7: Juicer 角色 / 轮值 / 与 Core 冲突
// ==========================================
fn check_juicer(snapshot: &ScheduleSnapshot, day: &[DayRow], date: NaiveDate) -> Vec<Issue> {
    let rotation_employee = snapshot.rotation.employee_for(RotationKind::Juicer, date);

    let mut issues = Vec::new();
    for (a, e) in day.iter().filter(|(_, e)| e.event_type.is_juicer()) {
        if let Some(role) = snapshot.role_of(&a.employee_id) {
            if !role.can_work(e.event_type) {
                issues.push(
                    Issue::critical(
                        RuleKind::JuicerRoleMismatch,
                        format!("{} is assigned to {} but is a {}", a.employee_id, e.event_type, role),
                    )
                    .with_detail("assignment_id", a.assignment_id)
                    .with_detail("employee_id", &a.employee_id)
                    .with_detail("role", role)
                    .with_detail("event_type", e.event_type)
                    .with_detail("date", date),
                );
            }
        }

        if let Some(expected) = rotation_employee {
            if expected != a.employee_id {
                issues.push(
                    Issue::warning(
                        RuleKind::JuicerRotationMismatch,
                        format!("Juicer rotation for {} is {}, but {} is assigned", date, expected, a.employee_id),
                    )
                    .with_detail("assignment_id", a.assignment_id)
                    .with_detail("employee_id", &a.employee_id)
                    .with_detail("rotation_employee_id", expected)
                    .with_detail("date", date),
                );
            }
        }

        let core_ids: Vec<i64> = day
            .iter()
            .filter(|(other, oe)| other.employee_id == a.employee_id && oe.event_type.is_core())
            .map(|(other, _)| other.assignment_id)
            .collect();
        if !core_ids.is_empty() {
            issues.push(
                Issue::critical(
                    RuleKind::JuicerCoreConflict,
                    format!("{} holds both a Juicer and a Core event on {}", a.employee_id, date),
                )
                .with_detail("assignment_id", a.assignment_id)
                .with_detail("employee_id", &a.employee_id)
                .with_detail("core_assignment_ids", core_ids)
                .with_detail("date", date),
            );
        }
    }
    issues
}
