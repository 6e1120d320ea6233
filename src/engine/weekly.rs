// ==========================================
// 门店活动排班校验系统 - 周校验聚合器
// ==========================================
// 流程:
// 1. 7 天逐日执行单日规则
// 2. 追加周内逐日规则（重复产品/深度清洁/Lead 首时段/角色替代/时段分布）
// 3. 追加跨日规则（周上限/重复时间提示）
// 4. 过滤已忽略问题
// 5. 健康分
// ==========================================

use chrono::{Duration, Local, NaiveDate, NaiveDateTime, NaiveTime};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::config::{ConfigManager, ScheduleSettings};
use crate::domain::issue::{
    health_score, DailyDigest, Issue, IssueSummary, RuleKind, ValidationStatus,
    WeeklyValidationResult,
};
use crate::domain::schedule::{Assignment, EventWindow};
use crate::domain::types::{EventType, RotationKind};
use crate::engine::daily_rules::DailyRuleEngine;
use crate::engine::error::EngineResult;
use crate::engine::repositories::ValidationRepositories;
use crate::engine::schedule_core::{format_slot, ScheduleCore};
use crate::engine::snapshot::ScheduleSnapshot;

pub const DAYS_PER_WEEK: i64 = 7;

type DayRow<'a> = (&'a Assignment, &'a EventWindow);

// ==========================================
// WeeklyAggregator - 周校验聚合器
// ==========================================
pub struct WeeklyAggregator {
    repos: ValidationRepositories,
    config: Arc<ConfigManager>,
}

impl WeeklyAggregator {
    pub fn new(repos: ValidationRepositories, config: Arc<ConfigManager>) -> Self {
        Self { repos, config }
    }

    /// 周校验（以当前本地时间判断忽略记录是否过期）
    pub fn validate_week(&self, week_start: NaiveDate) -> EngineResult<WeeklyValidationResult> {
        self.validate_week_at(week_start, Local::now().naive_local())
    }

    pub fn validate_week_at(
        &self,
        week_start: NaiveDate,
        now: NaiveDateTime,
    ) -> EngineResult<WeeklyValidationResult> {
        let (result, _, _) = self.run_week(week_start, now)?;
        Ok(result)
    }

    /// 周校验，同时返回所用快照与配置（修复向导复用）
    #[instrument(skip(self))]
    pub(crate) fn run_week(
        &self,
        week_start: NaiveDate,
        now: NaiveDateTime,
    ) -> EngineResult<(WeeklyValidationResult, ScheduleSnapshot, Arc<ScheduleSettings>)> {
        let settings = self.config.settings()?;
        let week_end = week_start + Duration::days(DAYS_PER_WEEK - 1);
        let snapshot = self.repos.load_snapshot(week_start, week_end)?;
        let suppressed = self.repos.suppression_repo.active_hashes(now)?;

        let mut issues = Vec::new();
        let mut daily = Vec::new();
        let mut suppressed_count = 0usize;

        for date in snapshot.dates() {
            let mut day_issues = DailyRuleEngine::evaluate(&snapshot, &settings, date);
            day_issues.extend(Self::evaluate_week_day(&snapshot, &settings, date));

            let before = day_issues.len();
            day_issues.retain(|i| !suppressed.contains(&i.content_hash()));
            suppressed_count += before - day_issues.len();

            daily.push(DailyDigest {
                date,
                status: ValidationStatus::from_issues(&day_issues),
                summary: IssueSummary::from_issues(&day_issues),
            });
            issues.extend(day_issues);
        }

        let mut cross_day = Self::evaluate_cross_day(&snapshot, &settings, week_start);
        let before = cross_day.len();
        cross_day.retain(|i| !suppressed.contains(&i.content_hash()));
        suppressed_count += before - cross_day.len();
        issues.extend(cross_day);

        let summary = IssueSummary::from_issues(&issues);
        let result = WeeklyValidationResult {
            week_start,
            week_end,
            status: ValidationStatus::from_issues(&issues),
            health_score: health_score(summary.critical, summary.warning),
            summary,
            issues,
            daily,
            suppressed_count,
        };

        info!(
            week_start = %week_start,
            status = ?result.status,
            critical = result.summary.critical,
            warning = result.summary.warning,
            suppressed = suppressed_count,
            health_score = result.health_score,
            "周校验完成"
        );
        Ok((result, snapshot, settings))
    }

    /// 周内逐日规则
    pub fn evaluate_week_day(snapshot: &ScheduleSnapshot, settings: &ScheduleSettings, date: NaiveDate) -> Vec<Issue> {
        let day = snapshot.day_assignments(date);
        let mut issues = Vec::new();
        issues.extend(check_duplicate_product(&day, date));
        issues.extend(check_juicer_deep_clean(&day, date));
        issues.extend(check_lead_first_slot(snapshot, settings, &day, date));
        issues.extend(check_role_substitution(snapshot, &day, date));
        issues.extend(check_time_slot_distribution(settings, &day, date));
        debug!(date = %date, issues = issues.len(), "周内逐日规则执行完毕");
        issues
    }

    /// 跨日规则
    pub fn evaluate_cross_day(
        snapshot: &ScheduleSnapshot,
        settings: &ScheduleSettings,
        week_start: NaiveDate,
    ) -> Vec<Issue> {
        let mut core_by_employee: BTreeMap<&str, Vec<&Assignment>> = BTreeMap::new();
        let mut juicer_by_employee: BTreeMap<&str, Vec<&Assignment>> = BTreeMap::new();
        for date in snapshot.dates() {
            for (a, e) in snapshot.day_assignments(date) {
                if e.event_type.is_core() {
                    core_by_employee.entry(a.employee_id.as_str()).or_default().push(a);
                } else if e.event_type.is_juicer() {
                    juicer_by_employee.entry(a.employee_id.as_str()).or_default().push(a);
                }
            }
        }

        let mut issues = Vec::new();
        issues.extend(weekly_cap_issues(
            RuleKind::WeeklyCoreCap,
            "Core",
            &core_by_employee,
            settings.weekly_core_cap,
            week_start,
        ));
        issues.extend(weekly_cap_issues(
            RuleKind::WeeklyJuicerCap,
            "Juicer",
            &juicer_by_employee,
            settings.weekly_juicer_cap,
            week_start,
        ));

        // 同一 Core 时间出现天数
        for (employee_id, list) in &core_by_employee {
            let mut days_by_time: BTreeMap<NaiveTime, Vec<NaiveDate>> = BTreeMap::new();
            for a in list {
                let days = days_by_time.entry(a.clock_time()).or_default();
                if !days.contains(&a.date()) {
                    days.push(a.date());
                }
            }
            for (time, days) in days_by_time {
                if days.len() >= settings.repeated_time_min_days {
                    issues.push(
                        Issue::info(
                            RuleKind::RepeatedShiftTime,
                            format!(
                                "{} starts Core at {} on {} days this week",
                                employee_id,
                                format_slot(time),
                                days.len()
                            ),
                        )
                        .with_detail("employee_id", *employee_id)
                        .with_detail("week_start", week_start)
                        .with_detail("time", format_slot(time))
                        .with_detail("days", days.len())
                        .with_detail("dates", days),
                    );
                }
            }
        }
        issues
    }
}

fn weekly_cap_issues(
    rule: RuleKind,
    label: &str,
    by_employee: &BTreeMap<&str, Vec<&Assignment>>,
    max: usize,
    week_start: NaiveDate,
) -> Vec<Issue> {
    by_employee
        .iter()
        .filter(|(_, list)| list.len() > max)
        .map(|(employee_id, list)| {
            let ids: Vec<i64> = list.iter().map(|a| a.assignment_id).collect();
            Issue::critical(
                rule,
                format!("{} has {} {} events this week (max {})", employee_id, list.len(), label, max),
            )
            .with_detail("employee_id", *employee_id)
            .with_detail("week_start", week_start)
            .with_detail("count", list.len())
            .with_detail("max", max)
            .with_detail("assignment_ids", ids)
        })
        .collect()
}

// ==========================================
// 同日重复产品
// ==========================================
fn check_duplicate_product(day: &[DayRow], date: NaiveDate) -> Vec<Issue> {
    let mut by_product: BTreeMap<String, Vec<DayRow>> = BTreeMap::new();
    for (a, e) in day.iter().filter(|(_, e)| e.event_type.is_core()) {
        let product = e.product_name();
        if !product.is_empty() {
            by_product.entry(product).or_default().push((*a, *e));
        }
    }

    by_product
        .into_iter()
        .filter(|(_, rows)| rows.len() > 1)
        .map(|(product, rows)| {
            Issue::warning(
                RuleKind::DuplicateProduct,
                format!("'{}' is demoed {} times on {}", product, rows.len(), date),
            )
            .with_detail("date", date)
            .with_detail("product", &product)
            .with_detail("assignment_ids", rows.iter().map(|(a, _)| a.assignment_id).collect::<Vec<_>>())
            .with_detail("event_refs", rows.iter().map(|(_, e)| e.event_ref).collect::<Vec<_>>())
        })
        .collect()
}

// ==========================================
// Juicer 深度清洁与生产同日
// ==========================================
fn check_juicer_deep_clean(day: &[DayRow], date: NaiveDate) -> Vec<Issue> {
    let ids_of = |t: EventType| -> Vec<i64> {
        day.iter()
            .filter(|(_, e)| e.event_type == t)
            .map(|(a, _)| a.assignment_id)
            .collect()
    };
    let deep_clean = ids_of(EventType::JuicerDeepClean);
    let production = ids_of(EventType::JuicerProduction);

    if deep_clean.is_empty() || production.is_empty() {
        return Vec::new();
    }
    vec![Issue::critical(
        RuleKind::JuicerDeepCleanConflict,
        format!("Juicer deep clean and Juicer production are both scheduled on {}", date),
    )
    .with_detail("date", date)
    .with_detail("deep_clean_assignment_ids", deep_clean)
    .with_detail("production_assignment_ids", production)]
}

// ==========================================
// 主 Lead 必须在首个时段
// ==========================================
fn check_lead_first_slot(
    snapshot: &ScheduleSnapshot,
    settings: &ScheduleSettings,
    day: &[DayRow],
    date: NaiveDate,
) -> Vec<Issue> {
    let Some(lead) = snapshot.rotation.employee_for(RotationKind::PrimaryLead, date) else {
        return Vec::new();
    };
    let Some(first_slot) = settings.first_core_slot() else {
        return Vec::new();
    };
    if !snapshot.verdict(lead, date).is_available() {
        debug!(lead, date = %date, "主 Lead 当日不可用，跳过首时段检查");
        return Vec::new();
    }

    let lead_cores: Vec<&Assignment> = day
        .iter()
        .filter(|(a, e)| a.employee_id == lead && e.event_type.is_core())
        .map(|(a, _)| *a)
        .collect();
    if lead_cores.is_empty() || lead_cores.iter().any(|a| a.clock_time() == first_slot) {
        return Vec::new();
    }

    let earliest = lead_cores[0];
    vec![Issue::critical(
        RuleKind::LeadNotFirstSlot,
        format!(
            "Primary lead {} starts Core at {} on {}; expected {}",
            lead,
            format_slot(earliest.clock_time()),
            date,
            format_slot(first_slot)
        ),
    )
    .with_detail("assignment_id", earliest.assignment_id)
    .with_detail("employee_id", lead)
    .with_detail("date", date)
    .with_detail("scheduled_time", format_slot(earliest.clock_time()))
    .with_detail("expected_time", format_slot(first_slot))]
}

// ==========================================
// 不建议的角色替代
// ==========================================
fn check_role_substitution(snapshot: &ScheduleSnapshot, day: &[DayRow], date: NaiveDate) -> Vec<Issue> {
    let busy: HashSet<&str> = day.iter().map(|(a, _)| a.employee_id.as_str()).collect();

    let mut free: Vec<_> = snapshot
        .employees
        .values()
        .filter(|e| e.is_active && !busy.contains(e.employee_id.as_str()))
        .filter(|e| snapshot.verdict(&e.employee_id, date).is_available())
        .collect();
    free.sort_by(|a, b| a.employee_id.cmp(&b.employee_id));

    day.iter()
        .filter(|(_, e)| e.event_type.is_core() || e.event_type.is_role_gated_lightweight())
        .filter_map(|(a, e)| {
            let role = snapshot.role_of(&a.employee_id)?;
            if role.is_preferred_for(e.event_type) {
                return None;
            }
            let preferred_free: Vec<&str> = free
                .iter()
                .filter(|c| c.role.is_preferred_for(e.event_type))
                .map(|c| c.employee_id.as_str())
                .collect();
            if preferred_free.is_empty() {
                return None;
            }
            Some(
                Issue::warning(
                    RuleKind::RoleSubstitution,
                    format!(
                        "{} ({}) holds {} while a preferred employee was free",
                        a.employee_id, role, e.event_type
                    ),
                )
                .with_detail("assignment_id", a.assignment_id)
                .with_detail("employee_id", &a.employee_id)
                .with_detail("role", role)
                .with_detail("event_type", e.event_type)
                .with_detail("date", date)
                .with_detail("available_preferred", preferred_free),
            )
        })
        .collect()
}

// ==========================================
// 时段分布形状
// ==========================================
fn check_time_slot_distribution(settings: &ScheduleSettings, day: &[DayRow], date: NaiveDate) -> Vec<Issue> {
    let core_times: Vec<NaiveTime> = day
        .iter()
        .filter(|(_, e)| e.event_type.is_core())
        .map(|(a, _)| a.clock_time())
        .collect();
    if core_times.is_empty() {
        return Vec::new();
    }

    let counts = ScheduleCore::slot_counts(&core_times, &settings.core_slots);
    let deltas = ScheduleCore::distribution_violations(&counts);
    if deltas.is_empty() {
        return Vec::new();
    }

    let shape: Vec<String> = counts.iter().map(|(_, c)| c.to_string()).collect();
    vec![Issue::critical(
        RuleKind::TimeSlotDistribution,
        format!("Core slot distribution [{}] on {} is not a left-to-right fill", shape.join(", "), date),
    )
    .with_detail("date", date)
    .with_detail("slot_counts", ScheduleCore::to_slot_counts(&counts))
    .with_detail("deltas", deltas)]
}
