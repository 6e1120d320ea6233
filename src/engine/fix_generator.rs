// ==========================================
// 门店活动排班校验系统 - 修复建议生成器
// ==========================================
// 规则 → 策略: RuleKind 穷举匹配到 FixStrategy
// 每个问题: 策略生成的建议（最高置信度标记 recommended）+ 忽略
// 提示级问题只给忽略
// ==========================================

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::config::{ConfigManager, ScheduleSettings};
use crate::domain::fix::{FixAction, FixOption, FixableIssue};
use crate::domain::issue::{Issue, RuleKind, Severity};
use crate::domain::schedule::{Assignment, ScheduleRecord};
use crate::domain::types::EventType;
use crate::engine::candidate_scoring::{CandidateRequest, CandidateScorer};
use crate::engine::error::EngineResult;
use crate::engine::pairing::SupervisorPairing;
use crate::engine::repositories::ValidationRepositories;
use crate::engine::schedule_core::{format_slot, ScheduleCore};
use crate::engine::snapshot::ScheduleSnapshot;
use crate::engine::weekly::WeeklyAggregator;

// ==========================================
// FixStrategy - 修复策略
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixStrategy {
    ReassignCandidate,
    UnscheduleExtra,
    PairSupervisor,
    RescheduleToSlot { lead_first: bool },
    WeeklyCapTrim,
    DuplicateProductTrim,
    DistributionRebalance,
    IgnoreOnly,
}

impl FixStrategy {
    pub fn for_rule(rule: RuleKind) -> Self {
        match rule {
            RuleKind::CoreDailyLimit => FixStrategy::UnscheduleExtra,
            RuleKind::TimeOffConflict
            | RuleKind::AvailabilityConflict
            | RuleKind::SupervisorRoleMismatch
            | RuleKind::RoleRestrictedEvent
            | RuleKind::JuicerRoleMismatch
            | RuleKind::JuicerRotationMismatch
            | RuleKind::JuicerCoreConflict
            | RuleKind::RoleSubstitution => FixStrategy::ReassignCandidate,
            RuleKind::InvalidCoreTime => FixStrategy::RescheduleToSlot { lead_first: false },
            RuleKind::LeadNotFirstSlot => FixStrategy::RescheduleToSlot { lead_first: true },
            RuleKind::MissingSupervisorPair => FixStrategy::PairSupervisor,
            RuleKind::SlotLoadImbalance | RuleKind::TimeSlotDistribution => FixStrategy::DistributionRebalance,
            RuleKind::WeeklyCoreCap | RuleKind::WeeklyJuicerCap => FixStrategy::WeeklyCapTrim,
            RuleKind::DuplicateProduct => FixStrategy::DuplicateProductTrim,
            RuleKind::DueTomorrowUnscheduled
            | RuleKind::JuicerDeepCleanConflict
            | RuleKind::RepeatedShiftTime
            | RuleKind::DataStale
            | RuleKind::DoubleBooking
            | RuleKind::OutOfWindow
            | RuleKind::UnscheduledLightweight
            | RuleKind::RotationCoverageGap
            | RuleKind::SupervisorPairingDeferred => FixStrategy::IgnoreOnly,
        }
    }
}

/// 生成器上下文（一次周校验共享）
pub struct GeneratorContext<'a> {
    pub snapshot: &'a ScheduleSnapshot,
    pub settings: &'a ScheduleSettings,
    pub records: &'a [ScheduleRecord],
    /// event_type -> (employee_id -> 同类型历史排班数)
    pub experience: &'a HashMap<EventType, HashMap<String, i64>>,
    /// 已有排班的 Supervisor 活动（补配必然失败，不再建议）
    pub staffed_supervisor_events: &'a HashSet<i64>,
}

// ==========================================
// FixOptionGenerator - 修复建议生成器
// ==========================================
pub struct FixOptionGenerator {
    repos: ValidationRepositories,
    aggregator: WeeklyAggregator,
}

impl FixOptionGenerator {
    pub fn new(repos: ValidationRepositories, config: Arc<ConfigManager>) -> Self {
        Self {
            aggregator: WeeklyAggregator::new(repos.clone(), config),
            repos,
        }
    }

    /// 周内全部问题及其修复菜单
    pub fn get_fixable_issues(&self, week_start: NaiveDate) -> EngineResult<Vec<FixableIssue>> {
        self.get_fixable_issues_at(week_start, Local::now().naive_local())
    }

    #[instrument(skip(self))]
    pub fn get_fixable_issues_at(
        &self,
        week_start: NaiveDate,
        now: NaiveDateTime,
    ) -> EngineResult<Vec<FixableIssue>> {
        let (result, snapshot, settings) = self.aggregator.run_week(week_start, now)?;
        let records = snapshot.committed_records(&settings);

        let mut event_types: Vec<EventType> = snapshot.events.values().map(|e| e.event_type).collect();
        event_types.sort();
        event_types.dedup();
        let mut experience = HashMap::new();
        for t in event_types {
            experience.insert(t, self.repos.assignment_repo.count_by_event_type(t)?);
        }
        let staffed_supervisor_events = self
            .repos
            .assignment_repo
            .staffed_event_refs(EventType::Supervisor)?;

        let ctx = GeneratorContext {
            snapshot: &snapshot,
            settings: &settings,
            records: &records,
            experience: &experience,
            staffed_supervisor_events: &staffed_supervisor_events,
        };
        let fixable: Vec<FixableIssue> = result
            .issues
            .into_iter()
            .map(|issue| {
                let options = Self::options_for(&issue, &ctx);
                FixableIssue {
                    issue_hash: issue.content_hash(),
                    issue,
                    options,
                }
            })
            .collect();

        info!(
            week_start = %week_start,
            issues = fixable.len(),
            options = fixable.iter().map(|f| f.options.len()).sum::<usize>(),
            "修复菜单生成完成"
        );
        Ok(fixable)
    }

    /// 单个问题的修复菜单（忽略始终位于末尾）
    pub fn options_for(issue: &Issue, ctx: &GeneratorContext) -> Vec<FixOption> {
        let strategy = if issue.severity == Severity::Info {
            FixStrategy::IgnoreOnly
        } else {
            FixStrategy::for_rule(issue.rule)
        };

        let mut options = match strategy {
            FixStrategy::ReassignCandidate => reassign_candidate(issue, ctx),
            FixStrategy::UnscheduleExtra => {
                trim_assignments(issue, ctx, 1, ctx.settings.fix_policy.unschedule_extra, "keep the earliest Core")
            }
            FixStrategy::PairSupervisor => pair_supervisor(issue, ctx),
            FixStrategy::RescheduleToSlot { lead_first } => reschedule_to_slot(issue, ctx, lead_first),
            FixStrategy::WeeklyCapTrim => {
                trim_assignments(issue, ctx, 0, ctx.settings.fix_policy.weekly_cap_trim, "reduce the weekly total")
            }
            FixStrategy::DuplicateProductTrim => trim_assignments(
                issue,
                ctx,
                1,
                ctx.settings.fix_policy.duplicate_product_trim,
                "keep one demo of the product",
            ),
            FixStrategy::DistributionRebalance => distribution_rebalance(issue, ctx),
            FixStrategy::IgnoreOnly => Vec::new(),
        };
        debug!(rule = %issue.rule.rule_name(), ?strategy, generated = options.len(), "修复建议生成");

        mark_recommended(&mut options);
        options.push(FixOption::new(
            FixAction::ignore(issue),
            format!("Ignore this {} issue", issue.rule.rule_name()),
            ctx.settings.fix_policy.ignore,
        ));
        options
    }
}

/// 首个最高置信度建议标记为 recommended
fn mark_recommended(options: &mut [FixOption]) {
    let Some(best) = options.iter().map(|o| o.confidence).max() else {
        return;
    };
    if let Some(option) = options.iter_mut().find(|o| o.confidence == best) {
        option.recommended = true;
    }
}

fn target_assignment_ids(issue: &Issue) -> Vec<i64> {
    match issue.detail_i64("assignment_id") {
        Some(id) => vec![id],
        None => issue.detail_i64_list("assignment_ids"),
    }
}

fn describe(ctx: &GeneratorContext, a: &Assignment) -> String {
    let project = ctx
        .snapshot
        .event(a.event_ref)
        .map(|e| e.project_name.as_str())
        .unwrap_or("event");
    format!("{} on {} at {}", project, a.date(), format_slot(a.clock_time()))
}

// ==========================================
// 换人候选 + 取消兜底
// ==========================================
fn reassign_candidate(issue: &Issue, ctx: &GeneratorContext) -> Vec<FixOption> {
    let policy = &ctx.settings.fix_policy;
    let empty = HashMap::new();
    let mut options = Vec::new();

    for id in target_assignment_ids(issue) {
        let Some(a) = ctx.snapshot.find_assignment(id) else {
            continue;
        };
        let Some(event) = ctx.snapshot.event(a.event_ref) else {
            continue;
        };

        let exclude = vec![a.employee_id.clone()];
        let ranked = CandidateScorer::rank(
            ctx.snapshot,
            ctx.settings,
            &CandidateRequest {
                event,
                timestamp: a.schedule_datetime,
                exclude: &exclude,
                records: ctx.records,
                experience: ctx.experience.get(&event.event_type).unwrap_or(&empty),
            },
        );

        for candidate in ranked.into_iter().take(policy.max_reassign_candidates) {
            options.push(FixOption::new(
                FixAction::Reassign {
                    assignment_id: id,
                    new_employee_id: candidate.employee_id.clone(),
                },
                format!("Reassign {} to {} ({})", describe(ctx, a), candidate.name, candidate.role),
                candidate.score,
            ));
        }
        options.push(FixOption::new(
            FixAction::Unschedule { assignment_id: id },
            format!("Unschedule {}", describe(ctx, a)),
            policy.unschedule_fallback,
        ));
    }
    options
}

// ==========================================
// 逐条取消（保留前 keep 条）
// ==========================================
fn trim_assignments(issue: &Issue, ctx: &GeneratorContext, keep: usize, confidence: u8, goal: &str) -> Vec<FixOption> {
    issue
        .detail_i64_list("assignment_ids")
        .into_iter()
        .skip(keep)
        .map(|id| {
            let label = ctx
                .snapshot
                .find_assignment(id)
                .map(|a| describe(ctx, a))
                .unwrap_or_else(|| format!("assignment {}", id));
            FixOption::new(
                FixAction::Unschedule { assignment_id: id },
                format!("Unschedule {} to {}", label, goal),
                confidence,
            )
        })
        .collect()
}

// ==========================================
// 补配 Supervisor
// ==========================================
fn pair_supervisor(issue: &Issue, ctx: &GeneratorContext) -> Vec<FixOption> {
    let Some(core_id) = issue.detail_i64("core_assignment_id") else {
        return Vec::new();
    };
    let Some(core) = ctx.snapshot.find_assignment(core_id) else {
        return Vec::new();
    };
    let Some(number) = ctx.snapshot.event(core.event_ref).and_then(|e| e.event_number()) else {
        return Vec::new();
    };

    let at = SupervisorPairing::supervisor_time(ctx.settings, core);
    let mut supervisor_events: Vec<_> = ctx
        .snapshot
        .events
        .values()
        .filter(|e| e.event_type.is_supervisor() && e.event_number().as_deref() == Some(number.as_str()))
        .collect();
    supervisor_events.sort_by_key(|e| (!e.contains(at), e.event_ref));
    // 与执行器选同一个活动；已有人员则不给补配建议
    let Some(supervisor_event) = supervisor_events.first() else {
        return Vec::new();
    };
    if ctx.staffed_supervisor_events.contains(&supervisor_event.event_ref) {
        return Vec::new();
    }

    let day_records: Vec<ScheduleRecord> = ctx
        .records
        .iter()
        .filter(|r| r.date() == at.date())
        .cloned()
        .collect();
    let Some(pick) = SupervisorPairing::pick(ctx.snapshot, ctx.settings, &day_records, core, supervisor_event) else {
        return Vec::new();
    };
    let name = ctx
        .snapshot
        .employee(&pick.employee_id)
        .map(|e| e.name.as_str())
        .unwrap_or(pick.employee_id.as_str());

    vec![FixOption::new(
        FixAction::AssignSupervisor { core_assignment_id: core_id },
        format!(
            "Assign {} to Supervisor event {} at {}",
            name,
            number,
            format_slot(at.time())
        ),
        ctx.settings.fix_policy.pair_supervisor,
    )]
}

// ==========================================
// 改到有效时段
// ==========================================
fn reschedule_to_slot(issue: &Issue, ctx: &GeneratorContext, lead_first: bool) -> Vec<FixOption> {
    let policy = &ctx.settings.fix_policy;
    let Some(id) = issue.detail_i64("assignment_id") else {
        return Vec::new();
    };
    let Some(a) = ctx.snapshot.find_assignment(id) else {
        return Vec::new();
    };
    let Some(event) = ctx.snapshot.event(a.event_ref) else {
        return Vec::new();
    };
    let Some(current) = ctx.records.iter().find(|r| r.record_id == id) else {
        return Vec::new();
    };
    let role = ctx.snapshot.role_of(&a.employee_id);
    let first = ctx.settings.first_core_slot();

    ctx.settings
        .core_slots
        .iter()
        .filter(|slot| **slot != a.clock_time())
        .filter_map(|slot| {
            let ts = a.date().and_time(*slot);
            if !event.contains(ts) {
                return None;
            }
            let moved = ScheduleRecord {
                schedule_datetime: ts,
                ..current.clone()
            };
            let conflicts = ctx
                .records
                .iter()
                .filter(|r| r.employee_id == a.employee_id)
                .any(|r| ScheduleCore::is_double_booking(&moved, r, role));
            if conflicts {
                return None;
            }
            let confidence = if lead_first && Some(*slot) == first {
                policy.reschedule_lead_first_slot
            } else {
                policy.reschedule_slot
            };
            Some(FixOption::new(
                FixAction::Reschedule {
                    assignment_id: id,
                    new_datetime: ts,
                },
                format!("Move {} to {}", describe(ctx, a), format_slot(*slot)),
                confidence,
            ))
        })
        .collect()
}

// ==========================================
// 时段分布再平衡
// ==========================================
fn distribution_rebalance(issue: &Issue, ctx: &GeneratorContext) -> Vec<FixOption> {
    let Some(date) = issue
        .detail_str("date")
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
    else {
        return Vec::new();
    };
    let slots = &ctx.settings.core_slots;

    let cores: Vec<&Assignment> = ctx
        .snapshot
        .day_assignments(date)
        .into_iter()
        .filter(|(_, e)| e.event_type.is_core())
        .map(|(a, _)| a)
        .collect();
    if cores.is_empty() || slots.is_empty() {
        return Vec::new();
    }

    let in_slot = |slot: &NaiveTime| -> Vec<&Assignment> {
        cores.iter().copied().filter(|a| a.clock_time() == *slot).collect()
    };
    let ideal = ScheduleCore::ideal_distribution(cores.len(), slots.len());

    // 多余: 非配置时间全部 + 超额时段的末尾若干条
    let mut surplus: Vec<&Assignment> = cores
        .iter()
        .copied()
        .filter(|a| !ctx.settings.is_core_slot(a.clock_time()))
        .collect();
    let mut deficit: Vec<NaiveTime> = Vec::new();
    for (slot, target) in slots.iter().zip(ideal.iter()) {
        let held = in_slot(slot);
        if held.len() > *target {
            surplus.extend(held[*target..].iter().copied());
        } else {
            deficit.extend(std::iter::repeat(*slot).take(target - held.len()));
        }
    }

    surplus
        .into_iter()
        .zip(deficit)
        .filter_map(|(a, slot)| {
            let ts = date.and_time(slot);
            let event = ctx.snapshot.event(a.event_ref)?;
            event.contains(ts).then(|| {
                FixOption::new(
                    FixAction::Reschedule {
                        assignment_id: a.assignment_id,
                        new_datetime: ts,
                    },
                    format!("Move {} to {} to even out Core slots", describe(ctx, a), format_slot(slot)),
                    ctx.settings.fix_policy.distribution_rebalance,
                )
            })
        })
        .collect()
}
