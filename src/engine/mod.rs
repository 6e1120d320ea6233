// ==========================================
// 门店活动排班校验系统 - 引擎层
// ==========================================
// 职责: 校验规则、修复建议、修复执行、提案审批
// 约定: 规则函数只读 ScheduleSnapshot，不拼 SQL
// 约定: 写操作全部经由连接级仓储函数在事务内完成
// ==========================================

pub mod approval;
pub mod candidate_scoring;
pub mod daily_rules;
pub mod error;
pub mod fix_applier;
pub mod fix_generator;
pub mod pairing;
pub mod range_rules;
pub mod repositories;
pub mod schedule_core;
pub mod snapshot;
pub mod weekly;

// 重导出核心引擎
pub use approval::{ApprovalOutcome, ApprovalService, AssignmentSubmitter, NoOpSubmitter, RunApprovalSummary};
pub use candidate_scoring::{CandidateScorer, CandidateSuggester, CandidateSuggestion};
pub use daily_rules::DailyRuleEngine;
pub use error::{EngineError, EngineResult};
pub use fix_applier::{retract_primary_and_paired_supervisor, FixApplier};
pub use fix_generator::{FixOptionGenerator, FixStrategy};
pub use pairing::{SupervisorPairing, SupervisorPick, SupervisorSource};
pub use range_rules::{ConflictCheck, ConflictKind, RangeRuleEngine};
pub use repositories::ValidationRepositories;
pub use schedule_core::{ScheduleCore, SlotCount, SlotDelta};
pub use snapshot::ScheduleSnapshot;
pub use weekly::WeeklyAggregator;
