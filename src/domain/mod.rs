// ==========================================
// 门店活动排班校验系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、校验问题与修复模型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod employee;
pub mod fix;
pub mod issue;
pub mod rotation;
pub mod schedule;
pub mod types;

// 重导出核心类型
pub use employee::{
    AvailabilityOverride, AvailabilityProfile, AvailabilityVerdict, Employee, TimeOff,
    WeeklyAvailability,
};
pub use fix::{FixAction, FixActionKind, FixOption, FixOutcome, FixableIssue, SuppressedIssue};
pub use issue::{
    health_score, issue_content_hash, DailyDigest, Issue, IssueSummary, RangeStats,
    RangeValidationResult, RuleKind, Severity, ValidationResult, ValidationStatus,
    WeeklyValidationResult,
};
pub use rotation::{RotationException, RotationSlot, RotationTable};
pub use schedule::{
    derive_product_name, extract_event_number, Assignment, EventWindow, NewAssignment, Proposal,
    RecordSource, ScheduleRecord,
};
pub use types::{EmployeeRole, EventCondition, EventType, ProposalStatus, RotationKind, SyncStatus};
