// ==========================================
// 门店活动排班校验系统 - 校验问题模型
// ==========================================
// 严重度:
// - CRITICAL: 阻断审批
// - WARNING: 需显式确认
// - INFO: 从不阻断
// 红线: 业务规则违反一律以 Issue 返回, 不抛错
// ==========================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use sha2::{Digest, Sha256};
use std::fmt;

// ==========================================
// Severity - 严重度
// ==========================================
// 顺序: Info < Warning < Critical
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

// ==========================================
// RuleKind - 规则标识（封闭枚举）
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    // ===== 单日规则 =====
    CoreDailyLimit,
    TimeOffConflict,
    AvailabilityConflict,
    InvalidCoreTime,
    SlotLoadImbalance,
    MissingSupervisorPair,
    SupervisorRoleMismatch,
    RoleRestrictedEvent,
    DueTomorrowUnscheduled,
    JuicerRoleMismatch,
    JuicerRotationMismatch,
    JuicerCoreConflict,

    // ===== 区间规则 =====
    DataStale,
    DoubleBooking,
    OutOfWindow,
    UnscheduledLightweight,
    RotationCoverageGap,
    SupervisorPairingDeferred,

    // ===== 周规则 =====
    DuplicateProduct,
    JuicerDeepCleanConflict,
    LeadNotFirstSlot,
    RoleSubstitution,
    TimeSlotDistribution,
    WeeklyCoreCap,
    WeeklyJuicerCap,
    RepeatedShiftTime,
}

impl RuleKind {
    /// 规则名（与序列化格式一致）
    pub fn rule_name(&self) -> &'static str {
        match self {
            RuleKind::CoreDailyLimit => "core_daily_limit",
            RuleKind::TimeOffConflict => "time_off_conflict",
            RuleKind::AvailabilityConflict => "availability_conflict",
            RuleKind::InvalidCoreTime => "invalid_core_time",
            RuleKind::SlotLoadImbalance => "slot_load_imbalance",
            RuleKind::MissingSupervisorPair => "missing_supervisor_pair",
            RuleKind::SupervisorRoleMismatch => "supervisor_role_mismatch",
            RuleKind::RoleRestrictedEvent => "role_restricted_event",
            RuleKind::DueTomorrowUnscheduled => "due_tomorrow_unscheduled",
            RuleKind::JuicerRoleMismatch => "juicer_role_mismatch",
            RuleKind::JuicerRotationMismatch => "juicer_rotation_mismatch",
            RuleKind::JuicerCoreConflict => "juicer_core_conflict",
            RuleKind::DataStale => "data_stale",
            RuleKind::DoubleBooking => "double_booking",
            RuleKind::OutOfWindow => "out_of_window",
            RuleKind::UnscheduledLightweight => "unscheduled_lightweight",
            RuleKind::RotationCoverageGap => "rotation_coverage_gap",
            RuleKind::SupervisorPairingDeferred => "supervisor_pairing_deferred",
            RuleKind::DuplicateProduct => "duplicate_product",
            RuleKind::JuicerDeepCleanConflict => "juicer_deep_clean_conflict",
            RuleKind::LeadNotFirstSlot => "lead_not_first_slot",
            RuleKind::RoleSubstitution => "role_substitution",
            RuleKind::TimeSlotDistribution => "time_slot_distribution",
            RuleKind::WeeklyCoreCap => "weekly_core_cap",
            RuleKind::WeeklyJuicerCap => "weekly_juicer_cap",
            RuleKind::RepeatedShiftTime => "repeated_shift_time",
        }
    }

    /// 从规则名解析; 未知规则返回 None
    pub fn from_rule_name(name: &str) -> Option<Self> {
        serde_json::from_value(JsonValue::String(name.trim().to_string())).ok()
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.rule_name())
    }
}

// ==========================================
// Issue - 单条校验问题
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub severity: Severity,
    pub rule: RuleKind,
    pub message: String,
    /// 结构化详情（始终包含驱动修复所需的标识）
    pub details: Map<String, JsonValue>,
}

impl Issue {
    pub fn new(severity: Severity, rule: RuleKind, message: impl Into<String>) -> Self {
        Self {
            severity,
            rule,
            message: message.into(),
            details: Map::new(),
        }
    }

    pub fn critical(rule: RuleKind, message: impl Into<String>) -> Self {
        Self::new(Severity::Critical, rule, message)
    }

    pub fn warning(rule: RuleKind, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, rule, message)
    }

    pub fn info(rule: RuleKind, message: impl Into<String>) -> Self {
        Self::new(Severity::Info, rule, message)
    }

    /// 追加详情字段
    pub fn with_detail<T: Serialize>(mut self, key: &str, value: T) -> Self {
        let value = serde_json::to_value(value).unwrap_or(JsonValue::Null);
        self.details.insert(key.to_string(), value);
        self
    }

    pub fn detail_i64(&self, key: &str) -> Option<i64> {
        self.details.get(key).and_then(|v| v.as_i64())
    }

    pub fn detail_str(&self, key: &str) -> Option<&str> {
        self.details.get(key).and_then(|v| v.as_str())
    }

    pub fn detail_i64_list(&self, key: &str) -> Vec<i64> {
        self.details
            .get(key)
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_i64()).collect())
            .unwrap_or_default()
    }

    /// 内容哈希 (rule, details) —— 用于忽略规则匹配
    pub fn content_hash(&self) -> String {
        issue_content_hash(self.rule, &self.details)
    }
}

/// 计算 (rule, details) 的 SHA-256 十六进制摘要
///
/// details 为有序 Map，序列化结果稳定
pub fn issue_content_hash(rule: RuleKind, details: &Map<String, JsonValue>) -> String {
    let canonical = serde_json::to_string(details).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(rule.rule_name().as_bytes());
    hasher.update(b":");
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

// ==========================================
// ValidationStatus / IssueSummary
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Pass,
    Warning,
    Fail,
}

impl ValidationStatus {
    /// 有 critical → Fail；否则有 warning → Warning；否则 Pass
    pub fn from_issues(issues: &[Issue]) -> Self {
        if issues.iter().any(|i| i.severity == Severity::Critical) {
            ValidationStatus::Fail
        } else if issues.iter().any(|i| i.severity == Severity::Warning) {
            ValidationStatus::Warning
        } else {
            ValidationStatus::Pass
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueSummary {
    pub critical: usize,
    pub warning: usize,
    pub info: usize,
    pub total: usize,
}

impl IssueSummary {
    pub fn from_issues(issues: &[Issue]) -> Self {
        let count = |s: Severity| issues.iter().filter(|i| i.severity == s).count();
        Self {
            critical: count(Severity::Critical),
            warning: count(Severity::Warning),
            info: count(Severity::Info),
            total: issues.len(),
        }
    }
}

/// 健康分 = clamp(100 − 10×critical − 3×warning, 0, 100)
pub fn health_score(critical: usize, warning: usize) -> u8 {
    let penalty = critical.saturating_mul(10).saturating_add(warning.saturating_mul(3));
    100usize.saturating_sub(penalty) as u8
}

// ==========================================
// ValidationResult - 单日校验结果
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub date: NaiveDate,
    pub status: ValidationStatus,
    pub issues: Vec<Issue>,
    pub summary: IssueSummary,
}

impl ValidationResult {
    pub fn new(date: NaiveDate, issues: Vec<Issue>) -> Self {
        Self {
            date,
            status: ValidationStatus::from_issues(&issues),
            summary: IssueSummary::from_issues(&issues),
            issues,
        }
    }
}

// ==========================================
// RangeValidationResult - 区间校验结果
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RangeStats {
    pub days: i64,
    pub committed_records: usize,
    pub pending_records: usize,
    pub employees_involved: usize,
    pub critical_count: usize,
    pub warning_count: usize,
    pub info_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RangeValidationResult {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub include_pending: bool,
    pub run_id: Option<String>,
    pub critical: Vec<Issue>,
    pub warning: Vec<Issue>,
    pub info: Vec<Issue>,
    pub stats: RangeStats,
}

impl RangeValidationResult {
    /// 无 critical 即可审批
    pub fn can_approve(&self) -> bool {
        self.critical.is_empty()
    }
}

// ==========================================
// WeeklyValidationResult - 周校验结果
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyDigest {
    pub date: NaiveDate,
    pub status: ValidationStatus,
    pub summary: IssueSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyValidationResult {
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub status: ValidationStatus,
    pub issues: Vec<Issue>,
    pub daily: Vec<DailyDigest>,
    pub summary: IssueSummary,
    pub suppressed_count: usize,
    pub health_score: u8,
}
