// ==========================================
// 门店活动排班校验系统 - 领域类型定义
// ==========================================
// 活动类别:
// - 主活动 (Core): 每人每天至多一场
// - 督导活动 (Supervisor): 与 Core 按活动编号配对
// - 限角色轻量活动 (Freeosk / Digital*)
// - 专项轮值活动 (Juicer*)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 活动类型 (Event Type)
// ==========================================
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Core,
    Supervisor,
    JuicerProduction,
    JuicerSurvey,
    JuicerDeepClean,
    DigitalSetup,
    DigitalRefresh,
    DigitalTeardown,
    Freeosk,
    Other,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl EventType {
    /// 从数据库字符串解析（大小写/空格/连字符不敏感）
    pub fn from_db_str(s: &str) -> Option<Self> {
        let normalized = s.trim().to_uppercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "CORE" => Some(EventType::Core),
            "SUPERVISOR" => Some(EventType::Supervisor),
            "JUICER_PRODUCTION" | "JUICER" => Some(EventType::JuicerProduction),
            "JUICER_SURVEY" => Some(EventType::JuicerSurvey),
            "JUICER_DEEP_CLEAN" => Some(EventType::JuicerDeepClean),
            "DIGITAL_SETUP" => Some(EventType::DigitalSetup),
            "DIGITAL_REFRESH" => Some(EventType::DigitalRefresh),
            "DIGITAL_TEARDOWN" => Some(EventType::DigitalTeardown),
            "FREEOSK" => Some(EventType::Freeosk),
            "OTHER" => Some(EventType::Other),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            EventType::Core => "CORE",
            EventType::Supervisor => "SUPERVISOR",
            EventType::JuicerProduction => "JUICER_PRODUCTION",
            EventType::JuicerSurvey => "JUICER_SURVEY",
            EventType::JuicerDeepClean => "JUICER_DEEP_CLEAN",
            EventType::DigitalSetup => "DIGITAL_SETUP",
            EventType::DigitalRefresh => "DIGITAL_REFRESH",
            EventType::DigitalTeardown => "DIGITAL_TEARDOWN",
            EventType::Freeosk => "FREEOSK",
            EventType::Other => "OTHER",
        }
    }

    pub fn is_core(&self) -> bool {
        matches!(self, EventType::Core)
    }

    pub fn is_supervisor(&self) -> bool {
        matches!(self, EventType::Supervisor)
    }

    /// Juicer 专项活动
    pub fn is_juicer(&self) -> bool {
        matches!(
            self,
            EventType::JuicerProduction | EventType::JuicerSurvey | EventType::JuicerDeepClean
        )
    }

    /// 仅限 Lead / Club Supervisor 执行的轻量活动
    pub fn is_role_gated_lightweight(&self) -> bool {
        matches!(
            self,
            EventType::Freeosk
                | EventType::DigitalSetup
                | EventType::DigitalRefresh
                | EventType::DigitalTeardown
        )
    }

    /// 必须排班的活动（Other 不要求）
    pub fn is_required(&self) -> bool {
        !matches!(self, EventType::Other)
    }

    /// 可与同类活动并行（仅 Club Supervisor 持有时生效）
    pub fn is_concurrent_eligible(&self) -> bool {
        self.is_supervisor()
    }

    /// 全部活动类型
    pub fn all() -> &'static [EventType] {
        &[
            EventType::Core,
            EventType::Supervisor,
            EventType::JuicerProduction,
            EventType::JuicerSurvey,
            EventType::JuicerDeepClean,
            EventType::DigitalSetup,
            EventType::DigitalRefresh,
            EventType::DigitalTeardown,
            EventType::Freeosk,
            EventType::Other,
        ]
    }
}

// ==========================================
// 员工角色 (Employee Role)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmployeeRole {
    LeadEventSpecialist,
    ClubSupervisor,
    EventSpecialist,
    JuicerBarista,
}

impl fmt::Display for EmployeeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmployeeRole::LeadEventSpecialist => write!(f, "Lead Event Specialist"),
            EmployeeRole::ClubSupervisor => write!(f, "Club Supervisor"),
            EmployeeRole::EventSpecialist => write!(f, "Event Specialist"),
            EmployeeRole::JuicerBarista => write!(f, "Juicer Barista"),
        }
    }
}

impl EmployeeRole {
    /// 从职位名称解析（兼容 "Lead Event Specialist" 与 "LEAD_EVENT_SPECIALIST"）
    pub fn from_db_str(s: &str) -> Option<Self> {
        let normalized = s.trim().to_uppercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "LEAD_EVENT_SPECIALIST" | "LEAD" => Some(EmployeeRole::LeadEventSpecialist),
            "CLUB_SUPERVISOR" => Some(EmployeeRole::ClubSupervisor),
            "EVENT_SPECIALIST" => Some(EmployeeRole::EventSpecialist),
            "JUICER_BARISTA" => Some(EmployeeRole::JuicerBarista),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            EmployeeRole::LeadEventSpecialist => "LEAD_EVENT_SPECIALIST",
            EmployeeRole::ClubSupervisor => "CLUB_SUPERVISOR",
            EmployeeRole::EventSpecialist => "EVENT_SPECIALIST",
            EmployeeRole::JuicerBarista => "JUICER_BARISTA",
        }
    }

    /// 督导角色（允许并行持有 Supervisor 活动）
    pub fn is_supervisor_role(&self) -> bool {
        matches!(self, EmployeeRole::ClubSupervisor)
    }

    /// 角色是否有资格执行该类型活动
    pub fn can_work(&self, event_type: EventType) -> bool {
        use EmployeeRole::*;
        match event_type {
            EventType::Supervisor => matches!(self, LeadEventSpecialist | ClubSupervisor),
            EventType::Freeosk
            | EventType::DigitalSetup
            | EventType::DigitalRefresh
            | EventType::DigitalTeardown => matches!(self, LeadEventSpecialist | ClubSupervisor),
            EventType::JuicerProduction | EventType::JuicerSurvey | EventType::JuicerDeepClean => {
                matches!(self, JuicerBarista | ClubSupervisor)
            }
            EventType::Core | EventType::Other => true,
        }
    }

    /// 角色是否为该类型活动的首选角色（用于候选人评分）
    pub fn is_preferred_for(&self, event_type: EventType) -> bool {
        use EmployeeRole::*;
        match event_type {
            EventType::Core => matches!(self, LeadEventSpecialist | EventSpecialist),
            EventType::Supervisor => matches!(self, ClubSupervisor),
            EventType::Freeosk
            | EventType::DigitalSetup
            | EventType::DigitalRefresh
            | EventType::DigitalTeardown => matches!(self, LeadEventSpecialist),
            EventType::JuicerProduction | EventType::JuicerSurvey | EventType::JuicerDeepClean => {
                matches!(self, JuicerBarista)
            }
            EventType::Other => false,
        }
    }
}

// ==========================================
// 活动状态 (Event Condition)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventCondition {
    Unstaffed, // 未排班
    Scheduled, // 已排班
    Canceled,  // 已取消
}

impl fmt::Display for EventCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl EventCondition {
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "UNSTAFFED" => Some(EventCondition::Unstaffed),
            "SCHEDULED" => Some(EventCondition::Scheduled),
            "CANCELED" | "CANCELLED" => Some(EventCondition::Canceled),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            EventCondition::Unstaffed => "UNSTAFFED",
            EventCondition::Scheduled => "SCHEDULED",
            EventCondition::Canceled => "CANCELED",
        }
    }
}

// ==========================================
// 提案状态 (Proposal Status)
// ==========================================
// 生命周期: PROPOSED → USER_EDITED → API_SUBMITTED / API_FAILED / VALIDATION_FAILED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProposalStatus {
    Proposed,
    UserEdited,
    ApiSubmitted,
    ApiFailed,
    ValidationFailed,
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl ProposalStatus {
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "PROPOSED" => Some(ProposalStatus::Proposed),
            "USER_EDITED" => Some(ProposalStatus::UserEdited),
            "API_SUBMITTED" => Some(ProposalStatus::ApiSubmitted),
            "API_FAILED" => Some(ProposalStatus::ApiFailed),
            "VALIDATION_FAILED" => Some(ProposalStatus::ValidationFailed),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            ProposalStatus::Proposed => "PROPOSED",
            ProposalStatus::UserEdited => "USER_EDITED",
            ProposalStatus::ApiSubmitted => "API_SUBMITTED",
            ProposalStatus::ApiFailed => "API_FAILED",
            ProposalStatus::ValidationFailed => "VALIDATION_FAILED",
        }
    }

    /// 仍待审批的状态
    pub fn is_active(&self) -> bool {
        matches!(self, ProposalStatus::Proposed | ProposalStatus::UserEdited)
    }
}

// ==========================================
// 外部同步状态 (Sync Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStatus {
    Pending,
    Synced,
    Failed,
}

impl SyncStatus {
    pub fn from_db_str(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "SYNCED" => SyncStatus::Synced,
            "FAILED" => SyncStatus::Failed,
            _ => SyncStatus::Pending, // 默认值
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            SyncStatus::Pending => "PENDING",
            SyncStatus::Synced => "SYNCED",
            SyncStatus::Failed => "FAILED",
        }
    }
}

// ==========================================
// 轮值类型 (Rotation Kind)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RotationKind {
    PrimaryLead, // 主 Lead 轮值
    Juicer,      // Juicer 专项轮值
}

impl fmt::Display for RotationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl RotationKind {
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "PRIMARY_LEAD" => Some(RotationKind::PrimaryLead),
            "JUICER" => Some(RotationKind::Juicer),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            RotationKind::PrimaryLead => "PRIMARY_LEAD",
            RotationKind::Juicer => "JUICER",
        }
    }
}
