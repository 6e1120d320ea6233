// ==========================================
// 门店活动排班校验系统 - 修复向导领域模型
// ==========================================
// FixAction: 可执行的修复动作（带结构化目标）
// FixOption: 带置信度的修复建议
// SuppressedIssue: 已忽略问题（内容哈希 + 可选过期）
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::fmt;

use crate::domain::issue::{Issue, RuleKind};

// ==========================================
// FixAction - 修复动作
// ==========================================
// 序列化: {"action": "reassign", "assignment_id": 1, ...}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum FixAction {
    /// 换人
    Reassign {
        assignment_id: i64,
        new_employee_id: String,
    },
    /// 取消排班（Core 级联撤销配对 Supervisor）
    Unschedule { assignment_id: i64 },
    /// 改时间
    Reschedule {
        assignment_id: i64,
        new_datetime: NaiveDateTime,
    },
    /// 为 Core 补配 Supervisor
    AssignSupervisor { core_assignment_id: i64 },
    /// 忽略问题
    Ignore {
        rule: RuleKind,
        details: Map<String, JsonValue>,
        #[serde(default)]
        expires_at: Option<NaiveDateTime>,
    },
}

/// 动作类别（无负载）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixActionKind {
    Reassign,
    Unschedule,
    Reschedule,
    AssignSupervisor,
    Ignore,
}

impl fmt::Display for FixActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FixActionKind::Reassign => "reassign",
            FixActionKind::Unschedule => "unschedule",
            FixActionKind::Reschedule => "reschedule",
            FixActionKind::AssignSupervisor => "assign_supervisor",
            FixActionKind::Ignore => "ignore",
        };
        write!(f, "{}", s)
    }
}

impl FixAction {
    pub fn kind(&self) -> FixActionKind {
        match self {
            FixAction::Reassign { .. } => FixActionKind::Reassign,
            FixAction::Unschedule { .. } => FixActionKind::Unschedule,
            FixAction::Reschedule { .. } => FixActionKind::Reschedule,
            FixAction::AssignSupervisor { .. } => FixActionKind::AssignSupervisor,
            FixAction::Ignore { .. } => FixActionKind::Ignore,
        }
    }

    /// 针对某问题的忽略动作
    pub fn ignore(issue: &Issue) -> Self {
        FixAction::Ignore {
            rule: issue.rule,
            details: issue.details.clone(),
            expires_at: None,
        }
    }

    /// 从 (动作名, 目标 JSON) 组装动作
    ///
    /// # 返回
    /// - Err(String): 动作名未知或目标字段缺失
    pub fn from_parts(action_kind: &str, target: JsonValue) -> Result<Self, String> {
        let mut object = match target {
            JsonValue::Object(map) => map,
            JsonValue::Null => Map::new(),
            other => return Err(format!("fix target must be an object, got {}", other)),
        };
        object.insert(
            "action".to_string(),
            JsonValue::String(action_kind.trim().to_lowercase()),
        );
        serde_json::from_value(JsonValue::Object(object))
            .map_err(|e| format!("invalid fix action '{}': {}", action_kind, e))
    }
}

// ==========================================
// FixOption - 修复建议
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixOption {
    pub action: FixAction,
    pub description: String,
    /// 0-100 启发式置信度
    pub confidence: u8,
    pub recommended: bool,
}

impl FixOption {
    pub fn new(action: FixAction, description: impl Into<String>, confidence: u8) -> Self {
        Self {
            action,
            description: description.into(),
            confidence: confidence.min(100),
            recommended: false,
        }
    }
}

// ==========================================
// FixableIssue - 问题 + 修复菜单
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixableIssue {
    pub issue: Issue,
    pub issue_hash: String,
    pub options: Vec<FixOption>,
}

// ==========================================
// FixOutcome - 修复执行结果
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixOutcome {
    pub success: bool,
    pub message: String,
    pub operation_id: String,
    pub action: Option<FixActionKind>,
    pub affected_assignment_ids: Vec<i64>,
    pub created_assignment_id: Option<i64>,
}

impl FixOutcome {
    pub fn failure(operation_id: String, action: Option<FixActionKind>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            operation_id,
            action,
            affected_assignment_ids: Vec::new(),
            created_assignment_id: None,
        }
    }
}

// ==========================================
// SuppressedIssue - 已忽略问题
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuppressedIssue {
    pub issue_hash: String,
    pub rule_name: String,
    pub details: Map<String, JsonValue>,
    pub suppressed_at: NaiveDateTime,
    pub expires_at: Option<NaiveDateTime>,
}
