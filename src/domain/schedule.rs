// ==========================================
// 门店活动排班校验系统 - 排班领域模型
// ==========================================
// 实体: EventWindow / Assignment / Proposal
// 红线: 排班时间必须落在活动窗口 [start, due] 内
// ==========================================

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::domain::types::{EventCondition, EventType, ProposalStatus, SyncStatus};

/// 活动编号长度（嵌入在项目名称中，例如 "606001-Core-Super Pretzel"）
pub const EVENT_NUMBER_LEN: usize = 6;

/// 推导产品名时剥离的前后缀（小写比较）
const PRODUCT_AFFIXES: &[&str] = &["core", "supervisor", "demo", "(core)", "(supervisor)", "event"];

// ==========================================
// EventWindow - 活动窗口
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventWindow {
    pub event_ref: i64,                  // 活动引用号
    pub project_name: String,            // 项目名称（含活动编号）
    pub event_type: EventType,           // 活动类型
    pub start_datetime: NaiveDateTime,   // 窗口开始
    pub due_datetime: NaiveDateTime,     // 窗口截止
    pub estimated_minutes: Option<i64>,  // 预计时长（分钟）
    pub condition: EventCondition,       // 状态
    pub is_scheduled: bool,              // 是否已排班
}

impl EventWindow {
    /// 时间戳是否在窗口内（闭区间）
    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        ts >= self.start_datetime && ts <= self.due_datetime
    }

    /// 嵌入在项目名称中的活动编号
    pub fn event_number(&self) -> Option<String> {
        extract_event_number(&self.project_name)
    }

    /// 去除编号与类型前后缀后的产品名
    pub fn product_name(&self) -> String {
        derive_product_name(&self.project_name)
    }

    /// 窗口是否与日期区间 [start, end] 相交
    pub fn overlaps_dates(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.start_datetime.date() <= end && self.due_datetime.date() >= start
    }
}

/// 提取项目名称中第一段恰好 6 位的数字
pub fn extract_event_number(name: &str) -> Option<String> {
    let chars: Vec<char> = name.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i].is_ascii_digit() {
            let start = i;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            if i - start == EVENT_NUMBER_LEN {
                return Some(chars[start..i].iter().collect());
            }
        } else {
            i += 1;
        }
    }
    None
}

/// 推导产品名
///
/// # 规则
/// 1. 去掉活动编号
/// 2. 按分隔符切分, 去掉已知前后缀 (Core / Supervisor / Demo ...)
/// 3. 小写、合并空白
pub fn derive_product_name(name: &str) -> String {
    let without_number = match extract_event_number(name) {
        Some(num) => name.replacen(&num, " ", 1),
        None => name.to_string(),
    };

    let mut parts: Vec<String> = without_number
        .split(['-', '_', '|'])
        .map(|p| p.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase())
        .filter(|p| !p.is_empty())
        .collect();

    while parts.first().map_or(false, |p| PRODUCT_AFFIXES.contains(&p.as_str())) {
        parts.remove(0);
    }
    while parts.last().map_or(false, |p| PRODUCT_AFFIXES.contains(&p.as_str())) {
        parts.pop();
    }

    let joined = parts.join(" ");
    // 剥离词尾的 "core" 等后缀（如 "super pretzel core"）
    let mut words: Vec<&str> = joined.split_whitespace().collect();
    while words.len() > 1 && words.last().map_or(false, |w| PRODUCT_AFFIXES.contains(w)) {
        words.pop();
    }
    words.join(" ")
}

// ==========================================
// Assignment - 已提交排班
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub assignment_id: i64,                // 排班ID
    pub event_ref: i64,                    // 关联活动
    pub employee_id: String,               // 员工ID
    pub schedule_datetime: NaiveDateTime,  // 排班时间
    pub shift_block: Option<i32>,          // 班次块标记
    pub sync_status: SyncStatus,           // 外部同步状态
}

impl Assignment {
    pub fn date(&self) -> NaiveDate {
        self.schedule_datetime.date()
    }

    pub fn clock_time(&self) -> NaiveTime {
        self.schedule_datetime.time()
    }
}

/// 新建排班（尚无ID）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAssignment {
    pub event_ref: i64,
    pub employee_id: String,
    pub schedule_datetime: NaiveDateTime,
    pub shift_block: Option<i32>,
}

// ==========================================
// Proposal - 排班提案
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposal {
    pub proposal_id: i64,
    pub run_id: String,
    pub event_ref: i64,
    pub employee_id: Option<String>,
    pub schedule_datetime: Option<NaiveDateTime>,
    pub shift_block: Option<i32>,
    pub status: ProposalStatus,
    pub failure_reason: Option<String>,
}

impl Proposal {
    /// 提案可参与校验: 状态有效且员工与时间均已设置
    pub fn is_active(&self) -> bool {
        self.status.is_active() && self.employee_id.is_some() && self.schedule_datetime.is_some()
    }
}

// ==========================================
// ScheduleRecord - 合并视图（已提交 + 待审批）
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordSource {
    Committed,
    Pending,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleRecord {
    pub source: RecordSource,
    pub record_id: i64, // assignment_id 或 proposal_id
    pub event_ref: i64,
    pub employee_id: String,
    pub schedule_datetime: NaiveDateTime,
    pub event_type: EventType,
    pub project_name: String,
    pub duration_minutes: i64,
}

impl ScheduleRecord {
    pub fn end_datetime(&self) -> NaiveDateTime {
        self.schedule_datetime + Duration::minutes(self.duration_minutes)
    }

    pub fn date(&self) -> NaiveDate {
        self.schedule_datetime.date()
    }

    /// 详情键: committed → assignment_id, pending → proposal_id
    pub fn id_key(&self) -> &'static str {
        match self.source {
            RecordSource::Committed => "assignment_id",
            RecordSource::Pending => "proposal_id",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_event_number() {
        assert_eq!(extract_event_number("606001-Core-Super Pretzel"), Some("606001".to_string()));
        assert_eq!(extract_event_number("Supervisor 606001 Pretzel"), Some("606001".to_string()));
        assert_eq!(extract_event_number("12-34 Snack 2024"), None);
        assert_eq!(extract_event_number("No number here"), None);
    }

    #[test]
    fn test_derive_product_name_strips_affixes() {
        assert_eq!(derive_product_name("606001-Core-Super Pretzel"), "super pretzel");
        assert_eq!(derive_product_name("606002-Super Pretzel-Core"), "super pretzel");
        assert_eq!(derive_product_name("606003 Super  Pretzel Core"), "super pretzel");
        assert_ne!(derive_product_name("606004-Core-Cheese Bites"), "super pretzel");
    }
}
