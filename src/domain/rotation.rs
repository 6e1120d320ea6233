// ==========================================
// 门店活动排班校验系统 - 轮值领域模型
// ==========================================
// 规则: 日期例外 > 星期轮值
// ==========================================

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::types::RotationKind;

/// 星期轮值（day_of_week: 0=周一 .. 6=周日）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationSlot {
    pub kind: RotationKind,
    pub day_of_week: u32,
    pub employee_id: String,
}

/// 指定日期的轮值例外
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationException {
    pub kind: RotationKind,
    pub exception_date: NaiveDate,
    pub employee_id: String,
    pub reason: Option<String>,
}

// ==========================================
// RotationTable - 轮值查询表
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct RotationTable {
    slots: HashMap<(RotationKind, u32), String>,
    exceptions: HashMap<(RotationKind, NaiveDate), String>,
}

impl RotationTable {
    pub fn new(slots: Vec<RotationSlot>, exceptions: Vec<RotationException>) -> Self {
        Self {
            slots: slots
                .into_iter()
                .map(|s| ((s.kind, s.day_of_week), s.employee_id))
                .collect(),
            exceptions: exceptions
                .into_iter()
                .map(|e| ((e.kind, e.exception_date), e.employee_id))
                .collect(),
        }
    }

    /// 该轮值是否配置了任意一天
    pub fn is_configured(&self, kind: RotationKind) -> bool {
        self.slots.keys().any(|(k, _)| *k == kind) || self.exceptions.keys().any(|(k, _)| *k == kind)
    }

    /// 某日轮值员工
    pub fn employee_for(&self, kind: RotationKind, date: NaiveDate) -> Option<&str> {
        if let Some(emp) = self.exceptions.get(&(kind, date)) {
            return Some(emp.as_str());
        }
        self.slots
            .get(&(kind, date.weekday().num_days_from_monday()))
            .map(|s| s.as_str())
    }
}
