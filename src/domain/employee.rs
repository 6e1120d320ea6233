// ==========================================
// 门店活动排班校验系统 - 员工与可用性领域模型
// ==========================================
// 优先级: 请假 > 日期覆盖 > 每周模式
// ==========================================

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::domain::types::EmployeeRole;

// ==========================================
// Employee - 员工
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Employee {
    pub employee_id: String,
    pub name: String,
    pub role: EmployeeRole,
    pub is_active: bool,
}

// ==========================================
// WeeklyAvailability - 每周可用模式
// ==========================================
// 下标: 0=周一 .. 6=周日
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyAvailability {
    pub days: [bool; 7],
}

impl Default for WeeklyAvailability {
    fn default() -> Self {
        Self { days: [true; 7] }
    }
}

impl WeeklyAvailability {
    pub fn is_available(&self, weekday: Weekday) -> bool {
        self.days[weekday.num_days_from_monday() as usize]
    }
}

// ==========================================
// AvailabilityOverride - 日期区间覆盖
// ==========================================
// None 表示该星期几沿用每周模式
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityOverride {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days: [Option<bool>; 7],
    pub reason: Option<String>,
}

impl AvailabilityOverride {
    /// 覆盖在该日期上的取值
    pub fn value_on(&self, date: NaiveDate) -> Option<bool> {
        if date < self.start_date || date > self.end_date {
            return None;
        }
        self.days[date.weekday().num_days_from_monday() as usize]
    }
}

// ==========================================
// TimeOff - 请假区间（闭区间）
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeOff {
    pub time_off_id: i64,
    pub employee_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: Option<String>,
}

impl TimeOff {
    pub fn covers(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date <= self.end_date
    }
}

// ==========================================
// AvailabilityProfile - 单个员工的完整可用性
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AvailabilityProfile {
    /// 未配置每周模式时视为全周可用
    pub weekly: Option<WeeklyAvailability>,
    pub overrides: Vec<AvailabilityOverride>,
    pub time_off: Vec<TimeOff>,
}

/// 可用性判定结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AvailabilityVerdict {
    Available,
    TimeOff { time_off_id: i64, start_date: NaiveDate, end_date: NaiveDate },
    OverrideUnavailable,
    WeeklyUnavailable,
}

impl AvailabilityVerdict {
    pub fn is_available(&self) -> bool {
        matches!(self, AvailabilityVerdict::Available)
    }
}

impl AvailabilityProfile {
    /// 覆盖该日期的请假记录
    pub fn time_off_on(&self, date: NaiveDate) -> Option<&TimeOff> {
        self.time_off.iter().find(|t| t.covers(date))
    }

    /// 判定某日可用性（请假优先，其次覆盖，最后每周模式）
    pub fn verdict_on(&self, date: NaiveDate) -> AvailabilityVerdict {
        if let Some(t) = self.time_off_on(date) {
            return AvailabilityVerdict::TimeOff {
                time_off_id: t.time_off_id,
                start_date: t.start_date,
                end_date: t.end_date,
            };
        }

        // 多条覆盖时后录入者优先
        if let Some(value) = self.overrides.iter().rev().find_map(|o| o.value_on(date)) {
            return if value {
                AvailabilityVerdict::Available
            } else {
                AvailabilityVerdict::OverrideUnavailable
            };
        }

        match self.weekly {
            Some(w) if !w.is_available(date.weekday()) => AvailabilityVerdict::WeeklyUnavailable,
            _ => AvailabilityVerdict::Available,
        }
    }
}
