// ==========================================
// 门店活动排班校验系统 - 校验参数快照
// ==========================================
// 由 ConfigManager 从 config_kv 加载并缓存
// ==========================================

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::fix_policy::FixPolicy;
use crate::domain::types::EventType;

/// 默认 Core 时段
pub const DEFAULT_CORE_SLOTS: &[&str] = &["10:15", "10:45", "11:15", "11:45"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleSettings {
    /// Core 有效时段（升序）
    pub core_slots: Vec<NaiveTime>,

    /// 补配 Supervisor 相对 Core 开始的偏移（分钟）
    pub supervisor_offset_minutes: i64,

    /// 每周 Core 上限
    pub weekly_core_cap: usize,

    /// 每周 Juicer 上限
    pub weekly_juicer_cap: usize,

    /// 数据过期阈值（小时）
    pub stale_sync_hours: i64,

    /// 同一时间出现多少天给出提示
    pub repeated_time_min_days: usize,

    /// 单时段过载阈值（与空时段同时出现时告警）
    pub slot_overload_threshold: usize,

    /// 各活动类型默认时长（分钟）
    pub default_durations: HashMap<EventType, i64>,

    /// 修复置信度策略
    pub fix_policy: FixPolicy,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            core_slots: DEFAULT_CORE_SLOTS
                .iter()
                .filter_map(|s| NaiveTime::parse_from_str(s, "%H:%M").ok())
                .collect(),
            supervisor_offset_minutes: 30,
            weekly_core_cap: 6,
            weekly_juicer_cap: 5,
            stale_sync_hours: 24,
            repeated_time_min_days: 4,
            slot_overload_threshold: 3,
            default_durations: default_durations(),
            fix_policy: FixPolicy::default(),
        }
    }
}

impl ScheduleSettings {
    /// 活动时长: 优先使用活动自身预计时长
    pub fn duration_minutes(&self, event_type: EventType, estimated: Option<i64>) -> i64 {
        match estimated {
            Some(m) if m > 0 => m,
            _ => self.default_durations.get(&event_type).copied().unwrap_or(60),
        }
    }

    /// 时间是否为有效 Core 时段
    pub fn is_core_slot(&self, time: NaiveTime) -> bool {
        self.core_slots.contains(&time)
    }

    /// 首个 Core 时段
    pub fn first_core_slot(&self) -> Option<NaiveTime> {
        self.core_slots.first().copied()
    }

    /// 时段序号（1 起）作为 shift_block
    pub fn shift_block_for(&self, time: NaiveTime) -> Option<i32> {
        self.core_slots
            .iter()
            .position(|s| *s == time)
            .map(|idx| idx as i32 + 1)
    }
}

fn default_durations() -> HashMap<EventType, i64> {
    let mut m = HashMap::new();
    m.insert(EventType::Core, 390);
    m.insert(EventType::Supervisor, 60);
    m.insert(EventType::JuicerProduction, 540);
    m.insert(EventType::JuicerSurvey, 300);
    m.insert(EventType::JuicerDeepClean, 240);
    m.insert(EventType::DigitalSetup, 15);
    m.insert(EventType::DigitalRefresh, 15);
    m.insert(EventType::DigitalTeardown, 15);
    m.insert(EventType::Freeosk, 15);
    m.insert(EventType::Other, 60);
    m
}
