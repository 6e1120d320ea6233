// ==========================================
// 门店活动排班校验系统 - 配置管理器
// ==========================================
// 职责: 配置加载、缓存、覆写
// 存储: config_kv 表 (key-value)
// 缓存: 显式 invalidate()，无进程级全局状态
// ==========================================

use chrono::NaiveTime;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::fix_policy::FixPolicy;
use crate::config::settings::ScheduleSettings;
use crate::domain::types::EventType;

/// 配置层错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("配置读取失败: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("配置锁获取失败: {0}")]
    LockError(String),

    #[error("配置值无效 (key={key}): {message}")]
    InvalidValue { key: String, message: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
    cache: Mutex<Option<Arc<ScheduleSettings>>>,
}

impl ConfigManager {
    /// 从已有连接创建 ConfigManager
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self {
            conn,
            cache: Mutex::new(None),
        }
    }

    /// 获取当前配置快照（首次访问时从 config_kv 加载）
    pub fn settings(&self) -> ConfigResult<Arc<ScheduleSettings>> {
        let mut cache = self
            .cache
            .lock()
            .map_err(|e| ConfigError::LockError(e.to_string()))?;

        if let Some(settings) = cache.as_ref() {
            return Ok(Arc::clone(settings));
        }

        let settings = Arc::new(self.load_settings()?);
        debug!(core_slots = settings.core_slots.len(), "配置已加载");
        *cache = Some(Arc::clone(&settings));
        Ok(settings)
    }

    /// 丢弃缓存，下次访问重新加载
    pub fn invalidate(&self) {
        match self.cache.lock() {
            Ok(mut cache) => {
                *cache = None;
                info!("配置缓存已失效");
            }
            Err(e) => warn!("配置缓存失效失败: {}", e),
        }
    }

    /// 写入配置值并使缓存失效
    pub fn set_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        {
            let conn = self
                .conn
                .lock()
                .map_err(|e| ConfigError::LockError(e.to_string()))?;
            conn.execute(
                "INSERT INTO config_kv (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
                params![key, value],
            )?;
        }
        self.invalidate();
        Ok(())
    }

    /// 读取原始配置值
    pub fn get_value(&self, key: &str) -> ConfigResult<Option<String>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| ConfigError::LockError(e.to_string()))?;
        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn load_settings(&self) -> ConfigResult<ScheduleSettings> {
        let mut settings = ScheduleSettings::default();

        if let Some(raw) = self.get_value(config_keys::CORE_SLOTS)? {
            settings.core_slots = parse_slot_list(config_keys::CORE_SLOTS, &raw)?;
        }
        if let Some(v) = self.get_parsed::<i64>(config_keys::SUPERVISOR_OFFSET_MINUTES)? {
            settings.supervisor_offset_minutes = v;
        }
        if let Some(v) = self.get_parsed::<usize>(config_keys::WEEKLY_CORE_CAP)? {
            settings.weekly_core_cap = v;
        }
        if let Some(v) = self.get_parsed::<usize>(config_keys::WEEKLY_JUICER_CAP)? {
            settings.weekly_juicer_cap = v;
        }
        if let Some(v) = self.get_parsed::<i64>(config_keys::STALE_SYNC_HOURS)? {
            settings.stale_sync_hours = v;
        }
        if let Some(v) = self.get_parsed::<usize>(config_keys::REPEATED_TIME_MIN_DAYS)? {
            settings.repeated_time_min_days = v;
        }
        if let Some(v) = self.get_parsed::<usize>(config_keys::SLOT_OVERLOAD_THRESHOLD)? {
            settings.slot_overload_threshold = v;
        }
        if let Some(raw) = self.get_value(config_keys::EVENT_DURATIONS)? {
            let overrides: HashMap<String, i64> =
                serde_json::from_str(&raw).map_err(|e| invalid(config_keys::EVENT_DURATIONS, e))?;
            for (name, minutes) in overrides {
                match EventType::from_db_str(&name) {
                    Some(t) => {
                        settings.default_durations.insert(t, minutes);
                    }
                    None => warn!(event_type = %name, "未知活动类型的时长配置，已忽略"),
                }
            }
        }
        if let Some(raw) = self.get_value(config_keys::FIX_POLICY)? {
            settings.fix_policy = serde_json::from_str::<FixPolicy>(&raw)
                .map_err(|e| invalid(config_keys::FIX_POLICY, e))?;
        }

        Ok(settings)
    }

    fn get_parsed<T>(&self, key: &str) -> ConfigResult<Option<T>>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get_value(key)? {
            Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| invalid(key, e)),
            None => Ok(None),
        }
    }
}

fn invalid(key: &str, err: impl std::fmt::Display) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: err.to_string(),
    }
}

/// 解析时段列表：JSON 数组 ["10:15", ...] 或逗号分隔，结果升序去重
fn parse_slot_list(key: &str, raw: &str) -> ConfigResult<Vec<NaiveTime>> {
    let items: Vec<String> = if raw.trim_start().starts_with('[') {
        serde_json::from_str(raw).map_err(|e| invalid(key, e))?
    } else {
        raw.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect()
    };

    let mut slots = items
        .iter()
        .map(|s| {
            NaiveTime::parse_from_str(s, "%H:%M")
                .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
                .map_err(|e| invalid(key, format!("{} ({})", e, s)))
        })
        .collect::<ConfigResult<Vec<_>>>()?;
    slots.sort();
    slots.dedup();

    if slots.is_empty() {
        return Err(invalid(key, "at least one slot is required"));
    }
    Ok(slots)
}

// ==========================================
// 配置键
// ==========================================
pub mod config_keys {
    // 时段
    pub const CORE_SLOTS: &str = "core_slots";
    pub const SUPERVISOR_OFFSET_MINUTES: &str = "supervisor_offset_minutes";
    pub const SLOT_OVERLOAD_THRESHOLD: &str = "slot_overload_threshold";

    // 周上限
    pub const WEEKLY_CORE_CAP: &str = "weekly_core_cap";
    pub const WEEKLY_JUICER_CAP: &str = "weekly_juicer_cap";

    // 数据新鲜度
    pub const STALE_SYNC_HOURS: &str = "stale_sync_hours";

    // 提示
    pub const REPEATED_TIME_MIN_DAYS: &str = "repeated_time_min_days";

    // 活动时长 (JSON: {"CORE": 390, ...})
    pub const EVENT_DURATIONS: &str = "event_durations";

    // 修复置信度策略 (JSON)
    pub const FIX_POLICY: &str = "fix_policy";
}
