// ==========================================
// 门店活动排班校验系统 - 配置层
// ==========================================
// 职责: 校验参数加载、缓存、覆写
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod fix_policy;
pub mod settings;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigError, ConfigManager, ConfigResult};
pub use fix_policy::FixPolicy;
pub use settings::{ScheduleSettings, DEFAULT_CORE_SLOTS};
