// ==========================================
// 门店活动排班校验系统 - API 层
// ==========================================
// 职责: 提供业务 API 接口，供 CLI 及上层应用调用
// ==========================================

pub mod error;
pub mod validation_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use validation_api::{default_db_path, ScheduleValidationApi};
