// ==========================================
// 门店活动排班校验系统 - 引擎层错误类型
// ==========================================
// 规则违反不走错误通道，一律以 Issue 返回
// 此处承载基础设施错误与修复/审批的前置条件失败
// ==========================================

use thiserror::Error;

use crate::config::ConfigError;
use crate::repository::error::RepositoryError;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("无效输入: {0}")]
    InvalidInput(String),

    /// 动作前置条件不满足（消息直接面向调用方）
    #[error("{0}")]
    Rejected(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
