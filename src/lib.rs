// ==========================================
// 门店活动排班校验系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 排班校验与修复向导 (人工最终控制权)
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 校验规则与修复
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{EmployeeRole, EventCondition, EventType, ProposalStatus, RotationKind};

// 领域实体
pub use domain::{
    Assignment, Employee, EventWindow, FixAction, FixOption, FixOutcome, FixableIssue, Issue,
    Proposal, RangeValidationResult, RuleKind, Severity, ValidationResult, ValidationStatus,
    WeeklyValidationResult,
};

// 引擎
pub use engine::{
    ApprovalService, DailyRuleEngine, FixApplier, FixOptionGenerator, RangeRuleEngine,
    WeeklyAggregator,
};

// API
pub use api::{ApiError, ApiResult, ScheduleValidationApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "门店活动排班校验系统";

// 数据库版本
pub const DB_VERSION: &str = "v0.1";
