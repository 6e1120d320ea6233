// ==========================================
// 门店活动排班校验系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// 约定: 每个仓储同时暴露 `select_*/insert_*/update_*` 连接级函数,
//       供修复/审批服务在同一事务内组合调用
// ==========================================

pub mod assignment_repo;
pub mod db_utils;
pub mod employee_repo;
pub mod error;
pub mod event_repo;
pub mod proposal_repo;
pub mod rotation_repo;
pub mod suppression_repo;
pub mod sync_state_repo;

// 重导出核心仓储
pub use assignment_repo::AssignmentRepository;
pub use employee_repo::EmployeeRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use event_repo::EventRepository;
pub use proposal_repo::ProposalRepository;
pub use rotation_repo::RotationRepository;
pub use suppression_repo::SuppressionRepository;
pub use sync_state_repo::{SyncStateRepository, SCHEDULE_SYNC_KEY};
