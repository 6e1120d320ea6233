// ==========================================
// 门店活动排班校验系统 - 引擎层仓储聚合
// ==========================================
// 职责: 聚合校验/修复引擎所需的所有 Repository
// 约定: 构造时注入一次，引擎间共享同一连接
// ==========================================

use chrono::NaiveDate;
use rusqlite::Connection;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::engine::snapshot::ScheduleSnapshot;
use crate::repository::{
    AssignmentRepository, EmployeeRepository, EventRepository, ProposalRepository,
    RepositoryError, RepositoryResult, RotationRepository, SuppressionRepository,
    SyncStateRepository,
};

/// 校验引擎仓储集合
///
/// 聚合排班校验所需的所有 Repository，简化依赖注入。
///
/// # 包含的仓储
/// - `assignment_repo`: 已提交排班
/// - `proposal_repo`: 待审批提案
/// - `event_repo`: 活动窗口
/// - `employee_repo`: 员工与可用性
/// - `rotation_repo`: 轮值表
/// - `suppression_repo`: 已忽略问题
/// - `sync_state_repo`: 外部同步状态
#[derive(Clone)]
pub struct ValidationRepositories {
    conn: Arc<Mutex<Connection>>,
    pub assignment_repo: Arc<AssignmentRepository>,
    pub proposal_repo: Arc<ProposalRepository>,
    pub event_repo: Arc<EventRepository>,
    pub employee_repo: Arc<EmployeeRepository>,
    pub rotation_repo: Arc<RotationRepository>,
    pub suppression_repo: Arc<SuppressionRepository>,
    pub sync_state_repo: Arc<SyncStateRepository>,
}

impl ValidationRepositories {
    /// 基于同一连接创建全部仓储
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self {
            assignment_repo: Arc::new(AssignmentRepository::new(conn.clone())),
            proposal_repo: Arc::new(ProposalRepository::new(conn.clone())),
            event_repo: Arc::new(EventRepository::new(conn.clone())),
            employee_repo: Arc::new(EmployeeRepository::new(conn.clone())),
            rotation_repo: Arc::new(RotationRepository::new(conn.clone())),
            suppression_repo: Arc::new(SuppressionRepository::new(conn.clone())),
            sync_state_repo: Arc::new(SyncStateRepository::new(conn.clone())),
            conn,
        }
    }

    /// 获取连接锁
    ///
    /// 持锁期间不得再调用任何仓储方法（同一 Mutex 不可重入）
    pub fn lock_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 一次加锁读取 [start, end] 的排班快照
    pub fn load_snapshot(&self, start: NaiveDate, end: NaiveDate) -> RepositoryResult<ScheduleSnapshot> {
        let conn = self.lock_conn()?;
        ScheduleSnapshot::load(&conn, start, end)
    }
}
