// ==========================================
// 门店活动排班校验系统 - 排班提案仓储
// ==========================================
// 表: proposal
// 生命周期: PROPOSED → USER_EDITED → API_SUBMITTED / API_FAILED / VALIDATION_FAILED
// ==========================================

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::domain::schedule::Proposal;
use crate::domain::types::ProposalStatus;
use crate::repository::db_utils::{fmt_date, fmt_datetime, parse_enum_col, parse_opt_datetime_col};
use crate::repository::error::{RepositoryError, RepositoryResult};

const PROPOSAL_COLUMNS: &str = "proposal_id, run_id, event_ref, employee_id, schedule_datetime, \
                                shift_block, status, failure_reason";

// ==========================================
// ProposalRepository - 提案仓储
// ==========================================
pub struct ProposalRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ProposalRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 某次运行的全部提案
    pub fn list_for_run(&self, run_id: &str) -> RepositoryResult<Vec<Proposal>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM proposal WHERE run_id = ?1 ORDER BY proposal_id",
            PROPOSAL_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![run_id], map_proposal)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// 某次运行中参与校验的提案
    ///
    /// 条件: 状态为 PROPOSED/USER_EDITED、员工与时间均已设置、日期在 [start, end]
    pub fn list_active_for_run(
        &self,
        run_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> RepositoryResult<Vec<Proposal>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM proposal \
             WHERE run_id = ?1 \
               AND status IN ('PROPOSED', 'USER_EDITED') \
               AND employee_id IS NOT NULL \
               AND schedule_datetime IS NOT NULL \
               AND date(schedule_datetime) BETWEEN ?2 AND ?3 \
             ORDER BY schedule_datetime, proposal_id",
            PROPOSAL_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![run_id, fmt_date(start), fmt_date(end)], map_proposal)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn insert(&self, proposal: &Proposal) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO proposal
                (run_id, event_ref, employee_id, schedule_datetime, shift_block, status, failure_reason)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                proposal.run_id,
                proposal.event_ref,
                proposal.employee_id,
                proposal.schedule_datetime.map(fmt_datetime),
                proposal.shift_block,
                proposal.status.to_db_str(),
                proposal.failure_reason,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// 删除某次运行的全部未提交提案（拒绝运行）
    pub fn delete_pending_for_run(&self, run_id: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let deleted = conn.execute(
            "DELETE FROM proposal WHERE run_id = ?1 AND status IN ('PROPOSED', 'USER_EDITED')",
            params![run_id],
        )?;
        Ok(deleted)
    }
}

// ==========================================
// 连接级操作（供事务内复用）
// ==========================================

fn map_proposal(row: &Row) -> rusqlite::Result<Proposal> {
    let status: String = row.get(6)?;
    Ok(Proposal {
        proposal_id: row.get(0)?,
        run_id: row.get(1)?,
        event_ref: row.get(2)?,
        employee_id: row.get(3)?,
        schedule_datetime: parse_opt_datetime_col(4, row.get(4)?)?,
        shift_block: row.get(5)?,
        status: parse_enum_col(6, &status, ProposalStatus::from_db_str)?,
        failure_reason: row.get(7)?,
    })
}

pub fn select_proposal(conn: &Connection, proposal_id: i64) -> RepositoryResult<Option<Proposal>> {
    let proposal = conn
        .query_row(
            &format!("SELECT {} FROM proposal WHERE proposal_id = ?1", PROPOSAL_COLUMNS),
            params![proposal_id],
            map_proposal,
        )
        .optional()?;
    Ok(proposal)
}

/// 更新提案状态（仅允许从有效状态迁出）
pub fn update_proposal_status(
    conn: &Connection,
    proposal_id: i64,
    status: ProposalStatus,
    failure_reason: Option<&str>,
) -> RepositoryResult<()> {
    let changed = conn.execute(
        r#"
        UPDATE proposal SET status = ?2, failure_reason = ?3
        WHERE proposal_id = ?1 AND status IN ('PROPOSED', 'USER_EDITED')
        "#,
        params![proposal_id, status.to_db_str(), failure_reason],
    )?;
    if changed == 0 {
        let current = select_proposal(conn, proposal_id)?
            .ok_or_else(|| RepositoryError::not_found("proposal", proposal_id))?;
        return Err(RepositoryError::InvalidStateTransition {
            from: current.status.to_db_str().to_string(),
            to: status.to_db_str().to_string(),
        });
    }
    Ok(())
}
