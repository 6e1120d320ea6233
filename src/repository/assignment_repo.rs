// ==========================================
// 门店活动排班校验系统 - 排班仓储
// ==========================================
// 表: assignment
// 红线: 多表写入必须在事务中完成（由修复/审批服务开启事务）
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::domain::schedule::{Assignment, NewAssignment};
use crate::domain::types::{EventType, SyncStatus};
use crate::repository::db_utils::{fmt_date, fmt_datetime, parse_datetime_col};
use crate::repository::error::{RepositoryError, RepositoryResult};

const ASSIGNMENT_COLUMNS: &str =
    "a.assignment_id, a.event_ref, a.employee_id, a.schedule_datetime, a.shift_block, a.sync_status";

// ==========================================
// AssignmentRepository - 排班仓储
// ==========================================
pub struct AssignmentRepository {
    conn: Arc<Mutex<Connection>>,
}

impl AssignmentRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 员工历史上各活动类型的排班次数 (employee_id -> count)
    pub fn count_by_event_type(&self, event_type: EventType) -> RepositoryResult<HashMap<String, i64>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT a.employee_id, COUNT(*)
            FROM assignment a
            JOIN event_window e ON e.event_ref = a.event_ref
            WHERE e.event_type = ?1
            GROUP BY a.employee_id
            "#,
        )?;
        let rows = stmt
            .query_map(params![event_type.to_db_str()], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<rusqlite::Result<HashMap<_, _>>>()?;
        Ok(rows)
    }

    /// 已有任意排班的某类型活动（不限日期）
    pub fn staffed_event_refs(&self, event_type: EventType) -> RepositoryResult<HashSet<i64>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT DISTINCT a.event_ref
            FROM assignment a
            JOIN event_window e ON e.event_ref = a.event_ref
            WHERE e.event_type = ?1
            "#,
        )?;
        let refs = stmt
            .query_map(params![event_type.to_db_str()], |row| row.get::<_, i64>(0))?
            .collect::<rusqlite::Result<HashSet<_>>>()?;
        Ok(refs)
    }

    pub fn insert(&self, new: &NewAssignment) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        insert_assignment(&conn, new)
    }
}

// ==========================================
// 连接级操作（供事务内复用）
// ==========================================

fn map_assignment(row: &Row) -> rusqlite::Result<Assignment> {
    Ok(Assignment {
        assignment_id: row.get(0)?,
        event_ref: row.get(1)?,
        employee_id: row.get(2)?,
        schedule_datetime: parse_datetime_col(3, &row.get::<_, String>(3)?)?,
        shift_block: row.get(4)?,
        sync_status: SyncStatus::from_db_str(&row.get::<_, String>(5)?),
    })
}

pub fn select_assignment(conn: &Connection, assignment_id: i64) -> RepositoryResult<Option<Assignment>> {
    let assignment = conn
        .query_row(
            &format!("SELECT {} FROM assignment a WHERE a.assignment_id = ?1", ASSIGNMENT_COLUMNS),
            params![assignment_id],
            map_assignment,
        )
        .optional()?;
    Ok(assignment)
}

pub fn select_assignments_in_range(
    conn: &Connection,
    start: NaiveDate,
    end: NaiveDate,
    employee_id: Option<&str>,
) -> RepositoryResult<Vec<Assignment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM assignment a \
         WHERE date(a.schedule_datetime) BETWEEN ?1 AND ?2 \
           AND (?3 IS NULL OR a.employee_id = ?3) \
         ORDER BY a.schedule_datetime, a.assignment_id",
        ASSIGNMENT_COLUMNS
    ))?;
    let rows = stmt
        .query_map(params![fmt_date(start), fmt_date(end), employee_id], map_assignment)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// 某活动的全部排班
pub fn select_assignments_for_event(conn: &Connection, event_ref: i64) -> RepositoryResult<Vec<Assignment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM assignment a WHERE a.event_ref = ?1 ORDER BY a.schedule_datetime",
        ASSIGNMENT_COLUMNS
    ))?;
    let rows = stmt
        .query_map(params![event_ref], map_assignment)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn insert_assignment(conn: &Connection, new: &NewAssignment) -> RepositoryResult<i64> {
    conn.execute(
        r#"
        INSERT INTO assignment (event_ref, employee_id, schedule_datetime, shift_block, sync_status)
        VALUES (?1, ?2, ?3, ?4, 'PENDING')
        "#,
        params![
            new.event_ref,
            new.employee_id,
            fmt_datetime(new.schedule_datetime),
            new.shift_block,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn update_assignment_employee(
    conn: &Connection,
    assignment_id: i64,
    employee_id: &str,
) -> RepositoryResult<()> {
    let changed = conn.execute(
        "UPDATE assignment SET employee_id = ?2, sync_status = 'PENDING' WHERE assignment_id = ?1",
        params![assignment_id, employee_id],
    )?;
    if changed == 0 {
        return Err(RepositoryError::not_found("assignment", assignment_id));
    }
    Ok(())
}

pub fn update_assignment_datetime(
    conn: &Connection,
    assignment_id: i64,
    schedule_datetime: NaiveDateTime,
) -> RepositoryResult<()> {
    let changed = conn.execute(
        "UPDATE assignment SET schedule_datetime = ?2, sync_status = 'PENDING' WHERE assignment_id = ?1",
        params![assignment_id, fmt_datetime(schedule_datetime)],
    )?;
    if changed == 0 {
        return Err(RepositoryError::not_found("assignment", assignment_id));
    }
    Ok(())
}

pub fn delete_assignment(conn: &Connection, assignment_id: i64) -> RepositoryResult<()> {
    let changed = conn.execute(
        "DELETE FROM assignment WHERE assignment_id = ?1",
        params![assignment_id],
    )?;
    if changed == 0 {
        return Err(RepositoryError::not_found("assignment", assignment_id));
    }
    Ok(())
}
