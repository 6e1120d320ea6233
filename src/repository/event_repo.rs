// ==========================================
// 门店活动排班校验系统 - 活动窗口仓储
// ==========================================
// 表: event_window
// 写入仅限: condition / is_scheduled 状态切换（修复与审批路径）
// ==========================================

use chrono::NaiveDate;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::domain::schedule::EventWindow;
use crate::domain::types::{EventCondition, EventType};
use crate::repository::db_utils::{fmt_date, fmt_datetime, parse_datetime_col, parse_enum_col};
use crate::repository::error::{RepositoryError, RepositoryResult};

const EVENT_COLUMNS: &str = "event_ref, project_name, event_type, start_datetime, due_datetime, \
                             estimated_minutes, condition, is_scheduled";

// ==========================================
// EventRepository - 活动仓储
// ==========================================
pub struct EventRepository {
    conn: Arc<Mutex<Connection>>,
}

impl EventRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn find_by_ref(&self, event_ref: i64) -> RepositoryResult<Option<EventWindow>> {
        let conn = self.get_conn()?;
        select_event(&conn, event_ref)
    }

    pub fn upsert(&self, event: &EventWindow) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT OR REPLACE INTO event_window
                (event_ref, project_name, event_type, start_datetime, due_datetime,
                 estimated_minutes, condition, is_scheduled)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                event.event_ref,
                event.project_name,
                event.event_type.to_db_str(),
                fmt_datetime(event.start_datetime),
                fmt_datetime(event.due_datetime),
                event.estimated_minutes,
                event.condition.to_db_str(),
                event.is_scheduled as i32,
            ],
        )?;
        Ok(())
    }

    pub fn set_condition(&self, event_ref: i64, condition: EventCondition) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        update_event_condition(&conn, event_ref, condition)
    }
}

// ==========================================
// 连接级查询（供事务内复用）
// ==========================================

fn map_event(row: &Row) -> rusqlite::Result<EventWindow> {
    let event_type: String = row.get(2)?;
    let condition: String = row.get(6)?;
    Ok(EventWindow {
        event_ref: row.get(0)?,
        project_name: row.get(1)?,
        event_type: parse_enum_col(2, &event_type, EventType::from_db_str)?,
        start_datetime: parse_datetime_col(3, &row.get::<_, String>(3)?)?,
        due_datetime: parse_datetime_col(4, &row.get::<_, String>(4)?)?,
        estimated_minutes: row.get(5)?,
        condition: parse_enum_col(6, &condition, EventCondition::from_db_str)?,
        is_scheduled: row.get::<_, i32>(7)? != 0,
    })
}

pub fn select_event(conn: &Connection, event_ref: i64) -> RepositoryResult<Option<EventWindow>> {
    let event = conn
        .query_row(
            &format!("SELECT {} FROM event_window WHERE event_ref = ?1", EVENT_COLUMNS),
            params![event_ref],
            map_event,
        )
        .optional()?;
    Ok(event)
}

pub fn select_events_by_refs(
    conn: &Connection,
    event_refs: &[i64],
) -> RepositoryResult<HashMap<i64, EventWindow>> {
    if event_refs.is_empty() {
        return Ok(HashMap::new());
    }
    let placeholders = vec!["?"; event_refs.len()].join(", ");
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM event_window WHERE event_ref IN ({})",
        EVENT_COLUMNS, placeholders
    ))?;
    let events = stmt
        .query_map(params_from_iter(event_refs.iter()), map_event)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(events.into_iter().map(|e| (e.event_ref, e)).collect())
}

/// 窗口与 [start, end] 相交的活动
pub fn select_events_overlapping(
    conn: &Connection,
    start: NaiveDate,
    end: NaiveDate,
) -> RepositoryResult<Vec<EventWindow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM event_window \
         WHERE date(start_datetime) <= ?2 AND date(due_datetime) >= ?1 \
         ORDER BY start_datetime, event_ref",
        EVENT_COLUMNS
    ))?;
    let events = stmt
        .query_map(params![fmt_date(start), fmt_date(end)], map_event)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(events)
}

/// 按活动编号和类型查找活动（项目名称包含编号）
pub fn select_events_by_number(
    conn: &Connection,
    event_number: &str,
    event_type: EventType,
) -> RepositoryResult<Vec<EventWindow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM event_window WHERE event_type = ?1 AND instr(project_name, ?2) > 0 \
         ORDER BY event_ref",
        EVENT_COLUMNS
    ))?;
    let events = stmt
        .query_map(params![event_type.to_db_str(), event_number], map_event)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(events)
}

/// 更新活动状态；Scheduled 同步置位 is_scheduled
pub fn update_event_condition(
    conn: &Connection,
    event_ref: i64,
    condition: EventCondition,
) -> RepositoryResult<()> {
    let is_scheduled = matches!(condition, EventCondition::Scheduled) as i32;
    let changed = conn.execute(
        "UPDATE event_window SET condition = ?2, is_scheduled = ?3 WHERE event_ref = ?1",
        params![event_ref, condition.to_db_str(), is_scheduled],
    )?;
    if changed == 0 {
        return Err(RepositoryError::not_found("event_window", event_ref));
    }
    Ok(())
}

