// ==========================================
// 门店活动排班校验系统 - 轮值仓储
// ==========================================
// 表: rotation_slot / rotation_exception
// ==========================================

use chrono::NaiveDate;
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::domain::rotation::{RotationException, RotationSlot, RotationTable};
use crate::domain::types::RotationKind;
use crate::repository::db_utils::{fmt_date, parse_date_col, parse_enum_col};
use crate::repository::error::{RepositoryError, RepositoryResult};

pub struct RotationRepository {
    conn: Arc<Mutex<Connection>>,
}

impl RotationRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn set_slot(&self, kind: RotationKind, day_of_week: u32, employee_id: &str) -> RepositoryResult<()> {
        if day_of_week > 6 {
            return Err(RepositoryError::FieldValueError {
                field: "day_of_week".to_string(),
                message: format!("expected 0..=6, got {}", day_of_week),
            });
        }
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO rotation_slot (rotation_kind, day_of_week, employee_id) VALUES (?1, ?2, ?3)",
            params![kind.to_db_str(), day_of_week, employee_id],
        )?;
        Ok(())
    }

    pub fn add_exception(
        &self,
        kind: RotationKind,
        date: NaiveDate,
        employee_id: &str,
        reason: Option<&str>,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT OR REPLACE INTO rotation_exception (rotation_kind, exception_date, employee_id, reason)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![kind.to_db_str(), fmt_date(date), employee_id, reason],
        )?;
        Ok(())
    }
}

pub fn select_rotation_table(conn: &Connection) -> RepositoryResult<RotationTable> {
    let slots = {
        let mut stmt = conn.prepare(
            "SELECT rotation_kind, day_of_week, employee_id FROM rotation_slot ORDER BY rotation_kind, day_of_week",
        )?;
        let rows = stmt
            .query_map([], |row| {
                let kind: String = row.get(0)?;
                Ok(RotationSlot {
                    kind: parse_enum_col(0, &kind, RotationKind::from_db_str)?,
                    day_of_week: row.get(1)?,
                    employee_id: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows
    };

    let exceptions = {
        let mut stmt = conn.prepare(
            "SELECT rotation_kind, exception_date, employee_id, reason FROM rotation_exception",
        )?;
        let rows = stmt
            .query_map([], |row| {
                let kind: String = row.get(0)?;
                Ok(RotationException {
                    kind: parse_enum_col(0, &kind, RotationKind::from_db_str)?,
                    exception_date: parse_date_col(1, &row.get::<_, String>(1)?)?,
                    employee_id: row.get(2)?,
                    reason: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows
    };

    Ok(RotationTable::new(slots, exceptions))
}
