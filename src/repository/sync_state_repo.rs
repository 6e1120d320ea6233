// ==========================================
// 门店活动排班校验系统 - 外部同步状态仓储
// ==========================================
// 表: sync_state
// 用途: 数据新鲜度检查（最后一次外部同步时间）
// ==========================================

use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::repository::db_utils::{fmt_datetime, parse_datetime_col};
use crate::repository::error::{RepositoryError, RepositoryResult};

/// 活动/排班数据的同步键
pub const SCHEDULE_SYNC_KEY: &str = "schedule";

pub struct SyncStateRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SyncStateRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn last_synced_at(&self, sync_key: &str) -> RepositoryResult<Option<NaiveDateTime>> {
        let conn = self.get_conn()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT synced_at FROM sync_state WHERE sync_key = ?1",
                params![sync_key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(raw.map(|s| parse_datetime_col(0, &s)).transpose()?)
    }

    pub fn record_sync(&self, sync_key: &str, synced_at: NaiveDateTime) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO sync_state (sync_key, synced_at) VALUES (?1, ?2)",
            params![sync_key, fmt_datetime(synced_at)],
        )?;
        Ok(())
    }
}
