// ==========================================
// 门店活动排班校验系统 - 已忽略问题仓储
// ==========================================
// 表: suppressed_issue
// 键: SHA-256(rule_name + ":" + details_json)
// ==========================================

use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::{Map, Value as JsonValue};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::domain::fix::SuppressedIssue;
use crate::domain::issue::{issue_content_hash, RuleKind};
use crate::repository::db_utils::{fmt_datetime, parse_datetime_col, parse_opt_datetime_col};
use crate::repository::error::{RepositoryError, RepositoryResult};

pub struct SuppressionRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SuppressionRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// now 时刻仍生效的哈希集合
    pub fn active_hashes(&self, now: NaiveDateTime) -> RepositoryResult<HashSet<String>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT issue_hash FROM suppressed_issue WHERE expires_at IS NULL OR expires_at > ?1",
        )?;
        let hashes = stmt
            .query_map(params![fmt_datetime(now)], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<HashSet<_>>>()?;
        Ok(hashes)
    }

}

fn map_suppressed(row: &Row) -> rusqlite::Result<SuppressedIssue> {
    let details_json: String = row.get(2)?;
    let details: Map<String, JsonValue> = serde_json::from_str(&details_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(SuppressedIssue {
        issue_hash: row.get(0)?,
        rule_name: row.get(1)?,
        details,
        suppressed_at: parse_datetime_col(3, &row.get::<_, String>(3)?)?,
        expires_at: parse_opt_datetime_col(4, row.get(4)?)?,
    })
}

pub fn select_suppressed(conn: &Connection, issue_hash: &str) -> RepositoryResult<Option<SuppressedIssue>> {
    let row = conn
        .query_row(
            "SELECT issue_hash, rule_name, details_json, suppressed_at, expires_at \
             FROM suppressed_issue WHERE issue_hash = ?1",
            params![issue_hash],
            map_suppressed,
        )
        .optional()?;
    Ok(row)
}

/// 写入忽略记录；已存在则刷新过期时间
///
/// # 返回
/// - (issue_hash, created): created=false 表示记录已存在
pub fn upsert_suppressed(
    conn: &Connection,
    rule: RuleKind,
    details: &Map<String, JsonValue>,
    now: NaiveDateTime,
    expires_at: Option<NaiveDateTime>,
) -> RepositoryResult<(String, bool)> {
    let issue_hash = issue_content_hash(rule, details);
    let existed = select_suppressed(conn, &issue_hash)?.is_some();

    if existed {
        conn.execute(
            "UPDATE suppressed_issue SET expires_at = ?2 WHERE issue_hash = ?1",
            params![issue_hash, expires_at.map(fmt_datetime)],
        )?;
    } else {
        conn.execute(
            r#"
            INSERT INTO suppressed_issue (issue_hash, rule_name, details_json, suppressed_at, expires_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                issue_hash,
                rule.rule_name(),
                serde_json::to_string(details)?,
                fmt_datetime(now),
                expires_at.map(fmt_datetime),
            ],
        )?;
    }

    Ok((issue_hash, !existed))
}
