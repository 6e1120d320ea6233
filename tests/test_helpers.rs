// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 临时数据库初始化、基础数据写入、时间解析
// 约定: 2026-03-02 为周一，测试周为 03-02 ~ 03-08
// ==========================================

#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection};
use std::error::Error;
use std::ops::Deref;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

use shift_guard::db::{init_schema, open_sqlite_connection};
use shift_guard::domain::{
    Employee, EmployeeRole, EventCondition, EventType, EventWindow, NewAssignment, Proposal,
    ProposalStatus, RotationKind, WeeklyAvailability,
};
use shift_guard::engine::ValidationRepositories;
use shift_guard::repository::SCHEDULE_SYNC_KEY;

pub const WEEK_START: &str = "2026-03-02";

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file.path().to_str().unwrap().to_string();

    let conn = open_sqlite_connection(&db_path)?;
    init_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// 测试连接
///
/// 基础数据经由仓储写入，断言与直接改表走裸连接
pub struct TestConn {
    conn: Connection,
    repos: ValidationRepositories,
}

impl Deref for TestConn {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.conn
    }
}

/// 打开测试数据库连接（用于写入基础数据和断言）
pub fn open_conn(db_path: &str) -> TestConn {
    TestConn {
        conn: open_sqlite_connection(db_path).expect("Failed to open test db"),
        repos: ValidationRepositories::new(shared_conn(db_path)),
    }
}

/// 供引擎/API 构造使用的共享连接
pub fn shared_conn(db_path: &str) -> Arc<Mutex<Connection>> {
    Arc::new(Mutex::new(open_sqlite_connection(db_path).expect("Failed to open test db")))
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// "2026-03-02 10:15" → NaiveDateTime
pub fn dt(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
}

// ==========================================
// 基础数据写入
// ==========================================

fn upsert_employee(conn: &TestConn, employee_id: &str, role: &str, is_active: bool) {
    conn.repos
        .employee_repo
        .upsert(&Employee {
            employee_id: employee_id.to_string(),
            name: format!("Employee {}", employee_id),
            role: EmployeeRole::from_db_str(role).unwrap(),
            is_active,
        })
        .unwrap();
}

/// role: LEAD_EVENT_SPECIALIST / CLUB_SUPERVISOR / EVENT_SPECIALIST / JUICER_BARISTA
pub fn insert_employee(conn: &TestConn, employee_id: &str, role: &str) {
    upsert_employee(conn, employee_id, role, true);
}

pub fn deactivate_employee(conn: &TestConn, employee_id: &str) {
    let role: String = conn
        .query_row(
            "SELECT job_title FROM employee WHERE employee_id = ?1",
            params![employee_id],
            |row| row.get(0),
        )
        .unwrap();
    upsert_employee(conn, employee_id, &role, false);
}

/// 每周模式中某天不可用（weekday: 0=周一 .. 6=周日）
pub fn set_day_off(conn: &TestConn, employee_id: &str, weekday: usize) {
    let mut weekly = WeeklyAvailability::default();
    weekly.days[weekday] = false;
    conn.repos
        .employee_repo
        .set_weekly_availability(employee_id, &weekly)
        .unwrap();
}

/// 写入活动窗口（状态 UNSTAFFED）
pub fn insert_event(
    conn: &TestConn,
    event_ref: i64,
    project_name: &str,
    event_type: &str,
    start: &str,
    due: &str,
    estimated_minutes: Option<i64>,
) {
    conn.repos
        .event_repo
        .upsert(&EventWindow {
            event_ref,
            project_name: project_name.to_string(),
            event_type: EventType::from_db_str(event_type).unwrap(),
            start_datetime: dt(start),
            due_datetime: dt(due),
            estimated_minutes,
            condition: EventCondition::Unstaffed,
            is_scheduled: false,
        })
        .unwrap();
}

/// 写入测试周内常开的活动窗口（03-01 ~ 03-20）
pub fn insert_open_event(conn: &TestConn, event_ref: i64, project_name: &str, event_type: &str) {
    insert_event(
        conn,
        event_ref,
        project_name,
        event_type,
        "2026-03-01 00:00",
        "2026-03-20 23:59",
        None,
    );
}

pub fn set_event_condition(conn: &TestConn, event_ref: i64, condition: EventCondition) {
    conn.repos.event_repo.set_condition(event_ref, condition).unwrap();
}

/// 写入已提交排班，并把活动标记为已排班
pub fn insert_assignment(conn: &TestConn, event_ref: i64, employee_id: &str, at: &str) -> i64 {
    let id = conn
        .repos
        .assignment_repo
        .insert(&NewAssignment {
            event_ref,
            employee_id: employee_id.to_string(),
            schedule_datetime: dt(at),
            shift_block: None,
        })
        .unwrap();
    set_event_condition(conn, event_ref, EventCondition::Scheduled);
    id
}

pub fn insert_time_off(conn: &TestConn, employee_id: &str, start: &str, end: &str) -> i64 {
    conn.repos
        .employee_repo
        .insert_time_off(employee_id, date(start), date(end), Some("vacation"))
        .unwrap()
}

/// day_of_week: 0=周一 .. 6=周日
pub fn set_rotation(conn: &TestConn, kind: &str, day_of_week: u32, employee_id: &str) {
    conn.repos
        .rotation_repo
        .set_slot(RotationKind::from_db_str(kind).unwrap(), day_of_week, employee_id)
        .unwrap();
}

/// 某日轮值例外（替班）
pub fn add_rotation_exception(conn: &TestConn, kind: &str, on: &str, employee_id: &str) {
    conn.repos
        .rotation_repo
        .add_exception(RotationKind::from_db_str(kind).unwrap(), date(on), employee_id, Some("swap"))
        .unwrap();
}

pub fn insert_proposal(conn: &TestConn, run_id: &str, event_ref: i64, employee_id: &str, at: &str) -> i64 {
    conn.repos
        .proposal_repo
        .insert(&Proposal {
            proposal_id: 0,
            run_id: run_id.to_string(),
            event_ref,
            employee_id: Some(employee_id.to_string()),
            schedule_datetime: Some(dt(at)),
            shift_block: None,
            status: ProposalStatus::Proposed,
            failure_reason: None,
        })
        .unwrap()
}

pub fn record_sync(conn: &TestConn, at: &str) {
    conn.repos
        .sync_state_repo
        .record_sync(SCHEDULE_SYNC_KEY, dt(at))
        .unwrap();
}

pub fn set_config(conn: &Connection, key: &str, value: &str) {
    conn.execute(
        "INSERT OR REPLACE INTO config_kv (key, value) VALUES (?1, ?2)",
        params![key, value],
    )
    .unwrap();
}

// ==========================================
// 断言辅助
// ==========================================

pub fn count_rows(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
        .unwrap()
}

pub fn assignment_ids(conn: &Connection) -> Vec<i64> {
    let mut stmt = conn
        .prepare("SELECT assignment_id FROM assignment ORDER BY assignment_id")
        .unwrap();
    stmt.query_map([], |row| row.get(0))
        .unwrap()
        .collect::<rusqlite::Result<Vec<i64>>>()
        .unwrap()
}

/// (condition, is_scheduled)
pub fn event_state(conn: &Connection, event_ref: i64) -> (String, bool) {
    conn.query_row(
        "SELECT condition, is_scheduled FROM event_window WHERE event_ref = ?1",
        params![event_ref],
        |row| Ok((row.get::<_, String>(0)?, row.get::<_, i32>(1)? != 0)),
    )
    .unwrap()
}

pub fn proposal_status(conn: &Connection, proposal_id: i64) -> (String, Option<String>) {
    conn.query_row(
        "SELECT status, failure_reason FROM proposal WHERE proposal_id = ?1",
        params![proposal_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .unwrap()
}
