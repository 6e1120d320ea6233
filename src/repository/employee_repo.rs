// ==========================================
// 门店活动排班校验系统 - 员工与可用性仓储
// ==========================================
// 表: employee / availability_weekly / availability_override / time_off
// 红线: Repository 不含业务逻辑
// ==========================================

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::domain::employee::{
    AvailabilityOverride, AvailabilityProfile, Employee, TimeOff, WeeklyAvailability,
};
use crate::domain::types::EmployeeRole;
use crate::repository::db_utils::{fmt_date, parse_date_col, parse_enum_col};
use crate::repository::error::{RepositoryError, RepositoryResult};

// ==========================================
// EmployeeRepository - 员工仓储
// ==========================================
pub struct EmployeeRepository {
    conn: Arc<Mutex<Connection>>,
}

impl EmployeeRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ===== 写入（管理与测试数据准备） =====

    pub fn upsert(&self, employee: &Employee) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO employee (employee_id, name, job_title, is_active)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(employee_id) DO UPDATE SET
                name = excluded.name,
                job_title = excluded.job_title,
                is_active = excluded.is_active
            "#,
            params![
                employee.employee_id,
                employee.name,
                employee.role.to_db_str(),
                employee.is_active as i32,
            ],
        )?;
        Ok(())
    }

    pub fn set_weekly_availability(
        &self,
        employee_id: &str,
        weekly: &WeeklyAvailability,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let d = weekly.days.map(|v| v as i32);
        conn.execute(
            r#"
            INSERT OR REPLACE INTO availability_weekly
                (employee_id, monday, tuesday, wednesday, thursday, friday, saturday, sunday)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![employee_id, d[0], d[1], d[2], d[3], d[4], d[5], d[6]],
        )?;
        Ok(())
    }

    pub fn insert_time_off(
        &self,
        employee_id: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
        reason: Option<&str>,
    ) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO time_off (employee_id, start_date, end_date, reason) VALUES (?1, ?2, ?3, ?4)",
            params![employee_id, fmt_date(start_date), fmt_date(end_date), reason],
        )?;
        Ok(conn.last_insert_rowid())
    }
}

// ==========================================
// 连接级查询（供事务内复用）
// ==========================================

fn map_employee(row: &Row) -> rusqlite::Result<Employee> {
    let title: String = row.get(2)?;
    Ok(Employee {
        employee_id: row.get(0)?,
        name: row.get(1)?,
        role: parse_enum_col(2, &title, EmployeeRole::from_db_str)?,
        is_active: row.get::<_, i32>(3)? != 0,
    })
}

pub fn select_employee(conn: &Connection, employee_id: &str) -> RepositoryResult<Option<Employee>> {
    let employee = conn
        .query_row(
            "SELECT employee_id, name, job_title, is_active FROM employee WHERE employee_id = ?1",
            params![employee_id],
            map_employee,
        )
        .optional()?;
    Ok(employee)
}

pub fn select_employees(conn: &Connection) -> RepositoryResult<Vec<Employee>> {
    let mut stmt = conn.prepare(
        "SELECT employee_id, name, job_title, is_active FROM employee ORDER BY employee_id",
    )?;
    let employees = stmt
        .query_map([], map_employee)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(employees)
}

/// 加载 [from, to] 相关的全部可用性数据
pub fn select_availability_profiles(
    conn: &Connection,
    from: NaiveDate,
    to: NaiveDate,
) -> RepositoryResult<HashMap<String, AvailabilityProfile>> {
    let mut profiles: HashMap<String, AvailabilityProfile> = HashMap::new();

    // 1. 每周模式
    {
        let mut stmt = conn.prepare(
            r#"
            SELECT employee_id, monday, tuesday, wednesday, thursday, friday, saturday, sunday
            FROM availability_weekly
            "#,
        )?;
        let rows = stmt.query_map([], |row| {
            let mut days = [true; 7];
            for (i, day) in days.iter_mut().enumerate() {
                *day = row.get::<_, i32>(i + 1)? != 0;
            }
            Ok((row.get::<_, String>(0)?, WeeklyAvailability { days }))
        })?;
        for row in rows {
            let (employee_id, weekly) = row?;
            profiles.entry(employee_id).or_default().weekly = Some(weekly);
        }
    }

    // 2. 日期覆盖（与区间相交）
    {
        let mut stmt = conn.prepare(
            r#"
            SELECT employee_id, start_date, end_date,
                   monday, tuesday, wednesday, thursday, friday, saturday, sunday, reason
            FROM availability_override
            WHERE start_date <= ?2 AND end_date >= ?1
            ORDER BY override_id
            "#,
        )?;
        let rows = stmt.query_map(params![fmt_date(from), fmt_date(to)], |row| {
            let mut days = [None; 7];
            for (i, day) in days.iter_mut().enumerate() {
                *day = row.get::<_, Option<i32>>(i + 3)?.map(|v| v != 0);
            }
            Ok((
                row.get::<_, String>(0)?,
                AvailabilityOverride {
                    start_date: parse_date_col(1, &row.get::<_, String>(1)?)?,
                    end_date: parse_date_col(2, &row.get::<_, String>(2)?)?,
                    days,
                    reason: row.get(10)?,
                },
            ))
        })?;
        for row in rows {
            let (employee_id, o) = row?;
            profiles.entry(employee_id).or_default().overrides.push(o);
        }
    }

    // 3. 请假（与区间相交）
    for t in select_time_off_overlapping(conn, None, from, to)? {
        profiles.entry(t.employee_id.clone()).or_default().time_off.push(t);
    }

    Ok(profiles)
}

/// 与 [from, to] 相交的请假记录（可按员工过滤）
pub fn select_time_off_overlapping(
    conn: &Connection,
    employee_id: Option<&str>,
    from: NaiveDate,
    to: NaiveDate,
) -> RepositoryResult<Vec<TimeOff>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT time_off_id, employee_id, start_date, end_date, reason
        FROM time_off
        WHERE start_date <= ?2 AND end_date >= ?1
          AND (?3 IS NULL OR employee_id = ?3)
        ORDER BY start_date, time_off_id
        "#,
    )?;
    let rows = stmt
        .query_map(params![fmt_date(from), fmt_date(to), employee_id], |row| {
            Ok(TimeOff {
                time_off_id: row.get(0)?,
                employee_id: row.get(1)?,
                start_date: parse_date_col(2, &row.get::<_, String>(2)?)?,
                end_date: parse_date_col(3, &row.get::<_, String>(3)?)?,
                reason: row.get(4)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}
