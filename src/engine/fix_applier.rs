// ==========================================
// 门店活动排班校验系统 - 修复执行器
// ==========================================
// 每次调用一个事务: 全部成功才提交，任何失败整体回滚
// 失败不抛错，统一返回 FixOutcome { success: false }
// 每次调用生成 operation_id 便于追踪
// ==========================================

use chrono::{Duration, Local, NaiveDateTime};
use rusqlite::Connection;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::{ConfigManager, ScheduleSettings};
use crate::domain::fix::{FixAction, FixOutcome};
use crate::domain::issue::RuleKind;
use crate::domain::schedule::{Assignment, EventWindow, NewAssignment};
use crate::domain::types::{EventCondition, EventType};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::pairing::SupervisorPairing;
use crate::engine::range_rules::RangeRuleEngine;
use crate::engine::repositories::ValidationRepositories;
use crate::engine::snapshot::ScheduleSnapshot;
use crate::repository::assignment_repo::{
    delete_assignment, insert_assignment, select_assignment, select_assignments_for_event,
    update_assignment_datetime, update_assignment_employee,
};
use crate::repository::employee_repo::select_employee;
use crate::repository::event_repo::{select_event, select_events_by_number, update_event_condition};
use crate::repository::suppression_repo::upsert_suppressed;
use crate::repository::{RepositoryError, RepositoryResult};

/// 事务内执行结果
struct Applied {
    message: String,
    affected: Vec<i64>,
    created: Option<i64>,
}

impl Applied {
    fn new(message: impl Into<String>, affected: Vec<i64>) -> Self {
        Self {
            message: message.into(),
            affected,
            created: None,
        }
    }
}

// ==========================================
// FixApplier - 修复执行器
// ==========================================
pub struct FixApplier {
    repos: ValidationRepositories,
    config: Arc<ConfigManager>,
}

impl FixApplier {
    pub fn new(repos: ValidationRepositories, config: Arc<ConfigManager>) -> Self {
        Self { repos, config }
    }

    /// 执行修复动作
    pub fn apply_fix(&self, action: &FixAction) -> FixOutcome {
        self.apply_fix_at(action, Local::now().naive_local())
    }

    /// 以 (动作名, 目标 JSON) 形式执行修复
    ///
    /// 动作名未知或目标缺字段时返回失败结果，不触碰数据
    pub fn apply_fix_raw(&self, action_kind: &str, target: JsonValue) -> FixOutcome {
        match FixAction::from_parts(action_kind, target) {
            Ok(action) => self.apply_fix(&action),
            Err(message) => {
                let operation_id = Uuid::new_v4().to_string();
                warn!(operation_id = %operation_id, action_kind, error = %message, "修复动作解析失败");
                FixOutcome::failure(operation_id, None, message)
            }
        }
    }

    #[instrument(skip(self, action), fields(action = %action.kind()))]
    pub fn apply_fix_at(&self, action: &FixAction, now: NaiveDateTime) -> FixOutcome {
        let operation_id = Uuid::new_v4().to_string();
        let kind = action.kind();

        match self.execute(action, now) {
            Ok(applied) => {
                info!(
                    operation_id = %operation_id,
                    affected = ?applied.affected,
                    created = ?applied.created,
                    "修复执行成功"
                );
                FixOutcome {
                    success: true,
                    message: applied.message,
                    operation_id,
                    action: Some(kind),
                    affected_assignment_ids: applied.affected,
                    created_assignment_id: applied.created,
                }
            }
            Err(e) => {
                warn!(operation_id = %operation_id, error = %e, "修复执行失败，已回滚");
                FixOutcome::failure(operation_id, Some(kind), e.to_string())
            }
        }
    }

    fn execute(&self, action: &FixAction, now: NaiveDateTime) -> EngineResult<Applied> {
        // 配置读取需在持锁之前完成
        let settings = self.config.settings()?;

        let mut conn = self.repos.lock_conn()?;
        let tx = conn.transaction().map_err(RepositoryError::from)?;

        let applied = match action {
            FixAction::Reassign {
                assignment_id,
                new_employee_id,
            } => reassign(&tx, &settings, *assignment_id, new_employee_id)?,
            FixAction::Unschedule { assignment_id } => unschedule(&tx, *assignment_id)?,
            FixAction::Reschedule {
                assignment_id,
                new_datetime,
            } => reschedule(&tx, &settings, *assignment_id, *new_datetime)?,
            FixAction::AssignSupervisor { core_assignment_id } => {
                assign_supervisor(&tx, &settings, *core_assignment_id)?
            }
            FixAction::Ignore {
                rule,
                details,
                expires_at,
            } => ignore(&tx, *rule, details, now, *expires_at)?,
        };

        tx.commit().map_err(RepositoryError::from)?;
        Ok(applied)
    }
}

fn load_assignment(conn: &Connection, assignment_id: i64) -> RepositoryResult<(Assignment, EventWindow)> {
    let assignment = select_assignment(conn, assignment_id)?
        .ok_or_else(|| RepositoryError::not_found("assignment", assignment_id))?;
    let event = select_event(conn, assignment.event_ref)?
        .ok_or_else(|| RepositoryError::not_found("event_window", assignment.event_ref))?;
    Ok((assignment, event))
}

fn reject_on_conflict(
    conn: &Connection,
    settings: &ScheduleSettings,
    employee_id: &str,
    at: NaiveDateTime,
    event_ref: i64,
    ignore_assignment_id: i64,
) -> EngineResult<()> {
    let check = RangeRuleEngine::check_conflict_in(conn, settings, employee_id, at, event_ref, Some(ignore_assignment_id))?;
    if let Some(kind) = check.kind {
        return Err(EngineError::Rejected(format!(
            "{} has a {:?} conflict at {}: {}",
            employee_id,
            kind,
            at,
            JsonValue::Object(check.details)
        )));
    }
    Ok(())
}

// ==========================================
// 换人
// ==========================================
fn reassign(
    conn: &Connection,
    settings: &ScheduleSettings,
    assignment_id: i64,
    new_employee_id: &str,
) -> EngineResult<Applied> {
    let (assignment, event) = load_assignment(conn, assignment_id)?;
    let employee = select_employee(conn, new_employee_id)?
        .ok_or_else(|| RepositoryError::not_found("employee", new_employee_id))?;

    if !employee.is_active {
        return Err(EngineError::Rejected(format!("employee {} is inactive", new_employee_id)));
    }
    if !employee.role.can_work(event.event_type) {
        return Err(EngineError::Rejected(format!(
            "{} ({}) cannot work {} events",
            new_employee_id, employee.role, event.event_type
        )));
    }
    reject_on_conflict(
        conn,
        settings,
        new_employee_id,
        assignment.schedule_datetime,
        assignment.event_ref,
        assignment_id,
    )?;

    update_assignment_employee(conn, assignment_id, new_employee_id)?;
    Ok(Applied::new(
        format!(
            "Reassigned {} from {} to {}",
            event.project_name, assignment.employee_id, new_employee_id
        ),
        vec![assignment_id],
    ))
}

// ==========================================
// 取消排班
// ==========================================
fn unschedule(conn: &Connection, assignment_id: i64) -> EngineResult<Applied> {
    let (assignment, event) = load_assignment(conn, assignment_id)?;

    if event.event_type.is_core() {
        let affected = retract_primary_and_paired_supervisor(conn, &assignment, &event)?;
        return Ok(Applied::new(
            format!(
                "Unscheduled {} and {} paired Supervisor assignment(s)",
                event.project_name,
                affected.len() - 1
            ),
            affected,
        ));
    }

    delete_assignment(conn, assignment_id)?;
    reset_if_unstaffed(conn, &event)?;
    Ok(Applied::new(format!("Unscheduled {}", event.project_name), vec![assignment_id]))
}

/// 活动已无排班时复位为 Unstaffed（已取消的活动保持 Canceled）
fn reset_if_unstaffed(conn: &Connection, event: &EventWindow) -> RepositoryResult<bool> {
    if event.condition == EventCondition::Canceled {
        return Ok(false);
    }
    if select_assignments_for_event(conn, event.event_ref)?.is_empty() {
        update_event_condition(conn, event.event_ref, EventCondition::Unstaffed)?;
        return Ok(true);
    }
    Ok(false)
}

/// 撤销 Core 排班并级联撤销同编号 Supervisor 活动的全部排班
///
/// # 返回
/// - 被删除的排班ID（Core 在首位）
pub fn retract_primary_and_paired_supervisor(
    conn: &Connection,
    core: &Assignment,
    core_event: &EventWindow,
) -> RepositoryResult<Vec<i64>> {
    let mut affected = vec![core.assignment_id];
    delete_assignment(conn, core.assignment_id)?;
    reset_if_unstaffed(conn, core_event)?;

    let Some(number) = core_event.event_number() else {
        return Ok(affected);
    };
    let supervisor_events = select_events_by_number(conn, &number, EventType::Supervisor)?
        .into_iter()
        .filter(|e| e.event_number().as_deref() == Some(number.as_str()));

    // 只复位本次确实撤销了排班的 Supervisor 活动
    for supervisor_event in supervisor_events {
        let assignments = select_assignments_for_event(conn, supervisor_event.event_ref)?;
        if assignments.is_empty() {
            continue;
        }
        for a in assignments {
            delete_assignment(conn, a.assignment_id)?;
            affected.push(a.assignment_id);
        }
        reset_if_unstaffed(conn, &supervisor_event)?;
    }
    Ok(affected)
}

// ==========================================
// 改时间
// ==========================================
fn reschedule(
    conn: &Connection,
    settings: &ScheduleSettings,
    assignment_id: i64,
    new_datetime: NaiveDateTime,
) -> EngineResult<Applied> {
    let (assignment, event) = load_assignment(conn, assignment_id)?;

    if !event.contains(new_datetime) {
        return Err(EngineError::Rejected(format!(
            "{} is outside the event window {} - {}",
            new_datetime, event.start_datetime, event.due_datetime
        )));
    }
    reject_on_conflict(
        conn,
        settings,
        &assignment.employee_id,
        new_datetime,
        assignment.event_ref,
        assignment_id,
    )?;

    update_assignment_datetime(conn, assignment_id, new_datetime)?;
    Ok(Applied::new(
        format!(
            "Moved {} from {} to {}",
            event.project_name, assignment.schedule_datetime, new_datetime
        ),
        vec![assignment_id],
    ))
}

// ==========================================
// 补配 Supervisor
// ==========================================
fn assign_supervisor(
    conn: &Connection,
    settings: &ScheduleSettings,
    core_assignment_id: i64,
) -> EngineResult<Applied> {
    let (core, core_event) = load_assignment(conn, core_assignment_id)?;
    if !core_event.event_type.is_core() {
        return Err(EngineError::Rejected(format!(
            "assignment {} is a {} event, not Core",
            core_assignment_id, core_event.event_type
        )));
    }

    let created = pair_supervisor_in(conn, settings, &core, &core_event)?;
    Ok(Applied {
        message: format!(
            "Assigned {} to Supervisor event {}",
            created.1,
            core_event.event_number().unwrap_or_default()
        ),
        affected: vec![core_assignment_id, created.0],
        created: Some(created.0),
    })
}

/// 事务内为 Core 排班补配 Supervisor
///
/// # 返回
/// - (新排班ID, 员工ID)
pub(crate) fn pair_supervisor_in(
    conn: &Connection,
    settings: &ScheduleSettings,
    core: &Assignment,
    core_event: &EventWindow,
) -> EngineResult<(i64, String)> {
    let at = SupervisorPairing::supervisor_time(settings, core);
    let number = core_event.event_number().unwrap_or_default();

    let supervisor_event = SupervisorPairing::find_supervisor_event(conn, core_event, at)?
        .ok_or_else(|| EngineError::Rejected(format!("no Supervisor event found for event number {}", number)))?;
    if !select_assignments_for_event(conn, supervisor_event.event_ref)?.is_empty() {
        return Err(EngineError::Rejected(format!(
            "Supervisor event {} is already staffed",
            supervisor_event.event_ref
        )));
    }

    let date = at.date();
    let snapshot = ScheduleSnapshot::load(conn, date - Duration::days(1), date + Duration::days(1))?;
    let records = snapshot.committed_records(settings);
    let pick = SupervisorPairing::pick(&snapshot, settings, &records, core, &supervisor_event).ok_or_else(|| {
        EngineError::Rejected(format!(
            "no eligible employee available to supervise event {} at {}",
            number, at
        ))
    })?;

    let assignment_id = insert_assignment(
        conn,
        &NewAssignment {
            event_ref: supervisor_event.event_ref,
            employee_id: pick.employee_id.clone(),
            schedule_datetime: pick.schedule_datetime,
            shift_block: settings.shift_block_for(pick.schedule_datetime.time()),
        },
    )?;
    update_event_condition(conn, supervisor_event.event_ref, EventCondition::Scheduled)?;
    info!(
        core_assignment_id = core.assignment_id,
        supervisor_assignment_id = assignment_id,
        employee_id = %pick.employee_id,
        source = ?pick.source,
        "Supervisor 配对完成"
    );
    Ok((assignment_id, pick.employee_id))
}

// ==========================================
// 忽略
// ==========================================
fn ignore(
    conn: &Connection,
    rule: RuleKind,
    details: &serde_json::Map<String, JsonValue>,
    now: NaiveDateTime,
    expires_at: Option<NaiveDateTime>,
) -> EngineResult<Applied> {
    let (issue_hash, created) = upsert_suppressed(conn, rule, details, now, expires_at)?;
    let message = if created {
        format!("Suppressed {} issue {}", rule, issue_hash)
    } else {
        format!("Refreshed suppression of {} issue {}", rule, issue_hash)
    };
    Ok(Applied::new(message, Vec::new()))
}
