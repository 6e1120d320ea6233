// ==========================================
// 门店活动排班校验系统 - Core / Supervisor 配对
// ==========================================
// 配对依据: 项目名称中的 6 位活动编号
// 人选顺序: ClubSupervisor → 当日主 Lead 轮值 → Core 负责人本人
// 时间: Core 开始 + supervisor_offset_minutes
// ==========================================

use chrono::{Duration, NaiveDateTime};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::config::ScheduleSettings;
use crate::domain::employee::Employee;
use crate::domain::schedule::{Assignment, EventWindow, RecordSource, ScheduleRecord};
use crate::domain::types::{EventType, RotationKind};
use crate::engine::schedule_core::ScheduleCore;
use crate::engine::snapshot::ScheduleSnapshot;
use crate::repository::event_repo::select_events_by_number;
use crate::repository::RepositoryResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupervisorSource {
    SupervisorRole,
    RotationLead,
    CoreAssignee,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupervisorPick {
    pub employee_id: String,
    pub source: SupervisorSource,
    pub schedule_datetime: NaiveDateTime,
}

pub struct SupervisorPairing;

impl SupervisorPairing {
    /// 配对 Supervisor 的开始时间
    pub fn supervisor_time(settings: &ScheduleSettings, core: &Assignment) -> NaiveDateTime {
        core.schedule_datetime + Duration::minutes(settings.supervisor_offset_minutes)
    }

    /// 查找与 Core 活动同编号的 Supervisor 活动
    ///
    /// 多个候选时优先窗口包含目标时间的活动
    pub fn find_supervisor_event(
        conn: &Connection,
        core_event: &EventWindow,
        at: NaiveDateTime,
    ) -> RepositoryResult<Option<EventWindow>> {
        let Some(number) = core_event.event_number() else {
            return Ok(None);
        };
        let mut candidates = select_events_by_number(conn, &number, EventType::Supervisor)?;
        // instr() 也会命中更长数字串中的子串，这里按精确编号再过滤一次
        candidates.retain(|e| e.event_number().as_deref() == Some(number.as_str()));

        let idx = candidates.iter().position(|e| e.contains(at)).unwrap_or(0);
        Ok((!candidates.is_empty()).then(|| candidates.swap_remove(idx)))
    }

    /// 选择配对 Supervisor 人选
    ///
    /// # 参数
    /// - records: 当日已有记录（用于冲突判断）
    pub fn pick(
        snapshot: &ScheduleSnapshot,
        settings: &ScheduleSettings,
        records: &[ScheduleRecord],
        core: &Assignment,
        supervisor_event: &EventWindow,
    ) -> Option<SupervisorPick> {
        let at = Self::supervisor_time(settings, core);
        let date = at.date();

        let fits = |employee: &Employee, role_checked: bool| -> bool {
            if !employee.is_active || !snapshot.verdict(&employee.employee_id, date).is_available() {
                return false;
            }
            if role_checked && !employee.role.can_work(EventType::Supervisor) {
                return false;
            }
            let requested = ScheduleRecord {
                source: RecordSource::Pending,
                record_id: 0,
                event_ref: supervisor_event.event_ref,
                employee_id: employee.employee_id.clone(),
                schedule_datetime: at,
                event_type: EventType::Supervisor,
                project_name: supervisor_event.project_name.clone(),
                duration_minutes: settings
                    .duration_minutes(EventType::Supervisor, supervisor_event.estimated_minutes),
            };
            !records
                .iter()
                .filter(|r| r.employee_id == employee.employee_id)
                .any(|r| ScheduleCore::is_double_booking(&requested, r, Some(employee.role)))
        };

        // 1. ClubSupervisor
        let mut supervisors: Vec<&Employee> = snapshot
            .employees
            .values()
            .filter(|e| e.role.is_supervisor_role())
            .collect();
        supervisors.sort_by(|a, b| a.employee_id.cmp(&b.employee_id));
        if let Some(e) = supervisors.into_iter().find(|e| fits(e, true)) {
            return Some(SupervisorPick {
                employee_id: e.employee_id.clone(),
                source: SupervisorSource::SupervisorRole,
                schedule_datetime: at,
            });
        }

        // 2. 当日主 Lead 轮值
        if let Some(lead) = snapshot
            .rotation
            .employee_for(RotationKind::PrimaryLead, date)
            .and_then(|id| snapshot.employee(id))
        {
            if fits(lead, true) {
                return Some(SupervisorPick {
                    employee_id: lead.employee_id.clone(),
                    source: SupervisorSource::RotationLead,
                    schedule_datetime: at,
                });
            }
        }

        // 3. Core 负责人本人
        snapshot
            .employee(&core.employee_id)
            .filter(|e| fits(e, false))
            .map(|e| SupervisorPick {
                employee_id: e.employee_id.clone(),
                source: SupervisorSource::CoreAssignee,
                schedule_datetime: at,
            })
    }
}
