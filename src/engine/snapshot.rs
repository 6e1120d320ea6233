// ==========================================
// 门店活动排班校验系统 - 排班快照
// ==========================================
// 职责: 一次性读取区间内的排班、活动、员工、可用性、轮值
// 规则引擎只读快照，不再访问数据库
// ==========================================

use chrono::{Duration, NaiveDate};
use rusqlite::Connection;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, warn};

use crate::config::ScheduleSettings;
use crate::domain::employee::{AvailabilityProfile, AvailabilityVerdict, Employee};
use crate::domain::rotation::RotationTable;
use crate::domain::schedule::{Assignment, EventWindow, Proposal, RecordSource, ScheduleRecord};
use crate::domain::types::EmployeeRole;
use crate::repository::assignment_repo::select_assignments_in_range;
use crate::repository::employee_repo::{select_availability_profiles, select_employees};
use crate::repository::event_repo::{select_events_by_refs, select_events_overlapping};
use crate::repository::rotation_repo::select_rotation_table;
use crate::repository::RepositoryResult;

#[derive(Debug, Clone)]
pub struct ScheduleSnapshot {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// 已提交排班（按时间升序）
    pub assignments: Vec<Assignment>,
    /// 区间相关活动（含次日截止的活动）
    pub events: HashMap<i64, EventWindow>,
    pub employees: HashMap<String, Employee>,
    pub availability: HashMap<String, AvailabilityProfile>,
    pub rotation: RotationTable,
}

impl ScheduleSnapshot {
    /// 读取快照
    ///
    /// # 参数
    /// - start/end: 排班日期区间（闭区间）
    pub fn load(conn: &Connection, start: NaiveDate, end: NaiveDate) -> RepositoryResult<Self> {
        let assignments = select_assignments_in_range(conn, start, end, None)?;

        let events: HashMap<i64, EventWindow> =
            select_events_overlapping(conn, start, end + Duration::days(1))?
                .into_iter()
                .map(|e| (e.event_ref, e))
                .collect();

        let mut snapshot = Self {
            start,
            end,
            assignments,
            events,
            employees: select_employees(conn)?
                .into_iter()
                .map(|e| (e.employee_id.clone(), e))
                .collect(),
            availability: select_availability_profiles(conn, start, end)?,
            rotation: select_rotation_table(conn)?,
        };

        let refs: Vec<i64> = snapshot.assignments.iter().map(|a| a.event_ref).collect();
        snapshot.ensure_events(conn, refs)?;

        debug!(
            start = %start,
            end = %end,
            assignments = snapshot.assignments.len(),
            events = snapshot.events.len(),
            employees = snapshot.employees.len(),
            "排班快照已加载"
        );
        Ok(snapshot)
    }

    /// 补齐快照中缺失的活动（窗口不在区间内但被排班/提案引用）
    pub fn ensure_events(
        &mut self,
        conn: &Connection,
        refs: impl IntoIterator<Item = i64>,
    ) -> RepositoryResult<()> {
        let missing: Vec<i64> = refs
            .into_iter()
            .filter(|r| !self.events.contains_key(r))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if !missing.is_empty() {
            self.events.extend(select_events_by_refs(conn, &missing)?);
        }
        Ok(())
    }

    pub fn event(&self, event_ref: i64) -> Option<&EventWindow> {
        self.events.get(&event_ref)
    }

    pub fn employee(&self, employee_id: &str) -> Option<&Employee> {
        self.employees.get(employee_id)
    }

    pub fn role_of(&self, employee_id: &str) -> Option<EmployeeRole> {
        self.employees.get(employee_id).map(|e| e.role)
    }

    /// 员工某日可用性（无可用性数据视为可用）
    pub fn verdict(&self, employee_id: &str, date: NaiveDate) -> AvailabilityVerdict {
        self.availability
            .get(employee_id)
            .map(|p| p.verdict_on(date))
            .unwrap_or(AvailabilityVerdict::Available)
    }

    pub fn find_assignment(&self, assignment_id: i64) -> Option<&Assignment> {
        self.assignments.iter().find(|a| a.assignment_id == assignment_id)
    }

    /// 某日排班及其活动（按时间升序）
    pub fn day_assignments(&self, date: NaiveDate) -> Vec<(&Assignment, &EventWindow)> {
        self.assignments
            .iter()
            .filter(|a| a.date() == date)
            .filter_map(|a| match self.events.get(&a.event_ref) {
                Some(e) => Some((a, e)),
                None => {
                    warn!(assignment_id = a.assignment_id, event_ref = a.event_ref, "排班引用的活动不存在");
                    None
                }
            })
            .collect()
    }

    /// 区间内每一天
    pub fn dates(&self) -> Vec<NaiveDate> {
        let mut dates = Vec::new();
        let mut d = self.start;
        while d <= self.end {
            dates.push(d);
            d += Duration::days(1);
        }
        dates
    }

    /// 已提交排班 → 统一记录
    pub fn committed_records(&self, settings: &ScheduleSettings) -> Vec<ScheduleRecord> {
        self.assignments
            .iter()
            .filter_map(|a| {
                let event = self.events.get(&a.event_ref)?;
                Some(ScheduleRecord {
                    source: RecordSource::Committed,
                    record_id: a.assignment_id,
                    event_ref: a.event_ref,
                    employee_id: a.employee_id.clone(),
                    schedule_datetime: a.schedule_datetime,
                    event_type: event.event_type,
                    project_name: event.project_name.clone(),
                    duration_minutes: settings.duration_minutes(event.event_type, event.estimated_minutes),
                })
            })
            .collect()
    }

    /// 有效提案 → 统一记录（员工或时间缺失的提案被跳过）
    pub fn pending_records(&self, proposals: &[Proposal], settings: &ScheduleSettings) -> Vec<ScheduleRecord> {
        proposals
            .iter()
            .filter(|p| p.is_active())
            .filter_map(|p| {
                let event = self.events.get(&p.event_ref)?;
                Some(ScheduleRecord {
                    source: RecordSource::Pending,
                    record_id: p.proposal_id,
                    event_ref: p.event_ref,
                    employee_id: p.employee_id.clone()?,
                    schedule_datetime: p.schedule_datetime?,
                    event_type: event.event_type,
                    project_name: event.project_name.clone(),
                    duration_minutes: settings.duration_minutes(event.event_type, event.estimated_minutes),
                })
            })
            .collect()
    }
}
