// ==========================================
// 门店活动排班校验系统 - 排班规则纯函数库
// ==========================================
// 职责: 区间重叠、并行豁免、时段计数、时段分布形状
// 红线: 无状态、无副作用、无 I/O 操作
// ==========================================

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::schedule::{extract_event_number, ScheduleRecord};
use crate::domain::types::EmployeeRole;

/// 相邻时段计数的违规对
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotDelta {
    pub from_time: String,
    pub to_time: String,
    pub from_count: usize,
    pub to_count: usize,
    /// to_count - from_count
    pub delta: i64,
}

/// 单时段计数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotCount {
    pub time: String,
    pub count: usize,
}

// ==========================================
// ScheduleCore - 纯函数工具类
// ==========================================
pub struct ScheduleCore;

impl ScheduleCore {
    /// [start, start+duration) 区间是否相交
    pub fn intervals_overlap(a: &ScheduleRecord, b: &ScheduleRecord) -> bool {
        a.schedule_datetime < b.end_datetime() && b.schedule_datetime < a.end_datetime()
    }

    /// 同一员工两条记录是否允许并行
    ///
    /// # 规则
    /// - 两条均为 Supervisor 且员工为 ClubSupervisor → 允许
    /// - Supervisor 与同编号 Core（配对关系）→ 允许
    pub fn is_concurrency_exempt(
        a: &ScheduleRecord,
        b: &ScheduleRecord,
        holder_role: Option<EmployeeRole>,
    ) -> bool {
        if a.event_type.is_concurrent_eligible()
            && b.event_type.is_concurrent_eligible()
            && holder_role.map_or(false, |r| r.is_supervisor_role())
        {
            return true;
        }

        let paired = |sup: &ScheduleRecord, core: &ScheduleRecord| {
            sup.event_type.is_supervisor()
                && core.event_type.is_core()
                && extract_event_number(&sup.project_name).is_some()
                && extract_event_number(&sup.project_name) == extract_event_number(&core.project_name)
        };
        paired(a, b) || paired(b, a)
    }

    /// 两条记录是否构成重复排班
    pub fn is_double_booking(
        a: &ScheduleRecord,
        b: &ScheduleRecord,
        holder_role: Option<EmployeeRole>,
    ) -> bool {
        a.employee_id == b.employee_id
            && !(a.source == b.source && a.record_id == b.record_id)
            && Self::intervals_overlap(a, b)
            && !Self::is_concurrency_exempt(a, b, holder_role)
    }

    /// 逐员工两两比较，返回冲突下标对 (i < j)
    ///
    /// # 参数
    /// - records: 已按时间排序的记录
    /// - role_of: 员工角色查询
    pub fn find_double_bookings(
        records: &[ScheduleRecord],
        role_of: impl Fn(&str) -> Option<EmployeeRole>,
    ) -> Vec<(usize, usize)> {
        let mut by_employee: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (idx, r) in records.iter().enumerate() {
            by_employee.entry(r.employee_id.as_str()).or_default().push(idx);
        }

        let mut pairs = Vec::new();
        for (employee_id, indices) in by_employee {
            let role = role_of(employee_id);
            for (n, &i) in indices.iter().enumerate() {
                for &j in &indices[n + 1..] {
                    if Self::is_double_booking(&records[i], &records[j], role) {
                        pairs.push((i.min(j), i.max(j)));
                    }
                }
            }
        }
        pairs
    }

    /// 时段计数
    ///
    /// 配置时段（含 0）与非配置时间合并，按时间升序
    pub fn slot_counts(core_times: &[NaiveTime], configured: &[NaiveTime]) -> Vec<(NaiveTime, usize)> {
        let mut counts: BTreeMap<NaiveTime, usize> = configured.iter().map(|t| (*t, 0)).collect();
        for t in core_times {
            *counts.entry(*t).or_insert(0) += 1;
        }
        counts.into_iter().collect()
    }

    /// 时段分布形状检查
    ///
    /// # 规则
    /// - 计数沿时间顺序单调不增
    /// - 相邻时段差值不超过 1
    ///
    /// # 返回
    /// - 违规的相邻对；为空表示合格
    pub fn distribution_violations(counts: &[(NaiveTime, usize)]) -> Vec<SlotDelta> {
        counts
            .windows(2)
            .filter_map(|w| {
                let (from_time, from_count) = w[0];
                let (to_time, to_count) = w[1];
                let increases = to_count > from_count;
                let gap_too_wide = from_count > to_count + 1;
                (increases || gap_too_wide).then(|| SlotDelta {
                    from_time: format_slot(from_time),
                    to_time: format_slot(to_time),
                    from_count,
                    to_count,
                    delta: to_count as i64 - from_count as i64,
                })
            })
            .collect()
    }

    /// 计数序列是否合格（仅计数，不含时间）
    pub fn is_valid_distribution(counts: &[usize]) -> bool {
        counts
            .windows(2)
            .all(|w| w[1] <= w[0] && w[0] - w[1] <= 1)
    }

    /// 理想分布: 从左到右轮流填充
    pub fn ideal_distribution(total: usize, slot_count: usize) -> Vec<usize> {
        if slot_count == 0 {
            return Vec::new();
        }
        let base = total / slot_count;
        let remainder = total % slot_count;
        (0..slot_count)
            .map(|i| base + usize::from(i < remainder))
            .collect()
    }

    /// 计数转为可序列化形式
    pub fn to_slot_counts(counts: &[(NaiveTime, usize)]) -> Vec<SlotCount> {
        counts
            .iter()
            .map(|(t, c)| SlotCount {
                time: format_slot(*t),
                count: *c,
            })
            .collect()
    }
}

/// HH:MM
pub fn format_slot(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::schedule::RecordSource;
    use crate::domain::types::EventType;
    use chrono::NaiveDate;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn record(id: i64, emp: &str, event_type: EventType, name: &str, h: u32, m: u32, minutes: i64) -> ScheduleRecord {
        ScheduleRecord {
            source: RecordSource::Committed,
            record_id: id,
            event_ref: id * 10,
            employee_id: emp.to_string(),
            schedule_datetime: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap().and_time(t(h, m)),
            event_type,
            project_name: name.to_string(),
            duration_minutes: minutes,
        }
    }

    #[test]
    fn test_distribution_examples() {
        assert!(ScheduleCore::is_valid_distribution(&[2, 2, 2, 2]));
        assert!(ScheduleCore::is_valid_distribution(&[3, 2, 2, 2]));
        assert!(!ScheduleCore::is_valid_distribution(&[3, 1, 2, 1]));
        assert!(!ScheduleCore::is_valid_distribution(&[0, 0, 0, 1]));
        assert!(ScheduleCore::is_valid_distribution(&[0, 0, 0, 0]));
    }

    #[test]
    fn test_distribution_violations_report_deltas() {
        let counts = vec![(t(10, 15), 3), (t(10, 45), 1), (t(11, 15), 2), (t(11, 45), 1)];
        let deltas = ScheduleCore::distribution_violations(&counts);
        assert_eq!(deltas.len(), 2);
        assert_eq!(deltas[0].from_time, "10:15");
        assert_eq!(deltas[0].delta, -2);
        assert_eq!(deltas[1].to_time, "11:15");
        assert_eq!(deltas[1].delta, 1);
    }

    #[test]
    fn test_slot_counts_include_zero_and_off_slot_times() {
        let configured = vec![t(10, 15), t(10, 45)];
        let counts = ScheduleCore::slot_counts(&[t(10, 45), t(10, 30)], &configured);
        assert_eq!(counts, vec![(t(10, 15), 0), (t(10, 30), 1), (t(10, 45), 1)]);
    }

    #[test]
    fn test_ideal_distribution_fills_left_first() {
        assert_eq!(ScheduleCore::ideal_distribution(7, 4), vec![2, 2, 2, 1]);
        assert_eq!(ScheduleCore::ideal_distribution(3, 4), vec![1, 1, 1, 0]);
        assert!(ScheduleCore::is_valid_distribution(&ScheduleCore::ideal_distribution(9, 4)));
    }

    #[test]
    fn test_overlap_detected_for_same_employee() {
        let a = record(1, "E1", EventType::Other, "Store walk", 10, 0, 60);
        let b = record(2, "E1", EventType::Freeosk, "Freeosk refresh", 10, 30, 15);
        assert!(ScheduleCore::is_double_booking(&a, &b, Some(EmployeeRole::LeadEventSpecialist)));

        let c = record(3, "E1", EventType::Freeosk, "Freeosk refresh", 11, 0, 15);
        assert!(!ScheduleCore::is_double_booking(&a, &c, Some(EmployeeRole::LeadEventSpecialist)));
    }

    #[test]
    fn test_supervisor_concurrency_exemption() {
        let a = record(1, "E1", EventType::Supervisor, "606001-Supervisor-Pretzel", 12, 0, 60);
        let b = record(2, "E1", EventType::Supervisor, "606002-Supervisor-Bites", 12, 0, 60);
        assert!(!ScheduleCore::is_double_booking(&a, &b, Some(EmployeeRole::ClubSupervisor)));
        assert!(ScheduleCore::is_double_booking(&a, &b, Some(EmployeeRole::EventSpecialist)));
    }

    #[test]
    fn test_paired_supervisor_inside_core_is_allowed() {
        let core = record(1, "E1", EventType::Core, "606001-Core-Pretzel", 10, 15, 390);
        let sup = record(2, "E1", EventType::Supervisor, "606001-Supervisor-Pretzel", 10, 45, 60);
        assert!(!ScheduleCore::is_double_booking(&core, &sup, Some(EmployeeRole::LeadEventSpecialist)));

        let other_sup = record(3, "E1", EventType::Supervisor, "606002-Supervisor-Bites", 10, 45, 60);
        assert!(ScheduleCore::is_double_booking(&core, &other_sup, Some(EmployeeRole::LeadEventSpecialist)));
    }
}
