// ==========================================
// 周校验聚合器集成测试
// ==========================================
// 测试目标: 周上限、时段分布、Lead 首时段、重复产品、深度清洁、角色替代、忽略过滤、健康分
// ==========================================

mod test_helpers;

use chrono::Duration;

use shift_guard::domain::issue::{RuleKind, Severity, ValidationStatus};
use shift_guard::domain::FixAction;
use shift_guard::logging;
use shift_guard::ScheduleValidationApi;
use test_helpers::*;

/// 某员工周一至周日每天一个 Core（同一时间）
fn seed_daily_cores(conn: &TestConn, employee_id: &str, first_ref: i64, time: &str) -> Vec<i64> {
    (0..7)
        .map(|offset| {
            let event_ref = first_ref + offset;
            insert_open_event(conn, event_ref, &format!("Core-Product {}", event_ref), "CORE");
            let day = date(WEEK_START) + Duration::days(offset);
            insert_assignment(conn, event_ref, employee_id, &format!("{} {}", day, time))
        })
        .collect()
}

#[test]
fn test_weekly_core_cap_and_repeated_time() {
    logging::init_test();
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = open_conn(&db_path);

    insert_employee(&conn, "E1", "EVENT_SPECIALIST");
    let ids = seed_daily_cores(&conn, "E1", 1001, "10:15");

    let api = ScheduleValidationApi::open(&db_path).unwrap();
    let result = api.validate_week(date(WEEK_START)).unwrap();

    let caps: Vec<_> = result.issues.iter().filter(|i| i.rule == RuleKind::WeeklyCoreCap).collect();
    assert_eq!(caps.len(), 1);
    assert_eq!(caps[0].severity, Severity::Critical);
    assert_eq!(caps[0].detail_str("employee_id"), Some("E1"));
    assert_eq!(caps[0].detail_str("week_start"), Some(WEEK_START));
    assert_eq!(caps[0].detail_i64("count"), Some(7));
    assert_eq!(caps[0].detail_i64("max"), Some(6));
    assert_eq!(caps[0].detail_i64_list("assignment_ids"), ids);

    let repeated: Vec<_> = result.issues.iter().filter(|i| i.rule == RuleKind::RepeatedShiftTime).collect();
    assert_eq!(repeated.len(), 1);
    assert_eq!(repeated[0].severity, Severity::Info);
    assert_eq!(repeated[0].detail_i64("days"), Some(7));

    assert_eq!(result.summary.critical, 1);
    assert_eq!(result.summary.warning, 0);
    assert_eq!(result.health_score, 90);
    assert_eq!(result.status, ValidationStatus::Fail);
    assert_eq!(result.daily.len(), 7);
    assert!(result.daily.iter().all(|d| d.status == ValidationStatus::Pass));
}

#[test]
fn test_six_cores_stay_within_cap() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = open_conn(&db_path);

    insert_employee(&conn, "E1", "EVENT_SPECIALIST");
    let ids = seed_daily_cores(&conn, "E1", 1001, "10:15");
    // 删掉周日那一条
    conn.execute("DELETE FROM assignment WHERE assignment_id = ?1", [ids[6]]).unwrap();

    let api = ScheduleValidationApi::open(&db_path).unwrap();
    let result = api.validate_week(date(WEEK_START)).unwrap();

    assert!(result.issues.iter().all(|i| i.rule != RuleKind::WeeklyCoreCap));
    assert_eq!(result.health_score, 100);
}

#[test]
fn test_raised_cap_from_config_takes_effect_after_invalidate() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = open_conn(&db_path);

    insert_employee(&conn, "E1", "EVENT_SPECIALIST");
    seed_daily_cores(&conn, "E1", 1001, "10:15");

    let api = ScheduleValidationApi::open(&db_path).unwrap();
    let before = api.validate_week(date(WEEK_START)).unwrap();
    assert_eq!(before.summary.critical, 1);

    set_config(&conn, "weekly_core_cap", "7");
    api.invalidate_config();

    let after = api.validate_week(date(WEEK_START)).unwrap();
    assert!(after.issues.iter().all(|i| i.rule != RuleKind::WeeklyCoreCap));
    assert_eq!(after.health_score, 100);
}

#[test]
fn test_uneven_slot_distribution_is_critical() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = open_conn(&db_path);

    // 周二 [3, 1, 2, 1]
    let times = ["10:15", "10:15", "10:15", "10:45", "11:15", "11:15", "11:45"];
    for (n, time) in times.iter().enumerate() {
        let employee_id = format!("E{}", n + 1);
        let event_ref = 100 + n as i64;
        insert_employee(&conn, &employee_id, "EVENT_SPECIALIST");
        insert_open_event(&conn, event_ref, &format!("Core-Product {}", event_ref), "CORE");
        insert_assignment(&conn, event_ref, &employee_id, &format!("2026-03-03 {}", time));
    }

    let api = ScheduleValidationApi::open(&db_path).unwrap();
    let result = api.validate_week(date(WEEK_START)).unwrap();

    let dist: Vec<_> = result
        .issues
        .iter()
        .filter(|i| i.rule == RuleKind::TimeSlotDistribution)
        .collect();
    assert_eq!(dist.len(), 1);
    assert_eq!(dist[0].detail_str("date"), Some("2026-03-03"));
    assert!(dist[0].message.contains("[3, 1, 2, 1]"));
    assert!(result.issues.iter().all(|i| i.rule != RuleKind::SlotLoadImbalance));

    let tuesday = result.daily.iter().find(|d| d.date == date("2026-03-03")).unwrap();
    assert_eq!(tuesday.status, ValidationStatus::Fail);
}

#[test]
fn test_primary_lead_must_take_first_slot() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = open_conn(&db_path);

    insert_employee(&conn, "L1", "LEAD_EVENT_SPECIALIST");
    insert_employee(&conn, "E1", "EVENT_SPECIALIST");
    set_rotation(&conn, "PRIMARY_LEAD", 0, "L1");
    insert_open_event(&conn, 101, "Core-Product A", "CORE");
    insert_open_event(&conn, 102, "Core-Product B", "CORE");
    insert_assignment(&conn, 101, "E1", "2026-03-02 10:15");
    let lead_core = insert_assignment(&conn, 102, "L1", "2026-03-02 10:45");

    let api = ScheduleValidationApi::open(&db_path).unwrap();
    let result = api.validate_week(date(WEEK_START)).unwrap();

    let lead: Vec<_> = result.issues.iter().filter(|i| i.rule == RuleKind::LeadNotFirstSlot).collect();
    assert_eq!(lead.len(), 1);
    assert_eq!(lead[0].detail_i64("assignment_id"), Some(lead_core));
    assert_eq!(lead[0].detail_str("expected_time"), Some("10:15"));
    assert_eq!(result.health_score, 90);
}

#[test]
fn test_ignored_issue_is_filtered_only_for_identical_details() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = open_conn(&db_path);

    insert_employee(&conn, "E1", "EVENT_SPECIALIST");
    insert_employee(&conn, "E2", "EVENT_SPECIALIST");
    seed_daily_cores(&conn, "E1", 1001, "10:15");
    seed_daily_cores(&conn, "E2", 2001, "10:45");

    let api = ScheduleValidationApi::open(&db_path).unwrap();
    let before = api.validate_week(date(WEEK_START)).unwrap();
    let caps: Vec<_> = before.issues.iter().filter(|i| i.rule == RuleKind::WeeklyCoreCap).collect();
    assert_eq!(caps.len(), 2);
    assert_eq!(before.health_score, 80);

    let e1_cap = caps.iter().find(|i| i.detail_str("employee_id") == Some("E1")).unwrap();
    let outcome = api.apply_fix(&FixAction::ignore(e1_cap));
    assert!(outcome.success, "{}", outcome.message);
    assert_eq!(count_rows(&conn, "suppressed_issue"), 1);

    let after = api.validate_week(date(WEEK_START)).unwrap();
    let remaining: Vec<_> = after.issues.iter().filter(|i| i.rule == RuleKind::WeeklyCoreCap).collect();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].detail_str("employee_id"), Some("E2"));
    assert_eq!(after.suppressed_count, 1);
    assert_eq!(after.health_score, 90);

    // 排班变化后详情不同，不再被忽略
    conn.execute(
        "DELETE FROM assignment WHERE assignment_id = ?1",
        [e1_cap.detail_i64_list("assignment_ids")[0]],
    )
    .unwrap();
    insert_open_event(&conn, 3001, "Core-Product Extra", "CORE");
    insert_assignment(&conn, 3001, "E1", "2026-03-02 10:15");
    let changed = api.validate_week(date(WEEK_START)).unwrap();
    assert_eq!(
        changed.issues.iter().filter(|i| i.rule == RuleKind::WeeklyCoreCap).count(),
        2
    );
}

#[test]
fn test_duplicate_product_on_same_day_warns() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = open_conn(&db_path);

    insert_employee(&conn, "E1", "EVENT_SPECIALIST");
    insert_employee(&conn, "E2", "EVENT_SPECIALIST");
    insert_open_event(&conn, 101, "Core-Super Pretzel", "CORE");
    insert_open_event(&conn, 102, "Super Pretzel Core", "CORE");
    let first = insert_assignment(&conn, 101, "E1", "2026-03-03 10:15");
    let second = insert_assignment(&conn, 102, "E2", "2026-03-03 10:45");

    let api = ScheduleValidationApi::open(&db_path).unwrap();
    let result = api.validate_week(date(WEEK_START)).unwrap();

    let dup: Vec<_> = result.issues.iter().filter(|i| i.rule == RuleKind::DuplicateProduct).collect();
    assert_eq!(dup.len(), 1);
    assert_eq!(dup[0].severity, Severity::Warning);
    assert_eq!(dup[0].detail_str("product"), Some("super pretzel"));
    assert_eq!(dup[0].detail_i64_list("assignment_ids"), vec![first, second]);
    assert_eq!(dup[0].detail_i64_list("event_refs"), vec![101, 102]);
    assert_eq!(result.summary.critical, 0);
    assert_eq!(result.health_score, 97);
}

#[test]
fn test_juicer_deep_clean_and_production_same_day_is_critical() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = open_conn(&db_path);

    insert_employee(&conn, "J1", "JUICER_BARISTA");
    insert_employee(&conn, "J2", "JUICER_BARISTA");
    insert_open_event(&conn, 501, "Juicer Deep Clean", "JUICER_DEEP_CLEAN");
    insert_open_event(&conn, 502, "Juicer Production", "JUICER_PRODUCTION");
    let clean = insert_assignment(&conn, 501, "J1", "2026-03-04 09:00");
    let production = insert_assignment(&conn, 502, "J2", "2026-03-04 12:00");

    let api = ScheduleValidationApi::open(&db_path).unwrap();
    let result = api.validate_week(date(WEEK_START)).unwrap();

    let conflicts: Vec<_> = result
        .issues
        .iter()
        .filter(|i| i.rule == RuleKind::JuicerDeepCleanConflict)
        .collect();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].severity, Severity::Critical);
    assert_eq!(conflicts[0].detail_str("date"), Some("2026-03-04"));
    assert_eq!(conflicts[0].detail_i64_list("deep_clean_assignment_ids"), vec![clean]);
    assert_eq!(conflicts[0].detail_i64_list("production_assignment_ids"), vec![production]);
    assert_eq!(result.summary.critical, 1);

    // 深度清洁挪到另一天后不再冲突
    let moved = api.apply_fix(&FixAction::Reschedule {
        assignment_id: clean,
        new_datetime: dt("2026-03-05 09:00"),
    });
    assert!(moved.success, "{}", moved.message);
    let after = api.validate_week(date(WEEK_START)).unwrap();
    assert!(after.issues.iter().all(|i| i.rule != RuleKind::JuicerDeepCleanConflict));
}

#[test]
fn test_role_substitution_only_when_preferred_employee_is_free() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = open_conn(&db_path);

    insert_employee(&conn, "C1", "CLUB_SUPERVISOR");
    insert_employee(&conn, "E1", "EVENT_SPECIALIST");
    insert_open_event(&conn, 101, "Core-Super Pretzel", "CORE");
    let core = insert_assignment(&conn, 101, "C1", "2026-03-03 10:15");

    let api = ScheduleValidationApi::open(&db_path).unwrap();
    let result = api.validate_week(date(WEEK_START)).unwrap();

    let subs: Vec<_> = result.issues.iter().filter(|i| i.rule == RuleKind::RoleSubstitution).collect();
    assert_eq!(subs.len(), 1);
    assert_eq!(subs[0].severity, Severity::Warning);
    assert_eq!(subs[0].detail_i64("assignment_id"), Some(core));
    assert_eq!(subs[0].detail_str("employee_id"), Some("C1"));
    assert_eq!(subs[0].details.get("available_preferred"), Some(&serde_json::json!(["E1"])));

    // 首选员工当天请假，替代可以接受
    insert_time_off(&conn, "E1", "2026-03-03", "2026-03-03");
    let after = api.validate_week(date(WEEK_START)).unwrap();
    assert!(after.issues.iter().all(|i| i.rule != RuleKind::RoleSubstitution));
}

#[test]
fn test_weekly_juicer_cap_over_five() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = open_conn(&db_path);

    insert_employee(&conn, "J1", "JUICER_BARISTA");
    let ids: Vec<i64> = (0..6)
        .map(|offset| {
            let event_ref = 5001 + offset;
            insert_open_event(&conn, event_ref, &format!("Juicer Production {}", event_ref), "JUICER_PRODUCTION");
            let day = date(WEEK_START) + Duration::days(offset);
            insert_assignment(&conn, event_ref, "J1", &format!("{} 09:00", day))
        })
        .collect();

    let api = ScheduleValidationApi::open(&db_path).unwrap();
    let result = api.validate_week(date(WEEK_START)).unwrap();

    let caps: Vec<_> = result.issues.iter().filter(|i| i.rule == RuleKind::WeeklyJuicerCap).collect();
    assert_eq!(caps.len(), 1);
    assert_eq!(caps[0].severity, Severity::Critical);
    assert_eq!(caps[0].detail_i64("count"), Some(6));
    assert_eq!(caps[0].detail_i64("max"), Some(5));
    assert_eq!(caps[0].detail_i64_list("assignment_ids"), ids);
    assert!(result.issues.iter().all(|i| i.rule != RuleKind::WeeklyCoreCap));
    assert_eq!(result.health_score, 90);

    // 五条以内不报
    let outcome = api.apply_fix(&FixAction::Unschedule { assignment_id: ids[5] });
    assert!(outcome.success, "{}", outcome.message);
    let after = api.validate_week(date(WEEK_START)).unwrap();
    assert!(after.issues.iter().all(|i| i.rule != RuleKind::WeeklyJuicerCap));
}
