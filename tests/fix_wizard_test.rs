// ==========================================
// 修复向导集成测试
// ==========================================
// 测试目标:
// 1. get_fixable_issues 生成的修复菜单
// 2. apply_fix 各动作的事务语义（失败不改数据）
// 3. Core 取消时级联撤销配对 Supervisor
// ==========================================

mod test_helpers;

use chrono::Duration;
use serde_json::json;

use shift_guard::domain::issue::RuleKind;
use shift_guard::domain::{EventCondition, FixAction, FixActionKind};
use shift_guard::logging;
use shift_guard::ScheduleValidationApi;
use test_helpers::*;

#[test]
fn test_weekly_cap_menu_lists_each_assignment_plus_ignore() {
    logging::init_test();
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = open_conn(&db_path);

    insert_employee(&conn, "E1", "EVENT_SPECIALIST");
    let mut ids = Vec::new();
    for offset in 0..7 {
        let event_ref = 1001 + offset;
        insert_open_event(&conn, event_ref, &format!("Core-Product {}", event_ref), "CORE");
        let day = date(WEEK_START) + Duration::days(offset);
        ids.push(insert_assignment(&conn, event_ref, "E1", &format!("{} 10:15", day)));
    }

    let api = ScheduleValidationApi::open(&db_path).unwrap();
    let fixable = api.get_fixable_issues(date(WEEK_START)).unwrap();

    let cap = fixable
        .iter()
        .find(|f| f.issue.rule == RuleKind::WeeklyCoreCap)
        .expect("weekly cap issue");
    assert_eq!(cap.issue_hash, cap.issue.content_hash());
    assert_eq!(cap.options.len(), 8);

    let unschedules: Vec<_> = cap
        .options
        .iter()
        .filter(|o| o.action.kind() == FixActionKind::Unschedule)
        .collect();
    assert_eq!(unschedules.len(), 7);
    assert!(unschedules.iter().all(|o| o.confidence == 45));
    assert!(unschedules[0].recommended);
    assert_eq!(unschedules[0].action, FixAction::Unschedule { assignment_id: ids[0] });

    let last = cap.options.last().unwrap();
    assert_eq!(last.action.kind(), FixActionKind::Ignore);
    assert!(!last.recommended);

    // 提示级问题只有忽略
    let repeated = fixable
        .iter()
        .find(|f| f.issue.rule == RuleKind::RepeatedShiftTime)
        .expect("repeated time info");
    assert_eq!(repeated.options.len(), 1);
    assert_eq!(repeated.options[0].action.kind(), FixActionKind::Ignore);
}

#[test]
fn test_reassign_menu_ranks_free_candidates() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = open_conn(&db_path);

    insert_employee(&conn, "E1", "EVENT_SPECIALIST");
    insert_employee(&conn, "E2", "EVENT_SPECIALIST");
    insert_employee(&conn, "L1", "LEAD_EVENT_SPECIALIST");
    insert_open_event(&conn, 301, "Freeosk Refresh", "FREEOSK");
    let freeosk = insert_assignment(&conn, 301, "E1", "2026-03-03 10:00");

    let api = ScheduleValidationApi::open(&db_path).unwrap();
    let fixable = api.get_fixable_issues(date(WEEK_START)).unwrap();

    let restricted = fixable
        .iter()
        .find(|f| f.issue.rule == RuleKind::RoleRestrictedEvent)
        .expect("role restricted issue");
    let reassigns: Vec<_> = restricted
        .options
        .iter()
        .filter(|o| o.action.kind() == FixActionKind::Reassign)
        .collect();
    // 只有 Lead 可执行 Freeosk
    assert_eq!(reassigns.len(), 1);
    assert_eq!(
        reassigns[0].action,
        FixAction::Reassign { assignment_id: freeosk, new_employee_id: "L1".to_string() }
    );
    assert!(reassigns[0].recommended);
    assert!(restricted
        .options
        .iter()
        .any(|o| o.action == FixAction::Unschedule { assignment_id: freeosk } && o.confidence == 30));

    let outcome = api.apply_fix(&reassigns[0].action);
    assert!(outcome.success, "{}", outcome.message);
    let after = api.verify_day(date("2026-03-03")).unwrap();
    assert!(after.issues.iter().all(|i| i.rule != RuleKind::RoleRestrictedEvent));
}

#[test]
fn test_failed_fix_leaves_data_untouched() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = open_conn(&db_path);

    insert_employee(&conn, "E1", "EVENT_SPECIALIST");
    insert_employee(&conn, "J1", "JUICER_BARISTA");
    insert_employee(&conn, "E3", "EVENT_SPECIALIST");
    deactivate_employee(&conn, "E3");
    insert_open_event(&conn, 301, "Freeosk Refresh", "FREEOSK");
    let freeosk = insert_assignment(&conn, 301, "E1", "2026-03-03 10:00");
    let before = assignment_ids(&conn);

    let api = ScheduleValidationApi::open(&db_path).unwrap();

    let missing = api.apply_fix(&FixAction::Reassign {
        assignment_id: 9999,
        new_employee_id: "E1".to_string(),
    });
    assert!(!missing.success);
    assert!(missing.message.contains("not found"), "{}", missing.message);
    assert_eq!(missing.action, Some(FixActionKind::Reassign));
    assert!(!missing.operation_id.is_empty());

    let inactive = api.apply_fix(&FixAction::Reassign {
        assignment_id: freeosk,
        new_employee_id: "E3".to_string(),
    });
    assert!(!inactive.success);
    assert!(inactive.message.contains("inactive"));

    let wrong_role = api.apply_fix(&FixAction::Reassign {
        assignment_id: freeosk,
        new_employee_id: "J1".to_string(),
    });
    assert!(!wrong_role.success);
    assert!(wrong_role.message.contains("cannot work"));

    assert_eq!(assignment_ids(&conn), before);
    let employee: String = conn
        .query_row("SELECT employee_id FROM assignment WHERE assignment_id = ?1", [freeosk], |row| row.get(0))
        .unwrap();
    assert_eq!(employee, "E1");
}

#[test]
fn test_unschedule_core_retracts_paired_supervisor() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = open_conn(&db_path);

    insert_employee(&conn, "E1", "EVENT_SPECIALIST");
    insert_employee(&conn, "C1", "CLUB_SUPERVISOR");
    insert_open_event(&conn, 101, "606001-Core-Super Pretzel", "CORE");
    insert_open_event(&conn, 201, "606001-Supervisor-Super Pretzel", "SUPERVISOR");
    insert_open_event(&conn, 102, "606002-Core-Cheese Bites", "CORE");
    let core = insert_assignment(&conn, 101, "E1", "2026-03-03 10:15");
    let supervisor = insert_assignment(&conn, 201, "C1", "2026-03-03 10:45");
    let other = insert_assignment(&conn, 102, "E1", "2026-03-04 10:15");

    let api = ScheduleValidationApi::open(&db_path).unwrap();
    let outcome = api.apply_fix_raw("unschedule", json!({ "assignment_id": core }));

    assert!(outcome.success, "{}", outcome.message);
    assert_eq!(outcome.action, Some(FixActionKind::Unschedule));
    assert_eq!(outcome.affected_assignment_ids, vec![core, supervisor]);
    assert_eq!(assignment_ids(&conn), vec![other]);
    assert_eq!(event_state(&conn, 101), ("UNSTAFFED".to_string(), false));
    assert_eq!(event_state(&conn, 201), ("UNSTAFFED".to_string(), false));
    assert_eq!(event_state(&conn, 102), ("SCHEDULED".to_string(), true));
}

#[test]
fn test_assign_supervisor_creates_paired_assignment() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = open_conn(&db_path);

    insert_employee(&conn, "E1", "EVENT_SPECIALIST");
    insert_employee(&conn, "C1", "CLUB_SUPERVISOR");
    insert_open_event(&conn, 101, "606001-Core-Super Pretzel", "CORE");
    insert_open_event(&conn, 201, "606001-Supervisor-Super Pretzel", "SUPERVISOR");
    let core = insert_assignment(&conn, 101, "E1", "2026-03-03 10:15");

    let api = ScheduleValidationApi::open(&db_path).unwrap();

    let fixable = api.get_fixable_issues(date(WEEK_START)).unwrap();
    let missing = fixable
        .iter()
        .find(|f| f.issue.rule == RuleKind::MissingSupervisorPair)
        .expect("missing pair issue");
    assert_eq!(missing.options[0].action, FixAction::AssignSupervisor { core_assignment_id: core });
    assert_eq!(missing.options[0].confidence, 85);

    let outcome = api.apply_fix(&missing.options[0].action);
    assert!(outcome.success, "{}", outcome.message);
    let created = outcome.created_assignment_id.expect("created assignment");

    let (event_ref, employee_id, at): (i64, String, String) = conn
        .query_row(
            "SELECT event_ref, employee_id, schedule_datetime FROM assignment WHERE assignment_id = ?1",
            [created],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .unwrap();
    assert_eq!(event_ref, 201);
    assert_eq!(employee_id, "C1");
    assert_eq!(at, "2026-03-03 10:45:00");
    assert_eq!(event_state(&conn, 201), ("SCHEDULED".to_string(), true));

    // 已有人员时再次补配被拒绝
    let again = api.apply_fix(&FixAction::AssignSupervisor { core_assignment_id: core });
    assert!(!again.success);
    assert!(again.message.contains("already staffed"));
    assert_eq!(count_rows(&conn, "assignment"), 2);
}

#[test]
fn test_reschedule_respects_window_and_conflicts() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = open_conn(&db_path);

    insert_employee(&conn, "E1", "EVENT_SPECIALIST");
    insert_event(&conn, 101, "Core-Super Pretzel", "CORE", "2026-03-02 00:00", "2026-03-05 23:59", None);
    insert_open_event(&conn, 401, "Store Walk", "OTHER");
    let core = insert_assignment(&conn, 101, "E1", "2026-03-03 09:30");
    insert_assignment(&conn, 401, "E1", "2026-03-04 16:00");

    let api = ScheduleValidationApi::open(&db_path).unwrap();

    let outside = api.apply_fix(&FixAction::Reschedule {
        assignment_id: core,
        new_datetime: dt("2026-03-06 10:15"),
    });
    assert!(!outside.success);
    assert!(outside.message.contains("outside the event window"));

    let clash = api.apply_fix(&FixAction::Reschedule {
        assignment_id: core,
        new_datetime: dt("2026-03-04 10:15"),
    });
    assert!(!clash.success);
    assert!(clash.message.contains("DoubleBooking"), "{}", clash.message);

    // 原时间上改到有效时段（与自身不冲突）
    let moved = api.apply_fix_raw(
        "reschedule",
        json!({ "assignment_id": core, "new_datetime": "2026-03-03T10:15:00" }),
    );
    assert!(moved.success, "{}", moved.message);
    let at: String = conn
        .query_row("SELECT schedule_datetime FROM assignment WHERE assignment_id = ?1", [core], |row| row.get(0))
        .unwrap();
    assert_eq!(at, "2026-03-03 10:15:00");
}

#[test]
fn test_unknown_or_malformed_action_fails_without_changes() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = open_conn(&db_path);

    insert_employee(&conn, "E1", "EVENT_SPECIALIST");
    insert_open_event(&conn, 401, "Store Walk", "OTHER");
    let walk = insert_assignment(&conn, 401, "E1", "2026-03-03 10:00");

    let api = ScheduleValidationApi::open(&db_path).unwrap();

    let unknown = api.apply_fix_raw("teleport", json!({ "assignment_id": walk }));
    assert!(!unknown.success);
    assert_eq!(unknown.action, None);

    let malformed = api.apply_fix_raw("unschedule", json!({ "id": walk }));
    assert!(!malformed.success);

    assert_eq!(assignment_ids(&conn), vec![walk]);
}

#[test]
fn test_ignore_is_idempotent() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = open_conn(&db_path);

    let api = ScheduleValidationApi::open(&db_path).unwrap();
    let action = FixAction::from_parts(
        "ignore",
        json!({ "rule": "data_stale", "details": { "threshold_hours": 24 } }),
    )
    .unwrap();

    let first = api.apply_fix(&action);
    let second = api.apply_fix(&action);
    assert!(first.success && second.success);
    assert!(first.message.starts_with("Suppressed"));
    assert!(second.message.starts_with("Refreshed"));
    assert_eq!(count_rows(&conn, "suppressed_issue"), 1);
}

#[test]
fn test_suggest_candidates_orders_by_score() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = open_conn(&db_path);

    insert_employee(&conn, "E1", "EVENT_SPECIALIST");
    insert_employee(&conn, "E2", "EVENT_SPECIALIST");
    insert_employee(&conn, "L1", "LEAD_EVENT_SPECIALIST");
    insert_employee(&conn, "C1", "CLUB_SUPERVISOR");
    insert_open_event(&conn, 101, "Core-Super Pretzel", "CORE");
    insert_open_event(&conn, 401, "Store Walk", "OTHER");
    insert_assignment(&conn, 401, "L1", "2026-03-03 08:00");

    let api = ScheduleValidationApi::open(&db_path).unwrap();
    let ranked = api
        .suggest_candidates(101, dt("2026-03-03 10:15"), &["E1".to_string()])
        .unwrap();

    let order: Vec<(&str, u8)> = ranked.iter().map(|c| (c.employee_id.as_str(), c.score)).collect();
    // E2: 50 + 20 + 15, C1: 50 + 15, L1: 50 + 20 - 10
    assert_eq!(order, vec![("E2", 85), ("C1", 65), ("L1", 60)]);
    assert_eq!(ranked[2].day_load, 1);
    assert!(ranked[0].reasons.iter().any(|r| r.starts_with("preferred role")));
}

#[test]
fn test_unschedule_core_keeps_canceled_supervisor_event() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = open_conn(&db_path);

    insert_employee(&conn, "E1", "EVENT_SPECIALIST");
    insert_open_event(&conn, 101, "606001-Core-Super Pretzel", "CORE");
    insert_event(
        &conn,
        201,
        "606001-Supervisor-Super Pretzel",
        "SUPERVISOR",
        "2026-03-01 00:00",
        "2026-03-04 23:59",
        None,
    );
    set_event_condition(&conn, 201, EventCondition::Canceled);
    let core = insert_assignment(&conn, 101, "E1", "2026-03-03 10:15");

    let api = ScheduleValidationApi::open(&db_path).unwrap();
    let due_tomorrow = |api: &ScheduleValidationApi| {
        api.verify_day(date("2026-03-03"))
            .unwrap()
            .issues
            .iter()
            .filter(|i| i.rule == RuleKind::DueTomorrowUnscheduled)
            .count()
    };
    assert_eq!(due_tomorrow(&api), 0);

    let outcome = api.apply_fix(&FixAction::Unschedule { assignment_id: core });
    assert!(outcome.success, "{}", outcome.message);
    assert_eq!(outcome.affected_assignment_ids, vec![core]);

    // 已取消且无人员的 Supervisor 活动不被复位
    assert_eq!(event_state(&conn, 201).0, "CANCELED");
    assert_eq!(event_state(&conn, 101), ("UNSTAFFED".to_string(), false));
    assert_eq!(due_tomorrow(&api), 0);
}

#[test]
fn test_unschedule_on_canceled_event_keeps_condition() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = open_conn(&db_path);

    insert_employee(&conn, "E1", "EVENT_SPECIALIST");
    insert_open_event(&conn, 401, "Store Walk", "OTHER");
    let walk = insert_assignment(&conn, 401, "E1", "2026-03-03 14:00");
    set_event_condition(&conn, 401, EventCondition::Canceled);

    let api = ScheduleValidationApi::open(&db_path).unwrap();
    let outcome = api.apply_fix(&FixAction::Unschedule { assignment_id: walk });
    assert!(outcome.success, "{}", outcome.message);
    assert_eq!(count_rows(&conn, "assignment"), 0);
    assert_eq!(event_state(&conn, 401).0, "CANCELED");
}

#[test]
fn test_pair_menu_skips_supervisor_event_staffed_on_other_day() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = open_conn(&db_path);

    insert_employee(&conn, "E1", "EVENT_SPECIALIST");
    insert_employee(&conn, "C1", "CLUB_SUPERVISOR");
    insert_open_event(&conn, 101, "606001-Core-Super Pretzel", "CORE");
    insert_open_event(&conn, 201, "606001-Supervisor-Super Pretzel", "SUPERVISOR");
    let core = insert_assignment(&conn, 101, "E1", "2026-03-03 10:15");
    insert_assignment(&conn, 201, "C1", "2026-03-04 10:45");

    let api = ScheduleValidationApi::open(&db_path).unwrap();
    let fixable = api.get_fixable_issues(date(WEEK_START)).unwrap();

    let missing = fixable
        .iter()
        .find(|f| f.issue.rule == RuleKind::MissingSupervisorPair)
        .expect("missing pair issue");
    assert_eq!(missing.issue.detail_i64("core_assignment_id"), Some(core));
    assert_eq!(missing.options.len(), 1);
    assert_eq!(missing.options[0].action.kind(), FixActionKind::Ignore);

    // 执行器同样拒绝
    let outcome = api.apply_fix(&FixAction::AssignSupervisor { core_assignment_id: core });
    assert!(!outcome.success);
    assert_eq!(count_rows(&conn, "assignment"), 2);
}

#[test]
fn test_supervisor_role_mismatch_menu_reassigns_to_supervisor() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = open_conn(&db_path);

    insert_employee(&conn, "E1", "EVENT_SPECIALIST");
    insert_employee(&conn, "E2", "EVENT_SPECIALIST");
    insert_employee(&conn, "C1", "CLUB_SUPERVISOR");
    insert_open_event(&conn, 101, "606001-Core-Super Pretzel", "CORE");
    insert_open_event(&conn, 201, "606001-Supervisor-Super Pretzel", "SUPERVISOR");
    let core = insert_assignment(&conn, 101, "E1", "2026-03-03 10:15");
    let supervisor = insert_assignment(&conn, 201, "E2", "2026-03-03 10:45");

    let api = ScheduleValidationApi::open(&db_path).unwrap();
    let day = api.verify_day(date("2026-03-03")).unwrap();
    let mismatch: Vec<_> = day
        .issues
        .iter()
        .filter(|i| i.rule == RuleKind::SupervisorRoleMismatch)
        .collect();
    assert_eq!(mismatch.len(), 1);
    assert_eq!(mismatch[0].detail_i64("assignment_id"), Some(supervisor));
    assert_eq!(mismatch[0].detail_i64("core_assignment_id"), Some(core));
    assert_eq!(mismatch[0].detail_str("employee_id"), Some("E2"));
    assert!(day.issues.iter().all(|i| i.rule != RuleKind::MissingSupervisorPair));

    let fixable = api.get_fixable_issues(date(WEEK_START)).unwrap();
    let menu = fixable
        .iter()
        .find(|f| f.issue.rule == RuleKind::SupervisorRoleMismatch)
        .expect("role mismatch issue");
    assert_eq!(
        menu.options[0].action,
        FixAction::Reassign {
            assignment_id: supervisor,
            new_employee_id: "C1".to_string(),
        }
    );
    assert!(menu.options[0].recommended);
    // E1 不能做 Supervisor，不在候选中
    assert!(menu.options.iter().all(|o| match &o.action {
        FixAction::Reassign { new_employee_id, .. } => new_employee_id == "C1",
        _ => true,
    }));

    let outcome = api.apply_fix(&menu.options[0].action);
    assert!(outcome.success, "{}", outcome.message);
    let after = api.verify_day(date("2026-03-03")).unwrap();
    assert!(after.issues.iter().all(|i| i.rule != RuleKind::SupervisorRoleMismatch));
}

#[test]
fn test_core_daily_limit_menu_keeps_earliest_core() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = open_conn(&db_path);

    insert_employee(&conn, "E1", "EVENT_SPECIALIST");
    insert_open_event(&conn, 101, "Core-Super Pretzel", "CORE");
    insert_open_event(&conn, 102, "Core-Cheddar Bites", "CORE");
    // 先写入较晚的一条，保留哪条由时间决定而不是写入顺序
    let later = insert_assignment(&conn, 101, "E1", "2026-03-03 10:45");
    let earlier = insert_assignment(&conn, 102, "E1", "2026-03-03 10:15");

    let api = ScheduleValidationApi::open(&db_path).unwrap();
    let fixable = api.get_fixable_issues(date(WEEK_START)).unwrap();

    let limit = fixable
        .iter()
        .find(|f| f.issue.rule == RuleKind::CoreDailyLimit)
        .expect("core daily limit issue");
    assert_eq!(limit.issue.detail_i64_list("assignment_ids"), vec![earlier, later]);
    assert_eq!(limit.options.len(), 2);
    assert_eq!(limit.options[0].action, FixAction::Unschedule { assignment_id: later });
    assert_eq!(limit.options[0].confidence, 75);
    assert!(limit.options[0].recommended);
    assert_eq!(limit.options[1].action.kind(), FixActionKind::Ignore);

    let outcome = api.apply_fix(&limit.options[0].action);
    assert!(outcome.success, "{}", outcome.message);
    assert_eq!(assignment_ids(&conn), vec![earlier]);
}

#[test]
fn test_reschedule_menu_prefers_first_slot_for_primary_lead() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = open_conn(&db_path);

    insert_employee(&conn, "E1", "EVENT_SPECIALIST");
    insert_employee(&conn, "L1", "LEAD_EVENT_SPECIALIST");
    set_rotation(&conn, "PRIMARY_LEAD", 0, "L1");
    insert_open_event(&conn, 101, "Core-Super Pretzel", "CORE");
    insert_open_event(&conn, 102, "Core-Cheddar Bites", "CORE");
    insert_open_event(&conn, 103, "Core-Trail Mix", "CORE");
    insert_assignment(&conn, 101, "E1", "2026-03-02 10:15");
    let lead_core = insert_assignment(&conn, 102, "L1", "2026-03-02 10:45");
    let off_slot = insert_assignment(&conn, 103, "E1", "2026-03-03 09:30");

    let api = ScheduleValidationApi::open(&db_path).unwrap();
    let fixable = api.get_fixable_issues(date(WEEK_START)).unwrap();

    let lead = fixable
        .iter()
        .find(|f| f.issue.rule == RuleKind::LeadNotFirstSlot)
        .expect("lead first slot issue");
    assert_eq!(lead.issue.detail_i64("assignment_id"), Some(lead_core));
    assert_eq!(lead.issue.detail_str("expected_time"), Some("10:15"));

    let moves: Vec<(String, u8, bool)> = lead
        .options
        .iter()
        .filter_map(|o| match &o.action {
            FixAction::Reschedule { new_datetime, .. } => {
                Some((new_datetime.format("%H:%M").to_string(), o.confidence, o.recommended))
            }
            _ => None,
        })
        .collect();
    assert_eq!(
        moves,
        vec![
            ("10:15".to_string(), 90, true),
            ("11:15".to_string(), 60, false),
            ("11:45".to_string(), 60, false),
        ]
    );

    // 非 Lead 的无效时间: 各时段同等置信度
    let invalid = fixable
        .iter()
        .find(|f| f.issue.rule == RuleKind::InvalidCoreTime)
        .expect("invalid core time issue");
    assert_eq!(invalid.issue.detail_i64("assignment_id"), Some(off_slot));
    let reschedules: Vec<_> = invalid
        .options
        .iter()
        .filter(|o| o.action.kind() == FixActionKind::Reschedule)
        .collect();
    assert_eq!(reschedules.len(), 4);
    assert!(reschedules.iter().all(|o| o.confidence == 60));
    assert_eq!(
        reschedules[0].action,
        FixAction::Reschedule {
            assignment_id: off_slot,
            new_datetime: dt("2026-03-03 10:15"),
        }
    );
    assert!(reschedules[0].recommended);
}

#[test]
fn test_distribution_rebalance_moves_late_core_to_first_slot() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = open_conn(&db_path);

    insert_employee(&conn, "E1", "EVENT_SPECIALIST");
    insert_open_event(&conn, 101, "Core-Super Pretzel", "CORE");
    let late = insert_assignment(&conn, 101, "E1", "2026-03-04 11:45");

    let api = ScheduleValidationApi::open(&db_path).unwrap();
    let fixable = api.get_fixable_issues(date(WEEK_START)).unwrap();

    let shape = fixable
        .iter()
        .find(|f| f.issue.rule == RuleKind::TimeSlotDistribution)
        .expect("slot distribution issue");
    assert_eq!(shape.issue.detail_str("date"), Some("2026-03-04"));
    assert_eq!(shape.options.len(), 2);
    assert_eq!(
        shape.options[0].action,
        FixAction::Reschedule {
            assignment_id: late,
            new_datetime: dt("2026-03-04 10:15"),
        }
    );
    assert_eq!(shape.options[0].confidence, 65);
    assert!(shape.options[0].recommended);

    let outcome = api.apply_fix(&shape.options[0].action);
    assert!(outcome.success, "{}", outcome.message);
    let after = api.validate_week(date(WEEK_START)).unwrap();
    assert!(after.issues.iter().all(|i| i.rule != RuleKind::TimeSlotDistribution));
}
