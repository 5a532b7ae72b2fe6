// ==========================================
// 状态机集成测试
// ==========================================
// 覆盖: 转移矩阵 / 守卫顺序 / 审计日志 / 配置级联 / 乐观锁
// ==========================================


use chrono::NaiveDateTime;
use hotel_occupancy::config::{config_keys, ConfigManager};
use hotel_occupancy::domain::reservation::Reservation;
use hotel_occupancy::domain::types::ReservationStatus;
use hotel_occupancy::engine::state_machine::{ReservationStateMachine, StateMachineError};
use hotel_occupancy::repository::error::RepositoryError;
use hotel_occupancy::repository::action_log_repo::TransitionLogRepository;
use hotel_occupancy::repository::reservation_repo::ReservationRepository;
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use test_helpers::{create_test_db, d, dt, dt_checkout, open_test_connection, seed_reservation, seed_room};
use uuid::Uuid;

fn build_state_machine(conn: &Arc<Mutex<Connection>>) -> ReservationStateMachine {
    let repo = Arc::new(ReservationRepository::new(conn.clone()));
    let config = Arc::new(ConfigManager::from_connection(conn.clone()));
    ReservationStateMachine::new(repo, config, None)
}

/// 不带明细的裸预订 (测试房间明细守卫)
fn seed_bare_reservation(
    conn: &Arc<Mutex<Connection>>,
    status: ReservationStatus,
    check_out: Option<NaiveDateTime>,
) -> String {
    let repo = ReservationRepository::new(conn.clone());
    let reservation_id = Uuid::new_v4().to_string();
    repo.create(&Reservation {
        reservation_id: reservation_id.clone(),
        guest_name: "测试客人".to_string(),
        hotel_id: "H1".to_string(),
        check_in: dt(2024, 1, 1),
        check_out,
        status,
        total_amount: 0.0,
        currency: "CNY".to_string(),
        pricelist: None,
        company: None,
        agent: None,
        commission_pct: 0.0,
        linked_reservation_id: None,
        is_change_origin: false,
        is_change_destination: false,
        split_from_reservation_id: None,
        revision: 0,
        created_at: dt(2023, 12, 20),
        updated_at: dt(2023, 12, 20),
    })
    .unwrap();
    reservation_id
}

#[test]
fn test_full_transition_matrix() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let conn = open_test_connection(&db_path).unwrap();
    seed_room(&conn, "101", "标准间", 100.0);
    let sm = build_state_machine(&conn);

    // 每个 (from, target) 组合用一笔独立预订验证
    for from in ReservationStatus::ALL {
        for target in ReservationStatus::ALL {
            let (reservation_id, _line_id) = seed_reservation(
                &conn,
                "101",
                dt(2024, 1, 1),
                dt_checkout(2024, 1, 5),
                from,
            );
            let result = sm.request_transition(
                &reservation_id,
                target,
                "matrix-test",
                d(2024, 1, 3),
                dt(2024, 1, 3),
            );

            if from.allowed_targets().contains(&target) {
                let outcome = result.unwrap_or_else(|e| {
                    panic!("{} -> {} 应当成功, 实际失败: {}", from, target, e)
                });
                assert_eq!(outcome.old_status, from);
                assert_eq!(outcome.new_status, target);
            } else {
                match result {
                    Err(StateMachineError::InvalidTransition { from: f, to }) => {
                        assert_eq!(f, from);
                        assert_eq!(to, target);
                    }
                    other => panic!("{} -> {} 应当被拒绝, 实际: {:?}", from, target, other.is_ok()),
                }
            }
        }
    }
}

#[test]
fn test_missing_room_assignment_guard() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let conn = open_test_connection(&db_path).unwrap();
    let sm = build_state_machine(&conn);

    let reservation_id = seed_bare_reservation(
        &conn,
        ReservationStatus::Confirmed,
        Some(dt_checkout(2024, 1, 5)),
    );
    let result = sm.request_transition(
        &reservation_id,
        ReservationStatus::Checkin,
        "tester",
        d(2024, 1, 2),
        dt(2024, 1, 2),
    );
    assert!(matches!(
        result,
        Err(StateMachineError::MissingRoomAssignment { .. })
    ));
}

#[test]
fn test_invalid_transition_checked_before_room_guard() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let conn = open_test_connection(&db_path).unwrap();
    let sm = build_state_machine(&conn);

    // checkout 状态 + 无明细: checkin 不在允许列表, 应先报 InvalidTransition
    let reservation_id = seed_bare_reservation(
        &conn,
        ReservationStatus::Checkout,
        Some(dt_checkout(2024, 1, 5)),
    );
    let result = sm.request_transition(
        &reservation_id,
        ReservationStatus::Checkin,
        "tester",
        d(2024, 1, 2),
        dt(2024, 1, 2),
    );
    assert!(matches!(
        result,
        Err(StateMachineError::InvalidTransition { .. })
    ));
}

#[test]
fn test_checkin_before_checkin_date_fails() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let conn = open_test_connection(&db_path).unwrap();
    seed_room(&conn, "101", "标准间", 100.0);
    let sm = build_state_machine(&conn);

    let (reservation_id, _) = seed_reservation(
        &conn,
        "101",
        dt(2024, 1, 10),
        dt_checkout(2024, 1, 12),
        ReservationStatus::Confirmed,
    );
    let result = sm.request_transition(
        &reservation_id,
        ReservationStatus::Checkin,
        "tester",
        d(2024, 1, 8),
        dt(2024, 1, 8),
    );
    assert!(matches!(
        result,
        Err(StateMachineError::DateInconsistency(_))
    ));

    // 守卫失败不改状态
    let repo = ReservationRepository::new(conn.clone());
    let r = repo.find_by_id(&reservation_id).unwrap().unwrap();
    assert_eq!(r.status, ReservationStatus::Confirmed);
    assert_eq!(r.revision, 0);
}

#[test]
fn test_checkout_without_checkout_time_fails() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let conn = open_test_connection(&db_path).unwrap();
    seed_room(&conn, "101", "标准间", 100.0);
    let sm = build_state_machine(&conn);

    let reservation_id = seed_bare_reservation(&conn, ReservationStatus::Checkin, None);
    // 补一条明细, 只留下日期守卫
    let repo = ReservationRepository::new(conn.clone());
    repo.create_line(&hotel_occupancy::domain::reservation::ReservationLine {
        line_id: Uuid::new_v4().to_string(),
        reservation_id: reservation_id.clone(),
        room_id: "101".to_string(),
        price: 100.0,
        original_price: 100.0,
        discount_pct: 0.0,
        nights: 0,
        created_at: dt(2024, 1, 1),
    })
    .unwrap();

    let result = sm.request_transition(
        &reservation_id,
        ReservationStatus::Checkout,
        "tester",
        d(2024, 1, 5),
        dt(2024, 1, 5),
    );
    assert!(matches!(
        result,
        Err(StateMachineError::DateInconsistency(_))
    ));
}

#[test]
fn test_checkout_cascades_to_cleaning_needed() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let conn = open_test_connection(&db_path).unwrap();
    seed_room(&conn, "101", "标准间", 100.0);
    let sm = build_state_machine(&conn);

    let (reservation_id, _) = seed_reservation(
        &conn,
        "101",
        dt(2024, 1, 1),
        dt_checkout(2024, 1, 5),
        ReservationStatus::Checkin,
    );
    let outcome = sm
        .request_transition(
            &reservation_id,
            ReservationStatus::Checkout,
            "front-desk",
            d(2024, 1, 5),
            dt(2024, 1, 5),
        )
        .unwrap();

    assert_eq!(outcome.new_status, ReservationStatus::Checkout);
    assert_eq!(outcome.cascaded_to, Some(ReservationStatus::CleaningNeeded));

    let repo = ReservationRepository::new(conn.clone());
    let r = repo.find_by_id(&reservation_id).unwrap().unwrap();
    assert_eq!(r.status, ReservationStatus::CleaningNeeded);
    // 两次写入各加一次 revision
    assert_eq!(r.revision, 2);

    // 审计日志两条: checkin->checkout, checkout->cleaning_needed
    let log_repo = TransitionLogRepository::new(conn.clone());
    let logs = log_repo.list_for_reservation(&reservation_id).unwrap();
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0].old_status, ReservationStatus::Checkin);
    assert_eq!(logs[0].new_status, ReservationStatus::Checkout);
    assert_eq!(logs[1].new_status, ReservationStatus::CleaningNeeded);
}

#[test]
fn test_cascade_disabled_via_config() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let conn = open_test_connection(&db_path).unwrap();
    seed_room(&conn, "101", "标准间", 100.0);

    let config = ConfigManager::from_connection(conn.clone());
    config
        .set(config_keys::AUTO_CLEANING_ON_CHECKOUT, "false")
        .unwrap();

    let sm = build_state_machine(&conn);
    let (reservation_id, _) = seed_reservation(
        &conn,
        "101",
        dt(2024, 1, 1),
        dt_checkout(2024, 1, 5),
        ReservationStatus::Checkin,
    );
    let outcome = sm
        .request_transition(
            &reservation_id,
            ReservationStatus::Checkout,
            "front-desk",
            d(2024, 1, 5),
            dt(2024, 1, 5),
        )
        .unwrap();

    assert_eq!(outcome.cascaded_to, None);
    let repo = ReservationRepository::new(conn.clone());
    let r = repo.find_by_id(&reservation_id).unwrap().unwrap();
    assert_eq!(r.status, ReservationStatus::Checkout);
}

#[test]
fn test_transition_writes_audit_log_with_actor() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let conn = open_test_connection(&db_path).unwrap();
    seed_room(&conn, "101", "标准间", 100.0);
    let sm = build_state_machine(&conn);

    let (reservation_id, _) = seed_reservation(
        &conn,
        "101",
        dt(2024, 1, 1),
        dt_checkout(2024, 1, 5),
        ReservationStatus::Initial,
    );
    sm.request_transition(
        &reservation_id,
        ReservationStatus::Confirmed,
        "booking-desk",
        d(2024, 1, 1),
        dt(2024, 1, 1),
    )
    .unwrap();

    let log_repo = TransitionLogRepository::new(conn.clone());
    let logs = log_repo.list_for_reservation(&reservation_id).unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].actor, "booking-desk");
    assert_eq!(logs[0].old_status, ReservationStatus::Initial);
    assert_eq!(logs[0].new_status, ReservationStatus::Confirmed);
}

#[test]
fn test_stale_revision_rejected() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let conn = open_test_connection(&db_path).unwrap();
    seed_room(&conn, "101", "标准间", 100.0);

    let (reservation_id, _) = seed_reservation(
        &conn,
        "101",
        dt(2024, 1, 1),
        dt_checkout(2024, 1, 5),
        ReservationStatus::Confirmed,
    );

    let repo = ReservationRepository::new(conn.clone());
    // 正常写入一次, revision 0 -> 1
    repo.update_status(
        &reservation_id,
        0,
        ReservationStatus::Checkin,
        ReservationStatus::Confirmed,
        "tester",
        None,
        dt(2024, 1, 2),
    )
    .unwrap();

    // 携带过期 revision 的并发写入被拒绝
    let result = repo.update_status(
        &reservation_id,
        0,
        ReservationStatus::Cancelled,
        ReservationStatus::Checkin,
        "tester",
        None,
        dt(2024, 1, 2),
    );
    match result {
        Err(RepositoryError::OptimisticLockFailure {
            expected, actual, ..
        }) => {
            assert_eq!(expected, 0);
            assert_eq!(actual, 1);
        }
        other => panic!("应返回乐观锁冲突, 实际: {:?}", other.is_ok()),
    }
}
