use std::time::Duration;

use sql_batch::prelude::*;
use sql_batch::test_utils::ScriptedConnection;
use tokio::time::Instant;

fn deadlock() -> DriverError {
    DriverError::new("Deadlock found when trying to get lock; try restarting transaction")
        .with_sqlstate("40001")
        .with_code(1213)
}

fn engine_with(conn: ScriptedConnection, max_tries: u32) -> BatchEngine {
    let config = EngineConfig::default()
        .with_max_tries(max_tries)
        .with_sleep(Duration::from_secs(1));
    BatchEngine::new(config).with_connection(Box::new(conn))
}

#[tokio::test(start_paused = true)]
async fn persistent_deadlock_exhausts_every_try() {
    let conn = ScriptedConnection::new(Dialect::Mysql).fail_on("UPDATE", deadlock(), usize::MAX);
    let tracker = conn.tracker();
    let mut engine = engine_with(conn, 3);

    let started = Instant::now();
    let err = engine
        .query("UPDATE t SET a = 1 WHERE id = 2", &Bindings::new(), Flavor::Affected)
        .await
        .unwrap_err();

    assert!(started.elapsed() >= Duration::from_secs(2));
    assert!(matches!(err, SqlBatchError::RetriesExhausted { max_tries: 3, .. }));
    assert!(err.to_string().contains("3 tries"));
    assert_eq!(err.driver_error().and_then(|e| e.code), Some(1213));

    let log = tracker.snapshot();
    assert_eq!(log.executes.len(), 3);
    assert_eq!(log.begins, 3);
    assert_eq!(log.rollbacks, 3);
    assert_eq!(log.commits, 0);
    assert_eq!(log.cursor_closes, 3);
    assert_eq!(engine.envelope().last_affected, 0);
}

#[tokio::test(start_paused = true)]
async fn transactional_batch_restarts_from_the_first_statement() {
    let conn = ScriptedConnection::new(Dialect::Mysql)
        .fail_on("INSERT INTO b", deadlock(), 1)
        .with_affected("INSERT INTO a", 2);
    let tracker = conn.tracker();
    let mut engine = engine_with(conn, 3);

    let output = engine
        .query(
            "INSERT INTO a VALUES (1), (2); INSERT INTO b VALUES (1); INSERT INTO c VALUES (1)",
            &Bindings::new(),
            Flavor::Affected,
        )
        .await
        .unwrap();

    // Rows from the rolled-back attempt are not counted.
    assert_eq!(output, QueryOutput::Affected(4));
    let log = tracker.snapshot();
    assert_eq!(
        log.executes,
        vec![
            "INSERT INTO a VALUES (1), (2)",
            "INSERT INTO b VALUES (1)",
            "INSERT INTO a VALUES (1), (2)",
            "INSERT INTO b VALUES (1)",
            "INSERT INTO c VALUES (1)",
        ]
    );
    assert_eq!(log.begins, 2);
    assert_eq!(log.rollbacks, 1);
    assert_eq!(log.commits, 1);
    // One per statement run, the failed one included.
    assert_eq!(log.cursor_closes, 5);
}

#[tokio::test(start_paused = true)]
async fn single_select_retries_without_a_transaction() {
    let mut rows = ResultSet::default();
    rows.set_column_names(std::sync::Arc::new(vec!["id".into()]));
    rows.add_row_values(vec![RowValues::Int(5)]);
    let conn = ScriptedConnection::new(Dialect::Postgres)
        .fail_on("SELECT id", DriverError::new("deadlock detected").with_sqlstate("40P01"), 1)
        .with_rows("SELECT id", rows);
    let tracker = conn.tracker();
    let mut engine = engine_with(conn, 2);

    let value = engine.value("SELECT id FROM t", &Bindings::new()).await.unwrap();
    assert_eq!(value, Some(RowValues::Int(5)));

    let log = tracker.snapshot();
    assert_eq!(log.executes.len(), 2);
    assert_eq!(log.begins, 0);
    assert_eq!(log.rollbacks, 0);
}

#[tokio::test]
async fn fatal_errors_roll_back_once_and_carry_the_statement() {
    let conn = ScriptedConnection::new(Dialect::Sqlite).fail_on(
        "INSERT INTO missing",
        DriverError::new("no such table: missing").with_code(1),
        1,
    );
    let tracker = conn.tracker();
    let mut engine = engine_with(conn, 5);

    let err = engine
        .query(
            vec![
                ("INSERT INTO t VALUES (:id)", Bindings::new()),
                ("INSERT INTO missing VALUES (:id)", Bindings::new()),
            ],
            &Bindings::new().named("id", 4_i64),
            Flavor::Bool,
        )
        .await
        .unwrap_err();

    match &err {
        SqlBatchError::Execution {
            statement,
            bindings,
            source,
        } => {
            assert_eq!(statement, "INSERT INTO missing VALUES (:id)");
            assert_eq!(bindings.as_deref(), Some(r#"{":id":4}"#));
            assert_eq!(source.message, "no such table: missing");
        }
        other => panic!("expected execution error, got {other:?}"),
    }
    let log = tracker.snapshot();
    assert_eq!(log.executes.len(), 2);
    assert_eq!(log.rollbacks, 1);
    assert_eq!(log.commits, 0);
    assert_eq!(log.cursor_closes, 2);
}

#[tokio::test]
async fn every_statement_closes_its_cursor() {
    let conn = ScriptedConnection::new(Dialect::Mysql);
    let tracker = conn.tracker();
    let mut engine = engine_with(conn, 3);

    engine
        .execute(
            "INSERT INTO t VALUES (1); UPDATE t SET a = 2; DELETE FROM u",
            &Bindings::new(),
        )
        .await
        .unwrap();
    assert_eq!(tracker.snapshot().cursor_closes, 3);

    engine.all("SELECT * FROM t", &Bindings::new()).await.unwrap();
    let log = tracker.snapshot();
    assert_eq!(log.cursor_closes, 4);
    assert_eq!(log.cursor_closes, log.executes.len());
}

#[tokio::test(start_paused = true)]
async fn failing_rollback_does_not_mask_the_cause() {
    let conn = ScriptedConnection::new(Dialect::Mysql)
        .fail_on("DELETE", deadlock(), usize::MAX)
        .fail_rollback(DriverError::new("connection lost"));
    let mut engine = engine_with(conn, 2);

    let err = engine
        .query("DELETE FROM t", &Bindings::new(), Flavor::Bool)
        .await
        .unwrap_err();
    assert!(matches!(err, SqlBatchError::RetriesExhausted { max_tries: 2, .. }));
}

#[tokio::test]
async fn commit_failure_is_a_transaction_error_and_not_retried() {
    let conn = ScriptedConnection::new(Dialect::Mysql).fail_commit(deadlock());
    let tracker = conn.tracker();
    let mut engine = engine_with(conn, 3);

    let err = engine
        .query("UPDATE t SET a = 1", &Bindings::new(), Flavor::Bool)
        .await
        .unwrap_err();
    assert!(matches!(err, SqlBatchError::Transaction { .. }));
    assert!(err.to_string().contains("Failed to start or end transaction"));

    let log = tracker.snapshot();
    assert_eq!(log.commits, 1);
    assert_eq!(log.rollbacks, 1);
    assert_eq!(log.executes.len(), 1);
}

#[tokio::test]
async fn begin_failure_is_a_transaction_error() {
    let conn = ScriptedConnection::new(Dialect::Sqlite).fail_begin(DriverError::new("disk I/O error"));
    let tracker = conn.tracker();
    let mut engine = engine_with(conn, 3);

    let err = engine
        .query("UPDATE t SET a = 1", &Bindings::new(), Flavor::Bool)
        .await
        .unwrap_err();
    assert!(matches!(err, SqlBatchError::Transaction { .. }));
    assert!(tracker.snapshot().executes.is_empty());
}

#[tokio::test]
async fn caller_transaction_is_left_alone() {
    let conn = ScriptedConnection::new(Dialect::Mysql)
        .in_open_transaction()
        .fail_on("INSERT INTO b", deadlock(), 1);
    let tracker = conn.tracker();
    let mut engine = engine_with(conn, 3);

    engine
        .query("INSERT INTO a VALUES (1)", &Bindings::new(), Flavor::Bool)
        .await
        .unwrap();
    let err = engine
        .query("INSERT INTO b VALUES (1)", &Bindings::new(), Flavor::Bool)
        .await
        .unwrap_err();
    assert!(matches!(err, SqlBatchError::Execution { .. }));

    let log = tracker.snapshot();
    assert_eq!(log.begins, 0);
    assert_eq!(log.commits, 0);
    assert_eq!(log.rollbacks, 0);
    assert_eq!(log.executes.len(), 2);
}

#[tokio::test]
async fn validation_errors_never_touch_the_connection() {
    let conn = ScriptedConnection::new(Dialect::Mysql);
    let tracker = conn.tracker();
    let mut engine = engine_with(conn, 3);

    let err = engine
        .query("UPDATE t SET a = 1", &Bindings::new(), Flavor::Increment)
        .await
        .unwrap_err();
    assert!(err.is_validation());

    let err = engine
        .query("INSERT INTO t VALUES (1); INSERT INTO t VALUES (2)", &Bindings::new(), Flavor::Row)
        .await
        .unwrap_err();
    assert!(err.is_validation());
    assert_eq!(tracker.snapshot().total_calls(), 0);
}

#[tokio::test]
async fn selects_in_a_multi_statement_batch_are_dropped() {
    let conn = ScriptedConnection::new(Dialect::Mysql);
    let tracker = conn.tracker();
    let mut engine = engine_with(conn, 3);

    let output = engine
        .query(vec!["SELECT 1", "INSERT INTO t VALUES (1)"], &Bindings::new(), Flavor::Bool)
        .await
        .unwrap();
    assert_eq!(output, QueryOutput::Bool(true));
    assert_eq!(tracker.snapshot().executes, vec!["INSERT INTO t VALUES (1)"]);
}

#[tokio::test]
async fn row_flavor_limits_the_statement_it_runs() {
    let conn = ScriptedConnection::new(Dialect::Mysql);
    let tracker = conn.tracker();
    let mut engine = engine_with(conn, 3);

    let row = engine.row("SELECT * FROM t", &Bindings::new()).await.unwrap();
    assert_eq!(row, None);
    engine.row("SELECT * FROM t LIMIT 5", &Bindings::new()).await.unwrap();

    assert_eq!(
        tracker.snapshot().prepares,
        vec!["SELECT * FROM t LIMIT 0,1", "SELECT * FROM t LIMIT 5"]
    );
}

#[tokio::test]
async fn insert_id_degrades_when_unsupported() {
    let conn = ScriptedConnection::new(Dialect::Other).without_last_insert_id();
    let mut engine = engine_with(conn, 1);

    let id = engine
        .insert("INSERT INTO t (a) VALUES (1)", &Bindings::new())
        .await
        .unwrap();
    assert_eq!(id, LastInsertId::Unsupported);
    assert_eq!(id.to_json(), serde_json::json!(false));
}

#[tokio::test]
async fn insert_id_is_reported_when_supported() {
    let conn = ScriptedConnection::new(Dialect::Mysql);
    let mut engine = engine_with(conn, 1);

    let id = engine
        .insert("INSERT INTO t (a) VALUES (1)", &Bindings::new())
        .await
        .unwrap();
    assert_eq!(id.as_i64(), Some(1));
}

#[tokio::test]
async fn envelope_resets_between_calls() {
    let conn = ScriptedConnection::new(Dialect::Mysql).fail_on(
        "broken",
        DriverError::new("syntax error"),
        1,
    );
    let mut engine = engine_with(conn, 1);

    engine
        .affected("UPDATE t SET a = 1; UPDATE u SET a = 1", &Bindings::new())
        .await
        .unwrap();
    assert_eq!(engine.envelope().last_affected, 2);

    engine
        .query("UPDATE broken SET a = 1", &Bindings::new(), Flavor::Affected)
        .await
        .unwrap_err();
    assert_eq!(engine.envelope().last_affected, 0);
    assert_eq!(engine.envelope().last_insert_id, LastInsertId::Unset);
}

#[tokio::test]
async fn rejected_call_keeps_the_previous_envelope() {
    let conn = ScriptedConnection::new(Dialect::Mysql);
    let tracker = conn.tracker();
    let mut engine = engine_with(conn, 1);

    engine
        .affected("UPDATE t SET a = 1; UPDATE u SET a = 1", &Bindings::new())
        .await
        .unwrap();
    engine.insert("INSERT INTO t (a) VALUES (1)", &Bindings::new()).await.unwrap();
    let before = engine.envelope().clone();
    assert_eq!(before.last_affected, 1);
    assert_eq!(before.last_insert_id.as_i64(), Some(3));

    let calls = tracker.snapshot().total_calls();
    let err = engine
        .query("UPDATE t SET a = 1", &Bindings::new(), Flavor::Increment)
        .await
        .unwrap_err();
    assert!(err.is_validation());
    assert_eq!(engine.envelope(), &before);
    assert_eq!(tracker.snapshot().total_calls(), calls);
}

#[tokio::test]
async fn stats_accumulate_across_calls() {
    let conn = ScriptedConnection::new(Dialect::Sqlite);
    let mut engine = engine_with(conn, 1);

    for _ in 0..2 {
        engine
            .execute("UPDATE t SET a = 1; UPDATE u SET b = 2", &Bindings::new())
            .await
            .unwrap();
    }
    assert_eq!(engine.stats().queries_executed(), 4);
    assert_eq!(engine.stats().timings_for("UPDATE t SET a = 1").len(), 2);

    engine.reset_stats();
    assert_eq!(engine.stats().queries_executed(), 0);
}

#[tokio::test]
async fn debug_flag_resets_unless_resupplied() {
    let conn = ScriptedConnection::new(Dialect::Sqlite);
    let mut engine = engine_with(conn, 1);

    engine
        .query_with(
            "UPDATE t SET a = 1",
            &Bindings::new(),
            Flavor::Bool,
            QueryOptions::default().with_debug(true),
        )
        .await
        .unwrap();
    assert!(engine.config().debug());

    engine
        .query("UPDATE t SET a = 1", &Bindings::new(), Flavor::Bool)
        .await
        .unwrap();
    assert!(!engine.config().debug());
}

#[tokio::test]
async fn connection_receives_dialect_options_and_run_time() {
    let conn = ScriptedConnection::new(Dialect::Mysql);
    let tracker = conn.tracker();
    let mut engine = BatchEngine::new(
        EngineConfig::default().with_max_run_time(Duration::from_secs(7)),
    )
    .with_connection(Box::new(conn));

    engine
        .execute("UPDATE t SET a = 1", &Bindings::new())
        .await
        .unwrap();
    let log = tracker.snapshot();
    assert_eq!(log.max_run_time, Some(Duration::from_secs(7)));
    assert!(log.prepare_options.iter().all(|opts| opts.buffered));
}

#[tokio::test]
async fn list_bindings_expand_before_reaching_the_driver() {
    let conn = ScriptedConnection::new(Dialect::Sqlite);
    let tracker = conn.tracker();
    let mut engine = engine_with(conn, 1);

    engine
        .execute(
            "DELETE FROM t WHERE id IN (:ids) AND flag = :flag",
            &Bindings::new()
                .named("ids", BindValue::List(vec![RowValues::Int(1), RowValues::Int(2)]))
                .named("flag", true),
        )
        .await
        .unwrap();

    let log = tracker.snapshot();
    assert_eq!(
        log.prepares,
        vec!["DELETE FROM t WHERE id IN (:ids__0, :ids__1) AND flag = :flag"]
    );
    let bound = &log.bound[0];
    assert!(bound.contains(&(Placeholder::named("ids__1"), RowValues::Int(2))));
    assert!(bound.contains(&(Placeholder::named("flag"), RowValues::Int(1))));
}

#[tokio::test]
async fn missing_connection_and_provider_is_a_connection_error() {
    let mut engine = BatchEngine::default();
    let err = engine
        .execute("UPDATE t SET a = 1", &Bindings::new())
        .await
        .unwrap_err();
    assert!(matches!(err, SqlBatchError::ConnectionError(_)));
}

#[tokio::test]
async fn connection_can_be_taken_back() {
    let mut engine = engine_with(ScriptedConnection::new(Dialect::Sqlite), 1);
    engine.execute("UPDATE t SET a = 1", &Bindings::new()).await.unwrap();
    let conn = engine.take_connection().unwrap();
    assert_eq!(conn.dialect(), Dialect::Sqlite);
    assert!(!conn.in_transaction());
    assert!(!engine.state().has_connection());
}
