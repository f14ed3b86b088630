#![cfg(feature = "sqlite")]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use sql_batch::prelude::*;
use tempfile::TempDir;

fn db_path(dir: &TempDir) -> PathBuf {
    dir.path().join("batch.db")
}

async fn seeded_engine() -> BatchEngine {
    let conn = SqliteConnection::open_in_memory().expect("in-memory sqlite");
    let mut engine = BatchEngine::new(EngineConfig::default()).with_connection(Box::new(conn));
    engine
        .execute(
            "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL, team TEXT);
             INSERT INTO users (name, team) VALUES ('ann', 'red');
             INSERT INTO users (name, team) VALUES ('bob', 'blue');
             INSERT INTO users (name, team) VALUES ('cat', 'red');",
            &Bindings::new(),
        )
        .await
        .expect("seed");
    engine
}

#[tokio::test]
async fn every_flavor_against_a_real_database() -> Result<(), SqlBatchError> {
    let mut engine = seeded_engine().await;
    let none = Bindings::new();

    let rows = engine.all("SELECT id, name FROM users ORDER BY id", &none).await?;
    assert_eq!(rows.len(), 3);
    assert_eq!(rows.results[1].get("name"), Some(&RowValues::Text("bob".into())));

    let row = engine
        .row("SELECT name FROM users WHERE team = :team ORDER BY id", &Bindings::new().named("team", "red"))
        .await?
        .expect("a red user");
    assert_eq!(row.get("name"), Some(&RowValues::Text("ann".into())));

    let missing = engine
        .row("SELECT name FROM users WHERE team = 'green'", &none)
        .await?;
    assert!(missing.is_none());

    let names = engine.column("SELECT id, name FROM users ORDER BY id", 1, &none).await?;
    assert_eq!(
        names,
        vec![
            RowValues::Text("ann".into()),
            RowValues::Text("bob".into()),
            RowValues::Text("cat".into())
        ]
    );

    let pairs = engine.pairs("SELECT id, name FROM users ORDER BY id", &none).await?;
    assert_eq!(pairs[2], (RowValues::Int(3), RowValues::Text("cat".into())));

    let by_team = engine.unique("SELECT team, name FROM users ORDER BY id", &none).await?;
    assert_eq!(by_team.len(), 2);
    assert_eq!(by_team[0].0, RowValues::Text("red".into()));
    assert_eq!(by_team[0].1.get("name"), Some(&RowValues::Text("cat".into())));

    assert_eq!(engine.count("SELECT COUNT(*) FROM users", &none).await?, 3);
    assert!(engine.exists("SELECT 1 FROM users WHERE name = 'bob'", &none).await?);
    assert!(!engine.exists("SELECT 1 FROM users WHERE name = 'zed'", &none).await?);
    assert_eq!(
        engine.value("SELECT name FROM users WHERE id = ?1", &Bindings::new().positional(1, 2_i64)).await?,
        Some(RowValues::Text("bob".into()))
    );
    Ok(())
}

#[tokio::test]
async fn insert_reports_rowid_and_affected_sums() -> Result<(), SqlBatchError> {
    let mut engine = seeded_engine().await;

    let id = engine
        .insert("INSERT INTO users (name) VALUES (:name)", &Bindings::new().named("name", "dan"))
        .await?;
    assert_eq!(id.as_i64(), Some(4));

    let changed = engine
        .affected(
            "UPDATE users SET team = 'blue' WHERE team = 'red'; DELETE FROM users WHERE name = 'dan'",
            &Bindings::new(),
        )
        .await?;
    assert_eq!(changed, 3);
    assert_eq!(engine.stats().timings_for("DELETE FROM users WHERE name = 'dan'").len(), 1);
    Ok(())
}

#[tokio::test]
async fn failed_batch_leaves_no_partial_writes() -> Result<(), SqlBatchError> {
    let mut engine = seeded_engine().await;

    let err = engine
        .execute(
            "INSERT INTO users (name) VALUES ('eve'); INSERT INTO nowhere VALUES (1)",
            &Bindings::new(),
        )
        .await
        .unwrap_err();
    match &err {
        SqlBatchError::Execution { statement, .. } => {
            assert_eq!(statement, "INSERT INTO nowhere VALUES (1)");
        }
        other => panic!("expected execution error, got {other:?}"),
    }
    assert_eq!(engine.count("SELECT COUNT(*) FROM users", &Bindings::new()).await?, 3);
    Ok(())
}

#[tokio::test]
async fn comment_only_input_is_rejected_before_sqlite_sees_it() -> Result<(), SqlBatchError> {
    let mut engine = seeded_engine().await;
    engine
        .affected("UPDATE users SET team = 'green' WHERE id = 1", &Bindings::new())
        .await?;

    let err = engine.execute("-- just a note", &Bindings::new()).await.unwrap_err();
    assert!(err.is_validation(), "got {err:?}");
    assert_eq!(engine.envelope().last_affected, 1);
    Ok(())
}

#[tokio::test]
async fn typed_bindings_reach_sqlite() -> Result<(), SqlBatchError> {
    let mut engine = seeded_engine().await;

    let found = engine
        .column(
            "SELECT name FROM users WHERE id IN (:ids) AND name LIKE :pattern ORDER BY id",
            0,
            &Bindings::new()
                .named("ids", BindValue::List(vec![RowValues::Int(1), RowValues::Int(3)]))
                .named("pattern", BindValue::like("a", LikeMode::Contains)),
        )
        .await?;
    assert_eq!(found, vec![RowValues::Text("ann".into()), RowValues::Text("cat".into())]);

    let none = engine
        .count(
            "SELECT COUNT(*) FROM users WHERE id IN (:ids)",
            &Bindings::new().named("ids", BindValue::List(Vec::new())),
        )
        .await?;
    assert_eq!(none, 0);
    Ok(())
}

#[tokio::test]
async fn shared_bindings_skip_statements_that_do_not_use_them() -> Result<(), SqlBatchError> {
    let mut engine = seeded_engine().await;

    engine
        .execute(
            vec![
                ("UPDATE users SET team = :team WHERE id = 1", Bindings::new()),
                ("DELETE FROM users WHERE id = :id", Bindings::new().named("id", 2_i64)),
            ],
            &Bindings::new().named("team", "gold"),
        )
        .await?;
    assert_eq!(
        engine.value("SELECT team FROM users WHERE id = 1", &Bindings::new()).await?,
        Some(RowValues::Text("gold".into()))
    );
    assert_eq!(engine.count("SELECT COUNT(*) FROM users", &Bindings::new()).await?, 2);
    Ok(())
}

#[tokio::test]
async fn provider_supplies_a_pooled_connection() -> Result<(), SqlBatchError> {
    let dir = tempfile::tempdir().expect("tempdir");
    let provider = SqliteProvider::open(db_path(&dir)).await?;
    let mut engine = BatchEngine::new(EngineConfig::default()).with_provider(Arc::new(provider));

    engine
        .execute("CREATE TABLE kv (k TEXT PRIMARY KEY, v INTEGER)", &Bindings::new())
        .await?;
    assert!(engine.state().has_connection());
    engine
        .execute("INSERT INTO kv VALUES ('a', 1); INSERT INTO kv VALUES ('b', 2)", &Bindings::new())
        .await?;
    let total = engine.count("SELECT SUM(v) FROM kv", &Bindings::new()).await?;
    assert_eq!(total, 3);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn held_write_lock_exhausts_retries() -> Result<(), SqlBatchError> {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = db_path(&dir);

    let holder = SqliteConnection::open(&path).await?;
    let handle = holder.handle();
    {
        let guard = handle.lock().await;
        guard
            .execute_batch("CREATE TABLE t (a INTEGER); BEGIN IMMEDIATE; INSERT INTO t VALUES (1);")
            .expect("take write lock");
    }

    let conn = SqliteConnection::open(&path).await?;
    let mut engine = BatchEngine::new(
        EngineConfig::default()
            .with_max_tries(2)
            .with_sleep(Duration::from_secs(1))
            .with_max_run_time(Duration::from_secs(1)),
    )
    .with_connection(Box::new(conn));

    let err = engine
        .execute("INSERT INTO t VALUES (2)", &Bindings::new())
        .await
        .unwrap_err();
    assert!(matches!(err, SqlBatchError::RetriesExhausted { max_tries: 2, .. }), "{err}");
    assert_eq!(classify(Dialect::Sqlite, err.driver_error().expect("driver error")), Outcome::Retryable);

    handle.lock().await.execute_batch("ROLLBACK").expect("release lock");
    Ok(())
}
