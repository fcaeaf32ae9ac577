//! End-to-end history DDL against a live TimescaleDB.
//!
//! Run with: PG_TEST_DSN=postgresql://... cargo test --test timescale_history

mod fixtures;

use anyhow::Result;
use serial_test::serial;
use tokio_util::sync::CancellationToken;
use tsdbhistory_core::{ChildLink, ChildSetupOutcome, HistoryError, RetentionOutcome};

use fixtures::{
    create_history_table, manager, retention_of, test_pool, view_columns, view_exists,
};

#[tokio::test]
#[serial]
async fn install_routines_twice_succeeds() -> Result<()> {
    let Some(pool) = test_pool().await? else {
        return Ok(());
    };
    let manager = manager(&pool, 7)?;
    let cancel = CancellationToken::new();

    manager.install_routines(&cancel).await?;
    manager.install_routines(&cancel).await?;

    let installed: i64 = sqlx::query_scalar(
        "SELECT count(*) FROM pg_catalog.pg_proc p \
         JOIN pg_catalog.pg_namespace n ON n.oid = p.pronamespace \
         WHERE n.nspname = 'history' AND p.proname IN \
         ('setup_tsdb_child', 'setup_tsdb_parent', 'update_retention', 'cascade_delete', 'find_latest')",
    )
    .fetch_one(&pool)
    .await?;
    assert_eq!(installed, 5);

    manager.shutdown().await;
    Ok(())
}

#[tokio::test]
#[serial]
async fn reconcile_replaces_only_existing_retention_policies() -> Result<()> {
    let Some(pool) = test_pool().await? else {
        return Ok(());
    };
    let cancel = CancellationToken::new();
    let manager = manager(&pool, 30)?;
    manager.install_routines(&cancel).await?;

    create_history_table(&pool, "users", &["name text"]).await?;
    create_history_table(&pool, "sessions", &["user_cq_id text"]).await?;

    let parent = manager.promote_parent("users", &cancel).await?;
    assert!(parent.job_id().is_some());
    assert_eq!(retention_of(&pool, "users").await?.as_deref(), Some("14 days"));

    let link = ChildLink::new("sessions", "user_cq_id", "users");
    assert_eq!(
        manager.promote_child(&link, &cancel).await?,
        ChildSetupOutcome::TriggerCreated
    );
    assert_eq!(
        manager.promote_child(&link, &cancel).await?,
        ChildSetupOutcome::TriggerExisted
    );

    let summary = manager.reconcile(&cancel).await?;
    assert_eq!(summary.table_names(), vec!["sessions", "users"]);
    assert_eq!(summary.tables[0].retention, RetentionOutcome::NoPolicy);
    assert!(summary.tables[1].retention.job_id().is_some());

    assert_eq!(retention_of(&pool, "users").await?.as_deref(), Some("30 days"));
    assert_eq!(retention_of(&pool, "sessions").await?, None);

    let one_day: bool = sqlx::query_scalar(
        "SELECT time_interval = make_interval(hours => 24) \
         FROM timescaledb_information.dimensions \
         WHERE hypertable_schema = 'history' AND hypertable_name::text = 'users'",
    )
    .fetch_one(&pool)
    .await?;
    assert!(one_day);

    let described = manager.describe(&cancel).await?;
    assert_eq!(described.len(), 2);
    assert!(described[0].retention.is_none());
    assert!(described[1].retention.is_some());

    manager.shutdown().await;
    Ok(())
}

#[tokio::test]
#[serial]
async fn snapshot_view_shows_latest_fetch_only() -> Result<()> {
    let Some(pool) = test_pool().await? else {
        return Ok(());
    };
    let cancel = CancellationToken::new();
    let manager = manager(&pool, 7)?;
    manager.install_routines(&cancel).await?;

    create_history_table(&pool, "accounts", &["balance bigint"]).await?;
    manager.promote_parent("accounts", &cancel).await?;

    sqlx::query(
        "INSERT INTO history.accounts (cq_id, cq_fetch_date, balance) VALUES \
         ('a', now() - interval '2 hours', 1), \
         ('b', now() - interval '2 hours', 2), \
         ('a', now() - interval '1 hour', 3)",
    )
    .execute(&pool)
    .await?;

    manager.reconcile(&cancel).await?;

    let balances: Vec<i64> = sqlx::query_scalar("SELECT balance FROM public.accounts")
        .fetch_all(&pool)
        .await?;
    assert_eq!(balances, vec![3]);

    manager.shutdown().await;
    Ok(())
}

#[tokio::test]
#[serial]
async fn views_follow_column_changes_across_migration() -> Result<()> {
    let Some(pool) = test_pool().await? else {
        return Ok(());
    };
    let cancel = CancellationToken::new();
    let manager = manager(&pool, 7)?;
    manager.install_routines(&cancel).await?;

    create_history_table(&pool, "accounts", &["balance bigint"]).await?;
    create_history_table(&pool, "orders", &["amount bigint"]).await?;
    manager.promote_parent("accounts", &cancel).await?;
    manager.promote_parent("orders", &cancel).await?;
    manager.reconcile(&cancel).await?;
    assert!(view_exists(&pool, "accounts").await?);
    assert!(view_exists(&pool, "orders").await?);

    assert_eq!(manager.drop_all_views(&cancel).await?, 2);
    assert!(!view_exists(&pool, "accounts").await?);
    assert!(!view_exists(&pool, "orders").await?);

    sqlx::query("ALTER TABLE history.accounts RENAME COLUMN balance TO amount_cents")
        .execute(&pool)
        .await?;

    manager.reconcile(&cancel).await?;
    assert_eq!(
        view_columns(&pool, "accounts").await?,
        vec!["cq_id", "cq_fetch_date", "amount_cents"]
    );
    assert!(view_exists(&pool, "orders").await?);

    manager.shutdown().await;
    Ok(())
}

#[tokio::test]
#[serial]
async fn deleting_parent_row_removes_child_rows() -> Result<()> {
    let Some(pool) = test_pool().await? else {
        return Ok(());
    };
    let cancel = CancellationToken::new();
    let manager = manager(&pool, 7)?;
    manager.install_routines(&cancel).await?;

    create_history_table(&pool, "users", &["name text"]).await?;
    create_history_table(&pool, "sessions", &["user_cq_id text"]).await?;
    manager.promote_parent("users", &cancel).await?;
    manager
        .promote_child(&ChildLink::new("sessions", "user_cq_id", "users"), &cancel)
        .await?;

    sqlx::query(
        "INSERT INTO history.users (cq_id, cq_fetch_date, name) \
         VALUES ('u1', '2024-01-01 00:00:00', 'ada'), ('u2', '2024-01-01 00:00:00', 'bob')",
    )
    .execute(&pool)
    .await?;
    sqlx::query(
        "INSERT INTO history.sessions (cq_id, cq_fetch_date, user_cq_id) VALUES \
         ('s1', '2024-01-01 00:00:00', 'u1'), \
         ('s2', '2024-01-01 00:00:00', 'u2'), \
         ('s3', '2024-01-02 00:00:00', 'u1')",
    )
    .execute(&pool)
    .await?;

    sqlx::query("DELETE FROM history.users WHERE cq_id = 'u1'")
        .execute(&pool)
        .await?;

    let remaining: Vec<String> =
        sqlx::query_scalar("SELECT cq_id FROM history.sessions ORDER BY cq_id")
            .fetch_all(&pool)
            .await?;
    assert_eq!(remaining, vec!["s2", "s3"]);

    manager.shutdown().await;
    Ok(())
}

#[tokio::test]
#[serial]
async fn promote_parent_rejects_nul_in_table_name() -> Result<()> {
    let Some(pool) = test_pool().await? else {
        return Ok(());
    };
    let cancel = CancellationToken::new();
    let manager = manager(&pool, 7)?;
    manager.install_routines(&cancel).await?;

    let err = manager
        .promote_parent("users\0", &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, HistoryError::InvalidIdentifier { .. }));

    manager.shutdown().await;
    Ok(())
}
