//! Shared setup for TimescaleDB integration tests.
//!
//! Tests run only when `PG_TEST_DSN` points at a database with the
//! `timescaledb` extension available; otherwise they return early.

#![allow(dead_code)]

use anyhow::Result;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tsdbhistory_core::{DialectType, HistoryConfig};
use tsdbhistory_sql_timescale::DdlManager;

/// Connect to the test database, or `None` when `PG_TEST_DSN` is unset.
pub async fn test_pool() -> Result<Option<PgPool>> {
    let dsn = match std::env::var("PG_TEST_DSN") {
        Ok(value) => value,
        Err(_) => return Ok(None),
    };
    let pool = PgPoolOptions::new().max_connections(2).connect(&dsn).await?;
    reset_history(&pool).await?;
    Ok(Some(pool))
}

/// Drop the history schema along with every view that depends on it.
pub async fn reset_history(pool: &PgPool) -> Result<()> {
    sqlx::query("CREATE EXTENSION IF NOT EXISTS timescaledb")
        .execute(pool)
        .await?;
    sqlx::query("DROP SCHEMA IF EXISTS history CASCADE")
        .execute(pool)
        .await?;
    Ok(())
}

/// Manager over `pool` with views in `public`.
pub fn manager(pool: &PgPool, retention_days: i32) -> Result<DdlManager> {
    let config = HistoryConfig {
        retention_days,
        ..HistoryConfig::default()
    };
    Ok(DdlManager::new(pool.clone(), config, DialectType::TimescaleDb)?)
}

/// Create `history.<name>` with the fetch columns plus `columns`.
pub async fn create_history_table(pool: &PgPool, name: &str, columns: &[&str]) -> Result<()> {
    let mut definition = vec![
        "cq_id text NOT NULL".to_string(),
        "cq_fetch_date timestamp without time zone NOT NULL".to_string(),
    ];
    definition.extend(columns.iter().map(|c| c.to_string()));
    let sql = format!(
        "CREATE TABLE history.\"{name}\" ({})",
        definition.join(", ")
    );
    sqlx::query(&sql).execute(pool).await?;
    Ok(())
}

/// Retention interval of `history.<name>`, as text.
pub async fn retention_of(pool: &PgPool, name: &str) -> Result<Option<String>> {
    let drop_after = sqlx::query_scalar::<_, Option<String>>(
        "SELECT config ->> 'drop_after' FROM timescaledb_information.jobs \
         WHERE proc_name = 'policy_retention' AND hypertable_schema = 'history' \
         AND hypertable_name::text = $1",
    )
    .bind(name)
    .fetch_optional(pool)
    .await?;
    Ok(drop_after.flatten())
}

/// Whether `public.<name>` exists as a view.
pub async fn view_exists(pool: &PgPool, name: &str) -> Result<bool> {
    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (SELECT 1 FROM information_schema.views \
         WHERE table_schema = 'public' AND table_name::text = $1)",
    )
    .bind(name)
    .fetch_one(pool)
    .await?;
    Ok(exists)
}

/// Column names of `public.<name>`, in order.
pub async fn view_columns(pool: &PgPool, name: &str) -> Result<Vec<String>> {
    let columns = sqlx::query_scalar::<_, String>(
        "SELECT column_name::text FROM information_schema.columns \
         WHERE table_schema = 'public' AND table_name::text = $1 ORDER BY ordinal_position",
    )
    .bind(name)
    .fetch_all(pool)
    .await?;
    Ok(columns)
}
