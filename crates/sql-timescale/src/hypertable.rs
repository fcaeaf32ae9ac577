//! Partition and retention settings of history hypertables.

use sqlx::PgPool;
use tracing::debug;

use tsdbhistory_core::{
    ChildLink, ChildSetupOutcome, DdlOperation, Dialect, HistoryError, HistoryResult,
    HyperTableSettings, RetentionOutcome,
};

use crate::statement::{
    history_relation, SETUP_CHILD, SETUP_PARENT, SET_CHUNK_INTERVAL, UPDATE_RETENTION,
};

/// Apply `settings` to `history.<table>`.
///
/// The chunk interval is always applied. The retention interval goes through
/// `history.update_retention`, which leaves tables without a policy (child
/// tables, which are cleaned up by their parent's cascade) untouched.
pub async fn configure(
    pool: &PgPool,
    dialect: &dyn Dialect,
    table: &str,
    settings: &HyperTableSettings,
) -> HistoryResult<RetentionOutcome> {
    let relation = history_relation(dialect, table)?;

    sqlx::query(SET_CHUNK_INTERVAL)
        .bind(&relation)
        .bind(settings.chunk_interval_hours)
        .execute(pool)
        .await
        .map_err(|e| HistoryError::ddl(DdlOperation::SetChunkInterval, table, e))?;
    debug!(
        table,
        hours = settings.chunk_interval_hours,
        "updated chunk_time_interval"
    );

    let outcome = update_retention(pool, dialect, table, settings.retention_days).await?;
    debug!(
        table,
        days = settings.retention_days,
        result = outcome.code(),
        "applied data retention policy"
    );
    Ok(outcome)
}

/// Replace the retention policy of `history.<table>` if it has one.
pub async fn update_retention(
    pool: &PgPool,
    dialect: &dyn Dialect,
    table: &str,
    retention_days: i32,
) -> HistoryResult<RetentionOutcome> {
    let relation = history_relation(dialect, table)?;
    let code = sqlx::query_scalar::<_, Option<i32>>(UPDATE_RETENTION)
        .bind(&relation)
        .bind(retention_days)
        .fetch_one(pool)
        .await
        .map_err(|e| HistoryError::ddl(DdlOperation::UpdateRetention, table, e))?;
    Ok(RetentionOutcome::from_code(code.unwrap_or(-1)))
}

/// Promote `history.<table>` to a parent hypertable with the default policy.
pub async fn promote_parent(
    pool: &PgPool,
    dialect: &dyn Dialect,
    table: &str,
) -> HistoryResult<RetentionOutcome> {
    dialect.quote_ident(table)?;
    let code = sqlx::query_scalar::<_, Option<i32>>(SETUP_PARENT)
        .bind(table)
        .fetch_one(pool)
        .await
        .map_err(|e| HistoryError::ddl(DdlOperation::PromoteParent, table, e))?;
    Ok(RetentionOutcome::from_code(code.unwrap_or(-1)))
}

/// Promote a child table and install the cascade trigger on its parent.
pub async fn promote_child(
    pool: &PgPool,
    dialect: &dyn Dialect,
    link: &ChildLink,
) -> HistoryResult<ChildSetupOutcome> {
    for name in [
        &link.table,
        &link.column,
        &link.parent_table,
        &link.parent_column,
    ] {
        dialect.quote_ident(name)?;
    }
    let code = sqlx::query_scalar::<_, i32>(SETUP_CHILD)
        .bind(&link.table)
        .bind(&link.column)
        .bind(&link.parent_table)
        .bind(&link.parent_column)
        .fetch_one(pool)
        .await
        .map_err(|e| HistoryError::ddl(DdlOperation::PromoteChild, link.table.as_str(), e))?;
    Ok(ChildSetupOutcome::from_code(code))
}
