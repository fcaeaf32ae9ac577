//! Snapshot views over history tables.

use sqlx::PgPool;
use tracing::debug;

use tsdbhistory_core::{DdlOperation, Dialect, HistoryError, HistoryResult};

use crate::statement::SnapshotViewSql;

/// Drop and recreate the snapshot view of `table` in one transaction.
///
/// `CREATE OR REPLACE VIEW` cannot be used: PostgreSQL only lets a replacement
/// append columns, while a migration may rename, retype or drop them. Running
/// both statements in one transaction means no other session ever sees the
/// view missing.
pub async fn recreate_view(
    pool: &PgPool,
    dialect: &dyn Dialect,
    view_schema: &str,
    table: &str,
) -> HistoryResult<()> {
    let sql = SnapshotViewSql::new(dialect, view_schema, table)?;

    let mut tx = pool
        .begin()
        .await
        .map_err(|e| HistoryError::transaction(DdlOperation::CreateView, Some(table), e))?;

    sqlx::query(&sql.drop)
        .execute(&mut *tx)
        .await
        .map_err(|e| HistoryError::ddl(DdlOperation::DropView, table, e))?;

    sqlx::query(&sql.create)
        .execute(&mut *tx)
        .await
        .map_err(|e| HistoryError::ddl(DdlOperation::CreateView, table, e))?;

    tx.commit()
        .await
        .map_err(|e| HistoryError::transaction(DdlOperation::CreateView, Some(table), e))?;
    debug!(table, view_schema, "recreated snapshot view");
    Ok(())
}

/// Drop the snapshot views of `tables` in one transaction.
///
/// The first failure rolls the whole unit back: either every view is gone or
/// none is.
pub async fn drop_views(
    pool: &PgPool,
    dialect: &dyn Dialect,
    view_schema: &str,
    tables: &[String],
) -> HistoryResult<()> {
    let statements = tables
        .iter()
        .map(|table| SnapshotViewSql::drop_only(dialect, view_schema, table).map(|sql| (table, sql)))
        .collect::<HistoryResult<Vec<_>>>()?;

    let mut tx = pool
        .begin()
        .await
        .map_err(|e| HistoryError::transaction(DdlOperation::DropViews, None, e))?;

    for (table, sql) in &statements {
        sqlx::query(sql)
            .execute(&mut *tx)
            .await
            .map_err(|e| HistoryError::ddl(DdlOperation::DropView, table.as_str(), e))?;
        debug!(table = table.as_str(), "dropped snapshot view");
    }

    tx.commit()
        .await
        .map_err(|e| HistoryError::transaction(DdlOperation::DropViews, None, e))
}
