//! TimescaleDB catalog lookups.

use sqlx::{PgPool, Row};

use tsdbhistory_core::{
    DdlOperation, HistoryError, HistoryResult, HyperTableInfo, RetentionPolicy,
};

use crate::statement::{DESCRIBE_HYPERTABLES, LIST_HYPERTABLES};

/// Names of the hypertables in `schema`, ordered by name.
pub async fn list_hypertables(pool: &PgPool, schema: &str) -> HistoryResult<Vec<String>> {
    sqlx::query_scalar::<_, String>(LIST_HYPERTABLES)
        .bind(schema)
        .fetch_all(pool)
        .await
        .map_err(|source| HistoryError::CatalogList {
            schema: schema.to_string(),
            source,
        })
}

/// Chunk interval and retention policy of every hypertable in `schema`.
pub async fn describe_hypertables(
    pool: &PgPool,
    schema: &str,
) -> HistoryResult<Vec<HyperTableInfo>> {
    let rows = sqlx::query(DESCRIBE_HYPERTABLES)
        .bind(schema)
        .fetch_all(pool)
        .await
        .map_err(|e| HistoryError::ddl_unscoped(DdlOperation::DescribeHypertables, e))?;

    rows.iter()
        .map(|row| -> Result<HyperTableInfo, sqlx::Error> {
            let name: String = row.try_get("name")?;
            let chunk_interval: Option<String> = row.try_get("chunk_interval")?;
            let job_id: Option<i32> = row.try_get("job_id")?;
            let drop_after: Option<String> = row.try_get("drop_after")?;
            Ok(HyperTableInfo {
                name,
                chunk_interval,
                retention: job_id.map(|job_id| RetentionPolicy {
                    job_id,
                    drop_after: drop_after.unwrap_or_default(),
                }),
            })
        })
        .collect::<Result<Vec<_>, sqlx::Error>>()
        .map_err(|e| HistoryError::ddl_unscoped(DdlOperation::DescribeHypertables, e))
}
