//! `HistoryStore` implementation backed by TimescaleDB.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::trace;

use tsdbhistory_core::{
    ChildLink, ChildSetupOutcome, ConnectionOptions, Dialect, HistoryError, HistoryResult,
    HistoryStore, HyperTableInfo, HyperTableSettings, RetentionOutcome, HISTORY_SCHEMA,
};

use crate::{catalog, hypertable, routines, view};

/// History store over a PostgreSQL pool with the TimescaleDB extension.
pub struct TimescaleStore {
    pool: PgPool,
    dialect: Arc<dyn Dialect>,
    view_schema: String,
}

impl fmt::Debug for TimescaleStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimescaleStore")
            .field("dialect", &self.dialect.kind())
            .field("view_schema", &self.view_schema)
            .finish_non_exhaustive()
    }
}

impl TimescaleStore {
    /// Wrap an existing pool. No connection is made.
    pub fn new(pool: PgPool, dialect: Arc<dyn Dialect>, view_schema: impl Into<String>) -> Self {
        Self {
            pool,
            dialect,
            view_schema: view_schema.into(),
        }
    }

    /// Open a pool using `options`.
    pub async fn connect(
        options: &ConnectionOptions,
        dialect: Arc<dyn Dialect>,
        view_schema: impl Into<String>,
    ) -> HistoryResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(options.max_connections)
            .acquire_timeout(options.acquire_timeout)
            .connect(&options.dsn)
            .await
            .map_err(HistoryError::Connection)?;
        Ok(Self::new(pool, dialect, view_schema))
    }

    /// Namespace the snapshot views are created in.
    pub fn view_schema(&self) -> &str {
        &self.view_schema
    }
}

#[async_trait]
impl HistoryStore for TimescaleStore {
    async fn list_hypertables(&self) -> HistoryResult<Vec<String>> {
        trace!(schema = HISTORY_SCHEMA, "listing hypertables");
        catalog::list_hypertables(&self.pool, HISTORY_SCHEMA).await
    }

    async fn configure_hypertable(
        &self,
        table: &str,
        settings: &HyperTableSettings,
    ) -> HistoryResult<RetentionOutcome> {
        hypertable::configure(&self.pool, self.dialect.as_ref(), table, settings).await
    }

    async fn recreate_view(&self, table: &str) -> HistoryResult<()> {
        view::recreate_view(&self.pool, self.dialect.as_ref(), &self.view_schema, table).await
    }

    async fn drop_views(&self, tables: &[String]) -> HistoryResult<()> {
        view::drop_views(&self.pool, self.dialect.as_ref(), &self.view_schema, tables).await
    }

    async fn install_routines(&self) -> HistoryResult<()> {
        routines::install_routines(&self.pool).await
    }

    async fn promote_parent(&self, table: &str) -> HistoryResult<RetentionOutcome> {
        hypertable::promote_parent(&self.pool, self.dialect.as_ref(), table).await
    }

    async fn promote_child(&self, link: &ChildLink) -> HistoryResult<ChildSetupOutcome> {
        hypertable::promote_child(&self.pool, self.dialect.as_ref(), link).await
    }

    async fn describe_hypertables(&self) -> HistoryResult<Vec<HyperTableInfo>> {
        catalog::describe_hypertables(&self.pool, HISTORY_SCHEMA).await
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
