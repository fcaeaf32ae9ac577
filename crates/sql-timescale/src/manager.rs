//! Orchestration of history DDL around schema migrations.
//!
//! The migration runner drives the manager in a strict sequence:
//!
//! ```text
//! install_routines -> drop_all_views -> (schema migration) -> reconcile
//! ```
//!
//! `drop_all_views` and `reconcile` read the hypertable listing and then write
//! views for it, so two such sequences must never interleave against the same
//! database.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use tsdbhistory_core::{
    get_dialect, ChildLink, ChildSetupOutcome, ConnectionOptions, DdlOperation, Dialect,
    DialectType, HistoryConfig, HistoryError, HistoryResult, HistoryStore, HyperTableInfo,
    HyperTableSettings, ReconcileSummary, RetentionOutcome, TableReconciliation,
};
use tsdbhistory_observability as metrics;

use crate::store::TimescaleStore;

/// Sequences routine installation, view teardown and reconciliation.
///
/// The manager owns its store, and with it the connection pool, for its whole
/// life. [`DdlManager::shutdown`] consumes it.
pub struct DdlManager<S = TimescaleStore> {
    store: S,
    config: HistoryConfig,
    dialect: Arc<dyn Dialect>,
}

impl DdlManager<TimescaleStore> {
    /// Build a manager over an existing pool.
    ///
    /// Fails with `UnsupportedDialect` for anything but TimescaleDB. No
    /// statement is issued.
    pub fn new(pool: PgPool, config: HistoryConfig, dialect: DialectType) -> HistoryResult<Self> {
        let dialect = resolve_dialect(dialect)?;
        config.validate()?;
        let store = TimescaleStore::new(pool, Arc::clone(&dialect), config.view_schema.clone());
        Ok(Self {
            store,
            config,
            dialect,
        })
    }

    /// Open a pool and build a manager over it.
    ///
    /// The dialect and configuration are checked before any connection is
    /// attempted.
    pub async fn connect(
        options: &ConnectionOptions,
        config: HistoryConfig,
        dialect: DialectType,
    ) -> HistoryResult<Self> {
        let dialect = resolve_dialect(dialect)?;
        config.validate()?;
        let store =
            TimescaleStore::connect(options, Arc::clone(&dialect), config.view_schema.clone())
                .await?;
        Ok(Self {
            store,
            config,
            dialect,
        })
    }
}

impl<S: HistoryStore> DdlManager<S> {
    /// Build a manager over any store.
    pub fn with_store(store: S, config: HistoryConfig, dialect: DialectType) -> HistoryResult<Self> {
        let dialect = resolve_dialect(dialect)?;
        config.validate()?;
        Ok(Self {
            store,
            config,
            dialect,
        })
    }

    /// Active configuration.
    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    /// Resolved dialect.
    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    /// Install or upgrade the history schema and routines.
    ///
    /// Runs in one transaction and is safe to call on every startup.
    pub async fn install_routines(&self, cancel: &CancellationToken) -> HistoryResult<()> {
        let started = Instant::now();
        run_cancellable(
            cancel,
            DdlOperation::InstallRoutines,
            None,
            self.store.install_routines(),
        )
        .await?;
        metrics::record_routines_installed(started.elapsed());
        info!("installed history routines");
        Ok(())
    }

    /// Drop every snapshot view. Call before a migration that alters tables.
    ///
    /// All views are dropped in one transaction; on failure none is. Returns
    /// the number of views dropped.
    pub async fn drop_all_views(&self, cancel: &CancellationToken) -> HistoryResult<usize> {
        let started = Instant::now();
        let tables = self.list_tables(cancel).await?;
        run_cancellable(
            cancel,
            DdlOperation::DropViews,
            None,
            self.store.drop_views(&tables),
        )
        .await?;
        metrics::record_views_dropped(tables.len(), started.elapsed());
        info!(views = tables.len(), "dropped snapshot views");
        Ok(tables.len())
    }

    /// Configure every hypertable and rebuild its view. Call after a migration.
    ///
    /// Tables are processed one at a time in name order: configuration first,
    /// then the view. The first error stops the pass; tables already processed
    /// keep their committed changes.
    pub async fn reconcile(&self, cancel: &CancellationToken) -> HistoryResult<ReconcileSummary> {
        let started = Instant::now();
        let tables = self.list_tables(cancel).await?;
        let settings = self.config.settings();
        let mut summary = ReconcileSummary::default();

        for table in tables {
            let table_started = Instant::now();
            let retention = match self.reconcile_table(&table, &settings, cancel).await {
                Ok(retention) => retention,
                Err(err) => {
                    let operation = err.operation().unwrap_or(DdlOperation::Reconcile);
                    metrics::record_reconcile_failure(
                        Some(&table),
                        operation.as_str(),
                        &err.to_string(),
                    );
                    warn!(table = table.as_str(), %operation, "reconcile aborted: {err}");
                    return Err(err);
                }
            };
            metrics::record_table_reconciled(&table, retention.code(), table_started.elapsed());
            summary.tables.push(TableReconciliation { table, retention });
        }

        metrics::record_reconcile_latency(summary.len(), started.elapsed());
        info!(tables = summary.len(), "reconciled history tables");
        Ok(summary)
    }

    /// Promote `history.<table>` to a parent hypertable with the default policy.
    pub async fn promote_parent(
        &self,
        table: &str,
        cancel: &CancellationToken,
    ) -> HistoryResult<RetentionOutcome> {
        let outcome = run_cancellable(
            cancel,
            DdlOperation::PromoteParent,
            Some(table),
            self.store.promote_parent(table),
        )
        .await?;
        info!(table, result = outcome.code(), "promoted parent history table");
        Ok(outcome)
    }

    /// Promote a child table and link its cascade-delete trigger.
    pub async fn promote_child(
        &self,
        link: &ChildLink,
        cancel: &CancellationToken,
    ) -> HistoryResult<ChildSetupOutcome> {
        let outcome = run_cancellable(
            cancel,
            DdlOperation::PromoteChild,
            Some(link.table.as_str()),
            self.store.promote_child(link),
        )
        .await?;
        info!(
            table = link.table.as_str(),
            parent = link.parent_table.as_str(),
            ?outcome,
            "promoted child history table"
        );
        Ok(outcome)
    }

    /// Chunk interval and retention of every hypertable.
    pub async fn describe(&self, cancel: &CancellationToken) -> HistoryResult<Vec<HyperTableInfo>> {
        run_cancellable(
            cancel,
            DdlOperation::DescribeHypertables,
            None,
            self.store.describe_hypertables(),
        )
        .await
    }

    /// Close the store. The manager cannot be used afterwards.
    pub async fn shutdown(self) {
        self.store.close().await;
        debug!("history manager shut down");
    }

    async fn list_tables(&self, cancel: &CancellationToken) -> HistoryResult<Vec<String>> {
        let mut tables = run_cancellable(
            cancel,
            DdlOperation::ListHypertables,
            None,
            self.store.list_hypertables(),
        )
        .await?;
        tables.sort();
        tables.dedup();
        Ok(tables)
    }

    async fn reconcile_table(
        &self,
        table: &str,
        settings: &HyperTableSettings,
        cancel: &CancellationToken,
    ) -> HistoryResult<RetentionOutcome> {
        let retention = run_cancellable(
            cancel,
            DdlOperation::ConfigureHypertable,
            Some(table),
            self.store.configure_hypertable(table, settings),
        )
        .await?;
        run_cancellable(
            cancel,
            DdlOperation::RecreateView,
            Some(table),
            self.store.recreate_view(table),
        )
        .await?;
        Ok(retention)
    }
}

fn resolve_dialect(kind: DialectType) -> HistoryResult<Arc<dyn Dialect>> {
    let dialect = get_dialect(kind);
    if !dialect.supports_hypertables() {
        return Err(HistoryError::UnsupportedDialect(kind));
    }
    Ok(dialect)
}

/// Drive `fut` unless `cancel` fires first.
///
/// On cancellation the future is dropped and the caller gets control back
/// at once. No cancel request reaches the server: a statement already sent
/// runs to completion there, after which the connection rolls back any
/// transaction the dropped future left open.
async fn run_cancellable<T, F>(
    cancel: &CancellationToken,
    operation: DdlOperation,
    table: Option<&str>,
    fut: F,
) -> HistoryResult<T>
where
    F: Future<Output = HistoryResult<T>>,
{
    if cancel.is_cancelled() {
        return Err(HistoryError::cancelled(operation, table));
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(HistoryError::cancelled(operation, table)),
        result = fut => result,
    }
}
