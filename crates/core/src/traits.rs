//! Storage abstraction the DDL manager orchestrates.
//!
//! The production implementation talks to TimescaleDB; tests drive the
//! manager through [`crate::mocks::MockHistoryStore`].

use async_trait::async_trait;

use crate::error::HistoryResult;
use crate::types::{
    ChildLink, ChildSetupOutcome, HyperTableInfo, HyperTableSettings, RetentionOutcome,
};

/// Backend operations on the history schema.
///
/// Every method issues its own statements and, where it runs more than one,
/// its own transaction. Errors carry the table and operation that failed.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// List the hypertables of the history schema, ordered by name.
    ///
    /// Failure is reported as `HistoryError::CatalogList`.
    async fn list_hypertables(&self) -> HistoryResult<Vec<String>>;

    /// Apply chunk interval and retention to one hypertable.
    ///
    /// The chunk interval is always applied. Retention is only replaced when
    /// the table already has a policy, otherwise `RetentionOutcome::NoPolicy`.
    async fn configure_hypertable(
        &self,
        table: &str,
        settings: &HyperTableSettings,
    ) -> HistoryResult<RetentionOutcome>;

    /// Drop and recreate the snapshot view of one table in a single transaction.
    async fn recreate_view(&self, table: &str) -> HistoryResult<()>;

    /// Drop the snapshot views of `tables` in a single transaction.
    async fn drop_views(&self, tables: &[String]) -> HistoryResult<()>;

    /// Install the history schema and stored routines in a single transaction.
    async fn install_routines(&self) -> HistoryResult<()>;

    /// Promote `history.<table>` to a parent hypertable with a default policy.
    async fn promote_parent(&self, table: &str) -> HistoryResult<RetentionOutcome>;

    /// Promote a child table and link its cascade-delete trigger.
    async fn promote_child(&self, link: &ChildLink) -> HistoryResult<ChildSetupOutcome>;

    /// Chunk interval and retention of every hypertable, ordered by name.
    async fn describe_hypertables(&self) -> HistoryResult<Vec<HyperTableInfo>>;

    /// Release the underlying connections.
    async fn close(&self);
}
