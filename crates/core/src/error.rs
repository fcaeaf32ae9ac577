//! Error types for history DDL operations.
//!
//! Every database failure is wrapped together with the operation that issued
//! it and, where one exists, the table it targeted. Nothing in this workspace
//! recovers locally: errors travel to the migration runner unchanged in kind.

use std::fmt;

use thiserror::Error;

use crate::dialect::DialectType;

/// Result type for history operations.
pub type HistoryResult<T> = Result<T, HistoryError>;

/// A single DDL/DML step that can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DdlOperation {
    /// Enumerating the hypertables of the history schema.
    ListHypertables,
    /// Reading chunk and retention settings from the catalog.
    DescribeHypertables,
    /// Installing the history schema and stored routines.
    InstallRoutines,
    /// Dropping every snapshot view.
    DropViews,
    /// Dropping a single snapshot view.
    DropView,
    /// Creating a single snapshot view.
    CreateView,
    /// Applying `set_chunk_time_interval`.
    SetChunkInterval,
    /// Calling the retention-update routine.
    UpdateRetention,
    /// Calling the parent-setup routine.
    PromoteParent,
    /// Calling the child-setup routine.
    PromoteChild,
    /// A full reconciliation pass.
    Reconcile,
    /// Applying chunk interval and retention to one table.
    ConfigureHypertable,
    /// Dropping and recreating one snapshot view.
    RecreateView,
}

impl DdlOperation {
    /// Stable snake_case name, used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            DdlOperation::ListHypertables => "list_hypertables",
            DdlOperation::DescribeHypertables => "describe_hypertables",
            DdlOperation::InstallRoutines => "install_routines",
            DdlOperation::DropViews => "drop_views",
            DdlOperation::DropView => "drop_view",
            DdlOperation::CreateView => "create_view",
            DdlOperation::SetChunkInterval => "set_chunk_interval",
            DdlOperation::UpdateRetention => "update_retention",
            DdlOperation::PromoteParent => "promote_parent",
            DdlOperation::PromoteChild => "promote_child",
            DdlOperation::Reconcile => "reconcile",
            DdlOperation::ConfigureHypertable => "configure_hypertable",
            DdlOperation::RecreateView => "recreate_view",
        }
    }
}

impl fmt::Display for DdlOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by the history subsystem.
#[derive(Error, Debug)]
pub enum HistoryError {
    /// The requested backend cannot host history tables.
    #[error("history is only supported on timescaledb, got dialect '{0}'")]
    UnsupportedDialect(DialectType),

    /// The dialect identifier could not be parsed.
    #[error("unknown dialect '{0}'")]
    UnknownDialect(String),

    /// An identifier failed validation before reaching SQL.
    #[error("invalid identifier {name:?}: {reason}")]
    InvalidIdentifier {
        /// Offending identifier
        name: String,
        /// Why it was rejected
        reason: &'static str,
    },

    /// The hypertable listing query failed.
    #[error("failed to list hypertables in schema '{schema}': {source}")]
    CatalogList {
        /// Schema that was being listed
        schema: String,
        /// Underlying database error
        #[source]
        source: sqlx::Error,
    },

    /// A single statement failed.
    #[error("{operation} failed{}: {source}", table_suffix(.table))]
    Ddl {
        /// Step that failed
        operation: DdlOperation,
        /// Target table, if the statement had one
        table: Option<String>,
        /// Underlying database error
        #[source]
        source: sqlx::Error,
    },

    /// A multi-statement unit could not be started or committed.
    #[error("transaction for {operation} failed{}: {source}", table_suffix(.table))]
    Transaction {
        /// Unit that failed
        operation: DdlOperation,
        /// Target table, if the unit was per-table
        table: Option<String>,
        /// Underlying database error
        #[source]
        source: sqlx::Error,
    },

    /// The caller cancelled the operation.
    #[error("{operation} was cancelled{}", table_suffix(.table))]
    Cancelled {
        /// Step that was interrupted or never started
        operation: DdlOperation,
        /// Table in flight, if the step was per-table
        table: Option<String>,
    },

    /// The connection pool could not be established.
    #[error("database connection error: {0}")]
    Connection(#[source] sqlx::Error),

    /// Configuration was missing or malformed.
    #[error("configuration error: {0}")]
    Config(String),
}

fn table_suffix(table: &Option<String>) -> String {
    match table {
        Some(table) => format!(" for table '{table}'"),
        None => String::new(),
    }
}

impl HistoryError {
    /// Create a statement error scoped to a table.
    pub fn ddl(operation: DdlOperation, table: impl Into<String>, source: sqlx::Error) -> Self {
        Self::Ddl {
            operation,
            table: Some(table.into()),
            source,
        }
    }

    /// Create a statement error with no table scope.
    pub fn ddl_unscoped(operation: DdlOperation, source: sqlx::Error) -> Self {
        Self::Ddl {
            operation,
            table: None,
            source,
        }
    }

    /// Create a transaction error.
    pub fn transaction(
        operation: DdlOperation,
        table: Option<&str>,
        source: sqlx::Error,
    ) -> Self {
        Self::Transaction {
            operation,
            table: table.map(str::to_string),
            source,
        }
    }

    /// Create a cancellation error.
    pub fn cancelled(operation: DdlOperation, table: Option<&str>) -> Self {
        Self::Cancelled {
            operation,
            table: table.map(str::to_string),
        }
    }

    /// Create a configuration error.
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an identifier validation error.
    pub fn invalid_identifier(name: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidIdentifier {
            name: name.into(),
            reason,
        }
    }

    /// The table this error is attributed to, if any.
    pub fn table(&self) -> Option<&str> {
        match self {
            HistoryError::Ddl { table, .. }
            | HistoryError::Transaction { table, .. }
            | HistoryError::Cancelled { table, .. } => table.as_deref(),
            _ => None,
        }
    }

    /// The failing operation, if the error came from a database step.
    pub fn operation(&self) -> Option<DdlOperation> {
        match self {
            HistoryError::CatalogList { .. } => Some(DdlOperation::ListHypertables),
            HistoryError::Ddl { operation, .. }
            | HistoryError::Transaction { operation, .. }
            | HistoryError::Cancelled { operation, .. } => Some(*operation),
            _ => None,
        }
    }

    /// Whether a caller-side retry could plausibly succeed.
    ///
    /// This layer never retries on its own.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            HistoryError::Connection(_) | HistoryError::Transaction { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn injected() -> sqlx::Error {
        sqlx::Error::Protocol("boom".to_string())
    }

    #[test]
    fn test_unsupported_dialect_message() {
        let err = HistoryError::UnsupportedDialect(DialectType::Postgres);
        assert_eq!(
            err.to_string(),
            "history is only supported on timescaledb, got dialect 'postgres'"
        );
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_ddl_error_carries_table_and_operation() {
        let err = HistoryError::ddl(DdlOperation::SetChunkInterval, "accounts", injected());
        assert_eq!(err.table(), Some("accounts"));
        assert_eq!(err.operation(), Some(DdlOperation::SetChunkInterval));
        let message = err.to_string();
        assert!(message.starts_with("set_chunk_interval failed for table 'accounts':"));
        assert!(message.contains("boom"));
    }

    #[test]
    fn test_unscoped_ddl_error_omits_table() {
        let err = HistoryError::ddl_unscoped(DdlOperation::InstallRoutines, injected());
        assert_eq!(err.table(), None);
        assert!(err.to_string().starts_with("install_routines failed:"));
    }

    #[test]
    fn test_transaction_error_is_retryable() {
        let err = HistoryError::transaction(DdlOperation::DropViews, None, injected());
        assert!(err.is_retryable());
        assert_eq!(err.operation(), Some(DdlOperation::DropViews));
    }

    #[test]
    fn test_cancellation_names_table_in_flight() {
        let err = HistoryError::cancelled(DdlOperation::RecreateView, Some("orders"));
        assert_eq!(err.table(), Some("orders"));
        assert_eq!(err.operation(), Some(DdlOperation::RecreateView));
        assert_eq!(
            err.to_string(),
            "recreate_view was cancelled for table 'orders'"
        );
        assert!(!err.is_retryable());

        let unscoped = HistoryError::cancelled(DdlOperation::ListHypertables, None);
        assert_eq!(unscoped.table(), None);
        assert_eq!(unscoped.to_string(), "list_hypertables was cancelled");
    }

    #[test]
    fn test_catalog_list_reports_listing_operation() {
        let err = HistoryError::CatalogList {
            schema: "history".to_string(),
            source: injected(),
        };
        assert_eq!(err.operation(), Some(DdlOperation::ListHypertables));
        assert!(err.to_string().contains("schema 'history'"));
    }
}
