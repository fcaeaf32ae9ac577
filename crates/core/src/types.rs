//! Domain types shared by the history store, the manager and the CLI.

use serde::{Deserialize, Serialize};

/// Namespace holding the partitioned history tables and the stored routines.
pub const HISTORY_SCHEMA: &str = "history";

/// Partition key of every history table: when the snapshot was fetched.
pub const FETCH_DATE_COLUMN: &str = "cq_fetch_date";

/// Default parent key used by cascading deletes.
pub const DEFAULT_PARENT_COLUMN: &str = "cq_id";

/// Returned by the retention-update routine when no policy exists.
pub const NO_RETENTION_POLICY: i32 = -2;

/// Partition and retention settings applied to every hypertable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HyperTableSettings {
    /// Span of each chunk, in hours.
    pub chunk_interval_hours: i32,
    /// Age after which chunks are dropped, in days.
    pub retention_days: i32,
}

/// Result of the retention-update routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RetentionOutcome {
    /// The policy was replaced; the new background job id.
    Updated {
        /// Job id of the recreated policy
        job_id: i32,
    },
    /// The table has no retention policy and none was created.
    NoPolicy,
    /// The routine reported another negative code.
    Skipped {
        /// Raw routine result
        code: i32,
    },
}

impl RetentionOutcome {
    /// Interpret a raw routine result.
    pub fn from_code(code: i32) -> Self {
        match code {
            NO_RETENTION_POLICY => RetentionOutcome::NoPolicy,
            job_id if job_id >= 0 => RetentionOutcome::Updated { job_id },
            code => RetentionOutcome::Skipped { code },
        }
    }

    /// Raw routine result.
    pub fn code(&self) -> i32 {
        match self {
            RetentionOutcome::Updated { job_id } => *job_id,
            RetentionOutcome::NoPolicy => NO_RETENTION_POLICY,
            RetentionOutcome::Skipped { code } => *code,
        }
    }

    /// Job id, when a policy is in effect.
    pub fn job_id(&self) -> Option<i32> {
        match self {
            RetentionOutcome::Updated { job_id } => Some(*job_id),
            _ => None,
        }
    }
}

/// Result of the child-setup routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChildSetupOutcome {
    /// The cascade trigger was installed.
    TriggerCreated,
    /// A trigger of that name was already present.
    TriggerExisted,
}

impl ChildSetupOutcome {
    /// Interpret a raw routine result (0 created, 1 existed).
    pub fn from_code(code: i32) -> Self {
        if code == 0 {
            ChildSetupOutcome::TriggerCreated
        } else {
            ChildSetupOutcome::TriggerExisted
        }
    }
}

/// Parent/child linkage for cascading deletes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildLink {
    /// Child history table
    pub table: String,
    /// Child column holding the parent key
    pub column: String,
    /// Parent history table
    pub parent_table: String,
    /// Parent key column
    pub parent_column: String,
}

impl ChildLink {
    /// Link `table.column` to the parent's default key column.
    pub fn new(
        table: impl Into<String>,
        column: impl Into<String>,
        parent_table: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            parent_table: parent_table.into(),
            parent_column: DEFAULT_PARENT_COLUMN.to_string(),
        }
    }

    /// Override the parent key column.
    pub fn with_parent_column(mut self, parent_column: impl Into<String>) -> Self {
        self.parent_column = parent_column.into();
        self
    }
}

/// A retention job as reported by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    /// Background job id
    pub job_id: i32,
    /// Interval after which chunks are dropped, as rendered by the server
    pub drop_after: String,
}

/// Catalog view of one hypertable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HyperTableInfo {
    /// Table name inside the history schema
    pub name: String,
    /// Chunk interval, as rendered by the server
    pub chunk_interval: Option<String>,
    /// Retention policy, if any
    pub retention: Option<RetentionPolicy>,
}

/// What happened to one table during reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableReconciliation {
    /// Table name
    pub table: String,
    /// Outcome of the retention update
    pub retention: RetentionOutcome,
}

/// Tables processed by a reconciliation pass, in processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileSummary {
    /// Per-table results
    pub tables: Vec<TableReconciliation>,
}

impl ReconcileSummary {
    /// Number of tables reconciled.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Whether no table was reconciled.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Table names in processing order.
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.table.as_str()).collect()
    }
}
