//! tsdbhistory-core
//!
//! Domain types, configuration, dialect resolution and errors for history
//! tables kept in TimescaleDB. Database access lives in
//! `tsdbhistory-sql-timescale`; this crate only describes what the store does.

#![warn(missing_docs)]

pub mod config;
pub mod dialect;
pub mod error;
pub mod ident;
pub mod mocks;
pub mod traits;
pub mod types;

pub use config::{ConnectionOptions, HistoryConfig};
pub use dialect::{get_dialect, Dialect, DialectType};
pub use error::{DdlOperation, HistoryError, HistoryResult};
pub use traits::HistoryStore;
pub use types::{
    ChildLink, ChildSetupOutcome, HyperTableInfo, HyperTableSettings, ReconcileSummary,
    RetentionOutcome, RetentionPolicy, TableReconciliation, DEFAULT_PARENT_COLUMN,
    FETCH_DATE_COLUMN, HISTORY_SCHEMA, NO_RETENTION_POLICY,
};
