//! tsdbhistory-sql-timescale
//!
//! TimescaleDB backend for history tables.
//!
//! Every table in the `history` schema is a hypertable partitioned on
//! `cq_fetch_date`. This crate keeps those tables configured and gives each one
//! a snapshot view in the view schema that shows only the latest fetch.
//!
//! # Architecture
//!
//! - [`routines`]: the history schema and PL/pgSQL routines, installed in one transaction
//! - [`hypertable`]: chunk interval, retention and parent/child promotion
//! - [`view`]: snapshot view drop and rebuild
//! - [`catalog`]: hypertable listing from `timescaledb_information`
//! - [`store`]: [`TimescaleStore`], the `HistoryStore` over a `PgPool`
//! - [`manager`]: [`DdlManager`], the migration-facing entry point
//!
//! # Usage Example
//!
//! ```ignore
//! use tokio_util::sync::CancellationToken;
//! use tsdbhistory_core::{ConnectionOptions, DialectType, HistoryConfig};
//! use tsdbhistory_sql_timescale::DdlManager;
//!
//! let options = ConnectionOptions::from_env()?;
//! let manager = DdlManager::connect(&options, HistoryConfig::from_env()?, DialectType::TimescaleDb).await?;
//! let cancel = CancellationToken::new();
//!
//! manager.install_routines(&cancel).await?;
//! manager.drop_all_views(&cancel).await?;
//! // run schema migrations here
//! manager.reconcile(&cancel).await?;
//! manager.shutdown().await;
//! ```
//!
//! # Concurrency
//!
//! Calls are sequential. Two managers must not run `drop_all_views` or
//! `reconcile` against the same database at the same time.

#![warn(missing_docs)]

pub mod catalog;
pub mod hypertable;
pub mod manager;
pub mod routines;
pub mod statement;
pub mod store;
pub mod view;

pub use manager::DdlManager;
pub use store::TimescaleStore;
