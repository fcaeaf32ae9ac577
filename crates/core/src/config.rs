//! Configuration for the history subsystem.
//!
//! Values can be embedded in a larger serde-driven configuration or read from
//! the environment. Environment variables use the `TSDB_HISTORY_` prefix.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{HistoryError, HistoryResult};
use crate::ident::validate_ident;
use crate::types::{HyperTableSettings, HISTORY_SCHEMA};

/// Default chunk span in hours.
pub const DEFAULT_CHUNK_INTERVAL_HOURS: i32 = 24;
/// Default retention in days.
pub const DEFAULT_RETENTION_DAYS: i32 = 7;
/// Default namespace for snapshot views.
pub const DEFAULT_VIEW_SCHEMA: &str = "public";

/// Partitioning and retention settings applied during reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Chunk time interval, in hours.
    pub chunk_interval_hours: i32,
    /// Retention window, in days.
    pub retention_days: i32,
    /// Namespace the snapshot views live in.
    pub view_schema: String,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            chunk_interval_hours: DEFAULT_CHUNK_INTERVAL_HOURS,
            retention_days: DEFAULT_RETENTION_DAYS,
            view_schema: DEFAULT_VIEW_SCHEMA.to_string(),
        }
    }
}

impl HistoryConfig {
    /// Load from `TSDB_HISTORY_*` environment variables, falling back to defaults.
    pub fn from_env() -> HistoryResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> HistoryResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let config = Self {
            chunk_interval_hours: parse_var(
                &lookup,
                "TSDB_HISTORY_CHUNK_INTERVAL_HOURS",
                defaults.chunk_interval_hours,
            )?,
            retention_days: parse_var(
                &lookup,
                "TSDB_HISTORY_RETENTION_DAYS",
                defaults.retention_days,
            )?,
            view_schema: lookup("TSDB_HISTORY_VIEW_SCHEMA").unwrap_or(defaults.view_schema),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the server would refuse or that would collide.
    pub fn validate(&self) -> HistoryResult<()> {
        if self.chunk_interval_hours <= 0 {
            return Err(HistoryError::config_error(format!(
                "chunk_interval_hours must be positive, got {}",
                self.chunk_interval_hours
            )));
        }
        if self.retention_days <= 0 {
            return Err(HistoryError::config_error(format!(
                "retention_days must be positive, got {}",
                self.retention_days
            )));
        }
        validate_ident(&self.view_schema)?;
        if self.view_schema == HISTORY_SCHEMA {
            return Err(HistoryError::config_error(
                "view_schema must differ from the history schema, views are named after their tables",
            ));
        }
        Ok(())
    }

    /// Per-table settings derived from this configuration.
    pub fn settings(&self) -> HyperTableSettings {
        HyperTableSettings {
            chunk_interval_hours: self.chunk_interval_hours,
            retention_days: self.retention_days,
        }
    }
}

/// Connection pool tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionOptions {
    /// PostgreSQL connection string.
    pub dsn: String,
    /// Maximum number of pooled connections.
    pub max_connections: u32,
    /// How long to wait for a pooled connection.
    pub acquire_timeout: Duration,
}

impl ConnectionOptions {
    /// Options for `dsn` with default pool sizing.
    pub fn new(dsn: impl Into<String>) -> Self {
        Self {
            dsn: dsn.into(),
            max_connections: 5,
            acquire_timeout: Duration::from_secs(5),
        }
    }

    /// Load from `TSDB_HISTORY_DSN` and friends.
    pub fn from_env() -> HistoryResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> HistoryResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let dsn = lookup("TSDB_HISTORY_DSN")
            .ok_or_else(|| HistoryError::config_error("TSDB_HISTORY_DSN is not set"))?;
        let defaults = Self::new(dsn);
        let max_connections = parse_var(
            &lookup,
            "TSDB_HISTORY_MAX_CONNECTIONS",
            defaults.max_connections,
        )?;
        let acquire_timeout_secs = parse_var(
            &lookup,
            "TSDB_HISTORY_ACQUIRE_TIMEOUT_SECS",
            defaults.acquire_timeout.as_secs(),
        )?;
        if max_connections == 0 {
            return Err(HistoryError::config_error(
                "TSDB_HISTORY_MAX_CONNECTIONS must be at least 1",
            ));
        }
        Ok(Self {
            max_connections,
            acquire_timeout: Duration::from_secs(acquire_timeout_secs),
            ..defaults
        })
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> HistoryResult<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| HistoryError::config_error(format!("{key} has an invalid value '{raw}'"))),
    }
}
