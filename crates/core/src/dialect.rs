//! SQL dialects and dialect resolution.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{HistoryError, HistoryResult};
use crate::ident;

/// Supported dialect identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectType {
    /// Plain PostgreSQL.
    Postgres,
    /// PostgreSQL with the TimescaleDB extension.
    #[serde(rename = "timescaledb", alias = "tsdb")]
    TimescaleDb,
}

impl DialectType {
    /// Canonical identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            DialectType::Postgres => "postgres",
            DialectType::TimescaleDb => "timescaledb",
        }
    }
}

impl fmt::Display for DialectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DialectType {
    type Err = HistoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(DialectType::Postgres),
            "timescaledb" | "timescale" | "tsdb" => Ok(DialectType::TimescaleDb),
            other => Err(HistoryError::UnknownDialect(other.to_string())),
        }
    }
}

/// Dialect-specific SQL generation helpers.
pub trait Dialect: Send + Sync + fmt::Debug {
    /// Which dialect this is.
    fn kind(&self) -> DialectType;

    /// Whether the backend can partition tables by time.
    fn supports_hypertables(&self) -> bool;

    /// Quote an identifier.
    fn quote_ident(&self, name: &str) -> HistoryResult<String> {
        ident::quote_ident(name)
    }

    /// Quote a string literal.
    fn quote_literal(&self, value: &str) -> HistoryResult<String> {
        ident::quote_literal(value)
    }

    /// Quote a schema-qualified relation.
    fn qualified_name(&self, schema: &str, name: &str) -> HistoryResult<String> {
        ident::qualified_name(schema, name)
    }
}

/// Plain PostgreSQL.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl Dialect for PostgresDialect {
    fn kind(&self) -> DialectType {
        DialectType::Postgres
    }

    fn supports_hypertables(&self) -> bool {
        false
    }
}

/// PostgreSQL with TimescaleDB.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimescaleDialect;

impl Dialect for TimescaleDialect {
    fn kind(&self) -> DialectType {
        DialectType::TimescaleDb
    }

    fn supports_hypertables(&self) -> bool {
        true
    }
}

/// Resolve a dialect identifier to its SQL helpers.
pub fn get_dialect(kind: DialectType) -> Arc<dyn Dialect> {
    match kind {
        DialectType::Postgres => Arc::new(PostgresDialect),
        DialectType::TimescaleDb => Arc::new(TimescaleDialect),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dialect_aliases() {
        assert_eq!("tsdb".parse::<DialectType>().unwrap(), DialectType::TimescaleDb);
        assert_eq!(
            " TimescaleDB ".parse::<DialectType>().unwrap(),
            DialectType::TimescaleDb
        );
        assert_eq!("postgresql".parse::<DialectType>().unwrap(), DialectType::Postgres);
    }

    #[test]
    fn test_reject_unknown_dialect() {
        let err = "oracle".parse::<DialectType>().unwrap_err();
        assert!(matches!(err, HistoryError::UnknownDialect(ref name) if name == "oracle"));
    }

    #[test]
    fn test_resolved_dialect_matches_kind() {
        for kind in [DialectType::Postgres, DialectType::TimescaleDb] {
            assert_eq!(get_dialect(kind).kind(), kind);
        }
        assert!(get_dialect(DialectType::TimescaleDb).supports_hypertables());
        assert!(!get_dialect(DialectType::Postgres).supports_hypertables());
    }

    #[test]
    fn test_dialect_serde_names() {
        let json = serde_json::to_string(&DialectType::TimescaleDb).unwrap();
        assert_eq!(json, "\"timescaledb\"");
        let parsed: DialectType = serde_json::from_str("\"tsdb\"").unwrap();
        assert_eq!(parsed, DialectType::TimescaleDb);
    }
}
