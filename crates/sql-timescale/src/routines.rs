//! Server-side routines backing history tables.
//!
//! The routine bodies are versioned SQL resources under `sql/`, compiled into
//! the binary. Cascading deletes must run inside the database transaction of
//! the triggering delete, so they stay in PL/pgSQL rather than in Rust.

use sqlx::PgPool;
use tracing::debug;

use tsdbhistory_core::{DdlOperation, HistoryError, HistoryResult};

/// Which part of the history machinery a routine implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoutineKind {
    /// `CREATE SCHEMA IF NOT EXISTS history`
    Schema,
    /// `history.setup_tsdb_child`
    ChildSetup,
    /// `history.setup_tsdb_parent`
    ParentSetup,
    /// `history.update_retention`
    RetentionUpdate,
    /// `history.cascade_delete`
    CascadeDelete,
    /// `history.find_latest`
    FindLatest,
}

/// One installable definition.
#[derive(Debug, Clone, Copy)]
pub struct StoredRoutine {
    /// What the routine does
    pub kind: RoutineKind,
    /// Qualified routine name, or the schema name
    pub name: &'static str,
    /// Full `CREATE ...` statement
    pub definition: &'static str,
}

/// Every definition, in installation order. The schema comes first.
pub const ROUTINES: [StoredRoutine; 6] = [
    StoredRoutine {
        kind: RoutineKind::Schema,
        name: "history",
        definition: include_str!("../sql/001_history_schema.sql"),
    },
    StoredRoutine {
        kind: RoutineKind::ChildSetup,
        name: "history.setup_tsdb_child",
        definition: include_str!("../sql/002_setup_tsdb_child.sql"),
    },
    StoredRoutine {
        kind: RoutineKind::ParentSetup,
        name: "history.setup_tsdb_parent",
        definition: include_str!("../sql/003_setup_tsdb_parent.sql"),
    },
    StoredRoutine {
        kind: RoutineKind::RetentionUpdate,
        name: "history.update_retention",
        definition: include_str!("../sql/004_update_retention.sql"),
    },
    StoredRoutine {
        kind: RoutineKind::CascadeDelete,
        name: "history.cascade_delete",
        definition: include_str!("../sql/005_cascade_delete.sql"),
    },
    StoredRoutine {
        kind: RoutineKind::FindLatest,
        name: "history.find_latest",
        definition: include_str!("../sql/006_find_latest.sql"),
    },
];

/// Install the schema and every routine inside one transaction.
///
/// Every definition is `IF NOT EXISTS` or `CREATE OR REPLACE`, so running this
/// on every startup is safe and leaves existing data untouched.
pub async fn install_routines(pool: &PgPool) -> HistoryResult<()> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| HistoryError::transaction(DdlOperation::InstallRoutines, None, e))?;

    for routine in ROUTINES.iter() {
        sqlx::query(routine.definition)
            .execute(&mut *tx)
            .await
            .map_err(|e| HistoryError::ddl(DdlOperation::InstallRoutines, routine.name, e))?;
        debug!(routine = routine.name, "installed history routine");
    }

    tx.commit()
        .await
        .map_err(|e| HistoryError::transaction(DdlOperation::InstallRoutines, None, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_is_installed_first() {
        assert_eq!(ROUTINES[0].kind, RoutineKind::Schema);
        assert!(ROUTINES[0]
            .definition
            .contains("CREATE SCHEMA IF NOT EXISTS history"));
    }

    #[test]
    fn test_five_routines_live_in_history_schema() {
        let routines: Vec<_> = ROUTINES
            .iter()
            .filter(|r| r.kind != RoutineKind::Schema)
            .collect();
        assert_eq!(routines.len(), 5);
        for routine in routines {
            let header = format!("CREATE OR REPLACE FUNCTION {}(", routine.name);
            assert!(
                routine.definition.contains(&header),
                "{} must be created or replaced in place",
                routine.name
            );
        }
    }

    #[test]
    fn test_retention_update_never_creates_missing_policy() {
        let body = ROUTINES
            .iter()
            .find(|r| r.kind == RoutineKind::RetentionUpdate)
            .unwrap()
            .definition;
        assert!(body.contains("IF EXISTS"));
        assert!(body.contains("RETURN -2"));
    }

    #[test]
    fn test_retention_update_resolves_jobs_through_catalog() {
        let body = ROUTINES
            .iter()
            .find(|r| r.kind == RoutineKind::RetentionUpdate)
            .unwrap()
            .definition;
        assert!(body.contains("JOIN pg_catalog.pg_class c"));
        assert!(body.contains("c.oid = _table"));
        assert!(!body.contains("::regclass = _table"));
    }

    #[test]
    fn test_cascade_delete_matches_on_fetch_date() {
        let body = ROUTINES
            .iter()
            .find(|r| r.kind == RoutineKind::CascadeDelete)
            .unwrap()
            .definition;
        assert!(body.contains("cq_fetch_date = %L"));
        assert!(body.contains("RETURN OLD"));
    }

    #[test]
    fn test_parent_setup_is_idempotent() {
        let body = ROUTINES
            .iter()
            .find(|r| r.kind == RoutineKind::ParentSetup)
            .unwrap()
            .definition;
        assert_eq!(body.matches("if_not_exists => true").count(), 2);
    }
}
