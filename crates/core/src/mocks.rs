//! In-memory [`HistoryStore`] for testing orchestration without a database.
//!
//! The mock keeps a table list, the set of existing views and the retention
//! policies, records every call in order, and can be told to fail a given
//! operation (optionally for one table only).

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::{DdlOperation, HistoryError, HistoryResult};
use crate::traits::HistoryStore;
use crate::types::{
    ChildLink, ChildSetupOutcome, HyperTableInfo, HyperTableSettings, RetentionOutcome,
    RetentionPolicy, HISTORY_SCHEMA,
};

/// A call observed by the mock, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    /// `list_hypertables`
    ListHypertables,
    /// `configure_hypertable`
    Configure {
        /// Target table
        table: String,
        /// Applied settings
        settings: HyperTableSettings,
    },
    /// `recreate_view`
    RecreateView(String),
    /// `drop_views`
    DropViews(Vec<String>),
    /// `install_routines`
    InstallRoutines,
    /// `promote_parent`
    PromoteParent(String),
    /// `promote_child`
    PromoteChild(ChildLink),
    /// `describe_hypertables`
    Describe,
    /// `close`
    Close,
}

#[derive(Debug, Default)]
struct MockState {
    tables: Vec<String>,
    views: BTreeSet<String>,
    chunk_intervals: BTreeMap<String, i32>,
    policies: BTreeMap<String, RetentionPolicy>,
    triggers: HashSet<String>,
    next_job_id: i32,
    routines_installed: u32,
    calls: Vec<StoreCall>,
    failures: Vec<(DdlOperation, Option<String>)>,
    closed: bool,
}

impl MockState {
    fn check_failure(&self, operation: DdlOperation, table: Option<&str>) -> HistoryResult<()> {
        let hit = self.failures.iter().any(|(op, only)| {
            *op == operation && only.as_deref().map_or(true, |t| Some(t) == table)
        });
        if !hit {
            return Ok(());
        }
        let source = sqlx::Error::Protocol(format!("injected {operation} failure"));
        Err(match operation {
            DdlOperation::ListHypertables => HistoryError::CatalogList {
                schema: HISTORY_SCHEMA.to_string(),
                source,
            },
            _ => HistoryError::Ddl {
                operation,
                table: table.map(str::to_string),
                source,
            },
        })
    }

    fn add_policy(&mut self, table: &str, days: i32) -> i32 {
        self.next_job_id += 1;
        let job_id = 1000 + self.next_job_id;
        self.policies.insert(
            table.to_string(),
            RetentionPolicy {
                job_id,
                drop_after: format!("{days} days"),
            },
        );
        job_id
    }
}

/// Mock history store.
#[derive(Clone, Default)]
pub struct MockHistoryStore {
    state: Arc<Mutex<MockState>>,
}

impl MockHistoryStore {
    /// Create an empty mock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock that already knows `tables` (in the given order).
    pub fn with_tables<I, S>(tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let store = Self::new();
        store.state().tables = tables.into_iter().map(Into::into).collect();
        store
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Give `table` an existing retention policy of `days`.
    pub fn add_retention_policy(&self, table: &str, days: i32) -> i32 {
        self.state().add_policy(table, days)
    }

    /// Pretend a snapshot view already exists for `table`.
    pub fn add_view(&self, table: &str) {
        self.state().views.insert(table.to_string());
    }

    /// Make `operation` fail, for every table or only for `table`.
    pub fn fail_on(&self, operation: DdlOperation, table: Option<&str>) {
        self.state()
            .failures
            .push((operation, table.map(str::to_string)));
    }

    /// Calls observed so far.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.state().calls.clone()
    }

    /// Views currently present.
    pub fn views(&self) -> BTreeSet<String> {
        self.state().views.clone()
    }

    /// Retention policy of `table`, if any.
    pub fn retention_policy(&self, table: &str) -> Option<RetentionPolicy> {
        self.state().policies.get(table).cloned()
    }

    /// Chunk interval last applied to `table`, in hours.
    pub fn chunk_interval_hours(&self, table: &str) -> Option<i32> {
        self.state().chunk_intervals.get(table).copied()
    }

    /// How many times routines were installed.
    pub fn routines_installed(&self) -> u32 {
        self.state().routines_installed
    }

    /// Whether `close` was called.
    pub fn is_closed(&self) -> bool {
        self.state().closed
    }
}

#[async_trait]
impl HistoryStore for MockHistoryStore {
    async fn list_hypertables(&self) -> HistoryResult<Vec<String>> {
        let mut state = self.state();
        state.calls.push(StoreCall::ListHypertables);
        state.check_failure(DdlOperation::ListHypertables, None)?;
        Ok(state.tables.clone())
    }

    async fn configure_hypertable(
        &self,
        table: &str,
        settings: &HyperTableSettings,
    ) -> HistoryResult<RetentionOutcome> {
        let mut state = self.state();
        state.calls.push(StoreCall::Configure {
            table: table.to_string(),
            settings: *settings,
        });
        state.check_failure(DdlOperation::SetChunkInterval, Some(table))?;
        state
            .chunk_intervals
            .insert(table.to_string(), settings.chunk_interval_hours);
        state.check_failure(DdlOperation::UpdateRetention, Some(table))?;
        if !state.policies.contains_key(table) {
            return Ok(RetentionOutcome::NoPolicy);
        }
        let job_id = state.add_policy(table, settings.retention_days);
        Ok(RetentionOutcome::Updated { job_id })
    }

    async fn recreate_view(&self, table: &str) -> HistoryResult<()> {
        let mut state = self.state();
        state.calls.push(StoreCall::RecreateView(table.to_string()));
        state.check_failure(DdlOperation::DropView, Some(table))?;
        state.check_failure(DdlOperation::CreateView, Some(table))?;
        state.views.insert(table.to_string());
        Ok(())
    }

    async fn drop_views(&self, tables: &[String]) -> HistoryResult<()> {
        let mut state = self.state();
        state.calls.push(StoreCall::DropViews(tables.to_vec()));
        for table in tables {
            state.check_failure(DdlOperation::DropView, Some(table))?;
        }
        for table in tables {
            state.views.remove(table);
        }
        Ok(())
    }

    async fn install_routines(&self) -> HistoryResult<()> {
        let mut state = self.state();
        state.calls.push(StoreCall::InstallRoutines);
        state.check_failure(DdlOperation::InstallRoutines, None)?;
        state.routines_installed += 1;
        Ok(())
    }

    async fn promote_parent(&self, table: &str) -> HistoryResult<RetentionOutcome> {
        let mut state = self.state();
        state.calls.push(StoreCall::PromoteParent(table.to_string()));
        state.check_failure(DdlOperation::PromoteParent, Some(table))?;
        if !state.tables.iter().any(|t| t == table) {
            state.tables.push(table.to_string());
            state.tables.sort();
        }
        if state.policies.contains_key(table) {
            return Ok(RetentionOutcome::Skipped { code: -1 });
        }
        let job_id = state.add_policy(table, 14);
        Ok(RetentionOutcome::Updated { job_id })
    }

    async fn promote_child(&self, link: &ChildLink) -> HistoryResult<ChildSetupOutcome> {
        let mut state = self.state();
        state.calls.push(StoreCall::PromoteChild(link.clone()));
        state.check_failure(DdlOperation::PromoteChild, Some(&link.table))?;
        if !state.tables.iter().any(|t| *t == link.table) {
            state.tables.push(link.table.clone());
            state.tables.sort();
        }
        if state.triggers.insert(link.table.clone()) {
            Ok(ChildSetupOutcome::TriggerCreated)
        } else {
            Ok(ChildSetupOutcome::TriggerExisted)
        }
    }

    async fn describe_hypertables(&self) -> HistoryResult<Vec<HyperTableInfo>> {
        let mut state = self.state();
        state.calls.push(StoreCall::Describe);
        state.check_failure(DdlOperation::DescribeHypertables, None)?;
        let mut tables = state.tables.clone();
        tables.sort();
        Ok(tables
            .into_iter()
            .map(|name| HyperTableInfo {
                chunk_interval: state
                    .chunk_intervals
                    .get(&name)
                    .map(|hours| format!("{hours}:00:00")),
                retention: state.policies.get(&name).cloned(),
                name,
            })
            .collect())
    }

    async fn close(&self) {
        let mut state = self.state();
        state.calls.push(StoreCall::Close);
        state.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SETTINGS: HyperTableSettings = HyperTableSettings {
        chunk_interval_hours: 24,
        retention_days: 30,
    };

    #[tokio::test]
    async fn test_mock_only_updates_existing_policies() {
        let store = MockHistoryStore::with_tables(["sessions", "users"]);
        store.add_retention_policy("users", 14);

        let users = store.configure_hypertable("users", &SETTINGS).await.unwrap();
        assert!(users.job_id().is_some());
        assert_eq!(store.retention_policy("users").unwrap().drop_after, "30 days");

        let sessions = store.configure_hypertable("sessions", &SETTINGS).await.unwrap();
        assert_eq!(sessions, RetentionOutcome::NoPolicy);
        assert!(store.retention_policy("sessions").is_none());
    }

    #[tokio::test]
    async fn test_mock_drop_views_is_all_or_nothing() {
        let store = MockHistoryStore::with_tables(["a", "b"]);
        store.add_view("a");
        store.add_view("b");
        store.fail_on(DdlOperation::DropView, Some("b"));

        let tables = vec!["a".to_string(), "b".to_string()];
        assert!(store.drop_views(&tables).await.is_err());
        assert_eq!(store.views().len(), 2);
    }

    #[tokio::test]
    async fn test_mock_child_trigger_is_created_once() {
        let store = MockHistoryStore::new();
        let link = ChildLink::new("child", "parent_cq_id", "parent");
        assert_eq!(
            store.promote_child(&link).await.unwrap(),
            ChildSetupOutcome::TriggerCreated
        );
        assert_eq!(
            store.promote_child(&link).await.unwrap(),
            ChildSetupOutcome::TriggerExisted
        );
    }
}
