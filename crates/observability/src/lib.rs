//! Structured metric log lines for history DDL operations.
//!
//! Counters are process-wide; every recording also emits a `tracing` event
//! tagged with `metric = "..."` so log pipelines can pick them up.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tracing::{info, warn};

static ROUTINE_INSTALLS_TOTAL: AtomicU64 = AtomicU64::new(0);
static VIEWS_DROPPED_TOTAL: AtomicU64 = AtomicU64::new(0);
static TABLES_RECONCILED_TOTAL: AtomicU64 = AtomicU64::new(0);
static RECONCILE_FAILURES_TOTAL: AtomicU64 = AtomicU64::new(0);
static RETENTION_UPDATES_TOTAL: AtomicU64 = AtomicU64::new(0);

fn duration_ms(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    /// Successful routine installations
    pub routine_installs_total: u64,
    /// Snapshot views dropped
    pub views_dropped_total: u64,
    /// Tables configured and given a fresh view
    pub tables_reconciled_total: u64,
    /// Reconcile passes aborted by an error
    pub reconcile_failures_total: u64,
    /// Retention policies replaced
    pub retention_updates_total: u64,
}

/// Read every counter.
pub fn snapshot() -> CounterSnapshot {
    CounterSnapshot {
        routine_installs_total: ROUTINE_INSTALLS_TOTAL.load(Ordering::Relaxed),
        views_dropped_total: VIEWS_DROPPED_TOTAL.load(Ordering::Relaxed),
        tables_reconciled_total: TABLES_RECONCILED_TOTAL.load(Ordering::Relaxed),
        reconcile_failures_total: RECONCILE_FAILURES_TOTAL.load(Ordering::Relaxed),
        retention_updates_total: RETENTION_UPDATES_TOTAL.load(Ordering::Relaxed),
    }
}

/// Records a completed routine installation.
pub fn record_routines_installed(duration: Duration) {
    let total = ROUTINE_INSTALLS_TOTAL.fetch_add(1, Ordering::Relaxed) + 1;
    info!(
        metric = "routines_install_latency_ms",
        latency_ms = duration_ms(duration),
        routine_installs_total = total
    );
}

/// Records a completed drop of `count` snapshot views.
pub fn record_views_dropped(count: usize, duration: Duration) {
    let total = VIEWS_DROPPED_TOTAL.fetch_add(count as u64, Ordering::Relaxed) + count as u64;
    info!(
        metric = "views_drop_latency_ms",
        views = count,
        latency_ms = duration_ms(duration),
        views_dropped_total = total
    );
}

/// Records one table configured and given a fresh view.
///
/// `retention_code` is the raw result of the retention update; non-negative
/// values mean a policy was replaced.
pub fn record_table_reconciled(table: &str, retention_code: i32, duration: Duration) {
    let total = TABLES_RECONCILED_TOTAL.fetch_add(1, Ordering::Relaxed) + 1;
    if retention_code >= 0 {
        RETENTION_UPDATES_TOTAL.fetch_add(1, Ordering::Relaxed);
    }
    info!(
        metric = "table_reconcile_latency_ms",
        table,
        retention_code,
        latency_ms = duration_ms(duration),
        tables_reconciled_total = total
    );
}

/// Records a full reconcile pass.
pub fn record_reconcile_latency(tables: usize, duration: Duration) {
    info!(
        metric = "reconcile_latency_ms",
        tables,
        latency_ms = duration_ms(duration)
    );
}

/// Records a reconcile pass aborted by `error`.
pub fn record_reconcile_failure(table: Option<&str>, operation: &str, error: &str) {
    let total = RECONCILE_FAILURES_TOTAL.fetch_add(1, Ordering::Relaxed) + 1;
    warn!(
        metric = "reconcile_failure",
        table = table.unwrap_or("-"),
        operation,
        error,
        reconcile_failures_total = total
    );
}
