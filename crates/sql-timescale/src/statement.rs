//! Statement text for the history DDL.
//!
//! Identifiers are validated and quoted through the [`Dialect`]; intervals and
//! relation names that the statement can accept as values are bound as `$n`
//! parameters instead of being formatted into the text.

use tsdbhistory_core::{Dialect, HistoryResult, FETCH_DATE_COLUMN, HISTORY_SCHEMA};

/// Names of the hypertables in a schema, ordered by name.
pub const LIST_HYPERTABLES: &str = "SELECT hypertable_name::text FROM timescaledb_information.hypertables \
     WHERE hypertable_schema = $1 ORDER BY 1";

/// Chunk interval and retention job of every hypertable in a schema.
pub const DESCRIBE_HYPERTABLES: &str = r#"
SELECT h.hypertable_name::text AS name,
       d.time_interval::text AS chunk_interval,
       j.job_id,
       j.config ->> 'drop_after' AS drop_after
FROM timescaledb_information.hypertables h
LEFT JOIN timescaledb_information.dimensions d
       ON d.hypertable_schema = h.hypertable_schema
      AND d.hypertable_name = h.hypertable_name
      AND d.dimension_number = 1
LEFT JOIN timescaledb_information.jobs j
       ON j.hypertable_schema = h.hypertable_schema
      AND j.hypertable_name = h.hypertable_name
      AND j.proc_name = 'policy_retention'
WHERE h.hypertable_schema = $1
ORDER BY 1
"#;

/// `$1` relation, `$2` hours.
pub const SET_CHUNK_INTERVAL: &str =
    "SELECT set_chunk_time_interval($1::regclass, make_interval(hours => $2))";

/// `$1` relation, `$2` days. Yields the job id or `-2`.
pub const UPDATE_RETENTION: &str =
    "SELECT history.update_retention($1::regclass, make_interval(days => $2))";

/// `$1` table name. Yields the retention job id.
pub const SETUP_PARENT: &str = "SELECT history.setup_tsdb_parent($1)";

/// `$1` table, `$2` column, `$3` parent table, `$4` parent column. Yields 0 or 1.
pub const SETUP_CHILD: &str = "SELECT history.setup_tsdb_child($1, $2, $3, $4)";

/// Quoted `history.<table>`, suitable for binding to a `regclass` parameter.
pub fn history_relation(dialect: &dyn Dialect, table: &str) -> HistoryResult<String> {
    dialect.qualified_name(HISTORY_SCHEMA, table)
}

/// DDL for the snapshot view of one history table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotViewSql {
    /// `DROP VIEW IF EXISTS ...`
    pub drop: String,
    /// `CREATE VIEW ... AS SELECT ...`
    pub create: String,
}

impl SnapshotViewSql {
    /// Build the statements for `view_schema.<table>` over `history.<table>`.
    pub fn new(dialect: &dyn Dialect, view_schema: &str, table: &str) -> HistoryResult<Self> {
        let view = dialect.qualified_name(view_schema, table)?;
        let source = history_relation(dialect, table)?;
        let fetch_date = dialect.quote_ident(FETCH_DATE_COLUMN)?;
        let schema_literal = dialect.quote_literal(HISTORY_SCHEMA)?;
        let table_literal = dialect.quote_literal(table)?;

        Ok(Self {
            drop: format!("DROP VIEW IF EXISTS {view}"),
            create: format!(
                "CREATE VIEW {view} AS SELECT * FROM {source} \
                 WHERE {fetch_date} = history.find_latest({schema_literal}, {table_literal})"
            ),
        })
    }

    /// Only the drop statement, for tearing views down before a migration.
    pub fn drop_only(dialect: &dyn Dialect, view_schema: &str, table: &str) -> HistoryResult<String> {
        Ok(format!(
            "DROP VIEW IF EXISTS {}",
            dialect.qualified_name(view_schema, table)?
        ))
    }
}
