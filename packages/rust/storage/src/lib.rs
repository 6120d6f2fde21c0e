//! Turso Embedded / libSQL access to the analytic store.
//!
//! The [`Store`] struct wraps an existing libSQL database populated by the
//! ingestion step. It introspects the schema for prompting and executes
//! generated queries, normalizing every cell on the way out.
//!
//! The pipeline only talks to the store through the [`DataStore`] trait.

mod guard;

use std::path::Path;

use askdata_shared::{
    AskDataError, CandidateQuery, CellValue, ColumnSchema, Result, ResultSet, SchemaDescription,
    TableSchema, UNTYPED_COLUMN,
};
use async_trait::async_trait;
use libsql::{Connection, Database, Value, params};
use tracing::{debug, warn};

pub use guard::ensure_read_only;

/// Operations the request pipeline needs from a relational store.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Every user table and its columns, in store enumeration order.
    async fn describe_schema(&self) -> Result<SchemaDescription>;

    /// Run a candidate query and return its normalized rows.
    async fn execute(&self, query: &CandidateQuery) -> Result<ResultSet>;
}

/// Execution policy for a [`Store`].
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Gate every query through [`ensure_read_only`].
    pub read_only: bool,
    /// Maximum rows materialized per query (0 = unlimited).
    pub max_rows: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            read_only: true,
            max_rows: 0,
        }
    }
}

/// Primary store handle wrapping a libSQL database.
pub struct Store {
    db: Database,
    conn: Connection,
    options: StoreOptions,
}

impl Store {
    /// Open an existing database at `path`.
    ///
    /// A missing file is reported as [`AskDataError::StoreUnavailable`] rather
    /// than silently creating an empty database.
    pub async fn open(path: &Path, options: StoreOptions) -> Result<Self> {
        if !path.is_file() {
            return Err(AskDataError::StoreUnavailable(format!(
                "database file not found: {}",
                path.display()
            )));
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| AskDataError::StoreUnavailable(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| AskDataError::StoreUnavailable(e.to_string()))?;

        tracing::info!(path = %path.display(), read_only = options.read_only, "store opened");

        Ok(Self { db, conn, options })
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        let mut rows = self
            .conn
            .query(
                "SELECT name FROM sqlite_master
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
                params![],
            )
            .await
            .map_err(|e| AskDataError::StoreUnavailable(e.to_string()))?;

        let mut names = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| AskDataError::StoreUnavailable(e.to_string()))?
        {
            names.push(
                row.get::<String>(0)
                    .map_err(|e| AskDataError::StoreUnavailable(e.to_string()))?,
            );
        }
        Ok(names)
    }

    async fn list_columns(&self, table: &str) -> Result<Vec<ColumnSchema>> {
        let mut rows = self
            .conn
            .query(
                "SELECT name, type FROM pragma_table_info(?1) ORDER BY cid",
                params![table],
            )
            .await
            .map_err(|e| AskDataError::StoreUnavailable(e.to_string()))?;

        let mut columns = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| AskDataError::StoreUnavailable(e.to_string()))?
        {
            let name = row
                .get::<String>(0)
                .map_err(|e| AskDataError::StoreUnavailable(e.to_string()))?;
            let declared = row.get::<String>(1).unwrap_or_default();
            let data_type = if declared.trim().is_empty() {
                UNTYPED_COLUMN.to_string()
            } else {
                declared
            };
            columns.push(ColumnSchema { name, data_type });
        }
        Ok(columns)
    }
}

#[async_trait]
impl DataStore for Store {
    async fn describe_schema(&self) -> Result<SchemaDescription> {
        let mut tables = Vec::new();
        for name in self.list_tables().await? {
            let columns = self.list_columns(&name).await?;
            tables.push(TableSchema { name, columns });
        }
        debug!(tables = tables.len(), "schema introspected");
        Ok(SchemaDescription { tables })
    }

    async fn execute(&self, query: &CandidateQuery) -> Result<ResultSet> {
        let sql = query.as_str().to_owned();
        if self.options.read_only {
            ensure_read_only(&sql)?;
        }

        // Local libSQL steps the statement inside a single poll, so the query
        // runs on the blocking pool on its own connection. Dropping this
        // future (e.g. on timeout) interrupts the statement.
        let conn = self
            .db
            .connect()
            .map_err(|e| AskDataError::StoreUnavailable(e.to_string()))?;
        let mut guard = InterruptOnDrop::new(conn.clone());
        let max_rows = self.options.max_rows;
        let handle = tokio::runtime::Handle::current();

        let outcome =
            tokio::task::spawn_blocking(move || handle.block_on(collect_rows(conn, sql, max_rows)))
                .await;
        guard.disarm();

        let result =
            outcome.map_err(|e| AskDataError::Storage(format!("query task failed: {e}")))??;
        debug!(rows = result.len(), columns = result.columns.len(), "query executed");
        Ok(result)
    }
}

/// Run `sql` on `conn` and materialize at most `max_rows` rows (0 = unlimited).
async fn collect_rows(conn: Connection, sql: String, max_rows: usize) -> Result<ResultSet> {
    let mut rows = conn
        .query(&sql, params![])
        .await
        .map_err(|e| AskDataError::execution(e.to_string()))?;

    let column_count = rows.column_count();
    let columns: Vec<String> = (0..column_count)
        .map(|i| rows.column_name(i).unwrap_or_default().to_string())
        .collect();

    let mut result = ResultSet::new(columns);
    while let Some(row) = rows
        .next()
        .await
        .map_err(|e| AskDataError::execution(e.to_string()))?
    {
        if max_rows > 0 && result.rows.len() >= max_rows {
            warn!(max_rows, "result truncated to row cap");
            break;
        }
        let mut cells = Vec::with_capacity(column_count as usize);
        for i in 0..column_count {
            let value = row
                .get_value(i)
                .map_err(|e| AskDataError::execution(e.to_string()))?;
            cells.push(normalize(value));
        }
        result.rows.push(cells);
    }
    Ok(result)
}

/// Interrupts the running statement unless disarmed first.
struct InterruptOnDrop {
    conn: Option<Connection>,
}

impl InterruptOnDrop {
    fn new(conn: Connection) -> Self {
        Self { conn: Some(conn) }
    }

    fn disarm(&mut self) {
        self.conn = None;
    }
}

impl Drop for InterruptOnDrop {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            match conn.interrupt() {
                Ok(()) => warn!("query abandoned, statement interrupted"),
                Err(e) => warn!(error = %e, "failed to interrupt abandoned query"),
            }
        }
    }
}

/// Map a raw libSQL value to its single canonical cell form.
fn normalize(value: Value) -> CellValue {
    match value {
        Value::Null => CellValue::Null,
        Value::Integer(i) => CellValue::Integer(i),
        Value::Real(r) => CellValue::real(r),
        Value::Text(s) => CellValue::Text(s),
        Value::Blob(b) => CellValue::blob(&b),
    }
}
