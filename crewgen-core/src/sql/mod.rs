//! # SQL access for agents
//!
//! [`SqlDatabase`] wraps a SQLite connection and returns structured rows.
//! On top of it sit the toolkit an LLM-driven SQL agent works with
//! ([`toolkit`]), the agent itself and the single tool that exposes it to a
//! crew ([`agent`]), and a one-shot question answering path over a single
//! table ([`qa`]).

pub mod agent;
pub mod qa;
pub mod toolkit;

pub use agent::{build_sql_tool, SqlAgent, SqlAgentTool};
pub use qa::{QaAnswer, TableQa};
pub use toolkit::{toolkit, InfoTool, ListTablesTool, QueryCheckerTool, QueryTool};

use crate::error::{self, Error, ErrorKind, Result};
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Rows returned by the query tool are capped at this many
pub const MAX_RESULT_ROWS: usize = 100;

/// Sample rows shown per table by `table_info`
pub const SAMPLE_ROWS: usize = 3;

/// Result of a query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    /// More rows existed than were returned
    pub truncated: bool,
}

impl QueryRows {
    /// Pipe-separated text table, header first
    pub fn to_table(&self) -> String {
        let mut out = self.columns.join(" | ");
        for row in &self.rows {
            out.push('\n');
            let cells: Vec<String> = row.iter().map(cell_text).collect();
            out.push_str(&cells.join(" | "));
        }
        out
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "NULL".to_string(),
        other => other.to_string(),
    }
}

/// Where a database lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbLocation {
    Memory,
    File(PathBuf),
}

impl DbLocation {
    /// Accepts `sqlite:///relative/or/absolute`, `sqlite://:memory:` and
    /// plain file paths
    pub fn parse(uri: &str) -> Result<Self> {
        let rest = match uri.strip_prefix("sqlite:") {
            Some(rest) => rest.trim_start_matches('/'),
            None if uri.contains("://") => {
                return Err(Error::config_invalid("only sqlite databases are supported")
                    .with_operation("sql::parse_uri")
                    .with_context("uri", uri))
            }
            None => uri,
        };

        if rest.is_empty() || rest == ":memory:" {
            return Ok(DbLocation::Memory);
        }

        // sqlite:////abs/path keeps its leading slash
        let path = if uri.starts_with("sqlite:////") {
            PathBuf::from(format!("/{}", rest))
        } else {
            PathBuf::from(rest)
        };
        Ok(DbLocation::File(path))
    }
}

/// A shared SQLite connection; all access runs on the blocking pool
#[derive(Debug, Clone)]
pub struct SqlDatabase {
    conn: Arc<Mutex<Connection>>,
}

impl SqlDatabase {
    pub fn open(uri: &str) -> Result<Self> {
        let conn = match DbLocation::parse(uri)? {
            DbLocation::Memory => Connection::open_in_memory(),
            DbLocation::File(path) => {
                if !path.exists() {
                    return Err(Error::new(
                        ErrorKind::FileNotFound,
                        format!("database file {} does not exist", path.display()),
                    )
                    .with_operation("sql::open"));
                }
                Connection::open(&path)
            }
        }
        .map_err(|e| {
            Error::new(ErrorKind::DatabaseFailed, "failed to open database")
                .with_operation("sql::open")
                .with_context("uri", uri)
                .set_source(e)
        })?;
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    pub fn dialect(&self) -> &'static str {
        "sqlite"
    }

    async fn with_conn<T, F>(&self, op: &'static str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| Error::new(ErrorKind::DatabaseFailed, "connection lock poisoned"))?;
            f(&guard)
        })
        .await
        .map_err(|e| Error::unexpected(format!("database task failed: {}", e)))?
        .map_err(|e| e.with_operation(op))
    }

    /// User tables, sorted by name
    pub async fn list_tables(&self) -> Result<Vec<String>> {
        self.with_conn("sql::list_tables", |conn| {
            let sql = "SELECT name FROM sqlite_master \
                       WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name";
            let mut stmt = conn.prepare(sql).map_err(|e| db_error(sql, e))?;
            let names = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .map_err(|e| db_error(sql, e))?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(|e| db_error(sql, e))?;
            Ok(names)
        })
        .await
    }

    /// CREATE statement and a few sample rows for each table
    pub async fn table_info(&self, tables: Vec<String>) -> Result<String> {
        self.with_conn("sql::table_info", move |conn| {
            let mut sections = Vec::with_capacity(tables.len());
            for table in &tables {
                let sql = "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?1";
                let create: String = conn
                    .query_row(sql, [table.as_str()], |row| row.get(0))
                    .map_err(|e| match e {
                        rusqlite::Error::QueryReturnedNoRows => error::query_failed(
                            sql,
                            format!("table '{}' does not exist", table),
                        ),
                        e => db_error(sql, e),
                    })?;

                let sample_sql = format!("SELECT * FROM {} LIMIT {}", quote_ident(table), SAMPLE_ROWS);
                let sample = query_rows(conn, &sample_sql, SAMPLE_ROWS, true)?;

                sections.push(format!(
                    "{}\n\n/*\n{} rows from {} table:\n{}\n*/",
                    create.trim(),
                    SAMPLE_ROWS,
                    table,
                    sample.to_table()
                ));
            }
            Ok(sections.join("\n\n"))
        })
        .await
    }

    /// Run a statement, keeping at most `max_rows` rows
    pub async fn run(&self, query: &str, max_rows: usize) -> Result<QueryRows> {
        debug!(query, max_rows, "running sql");
        let query = query.to_string();
        self.with_conn("sql::run", move |conn| query_rows(conn, &query, max_rows, false))
            .await
    }

    /// Like [`run`](Self::run), but refuses any statement SQLite reports as
    /// writing to the database
    pub async fn run_read_only(&self, query: &str, max_rows: usize) -> Result<QueryRows> {
        debug!(query, max_rows, "running read-only sql");
        let query = query.to_string();
        self.with_conn("sql::run_read_only", move |conn| query_rows(conn, &query, max_rows, true))
            .await
    }

    /// Run a batch of statements (schema setup, fixtures)
    pub async fn execute_batch(&self, sql: &str) -> Result<()> {
        let sql = sql.to_string();
        self.with_conn("sql::execute_batch", move |conn| {
            conn.execute_batch(&sql).map_err(|e| db_error(&sql, e))
        })
        .await
    }
}

fn query_rows(conn: &Connection, sql: &str, max_rows: usize, read_only: bool) -> Result<QueryRows> {
    let mut stmt = conn.prepare(sql).map_err(|e| db_error(sql, e))?;
    if read_only && !stmt.readonly() {
        return Err(Error::new(
            ErrorKind::PermissionDenied,
            "statement would modify the database; only reads are allowed",
        )
        .with_context("query", error::truncate(sql, 200)));
    }
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let width = columns.len();

    let mut rows = Vec::new();
    let mut truncated = false;
    let mut cursor = stmt.query([]).map_err(|e| db_error(sql, e))?;
    while let Some(row) = cursor.next().map_err(|e| db_error(sql, e))? {
        if rows.len() == max_rows {
            truncated = true;
            break;
        }
        let mut values = Vec::with_capacity(width);
        for i in 0..width {
            let value = row.get_ref(i).map_err(|e| db_error(sql, e))?;
            values.push(to_json(value));
        }
        rows.push(values);
    }

    Ok(QueryRows {
        columns,
        rows,
        truncated,
    })
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(format!("<blob {} bytes>", b.len())),
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn db_error(sql: &str, e: rusqlite::Error) -> Error {
    error::query_failed(sql, e.to_string()).set_source(e)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) async fn plants_db() -> SqlDatabase {
        let db = SqlDatabase::open("sqlite://:memory:").unwrap();
        db.execute_batch(
            "CREATE TABLE plants (id INTEGER PRIMARY KEY, name TEXT NOT NULL, price REAL, light TEXT);
             INSERT INTO plants (name, price, light) VALUES
               ('Monstera', 35.0, 'indirect'),
               ('Snake Plant', 20.5, 'low'),
               ('Fiddle Leaf Fig', 60.0, 'bright'),
               ('Pothos', 12.0, NULL);
             CREATE TABLE orders (id INTEGER PRIMARY KEY, plant_id INTEGER, qty INTEGER);",
        )
        .await
        .unwrap();
        db
    }

    #[test]
    fn test_parse_uri() {
        assert_eq!(DbLocation::parse("sqlite://:memory:").unwrap(), DbLocation::Memory);
        assert_eq!(
            DbLocation::parse("sqlite:///./spaceship.db").unwrap(),
            DbLocation::File(PathBuf::from("./spaceship.db"))
        );
        assert_eq!(
            DbLocation::parse("sqlite:////var/data/a.db").unwrap(),
            DbLocation::File(PathBuf::from("/var/data/a.db"))
        );
        assert_eq!(
            DbLocation::parse("data/a.db").unwrap(),
            DbLocation::File(PathBuf::from("data/a.db"))
        );
        assert_eq!(
            DbLocation::parse("postgres://localhost/db").unwrap_err().kind(),
            ErrorKind::ConfigInvalid
        );
    }

    #[tokio::test]
    async fn test_list_tables_and_info() {
        let db = plants_db().await;
        assert_eq!(db.list_tables().await.unwrap(), vec!["orders", "plants"]);

        let info = db.table_info(vec!["plants".into()]).await.unwrap();
        assert!(info.starts_with("CREATE TABLE plants"));
        assert!(info.contains("3 rows from plants table"));
        assert!(info.contains("Monstera"));
        assert!(!info.contains("Pothos"));
    }

    #[tokio::test]
    async fn test_unknown_table_info() {
        let db = plants_db().await;
        let err = db.table_info(vec!["trees".into()]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::QueryFailed);
        assert!(err.message().contains("trees"));
    }

    #[tokio::test]
    async fn test_run_returns_typed_rows() {
        let db = plants_db().await;
        let out = db
            .run("SELECT name, price, light FROM plants ORDER BY id", 10)
            .await
            .unwrap();
        assert_eq!(out.columns, vec!["name", "price", "light"]);
        assert_eq!(out.rows[1], vec![Value::from("Snake Plant"), Value::from(20.5), Value::from("low")]);
        assert_eq!(out.rows[3][2], Value::Null);
        assert!(!out.truncated);
    }

    #[tokio::test]
    async fn test_run_truncates() {
        let db = plants_db().await;
        let out = db.run("SELECT id FROM plants", 2).await.unwrap();
        assert_eq!(out.rows.len(), 2);
        assert!(out.truncated);
    }

    #[tokio::test]
    async fn test_bad_query() {
        let db = plants_db().await;
        let err = db.run("SELECT nope FROM plants", 10).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::QueryFailed);
        assert_eq!(err.operation(), "sql::run");
        assert!(err.context_value("query").is_some());
    }

    #[tokio::test]
    async fn test_read_only_refuses_writes() {
        let db = plants_db().await;

        for query in [
            "WITH x AS (SELECT 1) DELETE FROM plants",
            "UPDATE plants SET price = 0",
            "PRAGMA user_version = 7",
        ] {
            let err = db.run_read_only(query, 10).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::PermissionDenied, "{}", query);
            assert_eq!(err.operation(), "sql::run_read_only");
        }

        let left = db.run_read_only("SELECT id FROM plants", 10).await.unwrap();
        assert_eq!(left.rows.len(), 4);
        let version = db.run_read_only("PRAGMA user_version", 10).await.unwrap();
        assert_eq!(version.rows, vec![vec![Value::from(0)]]);
    }

    #[test]
    fn test_open_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let uri = format!("sqlite:///{}", dir.path().join("missing.db").display());
        assert_eq!(SqlDatabase::open(&uri).unwrap_err().kind(), ErrorKind::FileNotFound);
    }

    #[tokio::test]
    async fn test_open_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shop.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch("CREATE TABLE t (x INTEGER); INSERT INTO t VALUES (7);").unwrap();
        }
        let db = SqlDatabase::open(path.to_str().unwrap()).unwrap();
        let out = db.run("SELECT x FROM t", 10).await.unwrap();
        assert_eq!(out.to_table(), "x\n7");
    }
}
