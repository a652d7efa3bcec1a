//! The four tools the SQL agent works with

use super::{SqlDatabase, MAX_RESULT_ROWS};
use crate::error::{Error, Result};
use crate::extract::find_code_block;
use crate::prompt::PromptVars;
use crate::prompts;
use crate::provider::{ChatMessage, CompletionRequest, SharedProvider};
use crate::tool::{SharedTool, Tool};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

pub const LIST_TABLES: &str = "sql_db_list_tables";
pub const SCHEMA: &str = "sql_db_schema";
pub const QUERY: &str = "sql_db_query";
pub const QUERY_CHECKER: &str = "sql_db_query_checker";

/// Tools in the order the agent is told about them
pub fn toolkit(db: SqlDatabase, provider: SharedProvider, model: Option<String>) -> Vec<SharedTool> {
    vec![
        Arc::new(QueryTool::new(db.clone())),
        Arc::new(InfoTool::new(db.clone())),
        Arc::new(ListTablesTool::new(db.clone())),
        Arc::new(QueryCheckerTool::new(db, provider).with_model(model)),
    ]
}

fn string_arg<'a>(tool: &str, arguments: &'a Value, key: &str) -> Result<&'a str> {
    arguments
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::tool_failed(tool, format!("missing string argument '{}'", key)))
}

/// Comma-separated table names
pub struct ListTablesTool {
    db: SqlDatabase,
}

impl ListTablesTool {
    pub fn new(db: SqlDatabase) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Tool for ListTablesTool {
    fn name(&self) -> &str {
        LIST_TABLES
    }

    fn description(&self) -> &str {
        "Input is an empty object, output is a comma-separated list of tables in the database."
    }

    async fn invoke(&self, _arguments: Value) -> Result<String> {
        Ok(self.db.list_tables().await?.join(", "))
    }
}

/// Schema and sample rows for named tables
pub struct InfoTool {
    db: SqlDatabase,
}

impl InfoTool {
    pub fn new(db: SqlDatabase) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Tool for InfoTool {
    fn name(&self) -> &str {
        SCHEMA
    }

    fn description(&self) -> &str {
        "Input is a comma-separated list of tables, output is the schema and sample rows for \
         those tables. Be sure that the tables actually exist by calling sql_db_list_tables \
         first! Example input: table1, table2, table3"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "table_names": {
                    "type": "string",
                    "description": "Comma-separated list of table names"
                }
            },
            "required": ["table_names"]
        })
    }

    async fn invoke(&self, arguments: Value) -> Result<String> {
        let tables: Vec<String> = string_arg(SCHEMA, &arguments, "table_names")?
            .split(',')
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        self.db.table_info(tables).await
    }
}

/// Runs a read-only query; results are capped at [`MAX_RESULT_ROWS`]
pub struct QueryTool {
    db: SqlDatabase,
    max_rows: usize,
    read_only: bool,
}

impl QueryTool {
    pub fn new(db: SqlDatabase) -> Self {
        Self {
            db,
            max_rows: MAX_RESULT_ROWS,
            read_only: true,
        }
    }

    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = max_rows;
        self
    }

    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    fn check_read_only(&self, query: &str) -> Result<()> {
        if !self.read_only {
            return Ok(());
        }
        let head = query
            .trim_start()
            .split_whitespace()
            .next()
            .unwrap_or("")
            .to_ascii_uppercase();
        match head.as_str() {
            "SELECT" | "WITH" | "EXPLAIN" | "PRAGMA" => Ok(()),
            _ => Err(Error::tool_failed(
                QUERY,
                "only SELECT queries are allowed; do not modify the database",
            )),
        }
    }
}

#[async_trait]
impl Tool for QueryTool {
    fn name(&self) -> &str {
        QUERY
    }

    fn description(&self) -> &str {
        "Input is a detailed and correct SQL query, output is a result from the database. \
         If the query is not correct, an error message will be returned. If an error is \
         returned, rewrite the query, check the query, and try again. If you encounter an \
         issue with an unknown column, use sql_db_schema to query the correct table fields."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "The SQL query to run"}
            },
            "required": ["query"]
        })
    }

    async fn invoke(&self, arguments: Value) -> Result<String> {
        let query = string_arg(QUERY, &arguments, "query")?;
        self.check_read_only(query)?;

        // the keyword check misses writes inside CTEs and pragmas
        let rows = if self.read_only {
            self.db.run_read_only(query, self.max_rows).await
        } else {
            self.db.run(query, self.max_rows).await
        }
        .map_err(|e| e.with_context("tool", QUERY))?;
        info!(rows = rows.rows.len(), truncated = rows.truncated, "sql query completed");
        serde_json::to_string(&rows)
            .map_err(|e| Error::serialization_failed(e.to_string()).with_operation("sql_db_query"))
    }
}

/// Asks the model to double-check a query before it runs
pub struct QueryCheckerTool {
    db: SqlDatabase,
    provider: SharedProvider,
    model: Option<String>,
}

impl QueryCheckerTool {
    pub fn new(db: SqlDatabase, provider: SharedProvider) -> Self {
        Self {
            db,
            provider,
            model: None,
        }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }
}

#[async_trait]
impl Tool for QueryCheckerTool {
    fn name(&self) -> &str {
        QUERY_CHECKER
    }

    fn description(&self) -> &str {
        "Use this tool to double check if your query is correct before executing it. \
         Always use this tool before executing a query with sql_db_query!"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "The SQL query to check"}
            },
            "required": ["query"]
        })
    }

    async fn invoke(&self, arguments: Value) -> Result<String> {
        let query = string_arg(QUERY_CHECKER, &arguments, "query")?;
        let prompt = prompts::SQL_QUERY_CHECKER.render(
            &PromptVars::new()
                .text("query", query)
                .text("dialect", self.db.dialect()),
        )?;

        let mut request =
            CompletionRequest::new(vec![ChatMessage::user(prompt)]).with_temperature(0.0);
        if let Some(model) = &self.model {
            request = request.with_model(model.clone());
        }
        let response = self
            .provider
            .complete(request)
            .await
            .map_err(|e| Error::from(e).with_operation("sql_db_query_checker"))?;
        let reply = response.content.unwrap_or_default();

        let checked = find_code_block(&reply, &["sql", ""])
            .map(|block| block.body.to_string())
            .unwrap_or_else(|| reply.trim().to_string());
        debug!(original = query, checked = %checked, "query checked");
        Ok(checked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::provider::{MockProvider, MockReply};
    use crate::sql::tests::plants_db;

    #[tokio::test]
    async fn test_list_and_schema_tools() {
        let db = plants_db().await;
        let list = ListTablesTool::new(db.clone());
        assert_eq!(list.invoke(json!({})).await.unwrap(), "orders, plants");

        let info = InfoTool::new(db);
        let out = info.invoke(json!({"table_names": "plants, orders"})).await.unwrap();
        assert!(out.contains("CREATE TABLE plants"));
        assert!(out.contains("CREATE TABLE orders"));
    }

    #[tokio::test]
    async fn test_query_tool_caps_rows() {
        let db = plants_db().await;
        let tool = QueryTool::new(db).with_max_rows(2);

        let out = tool.invoke(json!({"query": "SELECT name FROM plants ORDER BY id"})).await.unwrap();
        let parsed: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["rows"], json!([["Monstera"], ["Snake Plant"]]));
        assert_eq!(parsed["truncated"], json!(true));
    }

    #[tokio::test]
    async fn test_query_tool_is_read_only() {
        let db = plants_db().await;
        let tool = QueryTool::new(db.clone());

        let err = tool.invoke(json!({"query": "DELETE FROM plants"})).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ToolFailed);
        assert_eq!(db.run("SELECT id FROM plants", 10).await.unwrap().rows.len(), 4);

        let err = tool.invoke(json!({})).await.unwrap_err();
        assert!(err.message().contains("query"));
    }

    #[tokio::test]
    async fn test_query_tool_refuses_write_behind_cte() {
        let db = plants_db().await;
        let tool = QueryTool::new(db.clone());

        let err = tool
            .invoke(json!({"query": "WITH x AS (SELECT 1) DELETE FROM plants"}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
        assert_eq!(err.context_value("tool"), Some(QUERY));
        assert_eq!(db.run("SELECT id FROM plants", 10).await.unwrap().rows.len(), 4);

        let writable = QueryTool::new(db.clone()).with_read_only(false);
        writable
            .invoke(json!({"query": "DELETE FROM plants WHERE light IS NULL"}))
            .await
            .unwrap();
        assert_eq!(db.run("SELECT id FROM plants", 10).await.unwrap().rows.len(), 3);
    }

    #[tokio::test]
    async fn test_default_cap_is_one_hundred() {
        let db = SqlDatabase::open("sqlite://:memory:").unwrap();
        db.execute_batch(
            "CREATE TABLE n (x INTEGER);
             WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c WHERE x < 150)
             INSERT INTO n SELECT x FROM c;",
        )
        .await
        .unwrap();

        let out = QueryTool::new(db).invoke(json!({"query": "SELECT x FROM n"})).await.unwrap();
        let parsed: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["rows"].as_array().unwrap().len(), 100);
    }

    #[tokio::test]
    async fn test_checker_extracts_sql_block() {
        let db = plants_db().await;
        let provider = Arc::new(
            MockProvider::new()
                .with_reply(MockReply::text("Looks fine:\n```sql\nSELECT name FROM plants;\n```")),
        );
        let tool = QueryCheckerTool::new(db, provider.clone());

        let out = tool.invoke(json!({"query": "SELECT name FROM plants"})).await.unwrap();
        assert_eq!(out, "SELECT name FROM plants;");
        let prompt = crate::provider::last_user_text(&provider.requests()[0]).to_string();
        assert!(prompt.contains("sqlite query above"));
    }

    #[test]
    fn test_toolkit_names() {
        let db = SqlDatabase::open("sqlite://:memory:").unwrap();
        let tools = toolkit(db, Arc::new(MockProvider::new()), None);
        let names: Vec<_> = tools.iter().map(|t| t.name().to_string()).collect();
        assert_eq!(names, vec![QUERY, SCHEMA, LIST_TABLES, QUERY_CHECKER]);
    }
}
