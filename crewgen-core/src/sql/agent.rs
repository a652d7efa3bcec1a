//! An LLM-driven SQL agent, and the tool that puts it in a crew

use super::{toolkit, SqlDatabase};
use crate::error::{Error, Result};
use crate::prompt::PromptVars;
use crate::prompts;
use crate::provider::{ChatMessage, SharedProvider};
use crate::tool::{SharedTool, Tool};
use crate::tool_loop::{LoopOutcome, ToolLoop};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

pub const DEFAULT_TOOL_NAME: &str = "query_sql_db_tool";

/// Answers natural-language questions by exploring and querying a database
pub struct SqlAgent {
    db: SqlDatabase,
    provider: SharedProvider,
    model: Option<String>,
    tools: Vec<SharedTool>,
    top_k: usize,
    max_iterations: usize,
}

impl SqlAgent {
    pub fn new(db: SqlDatabase, provider: SharedProvider) -> Self {
        let tools = toolkit(db.clone(), provider.clone(), None);
        Self {
            db,
            provider,
            model: None,
            tools,
            top_k: 10,
            max_iterations: 15,
        }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.tools = toolkit(self.db.clone(), self.provider.clone(), model.clone());
        self.model = model;
        self
    }

    /// Default row limit the agent is told to apply
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn database(&self) -> &SqlDatabase {
        &self.db
    }

    pub async fn ask(&self, question: &str) -> Result<LoopOutcome> {
        let system = prompts::SQL_AGENT_SYSTEM
            .render(&PromptVars::new().text("top_k", self.top_k.to_string()))?;
        let messages = vec![ChatMessage::system(system), ChatMessage::user(question)];

        let outcome = ToolLoop::new(self.provider.as_ref(), &self.tools)
            .with_model(self.model.clone())
            .with_max_iterations(self.max_iterations)
            .run(messages)
            .await
            .map_err(|e| e.with_operation("sql_agent::ask"))?;

        info!(
            iterations = outcome.iterations,
            tools = outcome.tool_calls.len(),
            "sql agent answered"
        );
        Ok(outcome)
    }
}

/// A crew tool whose single argument, `sql_query`, is a question for the
/// SQL agent
pub struct SqlAgentTool {
    name: String,
    description: String,
    agent: SqlAgent,
}

impl SqlAgentTool {
    pub fn new(name: impl Into<String>, description: impl Into<String>, agent: SqlAgent) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            agent,
        }
    }

    pub fn agent(&self) -> &SqlAgent {
        &self.agent
    }
}

#[async_trait]
impl Tool for SqlAgentTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "sql_query": {
                    "type": "string",
                    "description": "A question to answer from the database"
                }
            },
            "required": ["sql_query"]
        })
    }

    async fn invoke(&self, arguments: Value) -> Result<String> {
        let question = match &arguments {
            Value::String(s) => s.as_str(),
            other => other.get("sql_query").and_then(Value::as_str).ok_or_else(|| {
                Error::tool_failed(self.name.clone(), "missing string argument 'sql_query'")
            })?,
        };
        Ok(self.agent.ask(question).await?.answer)
    }
}

/// Open `db_uri` and wrap an SQL agent over it as a tool
pub fn build_sql_tool(
    db_uri: &str,
    name: Option<&str>,
    description: &str,
    provider: SharedProvider,
    model: Option<String>,
) -> Result<SqlAgentTool> {
    let db = SqlDatabase::open(db_uri)?;
    let agent = SqlAgent::new(db, provider).with_model(model);
    Ok(SqlAgentTool::new(
        name.unwrap_or(DEFAULT_TOOL_NAME),
        description,
        agent,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::provider::{MockProvider, MockReply, Role};
    use crate::sql::tests::plants_db;
    use crate::sql::toolkit::{LIST_TABLES, QUERY};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_agent_answers_through_toolkit() {
        let db = plants_db().await;
        let provider = Arc::new(MockProvider::new().with_replies([
            MockReply::tool_call(LIST_TABLES, json!({})),
            MockReply::tool_call(QUERY, json!({"query": "SELECT COUNT(*) AS n FROM plants"})),
            MockReply::text("The shop stocks 4 plants."),
        ]));

        let tool = SqlAgentTool::new("plant_db", "Answers plant questions", SqlAgent::new(db, provider.clone()));
        let answer = tool
            .invoke(json!({"sql_query": "How many plants are there?"}))
            .await
            .unwrap();
        assert_eq!(answer, "The shop stocks 4 plants.");

        let requests = provider.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].messages[0].role, Role::System);
        assert!(requests[0].messages[0].content.as_deref().unwrap().contains("at most 10 results"));

        let query_result = requests[2].messages.last().unwrap().content.clone().unwrap();
        let parsed: Value = serde_json::from_str(&query_result).unwrap();
        assert_eq!(parsed["rows"], json!([[4]]));
    }

    #[tokio::test]
    async fn test_tool_requires_question() {
        let db = plants_db().await;
        let tool = SqlAgentTool::new("plant_db", "d", SqlAgent::new(db, Arc::new(MockProvider::new())));
        let err = tool.invoke(json!({"question": "?"})).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ToolFailed);
    }

    #[test]
    fn test_build_sql_tool_defaults() {
        let tool = build_sql_tool(
            "sqlite://:memory:",
            None,
            "Runs a sql query against the plant database.",
            Arc::new(MockProvider::new()),
            None,
        )
        .unwrap();
        assert_eq!(tool.name(), DEFAULT_TOOL_NAME);
        assert_eq!(tool.parameters()["required"], json!(["sql_query"]));
    }
}
