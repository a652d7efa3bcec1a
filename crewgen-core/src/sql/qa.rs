//! Single-table question answering: question → query → rows → summary

use super::{QueryRows, SqlDatabase, MAX_RESULT_ROWS};
use crate::error::{self, Error, Result};
use crate::extract::find_code_block;
use crate::prompt::{PromptTemplate, PromptVars};
use crate::prompts;
use crate::provider::{ChatMessage, CompletionRequest, SharedProvider, UsageTracker};
use tracing::info;

#[derive(Debug, Clone)]
pub struct QaAnswer {
    pub query: String,
    pub rows: QueryRows,
    pub answer: String,
    pub usage: UsageTracker,
}

pub struct TableQa {
    db: SqlDatabase,
    provider: SharedProvider,
    model: Option<String>,
}

impl TableQa {
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

    pub async fn answer(&self, table: &str, question: &str) -> Result<QaAnswer> {
        let mut usage = UsageTracker::new();
        let sample = self.db.table_info(vec![table.to_string()]).await?;

        let reply = self
            .ask(
                prompts::QUESTION_TO_QUERY,
                PromptVars::new()
                    .text("question", question)
                    .text("table_name", table)
                    .text("table_sample", sample),
                &mut usage,
            )
            .await?;
        let query = find_code_block(&reply, &["sql", ""])
            .map(|block| block.body.to_string())
            .ok_or_else(|| {
                error::invalid_response("reply has no sql block", &reply)
                    .with_operation("table_qa::answer")
            })?;

        let rows = self
            .db
            .run_read_only(&query, MAX_RESULT_ROWS)
            .await
            .map_err(|e| e.with_operation("table_qa::answer"))?;
        info!(table, rows = rows.rows.len(), "question query ran");

        let answer = self
            .ask(
                prompts::RESULTS_TO_ANSWER,
                PromptVars::new()
                    .text("question", question)
                    .text("table_name", table)
                    .text("query_results_table", rows.to_table()),
                &mut usage,
            )
            .await?;

        Ok(QaAnswer {
            query,
            rows,
            answer: answer.trim().to_string(),
            usage,
        })
    }

    async fn ask(&self, template: PromptTemplate, vars: PromptVars, usage: &mut UsageTracker) -> Result<String> {
        let prompt = template.render(&vars)?;
        let mut request = CompletionRequest::new(vec![ChatMessage::user(prompt)]);
        if let Some(model) = &self.model {
            request = request.with_model(model.clone());
        }
        let response = self
            .provider
            .complete(request)
            .await
            .map_err(|e| Error::from(e).with_context("template", template.name()))?;
        usage.track(&response.model, &response.usage);
        Ok(response.content.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::provider::{last_user_text, MockProvider, MockReply};
    use crate::sql::tests::plants_db;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_question_to_answer() {
        let db = plants_db().await;
        let provider = Arc::new(MockProvider::new().with_replies([
            MockReply::text("```sql\nSELECT name FROM plants WHERE light = 'low'\n```"),
            MockReply::text("Only the Snake Plant tolerates low light.\n"),
        ]));

        let qa = TableQa::new(db, provider.clone());
        let out = qa.answer("plants", "Which plants like low light?").await.unwrap();
        assert_eq!(out.query, "SELECT name FROM plants WHERE light = 'low'");
        assert_eq!(out.rows.rows.len(), 1);
        assert_eq!(out.answer, "Only the Snake Plant tolerates low light.");
        assert_eq!(out.usage.total_calls, 2);

        let requests = provider.requests();
        assert!(last_user_text(&requests[0]).contains("Monstera"));
        assert!(last_user_text(&requests[1]).contains("name\nSnake Plant"));
    }

    #[tokio::test]
    async fn test_reply_without_query() {
        let db = plants_db().await;
        let provider = Arc::new(MockProvider::new().with_reply(MockReply::text("I cannot help")));

        let err = TableQa::new(db, provider).answer("plants", "?").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidResponse);
    }

    #[tokio::test]
    async fn test_generated_write_is_refused() {
        let db = plants_db().await;
        let provider = Arc::new(
            MockProvider::new().with_reply(MockReply::text("```sql\nDELETE FROM plants\n```")),
        );

        let err = TableQa::new(db.clone(), provider.clone())
            .answer("plants", "Remove everything")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
        assert_eq!(err.operation(), "table_qa::answer");
        assert_eq!(provider.call_count(), 1);
        assert_eq!(db.run("SELECT id FROM plants", 10).await.unwrap().rows.len(), 4);
    }
}
