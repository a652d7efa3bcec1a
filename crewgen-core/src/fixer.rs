//! Model-assisted repair of snippets that no longer parse

use crate::error::{Error, Result};
use crate::extract::code_blocks;
use crate::llm_function::{Generated, LlmFunction, RetryPolicy};
use crate::prompt::PromptVars;
use crate::prompts;
use crate::provider::{ChatMessage, CompletionRequest, LlmProvider};
use serde_json::Value;
use tracing::info;

pub struct CodeFixer {
    model: Option<String>,
    retry: RetryPolicy,
}

impl Default for CodeFixer {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeFixer {
    pub fn new() -> Self {
        Self {
            model: None,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The fixed snippet: body of the first fenced block in the reply, or the
    /// whole reply when the model skipped the fence
    pub async fn fix(&self, provider: &dyn LlmProvider, language: &str, snippet: &str) -> Result<String> {
        let prompt = prompts::CODE_FIXER.render(&vars(language, snippet))?;
        let mut request = CompletionRequest::new(vec![ChatMessage::user(prompt)]);
        if let Some(model) = &self.model {
            request = request.with_model(model.clone());
        }

        let response = provider
            .complete(request)
            .await
            .map_err(|e| Error::from(e).with_operation("fixer::fix"))?;
        let reply = response.content.unwrap_or_default();

        let fixed = match code_blocks(&reply).first() {
            Some(block) => block.body.to_string(),
            None => reply.trim().to_string(),
        };
        info!(language, chars = fixed.len(), "snippet repaired");
        Ok(fixed)
    }

    /// Repair a JSON document; the result is guaranteed to decode
    pub async fn fix_json(&self, provider: &dyn LlmProvider, snippet: &str) -> Result<Generated<Value>> {
        LlmFunction::new(prompts::CODE_FIXER)
            .with_model(self.model.clone())
            .with_retry(self.retry.clone())
            .generate(provider, &vars("json", snippet))
            .await
    }
}

fn vars(language: &str, snippet: &str) -> PromptVars {
    PromptVars::new()
        .text("language_or_file_type", language)
        .text("code_snippet", snippet)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{last_user_text, MockProvider, MockReply};
    use serde_json::json;

    #[tokio::test]
    async fn test_fix_returns_block_body() {
        let provider = MockProvider::new()
            .with_reply(MockReply::text("```sql\nSELECT name FROM plants;\n```"));

        let fixed = CodeFixer::new()
            .fix(&provider, "sql", "SELECT name FROM plants")
            .await
            .unwrap();
        assert_eq!(fixed, "SELECT name FROM plants;");
        assert!(last_user_text(&provider.requests()[0]).contains("SELECT name FROM plants"));
    }

    #[tokio::test]
    async fn test_fix_json_decodes() {
        let provider = MockProvider::new()
            .with_reply(MockReply::text("```json\n{\"agents\": []\n```"))
            .with_reply(MockReply::json_block(&json!({"agents": [], "tasks": []})));

        let out = CodeFixer::new()
            .with_retry(RetryPolicy::immediate(2))
            .fix_json(&provider, "{\"agents\": [], \"tasks\": [")
            .await
            .unwrap();
        assert_eq!(out.value, json!({"agents": [], "tasks": []}));
        assert_eq!(out.attempts, 2);
    }
}
