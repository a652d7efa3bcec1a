//! Scripted provider for deterministic tests and offline demos
//!
//! Replies are served from a queue; once the queue is empty an optional
//! responder closure decides the reply from the request itself, which keeps
//! tests stable when independent generations run concurrently.

use super::*;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// One scripted reply
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Plain assistant text
    Text(String),
    /// A single tool call with JSON arguments
    ToolCall {
        name: String,
        arguments: serde_json::Value,
    },
    /// A failed call; retryable failures surface as network errors
    Fail { message: String, retryable: bool },
}

impl MockReply {
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text(content.into())
    }

    /// Text wrapped in a ```json fence, the shape the generators expect
    pub fn json_block(value: &serde_json::Value) -> Self {
        let body = serde_json::to_string_pretty(value).unwrap_or_default();
        Self::Text(format!("Here is the config:\n```json\n{}\n```\n", body))
    }

    pub fn tool_call(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self::ToolCall {
            name: name.into(),
            arguments,
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self::Fail {
            message: message.into(),
            retryable: false,
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::Fail {
            message: message.into(),
            retryable: true,
        }
    }
}

type Responder = Box<dyn Fn(&CompletionRequest) -> MockReply + Send + Sync>;

/// A provider that never leaves the process
pub struct MockProvider {
    model: String,
    queue: Mutex<VecDeque<MockReply>>,
    responder: Option<Responder>,
    requests: Mutex<Vec<CompletionRequest>>,
    calls: AtomicUsize,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            model: "mock-model".into(),
            queue: Mutex::new(VecDeque::new()),
            responder: None,
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_reply(self, reply: MockReply) -> Self {
        if let Ok(mut queue) = self.queue.lock() {
            queue.push_back(reply);
        }
        self
    }

    pub fn with_replies(self, replies: impl IntoIterator<Item = MockReply>) -> Self {
        replies.into_iter().fold(self, |provider, reply| provider.with_reply(reply))
    }

    /// Decide replies from the request once the queue is drained
    pub fn with_responder<F>(mut self, responder: F) -> Self
    where
        F: Fn(&CompletionRequest) -> MockReply + Send + Sync + 'static,
    {
        self.responder = Some(Box::new(responder));
        self
    }

    /// Number of completed calls
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every request seen so far, in arrival order
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn next_reply(&self, request: &CompletionRequest) -> Option<MockReply> {
        let queued = self.queue.lock().ok().and_then(|mut q| q.pop_front());
        queued.or_else(|| self.responder.as_ref().map(|r| r(request)))
    }
}

/// The text of the last user message, handy inside responders
pub fn last_user_text(request: &CompletionRequest) -> &str {
    request
        .messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .and_then(|m| m.content.as_deref())
        .unwrap_or("")
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn models(&self) -> Vec<String> {
        vec![self.model.clone()]
    }

    fn default_model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.next_reply(&request);
        let model = request.model.clone().unwrap_or_else(|| self.model.clone());
        if let Ok(mut seen) = self.requests.lock() {
            seen.push(request);
        }

        let reply = reply.ok_or_else(|| ProviderError::Other("mock script exhausted".into()))?;
        let usage = Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        };

        match reply {
            MockReply::Text(content) => Ok(CompletionResponse {
                id: format!("mock-{}", n),
                model,
                content: Some(content),
                tool_calls: Vec::new(),
                finish_reason: FinishReason::Stop,
                usage,
            }),
            MockReply::ToolCall { name, arguments } => Ok(CompletionResponse {
                id: format!("mock-{}", n),
                model,
                content: None,
                tool_calls: vec![ToolCall {
                    id: format!("call_{}", n),
                    name,
                    arguments: arguments.to_string(),
                }],
                finish_reason: FinishReason::ToolCalls,
                usage,
            }),
            MockReply::Fail { message, retryable: true } => Err(ProviderError::Network(message)),
            MockReply::Fail { message, retryable: false } => Err(ProviderError::Other(message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_queue_then_responder() {
        let provider = MockProvider::new()
            .with_reply(MockReply::text("first"))
            .with_responder(|req| MockReply::text(format!("echo: {}", last_user_text(req))));

        assert_eq!(provider.prompt("a").await.unwrap(), "first");
        assert_eq!(provider.prompt("b").await.unwrap(), "echo: b");
        assert_eq!(provider.call_count(), 2);
        assert_eq!(provider.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_exhausted_script_errors() {
        let provider = MockProvider::new();
        let err = provider.prompt("anything").await.unwrap_err();
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_tool_call_reply() {
        let provider = MockProvider::new()
            .with_reply(MockReply::tool_call("sql_db_list_tables", serde_json::json!({})));

        let response = provider
            .complete(CompletionRequest::new(vec![ChatMessage::user("tables?")]))
            .await
            .unwrap();
        assert_eq!(response.finish_reason, FinishReason::ToolCalls);
        assert_eq!(response.tool_calls[0].name, "sql_db_list_tables");
    }
}
