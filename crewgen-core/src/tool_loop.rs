//! Bounded tool-calling conversation
//!
//! Sends the conversation with tool definitions attached, runs every tool
//! call the model makes, appends the results and asks again, until the model
//! answers in text or the iteration budget runs out. Tool failures are
//! reported back to the model instead of aborting the conversation.

use crate::error::{Error, ErrorKind, Result};
use crate::provider::{
    ChatMessage, CompletionRequest, LlmProvider, ToolCall, UsageTracker,
};
use crate::tool::SharedTool;
use serde_json::Value;
use tracing::{debug, warn};

pub const DEFAULT_MAX_ITERATIONS: usize = 8;

/// Outcome of a finished conversation
#[derive(Debug, Clone)]
pub struct LoopOutcome {
    pub answer: String,
    /// Model calls made
    pub iterations: usize,
    /// Names of the tools called, in call order
    pub tool_calls: Vec<String>,
    pub usage: UsageTracker,
}

pub struct ToolLoop<'a> {
    provider: &'a dyn LlmProvider,
    tools: &'a [SharedTool],
    model: Option<String>,
    max_iterations: usize,
}

impl<'a> ToolLoop<'a> {
    pub fn new(provider: &'a dyn LlmProvider, tools: &'a [SharedTool]) -> Self {
        Self {
            provider,
            tools,
            model: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub async fn run(&self, mut messages: Vec<ChatMessage>) -> Result<LoopOutcome> {
        let definitions = self.tools.iter().map(|t| t.definition()).collect::<Vec<_>>();
        let mut usage = UsageTracker::new();
        let mut called = Vec::new();

        for iteration in 1..=self.max_iterations {
            let mut request = CompletionRequest::new(messages.clone()).with_tools(definitions.clone());
            if let Some(model) = &self.model {
                request = request.with_model(model.clone());
            }

            let response = self
                .provider
                .complete(request)
                .await
                .map_err(|e| Error::from(e).with_operation("tool_loop::run"))?;
            usage.track(&response.model, &response.usage);

            if response.tool_calls.is_empty() {
                return Ok(LoopOutcome {
                    answer: response.content.unwrap_or_default(),
                    iterations: iteration,
                    tool_calls: called,
                    usage,
                });
            }

            messages.push(ChatMessage::assistant_tool_calls(
                response.content.clone(),
                response.tool_calls.clone(),
            ));
            for call in &response.tool_calls {
                called.push(call.name.clone());
                let output = self.call_tool(call).await;
                messages.push(ChatMessage::tool_result(&call.id, output));
            }
        }

        Err(Error::new(
            ErrorKind::InferenceFailed,
            format!("no final answer after {} iterations", self.max_iterations),
        )
        .with_operation("tool_loop::run")
        .with_context("tools_called", called.join(",")))
    }

    fn tool(&self, name: &str) -> Result<&SharedTool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .ok_or_else(|| Error::tool_not_found(name).with_operation("tool_loop::call_tool"))
    }

    async fn call_tool(&self, call: &ToolCall) -> String {
        let tool = match self.tool(&call.name) {
            Ok(tool) => tool,
            Err(e) => {
                warn!(tool = %call.name, "model called an unavailable tool");
                return format!("Error: {}", e.message());
            }
        };

        let arguments = if call.arguments.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            match serde_json::from_str::<Value>(&call.arguments) {
                Ok(args) => args,
                Err(e) => return format!("Error: arguments are not valid JSON: {}", e),
            }
        };

        debug!(tool = %call.name, %arguments, "invoking tool");
        match tool.invoke(arguments).await {
            Ok(output) => output,
            Err(e) => {
                warn!(tool = %call.name, error = %e, "tool failed");
                format!("Error: {}", e.message())
            }
        }
    }
}
