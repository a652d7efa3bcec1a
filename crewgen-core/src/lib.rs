//! # Crewgen core
//!
//! Building blocks for turning an objective into a crew configuration.
//!
//! ## Core Concepts
//! - **Prompts**: Static templates with `{name}` placeholders
//! - **Extraction**: Strict JSON decoding of the first fenced block in a reply
//! - **LLM functions**: Template + model + success predicate, retried until the reply fits
//! - **Configs**: Roster, agent and task configs, saved and loaded as JSON
//! - **Tools**: A `Tool` trait, a name-unique registry and a bounded tool-calling loop
//! - **SQL**: A SQLite-backed agent exposed to crews as a single tool
//! - **Python**: A `python_repl` tool running snippets in a child interpreter
//! - **Provider**: Trait-based LLM communication (OpenAI, Anthropic, local, mock)

pub mod config;
pub mod error;
pub mod extract;
pub mod fixer;
pub mod llm_function;
pub mod prompt;
pub mod prompts;
pub mod provider;
pub mod python;
pub mod sql;
pub mod tool;
pub mod tool_loop;

pub use config::{AgentConfig, CrewConfig, CrewRoster, RosterTask, TaskConfig};
pub use error::{Error, ErrorKind, ErrorStatus, Result};
pub use extract::{extract_code_block, CodeBlock, Extracted};
pub use fixer::CodeFixer;
pub use llm_function::{has_keys, Generated, LlmFunction, RetryPolicy};
pub use prompt::{PromptTemplate, PromptVars};
pub use provider::{
    AnthropicProvider, ChatMessage, CompletionRequest, CompletionResponse, FinishReason,
    LlmProvider, MockProvider, MockReply, OpenAIProvider, ProviderConfig, ProviderError,
    ProviderType, Role, SharedProvider, ToolCall, ToolDefinition, Usage,
    UsageTracker,
};
pub use python::{PythonReplTool, PYTHON_REPL};
pub use sql::{build_sql_tool, SqlAgent, SqlAgentTool, SqlDatabase, TableQa};
pub use tool::{FnTool, SharedTool, Tool, ToolRegistry};
pub use tool_loop::{LoopOutcome, ToolLoop};
