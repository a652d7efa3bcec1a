//! Python REPL tool
//!
//! Runs a snippet with `python3 -c` in a child process and hands back what it
//! printed. Each call is a fresh interpreter; nothing survives between calls.

use crate::error::{Error, Result};
use crate::tool::Tool;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

pub const PYTHON_REPL: &str = "python_repl";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct PythonReplTool {
    interpreter: String,
    timeout: Duration,
}

impl Default for PythonReplTool {
    fn default() -> Self {
        Self::new()
    }
}

impl PythonReplTool {
    pub fn new() -> Self {
        Self {
            interpreter: "python3".to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Any program that accepts `-c <code>`
    pub fn with_interpreter(mut self, interpreter: impl Into<String>) -> Self {
        self.interpreter = interpreter.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Tool for PythonReplTool {
    fn name(&self) -> &str {
        PYTHON_REPL
    }

    fn description(&self) -> &str {
        "A Python shell. Use this to execute python commands. Input should be a valid python \
         command. If you want to see the output of a value, you should print it out with \
         `print(...)`."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {"type": "string", "description": "Python code to run"}
            },
            "required": ["command"]
        })
    }

    async fn invoke(&self, arguments: Value) -> Result<String> {
        let code = match &arguments {
            Value::String(code) => code.as_str(),
            other => other.get("command").and_then(Value::as_str).ok_or_else(|| {
                Error::tool_failed(PYTHON_REPL, "missing string argument 'command'")
            })?,
        };
        debug!(interpreter = %self.interpreter, chars = code.len(), "running python");

        let mut cmd = Command::new(&self.interpreter);
        cmd.arg("-c").arg(code).kill_on_drop(true);

        let output = timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| {
                Error::tool_failed(
                    PYTHON_REPL,
                    format!("timed out after {}s", self.timeout.as_secs_f32()),
                )
            })?
            .map_err(|e| {
                Error::tool_failed(PYTHON_REPL, format!("failed to start {}: {}", self.interpreter, e))
                    .set_source(e)
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if output.status.success() {
            return Ok(stdout.into_owned());
        }

        // the model reads the traceback and tries again
        let stderr = String::from_utf8_lossy(&output.stderr);
        warn!(status = ?output.status.code(), "python exited with an error");
        Ok(format!("{}{}", stdout, stderr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn shell() -> PythonReplTool {
        PythonReplTool::new().with_interpreter("sh")
    }

    #[tokio::test]
    async fn test_prints_are_returned() {
        let out = shell().invoke(json!({"command": "echo 42"})).await.unwrap();
        assert_eq!(out, "42\n");

        let out = shell().invoke(json!("echo bare")).await.unwrap();
        assert_eq!(out, "bare\n");
    }

    #[tokio::test]
    async fn test_failure_output_goes_back_to_the_model() {
        let out = shell()
            .invoke(json!({"command": "echo partial; echo 'NameError: x' >&2; exit 1"}))
            .await
            .unwrap();
        assert_eq!(out, "partial\nNameError: x\n");
    }

    #[tokio::test]
    async fn test_timeout_and_missing_interpreter() {
        let err = shell()
            .with_timeout(Duration::from_millis(100))
            .invoke(json!({"command": "sleep 5"}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ToolFailed);
        assert!(err.message().contains("timed out"));

        let err = PythonReplTool::new()
            .with_interpreter("definitely-not-an-interpreter")
            .invoke(json!({"command": "print(1)"}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ToolFailed);

        let err = shell().invoke(json!({"code": "echo"})).await.unwrap_err();
        assert!(err.message().contains("command"));
    }
}
