//! Review checkpoints between pipeline stages
//!
//! A [`Reviewer`] sees the intermediate value as JSON and returns the value
//! the pipeline should continue with. Reviewers can approve as-is, hand the
//! value to a person in an editor, or follow a script in tests.

use async_trait::async_trait;
use crewgen_core::{CodeFixer, Error, ErrorKind, Result, SharedProvider};
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, warn};

/// Default scratch file, relative to the working directory
pub const SCRATCH_FILE: &str = "crew_config.json";

/// Where in the pipeline a review happens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Checkpoint {
    Roster,
    Agents,
    Tasks,
    Final,
}

impl Checkpoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Checkpoint::Roster => "roster",
            Checkpoint::Agents => "agents",
            Checkpoint::Tasks => "tasks",
            Checkpoint::Final => "final",
        }
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[async_trait]
pub trait Reviewer: Send + Sync {
    /// Return the value to continue with. `keep_file` asks file-backed
    /// reviewers to leave their scratch file behind.
    async fn review(&self, checkpoint: Checkpoint, value: Value, keep_file: bool) -> Result<Value>;
}

/// Accepts every value unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoApprove;

#[async_trait]
impl Reviewer for AutoApprove {
    async fn review(&self, checkpoint: Checkpoint, value: Value, _keep_file: bool) -> Result<Value> {
        info!(%checkpoint, "auto-approved");
        Ok(value)
    }
}

/// Writes the value to a scratch file and blocks on an external editor
pub struct EditorReviewer {
    editor: String,
    path: PathBuf,
    fixer: Option<(SharedProvider, CodeFixer)>,
}

impl EditorReviewer {
    pub fn new(editor: impl Into<String>) -> Self {
        Self {
            editor: editor.into(),
            path: PathBuf::from(SCRATCH_FILE),
            fixer: None,
        }
    }

    /// `editor`, else `$EDITOR`, else `vim`
    pub fn from_env(editor: Option<String>) -> Self {
        let editor = editor
            .or_else(|| std::env::var("EDITOR").ok().filter(|e| !e.trim().is_empty()))
            .unwrap_or_else(|| "vim".to_string());
        Self::new(editor)
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    /// Let the model repair a file that no longer decodes after editing
    pub fn with_fixer(mut self, provider: SharedProvider, fixer: CodeFixer) -> Self {
        self.fixer = Some((provider, fixer));
        self
    }

    pub fn editor(&self) -> &str {
        &self.editor
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn open_editor(&self) -> Result<()> {
        // "code --wait" style values carry their own arguments
        let mut parts = self.editor.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| Error::config_invalid("editor command is empty"))?;

        let status = tokio::process::Command::new(program)
            .args(parts)
            .arg(&self.path)
            .status()
            .await
            .map_err(|e| {
                Error::review_failed(format!("failed to launch editor '{}'", program))
                    .with_operation("review::open_editor")
                    .set_source(e)
            })?;

        if !status.success() {
            return Err(Error::review_failed(format!("editor exited with {}", status))
                .with_operation("review::open_editor")
                .with_context("editor", self.editor.clone()));
        }
        Ok(())
    }

    async fn edit_and_read(&self) -> Result<Value> {
        self.open_editor().await?;
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| Error::from(e).with_operation("review::read_scratch"))?;
        self.decode(&content).await
    }

    async fn decode(&self, content: &str) -> Result<Value> {
        let err = match serde_json::from_str::<Value>(content) {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        let Some((provider, fixer)) = &self.fixer else {
            return Err(Error::new(ErrorKind::ReviewFailed, "edited file is not valid JSON")
                .with_context("path", self.path.display().to_string())
                .set_source(err));
        };

        warn!(error = %err, "edited file does not decode, asking the model to repair it");
        let fixed = fixer.fix_json(provider.as_ref(), content).await.map_err(|e| {
            Error::review_failed(format!("edited file could not be repaired: {}", e.message()))
                .with_context("path", self.path.display().to_string())
        })?;
        Ok(fixed.value)
    }
}

#[async_trait]
impl Reviewer for EditorReviewer {
    async fn review(&self, checkpoint: Checkpoint, value: Value, keep_file: bool) -> Result<Value> {
        let pretty = serde_json::to_string_pretty(&value)
            .map_err(|e| Error::serialization_failed(e.to_string()))?;
        tokio::fs::write(&self.path, pretty)
            .await
            .map_err(|e| Error::from(e).with_operation("review::write_scratch"))?;

        info!(%checkpoint, path = %self.path.display(), editor = %self.editor, "waiting for review");
        let reviewed = self.edit_and_read().await;

        if !keep_file {
            if let Err(e) = tokio::fs::remove_file(&self.path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %self.path.display(), error = %e, "could not remove scratch file");
                }
            }
        }

        reviewed.map_err(|e| e.with_operation("review::editor").with_context("checkpoint", checkpoint.as_str()))
    }
}

type ReviewFn = Box<dyn Fn(Checkpoint, Value) -> Result<Value> + Send + Sync>;

/// Reviewer backed by a closure; records every checkpoint it sees
pub struct FnReviewer {
    func: ReviewFn,
    seen: Mutex<Vec<(Checkpoint, bool)>>,
}

impl FnReviewer {
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(Checkpoint, Value) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            func: Box::new(func),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Checkpoints visited so far, with the `keep_file` flag each got
    pub fn seen(&self) -> Vec<(Checkpoint, bool)> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Reviewer for FnReviewer {
    async fn review(&self, checkpoint: Checkpoint, value: Value, keep_file: bool) -> Result<Value> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push((checkpoint, keep_file));
        }
        (self.func)(checkpoint, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crewgen_core::{MockProvider, MockReply, RetryPolicy};
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_auto_approve_is_identity() {
        let value = json!({"agents": ["a"], "tasks": []});
        let out = AutoApprove.review(Checkpoint::Roster, value.clone(), false).await.unwrap();
        assert_eq!(out, value);
    }

    #[tokio::test]
    async fn test_editor_round_trip_removes_scratch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SCRATCH_FILE);
        let reviewer = EditorReviewer::new("true").with_path(&path);

        let value = json!({"agents": [{"name": "writer"}], "tasks": []});
        let out = reviewer.review(Checkpoint::Final, value.clone(), false).await.unwrap();
        assert_eq!(out, value);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_editor_keeps_file_when_asked() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SCRATCH_FILE);
        let reviewer = EditorReviewer::new("true").with_path(&path);

        reviewer.review(Checkpoint::Final, json!({"k": 1}), true).await.unwrap();
        let saved: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved, json!({"k": 1}));
    }

    #[tokio::test]
    async fn test_editor_edits_are_picked_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SCRATCH_FILE);
        let script = dir.path().join("edit.sh");
        std::fs::write(&script, "#!/bin/sh\necho '{\"edited\": true}' > \"$1\"\n").unwrap();

        let reviewer = EditorReviewer::new(format!("sh {}", script.display())).with_path(&path);
        let out = reviewer.review(Checkpoint::Agents, json!({"edited": false}), false).await.unwrap();
        assert_eq!(out, json!({"edited": true}));
    }

    #[tokio::test]
    async fn test_broken_edit_without_fixer_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SCRATCH_FILE);
        let script = dir.path().join("break.sh");
        std::fs::write(&script, "#!/bin/sh\necho '{\"agents\": [' > \"$1\"\n").unwrap();

        let reviewer = EditorReviewer::new(format!("sh {}", script.display())).with_path(&path);
        let err = reviewer.review(Checkpoint::Roster, json!({}), false).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ReviewFailed);
        assert_eq!(err.context_value("checkpoint"), Some("roster"));
    }

    #[tokio::test]
    async fn test_broken_edit_is_repaired_by_model() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SCRATCH_FILE);
        let script = dir.path().join("break.sh");
        std::fs::write(&script, "#!/bin/sh\necho '{\"agents\": [\"a\"]' > \"$1\"\n").unwrap();

        let provider = Arc::new(MockProvider::new().with_reply(MockReply::json_block(&json!({"agents": ["a"]}))));
        let reviewer = EditorReviewer::new(format!("sh {}", script.display()))
            .with_path(&path)
            .with_fixer(provider, CodeFixer::new().with_retry(RetryPolicy::immediate(1)));

        let out = reviewer.review(Checkpoint::Roster, json!({}), false).await.unwrap();
        assert_eq!(out, json!({"agents": ["a"]}));
    }

    #[tokio::test]
    async fn test_failing_editor() {
        let dir = tempfile::tempdir().unwrap();
        let reviewer = EditorReviewer::new("false").with_path(dir.path().join(SCRATCH_FILE));
        let err = reviewer.review(Checkpoint::Final, json!({}), false).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ReviewFailed);
    }

    #[test]
    fn test_editor_override_wins() {
        assert_eq!(EditorReviewer::from_env(Some("nano".into())).editor(), "nano");
    }
}
