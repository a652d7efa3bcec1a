//! Tools agents can call, and the registry that names them

use crate::error::{Error, Result};
use crate::provider::ToolDefinition;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// A named, described capability
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the arguments object
    fn parameters(&self) -> Value {
        serde_json::json!({"type": "object", "properties": {}, "required": []})
    }

    /// Run the tool; the result goes back to the model as text
    async fn invoke(&self, arguments: Value) -> Result<String>;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(self.name(), self.description()).with_parameters(self.parameters())
    }
}

pub type SharedTool = Arc<dyn Tool>;

type ToolFn = Box<dyn Fn(Value) -> Result<String> + Send + Sync>;

/// A tool backed by a synchronous closure
pub struct FnTool {
    name: String,
    description: String,
    parameters: Value,
    func: ToolFn,
}

impl FnTool {
    pub fn new<F>(name: impl Into<String>, description: impl Into<String>, func: F) -> Self
    where
        F: Fn(Value) -> Result<String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: serde_json::json!({"type": "object", "properties": {}, "required": []}),
            func: Box::new(func),
        }
    }

    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = parameters;
        self
    }
}

#[async_trait]
impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Value {
        self.parameters.clone()
    }

    async fn invoke(&self, arguments: Value) -> Result<String> {
        (self.func)(arguments)
    }
}

/// Result of picking tools by name
#[derive(Clone, Default)]
pub struct Selection {
    pub tools: Vec<SharedTool>,
    /// Requested names that are not registered
    pub missing: Vec<String>,
}

/// Registered tools in registration order, names unique
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<SharedTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: SharedTool) -> Result<()> {
        if self.contains(tool.name()) {
            return Err(Error::invalid_argument(format!(
                "tool '{}' is already registered",
                tool.name()
            ))
            .with_operation("tool_registry::register"));
        }
        self.tools.push(tool);
        Ok(())
    }

    pub fn with_tool(mut self, tool: SharedTool) -> Result<Self> {
        self.register(tool)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<SharedTool> {
        self.tools.iter().find(|t| t.name() == name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.iter().any(|t| t.name() == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Tools named in `names`, in request order; unknown names are reported
    /// in `missing` and duplicates are collapsed
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Selection {
        let mut selection = Selection::default();
        for name in names {
            let name = name.as_ref();
            match self.get(name) {
                Some(tool) => {
                    if !selection.tools.iter().any(|t| t.name() == name) {
                        selection.tools.push(tool);
                    }
                }
                None => selection.missing.push(name.to_string()),
            }
        }
        selection
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SharedTool> {
        self.tools.iter()
    }
}

impl FromIterator<SharedTool> for ToolRegistry {
    /// Later tools with an already-seen name are ignored
    fn from_iter<I: IntoIterator<Item = SharedTool>>(iter: I) -> Self {
        let mut registry = ToolRegistry::new();
        for tool in iter {
            let _ = registry.register(tool);
        }
        registry
    }
}
