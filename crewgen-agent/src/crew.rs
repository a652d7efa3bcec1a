//! Minimal crew runtime
//!
//! Tasks run in order. Each one is a tool-calling conversation with its
//! agent, seeded with the outputs of the tasks before it.

use crewgen_core::tool_loop::DEFAULT_MAX_ITERATIONS;
use crewgen_core::{ChatMessage, Result, SharedProvider, SharedTool, ToolLoop, UsageTracker};
use std::sync::Arc;
use tracing::{debug, info};

/// A live agent with resolved tools
pub struct CrewAgent {
    pub name: String,
    pub role: String,
    pub goal: String,
    pub backstory: String,
    pub verbose: bool,
    pub allow_delegation: bool,
    pub tools: Vec<SharedTool>,
}

impl CrewAgent {
    pub fn system_prompt(&self) -> String {
        format!(
            "You are {}.\n{}\n\nYour personal goal is: {}",
            self.role, self.backstory, self.goal
        )
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }
}

impl std::fmt::Debug for CrewAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrewAgent")
            .field("name", &self.name)
            .field("role", &self.role)
            .field("tools", &self.tool_names())
            .finish()
    }
}

/// A task bound to the agent that runs it
#[derive(Debug, Clone)]
pub struct CrewTask {
    pub name: String,
    pub description: String,
    pub agent: Arc<CrewAgent>,
}

#[derive(Debug, Clone)]
pub struct TaskOutput {
    pub task: String,
    pub agent: String,
    pub output: String,
}

#[derive(Debug, Clone)]
pub struct CrewOutput {
    pub tasks: Vec<TaskOutput>,
    /// Output of the last task
    pub final_output: String,
    pub usage: UsageTracker,
}

pub struct Crew {
    agents: Vec<Arc<CrewAgent>>,
    tasks: Vec<CrewTask>,
    provider: SharedProvider,
    model: Option<String>,
    max_iterations: usize,
}

impl std::fmt::Debug for Crew {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Crew")
            .field("agents", &self.agents)
            .field("tasks", &self.tasks.iter().map(|t| t.name.as_str()).collect::<Vec<_>>())
            .field("provider", &self.provider.name())
            .field("model", &self.model)
            .finish()
    }
}

impl Crew {
    pub fn new(agents: Vec<Arc<CrewAgent>>, tasks: Vec<CrewTask>, provider: SharedProvider) -> Self {
        Self {
            agents,
            tasks,
            provider,
            model: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn agents(&self) -> &[Arc<CrewAgent>] {
        &self.agents
    }

    pub fn tasks(&self) -> &[CrewTask] {
        &self.tasks
    }

    pub fn agent(&self, name: &str) -> Option<&Arc<CrewAgent>> {
        self.agents.iter().find(|a| a.name == name)
    }

    pub async fn kickoff(&self) -> Result<CrewOutput> {
        let mut outputs: Vec<TaskOutput> = Vec::with_capacity(self.tasks.len());
        let mut usage = UsageTracker::new();

        for (i, task) in self.tasks.iter().enumerate() {
            info!(
                task = %task.name,
                agent = %task.agent.name,
                step = i + 1,
                total = self.tasks.len(),
                "starting task"
            );

            let messages = vec![
                ChatMessage::system(task.agent.system_prompt()),
                ChatMessage::user(task_prompt(task, &outputs)),
            ];
            let outcome = ToolLoop::new(self.provider.as_ref(), &task.agent.tools)
                .with_model(self.model.clone())
                .with_max_iterations(self.max_iterations)
                .run(messages)
                .await
                .map_err(|e| {
                    e.with_operation("crew::kickoff")
                        .with_context("task", task.name.clone())
                        .with_context("agent", task.agent.name.clone())
                })?;
            usage.merge(&outcome.usage);

            if task.agent.verbose {
                info!(task = %task.name, output = %outcome.answer, "task finished");
            } else {
                debug!(task = %task.name, output = %outcome.answer, "task finished");
            }

            outputs.push(TaskOutput {
                task: task.name.clone(),
                agent: task.agent.name.clone(),
                output: outcome.answer,
            });
        }

        let final_output = outputs.last().map(|o| o.output.clone()).unwrap_or_default();
        Ok(CrewOutput {
            tasks: outputs,
            final_output,
            usage,
        })
    }
}

fn task_prompt(task: &CrewTask, previous: &[TaskOutput]) -> String {
    let mut prompt = format!("Current task: {}", task.description);
    if !previous.is_empty() {
        prompt.push_str("\n\nThis is the context you're working with:");
        for output in previous {
            prompt.push_str(&format!("\n\n## {} ({})\n{}", output.task, output.agent, output.output));
        }
    }
    prompt.push_str("\n\nBegin! Your final answer should be the complete result of the task.");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crewgen_core::provider::last_user_text;
    use crewgen_core::{FnTool, MockProvider, MockReply};
    use serde_json::json;

    fn agent(name: &str, tools: Vec<SharedTool>) -> Arc<CrewAgent> {
        Arc::new(CrewAgent {
            name: name.into(),
            role: format!("{} role", name),
            goal: "Finish the job".into(),
            backstory: "Has done this before".into(),
            verbose: false,
            allow_delegation: false,
            tools,
        })
    }

    #[tokio::test]
    async fn test_kickoff_passes_context_forward() {
        let lookup: SharedTool = Arc::new(FnTool::new("lookup", "Look up a fact", |_| {
            Ok("plants need light".to_string())
        }));
        let researcher = agent("researcher", vec![lookup]);
        let writer = agent("writer", vec![]);

        let provider = Arc::new(MockProvider::new().with_replies([
            MockReply::tool_call("lookup", json!({})),
            MockReply::text("Research: plants need light"),
            MockReply::text("Article about light"),
        ]));

        let crew = Crew::new(
            vec![researcher.clone(), writer.clone()],
            vec![
                CrewTask {
                    name: "research".into(),
                    description: "Research plant care".into(),
                    agent: researcher,
                },
                CrewTask {
                    name: "write".into(),
                    description: "Write the article".into(),
                    agent: writer,
                },
            ],
            provider.clone(),
        );

        let out = crew.kickoff().await.unwrap();
        assert_eq!(out.tasks.len(), 2);
        assert_eq!(out.tasks[0].output, "Research: plants need light");
        assert_eq!(out.final_output, "Article about light");
        assert_eq!(out.usage.total_calls, 3);

        let requests = provider.requests();
        assert!(requests[0].tools.is_some());
        assert!(requests[2].tools.is_none());
        let write_prompt = last_user_text(&requests[2]);
        assert!(write_prompt.contains("Write the article"));
        assert!(write_prompt.contains("Research: plants need light"));
        assert!(requests[2].messages[0]
            .content
            .as_deref()
            .unwrap()
            .starts_with("You are writer role."));
    }

    #[tokio::test]
    async fn test_failed_task_names_itself() {
        let solo = agent("solo", vec![]);
        let crew = Crew::new(
            vec![solo.clone()],
            vec![CrewTask {
                name: "only".into(),
                description: "Do it".into(),
                agent: solo,
            }],
            Arc::new(MockProvider::new().with_reply(MockReply::fail("boom"))),
        );

        let err = crew.kickoff().await.unwrap_err();
        assert_eq!(err.context_value("task"), Some("only"));
    }

    #[test]
    fn test_debug_lists_agents_and_tasks() {
        let solo = agent("solo", vec![]);
        let crew = Crew::new(
            vec![solo.clone()],
            vec![CrewTask {
                name: "only".into(),
                description: "Do it".into(),
                agent: solo,
            }],
            Arc::new(MockProvider::new()),
        );

        let shown = format!("{:?}", crew);
        assert!(shown.contains("solo role"));
        assert!(shown.contains("\"only\""));
        assert!(shown.contains("\"mock\""));
    }
}
