//! Crew config generation
//!
//! Roster first, then one agent config per roster agent, then one task config
//! per roster task. Agent and task configs are independent of their siblings,
//! so each batch runs concurrently and is joined in roster order.

use crate::review::{AutoApprove, Checkpoint, Reviewer};
use crewgen_core::error::invalid_response;
use crewgen_core::{
    has_keys, prompts, AgentConfig, CrewConfig, CrewRoster, Error, Generated, LlmFunction,
    LlmProvider, PromptVars, Result, RetryPolicy, SharedProvider, TaskConfig, UsageTracker,
};
use futures_util::stream::{self, StreamExt, TryStreamExt};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

/// Knobs for a generation run
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Model identifier; the provider default when unset
    pub model: Option<String>,
    pub retry: RetryPolicy,
    /// Agent or task configs generated at once
    pub concurrency: usize,
    /// Review the roster, the agents and the tasks, not only the final config
    pub review_intermediate: bool,
    /// Leave the final review's scratch file in place
    pub keep_final_config: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            model: None,
            retry: RetryPolicy::default(),
            concurrency: 4,
            review_intermediate: true,
            keep_final_config: false,
        }
    }
}

impl GeneratorConfig {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.retry = self.retry.with_max_attempts(max_attempts);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_review_intermediate(mut self, review: bool) -> Self {
        self.review_intermediate = review;
        self
    }

    pub fn with_keep_final_config(mut self, keep: bool) -> Self {
        self.keep_final_config = keep;
        self
    }

    fn function(&self, template: crewgen_core::PromptTemplate) -> LlmFunction {
        LlmFunction::new(template)
            .with_model(self.model.clone())
            .with_retry(self.retry.clone())
    }
}

/// Ask for agent names and task assignments
pub async fn generate_crew_config(
    provider: &dyn LlmProvider,
    objective: &str,
    tool_names: &[String],
    config: &GeneratorConfig,
) -> Result<Generated<CrewRoster>> {
    let vars = PromptVars::new()
        .text("objective", objective)
        .json("tool_names", tool_names);

    let roster = config
        .function(prompts::CREW_ROSTER)
        .with_success(has_keys(&["agents", "tasks"]))
        .generate_with(provider, &vars, |value| {
            let roster: CrewRoster = serde_json::from_value(value.clone()).map_err(|e| {
                invalid_response(format!("roster does not match the expected shape: {}", e), &value.to_string())
            })?;
            roster
                .validate()
                .map_err(|e| invalid_response(e.message().to_string(), &value.to_string()))?;
            Ok(roster)
        })
        .await?;

    info!(
        agents = roster.value.agents.len(),
        tasks = roster.value.tasks.len(),
        attempts = roster.attempts,
        "roster generated"
    );
    Ok(roster)
}

/// Flesh out one roster agent; `agent_tasks` are the tasks assigned to it
pub async fn generate_agent_config(
    provider: &dyn LlmProvider,
    name: &str,
    objective: &str,
    agent_tasks: &[&str],
    tool_names: &[String],
    config: &GeneratorConfig,
) -> Result<Generated<AgentConfig>> {
    info!(agent = name, "generating agent config");

    let vars = PromptVars::new()
        .text("objective", objective)
        .text("name", name)
        .json("agent_tasks", agent_tasks)
        .json("tool_names", tool_names);

    let mut agent = config
        .function(prompts::AGENT_CONFIG)
        .with_success(has_keys(&["role", "goal", "backstory"]))
        .generate_typed::<AgentConfig>(provider, &vars)
        .await
        .map_err(|e| e.with_context("agent", name))?;
    agent.value.name = name.to_string();
    Ok(agent)
}

#[derive(Deserialize)]
struct TaskReply {
    description: String,
    #[allow(dead_code)]
    agent: String,
}

/// Describe one roster task for its owning agent
pub async fn generate_task_config(
    provider: &dyn LlmProvider,
    task_name: &str,
    objective: &str,
    agent: &AgentConfig,
    config: &GeneratorConfig,
) -> Result<Generated<TaskConfig>> {
    info!(task = task_name, agent = %agent.name, "generating task config");

    let vars = PromptVars::new()
        .text("objective", objective)
        .text("task_description", task_name)
        .text("agent_role", &agent.role)
        .json("tool_names", &agent.tools);

    let reply = config
        .function(prompts::TASK_CONFIG)
        .with_success(has_keys(&["description", "agent"]))
        .generate_typed::<TaskReply>(provider, &vars)
        .await
        .map_err(|e| e.with_context("task", task_name))?;

    // the model answers with a role; the config refers to agents by name
    Ok(Generated {
        value: TaskConfig {
            name: task_name.to_string(),
            description: reply.value.description,
            agent: agent.name.clone(),
        },
        attempts: reply.attempts,
        usage: reply.usage,
    })
}

/// A finished config and what it cost
#[derive(Debug, Clone)]
pub struct GeneratedCrew {
    pub config: CrewConfig,
    pub usage: UsageTracker,
}

/// Runs the whole pipeline with review checkpoints
pub struct CrewGenerator {
    provider: SharedProvider,
    reviewer: Arc<dyn Reviewer>,
    config: GeneratorConfig,
}

impl CrewGenerator {
    pub fn new(provider: SharedProvider) -> Self {
        Self {
            provider,
            reviewer: Arc::new(AutoApprove),
            config: GeneratorConfig::default(),
        }
    }

    pub fn with_reviewer(mut self, reviewer: Arc<dyn Reviewer>) -> Self {
        self.reviewer = reviewer;
        self
    }

    pub fn with_config(mut self, config: GeneratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub async fn create_full_config(&self, objective: &str, tool_names: &[String]) -> Result<GeneratedCrew> {
        let provider = self.provider.as_ref();
        let concurrency = self.config.concurrency.max(1);
        let mut usage = UsageTracker::new();

        let roster = generate_crew_config(provider, objective, tool_names, &self.config).await?;
        usage.merge(&roster.usage);
        let mut roster = roster.value;
        if self.config.review_intermediate {
            roster = self.review(Checkpoint::Roster, &roster, false).await?;
            roster.validate()?;
        }

        let generated = stream::iter(roster.agents.iter().map(|name| {
            let agent_tasks = roster.tasks_for(name);
            async move {
                generate_agent_config(provider, name, objective, &agent_tasks, tool_names, &self.config)
                    .await
            }
        }))
        .buffered(concurrency)
        .try_collect::<Vec<_>>()
        .await?;
        let mut agents = Vec::with_capacity(generated.len());
        for agent in generated {
            usage.merge(&agent.usage);
            agents.push(agent.value);
        }
        if self.config.review_intermediate {
            agents = self.review(Checkpoint::Agents, &agents, false).await?;
        }

        let owners = roster
            .tasks
            .iter()
            .map(|task| {
                agents
                    .iter()
                    .find(|a| a.name == task.agent)
                    .map(|agent| (task.task.as_str(), agent))
                    .ok_or_else(|| {
                        Error::agent_not_found(&task.agent)
                            .with_operation("generator::create_full_config")
                            .with_context("task", task.task.clone())
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        let generated = stream::iter(owners.into_iter().map(|(task_name, agent)| {
            generate_task_config(provider, task_name, objective, agent, &self.config)
        }))
        .buffered(concurrency)
        .try_collect::<Vec<_>>()
        .await?;
        let mut tasks = Vec::with_capacity(generated.len());
        for task in generated {
            usage.merge(&task.usage);
            tasks.push(task.value);
        }
        if self.config.review_intermediate {
            tasks = self.review(Checkpoint::Tasks, &tasks, false).await?;
        }

        let config = CrewConfig { agents, tasks };
        let config: CrewConfig = self
            .review(Checkpoint::Final, &config, self.config.keep_final_config)
            .await?;

        info!(
            agents = config.agents.len(),
            tasks = config.tasks.len(),
            calls = usage.total_calls,
            tokens = usage.total_tokens(),
            "crew config ready"
        );
        Ok(GeneratedCrew { config, usage })
    }

    async fn review<T>(&self, checkpoint: Checkpoint, value: &T, keep_file: bool) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
    {
        let json = serde_json::to_value(value).map_err(|e| Error::serialization_failed(e.to_string()))?;
        let reviewed: Value = self.reviewer.review(checkpoint, json, keep_file).await?;
        serde_json::from_value(reviewed).map_err(|e| {
            Error::review_failed(format!("reviewed {} no longer matches its schema: {}", checkpoint, e))
                .with_operation("generator::review")
                .with_context("checkpoint", checkpoint.as_str())
        })
    }
}
