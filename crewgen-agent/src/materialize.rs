//! Finished config → runtime crew

use crate::crew::{Crew, CrewAgent, CrewTask};
use crewgen_core::{CrewConfig, Error, Result, SharedProvider, ToolRegistry};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Resolve tool names against `registry` and task owners against the agent
/// list. Unregistered tool names are dropped; an unknown agent is an error.
pub fn materialize(config: &CrewConfig, registry: &ToolRegistry, provider: SharedProvider) -> Result<Crew> {
    let mut agents = Vec::with_capacity(config.agents.len());
    let mut by_name: HashMap<&str, Arc<CrewAgent>> = HashMap::new();

    for agent in &config.agents {
        if by_name.contains_key(agent.name.as_str()) {
            return Err(Error::config_invalid(format!("agent '{}' is defined twice", agent.name))
                .with_operation("materialize")
                .with_context("agent", agent.name.clone()));
        }

        let selection = registry.select(agent.tools.as_slice());
        for missing in &selection.missing {
            warn!(agent = %agent.name, tool = %missing, "tool is not registered, dropping it");
        }

        let runtime = Arc::new(CrewAgent {
            name: agent.name.clone(),
            role: agent.role.clone(),
            goal: agent.goal.clone(),
            backstory: agent.backstory.clone(),
            verbose: agent.verbose,
            allow_delegation: agent.allow_delegation,
            tools: selection.tools,
        });
        by_name.insert(agent.name.as_str(), runtime.clone());
        agents.push(runtime);
    }

    let tasks = config
        .tasks
        .iter()
        .map(|task| {
            let agent = by_name.get(task.agent.as_str()).cloned().ok_or_else(|| {
                Error::agent_not_found(&task.agent)
                    .with_operation("materialize")
                    .with_context("task", task.name.clone())
            })?;
            Ok(CrewTask {
                name: task.name.clone(),
                description: task.description.clone(),
                agent,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    info!(agents = agents.len(), tasks = tasks.len(), "crew materialized");
    Ok(Crew::new(agents, tasks, provider))
}

/// Load a saved config and materialize it
pub fn load_crew(path: impl AsRef<Path>, registry: &ToolRegistry, provider: SharedProvider) -> Result<Crew> {
    let config = CrewConfig::load(path)?;
    materialize(&config, registry, provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crewgen_core::{AgentConfig, ErrorKind, FnTool, MockProvider, SharedTool, TaskConfig};

    fn tool(name: &str) -> SharedTool {
        Arc::new(FnTool::new(name, "test tool", |_| Ok(String::new())))
    }

    fn agent(name: &str, tools: &[&str]) -> AgentConfig {
        AgentConfig {
            name: name.into(),
            role: "Analyst".into(),
            goal: "Analyze".into(),
            backstory: "Analyzed before".into(),
            verbose: true,
            allow_delegation: false,
            tools: tools.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn task(name: &str, agent: &str) -> TaskConfig {
        TaskConfig {
            name: name.into(),
            description: format!("do {}", name),
            agent: agent.into(),
        }
    }

    #[test]
    fn test_only_registered_tools_survive() {
        let registry: ToolRegistry = [tool("sql_tool"), tool("python_repl")].into_iter().collect();
        let config = CrewConfig {
            agents: vec![agent("analyst", &["sql_tool", "web_scraper", "python_repl"])],
            tasks: vec![task("query", "analyst")],
        };

        let crew = materialize(&config, &registry, Arc::new(MockProvider::new())).unwrap();
        assert_eq!(crew.agents()[0].tool_names(), vec!["sql_tool", "python_repl"]);
        assert!(Arc::ptr_eq(&crew.tasks()[0].agent, &crew.agents()[0]));
    }

    #[test]
    fn test_unknown_task_agent() {
        let config = CrewConfig {
            agents: vec![agent("analyst", &[])],
            tasks: vec![task("report", "writer")],
        };
        let err = materialize(&config, &ToolRegistry::new(), Arc::new(MockProvider::new())).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AgentNotFound);
        assert_eq!(err.context_value("agent"), Some("writer"));
        assert_eq!(err.context_value("task"), Some("report"));
    }

    #[test]
    fn test_duplicate_agent_names() {
        let config = CrewConfig {
            agents: vec![agent("analyst", &[]), agent("analyst", &[])],
            tasks: vec![],
        };
        let err = materialize(&config, &ToolRegistry::new(), Arc::new(MockProvider::new())).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
    }

    #[test]
    fn test_load_saved_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crew.json");
        CrewConfig {
            agents: vec![agent("analyst", &["sql_tool"])],
            tasks: vec![task("query", "analyst"), task("summarize", "analyst")],
        }
        .save(&path)
        .unwrap();

        let registry: ToolRegistry = [tool("sql_tool")].into_iter().collect();
        let crew = load_crew(&path, &registry, Arc::new(MockProvider::new())).unwrap();
        assert_eq!(crew.tasks().len(), 2);
        assert_eq!(crew.agent("analyst").unwrap().tools.len(), 1);
    }
}
