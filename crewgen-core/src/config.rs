//! Crew configuration types
//!
//! The roster skeleton, the per-agent and per-task details, and the finished
//! `CrewConfig` that is saved, reviewed and materialized.

use crate::error::{Error, ErrorKind, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// One task in the roster, delegated to one agent by name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterTask {
    pub task: String,
    pub agent: String,
}

/// Agent names and task assignments
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrewRoster {
    pub agents: Vec<String>,
    pub tasks: Vec<RosterTask>,
}

impl CrewRoster {
    /// Agent names are unique and every task goes to a listed agent
    pub fn validate(&self) -> Result<()> {
        if self.agents.is_empty() {
            return Err(Error::roster_invalid("roster has no agents"));
        }

        let mut seen = HashSet::new();
        for name in &self.agents {
            if !seen.insert(name.as_str()) {
                return Err(Error::roster_invalid(format!("agent '{}' is listed twice", name))
                    .with_context("agent", name.clone()));
            }
        }

        for task in &self.tasks {
            if !seen.contains(task.agent.as_str()) {
                return Err(Error::roster_invalid(format!(
                    "task '{}' is assigned to unknown agent '{}'",
                    task.task, task.agent
                ))
                .with_context("task", task.task.clone())
                .with_context("agent", task.agent.clone()));
            }
        }
        Ok(())
    }

    /// Task names assigned to `agent`, in roster order
    pub fn tasks_for(&self, agent: &str) -> Vec<&str> {
        self.tasks
            .iter()
            .filter(|t| t.agent == agent)
            .map(|t| t.task.as_str())
            .collect()
    }
}

/// Full description of one agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Roster name; the model does not produce it
    #[serde(default)]
    pub name: String,
    pub role: String,
    pub goal: String,
    pub backstory: String,
    #[serde(default)]
    pub verbose: bool,
    #[serde(default)]
    pub allow_delegation: bool,
    #[serde(default)]
    pub tools: Vec<String>,
}

/// Full description of one task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskConfig {
    /// Roster task identifier
    #[serde(default)]
    pub name: String,
    pub description: String,
    /// Owning agent's name
    pub agent: String,
}

/// A finished configuration, agents and tasks cross-referenced by name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrewConfig {
    pub agents: Vec<AgentConfig>,
    pub tasks: Vec<TaskConfig>,
}

impl CrewConfig {
    pub fn agent(&self, name: &str) -> Option<&AgentConfig> {
        self.agents.iter().find(|a| a.name == name)
    }

    /// Every task names a known agent
    pub fn validate(&self) -> Result<()> {
        for task in &self.tasks {
            if self.agent(&task.agent).is_none() {
                return Err(Error::agent_not_found(&task.agent)
                    .with_operation("config::validate")
                    .with_context("task", task.name.clone()));
            }
        }
        Ok(())
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| {
            Error::serialization_failed(e.to_string()).with_operation("config::to_json")
        })
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = self.to_json_pretty()?;
        std::fs::write(path, content).map_err(|e| {
            Error::from(e)
                .with_operation("config::save")
                .with_context("path", path.display().to_string())
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::from(e)
                .with_operation("config::load")
                .with_context("path", path.display().to_string())
        })?;
        serde_json::from_str(&content).map_err(|e| {
            Error::new(ErrorKind::ParseFailed, e.to_string())
                .with_operation("config::load")
                .with_context("path", path.display().to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn roster() -> CrewRoster {
        serde_json::from_value(json!({
            "agents": ["content_writer", "web_developer"],
            "tasks": [
                {"task": "write_copy", "agent": "content_writer"},
                {"task": "build_webpage", "agent": "web_developer"},
                {"task": "write_about_us", "agent": "content_writer"}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_tasks_for_keeps_roster_order() {
        assert_eq!(roster().tasks_for("content_writer"), vec!["write_copy", "write_about_us"]);
        assert!(roster().tasks_for("nobody").is_empty());
    }

    #[test]
    fn test_roster_validation() {
        assert!(roster().validate().is_ok());

        let mut dup = roster();
        dup.agents.push("web_developer".into());
        assert_eq!(dup.validate().unwrap_err().kind(), ErrorKind::RosterInvalid);

        let mut orphan = roster();
        orphan.tasks.push(RosterTask {
            task: "seo".into(),
            agent: "seo_specialist".into(),
        });
        let err = orphan.validate().unwrap_err();
        assert_eq!(err.context_value("agent"), Some("seo_specialist"));
    }

    #[test]
    fn test_agent_config_defaults() {
        let agent: AgentConfig = serde_json::from_value(json!({
            "role": "Writer",
            "goal": "Write",
            "backstory": "Wrote before"
        }))
        .unwrap();
        assert!(agent.name.is_empty());
        assert!(!agent.verbose);
        assert!(agent.tools.is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crew.json");

        let config = CrewConfig {
            agents: vec![AgentConfig {
                name: "analyst".into(),
                role: "Data Analyst".into(),
                goal: "Answer questions".into(),
                backstory: "Knows SQL".into(),
                verbose: true,
                allow_delegation: false,
                tools: vec!["sql_tool".into()],
            }],
            tasks: vec![TaskConfig {
                name: "query_db".into(),
                description: "Count the rows".into(),
                agent: "analyst".into(),
            }],
        };
        config.save(&path).unwrap();
        assert_eq!(CrewConfig::load(&path).unwrap(), config);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = CrewConfig::load(dir.path().join("nope.json")).unwrap_err();
        assert_eq!(missing.kind(), ErrorKind::FileNotFound);

        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        assert_eq!(CrewConfig::load(&path).unwrap_err().kind(), ErrorKind::ParseFailed);
    }

    #[test]
    fn test_unknown_task_agent() {
        let config = CrewConfig {
            agents: vec![],
            tasks: vec![TaskConfig {
                name: "t".into(),
                description: "d".into(),
                agent: "ghost".into(),
            }],
        };
        assert_eq!(config.validate().unwrap_err().kind(), ErrorKind::AgentNotFound);
    }
}
