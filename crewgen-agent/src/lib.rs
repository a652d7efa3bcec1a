//! # Crewgen Agent
//!
//! Turns an objective into a running crew:
//! 1. The model proposes a roster of agents and task assignments
//! 2. Each agent and each task is fleshed out, concurrently and in roster order
//! 3. A reviewer may inspect or edit the config between stages
//! 4. The finished config is materialized against a tool registry
//! 5. `Crew::kickoff` runs the tasks in order
//!
//! The model designs the crew; this crate checks and wires what it returns.

mod crew;
mod generator;
mod materialize;
mod review;

pub use crew::{Crew, CrewAgent, CrewOutput, CrewTask, TaskOutput};
pub use generator::{
    generate_agent_config, generate_crew_config, generate_task_config, CrewGenerator,
    GeneratedCrew, GeneratorConfig,
};
pub use materialize::{load_crew, materialize};
pub use review::{AutoApprove, Checkpoint, EditorReviewer, FnReviewer, Reviewer, SCRATCH_FILE};
