//! Agent snapshot used while expanding a pipeline into job plans.

use conveyor_core::Result;
use conveyor_core::agent::{Agent, ResourceConstraints};
use conveyor_core::ports::AgentDirectory;

/// Who approved the schedule and which agents were known when it happened.
///
/// Taken once per scheduling attempt so every run-on-all-agents job in a
/// run sees the same set of agents.
#[derive(Debug, Clone)]
pub struct SchedulingContext {
    approved_by: String,
    agents: Vec<Agent>,
}

impl SchedulingContext {
    pub fn new(approved_by: impl Into<String>, agents: Vec<Agent>) -> Self {
        Self {
            approved_by: approved_by.into(),
            agents,
        }
    }

    pub fn from_directory(approved_by: impl Into<String>, directory: &dyn AgentDirectory) -> Result<Self> {
        Ok(Self::new(approved_by, directory.agents()?))
    }

    pub fn approved_by(&self) -> &str {
        &self.approved_by
    }

    /// Live agents satisfying `constraints`, in directory order.
    pub fn matching_agents(&self, constraints: &ResourceConstraints) -> Vec<&Agent> {
        self.agents
            .iter()
            .filter(|agent| agent.satisfies(constraints))
            .collect()
    }
}
