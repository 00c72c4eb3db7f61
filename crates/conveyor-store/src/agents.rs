//! In-memory agent registry.

use crate::poisoned;
use conveyor_core::Result;
use conveyor_core::agent::{Agent, AgentRegistration, AgentStatus};
use conveyor_core::ids::AgentId;
use conveyor_core::ports::AgentDirectory;
use std::sync::RwLock;
use tracing::info;

/// Agents in registration order.
#[derive(Default)]
pub struct InMemoryAgentDirectory {
    agents: RwLock<Vec<Agent>>,
}

impl InMemoryAgentDirectory {
    pub fn new(agents: Vec<Agent>) -> Self {
        Self {
            agents: RwLock::new(agents),
        }
    }

    pub fn from_registrations(registrations: Vec<AgentRegistration>) -> Self {
        Self::new(
            registrations
                .into_iter()
                .map(AgentRegistration::into_agent)
                .collect(),
        )
    }

    pub fn register(&self, agent: Agent) -> Result<AgentId> {
        let id = agent.id;
        info!(agent_id = %id, hostname = %agent.hostname, "Agent registered");
        self.agents.write().map_err(poisoned)?.push(agent);
        Ok(id)
    }

    /// Returns whether the agent exists.
    pub fn set_status(&self, id: AgentId, status: AgentStatus) -> Result<bool> {
        let mut agents = self.agents.write().map_err(poisoned)?;
        match agents.iter_mut().find(|a| a.id == id) {
            Some(agent) => {
                agent.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl AgentDirectory for InMemoryAgentDirectory {
    fn agents(&self) -> Result<Vec<Agent>> {
        Ok(self.agents.read().map_err(poisoned)?.clone())
    }
}
