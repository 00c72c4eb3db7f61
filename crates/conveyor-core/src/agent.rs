//! Agent types and job-to-agent constraints.

use crate::ids::AgentId;
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Agent {
    pub id: AgentId,
    pub hostname: String,
    pub resources: Vec<String>,
    pub environments: Vec<String>,
    pub status: AgentStatus,
    pub registered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Idle,
    Building,
    Pending,
    Disabled,
    LostContact,
}

impl AgentStatus {
    /// Registered, enabled and talking to the server.
    pub fn is_live(&self) -> bool {
        matches!(self, AgentStatus::Idle | AgentStatus::Building)
    }
}

impl Agent {
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            id: AgentId::new(),
            hostname: hostname.into(),
            resources: vec![],
            environments: vec![],
            status: AgentStatus::Idle,
            registered_at: Utc::now(),
        }
    }

    pub fn with_resources<I, S>(mut self, resources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.resources = resources.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_environments<I, S>(mut self, environments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.environments = environments.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_status(mut self, status: AgentStatus) -> Self {
        self.status = status;
        self
    }

    pub fn has_resource(&self, resource: &str) -> bool {
        self.resources.iter().any(|r| r.trim().eq_ignore_ascii_case(resource.trim()))
    }

    pub fn in_environment(&self, environment: &str) -> bool {
        self.environments.iter().any(|e| e.eq_ignore_ascii_case(environment))
    }

    /// Whether this agent may run a job with the given constraints.
    ///
    /// A job of a pipeline outside any environment only goes to agents that
    /// are outside every environment too.
    pub fn satisfies(&self, constraints: &ResourceConstraints) -> bool {
        if !self.status.is_live() {
            return false;
        }
        if !constraints.resources.iter().all(|r| self.has_resource(r)) {
            return false;
        }
        match &constraints.environment {
            Some(env) => self.in_environment(env),
            None => self.environments.is_empty(),
        }
    }
}

/// What a job needs from an agent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceConstraints {
    pub resources: Vec<String>,
    pub environment: Option<String>,
}

impl ResourceConstraints {
    pub fn new(resources: Vec<String>, environment: Option<String>) -> Self {
        Self {
            resources,
            environment,
        }
    }
}

/// Agent entry in the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AgentRegistration {
    pub hostname: String,
    #[serde(default)]
    pub resources: Vec<String>,
    #[serde(default)]
    pub environments: Vec<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl AgentRegistration {
    pub fn into_agent(self) -> Agent {
        let status = if self.enabled {
            AgentStatus::Idle
        } else {
            AgentStatus::Disabled
        };
        Agent::new(self.hostname)
            .with_resources(self.resources)
            .with_environments(self.environments)
            .with_status(status)
    }
}
