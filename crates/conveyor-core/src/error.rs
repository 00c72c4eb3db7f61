//! Error types for Conveyor.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // Configuration errors
    #[error("Pipeline not found: {0}")]
    PipelineNotFound(String),

    #[error("Stage '{stage}' not found in pipeline '{pipeline}'")]
    StageNotFound { pipeline: String, stage: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid resource name '{0}'")]
    InvalidResource(String),

    #[error("Invalid timer specification '{spec}': {reason}")]
    InvalidTimer { spec: String, reason: String },

    // Fan-out errors
    #[error("Could not find matching agents to run job [{job}] of stage [{stage}].")]
    NoMatchingAgents { job: String, stage: String },

    // Topology errors
    #[error("Cyclic dependency detected between: {}", .0.join(" -> "))]
    CyclicDependency(Vec<String>),

    #[error("Unknown node in dependency graph: {0}")]
    UnknownNode(String),

    // Infrastructure errors
    #[error("Store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // Generic
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
