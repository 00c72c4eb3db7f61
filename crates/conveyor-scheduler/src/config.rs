//! Scheduler loop configuration.

use conveyor_core::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between scheduling passes.
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    /// Upper bound on pipelines instantiated in one pass; the rest wait for the next one.
    #[serde(default = "default_max_pipelines")]
    pub max_pipelines_per_pass: usize,
}

fn default_interval() -> u64 {
    10
}

fn default_max_pipelines() -> usize {
    100
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            max_pipelines_per_pass: default_max_pipelines(),
        }
    }
}

impl SchedulerConfig {
    pub fn with_interval_secs(mut self, secs: u64) -> Self {
        self.interval_secs = secs.max(1);
        self
    }

    pub fn with_max_pipelines_per_pass(mut self, max: usize) -> Self {
        self.max_pipelines_per_pass = max;
        self
    }

    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&contents)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conveyor_core::Error;

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: SchedulerConfig = serde_yaml::from_str("interval_secs: 3").unwrap();
        assert_eq!(config.interval_secs, 3);
        assert_eq!(config.max_pipelines_per_pass, 100);
    }

    #[test]
    fn test_interval_never_zero() {
        assert_eq!(SchedulerConfig::default().with_interval_secs(0).interval_secs, 1);
    }

    #[test]
    fn test_from_file_reports_yaml_errors() {
        let path = std::env::temp_dir().join(format!("conveyor-scheduler-{}.yaml", std::process::id()));
        std::fs::write(&path, "interval_secs: [not, a, number]").unwrap();

        let result = SchedulerConfig::from_file(&path);
        std::fs::remove_file(&path).unwrap();

        assert!(matches!(result, Err(Error::Serialization(_))));
    }

    #[test]
    fn test_from_file_missing() {
        let result = SchedulerConfig::from_file("/nonexistent/conveyor/scheduler.yaml");
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
