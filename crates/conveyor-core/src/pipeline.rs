//! Pipeline definition types.
//!
//! These types represent the user-authored YAML configuration. A
//! [`ConfigFile`] is resolved once into plain [`PipelineDefinition`]s (the
//! environment a pipeline belongs to is copied onto it) so that the
//! scheduler never has to consult the raw file again.

use crate::agent::AgentRegistration;
use crate::error::{Error, Result};
use crate::ids::{JobName, PipelineName, StageName};
use crate::label::LabelTemplate;
use crate::material::MaterialConfig;
use crate::variables::EnvironmentVariables;
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;

static RESOURCE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[-\w\s|.]*$").unwrap_or_else(|_| unreachable!("resource pattern is valid"))
});

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ConfigFile {
    #[serde(default = "default_version")]
    pub version: String,
    pub pipelines: Vec<PipelineDefinition>,
    #[serde(default)]
    pub agents: Vec<AgentRegistration>,
    #[serde(default)]
    pub environments: Vec<EnvironmentConfig>,
}

fn default_version() -> String {
    "1".to_string()
}

/// A parsed configuration file together with its version fingerprint.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: ConfigFile,
    pub fingerprint: String,
}

/// SHA-256 hex digest of the raw configuration contents.
pub fn config_fingerprint(contents: &str) -> String {
    format!("{:x}", Sha256::digest(contents.as_bytes()))
}

impl ConfigFile {
    pub fn from_yaml(contents: &str) -> Result<LoadedConfig> {
        let config: ConfigFile = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(LoadedConfig {
            config: config.resolved(),
            fingerprint: config_fingerprint(contents),
        })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<LoadedConfig> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    pub fn pipeline(&self, name: &PipelineName) -> Option<&PipelineDefinition> {
        self.pipelines.iter().find(|p| &p.name == name)
    }

    /// Structural validation of every pipeline and environment.
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for pipeline in &self.pipelines {
            if !names.insert(&pipeline.name) {
                return Err(Error::InvalidConfig(format!(
                    "pipeline '{}' is defined more than once",
                    pipeline.name
                )));
            }
            pipeline.validate()?;
        }

        let mut placed = HashSet::new();
        for env in &self.environments {
            for member in &env.pipelines {
                if !names.contains(member) {
                    return Err(Error::InvalidConfig(format!(
                        "environment '{}' refers to unknown pipeline '{member}'",
                        env.name
                    )));
                }
                if !placed.insert(member) {
                    return Err(Error::InvalidConfig(format!(
                        "pipeline '{member}' belongs to more than one environment"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Copy each pipeline's environment membership and environment variables
    /// onto the definition. Pipeline variables win over environment ones.
    pub fn resolved(&self) -> ConfigFile {
        let mut resolved = self.clone();
        for pipeline in &mut resolved.pipelines {
            if let Some(env) = self
                .environments
                .iter()
                .find(|env| env.pipelines.contains(&pipeline.name))
            {
                pipeline.environment = Some(env.name.clone());
                pipeline.variables = env.variables.overridden_by(&pipeline.variables);
            }
        }
        resolved
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EnvironmentConfig {
    pub name: String,
    #[serde(default)]
    pub pipelines: Vec<PipelineName>,
    #[serde(default)]
    pub variables: EnvironmentVariables,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PipelineDefinition {
    pub name: PipelineName,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub label_template: LabelTemplate,
    pub materials: Vec<MaterialConfig>,
    pub stages: Vec<StageDefinition>,
    #[serde(default)]
    pub variables: EnvironmentVariables,
    #[serde(default)]
    pub timer: Option<TimerConfig>,
    #[serde(default)]
    pub paused: bool,
    /// Filled in from the environment the pipeline belongs to.
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default)]
    pub origin: ConfigOrigin,
}

impl PipelineDefinition {
    pub fn new(name: impl Into<PipelineName>, materials: Vec<MaterialConfig>, stages: Vec<StageDefinition>) -> Self {
        Self {
            name: name.into(),
            group: None,
            label_template: LabelTemplate::default(),
            materials,
            stages,
            variables: EnvironmentVariables::new(),
            timer: None,
            paused: false,
            environment: None,
            origin: ConfigOrigin::Local,
        }
    }

    pub fn with_variables(mut self, variables: EnvironmentVariables) -> Self {
        self.variables = variables;
        self
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    pub fn with_origin(mut self, origin: ConfigOrigin) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_timer(mut self, timer: TimerConfig) -> Self {
        self.timer = Some(timer);
        self
    }

    pub fn first_stage(&self) -> Option<&StageDefinition> {
        self.stages.first()
    }

    pub fn stage(&self, name: &StageName) -> Option<&StageDefinition> {
        self.stages.iter().find(|s| &s.name == name)
    }

    /// Pipelines this one consumes through dependency materials.
    pub fn upstream_pipelines(&self) -> impl Iterator<Item = &PipelineName> {
        self.materials.iter().filter_map(MaterialConfig::upstream_pipeline)
    }

    pub fn depends_on(&self, upstream: &PipelineName) -> bool {
        self.upstream_pipelines().any(|p| p == upstream)
    }

    pub fn validate(&self) -> Result<()> {
        if self.stages.is_empty() {
            return Err(Error::InvalidConfig(format!(
                "pipeline '{}' must define at least one stage",
                self.name
            )));
        }
        if self.materials.is_empty() {
            return Err(Error::InvalidConfig(format!(
                "pipeline '{}' must define at least one material",
                self.name
            )));
        }
        let mut fingerprints = HashSet::new();
        for material in &self.materials {
            if !fingerprints.insert(material.fingerprint()) {
                return Err(Error::InvalidConfig(format!(
                    "pipeline '{}' declares material '{}' more than once",
                    self.name,
                    material.display_name()
                )));
            }
        }
        self.label_template.validate()?;

        let mut stage_names = HashSet::new();
        for stage in &self.stages {
            if !stage_names.insert(&stage.name) {
                return Err(Error::InvalidConfig(format!(
                    "stage '{}' is defined more than once in pipeline '{}'",
                    stage.name, self.name
                )));
            }
            stage.validate(&self.name)?;
        }
        Ok(())
    }
}

/// Where a pipeline definition came from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConfigOrigin {
    #[default]
    Local,
    /// Defined in a config repository, parsed at a specific revision of it.
    ConfigRepo {
        material: MaterialConfig,
        revision: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TimerConfig {
    /// Cron expression (seconds field first).
    pub spec: String,
    #[serde(default)]
    pub only_on_changes: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Approval {
    /// Runs automatically when the previous stage passes.
    #[default]
    Success,
    Manual,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StageDefinition {
    pub name: StageName,
    #[serde(default)]
    pub approval: Approval,
    #[serde(default)]
    pub variables: EnvironmentVariables,
    pub jobs: Vec<JobDefinition>,
}

impl StageDefinition {
    pub fn new(name: impl Into<StageName>, jobs: Vec<JobDefinition>) -> Self {
        Self {
            name: name.into(),
            approval: Approval::default(),
            variables: EnvironmentVariables::new(),
            jobs,
        }
    }

    pub fn with_approval(mut self, approval: Approval) -> Self {
        self.approval = approval;
        self
    }

    pub fn with_variables(mut self, variables: EnvironmentVariables) -> Self {
        self.variables = variables;
        self
    }

    pub fn validate(&self, pipeline: &PipelineName) -> Result<()> {
        if self.jobs.is_empty() {
            return Err(Error::InvalidConfig(format!(
                "stage '{}' of pipeline '{pipeline}' must define at least one job",
                self.name
            )));
        }
        let mut job_names = HashSet::new();
        for job in &self.jobs {
            if !job_names.insert(&job.name) {
                return Err(Error::InvalidConfig(format!(
                    "job '{}' is defined more than once in stage '{}' of pipeline '{pipeline}'",
                    job.name, self.name
                )));
            }
            job.validate()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JobDefinition {
    pub name: JobName,
    #[serde(default)]
    pub resources: Vec<String>,
    #[serde(default)]
    pub variables: EnvironmentVariables,
    #[serde(default)]
    pub tasks: Vec<String>,
    #[serde(default)]
    pub run_on_all_agents: bool,
    #[serde(default)]
    pub run_instance_count: Option<u32>,
    #[serde(default)]
    pub timeout_minutes: Option<u32>,
}

/// How a job template expands into job plans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanOut {
    Single,
    RunOnAllAgents,
    RunMultipleInstances(u32),
}

impl JobDefinition {
    pub fn new(name: impl Into<JobName>) -> Self {
        Self {
            name: name.into(),
            resources: vec![],
            variables: EnvironmentVariables::new(),
            tasks: vec![],
            run_on_all_agents: false,
            run_instance_count: None,
            timeout_minutes: None,
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

    pub fn with_variables(mut self, variables: EnvironmentVariables) -> Self {
        self.variables = variables;
        self
    }

    pub fn run_on_all_agents(mut self) -> Self {
        self.run_on_all_agents = true;
        self
    }

    pub fn run_instances(mut self, count: u32) -> Self {
        self.run_instance_count = Some(count);
        self
    }

    pub fn fan_out(&self) -> FanOut {
        match (self.run_on_all_agents, self.run_instance_count) {
            (true, _) => FanOut::RunOnAllAgents,
            (false, Some(count)) => FanOut::RunMultipleInstances(count),
            (false, None) => FanOut::Single,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.run_on_all_agents && self.run_instance_count.is_some() {
            return Err(Error::InvalidConfig(format!(
                "job '{}' cannot be both run-on-all-agents and run-multiple-instances",
                self.name
            )));
        }
        if self.run_instance_count == Some(0) {
            return Err(Error::InvalidConfig(format!(
                "job '{}' must run at least one instance",
                self.name
            )));
        }
        for resource in &self.resources {
            if resource.trim().is_empty() || !RESOURCE_NAME.is_match(resource) {
                return Err(Error::InvalidResource(resource.clone()));
            }
        }
        Ok(())
    }
}
