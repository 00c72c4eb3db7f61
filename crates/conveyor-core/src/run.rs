//! Pipeline runs, stage instances and job plans.

use crate::build_cause::BuildCause;
use crate::ids::{AgentId, JobName, PipelineName, RunId, StageName};
use crate::label::LabelTemplate;
use crate::pipeline::Approval;
use crate::variables::EnvironmentVariables;
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A scheduled instance of a pipeline.
///
/// `counter` and `label` are zero/empty until the history store saves the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PipelineRun {
    pub id: RunId,
    pub pipeline_name: PipelineName,
    pub counter: u32,
    pub label: String,
    pub label_template: LabelTemplate,
    pub build_cause: BuildCause,
    /// Pipeline variables merged with trigger-time overrides, fixed at schedule time.
    pub schedule_time_variables: EnvironmentVariables,
    pub stages: Vec<StageInstance>,
    pub scheduled_at: DateTime<Utc>,
}

impl PipelineRun {
    pub fn first_stage(&self) -> Option<&StageInstance> {
        self.stages.first()
    }

    pub fn stage(&self, name: &StageName) -> Option<&StageInstance> {
        self.stages.iter().find(|s| &s.name == name)
    }

    pub fn job_plans(&self) -> impl Iterator<Item = &JobPlan> {
        self.stages.iter().flat_map(|s| s.jobs.iter())
    }

    pub fn is_completed(&self) -> bool {
        self.stages.iter().all(|s| s.state.is_terminal())
    }

    /// Identifier in the `<pipeline>/<counter>` form used by dependency revisions.
    pub fn identifier(&self) -> String {
        format!("{}/{}", self.pipeline_name, self.counter)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StageInstance {
    pub name: StageName,
    pub counter: u32,
    pub state: StageState,
    pub approval: Approval,
    #[serde(default)]
    pub approved_by: Option<String>,
    /// Configuration fingerprint the stage was scheduled against.
    #[serde(default)]
    pub config_version: Option<String>,
    pub jobs: Vec<JobPlan>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum StageState {
    Scheduled,
    AwaitingTrigger,
    Building,
    Passed,
    Failed,
    Cancelled,
}

impl StageState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StageState::Passed | StageState::Failed | StageState::Cancelled)
    }
}

/// A concrete unit of work expanded from a job template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JobPlan {
    pub name: JobName,
    /// The job definition this plan was expanded from.
    pub template: JobName,
    pub state: JobState,
    #[serde(default)]
    pub resources: Vec<String>,
    #[serde(default)]
    pub variables: EnvironmentVariables,
    #[serde(default)]
    pub tasks: Vec<String>,
    /// Set for run-on-all-agents plans.
    #[serde(default)]
    pub agent_id: Option<AgentId>,
    #[serde(default)]
    pub timeout_minutes: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Scheduled,
    Waiting,
    Assigned,
    Completed,
}
