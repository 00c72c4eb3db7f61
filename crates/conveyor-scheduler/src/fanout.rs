//! Expansion of job templates into job plans.

use crate::agents::SchedulingContext;
use conveyor_core::agent::ResourceConstraints;
use conveyor_core::ids::JobName;
use conveyor_core::pipeline::{FanOut, JobDefinition, StageDefinition};
use conveyor_core::run::{JobPlan, JobState};
use conveyor_core::variables::EnvironmentVariables;
use conveyor_core::{Error, Result};

pub const RUN_INDEX_VARIABLE: &str = "CONVEYOR_JOB_RUN_INDEX";
pub const RUN_COUNT_VARIABLE: &str = "CONVEYOR_JOB_RUN_COUNT";

const RUN_ON_ALL_MARKER: &str = "runOnAll";
const RUN_INSTANCE_MARKER: &str = "runInstance";

/// Name of the `counter`-th plan expanded from `job` (counters start at 1).
pub fn run_on_all_name(job: &JobName, counter: usize) -> JobName {
    JobName::new(format!("{job}-{RUN_ON_ALL_MARKER}-{counter}"))
}

pub fn run_instance_name(job: &JobName, counter: usize) -> JobName {
    JobName::new(format!("{job}-{RUN_INSTANCE_MARKER}-{counter}"))
}

/// Expands every job of a stage according to its fan-out policy.
pub struct JobExpander;

impl JobExpander {
    pub fn new() -> Self {
        Self
    }

    /// Plans for every job of `stage`.
    ///
    /// `inherited` holds the variables from outer scopes; stage and job
    /// variables are layered on top of it, in that order. Either every job
    /// expands or an error is returned.
    pub fn expand_stage(
        &self,
        stage: &StageDefinition,
        environment: Option<&str>,
        inherited: &EnvironmentVariables,
        context: &SchedulingContext,
        state: JobState,
    ) -> Result<Vec<JobPlan>> {
        let stage_scope = inherited.overridden_by(&stage.variables);
        let mut plans = Vec::new();
        for job in &stage.jobs {
            plans.extend(self.expand_job(stage, job, environment, &stage_scope, context, state)?);
        }
        Ok(plans)
    }

    fn expand_job(
        &self,
        stage: &StageDefinition,
        job: &JobDefinition,
        environment: Option<&str>,
        stage_scope: &EnvironmentVariables,
        context: &SchedulingContext,
        state: JobState,
    ) -> Result<Vec<JobPlan>> {
        let variables = stage_scope.overridden_by(&job.variables);
        let plan = |name: JobName, variables: EnvironmentVariables| JobPlan {
            name,
            template: job.name.clone(),
            state,
            resources: job.resources.clone(),
            variables,
            tasks: job.tasks.clone(),
            agent_id: None,
            timeout_minutes: job.timeout_minutes,
        };

        match job.fan_out() {
            FanOut::Single => Ok(vec![plan(job.name.clone(), variables)]),
            FanOut::RunMultipleInstances(count) => Ok((1..=count as usize)
                .map(|index| {
                    let mut instance_vars = variables.clone();
                    instance_vars.add(RUN_INDEX_VARIABLE, index.to_string());
                    instance_vars.add(RUN_COUNT_VARIABLE, count.to_string());
                    plan(run_instance_name(&job.name, index), instance_vars)
                })
                .collect()),
            FanOut::RunOnAllAgents => {
                let constraints =
                    ResourceConstraints::new(job.resources.clone(), environment.map(str::to_string));
                let agents = context.matching_agents(&constraints);
                if agents.is_empty() {
                    return Err(Error::NoMatchingAgents {
                        job: job.name.to_string(),
                        stage: stage.name.to_string(),
                    });
                }
                Ok(agents
                    .into_iter()
                    .enumerate()
                    .map(|(i, agent)| JobPlan {
                        agent_id: Some(agent.id),
                        ..plan(run_on_all_name(&job.name, i + 1), variables.clone())
                    })
                    .collect())
            }
        }
    }
}

impl Default for JobExpander {
    fn default() -> Self {
        Self::new()
    }
}
