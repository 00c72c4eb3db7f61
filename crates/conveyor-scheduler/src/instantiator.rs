//! Turns an accepted build cause into a persisted pipeline run.

use crate::agents::SchedulingContext;
use crate::fanout::JobExpander;
use crate::queue::SchedulingQueue;
use chrono::{DateTime, Utc};
use conveyor_core::Result;
use conveyor_core::build_cause::BuildCause;
use conveyor_core::ids::RunId;
use conveyor_core::pipeline::{ConfigOrigin, PipelineDefinition};
use conveyor_core::ports::PipelineHistoryStore;
use conveyor_core::run::{JobState, PipelineRun, StageInstance, StageState};
use std::sync::Arc;
use tracing::{debug, info};

/// Outcome of an instantiation attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Instantiation {
    Created(PipelineRun),
    /// Nothing newer than the most recently scheduled cause.
    Trumped,
    /// The definition was loaded from a different config repo revision than the cause carries.
    OriginMismatch,
}

impl Instantiation {
    pub fn into_run(self) -> Option<PipelineRun> {
        match self {
            Instantiation::Created(run) => Some(run),
            Instantiation::Trumped | Instantiation::OriginMismatch => None,
        }
    }
}

pub struct PipelineInstantiator {
    queue: Arc<SchedulingQueue>,
    history: Arc<dyn PipelineHistoryStore>,
    expander: JobExpander,
}

impl PipelineInstantiator {
    pub fn new(queue: Arc<SchedulingQueue>, history: Arc<dyn PipelineHistoryStore>) -> Self {
        Self {
            queue,
            history,
            expander: JobExpander::new(),
        }
    }

    /// Create and persist a run of `definition` for `cause`.
    ///
    /// Returns `Ok(None)` when the cause is trumped or disagrees with the
    /// definition's config origin. Validation and fan-out errors are returned
    /// before anything is persisted.
    pub fn create_pipeline(
        &self,
        cause: &BuildCause,
        definition: &PipelineDefinition,
        context: &SchedulingContext,
        config_version: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<PipelineRun>> {
        Ok(self
            .instantiate(cause, definition, context, config_version, now)?
            .into_run())
    }

    /// Like [`create_pipeline`](Self::create_pipeline) but says why no run was created.
    pub fn instantiate(
        &self,
        cause: &BuildCause,
        definition: &PipelineDefinition,
        context: &SchedulingContext,
        config_version: &str,
        now: DateTime<Utc>,
    ) -> Result<Instantiation> {
        let name = &definition.name;

        if self.is_trumped(definition, cause) {
            debug!(pipeline = %name, cause = %cause.describe(), "Build cause trumped");
            self.queue.discard_if_pending(name, cause);
            return Ok(Instantiation::Trumped);
        }

        if !origin_matches(definition, cause) {
            debug!(pipeline = %name, "Config origin does not match build cause revision");
            return Ok(Instantiation::OriginMismatch);
        }

        definition.validate()?;

        let schedule_time_variables = definition
            .variables
            .overridden_by(cause.overridden_variables());
        let environment = definition.environment.as_deref();

        let mut stages = Vec::with_capacity(definition.stages.len());
        for (index, stage) in definition.stages.iter().enumerate() {
            let first = index == 0;
            let (stage_state, job_state) = if first {
                (StageState::Scheduled, JobState::Scheduled)
            } else {
                (StageState::AwaitingTrigger, JobState::Waiting)
            };
            let jobs = self.expander.expand_stage(
                stage,
                environment,
                &schedule_time_variables,
                context,
                job_state,
            )?;
            stages.push(StageInstance {
                name: stage.name.clone(),
                counter: 1,
                state: stage_state,
                approval: stage.approval,
                approved_by: first.then(|| cause.approver().to_string()),
                config_version: first.then(|| config_version.to_string()),
                jobs,
            });
        }

        let run = PipelineRun {
            id: RunId::new(),
            pipeline_name: name.clone(),
            counter: 0,
            label: String::new(),
            label_template: definition.label_template.clone(),
            build_cause: cause.clone(),
            schedule_time_variables,
            stages,
            scheduled_at: now,
        };

        self.history.save_material_revisions(cause.material_revisions())?;
        let run = self.history.save_run(run)?;

        info!(
            pipeline = %name,
            counter = run.counter,
            label = %run.label,
            "[Pipeline Schedule] Successfully scheduled pipeline {}, buildCause:{}",
            name,
            cause.describe()
        );

        Ok(Instantiation::Created(run))
    }

    /// A cause is trumped by an identical most recent cause, and a non-forced
    /// cause also by one it carries nothing newer than.
    fn is_trumped(&self, definition: &PipelineDefinition, cause: &BuildCause) -> bool {
        let most_recent = self.queue.most_recent_scheduled(&definition.name);
        if most_recent.has_never_run() {
            return false;
        }
        if cause.is_same_as(&most_recent) {
            return true;
        }
        !cause.is_forced()
            && !cause
                .material_revisions()
                .has_newer_revision_than(most_recent.material_revisions())
    }
}

/// A definition parsed from a config repo must come from the revision of
/// that repo carried by the cause.
fn origin_matches(definition: &PipelineDefinition, cause: &BuildCause) -> bool {
    let ConfigOrigin::ConfigRepo { material, revision } = &definition.origin else {
        return true;
    };
    let fingerprint = material.fingerprint();
    if !definition.materials.iter().any(|m| m.fingerprint() == fingerprint) {
        return true;
    }
    match cause
        .material_revisions()
        .find_by_fingerprint(&fingerprint)
        .and_then(|r| r.latest_revision())
    {
        Some(cause_revision) => cause_revision == revision,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conveyor_core::ids::PipelineName;
    use conveyor_core::material::MaterialConfig;
    use conveyor_core::pipeline::JobDefinition;
    use conveyor_core::variables::EnvironmentVariables;
    use conveyor_store::{InMemoryHistoryStore, fixtures};
    use pretty_assertions::assert_eq;

    struct Harness {
        queue: Arc<SchedulingQueue>,
        store: Arc<InMemoryHistoryStore>,
        instantiator: PipelineInstantiator,
    }

    fn harness() -> Harness {
        let store = Arc::new(InMemoryHistoryStore::new());
        let queue = Arc::new(SchedulingQueue::new(store.clone()));
        let instantiator = PipelineInstantiator::new(queue.clone(), store.clone());
        Harness {
            queue,
            store,
            instantiator,
        }
    }

    fn context(cause: &BuildCause) -> SchedulingContext {
        SchedulingContext::new(cause.approver(), vec![])
    }

    impl Harness {
        fn create(&self, cause: &BuildCause, definition: &PipelineDefinition) -> Option<PipelineRun> {
            self.instantiator
                .create_pipeline(cause, definition, &context(cause), "md5-test", Utc::now())
                .unwrap()
        }
    }

    #[test]
    fn test_creates_run_when_not_trumped() {
        let h = harness();
        let definition = fixtures::pipeline("cruise");
        let cause = fixtures::modified_cause("r1");
        h.queue.schedule(&definition.name, cause.clone());

        let run = h.create(&cause, &definition).expect("run created");

        assert_eq!(run.counter, 1);
        assert_eq!(run.label, "1");
        assert_eq!(run.build_cause, cause);
        assert_eq!(h.store.runs(&definition.name).len(), 1);
        assert_eq!(h.store.saved_material_revisions().len(), 1);
    }

    #[test]
    fn test_first_stage_is_stamped() {
        let h = harness();
        let definition = fixtures::pipeline("cruise");
        let cause = fixtures::modified_cause_by("r1", "cruise-developer");

        let run = h.create(&cause, &definition).unwrap();

        let first = run.first_stage().unwrap();
        assert_eq!(first.approved_by.as_deref(), Some("cruise-developer"));
        assert_eq!(first.config_version.as_deref(), Some("md5-test"));
        assert_eq!(first.state, StageState::Scheduled);
        let second = &run.stages[1];
        assert_eq!(second.state, StageState::AwaitingTrigger);
        assert_eq!(second.config_version, None);
        assert!(second.jobs.iter().all(|j| j.state == JobState::Waiting));
    }

    #[test]
    fn test_same_cause_is_trumped_and_removed_from_pending() {
        let h = harness();
        let definition = fixtures::pipeline("cruise");
        let cause = fixtures::forced_cause("r1");
        h.queue.finish_schedule(&definition.name, &cause, &cause);
        h.queue.schedule(&definition.name, cause.clone());

        let outcome = h
            .instantiator
            .instantiate(&cause, &definition, &context(&cause), "md5-test", Utc::now())
            .unwrap();

        assert_eq!(outcome, Instantiation::Trumped);
        assert!(h.queue.pending(&definition.name).is_none());
        assert!(h.store.runs(&definition.name).is_empty());
    }

    #[test]
    fn test_forced_cause_not_trumped_by_different_cause() {
        let h = harness();
        let definition = fixtures::pipeline("cruise");
        let cause = fixtures::forced_cause("r1");
        h.queue
            .finish_schedule(&definition.name, &cause, &BuildCause::with_empty_modifications());
        h.queue.schedule(&definition.name, cause.clone());

        assert!(h.create(&cause, &definition).is_some());
    }

    #[test]
    fn test_older_automatic_cause_is_trumped() {
        let h = harness();
        let definition = fixtures::pipeline("cruise");
        let newer = fixtures::modified_cause("r5");
        h.queue.finish_schedule(&definition.name, &newer, &newer);

        assert!(h.create(&fixtures::modified_cause("r3"), &definition).is_none());
        assert!(h.create(&fixtures::modified_cause("r7"), &definition).is_some());
    }

    #[test]
    fn test_schedule_time_variables_capture_overrides() {
        let h = harness();
        let definition = fixtures::pipeline("cruise")
            .with_variables([("blahVariable", "blahValue")].into_iter().collect());
        let mut cause = fixtures::modified_cause("r1");
        let overrides: EnvironmentVariables = [("blahVariable", "blahOverride")].into_iter().collect();
        cause.add_overridden_variables(&overrides);

        let run = h.create(&cause, &definition).unwrap();

        assert_eq!(run.schedule_time_variables, overrides);
        assert_eq!(
            run.job_plans().next().unwrap().variables.get("blahVariable"),
            Some("blahOverride")
        );
    }

    #[test]
    fn test_origin_mismatch_creates_nothing() {
        let h = harness();
        let material = fixtures::git_material();
        let definition = fixtures::pipeline("cruise").with_origin(ConfigOrigin::ConfigRepo {
            material,
            revision: "123".to_string(),
        });
        let cause = fixtures::modified_cause("r1");

        let outcome = h
            .instantiator
            .instantiate(&cause, &definition, &context(&cause), "md5-test", Utc::now())
            .unwrap();
        assert_eq!(outcome, Instantiation::OriginMismatch);
    }

    #[test]
    fn test_origin_match_creates_run() {
        let h = harness();
        let definition = fixtures::pipeline("cruise").with_origin(ConfigOrigin::ConfigRepo {
            material: fixtures::git_material(),
            revision: "r1".to_string(),
        });
        assert!(h.create(&fixtures::modified_cause("r1"), &definition).is_some());
    }

    #[test]
    fn test_origin_from_foreign_material_is_ignored() {
        let h = harness();
        let definition = fixtures::pipeline("cruise").with_origin(ConfigOrigin::ConfigRepo {
            material: MaterialConfig::git("https://example.com/config-repo.git"),
            revision: "abc".to_string(),
        });
        assert!(h.create(&fixtures::modified_cause("r1"), &definition).is_some());
    }

    #[test]
    fn test_fan_out_failure_persists_nothing() {
        let h = harness();
        let mut definition = fixtures::pipeline("cruise");
        definition.stages[1].jobs.push(JobDefinition::new("everywhere").run_on_all_agents());
        let cause = fixtures::modified_cause("r1");

        let result = h
            .instantiator
            .create_pipeline(&cause, &definition, &context(&cause), "md5-test", Utc::now());

        assert!(result.is_err());
        assert!(h.store.runs(&PipelineName::new("cruise")).is_empty());
        assert!(h.store.saved_material_revisions().is_empty());
    }

    #[test]
    fn test_invalid_definition_rejected_before_expansion() {
        let h = harness();
        let mut definition = fixtures::pipeline("cruise");
        definition.stages[0].jobs[0] = JobDefinition::new("bad").with_resources(["no$pe"]);

        let cause = fixtures::modified_cause("r1");
        assert!(
            h.instantiator
                .create_pipeline(&cause, &definition, &context(&cause), "md5-test", Utc::now())
                .is_err()
        );
    }
}
