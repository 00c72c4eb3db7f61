//! Trigger sources that turn manual requests, material changes and timers
//! into pending build causes.

use crate::queue::SchedulingQueue;
use crate::timer::TimerSchedule;
use chrono::{DateTime, Utc};
use conveyor_core::build_cause::{BuildCause, CHANGES_APPROVER};
use conveyor_core::ids::PipelineName;
use conveyor_core::material::{MaterialRevision, MaterialRevisions};
use conveyor_core::pipeline::{Approval, PipelineDefinition};
use conveyor_core::ports::{ConfigProvider, MaterialRevisionResolver};
use conveyor_core::variables::EnvironmentVariables;
use conveyor_core::{Error, Result};
use conveyor_trace::{ScheduleAttributes, trigger_span};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Produces build causes and hands them to the scheduling queue.
pub struct BuildCauseProducer {
    queue: Arc<SchedulingQueue>,
    config: Arc<dyn ConfigProvider>,
    resolver: Arc<dyn MaterialRevisionResolver>,
    timers_last_fired: DashMap<PipelineName, DateTime<Utc>>,
}

impl BuildCauseProducer {
    pub fn new(
        queue: Arc<SchedulingQueue>,
        config: Arc<dyn ConfigProvider>,
        resolver: Arc<dyn MaterialRevisionResolver>,
    ) -> Self {
        Self {
            queue,
            config,
            resolver,
            timers_last_fired: DashMap::new(),
        }
    }

    /// Force a run with the latest revisions of every material.
    ///
    /// Overridden variables must already be declared on the pipeline.
    pub fn manual_trigger(
        &self,
        pipeline: &PipelineName,
        user: &str,
        overrides: &EnvironmentVariables,
        message: Option<&str>,
    ) -> Result<BuildCause> {
        let _span = trigger_span(&attributes(pipeline, "manual")).entered();
        let definition = self.definition(pipeline)?;
        for (name, _) in overrides.iter() {
            if !definition.variables.contains(name) {
                return Err(Error::InvalidConfig(format!(
                    "Variable '{name}' has not been configured for pipeline '{pipeline}'"
                )));
            }
        }

        let revisions = self.changed_revisions(&definition)?;
        let mut cause = BuildCause::manual_forced(revisions, user);
        if let Some(message) = message {
            cause = cause.with_message(message);
        }
        cause.add_overridden_variables(overrides);

        info!(pipeline = %pipeline, user = %user, "Manual trigger accepted");
        self.queue.schedule(&definition.name, cause.clone());
        Ok(cause)
    }

    /// Schedule an automatic run if any material changed since the most
    /// recently scheduled cause. Returns whether a cause was queued.
    pub fn material_update(&self, pipeline: &PipelineName) -> Result<bool> {
        let _span = trigger_span(&attributes(pipeline, "material")).entered();
        let definition = self.definition(pipeline)?;
        if !self.accepts_automatic_trigger(&definition) {
            return Ok(false);
        }
        match self.revisions_if_changed(&definition)? {
            Some(revisions) => {
                info!(pipeline = %pipeline, "Material changes detected");
                self.queue.schedule(
                    &definition.name,
                    BuildCause::with_modifications(revisions, CHANGES_APPROVER),
                );
                Ok(true)
            }
            None => {
                debug!(pipeline = %pipeline, "No new material revisions");
                Ok(false)
            }
        }
    }

    /// The pipeline's timer fired. Forced unless the timer only runs on changes.
    pub fn timer_trigger(&self, pipeline: &PipelineName) -> Result<bool> {
        let _span = trigger_span(&attributes(pipeline, "timer")).entered();
        let definition = self.definition(pipeline)?;
        let Some(timer) = &definition.timer else {
            return Ok(false);
        };
        if definition.paused {
            debug!(pipeline = %pipeline, "Skipping timer trigger of paused pipeline");
            return Ok(false);
        }

        let revisions = if timer.only_on_changes {
            match self.revisions_if_changed(&definition)? {
                Some(revisions) => revisions,
                None => {
                    debug!(pipeline = %pipeline, "Timer fired without material changes");
                    return Ok(false);
                }
            }
        } else {
            self.changed_revisions(&definition)?
        };

        info!(pipeline = %pipeline, timer = %timer.spec, "Timer trigger accepted");
        self.queue.schedule(&definition.name, BuildCause::timer(revisions));
        Ok(true)
    }

    /// Fire every timer that came due since it was last checked.
    ///
    /// A timer seen for the first time starts counting from `now`. A timer
    /// that cannot be parsed or triggered is skipped and stays due for the
    /// next call. Returns the pipelines that were triggered.
    pub fn fire_due_timers(&self, now: DateTime<Utc>) -> Result<Vec<PipelineName>> {
        let mut fired = Vec::new();
        for definition in self.config.pipelines()? {
            let Some(timer) = &definition.timer else {
                continue;
            };
            let schedule = match TimerSchedule::parse(&timer.spec) {
                Ok(schedule) => schedule,
                Err(e) => {
                    warn!(pipeline = %definition.name, error = %e, "Skipping invalid timer");
                    continue;
                }
            };
            let last_fired = *self
                .timers_last_fired
                .entry(definition.name.clone())
                .or_insert(now);
            if !schedule.due(now, last_fired) {
                continue;
            }
            match self.timer_trigger(&definition.name) {
                Ok(triggered) => {
                    self.timers_last_fired.insert(definition.name.clone(), now);
                    if triggered {
                        fired.push(definition.name.clone());
                    }
                }
                Err(e) => {
                    error!(pipeline = %definition.name, error = %e, "Timer trigger failed");
                }
            }
        }
        Ok(fired)
    }

    fn definition(&self, pipeline: &PipelineName) -> Result<PipelineDefinition> {
        self.config
            .pipeline(pipeline)?
            .ok_or_else(|| Error::PipelineNotFound(pipeline.to_string()))
    }

    fn accepts_automatic_trigger(&self, definition: &PipelineDefinition) -> bool {
        let name = &definition.name;
        if definition.paused {
            debug!(pipeline = %name, "Skipping automatic trigger of paused pipeline");
            return false;
        }
        if definition
            .first_stage()
            .is_some_and(|stage| stage.approval == Approval::Manual)
        {
            debug!(pipeline = %name, "First stage requires manual approval");
            return false;
        }
        if self.queue.has_forced_build_cause(name) {
            debug!(pipeline = %name, "Forced build cause already pending");
            return false;
        }
        true
    }

    /// Latest revisions, each flagged as changed relative to the most recently scheduled cause.
    fn changed_revisions(&self, definition: &PipelineDefinition) -> Result<MaterialRevisions> {
        let latest = self.resolver.latest_revisions(&definition.materials)?;
        let previous = self.queue.most_recent_scheduled(&definition.name);
        let previous = previous.material_revisions();
        Ok(latest
            .iter()
            .cloned()
            .map(|revision| {
                let changed = match previous.find_by_fingerprint(&revision.fingerprint()) {
                    Some(old) => old.latest_revision() != revision.latest_revision(),
                    None => revision.has_modifications(),
                };
                revision.mark_changed(changed)
            })
            .collect())
    }

    fn revisions_if_changed(&self, definition: &PipelineDefinition) -> Result<Option<MaterialRevisions>> {
        let revisions = self.changed_revisions(definition)?;
        let any_changed = revisions.iter().any(|r: &MaterialRevision| r.changed);
        Ok(any_changed.then_some(revisions))
    }
}

fn attributes(pipeline: &PipelineName, trigger: &str) -> ScheduleAttributes {
    ScheduleAttributes::new()
        .pipeline(pipeline.to_string())
        .trigger(trigger)
}
