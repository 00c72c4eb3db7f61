//! Periodic scheduling pass over pending build causes.

use crate::agents::SchedulingContext;
use crate::config::SchedulerConfig;
use crate::instantiator::{Instantiation, PipelineInstantiator};
use crate::queue::SchedulingQueue;
use chrono::{DateTime, Utc};
use conveyor_core::Result;
use conveyor_core::build_cause::BuildCause;
use conveyor_core::ids::PipelineName;
use conveyor_core::ports::{AgentDirectory, ConfigProvider, PipelineHistoryStore};
use conveyor_core::run::PipelineRun;
use conveyor_trace::{ScheduleAttributes, schedule_span};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{Duration, interval};
use tracing::{debug, error, info, warn};

/// What happened during one scheduling pass.
#[derive(Debug, Default)]
pub struct SchedulePassReport {
    pub scheduled: Vec<PipelineRun>,
    pub trumped: Vec<PipelineName>,
    /// Pipelines whose cause was built against another configuration
    /// revision than the one now loaded. The cause stays pending.
    pub origin_mismatched: Vec<PipelineName>,
    pub failed: Vec<(PipelineName, String)>,
    /// Pipelines whose causes were dropped because they left the configuration.
    pub removed: Vec<PipelineName>,
}

impl SchedulePassReport {
    pub fn is_empty(&self) -> bool {
        self.scheduled.is_empty()
            && self.trumped.is_empty()
            && self.origin_mismatched.is_empty()
            && self.failed.is_empty()
            && self.removed.is_empty()
    }
}

/// Turns pending build causes into pipeline runs.
pub struct ScheduleService {
    queue: Arc<SchedulingQueue>,
    instantiator: PipelineInstantiator,
    config: Arc<dyn ConfigProvider>,
    agents: Arc<dyn AgentDirectory>,
    settings: SchedulerConfig,
}

impl ScheduleService {
    pub fn new(
        queue: Arc<SchedulingQueue>,
        history: Arc<dyn PipelineHistoryStore>,
        config: Arc<dyn ConfigProvider>,
        agents: Arc<dyn AgentDirectory>,
        settings: SchedulerConfig,
    ) -> Self {
        Self {
            instantiator: PipelineInstantiator::new(queue.clone(), history),
            queue,
            config,
            agents,
            settings,
        }
    }

    pub fn queue(&self) -> &Arc<SchedulingQueue> {
        &self.queue
    }

    /// Attempt every pending cause once, in pipeline name order.
    ///
    /// Causes that fail stay pending and are retried on the next pass.
    pub fn schedule_pass(&self, now: DateTime<Utc>) -> SchedulePassReport {
        let mut report = SchedulePassReport::default();
        let pending = self.queue.to_be_scheduled();
        if pending.is_empty() {
            return report;
        }

        let config_version = match self.config.config_version() {
            Ok(version) => version,
            Err(e) => {
                error!(error = %e, "Failed to read configuration version");
                return report;
            }
        };

        for (name, cause) in pending.into_iter().take(self.settings.max_pipelines_per_pass) {
            let attrs = ScheduleAttributes::new()
                .pipeline(name.to_string())
                .approver(cause.approver())
                .config_version(config_version.clone());
            let _span = schedule_span(&attrs).entered();

            match self.schedule_one(&name, &cause, &config_version, now) {
                Ok(Some(Instantiation::Created(run))) => {
                    self.queue.finish_schedule(&name, &cause, &run.build_cause);
                    report.scheduled.push(run);
                }
                Ok(Some(Instantiation::Trumped)) => {
                    report.trumped.push(name);
                }
                Ok(Some(Instantiation::OriginMismatch)) => {
                    report.origin_mismatched.push(name);
                }
                Ok(None) => {
                    info!(pipeline = %name, "Dropping build cause of removed pipeline");
                    self.queue.clear_pipeline(&name);
                    report.removed.push(name);
                }
                Err(e) => {
                    warn!(pipeline = %name, error = %e, "Failed to schedule pipeline");
                    report.failed.push((name, e.to_string()));
                }
            }
        }

        debug!(
            scheduled = report.scheduled.len(),
            trumped = report.trumped.len(),
            origin_mismatched = report.origin_mismatched.len(),
            failed = report.failed.len(),
            "Scheduling pass finished"
        );
        report
    }

    /// `Ok(None)` when the pipeline is no longer configured.
    fn schedule_one(
        &self,
        name: &PipelineName,
        cause: &BuildCause,
        config_version: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Instantiation>> {
        let Some(definition) = self.config.pipeline(name)? else {
            return Ok(None);
        };
        let context = SchedulingContext::from_directory(cause.approver(), self.agents.as_ref())?;
        self.instantiator
            .instantiate(cause, &definition, &context, config_version, now)
            .map(Some)
    }

    /// Run scheduling passes until shutdown.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(Duration::from_secs(self.settings.interval_secs.max(1)));

        info!(
            interval_secs = self.settings.interval_secs,
            "Starting schedule service"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = self.schedule_pass(Utc::now());
                    if !report.is_empty() {
                        info!(
                            scheduled = report.scheduled.len(),
                            trumped = report.trumped.len(),
                            failed = report.failed.len(),
                            removed = report.removed.len(),
                            "Scheduling pass"
                        );
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Schedule service shutting down");
                        break;
                    }
                }
            }
        }
    }
}
