//! In-memory pipeline history.

use crate::poisoned;
use conveyor_core::Result;
use conveyor_core::ids::PipelineName;
use conveyor_core::material::MaterialRevisions;
use conveyor_core::ports::PipelineHistoryStore;
use conveyor_core::run::PipelineRun;
use dashmap::DashMap;
use std::sync::Mutex;
use tracing::debug;

/// Keeps every saved run, oldest first, per pipeline.
#[derive(Default)]
pub struct InMemoryHistoryStore {
    runs: DashMap<PipelineName, Vec<PipelineRun>>,
    material_revisions: Mutex<Vec<MaterialRevisions>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an already-numbered run, as if it had been saved earlier.
    pub fn seed_run(&self, run: PipelineRun) {
        self.runs
            .entry(run.pipeline_name.clone())
            .or_default()
            .push(run);
    }

    pub fn runs(&self, pipeline: &PipelineName) -> Vec<PipelineRun> {
        self.runs
            .get(pipeline)
            .map(|runs| runs.clone())
            .unwrap_or_default()
    }

    pub fn saved_material_revisions(&self) -> Vec<MaterialRevisions> {
        self.material_revisions
            .lock()
            .map(|saved| saved.clone())
            .unwrap_or_default()
    }
}

impl PipelineHistoryStore for InMemoryHistoryStore {
    fn most_recent_run(&self, pipeline: &PipelineName) -> Result<Option<PipelineRun>> {
        Ok(self
            .runs
            .get(pipeline)
            .and_then(|runs| runs.last().cloned()))
    }

    fn save_material_revisions(&self, revisions: &MaterialRevisions) -> Result<()> {
        self.material_revisions
            .lock()
            .map_err(poisoned)?
            .push(revisions.clone());
        Ok(())
    }

    fn save_run(&self, mut run: PipelineRun) -> Result<PipelineRun> {
        let mut runs = self.runs.entry(run.pipeline_name.clone()).or_default();
        run.counter = runs.last().map_or(1, |last| last.counter + 1);
        run.label = run
            .label_template
            .render(run.counter, &run.schedule_time_variables);
        debug!(pipeline = %run.pipeline_name, counter = run.counter, label = %run.label, "Run saved");
        runs.push(run.clone());
        Ok(run)
    }
}
