//! Port traits.
//!
//! These traits define the interfaces between the scheduling core and the
//! durable store, agent registry and configuration source. Calls are
//! synchronous; the caller owns any surrounding transaction.

use crate::Result;
use crate::agent::{Agent, ResourceConstraints};
use crate::ids::PipelineName;
use crate::material::{MaterialConfig, MaterialRevision, MaterialRevisions};
use crate::pipeline::PipelineDefinition;
use crate::run::PipelineRun;

/// Durable history of scheduled pipeline runs.
pub trait PipelineHistoryStore: Send + Sync {
    /// The most recent run of a pipeline, if it ever ran.
    fn most_recent_run(&self, pipeline: &PipelineName) -> Result<Option<PipelineRun>>;

    /// Persist the material revisions a run is about to be built from.
    fn save_material_revisions(&self, revisions: &MaterialRevisions) -> Result<()>;

    /// Persist a new run, assigning its counter and rendering its label.
    fn save_run(&self, run: PipelineRun) -> Result<PipelineRun>;
}

/// Registry of agents known to the server.
pub trait AgentDirectory: Send + Sync {
    fn agents(&self) -> Result<Vec<Agent>>;

    /// Live agents able to run a job with the given constraints, in registration order.
    fn matching(&self, constraints: &ResourceConstraints) -> Result<Vec<Agent>> {
        Ok(self
            .agents()?
            .into_iter()
            .filter(|agent| agent.satisfies(constraints))
            .collect())
    }
}

/// Source of the active pipeline configuration.
pub trait ConfigProvider: Send + Sync {
    fn pipeline(&self, name: &PipelineName) -> Result<Option<PipelineDefinition>>;

    fn pipelines(&self) -> Result<Vec<PipelineDefinition>>;

    /// Fingerprint of the configuration currently in effect.
    fn config_version(&self) -> Result<String>;
}

/// Latest known revisions of materials.
pub trait MaterialRevisionResolver: Send + Sync {
    fn latest_revision(&self, material: &MaterialConfig) -> Result<Option<MaterialRevision>>;

    /// Latest revisions for every material of a pipeline; materials without
    /// any known revision are skipped.
    fn latest_revisions(&self, materials: &[MaterialConfig]) -> Result<MaterialRevisions> {
        let mut revisions = MaterialRevisions::empty();
        for material in materials {
            if let Some(revision) = self.latest_revision(material)? {
                revisions.push(revision);
            }
        }
        Ok(revisions)
    }
}
