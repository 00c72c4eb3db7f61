//! In-memory configuration source.

use crate::poisoned;
use conveyor_core::Result;
use conveyor_core::ids::PipelineName;
use conveyor_core::pipeline::{LoadedConfig, PipelineDefinition};
use conveyor_core::ports::ConfigProvider;
use std::sync::RwLock;

struct Snapshot {
    pipelines: Vec<PipelineDefinition>,
    version: String,
}

/// A configuration snapshot that can be swapped atomically.
pub struct InMemoryConfigProvider {
    current: RwLock<Snapshot>,
}

impl InMemoryConfigProvider {
    pub fn new(pipelines: Vec<PipelineDefinition>, version: impl Into<String>) -> Self {
        Self {
            current: RwLock::new(Snapshot {
                pipelines,
                version: version.into(),
            }),
        }
    }

    pub fn from_loaded(loaded: LoadedConfig) -> Self {
        Self::new(loaded.config.pipelines, loaded.fingerprint)
    }

    /// Replace the whole configuration.
    pub fn replace(&self, pipelines: Vec<PipelineDefinition>, version: impl Into<String>) -> Result<()> {
        let mut current = self.current.write().map_err(poisoned)?;
        *current = Snapshot {
            pipelines,
            version: version.into(),
        };
        Ok(())
    }
}

impl ConfigProvider for InMemoryConfigProvider {
    fn pipeline(&self, name: &PipelineName) -> Result<Option<PipelineDefinition>> {
        let current = self.current.read().map_err(poisoned)?;
        Ok(current.pipelines.iter().find(|p| &p.name == name).cloned())
    }

    fn pipelines(&self) -> Result<Vec<PipelineDefinition>> {
        Ok(self.current.read().map_err(poisoned)?.pipelines.clone())
    }

    fn config_version(&self) -> Result<String> {
        Ok(self.current.read().map_err(poisoned)?.version.clone())
    }
}
