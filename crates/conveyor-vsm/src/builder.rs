//! Builds value stream maps from pipeline definitions.

use crate::node::{Node, ViewType};
use crate::revision::{PipelineRevision, Revision};
use crate::vsm::ValueStreamMap;
use conveyor_core::ids::{NodeId, PipelineName};
use conveyor_core::material::{MaterialConfig, MaterialRevision};
use conveyor_core::pipeline::PipelineDefinition;
use conveyor_core::ports::{MaterialRevisionResolver, PipelineHistoryStore};
use conveyor_core::{Error, Result};
use conveyor_trace::vsm_span;
use std::collections::HashSet;
use tracing::debug;

const DELETED_PIPELINE_MESSAGE: &str = "Pipeline has been deleted";

/// Walks the configuration around one pipeline or material.
///
/// Upstream, dependency materials become pipeline nodes and are followed
/// recursively; SCM materials become material nodes. Downstream, every
/// pipeline consuming a node through a dependency material is added.
/// With a history store attached, pipeline nodes carry their most recent run
/// and material nodes the revision that run was built from.
pub struct ValueStreamMapBuilder<'a> {
    definitions: &'a [PipelineDefinition],
    resolver: &'a dyn MaterialRevisionResolver,
    history: Option<&'a dyn PipelineHistoryStore>,
}

impl<'a> ValueStreamMapBuilder<'a> {
    pub fn new(definitions: &'a [PipelineDefinition], resolver: &'a dyn MaterialRevisionResolver) -> Self {
        Self {
            definitions,
            resolver,
            history: None,
        }
    }

    pub fn with_history(mut self, history: &'a dyn PipelineHistoryStore) -> Self {
        self.history = Some(history);
        self
    }

    pub fn build(&self, pipeline: &PipelineName) -> Result<ValueStreamMap> {
        let definition = self
            .definition(pipeline)
            .ok_or_else(|| Error::PipelineNotFound(pipeline.to_string()))?;
        let _span = vsm_span(definition.name.as_str()).entered();

        let mut vsm = ValueStreamMap::new(&definition.name, self.pipeline_revision(&definition.name)?);
        self.add_upstream(&mut vsm, definition, &mut HashSet::new())?;
        self.add_downstream(&mut vsm, &definition.name, &mut HashSet::new())?;
        vsm.add_warning_if_built_from_incompatible_revisions();

        debug!(pipeline = %definition.name, nodes = vsm.len(), "Value stream map built");
        Ok(vsm)
    }

    /// Map of the pipelines built from `material`.
    pub fn build_for_material(&self, material: &MaterialConfig) -> Result<ValueStreamMap> {
        let _span = vsm_span(&material.display_name()).entered();
        let revision = self
            .resolver
            .latest_revision(material)?
            .unwrap_or_else(|| MaterialRevision::new(material.clone(), vec![]));
        let mut vsm = ValueStreamMap::for_material(material, revision);
        let material_id = NodeId::new(material.fingerprint());

        let fingerprint = material.fingerprint();
        let mut visited = HashSet::new();
        for definition in self
            .definitions
            .iter()
            .filter(|d| d.materials.iter().any(|m| m.fingerprint() == fingerprint))
        {
            self.add_pipeline_below(&mut vsm, &definition.name, &material_id)?;
            self.add_downstream(&mut vsm, &definition.name, &mut visited)?;
        }
        Ok(vsm)
    }

    fn definition(&self, name: &PipelineName) -> Option<&'a PipelineDefinition> {
        self.definitions.iter().find(|d| &d.name == name)
    }

    fn pipeline_revision(&self, name: &PipelineName) -> Result<Option<PipelineRevision>> {
        match self.history {
            Some(history) => Ok(history
                .most_recent_run(name)?
                .map(|run| PipelineRevision::from(&run))),
            None => Ok(None),
        }
    }

    /// The revision `dependent`'s last run used, else the latest known one.
    fn material_revision(&self, material: &MaterialConfig, dependent: &PipelineName) -> Result<MaterialRevision> {
        if let Some(history) = self.history
            && let Some(run) = history.most_recent_run(dependent)?
            && let Some(used) = run
                .build_cause
                .material_revisions()
                .find_by_fingerprint(&material.fingerprint())
        {
            return Ok(used.clone());
        }
        Ok(self
            .resolver
            .latest_revision(material)?
            .unwrap_or_else(|| MaterialRevision::new(material.clone(), vec![])))
    }

    fn add_upstream(
        &self,
        vsm: &mut ValueStreamMap,
        definition: &PipelineDefinition,
        visited: &mut HashSet<PipelineName>,
    ) -> Result<()> {
        if !visited.insert(definition.name.clone()) {
            return Ok(());
        }
        let dependent = NodeId::from(&definition.name);

        for material in &definition.materials {
            match material.upstream_pipeline() {
                Some(upstream) => {
                    let revision = self.pipeline_revision(upstream)?;
                    let id = vsm.add_upstream_node(Node::pipeline(upstream), revision, &dependent)?;
                    match self.definition(upstream) {
                        Some(upstream_definition) => {
                            self.add_upstream(vsm, upstream_definition, visited)?
                        }
                        None => {
                            if let Some(node) = vsm.find_node_mut(&id) {
                                node.set_view_type(
                                    ViewType::Deleted,
                                    Some(DELETED_PIPELINE_MESSAGE.to_string()),
                                );
                            }
                        }
                    }
                }
                None => {
                    let revision = self.material_revision(material, &definition.name)?;
                    vsm.add_upstream_material_node(
                        Node::from_material(material),
                        material.name(),
                        &dependent,
                        revision,
                    )?;
                }
            }
        }
        Ok(())
    }

    fn add_downstream(
        &self,
        vsm: &mut ValueStreamMap,
        pipeline: &PipelineName,
        visited: &mut HashSet<PipelineName>,
    ) -> Result<()> {
        if !visited.insert(pipeline.clone()) {
            return Ok(());
        }
        let parent = NodeId::from(pipeline);
        for definition in self.definitions.iter().filter(|d| d.depends_on(pipeline)) {
            self.add_pipeline_below(vsm, &definition.name, &parent)?;
            self.add_downstream(vsm, &definition.name, visited)?;
        }
        Ok(())
    }

    fn add_pipeline_below(&self, vsm: &mut ValueStreamMap, pipeline: &PipelineName, parent: &NodeId) -> Result<()> {
        let id = vsm.add_downstream_node(Node::pipeline(pipeline), parent)?;
        if let (Some(revision), Some(node)) = (self.pipeline_revision(pipeline)?, vsm.find_node_mut(&id)) {
            node.add_revision(Revision::Pipeline(revision));
        }
        Ok(())
    }
}
