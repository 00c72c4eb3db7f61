//! Renderable layout of a value stream map.

use crate::levels::NodeLevelMap;
use crate::node::{Node, NodeMap};
use conveyor_core::ids::NodeId;
use serde::Serialize;

/// Nodes grouped by level, each level in display order, dummies included.
#[derive(Debug, Clone, Serialize)]
pub struct PresentationModel {
    #[serde(skip_serializing_if = "Option::is_none")]
    current_pipeline: Option<NodeId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    current_material: Option<NodeId>,
    levels: Vec<Vec<Node>>,
}

impl PresentationModel {
    pub(crate) fn new(
        current_pipeline: Option<NodeId>,
        current_material: Option<NodeId>,
        layout: &NodeLevelMap,
        mut nodes: NodeMap,
    ) -> Self {
        let levels = layout
            .iter()
            .map(|(_, ids)| ids.iter().filter_map(|id| nodes.shift_remove(id)).collect())
            .collect();
        Self {
            current_pipeline,
            current_material,
            levels,
        }
    }

    pub fn nodes_at_each_level(&self) -> &[Vec<Node>] {
        &self.levels
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    pub fn current_pipeline(&self) -> Option<&NodeId> {
        self.current_pipeline.as_ref()
    }

    pub fn current_material(&self) -> Option<&NodeId> {
        self.current_material.as_ref()
    }

    pub fn find(&self, id: &NodeId) -> Option<&Node> {
        self.levels.iter().flatten().find(|n| &n.id == id)
    }

    /// Every node, level by level.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.levels.iter().flatten()
    }

    pub fn to_json(&self) -> conveyor_core::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
