//! Value stream map nodes.

use crate::revision::{Revision, Revisions, SourceMaterialRevision};
use conveyor_core::ids::{NodeId, PipelineName};
use conveyor_core::material::{MaterialConfig, MaterialRevision};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::BTreeSet;

/// Nodes keyed by id, in insertion order.
pub(crate) type NodeMap = IndexMap<NodeId, Node>;

/// How a node should be rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewType {
    #[default]
    Normal,
    Warning,
    NoPermission,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeKind {
    Pipeline,
    SourceMaterial {
        material_type: String,
        material_names: BTreeSet<String>,
        material_revisions: Vec<MaterialRevision>,
    },
    /// Layout padding so that every edge spans one level.
    Dummy,
}

impl NodeKind {
    pub fn is_pipeline(&self) -> bool {
        matches!(self, NodeKind::Pipeline)
    }
}

/// A pipeline, a source material or a layout placeholder.
///
/// `parents` are the nodes this one depends on, `children` the nodes that
/// depend on it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) name: String,
    #[serde(flatten)]
    pub(crate) kind: NodeKind,
    pub(crate) parents: Vec<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) revisions: Revisions,
    pub(crate) view_type: ViewType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) message: Option<String>,
    pub(crate) level: usize,
    pub(crate) depth: usize,
}

impl Node {
    fn with_kind(id: NodeId, name: String, kind: NodeKind) -> Self {
        Self {
            id,
            name,
            kind,
            parents: vec![],
            children: vec![],
            revisions: Revisions::new(),
            view_type: ViewType::Normal,
            message: None,
            level: 0,
            depth: 0,
        }
    }

    pub fn pipeline(name: &PipelineName) -> Self {
        Self::with_kind(NodeId::from(name), name.to_string(), NodeKind::Pipeline)
    }

    pub fn source_material(
        id: impl Into<NodeId>,
        name: impl Into<String>,
        material_type: impl Into<String>,
    ) -> Self {
        Self::with_kind(
            id.into(),
            name.into(),
            NodeKind::SourceMaterial {
                material_type: material_type.into(),
                material_names: BTreeSet::new(),
                material_revisions: vec![],
            },
        )
    }

    /// A source material node keyed by the material fingerprint.
    pub fn from_material(material: &MaterialConfig) -> Self {
        Self::source_material(
            material.fingerprint(),
            material.display_name(),
            material.type_name(),
        )
    }

    pub(crate) fn dummy(id: NodeId) -> Self {
        let name = id.to_string();
        Self::with_kind(id, name, NodeKind::Dummy)
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn is_dummy(&self) -> bool {
        matches!(self.kind, NodeKind::Dummy)
    }

    pub fn parents(&self) -> &[NodeId] {
        &self.parents
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn revisions(&self) -> &Revisions {
        &self.revisions
    }

    pub fn view_type(&self) -> ViewType {
        self.view_type
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Level assigned by the last layout.
    pub fn level(&self) -> usize {
        self.level
    }

    /// 1-based position inside the level after crossing minimization.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn material_names(&self) -> Option<&BTreeSet<String>> {
        match &self.kind {
            NodeKind::SourceMaterial { material_names, .. } => Some(material_names),
            _ => None,
        }
    }

    pub fn material_revisions(&self) -> &[MaterialRevision] {
        match &self.kind {
            NodeKind::SourceMaterial {
                material_revisions, ..
            } => material_revisions,
            _ => &[],
        }
    }

    pub fn set_view_type(&mut self, view_type: ViewType, message: Option<String>) {
        self.view_type = view_type;
        self.message = message;
    }

    pub(crate) fn add_parent(&mut self, parent: &NodeId) {
        if !self.parents.contains(parent) {
            self.parents.push(parent.clone());
        }
    }

    pub(crate) fn add_child(&mut self, child: &NodeId) {
        if !self.children.contains(child) {
            self.children.push(child.clone());
        }
    }

    pub(crate) fn add_revision(&mut self, revision: Revision) {
        self.revisions.add(revision);
    }

    /// No-op on anything but a source material node.
    pub(crate) fn add_material(&mut self, material_name: Option<&str>, revision: MaterialRevision) {
        let NodeKind::SourceMaterial {
            material_names,
            material_revisions,
            ..
        } = &mut self.kind
        else {
            return;
        };
        if let Some(name) = material_name {
            material_names.insert(name.to_string());
        }
        for modification in &revision.modifications {
            self.revisions
                .add(Revision::SourceMaterial(SourceMaterialRevision::from(modification)));
        }
        if !material_revisions.iter().any(|r| r.is_same_as(&revision)) {
            material_revisions.push(revision);
        }
    }

    /// Replace `old` by `new` among the children, keeping its position.
    pub(crate) fn replace_child(&mut self, old: &NodeId, new: NodeId) {
        if let Some(slot) = self.children.iter_mut().find(|c| *c == old) {
            *slot = new;
        }
    }

    pub(crate) fn replace_parent(&mut self, old: &NodeId, new: NodeId) {
        if let Some(slot) = self.parents.iter_mut().find(|p| *p == old) {
            *slot = new;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conveyor_store::fixtures;

    #[test]
    fn test_material_names_deduplicated() {
        let mut node = Node::source_material("fp", "git", "git");
        node.add_material(Some("git1"), fixtures::git_revision("r1"));
        node.add_material(Some("git1"), fixtures::git_revision("r1"));
        node.add_material(None, fixtures::git_revision("r1"));

        let names: Vec<&str> = node
            .material_names()
            .map(|n| n.iter().map(String::as_str).collect())
            .unwrap_or_default();
        assert_eq!(names, vec!["git1"]);
        assert_eq!(node.material_revisions().len(), 1);
        assert_eq!(node.revisions().len(), 1);
    }

    #[test]
    fn test_material_revisions_kept_per_modification_list() {
        let mut node = Node::from_material(&fixtures::git_material());
        node.add_material(None, fixtures::git_revision("r1"));
        node.add_material(None, fixtures::git_revision("r2"));
        assert_eq!(node.material_revisions().len(), 2);
        assert_eq!(node.id().as_str(), fixtures::git_material().fingerprint());
    }

    #[test]
    fn test_pipeline_node_has_no_material_data() {
        let mut node = Node::pipeline(&PipelineName::new("cruise"));
        node.add_material(Some("git"), fixtures::git_revision("r1"));
        assert!(node.material_names().is_none());
        assert!(node.revisions().is_empty());
    }
}
