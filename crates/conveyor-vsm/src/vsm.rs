//! The value stream map graph.

use crate::crossing::minimize_crossings;
use crate::cycle::find_cycle;
use crate::dummy::insert_dummy_nodes;
use crate::error::GraphError;
use crate::levels::assign_levels;
use crate::node::{Node, NodeMap, ViewType};
use crate::presentation::PresentationModel;
use crate::revision::{PipelineRevision, Revision};
use conveyor_core::ids::{NodeId, PipelineName};
use conveyor_core::material::{MaterialConfig, MaterialRevision};
use conveyor_trace::vsm_span;
use std::collections::BTreeSet;
use tracing::debug;

const INCOMPATIBLE_REVISIONS_MESSAGE: &str =
    "This pipeline was built from different revisions of the same material";

/// Dependency graph of pipelines and source materials around one pipeline
/// or one material.
///
/// Built once per request by adding edges, then laid out with
/// [`presentation_model`](Self::presentation_model). Layout works on a copy,
/// so the map itself never holds dummy nodes.
#[derive(Debug, Clone)]
pub struct ValueStreamMap {
    nodes: NodeMap,
    current_pipeline: Option<NodeId>,
    current_material: Option<NodeId>,
}

impl ValueStreamMap {
    pub fn new(pipeline: &PipelineName, revision: Option<PipelineRevision>) -> Self {
        let mut node = Node::pipeline(pipeline);
        if let Some(revision) = revision {
            node.add_revision(Revision::Pipeline(revision));
        }
        let id = node.id.clone();
        let mut nodes = NodeMap::new();
        nodes.insert(id.clone(), node);
        Self {
            nodes,
            current_pipeline: Some(id),
            current_material: None,
        }
    }

    /// A map centred on a material, showing the pipelines built from it.
    pub fn for_material(material: &MaterialConfig, revision: MaterialRevision) -> Self {
        let mut node = Node::from_material(material);
        node.add_material(material.name(), revision);
        let id = node.id.clone();
        let mut nodes = NodeMap::new();
        nodes.insert(id.clone(), node);
        Self {
            nodes,
            current_pipeline: None,
            current_material: Some(id),
        }
    }

    pub fn current_pipeline(&self) -> Option<&Node> {
        self.current_pipeline.as_ref().and_then(|id| self.nodes.get(id))
    }

    pub fn current_material(&self) -> Option<&Node> {
        self.current_material.as_ref().and_then(|id| self.nodes.get(id))
    }

    pub fn find_node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn find_node_mut(&mut self, id: &NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes nothing points to, in the order they were added.
    pub fn root_nodes(&self) -> Vec<&Node> {
        self.nodes.values().filter(|n| n.parents.is_empty()).collect()
    }

    /// Add `node` (or reuse the node with its id) as a dependency of
    /// `dependent`, attaching `revision` when given.
    pub fn add_upstream_node(
        &mut self,
        node: Node,
        revision: Option<PipelineRevision>,
        dependent: &NodeId,
    ) -> Result<NodeId, GraphError> {
        self.ensure_exists(dependent)?;
        let id = self.get_or_insert(node);
        if let (Some(revision), Some(upstream)) = (revision, self.nodes.get_mut(&id)) {
            upstream.add_revision(Revision::Pipeline(revision));
        }
        self.link(&id, dependent);
        Ok(id)
    }

    /// Like [`add_upstream_node`](Self::add_upstream_node) for a source
    /// material. The material name and revision are merged into the node.
    pub fn add_upstream_material_node(
        &mut self,
        node: Node,
        material_name: Option<&str>,
        dependent: &NodeId,
        revision: MaterialRevision,
    ) -> Result<NodeId, GraphError> {
        self.ensure_exists(dependent)?;
        let id = self.get_or_insert(node);
        if let Some(material) = self.nodes.get_mut(&id) {
            material.add_material(material_name, revision);
        }
        self.link(&id, dependent);
        Ok(id)
    }

    /// Add `node` (or reuse the node with its id) as a dependent of `parent`.
    pub fn add_downstream_node(&mut self, node: Node, parent: &NodeId) -> Result<NodeId, GraphError> {
        self.ensure_exists(parent)?;
        let id = self.get_or_insert(node);
        self.link(parent, &id);
        Ok(id)
    }

    pub fn has_cycle(&self) -> bool {
        self.find_cycle().is_some()
    }

    /// Ids along the first cycle found, first id repeated at the end.
    pub fn find_cycle(&self) -> Option<Vec<NodeId>> {
        find_cycle(&self.nodes)
    }

    /// Flag the current pipeline when one of its source materials was
    /// recorded at different latest revisions.
    pub fn add_warning_if_built_from_incompatible_revisions(&mut self) {
        let incompatible = self.nodes.values().any(|node| {
            let latest: BTreeSet<&str> = node
                .material_revisions()
                .iter()
                .filter_map(MaterialRevision::latest_revision)
                .collect();
            latest.len() > 1
        });
        if !incompatible {
            return;
        }
        let Some(current) = self.current_pipeline.clone() else {
            return;
        };
        if let Some(node) = self.nodes.get_mut(&current) {
            node.set_view_type(
                ViewType::Warning,
                Some(INCOMPATIBLE_REVISIONS_MESSAGE.to_string()),
            );
        }
    }

    /// Lay the graph out: assign levels, pad long edges with dummy nodes and
    /// order each level to reduce crossings.
    pub fn presentation_model(&self) -> Result<PresentationModel, GraphError> {
        let current = self
            .current_pipeline
            .as_ref()
            .or(self.current_material.as_ref())
            .map(ToString::to_string)
            .unwrap_or_default();
        let _span = vsm_span(&current).entered();

        let mut nodes = self.nodes.clone();
        let mut levels = assign_levels(&mut nodes)?;
        let dummies = insert_dummy_nodes(&mut nodes, &mut levels);
        minimize_crossings(&mut nodes, &mut levels);

        debug!(
            nodes = self.nodes.len(),
            dummies,
            levels = levels.level_count(),
            "Value stream map laid out"
        );
        Ok(PresentationModel::new(
            self.current_pipeline.clone(),
            self.current_material.clone(),
            &levels,
            nodes,
        ))
    }

    fn ensure_exists(&self, id: &NodeId) -> Result<(), GraphError> {
        if self.nodes.contains_key(id) {
            Ok(())
        } else {
            Err(GraphError::UnknownNode(id.clone()))
        }
    }

    fn get_or_insert(&mut self, node: Node) -> NodeId {
        let id = node.id.clone();
        self.nodes.entry(id.clone()).or_insert(node);
        id
    }

    fn link(&mut self, upstream: &NodeId, downstream: &NodeId) {
        if let Some(node) = self.nodes.get_mut(upstream) {
            node.add_child(downstream);
        }
        if let Some(node) = self.nodes.get_mut(downstream) {
            node.add_parent(upstream);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conveyor_store::fixtures;
    use pretty_assertions::assert_eq;

    fn id(name: &str) -> NodeId {
        NodeId::new(name)
    }

    fn pipeline(name: &str) -> Node {
        Node::pipeline(&PipelineName::new(name))
    }

    fn git(id: &str) -> Node {
        Node::source_material(id, id, "git")
    }

    fn empty_revision() -> MaterialRevision {
        MaterialRevision::new(fixtures::git_material(), vec![])
    }

    #[test]
    fn test_current_pipeline_alone() {
        let graph = ValueStreamMap::new(&PipelineName::new("P1"), None);

        let current = graph.current_pipeline().unwrap();
        assert_eq!(current.name(), "P1");
        assert!(current.children().is_empty());
        assert_eq!(graph.root_nodes().len(), 1);
    }

    #[test]
    fn test_unknown_dependent_rejected() {
        let mut graph = ValueStreamMap::new(&PipelineName::new("P1"), None);
        assert_eq!(
            graph.add_upstream_node(pipeline("up"), None, &id("nope")),
            Err(GraphError::UnknownNode(id("nope")))
        );
        assert!(graph.find_node(&id("up")).is_none());
    }

    #[test]
    fn test_duplicate_dependents_not_added() {
        let mut graph = ValueStreamMap::new(&PipelineName::new("p5"), None);
        graph.add_upstream_node(pipeline("p4"), None, &id("p5")).unwrap();
        graph.add_upstream_node(pipeline("P4"), None, &id("p5")).unwrap();

        let p4 = graph.find_node(&id("p4")).unwrap();
        assert_eq!(p4.children(), &[id("p5")]);
        assert_eq!(graph.find_node(&id("p5")).unwrap().parents(), &[id("p4")]);
    }

    #[test]
    fn test_existing_node_gains_dependents() {
        let mut graph = ValueStreamMap::new(&PipelineName::new("P1"), None);
        graph.add_upstream_node(pipeline("d1"), None, &id("P1")).unwrap();
        graph.add_upstream_node(pipeline("d2"), None, &id("P1")).unwrap();
        graph.add_upstream_node(pipeline("d3"), None, &id("d1")).unwrap();
        graph.add_upstream_node(pipeline("d3"), None, &id("d2")).unwrap();

        assert_eq!(graph.find_node(&id("d3")).unwrap().children(), &[id("d1"), id("d2")]);
    }

    #[test]
    fn test_upstream_revisions_collected() {
        let mut graph = ValueStreamMap::new(&PipelineName::new("current"), None);
        graph
            .add_upstream_node(pipeline("up"), Some(PipelineRevision::new("up", 1, "1")), &id("current"))
            .unwrap();
        graph
            .add_upstream_node(pipeline("up"), Some(PipelineRevision::new("up", 2, "2")), &id("current"))
            .unwrap();

        let revisions = graph.find_node(&id("up")).unwrap().revisions();
        assert_eq!(revisions.len(), 2);
        assert!(matches!(revisions.latest(), Some(Revision::Pipeline(r)) if r.counter == 2));
    }

    #[test]
    fn test_material_names_from_every_edge() {
        let mut graph = ValueStreamMap::new(&PipelineName::new("P2"), None);
        graph
            .add_upstream_material_node(git("git_fingerprint"), Some("git1"), &id("P2"), empty_revision())
            .unwrap();
        graph.add_upstream_node(pipeline("P1"), None, &id("P2")).unwrap();
        graph
            .add_upstream_material_node(git("git_fingerprint"), Some("git2"), &id("P1"), empty_revision())
            .unwrap();

        let names: Vec<&String> = graph
            .find_node(&id("git_fingerprint"))
            .and_then(Node::material_names)
            .map(|n| n.iter().collect())
            .unwrap_or_default();
        assert_eq!(names, vec!["git1", "git2"]);
    }

    #[test]
    fn test_root_nodes_in_insertion_order() {
        let mut graph = ValueStreamMap::new(&PipelineName::new("acceptance"), None);
        graph.add_upstream_node(pipeline("plugins"), None, &id("acceptance")).unwrap();
        graph.add_upstream_node(pipeline("git-plugins"), None, &id("plugins")).unwrap();
        graph.add_upstream_node(pipeline("cruise"), None, &id("plugins")).unwrap();
        graph
            .add_upstream_material_node(git("git-trunk"), None, &id("cruise"), empty_revision())
            .unwrap();
        graph
            .add_upstream_material_node(git("hg-trunk"), None, &id("cruise"), empty_revision())
            .unwrap();
        graph.add_upstream_node(pipeline("cruise"), None, &id("acceptance")).unwrap();
        graph
            .add_upstream_material_node(git("hg-trunk"), None, &id("acceptance"), empty_revision())
            .unwrap();

        let roots: Vec<&str> = graph.root_nodes().iter().map(|n| n.id().as_str()).collect();
        assert_eq!(roots, vec!["git-plugins", "git-trunk", "hg-trunk"]);
    }

    #[test]
    fn test_downstream_cycle_through_current() {
        // parent -> current -> child -> grandParent -> parent
        let mut graph = ValueStreamMap::new(&PipelineName::new("current"), None);
        graph.add_downstream_node(pipeline("child"), &id("current")).unwrap();
        graph.add_downstream_node(pipeline("grandParent"), &id("child")).unwrap();
        graph.add_upstream_node(pipeline("parent"), None, &id("current")).unwrap();
        graph.add_upstream_node(pipeline("grandParent"), None, &id("parent")).unwrap();
        graph
            .add_upstream_material_node(git("g"), None, &id("grandParent"), empty_revision())
            .unwrap();
        graph
            .add_upstream_material_node(git("g"), None, &id("parent"), empty_revision())
            .unwrap();

        assert!(graph.has_cycle());
        assert!(matches!(graph.presentation_model(), Err(GraphError::Cycle(_))));
    }

    #[test]
    fn test_triangle_is_not_a_cycle() {
        // g -> A -> D -> B -> C, A -> C
        let mut graph = ValueStreamMap::new(&PipelineName::new("C"), None);
        graph.add_upstream_node(pipeline("A"), None, &id("C")).unwrap();
        graph.add_upstream_node(pipeline("B"), None, &id("C")).unwrap();
        graph.add_upstream_node(pipeline("D"), None, &id("B")).unwrap();
        graph.add_upstream_node(pipeline("A"), None, &id("D")).unwrap();
        graph
            .add_upstream_material_node(git("g"), None, &id("A"), empty_revision())
            .unwrap();

        assert!(!graph.has_cycle());
    }

    #[test]
    fn test_cycle_between_upstream_and_downstream() {
        // g -> A -> B, then B -> A -> C downstream
        let mut graph = ValueStreamMap::new(&PipelineName::new("B"), None);
        graph.add_upstream_node(pipeline("A"), None, &id("B")).unwrap();
        graph
            .add_upstream_material_node(git("g"), None, &id("A"), empty_revision())
            .unwrap();
        graph.add_downstream_node(pipeline("A"), &id("B")).unwrap();
        graph.add_downstream_node(pipeline("C"), &id("A")).unwrap();

        assert_eq!(graph.find_cycle(), Some(vec![id("A"), id("B"), id("A")]));
    }

    #[test]
    fn test_cycle_with_leaves_at_different_levels() {
        let mut graph = ValueStreamMap::new(&PipelineName::new("current"), None);
        graph.add_upstream_node(pipeline("p4"), None, &id("current")).unwrap();
        graph.add_upstream_node(pipeline("p3"), None, &id("p4")).unwrap();
        graph.add_upstream_node(pipeline("p2"), None, &id("p3")).unwrap();
        graph.add_upstream_node(pipeline("p1"), None, &id("p2")).unwrap();
        graph
            .add_upstream_material_node(git("g1"), None, &id("p1"), empty_revision())
            .unwrap();
        graph
            .add_upstream_node(pipeline("p5"), Some(PipelineRevision::new("p5", 2, "2")), &id("current"))
            .unwrap();
        graph
            .add_upstream_node(pipeline("p6"), Some(PipelineRevision::new("p6", 1, "1")), &id("p5"))
            .unwrap();
        graph
            .add_upstream_node(pipeline("p5"), Some(PipelineRevision::new("p5", 1, "1")), &id("p6"))
            .unwrap();
        graph
            .add_upstream_material_node(git("g2"), None, &id("p5"), empty_revision())
            .unwrap();

        assert!(graph.has_cycle());
    }

    #[test]
    fn test_warning_for_incompatible_revisions() {
        let mut graph = ValueStreamMap::new(&PipelineName::new("current"), None);
        let current = id("current");
        graph
            .add_upstream_material_node(git("id"), Some("git"), &current, fixtures::git_revision("r1"))
            .unwrap();
        graph
            .add_upstream_material_node(git("id"), Some("git"), &current, fixtures::git_revision("r2"))
            .unwrap();

        graph.add_warning_if_built_from_incompatible_revisions();

        let node = graph.current_pipeline().unwrap();
        assert_eq!(node.view_type(), ViewType::Warning);
        assert!(node.message().is_some());
    }

    #[test]
    fn test_no_warning_when_latest_revisions_agree() {
        let mut graph = ValueStreamMap::new(&PipelineName::new("current"), None);
        let current = id("current");
        let older = fixtures::git_revision("r1");
        let mut both = fixtures::git_revision("r1");
        both.modifications.extend(fixtures::git_revision("r0").modifications);

        graph
            .add_upstream_material_node(git("id"), Some("git"), &current, older)
            .unwrap();
        graph
            .add_upstream_material_node(git("id"), Some("git"), &current, both)
            .unwrap();

        graph.add_warning_if_built_from_incompatible_revisions();

        assert_eq!(graph.current_pipeline().unwrap().view_type(), ViewType::Normal);
        assert_eq!(graph.find_node(&id("id")).unwrap().material_revisions().len(), 2);
    }

    #[test]
    fn test_material_centred_map() {
        let material = fixtures::git_material();
        let mut graph = ValueStreamMap::for_material(&material, fixtures::git_revision("r1"));
        let material_id = NodeId::new(material.fingerprint());
        graph.add_downstream_node(pipeline("build"), &material_id).unwrap();

        assert!(graph.current_pipeline().is_none());
        assert_eq!(graph.current_material().unwrap().children(), &[id("build")]);
        assert_eq!(graph.current_material().unwrap().revisions().len(), 1);
    }
}
