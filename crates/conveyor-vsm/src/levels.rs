//! Level assignment.

use crate::cycle::find_cycle;
use crate::error::GraphError;
use crate::node::NodeMap;
use conveyor_core::ids::NodeId;
use serde::Serialize;
use std::collections::VecDeque;

/// Node ids grouped by level, each level in layout order.
///
/// Levels are contiguous from 0.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct NodeLevelMap(Vec<Vec<NodeId>>);

impl NodeLevelMap {
    pub fn lowest_level(&self) -> usize {
        0
    }

    pub fn highest_level(&self) -> Option<usize> {
        self.0.len().checked_sub(1)
    }

    pub fn level_count(&self) -> usize {
        self.0.len()
    }

    pub fn nodes_at(&self, level: usize) -> &[NodeId] {
        self.0.get(level).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &[NodeId])> {
        self.0.iter().enumerate().map(|(l, ids)| (l, ids.as_slice()))
    }

    pub(crate) fn push(&mut self, level: usize, id: NodeId) {
        if self.0.len() <= level {
            self.0.resize_with(level + 1, Vec::new);
        }
        self.0[level].push(id);
    }

    pub(crate) fn level_mut(&mut self, level: usize) -> Option<&mut Vec<NodeId>> {
        self.0.get_mut(level)
    }
}

/// Set every node's level to the length of the longest path reaching it
/// from a root. Roots sit at level 0.
///
/// Nodes are processed in topological order (Kahn), which also gives the
/// initial order inside each level. Fails if the graph has a cycle.
pub(crate) fn assign_levels(nodes: &mut NodeMap) -> Result<NodeLevelMap, GraphError> {
    let count = nodes.len();
    let mut indegree: Vec<usize> = nodes.values().map(|n| n.parents.len()).collect();
    let mut level = vec![0usize; count];
    let mut ready: VecDeque<usize> = (0..count).filter(|&i| indegree[i] == 0).collect();
    let mut order = Vec::with_capacity(count);

    while let Some(index) = ready.pop_front() {
        order.push(index);
        let children: Vec<usize> = nodes[index]
            .children
            .iter()
            .filter_map(|child| nodes.get_index_of(child))
            .collect();
        for child in children {
            level[child] = level[child].max(level[index] + 1);
            indegree[child] -= 1;
            if indegree[child] == 0 {
                ready.push_back(child);
            }
        }
    }

    if order.len() < count {
        return Err(GraphError::Cycle(find_cycle(nodes).unwrap_or_default()));
    }

    let mut levels = NodeLevelMap::default();
    for index in order {
        let node = &mut nodes[index];
        node.level = level[index];
        levels.push(node.level, node.id.clone());
    }
    Ok(levels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;
    use conveyor_core::ids::PipelineName;

    fn graph(names: &[&str], edges: &[(&str, &str)]) -> NodeMap {
        let mut nodes: NodeMap = names
            .iter()
            .map(|n| (NodeId::new(*n), Node::pipeline(&PipelineName::new(*n))))
            .collect();
        for (from, to) in edges {
            if let Some(n) = nodes.get_mut(&NodeId::new(*from)) {
                n.add_child(&NodeId::new(*to));
            }
            if let Some(n) = nodes.get_mut(&NodeId::new(*to)) {
                n.add_parent(&NodeId::new(*from));
            }
        }
        nodes
    }

    fn level_names(levels: &NodeLevelMap) -> Vec<Vec<String>> {
        levels
            .iter()
            .map(|(_, ids)| ids.iter().map(ToString::to_string).collect())
            .collect()
    }

    #[test]
    fn test_longest_path_wins() {
        let mut nodes = graph(&["a", "b", "c"], &[("a", "b"), ("b", "c"), ("a", "c")]);
        let levels = assign_levels(&mut nodes).unwrap();

        assert_eq!(level_names(&levels), vec![vec!["a"], vec!["b"], vec!["c"]]);
        assert_eq!(nodes[&NodeId::new("c")].level(), 2);
        assert_eq!(levels.highest_level(), Some(2));
    }

    #[test]
    fn test_every_root_is_level_zero() {
        let mut nodes = graph(&["x", "a", "b", "c"], &[("a", "b"), ("b", "c"), ("x", "c")]);
        let levels = assign_levels(&mut nodes).unwrap();

        assert_eq!(levels.nodes_at(0), &[NodeId::new("x"), NodeId::new("a")]);
        assert_eq!(nodes[&NodeId::new("c")].level(), 2);
    }

    #[test]
    fn test_cycle_rejected() {
        let mut nodes = graph(&["a", "b"], &[("a", "b"), ("b", "a")]);
        assert!(matches!(assign_levels(&mut nodes), Err(GraphError::Cycle(_))));
    }

    #[test]
    fn test_empty_level_lookup() {
        let levels = NodeLevelMap::default();
        assert!(levels.nodes_at(3).is_empty());
        assert_eq!(levels.highest_level(), None);
    }
}
