//! Depth-first cycle detection.

use crate::node::NodeMap;
use conveyor_core::ids::NodeId;
use std::collections::HashSet;

/// The first cycle found, as the path that closes it (first id repeated
/// last).
///
/// Roots are visited in insertion order, then any node not reached from a
/// root, so a cycle with no root leading into it is still found.
pub(crate) fn find_cycle(nodes: &NodeMap) -> Option<Vec<NodeId>> {
    let mut search = CycleSearch {
        nodes,
        path: Vec::new(),
        on_path: HashSet::new(),
        verified: HashSet::new(),
    };

    let roots = nodes.values().filter(|n| n.parents.is_empty()).map(|n| &n.id);
    let rest = nodes.values().filter(|n| !n.parents.is_empty()).map(|n| &n.id);
    for id in roots.chain(rest) {
        if let Some(cycle) = search.visit(id) {
            return Some(cycle);
        }
    }
    None
}

struct CycleSearch<'a> {
    nodes: &'a NodeMap,
    path: Vec<&'a NodeId>,
    on_path: HashSet<&'a NodeId>,
    verified: HashSet<&'a NodeId>,
}

impl<'a> CycleSearch<'a> {
    fn visit(&mut self, id: &'a NodeId) -> Option<Vec<NodeId>> {
        if self.on_path.contains(id) {
            let start = self.path.iter().position(|p| *p == id).unwrap_or(0);
            let mut cycle: Vec<NodeId> = self.path[start..].iter().map(|p| (*p).clone()).collect();
            cycle.push(id.clone());
            return Some(cycle);
        }
        if self.verified.contains(id) {
            return None;
        }
        let nodes: &'a NodeMap = self.nodes;
        let node = nodes.get(id)?;

        self.path.push(id);
        self.on_path.insert(id);
        for child in &node.children {
            if let Some(cycle) = self.visit(child) {
                return Some(cycle);
            }
        }
        self.path.pop();
        self.on_path.remove(id);
        self.verified.insert(id);
        None
    }
}
