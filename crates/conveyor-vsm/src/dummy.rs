//! Dummy node insertion for edges spanning more than one level.

use crate::levels::NodeLevelMap;
use crate::node::{Node, NodeMap};
use conveyor_core::ids::NodeId;

/// Replace every edge that skips levels by a chain of dummy nodes, one per
/// intermediate level. Returns how many dummies were added.
///
/// Levels must already be assigned. Dummies take the position of the edge
/// they replace in the parent's child list.
pub(crate) fn insert_dummy_nodes(nodes: &mut NodeMap, levels: &mut NodeLevelMap) -> usize {
    let mut long_edges: Vec<(NodeId, NodeId)> = Vec::new();
    for node in nodes.values() {
        for child in &node.children {
            if nodes.get(child).is_some_and(|c| c.level > node.level + 1) {
                long_edges.push((node.id.clone(), child.clone()));
            }
        }
    }

    let mut sequence = 0;
    let mut added = 0;
    for (from, to) in long_edges {
        let (Some(from_level), Some(to_level)) =
            (nodes.get(&from).map(|n| n.level), nodes.get(&to).map(|n| n.level))
        else {
            continue;
        };

        let mut previous = from.clone();
        for level in from_level + 1..to_level {
            let id = next_dummy_id(nodes, &mut sequence);
            let mut dummy = Node::dummy(id.clone());
            dummy.level = level;
            dummy.parents.push(previous.clone());

            if let Some(prev) = nodes.get_mut(&previous) {
                if previous == from {
                    prev.replace_child(&to, id.clone());
                } else {
                    prev.children.push(id.clone());
                }
            }
            nodes.insert(id.clone(), dummy);
            levels.push(level, id.clone());
            previous = id;
            added += 1;
        }

        if let Some(last) = nodes.get_mut(&previous) {
            last.children.push(to.clone());
        }
        if let Some(target) = nodes.get_mut(&to) {
            target.replace_parent(&from, previous);
        }
    }
    added
}

fn next_dummy_id(nodes: &NodeMap, sequence: &mut usize) -> NodeId {
    loop {
        *sequence += 1;
        let id = NodeId::new(format!("dummy-{sequence}"));
        if !nodes.contains_key(&id) {
            return id;
        }
    }
}
