//! Barycenter crossing minimization.

use crate::levels::NodeLevelMap;
use crate::node::NodeMap;
use conveyor_core::ids::NodeId;
use std::collections::HashMap;

const SWEEPS: usize = 4;

#[derive(Clone, Copy)]
enum Direction {
    /// Order a level by its parents in the level above.
    Down,
    /// Order a level by its children in the level below.
    Up,
}

/// Reorder every level to reduce edge crossings, then number each node's
/// `depth` (1-based position in its level).
///
/// Expects every edge to join adjacent levels. Alternates downward and
/// upward barycenter sweeps and keeps the ordering with the fewest
/// crossings seen; ties keep the earlier ordering, so identical input
/// always produces identical output.
pub(crate) fn minimize_crossings(nodes: &mut NodeMap, levels: &mut NodeLevelMap) {
    let mut best = levels.clone();
    let mut best_crossings = total_crossings(nodes, levels);

    for _ in 0..SWEEPS {
        if best_crossings == 0 {
            break;
        }
        for direction in [Direction::Down, Direction::Up] {
            sweep(nodes, levels, direction);
            let crossings = total_crossings(nodes, levels);
            if crossings < best_crossings {
                best_crossings = crossings;
                best = levels.clone();
            }
        }
    }

    *levels = best;
    for (_, ids) in levels.iter() {
        for (position, id) in ids.iter().enumerate() {
            if let Some(node) = nodes.get_mut(id) {
                node.depth = position + 1;
            }
        }
    }
}

fn sweep(nodes: &NodeMap, levels: &mut NodeLevelMap, direction: Direction) {
    let count = levels.level_count();
    let order: Vec<usize> = match direction {
        Direction::Down => (1..count).collect(),
        Direction::Up => (0..count.saturating_sub(1)).rev().collect(),
    };

    for level in order {
        let fixed = match direction {
            Direction::Down => positions(levels.nodes_at(level - 1)),
            Direction::Up => positions(levels.nodes_at(level + 1)),
        };
        let Some(ids) = levels.level_mut(level) else {
            continue;
        };

        let mut keyed: Vec<(f64, NodeId)> = ids
            .iter()
            .enumerate()
            .map(|(current, id)| {
                let neighbours = nodes.get(id).map(|n| match direction {
                    Direction::Down => &n.parents,
                    Direction::Up => &n.children,
                });
                let barycenter = neighbours
                    .and_then(|ns| barycenter(ns, &fixed))
                    .unwrap_or(current as f64);
                (barycenter, id.clone())
            })
            .collect();
        keyed.sort_by(|a, b| a.0.total_cmp(&b.0));
        *ids = keyed.into_iter().map(|(_, id)| id).collect();
    }
}

fn positions(ids: &[NodeId]) -> HashMap<NodeId, usize> {
    ids.iter().enumerate().map(|(i, id)| (id.clone(), i)).collect()
}

fn barycenter(neighbours: &[NodeId], fixed: &HashMap<NodeId, usize>) -> Option<f64> {
    let placed: Vec<usize> = neighbours
        .iter()
        .filter_map(|n| fixed.get(n).copied())
        .collect();
    if placed.is_empty() {
        return None;
    }
    Some(placed.iter().sum::<usize>() as f64 / placed.len() as f64)
}

/// Edge crossings between every pair of adjacent levels.
pub(crate) fn total_crossings(nodes: &NodeMap, levels: &NodeLevelMap) -> usize {
    (1..levels.level_count())
        .map(|level| crossings_between(nodes, levels.nodes_at(level - 1), levels.nodes_at(level)))
        .sum()
}

fn crossings_between(nodes: &NodeMap, upper: &[NodeId], lower: &[NodeId]) -> usize {
    let lower_positions = positions(lower);
    let edges: Vec<(usize, usize)> = upper
        .iter()
        .enumerate()
        .filter_map(|(i, id)| nodes.get(id).map(|n| (i, n)))
        .flat_map(|(i, node)| {
            node.children
                .iter()
                .filter_map(|child| lower_positions.get(child).map(|&j| (i, j)))
                .collect::<Vec<_>>()
        })
        .collect();

    let mut crossings = 0;
    for (index, &(u1, v1)) in edges.iter().enumerate() {
        for &(u2, v2) in &edges[index + 1..] {
            if (u1 < u2 && v1 > v2) || (u1 > u2 && v1 < v2) {
                crossings += 1;
            }
        }
    }
    crossings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dummy::insert_dummy_nodes;
    use crate::levels::assign_levels;
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

    fn layout(nodes: &mut NodeMap) -> NodeLevelMap {
        let mut levels = assign_levels(nodes).unwrap();
        insert_dummy_nodes(nodes, &mut levels);
        minimize_crossings(nodes, &mut levels);
        levels
    }

    #[test]
    fn test_untangles_crossed_edges() {
        let mut nodes = graph(&["a", "b", "c", "d"], &[("a", "d"), ("b", "c"), ("b", "d")]);
        let mut levels = assign_levels(&mut nodes).unwrap();
        assert_eq!(total_crossings(&nodes, &levels), 1);

        minimize_crossings(&mut nodes, &mut levels);

        assert_eq!(total_crossings(&nodes, &levels), 0);
        assert_eq!(nodes[&NodeId::new("d")].depth(), 1);
        assert_eq!(nodes[&NodeId::new("c")].depth(), 2);
    }

    #[test]
    fn test_never_increases_crossings() {
        let mut nodes = graph(
            &["a", "b", "c", "x", "y", "z"],
            &[("a", "z"), ("b", "y"), ("c", "x"), ("a", "x")],
        );
        let before = {
            let mut copy = nodes.clone();
            let levels = assign_levels(&mut copy).unwrap();
            total_crossings(&copy, &levels)
        };
        let levels = layout(&mut nodes);
        assert!(total_crossings(&nodes, &levels) <= before);
    }

    #[test]
    fn test_layout_is_deterministic() {
        let edges = [("a", "c"), ("b", "c"), ("a", "d"), ("c", "e"), ("d", "e"), ("b", "e")];
        let names = ["a", "b", "c", "d", "e"];

        let mut first = graph(&names, &edges);
        let mut second = graph(&names, &edges);

        assert_eq!(layout(&mut first), layout(&mut second));
    }

    #[test]
    fn test_depth_is_one_based() {
        let mut nodes = graph(&["solo"], &[]);
        layout(&mut nodes);
        assert_eq!(nodes[&NodeId::new("solo")].depth(), 1);
    }
}
