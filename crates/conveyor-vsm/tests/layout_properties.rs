//! Property-based tests for value stream map layout.
//!
//! Random acyclic pipeline graphs are grown upstream from one pipeline and
//! laid out; the layout must respect edge direction, pad long edges and be
//! reproducible.

use conveyor_core::ids::{NodeId, PipelineName};
use conveyor_vsm::{Node, ValueStreamMap};
use proptest::prelude::*;
use std::collections::HashSet;

/// Pipelines `p0..pn`, with `p{n-1}` current and an edge `pi -> pj` for
/// every selected pair `i < j`. Pipelines unreachable from the current one
/// are left out.
fn graph(size: usize, edges: &[bool]) -> ValueStreamMap {
    let name = |i: usize| PipelineName::new(format!("p{i}"));
    let mut vsm = ValueStreamMap::new(&name(size - 1), None);
    let mut flags = edges.iter().copied().cycle();

    for dependent in (1..size).rev() {
        for upstream in 0..dependent {
            let selected = flags.next().unwrap_or(false);
            let dependent_id = NodeId::from(&name(dependent));
            if selected && vsm.find_node(&dependent_id).is_some() {
                vsm.add_upstream_node(Node::pipeline(&name(upstream)), None, &dependent_id)
                    .unwrap();
            }
        }
    }
    vsm
}

fn graph_strategy() -> impl Strategy<Value = (usize, Vec<bool>)> {
    (2usize..9, prop::collection::vec(any::<bool>(), 1..40))
}

proptest! {
    /// Property: every node appears exactly once, at the level it records.
    #[test]
    fn every_node_placed_once((size, edges) in graph_strategy()) {
        let vsm = graph(size, &edges);
        let model = vsm.presentation_model().unwrap();

        let mut seen = HashSet::new();
        for (level, nodes) in model.nodes_at_each_level().iter().enumerate() {
            prop_assert!(!nodes.is_empty());
            for (position, node) in nodes.iter().enumerate() {
                prop_assert!(seen.insert(node.id().clone()));
                prop_assert_eq!(node.level(), level);
                prop_assert_eq!(node.depth(), position + 1);
            }
        }
        let real = model.nodes().filter(|n| !n.is_dummy()).count();
        prop_assert_eq!(real, vsm.len());
    }

    /// Property: after padding, every edge joins adjacent levels.
    #[test]
    fn edges_join_adjacent_levels((size, edges) in graph_strategy()) {
        let model = graph(size, &edges).presentation_model().unwrap();

        for node in model.nodes() {
            for child in node.children() {
                let child = model.find(child).unwrap();
                prop_assert_eq!(child.level(), node.level() + 1);
            }
        }
    }

    /// Property: a pipeline sits one level below its deepest dependency.
    #[test]
    fn levels_follow_longest_path((size, edges) in graph_strategy()) {
        let vsm = graph(size, &edges);
        let model = vsm.presentation_model().unwrap();

        for node in vsm.nodes() {
            let level = model.find(node.id()).unwrap().level();
            let expected = node
                .parents()
                .iter()
                .map(|p| model.find(p).unwrap().level() + 1)
                .max()
                .unwrap_or(0);
            prop_assert_eq!(level, expected);
        }
    }

    /// Property: the same graph always lays out the same way.
    #[test]
    fn layout_is_reproducible((size, edges) in graph_strategy()) {
        let first = graph(size, &edges).presentation_model().unwrap().to_json().unwrap();
        let second = graph(size, &edges).presentation_model().unwrap().to_json().unwrap();
        prop_assert_eq!(first, second);
    }
}
