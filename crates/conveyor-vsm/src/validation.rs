//! Configuration-wide dependency checks between pipelines.

use conveyor_core::ids::PipelineName;
use conveyor_core::material::MaterialConfig;
use conveyor_core::pipeline::PipelineDefinition;
use conveyor_core::{Error, Result};
use petgraph::algo::{astar, tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::NodeFiltered;
use std::collections::HashMap;
use tracing::debug;

/// Checks that dependency materials point at existing pipelines and stages
/// and that pipelines do not depend on themselves through any path.
pub struct DependencyValidator;

impl DependencyValidator {
    /// Returns the pipelines upstream first.
    pub fn validate(definitions: &[PipelineDefinition]) -> Result<Vec<PipelineName>> {
        let mut graph: DiGraph<&PipelineName, ()> = DiGraph::new();
        let mut name_to_index: HashMap<&PipelineName, NodeIndex> = HashMap::new();

        for definition in definitions {
            let idx = graph.add_node(&definition.name);
            name_to_index.insert(&definition.name, idx);
        }

        for definition in definitions {
            for material in &definition.materials {
                let MaterialConfig::Dependency { pipeline, stage, .. } = material else {
                    continue;
                };
                let upstream = definitions
                    .iter()
                    .find(|d| &d.name == pipeline)
                    .ok_or_else(|| {
                        Error::InvalidConfig(format!(
                            "pipeline '{}' depends on unknown pipeline '{pipeline}'",
                            definition.name
                        ))
                    })?;
                if upstream.stage(stage).is_none() {
                    return Err(Error::StageNotFound {
                        pipeline: pipeline.to_string(),
                        stage: stage.to_string(),
                    });
                }
                if let (Some(&from), Some(&to)) =
                    (name_to_index.get(pipeline), name_to_index.get(&definition.name))
                {
                    graph.add_edge(from, to, ());
                }
            }
        }

        if let Some(cycle) = first_cycle(&graph) {
            return Err(Error::CyclicDependency(
                cycle.into_iter().map(|idx| graph[idx].to_string()).collect(),
            ));
        }

        let order = toposort(&graph, None)
            .map_err(|_| Error::Internal("dependency graph is not acyclic".to_string()))?;
        debug!(pipelines = order.len(), "Pipeline dependencies validated");
        Ok(order.into_iter().map(|idx| (*graph[idx]).clone()).collect())
    }
}

/// A closed path through the first strongly connected component that loops,
/// starting and ending at its earliest declared pipeline.
fn first_cycle(graph: &DiGraph<&PipelineName, ()>) -> Option<Vec<NodeIndex>> {
    let mut components = tarjan_scc(graph);
    components.iter_mut().for_each(|c| c.sort());
    components.sort();

    components.into_iter().find_map(|component| {
        let start = *component.first()?;
        if component.len() == 1 {
            return graph
                .contains_edge(start, start)
                .then(|| vec![start, start]);
        }
        let next = graph.neighbors(start).filter(|n| component.contains(n)).min()?;
        let within = NodeFiltered::from_fn(graph, |n| component.contains(&n));
        let (_, back) = astar(&within, next, |n| n == start, |_| 1usize, |_| 0)?;
        let mut path = vec![start];
        path.extend(back);
        Some(path)
    })
}
