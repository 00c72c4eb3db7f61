//! Graph errors.

use conveyor_core::ids::NodeId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("Unknown node in dependency graph: {0}")]
    UnknownNode(NodeId),

    #[error("Dependency graph contains a cycle through: {}", join(.0))]
    Cycle(Vec<NodeId>),
}

fn join(ids: &[NodeId]) -> String {
    ids.iter()
        .map(NodeId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

impl From<GraphError> for conveyor_core::Error {
    fn from(err: GraphError) -> Self {
        match err {
            GraphError::UnknownNode(id) => conveyor_core::Error::UnknownNode(id.to_string()),
            GraphError::Cycle(ids) => {
                conveyor_core::Error::CyclicDependency(ids.iter().map(ToString::to_string).collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_converts_to_core_error() {
        let err: conveyor_core::Error =
            GraphError::Cycle(vec![NodeId::new("a"), NodeId::new("b"), NodeId::new("a")]).into();
        assert_eq!(err.to_string(), "Cyclic dependency detected between: a -> b -> a");
    }
}
