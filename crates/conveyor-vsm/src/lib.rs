//! Conveyor value stream map.
//!
//! Builds the dependency graph of pipelines and source materials around one
//! pipeline, checks it for cycles and lays it out for rendering: nodes are
//! leveled by longest path from the roots, long edges are padded with dummy
//! nodes and every level is reordered to reduce edge crossings.

pub mod builder;
mod crossing;
mod cycle;
mod dummy;
pub mod error;
mod levels;
pub mod node;
pub mod presentation;
pub mod revision;
pub mod validation;
pub mod vsm;

pub use builder::ValueStreamMapBuilder;
pub use error::GraphError;
pub use levels::NodeLevelMap;
pub use node::{Node, NodeKind, ViewType};
pub use presentation::PresentationModel;
pub use revision::{PipelineRevision, Revision, Revisions, SourceMaterialRevision, StageResult};
pub use validation::DependencyValidator;
pub use vsm::ValueStreamMap;
