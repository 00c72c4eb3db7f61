//! In-memory adapters for the Conveyor ports.
//!
//! Back the scheduler in tests and in the command line tool. A durable
//! implementation would provide the same traits.

pub mod agents;
pub mod config;
pub mod fixtures;
pub mod history;
pub mod materials;

pub use agents::InMemoryAgentDirectory;
pub use config::InMemoryConfigProvider;
pub use history::InMemoryHistoryStore;
pub use materials::InMemoryMaterialResolver;

use conveyor_core::Error;

fn poisoned<T>(_: std::sync::PoisonError<T>) -> Error {
    Error::Store("lock poisoned".to_string())
}
