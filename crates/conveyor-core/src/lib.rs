//! Conveyor Core
//!
//! Core domain types, traits, and error handling for Conveyor.
//! This crate has minimal dependencies and defines the shared vocabulary
//! used by the scheduler, the value stream map and the adapters.

pub mod agent;
pub mod build_cause;
pub mod error;
pub mod ids;
pub mod label;
pub mod material;
pub mod pipeline;
pub mod ports;
pub mod run;
pub mod variables;

pub use error::{Error, Result};
pub use ids::*;
