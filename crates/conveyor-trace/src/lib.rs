//! Tracing setup for Conveyor.
//!
//! Installs a `tracing-subscriber` registry with an env filter and a text or
//! JSON formatter, and provides spans carrying pipeline scheduling attributes.

pub mod spans;
pub mod tracer;

pub use spans::{ScheduleAttributes, schedule_span, trigger_span, vsm_span};
pub use tracer::{LogFormat, TracerError, TracingConfig, init_tracing};
