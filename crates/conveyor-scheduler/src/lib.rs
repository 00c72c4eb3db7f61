//! Pipeline scheduling for Conveyor.
//!
//! Trigger sources queue build causes in the [`SchedulingQueue`]; the
//! [`ScheduleService`] periodically hands pending causes to the
//! [`PipelineInstantiator`], which expands them into runs and job plans.

pub mod agents;
pub mod config;
pub mod fanout;
pub mod instantiator;
pub mod queue;
pub mod scheduler;
pub mod timer;
pub mod triggers;

pub use agents::SchedulingContext;
pub use config::SchedulerConfig;
pub use instantiator::{Instantiation, PipelineInstantiator};
pub use queue::SchedulingQueue;
pub use scheduler::{SchedulePassReport, ScheduleService};
pub use timer::TimerSchedule;
pub use triggers::BuildCauseProducer;
