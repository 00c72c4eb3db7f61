//! Span creation for scheduling and dependency-graph operations.

use tracing::{Level, Span, span};

/// Attributes attached to scheduling spans.
#[derive(Debug, Default)]
pub struct ScheduleAttributes {
    pub pipeline_name: Option<String>,
    pub run_counter: Option<u32>,
    pub trigger: Option<String>,
    pub approver: Option<String>,
    pub config_version: Option<String>,
}

impl ScheduleAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pipeline(mut self, name: impl Into<String>) -> Self {
        self.pipeline_name = Some(name.into());
        self
    }

    pub fn run(mut self, counter: u32) -> Self {
        self.run_counter = Some(counter);
        self
    }

    pub fn trigger(mut self, trigger: impl Into<String>) -> Self {
        self.trigger = Some(trigger.into());
        self
    }

    pub fn approver(mut self, approver: impl Into<String>) -> Self {
        self.approver = Some(approver.into());
        self
    }

    pub fn config_version(mut self, version: impl Into<String>) -> Self {
        self.config_version = Some(version.into());
        self
    }
}

/// Span around one scheduling attempt of a pipeline.
pub fn schedule_span(attrs: &ScheduleAttributes) -> Span {
    span!(
        Level::INFO,
        "pipeline.schedule",
        pipeline.name = attrs.pipeline_name.as_deref().unwrap_or(""),
        pipeline.counter = attrs.run_counter.unwrap_or(0),
        cause.approver = attrs.approver.as_deref().unwrap_or(""),
        config.version = attrs.config_version.as_deref().unwrap_or(""),
    )
}

/// Span around a trigger source producing a build cause.
pub fn trigger_span(attrs: &ScheduleAttributes) -> Span {
    span!(
        Level::INFO,
        "pipeline.trigger",
        pipeline.name = attrs.pipeline_name.as_deref().unwrap_or(""),
        trigger = attrs.trigger.as_deref().unwrap_or(""),
    )
}

/// Span around building or laying out a value stream map.
pub fn vsm_span(pipeline: &str) -> Span {
    span!(Level::DEBUG, "vsm.build", pipeline.name = pipeline)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_attributes_builder() {
        let attrs = ScheduleAttributes::new()
            .pipeline("cruise")
            .run(7)
            .trigger("manual")
            .approver("admin")
            .config_version("abc");

        assert_eq!(attrs.pipeline_name.as_deref(), Some("cruise"));
        assert_eq!(attrs.run_counter, Some(7));
        assert_eq!(attrs.trigger.as_deref(), Some("manual"));
        assert_eq!(attrs.config_version.as_deref(), Some("abc"));
    }

    #[test]
    fn test_spans_without_subscriber() {
        let attrs = ScheduleAttributes::new().pipeline("cruise");
        let _guard = schedule_span(&attrs).entered();
        let _trigger = trigger_span(&attrs).entered();
        let _vsm = vsm_span("cruise").entered();
    }
}
