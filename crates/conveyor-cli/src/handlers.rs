//! Command handlers.

use anyhow::{Context, bail};
use chrono::Utc;
use console::style;
use conveyor_core::PipelineName;
use conveyor_core::pipeline::{ConfigFile, LoadedConfig};
use conveyor_core::run::PipelineRun;
use conveyor_core::variables::EnvironmentVariables;
use conveyor_scheduler::{
    BuildCauseProducer, SchedulePassReport, ScheduleService, SchedulerConfig, SchedulingQueue,
    TimerSchedule,
};
use conveyor_store::{
    InMemoryAgentDirectory, InMemoryConfigProvider, InMemoryHistoryStore, InMemoryMaterialResolver,
};
use conveyor_vsm::{DependencyValidator, PresentationModel, ValueStreamMapBuilder};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::debug;

fn load(path: &str) -> anyhow::Result<LoadedConfig> {
    ConfigFile::from_file(path).with_context(|| format!("failed to load {path}"))
}

/// Validate a configuration file.
pub fn validate(path: &str) -> anyhow::Result<()> {
    let loaded = load(path)?;
    let pipelines = &loaded.config.pipelines;

    for pipeline in pipelines {
        if let Some(timer) = &pipeline.timer {
            TimerSchedule::parse(&timer.spec)
                .with_context(|| format!("pipeline '{}' has an invalid timer", pipeline.name))?;
        }
    }
    let order = DependencyValidator::validate(pipelines)?;

    println!(
        "{} Configuration is valid (version {})",
        style("✓").green(),
        short_fingerprint(&loaded.fingerprint)
    );
    for name in &order {
        if let Some(pipeline) = loaded.config.pipeline(name) {
            println!(
                "  {} ({} materials, {} stages)",
                style(name).bold(),
                pipeline.materials.len(),
                pipeline.stages.len()
            );
        }
    }
    Ok(())
}

/// Print the value stream map of a pipeline.
pub fn value_stream_map(path: &str, pipeline: &str, json: bool) -> anyhow::Result<()> {
    let loaded = load(path)?;
    let resolver = InMemoryMaterialResolver::new();
    let vsm = ValueStreamMapBuilder::new(&loaded.config.pipelines, &resolver)
        .build(&PipelineName::new(pipeline))?;

    if let Some(cycle) = vsm.find_cycle() {
        let path: Vec<&str> = cycle.iter().map(|id| id.as_str()).collect();
        bail!("dependency cycle: {}", path.join(" -> "));
    }
    let model = vsm.presentation_model()?;

    if json {
        println!("{}", model.to_json()?);
    } else {
        print!("{}", render_levels(&model));
    }
    Ok(())
}

/// Force a pipeline and run one in-memory scheduling pass.
pub fn trigger(
    path: &str,
    pipeline: &str,
    user: &str,
    variables: Vec<(String, String)>,
    message: Option<&str>,
) -> anyhow::Result<()> {
    let loaded = load(path)?;
    let agents = Arc::new(InMemoryAgentDirectory::from_registrations(
        loaded.config.agents.clone(),
    ));
    let config = Arc::new(InMemoryConfigProvider::from_loaded(loaded));
    let history = Arc::new(InMemoryHistoryStore::new());
    let queue = Arc::new(SchedulingQueue::new(history.clone()));

    let mut overrides = EnvironmentVariables::new();
    for (name, value) in variables {
        overrides.add(name, value);
    }

    let producer = BuildCauseProducer::new(
        queue.clone(),
        config.clone(),
        Arc::new(InMemoryMaterialResolver::new()),
    );
    let cause = producer.manual_trigger(&PipelineName::new(pipeline), user, &overrides, message)?;
    debug!(pipeline, cause = %cause.describe(), "Cause queued");

    let service = ScheduleService::new(queue, history, config, agents, SchedulerConfig::default());
    let report = service.schedule_pass(Utc::now());
    print!("{}", render_report(&report));

    if let Some((name, reason)) = report.failed.first() {
        bail!("could not schedule {name}: {reason}");
    }
    Ok(())
}

/// Print the JSON schema of the configuration file.
pub fn schema() -> anyhow::Result<()> {
    let schema = schemars::schema_for!(ConfigFile);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

fn short_fingerprint(fingerprint: &str) -> &str {
    fingerprint.get(..12).unwrap_or(fingerprint)
}

fn render_levels(model: &PresentationModel) -> String {
    let mut out = String::new();
    for (level, nodes) in model.nodes_at_each_level().iter().enumerate() {
        let names: Vec<String> = nodes
            .iter()
            .map(|node| {
                if node.is_dummy() {
                    "·".to_string()
                } else if Some(node.id()) == model.current_pipeline() {
                    format!("[{}]", node.name())
                } else {
                    node.name().to_string()
                }
            })
            .collect();
        let _ = writeln!(out, "{level:>3}  {}", names.join("  "));
    }
    out
}

fn render_report(report: &SchedulePassReport) -> String {
    let mut out = String::new();
    for run in &report.scheduled {
        out.push_str(&render_run(run));
    }
    for name in &report.trumped {
        let _ = writeln!(out, "{name} was not scheduled: nothing changed");
    }
    for name in &report.origin_mismatched {
        let _ = writeln!(
            out,
            "{name} is waiting: its configuration comes from another config repo revision"
        );
    }
    for (name, reason) in &report.failed {
        let _ = writeln!(out, "{name} failed: {reason}");
    }
    out
}

fn render_run(run: &PipelineRun) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} #{} (label {}) {}",
        run.pipeline_name,
        run.counter,
        run.label,
        run.build_cause.describe()
    );
    for stage in &run.stages {
        let _ = writeln!(out, "  {} {:?}", stage.name, stage.state);
        for job in &stage.jobs {
            let mut line = format!("    - {}", job.name);
            if !job.resources.is_empty() {
                let _ = write!(line, " [{}]", job.resources.join(", "));
            }
            if let Some(agent) = &job.agent_id {
                let _ = write!(line, " on {agent}");
            }
            let _ = writeln!(out, "{line}");
        }
    }
    out
}
