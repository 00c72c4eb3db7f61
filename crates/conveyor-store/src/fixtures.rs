//! Canned configuration and causes for tests across the workspace.

use chrono::{DateTime, Duration, TimeZone, Utc};
use conveyor_core::build_cause::{BuildCause, CHANGES_APPROVER};
use conveyor_core::label::LabelTemplate;
use conveyor_core::material::{MaterialConfig, MaterialRevision, MaterialRevisions, Modification};
use conveyor_core::pipeline::{JobDefinition, PipelineDefinition, StageDefinition};
use conveyor_core::run::PipelineRun;
use conveyor_core::variables::EnvironmentVariables;
use conveyor_core::{PipelineName, RunId};

pub const GIT_URL: &str = "https://git.example.com/cruise.git";

pub fn git_material() -> MaterialConfig {
    MaterialConfig::git(GIT_URL)
}

/// Revisions ending in a larger number are later in time.
pub fn git_revision(revision: &str) -> MaterialRevision {
    let minutes: i64 = revision
        .trim_start_matches(|c: char| !c.is_ascii_digit())
        .parse()
        .unwrap_or(0);
    let modification = Modification::new(revision, base_time() + Duration::minutes(minutes))
        .with_author("lgao")
        .with_comment(format!("commit {revision}"));
    MaterialRevision::new(git_material(), vec![modification]).mark_changed(true)
}

pub fn modified_cause(revision: &str) -> BuildCause {
    modified_cause_by(revision, CHANGES_APPROVER)
}

pub fn modified_cause_by(revision: &str, approver: &str) -> BuildCause {
    BuildCause::with_modifications(MaterialRevisions::new(vec![git_revision(revision)]), approver)
}

pub fn forced_cause(revision: &str) -> BuildCause {
    BuildCause::manual_forced(MaterialRevisions::new(vec![git_revision(revision)]), "admin")
}

/// A two stage pipeline, `build` then `deploy`, on the shared git material.
pub fn pipeline(name: &str) -> PipelineDefinition {
    PipelineDefinition::new(
        name,
        vec![git_material()],
        vec![
            StageDefinition::new("build", vec![JobDefinition::new("unit")]),
            StageDefinition::new("deploy", vec![JobDefinition::new("push")]),
        ],
    )
}

/// An unnumbered run with no stages.
pub fn run_for(name: &str, cause: BuildCause) -> PipelineRun {
    PipelineRun {
        id: RunId::new(),
        pipeline_name: PipelineName::new(name),
        counter: 0,
        label: String::new(),
        label_template: LabelTemplate::default(),
        build_cause: cause,
        schedule_time_variables: EnvironmentVariables::new(),
        stages: vec![],
        scheduled_at: base_time(),
    }
}

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::UNIX_EPOCH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_later_revisions_are_newer() {
        assert!(git_revision("r2").is_newer_than(&git_revision("r1")));
        assert!(!git_revision("r1").is_newer_than(&git_revision("r2")));
    }

    #[test]
    fn test_fixture_pipeline_is_valid() {
        assert!(pipeline("cruise").validate().is_ok());
    }
}
