//! Revisions attached to graph nodes.

use chrono::{DateTime, Utc};
use conveyor_core::ids::{PipelineName, StageName};
use conveyor_core::material::Modification;
use conveyor_core::run::{PipelineRun, StageState};
use serde::Serialize;
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageResult {
    pub name: StageName,
    pub counter: u32,
    pub state: StageState,
}

/// One run of an upstream or downstream pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineRevision {
    pub pipeline: PipelineName,
    pub counter: u32,
    pub label: String,
    pub stages: Vec<StageResult>,
}

impl PipelineRevision {
    pub fn new(pipeline: impl Into<PipelineName>, counter: u32, label: impl Into<String>) -> Self {
        Self {
            pipeline: pipeline.into(),
            counter,
            label: label.into(),
            stages: vec![],
        }
    }

    pub fn with_stages(mut self, stages: Vec<StageResult>) -> Self {
        self.stages = stages;
        self
    }
}

impl From<&PipelineRun> for PipelineRevision {
    fn from(run: &PipelineRun) -> Self {
        Self {
            pipeline: run.pipeline_name.clone(),
            counter: run.counter,
            label: run.label.clone(),
            stages: run
                .stages
                .iter()
                .map(|s| StageResult {
                    name: s.name.clone(),
                    counter: s.counter,
                    state: s.state,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceMaterialRevision {
    pub revision: String,
    pub author: Option<String>,
    pub comment: Option<String>,
    pub modified_at: DateTime<Utc>,
}

impl From<&Modification> for SourceMaterialRevision {
    fn from(modification: &Modification) -> Self {
        Self {
            revision: modification.revision.clone(),
            author: modification.author.clone(),
            comment: modification.comment.clone(),
            modified_at: modification.modified_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Revision {
    Pipeline(PipelineRevision),
    SourceMaterial(SourceMaterialRevision),
}

impl Revision {
    fn same_entry(&self, other: &Revision) -> bool {
        match (self, other) {
            (Revision::Pipeline(a), Revision::Pipeline(b)) => {
                a.pipeline == b.pipeline && a.counter == b.counter
            }
            (Revision::SourceMaterial(a), Revision::SourceMaterial(b)) => a.revision == b.revision,
            _ => false,
        }
    }

    /// `Less` when `self` is newer than `other`.
    fn newest_first(&self, other: &Revision) -> Ordering {
        match (self, other) {
            (Revision::Pipeline(a), Revision::Pipeline(b)) => b.counter.cmp(&a.counter),
            (Revision::SourceMaterial(a), Revision::SourceMaterial(b)) => {
                b.modified_at.cmp(&a.modified_at)
            }
            (Revision::Pipeline(_), Revision::SourceMaterial(_)) => Ordering::Less,
            (Revision::SourceMaterial(_), Revision::Pipeline(_)) => Ordering::Greater,
        }
    }
}

/// A set of revisions kept newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Revisions(Vec<Revision>);

impl Revisions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when an equal entry is already present.
    pub fn add(&mut self, revision: Revision) -> bool {
        if self.0.iter().any(|r| r.same_entry(&revision)) {
            return false;
        }
        let at = self
            .0
            .partition_point(|r| r.newest_first(&revision) != Ordering::Greater);
        self.0.insert(at, revision);
        true
    }

    pub fn latest(&self) -> Option<&Revision> {
        self.0.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Revision> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> IntoIterator for &'a Revisions {
    type Item = &'a Revision;
    type IntoIter = std::slice::Iter<'a, Revision>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
