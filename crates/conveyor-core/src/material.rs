//! Materials, modifications and material revisions.
//!
//! A material is anything a pipeline consumes: a source repository or the
//! output of an upstream pipeline stage. A `MaterialRevision` pairs a material
//! with the modifications seen for it, newest first.

use crate::ids::{PipelineName, StageName};
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

fn default_branch() -> String {
    "master".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MaterialConfig {
    Git {
        url: String,
        #[serde(default = "default_branch")]
        branch: String,
        #[serde(default)]
        name: Option<String>,
    },
    Hg {
        url: String,
        #[serde(default)]
        branch: Option<String>,
        #[serde(default)]
        name: Option<String>,
    },
    Svn {
        url: String,
        #[serde(default)]
        name: Option<String>,
    },
    Dependency {
        pipeline: PipelineName,
        stage: StageName,
        #[serde(default)]
        name: Option<String>,
    },
}

impl MaterialConfig {
    pub fn git(url: impl Into<String>) -> Self {
        MaterialConfig::Git {
            url: url.into(),
            branch: default_branch(),
            name: None,
        }
    }

    pub fn dependency(pipeline: impl Into<PipelineName>, stage: impl Into<StageName>) -> Self {
        MaterialConfig::Dependency {
            pipeline: pipeline.into(),
            stage: stage.into(),
            name: None,
        }
    }

    /// Stable identity of the material, independent of its display name.
    pub fn fingerprint(&self) -> String {
        let attributes = match self {
            MaterialConfig::Git { url, branch, .. } => format!("type=git<|>url={url}<|>branch={branch}"),
            MaterialConfig::Hg { url, branch, .. } => format!(
                "type=hg<|>url={url}<|>branch={}",
                branch.as_deref().unwrap_or_default()
            ),
            MaterialConfig::Svn { url, .. } => format!("type=svn<|>url={url}"),
            MaterialConfig::Dependency {
                pipeline, stage, ..
            } => format!(
                "type=dependency<|>pipeline={}<|>stage={}",
                pipeline.as_str().to_lowercase(),
                stage.as_str().to_lowercase()
            ),
        };
        let digest = Sha256::digest(attributes.as_bytes());
        format!("{digest:x}")
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            MaterialConfig::Git { name, .. }
            | MaterialConfig::Hg { name, .. }
            | MaterialConfig::Svn { name, .. }
            | MaterialConfig::Dependency { name, .. } => name.as_deref(),
        }
    }

    /// Human readable label: the configured name, else the url or upstream pipeline.
    pub fn display_name(&self) -> String {
        if let Some(name) = self.name() {
            return name.to_string();
        }
        match self {
            MaterialConfig::Git { url, .. }
            | MaterialConfig::Hg { url, .. }
            | MaterialConfig::Svn { url, .. } => url.clone(),
            MaterialConfig::Dependency { pipeline, .. } => pipeline.to_string(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            MaterialConfig::Git { .. } => "git",
            MaterialConfig::Hg { .. } => "hg",
            MaterialConfig::Svn { .. } => "svn",
            MaterialConfig::Dependency { .. } => "dependency",
        }
    }

    pub fn upstream_pipeline(&self) -> Option<&PipelineName> {
        match self {
            MaterialConfig::Dependency { pipeline, .. } => Some(pipeline),
            _ => None,
        }
    }
}

/// A single change observed on a material.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct Modification {
    pub revision: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    pub modified_at: DateTime<Utc>,
    #[serde(default)]
    pub files: Vec<String>,
}

impl Modification {
    pub fn new(revision: impl Into<String>, modified_at: DateTime<Utc>) -> Self {
        Self {
            revision: revision.into(),
            author: None,
            comment: None,
            modified_at,
            files: vec![],
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Pipeline counter of a dependency revision (`<pipeline>/<counter>/<stage>/<stage counter>`).
    pub fn pipeline_counter(&self) -> Option<u32> {
        self.revision.split('/').nth(1)?.parse().ok()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MaterialRevision {
    pub material: MaterialConfig,
    /// Newest first.
    pub modifications: Vec<Modification>,
    #[serde(default)]
    pub changed: bool,
}

impl MaterialRevision {
    pub fn new(material: MaterialConfig, modifications: Vec<Modification>) -> Self {
        Self {
            material,
            modifications,
            changed: false,
        }
    }

    pub fn fingerprint(&self) -> String {
        self.material.fingerprint()
    }

    pub fn latest_modification(&self) -> Option<&Modification> {
        self.modifications.first()
    }

    pub fn latest_revision(&self) -> Option<&str> {
        self.latest_modification().map(|m| m.revision.as_str())
    }

    pub fn has_modifications(&self) -> bool {
        !self.modifications.is_empty()
    }

    /// Same material and the same modification list.
    pub fn is_same_as(&self, other: &MaterialRevision) -> bool {
        self.fingerprint() == other.fingerprint() && self.modifications == other.modifications
    }

    /// Whether the latest modification here is strictly newer than `other`'s.
    ///
    /// Dependency materials compare the upstream pipeline counter, source
    /// materials the modification time.
    pub fn is_newer_than(&self, other: &MaterialRevision) -> bool {
        match (self.latest_modification(), other.latest_modification()) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(mine), Some(theirs)) => {
                if let (Some(a), Some(b)) = (mine.pipeline_counter(), theirs.pipeline_counter())
                    && self.material.upstream_pipeline().is_some()
                {
                    return a > b;
                }
                mine.revision != theirs.revision && mine.modified_at >= theirs.modified_at
            }
        }
    }

    pub fn mark_changed(mut self, changed: bool) -> Self {
        self.changed = changed;
        self
    }
}

/// Ordered collection of material revisions, one per material.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct MaterialRevisions(Vec<MaterialRevision>);

impl MaterialRevisions {
    pub fn new(revisions: Vec<MaterialRevision>) -> Self {
        Self(revisions)
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn push(&mut self, revision: MaterialRevision) {
        self.0.push(revision);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MaterialRevision> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn find_by_fingerprint(&self, fingerprint: &str) -> Option<&MaterialRevision> {
        self.0.iter().find(|r| r.fingerprint() == fingerprint)
    }

    /// True when at least one material carries a modification.
    pub fn has_modifications(&self) -> bool {
        self.0.iter().any(MaterialRevision::has_modifications)
    }

    /// Same materials with identical modification lists, regardless of order.
    pub fn is_same_as(&self, other: &MaterialRevisions) -> bool {
        self.len() == other.len()
            && self.0.iter().all(|mine| {
                other
                    .find_by_fingerprint(&mine.fingerprint())
                    .is_some_and(|theirs| mine.is_same_as(theirs))
            })
    }

    /// True when some material is new or has a different latest revision than in `previous`.
    pub fn has_changes_since(&self, previous: &MaterialRevisions) -> bool {
        self.0.iter().any(|mine| {
            match previous.find_by_fingerprint(&mine.fingerprint()) {
                None => mine.has_modifications(),
                Some(theirs) => mine.latest_revision() != theirs.latest_revision(),
            }
        })
    }

    /// True when some material is strictly newer than its counterpart in `previous`.
    pub fn has_newer_revision_than(&self, previous: &MaterialRevisions) -> bool {
        self.0.iter().any(|mine| {
            match previous.find_by_fingerprint(&mine.fingerprint()) {
                None => mine.has_modifications(),
                Some(theirs) => mine.is_newer_than(theirs),
            }
        })
    }

    /// The most recent modification across all materials.
    pub fn latest_modification(&self) -> Option<&Modification> {
        self.0
            .iter()
            .filter_map(MaterialRevision::latest_modification)
            .max_by_key(|m| m.modified_at)
    }

    pub fn latest_revision(&self) -> Option<&str> {
        self.latest_modification().map(|m| m.revision.as_str())
    }
}

impl<'a> IntoIterator for &'a MaterialRevisions {
    type Item = &'a MaterialRevision;
    type IntoIter = std::slice::Iter<'a, MaterialRevision>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<MaterialRevision> for MaterialRevisions {
    fn from_iter<I: IntoIterator<Item = MaterialRevision>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap()
    }

    fn git_revision(url: &str, revs: &[(&str, u32)]) -> MaterialRevision {
        MaterialRevision::new(
            MaterialConfig::git(url),
            revs.iter().map(|(r, h)| Modification::new(*r, at(*h))).collect(),
        )
    }

    #[test]
    fn test_fingerprint_ignores_display_name() {
        let plain = MaterialConfig::git("https://example.com/repo.git");
        let named = MaterialConfig::Git {
            url: "https://example.com/repo.git".to_string(),
            branch: "master".to_string(),
            name: Some("repo".to_string()),
        };
        assert_eq!(plain.fingerprint(), named.fingerprint());
        assert_ne!(plain.fingerprint(), MaterialConfig::git("other").fingerprint());
    }

    #[test]
    fn test_dependency_fingerprint_is_case_insensitive() {
        assert_eq!(
            MaterialConfig::dependency("Up", "Dist").fingerprint(),
            MaterialConfig::dependency("up", "dist").fingerprint()
        );
    }

    #[test]
    fn test_same_revisions_in_any_order() {
        let a = MaterialRevisions::new(vec![git_revision("a", &[("r1", 1)]), git_revision("b", &[("r2", 2)])]);
        let b = MaterialRevisions::new(vec![git_revision("b", &[("r2", 2)]), git_revision("a", &[("r1", 1)])]);
        assert!(a.is_same_as(&b));
    }

    #[test]
    fn test_newer_revision_detection() {
        let old = MaterialRevisions::new(vec![git_revision("a", &[("r1", 1)])]);
        let new = MaterialRevisions::new(vec![git_revision("a", &[("r2", 2), ("r1", 1)])]);

        assert!(new.has_newer_revision_than(&old));
        assert!(!old.has_newer_revision_than(&new));
        assert!(new.has_changes_since(&old));
        assert!(!old.has_changes_since(&old));
    }

    #[test]
    fn test_dependency_revision_compares_counter() {
        let material = MaterialConfig::dependency("up", "dist");
        let two = MaterialRevision::new(material.clone(), vec![Modification::new("up/2/dist/1", at(1))]);
        let ten = MaterialRevision::new(material, vec![Modification::new("up/10/dist/1", at(1))]);
        assert!(ten.is_newer_than(&two));
        assert!(!two.is_newer_than(&ten));
    }

    #[test]
    fn test_latest_revision_across_materials() {
        let revisions = MaterialRevisions::new(vec![
            git_revision("a", &[("r1", 1)]),
            git_revision("b", &[("r9", 5)]),
        ]);
        assert_eq!(revisions.latest_revision(), Some("r9"));
    }
}
