//! Why a pipeline run is triggered.

use crate::material::MaterialRevisions;
use crate::variables::EnvironmentVariables;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Approver recorded for runs triggered by material changes.
pub const CHANGES_APPROVER: &str = "changes";

/// Approver recorded for runs triggered by a timer.
pub const TIMER_APPROVER: &str = "timer";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    NeverRun,
    Modification,
    Manual,
    Timer,
}

impl TriggerKind {
    fn label(&self) -> &'static str {
        match self {
            TriggerKind::NeverRun => "NeverRunBuildCause",
            TriggerKind::Modification => "ModificationBuildCause",
            TriggerKind::Manual => "ManualBuildCause",
            TriggerKind::Timer => "TimerBuildCause",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct BuildTrigger {
    pub kind: TriggerKind,
    pub message: String,
    pub forced: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct BuildCause {
    material_revisions: MaterialRevisions,
    approver: String,
    trigger: BuildTrigger,
    #[serde(default)]
    overridden_variables: EnvironmentVariables,
}

impl BuildCause {
    /// Sentinel for a pipeline that has never been scheduled.
    pub fn never_run() -> Self {
        Self {
            material_revisions: MaterialRevisions::empty(),
            approver: String::new(),
            trigger: BuildTrigger {
                kind: TriggerKind::NeverRun,
                message: "never run".to_string(),
                forced: false,
            },
            overridden_variables: EnvironmentVariables::new(),
        }
    }

    pub fn with_modifications(revisions: MaterialRevisions, approver: impl Into<String>) -> Self {
        let message = match revisions.latest_modification() {
            Some(m) => match &m.author {
                Some(author) => format!("modified by {author}"),
                None => format!("triggered by {}", m.revision),
            },
            None => "no modifications".to_string(),
        };
        Self {
            material_revisions: revisions,
            approver: approver.into(),
            trigger: BuildTrigger {
                kind: TriggerKind::Modification,
                message,
                forced: false,
            },
            overridden_variables: EnvironmentVariables::new(),
        }
    }

    pub fn with_empty_modifications() -> Self {
        Self::with_modifications(MaterialRevisions::empty(), CHANGES_APPROVER)
    }

    pub fn manual_forced(revisions: MaterialRevisions, user: impl Into<String>) -> Self {
        let user = user.into();
        Self {
            material_revisions: revisions,
            trigger: BuildTrigger {
                kind: TriggerKind::Manual,
                message: format!("Forced by {user}"),
                forced: true,
            },
            approver: user,
            overridden_variables: EnvironmentVariables::new(),
        }
    }

    pub fn timer(revisions: MaterialRevisions) -> Self {
        Self {
            material_revisions: revisions,
            approver: TIMER_APPROVER.to_string(),
            trigger: BuildTrigger {
                kind: TriggerKind::Timer,
                message: "Timer triggered".to_string(),
                forced: true,
            },
            overridden_variables: EnvironmentVariables::new(),
        }
    }

    /// Replace the trigger message (e.g. a note supplied with a manual trigger).
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.trigger.message = message.into();
        self
    }

    pub fn add_overridden_variables(&mut self, variables: &EnvironmentVariables) {
        self.overridden_variables.apply(variables);
    }

    pub fn material_revisions(&self) -> &MaterialRevisions {
        &self.material_revisions
    }

    pub fn approver(&self) -> &str {
        &self.approver
    }

    pub fn trigger(&self) -> &BuildTrigger {
        &self.trigger
    }

    pub fn overridden_variables(&self) -> &EnvironmentVariables {
        &self.overridden_variables
    }

    pub fn is_forced(&self) -> bool {
        self.trigger.forced
    }

    pub fn has_never_run(&self) -> bool {
        self.trigger.kind == TriggerKind::NeverRun
    }

    pub fn has_modifications(&self) -> bool {
        self.material_revisions.has_modifications()
    }

    /// Two causes are the same when they carry the same material revisions.
    pub fn is_same_as(&self, other: &BuildCause) -> bool {
        self.material_revisions.is_same_as(&other.material_revisions)
    }

    pub fn describe(&self) -> String {
        format!("[{}: {}]", self.trigger.kind.label(), self.trigger.message)
    }
}
