//! Per-pipeline queue of pending and most recently scheduled build causes.

use conveyor_core::build_cause::BuildCause;
use conveyor_core::ids::PipelineName;
use conveyor_core::ports::PipelineHistoryStore;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error};

#[derive(Debug, Default)]
struct QueueEntry {
    pending: Option<BuildCause>,
    most_recent: Option<BuildCause>,
}

impl QueueEntry {
    fn is_empty(&self) -> bool {
        self.pending.is_none() && self.most_recent.is_none()
    }
}

/// Pending build causes and the most recently scheduled cause, per pipeline.
///
/// Every operation touching a pipeline holds that pipeline's map entry for
/// its whole read-check-write, so `finish_schedule` behaves as a
/// compare-and-swap against concurrent `schedule` calls. Unrelated pipelines
/// do not contend.
///
/// The most recently scheduled cause is a cache over the history store: it
/// is seeded from the store on first read and can be dropped with
/// [`SchedulingQueue::reconcile`].
pub struct SchedulingQueue {
    entries: DashMap<PipelineName, QueueEntry>,
    history: Arc<dyn PipelineHistoryStore>,
}

impl SchedulingQueue {
    pub fn new(history: Arc<dyn PipelineHistoryStore>) -> Self {
        Self {
            entries: DashMap::new(),
            history,
        }
    }

    /// Record `cause` as pending, replacing any pending cause for the pipeline.
    pub fn schedule(&self, pipeline: &PipelineName, cause: BuildCause) {
        debug!(pipeline = %pipeline, cause = %cause.describe(), "Build cause queued");
        self.entries.entry(pipeline.clone()).or_default().pending = Some(cause);
    }

    /// Snapshot of all pending causes, ordered by pipeline name.
    pub fn to_be_scheduled(&self) -> BTreeMap<PipelineName, BuildCause> {
        self.entries
            .iter()
            .filter_map(|entry| {
                entry
                    .pending
                    .as_ref()
                    .map(|cause| (entry.key().clone(), cause.clone()))
            })
            .collect()
    }

    pub fn pending(&self, pipeline: &PipelineName) -> Option<BuildCause> {
        self.entries.get(pipeline).and_then(|e| e.pending.clone())
    }

    /// The last committed cause, or [`BuildCause::never_run`].
    pub fn most_recent_scheduled(&self, pipeline: &PipelineName) -> BuildCause {
        if let Some(cause) = self.entries.get(pipeline).and_then(|e| e.most_recent.clone()) {
            return cause;
        }

        let seeded = match self.history.most_recent_run(pipeline) {
            Ok(Some(run)) => run.build_cause,
            Ok(None) => return BuildCause::never_run(),
            Err(e) => {
                error!(pipeline = %pipeline, error = %e, "Failed to load most recent run");
                return BuildCause::never_run();
            }
        };

        // A commit that raced with the store lookup wins over the seeded value.
        self.entries
            .entry(pipeline.clone())
            .or_default()
            .most_recent
            .get_or_insert(seeded)
            .clone()
    }

    /// A pending cause that actually carries modifications.
    pub fn has_build_cause(&self, pipeline: &PipelineName) -> bool {
        self.entries
            .get(pipeline)
            .and_then(|e| e.pending.as_ref().map(BuildCause::has_modifications))
            .unwrap_or(false)
    }

    pub fn has_forced_build_cause(&self, pipeline: &PipelineName) -> bool {
        self.entries
            .get(pipeline)
            .and_then(|e| e.pending.as_ref().map(BuildCause::is_forced))
            .unwrap_or(false)
    }

    /// Commit a scheduling attempt.
    ///
    /// `resulting` becomes the most recently scheduled cause. The pending
    /// cause is removed only if it is still `consumed`; a cause scheduled in
    /// the meantime stays pending for the next pass. Returns whether the
    /// pending cause was consumed.
    pub fn finish_schedule(
        &self,
        pipeline: &PipelineName,
        consumed: &BuildCause,
        resulting: &BuildCause,
    ) -> bool {
        let mut entry = self.entries.entry(pipeline.clone()).or_default();
        let consumed_pending = entry.pending.as_ref() == Some(consumed);
        if consumed_pending {
            entry.pending = None;
        } else {
            debug!(pipeline = %pipeline, "Pending build cause changed while scheduling");
        }
        entry.most_recent = Some(resulting.clone());
        consumed_pending
    }

    /// Remove `cause` from pending if it is still the pending cause.
    pub fn discard_if_pending(&self, pipeline: &PipelineName, cause: &BuildCause) -> bool {
        match self.entries.get_mut(pipeline) {
            Some(mut entry) if entry.pending.as_ref() == Some(cause) => {
                entry.pending = None;
                true
            }
            _ => false,
        }
    }

    /// Forget everything about a pipeline (it was deleted from configuration).
    pub fn clear_pipeline(&self, pipeline: &PipelineName) {
        self.entries.remove(pipeline);
    }

    /// Drop the cached most recent cause so the next read reloads it from
    /// the history store.
    pub fn reconcile(&self, pipeline: &PipelineName) {
        let now_empty = match self.entries.get_mut(pipeline) {
            Some(mut entry) => {
                entry.most_recent = None;
                entry.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.entries.remove_if(pipeline, |_, entry| entry.is_empty());
        }
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}
