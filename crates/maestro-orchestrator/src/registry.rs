//! The caller-visible task registry.
//!
//! Each record is single-writer (the orchestrator instance driving that job
//! id); status-polling readers never mutate. Once a task reaches a terminal
//! state it is immutable: late updates are logged and dropped rather than
//! applied.

use crate::store::{MemoryTaskStore, TaskStore};
use crate::types::{AsyncTask, TaskState};
use chrono::Utc;
use maestro_core::MaestroResult;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// In-memory registry of caller-visible composite jobs.
pub struct TaskRegistry {
    store: Arc<dyn TaskStore>,
}

impl TaskRegistry {
    /// Creates a registry over the in-memory store.
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryTaskStore::new()))
    }

    /// Creates a registry over a custom store.
    pub fn with_store(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }

    /// Registers a new task and returns its id.
    pub fn create(&self, task: AsyncTask) -> String {
        let id = task.id.clone();
        debug!(task_id = %id, kind = %task.kind, "task created");
        self.store.insert(task);
        id
    }

    /// Returns a snapshot of the task, if present.
    pub fn get(&self, id: &str) -> Option<AsyncTask> {
        self.store.get(id)
    }

    /// Applies a mutation to a live task.
    ///
    /// Fails with `NotFound` for unknown ids. Updates to a terminal task are
    /// dropped with a warning: terminal records never change again.
    pub fn update(&self, id: &str, mutate: impl FnOnce(&mut AsyncTask)) -> MaestroResult<()> {
        let mut mutate = Some(mutate);
        self.store.update(id, &mut |task| {
            if task.status.is_terminal() {
                warn!(task_id = %task.id, status = ?task.status, "ignoring update to terminal task");
                return;
            }
            if let Some(mutate) = mutate.take() {
                mutate(task);
            }
        })
    }

    /// Enters a phase: sets `working`, the phase name, and advances progress
    /// to the checkpoint. Progress never decreases and stays below 100 until
    /// completion.
    pub fn set_phase(&self, id: &str, phase: &str, checkpoint: u8) -> MaestroResult<()> {
        self.update(id, |task| {
            task.status = TaskState::Working;
            task.current_phase = Some(phase.to_string());
            task.progress = task.progress.max(checkpoint.min(99));
        })
    }

    /// Advances progress to `value` without changing phase. Monotonic, capped
    /// at 99 while working.
    pub fn set_progress(&self, id: &str, value: u8) -> MaestroResult<()> {
        self.update(id, |task| {
            task.progress = task.progress.max(value.min(99));
        })
    }

    /// Finalizes the task as completed with its result; progress becomes
    /// exactly 100.
    pub fn complete(&self, id: &str, result: Value) -> MaestroResult<()> {
        self.update(id, |task| {
            task.status = TaskState::Completed;
            task.progress = 100;
            task.current_phase = None;
            task.result = Some(result);
            task.completed_at = Some(Utc::now());
        })
    }

    /// Finalizes the task as failed with an error message.
    pub fn fail(&self, id: &str, error: impl Into<String>) -> MaestroResult<()> {
        let error = error.into();
        self.update(id, |task| {
            task.status = TaskState::Failed;
            task.current_phase = None;
            task.error = Some(error);
            task.completed_at = Some(Utc::now());
        })
    }

    /// Cooperative cancel: flips to `cancelled` only if currently working.
    /// Returns whether the flip happened. The engine observes the flag at
    /// phase boundaries.
    pub fn cancel(&self, id: &str) -> MaestroResult<bool> {
        let mut flipped = false;
        self.store.update(id, &mut |task| {
            if task.status == TaskState::Working {
                task.status = TaskState::Cancelled;
                task.completed_at = Some(Utc::now());
                flipped = true;
            }
        })?;
        if flipped {
            debug!(task_id = %id, "task cancelled");
        }
        Ok(flipped)
    }

    /// Number of registered tasks (terminal ones included; nothing is ever
    /// deleted).
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Whether no task has been registered yet.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::types::JobKind;
    use serde_json::json;

    fn research_task() -> AsyncTask {
        AsyncTask::new(
            JobKind::Research,
            vec!["search".into(), "analyze".into(), "synthesize".into()],
            "2-4 minutes",
        )
    }

    #[test]
    fn test_create_and_get() {
        let registry = TaskRegistry::new();
        let id = registry.create(research_task());
        let task = registry.get(&id).unwrap();
        assert_eq!(task.status, TaskState::Initiated);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_update_unknown_id_is_not_found() {
        let registry = TaskRegistry::new();
        let err = registry.update("ghost", |_| {}).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_progress_is_monotonic() {
        let registry = TaskRegistry::new();
        let id = registry.create(research_task());

        registry.set_phase(&id, "search", 10).unwrap();
        registry.set_phase(&id, "analyze", 38).unwrap();
        // A lower checkpoint never rolls progress back.
        registry.set_phase(&id, "analyze", 20).unwrap();

        let task = registry.get(&id).unwrap();
        assert_eq!(task.progress, 38);
        assert_eq!(task.current_phase.as_deref(), Some("analyze"));
        assert_eq!(task.status, TaskState::Working);
    }

    #[test]
    fn test_progress_stays_below_100_until_completed() {
        let registry = TaskRegistry::new();
        let id = registry.create(research_task());

        registry.set_progress(&id, 100).unwrap();
        assert_eq!(registry.get(&id).unwrap().progress, 99);

        registry.complete(&id, json!({ "report": "done" })).unwrap();
        let task = registry.get(&id).unwrap();
        assert_eq!(task.progress, 100);
        assert_eq!(task.status, TaskState::Completed);
        assert!(task.result.is_some());
        assert!(task.completed_at.is_some());
    }

    #[test]
    fn test_terminal_task_is_immutable() {
        let registry = TaskRegistry::new();
        let id = registry.create(research_task());
        registry.fail(&id, "analysis model unavailable").unwrap();

        let before = registry.get(&id).unwrap();

        // None of these may take effect.
        registry.complete(&id, json!({ "late": true })).unwrap();
        registry.set_phase(&id, "synthesize", 90).unwrap();
        registry.set_progress(&id, 99).unwrap();

        let after = registry.get(&id).unwrap();
        assert_eq!(after.status, TaskState::Failed);
        assert_eq!(after.progress, before.progress);
        assert_eq!(after.error, before.error);
        assert!(after.result.is_none());
        assert_eq!(after.completed_at, before.completed_at);
    }

    #[test]
    fn test_cancel_only_flips_working_tasks() {
        let registry = TaskRegistry::new();
        let id = registry.create(research_task());

        // Not yet working: no flip.
        assert!(!registry.cancel(&id).unwrap());
        assert_eq!(registry.get(&id).unwrap().status, TaskState::Initiated);

        registry.set_phase(&id, "search", 10).unwrap();
        assert!(registry.cancel(&id).unwrap());
        assert_eq!(registry.get(&id).unwrap().status, TaskState::Cancelled);

        // Already terminal: no flip.
        assert!(!registry.cancel(&id).unwrap());
    }

    #[test]
    fn test_cancel_unknown_id_is_not_found() {
        let registry = TaskRegistry::new();
        assert!(registry.cancel("ghost").unwrap_err().is_not_found());
    }

    #[test]
    fn test_failed_task_keeps_partial_progress() {
        let registry = TaskRegistry::new();
        let id = registry.create(research_task());
        registry.set_phase(&id, "analyze", 38).unwrap();
        registry.fail(&id, "remote failure").unwrap();

        let task = registry.get(&id).unwrap();
        assert_eq!(task.progress, 38);
        assert_eq!(task.error.as_deref(), Some("remote failure"));
    }
}
