//! The workflow execution recorder: an append-only audit trail of how each
//! composite job was decomposed into dispatched remote calls.
//!
//! Step numbers are assigned under the store lock, so they stay gap-free
//! even when parallel fan-out calls append concurrently. Completion stamps
//! (`completed_at`, `duration_ms`) are written at most once per step, and a
//! finalized execution is never finalized again.

use crate::store::{ExecutionStore, MemoryExecutionStore};
use crate::types::{
    ExecutionMetadata, ExecutionState, JobKind, StepState, StepUpdate, WorkflowExecution,
    WorkflowStep,
};
use chrono::Utc;
use maestro_core::{MaestroError, MaestroResult};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Records workflow executions and their steps.
pub struct ExecutionRecorder {
    store: Arc<dyn ExecutionStore>,
}

impl ExecutionRecorder {
    /// Creates a recorder over the in-memory store.
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryExecutionStore::new()))
    }

    /// Creates a recorder over a custom store.
    pub fn with_store(store: Arc<dyn ExecutionStore>) -> Self {
        Self { store }
    }

    /// Creates a new execution in `pending` with no steps, returning its id.
    ///
    /// When no trace id is supplied, a fresh one is generated so every run is
    /// correlatable.
    pub fn create_execution(
        &self,
        request_id: impl Into<String>,
        kind: JobKind,
        initiator: impl Into<String>,
        trace_id: Option<String>,
        size_hint: Option<String>,
        audience_hint: Option<String>,
    ) -> String {
        let execution = WorkflowExecution {
            id: uuid::Uuid::new_v4().to_string(),
            request_id: request_id.into(),
            kind,
            status: ExecutionState::Pending,
            steps: Vec::new(),
            metadata: ExecutionMetadata {
                initiator: initiator.into(),
                size_hint,
                audience_hint,
            },
            result: None,
            error: None,
            trace_id: trace_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            started_at: Utc::now(),
            completed_at: None,
            total_duration_ms: None,
        };
        let id = execution.id.clone();
        debug!(execution_id = %id, kind = %kind, "execution created");
        self.store.insert(execution);
        id
    }

    /// Appends a pending step and returns its id.
    ///
    /// The step number is `steps.len() + 1` at append time, assigned under
    /// the store lock. As a side effect, a `pending` execution moves to
    /// `in_progress`.
    pub fn add_step(
        &self,
        execution_id: &str,
        agent_id: impl Into<String>,
        agent_name: impl Into<String>,
        operation: impl Into<String>,
        input: Value,
        trace_id: Option<String>,
    ) -> MaestroResult<String> {
        let step_id = uuid::Uuid::new_v4().to_string();
        let mut pending = Some(WorkflowStep {
            id: step_id.clone(),
            step_number: 0, // assigned under the lock below
            agent_id: agent_id.into(),
            agent_name: agent_name.into(),
            operation: operation.into(),
            input,
            output: None,
            status: StepState::Pending,
            started_at: Utc::now(),
            completed_at: None,
            duration_ms: None,
            error: None,
            trace_id,
        });

        self.store.update(execution_id, &mut |execution| {
            if let Some(mut step) = pending.take() {
                step.step_number = (execution.steps.len() + 1) as u32;
                if execution.status == ExecutionState::Pending {
                    execution.status = ExecutionState::InProgress;
                }
                execution.steps.push(step);
            }
        })?;

        debug!(execution_id = %execution_id, step_id = %step_id, "step appended");
        Ok(step_id)
    }

    /// Merges a partial update into a step.
    ///
    /// Fails with `NotFound` when either id is unknown. On the first
    /// transition to `completed`, stamps `completed_at` and computes
    /// `duration_ms`; repeating the completion is a no-op. A terminal step is
    /// never mutated again.
    pub fn update_step(
        &self,
        execution_id: &str,
        step_id: &str,
        update: StepUpdate,
    ) -> MaestroResult<()> {
        let mut update = Some(update);
        let mut step_missing = false;

        self.store.update(execution_id, &mut |execution| {
            let Some(step) = execution.steps.iter_mut().find(|s| s.id == step_id) else {
                step_missing = true;
                return;
            };
            let Some(update) = update.take() else {
                return;
            };
            if step.status.is_terminal() {
                warn!(step_id = %step.id, status = ?step.status, "ignoring update to terminal step");
                return;
            }

            if let Some(output) = update.output {
                step.output = Some(output);
            }
            if let Some(error) = update.error {
                step.error = Some(error);
            }
            if let Some(status) = update.status {
                step.status = status;
                if status == StepState::Completed && step.completed_at.is_none() {
                    let now = Utc::now();
                    step.completed_at = Some(now);
                    step.duration_ms =
                        Some((now - step.started_at).num_milliseconds().max(0) as u64);
                }
            }
        })?;

        if step_missing {
            return Err(MaestroError::not_found("step", step_id));
        }
        Ok(())
    }

    /// Finalizes the execution exactly once: stamps `completed_at` and
    /// `total_duration_ms`, then sets `failed` iff an error is given, else
    /// `completed` with the result. A second finalize is a no-op with a
    /// warning.
    pub fn complete_execution(
        &self,
        execution_id: &str,
        result: Option<Value>,
        error: Option<String>,
    ) -> MaestroResult<()> {
        let mut outcome = Some((result, error));
        self.store.update(execution_id, &mut |execution| {
            if execution.status.is_terminal() {
                warn!(execution_id = %execution.id, "ignoring repeated finalization");
                return;
            }
            let Some((result, error)) = outcome.take() else {
                return;
            };
            let now = Utc::now();
            execution.completed_at = Some(now);
            execution.total_duration_ms =
                Some((now - execution.started_at).num_milliseconds().max(0) as u64);
            match error {
                Some(error) => {
                    execution.status = ExecutionState::Failed;
                    execution.error = Some(error);
                }
                None => {
                    execution.status = ExecutionState::Completed;
                    execution.result = result;
                }
            }
        })
    }

    /// Finalizes a cancelled run: `partial` when at least one step completed,
    /// `failed` otherwise. Already-finalized executions are left alone.
    pub fn mark_partial(&self, execution_id: &str, error: impl Into<String>) -> MaestroResult<()> {
        let error = error.into();
        self.store.update(execution_id, &mut |execution| {
            if execution.status.is_terminal() {
                warn!(execution_id = %execution.id, "ignoring repeated finalization");
                return;
            }
            let now = Utc::now();
            execution.completed_at = Some(now);
            execution.total_duration_ms =
                Some((now - execution.started_at).num_milliseconds().max(0) as u64);
            execution.error = Some(error.clone());
            execution.status = if execution
                .steps
                .iter()
                .any(|s| s.status == StepState::Completed)
            {
                ExecutionState::Partial
            } else {
                ExecutionState::Failed
            };
        })
    }

    /// Returns a snapshot of the execution with its steps, if present.
    pub fn get(&self, execution_id: &str) -> Option<WorkflowExecution> {
        self.store.get(execution_id)
    }
}

impl Default for ExecutionRecorder {
    fn default() -> Self {
        Self::new()
    }
}
