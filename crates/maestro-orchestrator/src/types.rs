//! Shared orchestration types: the caller-visible task, the audit-trail
//! execution record, and the steps inside it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// Kind of composite job the orchestrator can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Full research pipeline: search, analyze, synthesize.
    Research,
    /// Short-form digest: search, then summarize.
    Digest,
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobKind::Research => write!(f, "research"),
            JobKind::Digest => write!(f, "digest"),
        }
    }
}

/// Caller-visible lifecycle state of a composite job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Created, pipeline not yet running.
    Initiated,
    /// Pipeline in progress.
    Working,
    /// Finished successfully; `result` is set.
    Completed,
    /// Finished with an error; `error` is set.
    Failed,
    /// Cancelled by the caller while working.
    Cancelled,
}

impl TaskState {
    /// Whether the task will never change state again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// A caller-visible handle to one composite job.
///
/// Mutated only by the orchestrator driving it; immutable once terminal;
/// retained for the process lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsyncTask {
    /// Unique task id.
    pub id: String,
    /// What kind of job this is.
    pub kind: JobKind,
    /// Current lifecycle state.
    pub status: TaskState,
    /// 0–100, non-decreasing while working, exactly 100 iff completed.
    pub progress: u8,
    /// Name of the phase in progress, while working.
    pub current_phase: Option<String>,
    /// Ordered phase names, fixed at creation.
    pub phases: Vec<String>,
    /// Final payload, present iff completed.
    pub result: Option<Value>,
    /// Failure message, present iff failed.
    pub error: Option<String>,
    /// Creation time.
    pub started_at: DateTime<Utc>,
    /// Terminal-transition time.
    pub completed_at: Option<DateTime<Utc>>,
    /// Advisory duration hint shown to pollers.
    pub estimated_duration: String,
    /// Opaque bag: original request parameters, correlation ids.
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
    /// Weak back-reference to the audit execution, lookup-only.
    pub execution_id: Option<String>,
}

impl AsyncTask {
    /// Creates a new task in [`TaskState::Initiated`] with a generated id.
    pub fn new(kind: JobKind, phases: Vec<String>, estimated_duration: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            status: TaskState::Initiated,
            progress: 0,
            current_phase: None,
            phases,
            result: None,
            error: None,
            started_at: Utc::now(),
            completed_at: None,
            estimated_duration: estimated_duration.into(),
            metadata: HashMap::new(),
            execution_id: None,
        }
    }

    /// Attaches the audit execution this task was decomposed into.
    pub fn with_execution(mut self, execution_id: impl Into<String>) -> Self {
        self.execution_id = Some(execution_id.into());
        self
    }

    /// Whether the task will never change state again.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Lifecycle state of a workflow execution record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    /// Created, no steps yet.
    Pending,
    /// At least one step dispatched.
    InProgress,
    /// Finalized successfully.
    Completed,
    /// Finalized with an error and no completed steps.
    Failed,
    /// Finalized after cancellation with at least one completed step.
    Partial,
}

impl ExecutionState {
    /// Whether the execution has been finalized.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Partial)
    }
}

/// Lifecycle state of one dispatched step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    /// Appended, dispatch not yet started.
    Pending,
    /// Remote call in flight.
    InProgress,
    /// Remote call succeeded; `output` is set.
    Completed,
    /// Remote call failed; `error` is set.
    Failed,
}

impl StepState {
    /// Whether the step will never be mutated again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// One dispatched unit of work within an execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStep {
    /// Unique step id.
    pub id: String,
    /// 1-based position, assigned at append time, gap-free.
    pub step_number: u32,
    /// Logical id of the remote agent.
    pub agent_id: String,
    /// Name the agent was resolved under.
    pub agent_name: String,
    /// Name of the remote call.
    pub operation: String,
    /// What was sent.
    pub input: Value,
    /// What came back, set on completion.
    pub output: Option<Value>,
    /// Current step state.
    pub status: StepState,
    /// Append time.
    pub started_at: DateTime<Utc>,
    /// Completion time, set at most once.
    pub completed_at: Option<DateTime<Utc>>,
    /// Wall-clock duration, computed once on first completion.
    pub duration_ms: Option<u64>,
    /// Failure message.
    pub error: Option<String>,
    /// Trace correlation id.
    pub trace_id: Option<String>,
}

/// Initiator and sizing hints recorded on an execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionMetadata {
    /// Who started the run (service name, user id).
    pub initiator: String,
    /// Requested output size, if the caller hinted one.
    pub size_hint: Option<String>,
    /// Intended audience, if the caller hinted one.
    pub audience_hint: Option<String>,
}

/// The audit record of one orchestration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowExecution {
    /// Unique execution id.
    pub id: String,
    /// Correlates to the originating external request.
    pub request_id: String,
    /// Job kind being executed.
    pub kind: JobKind,
    /// Current execution state.
    pub status: ExecutionState,
    /// Dispatched steps, append-only.
    pub steps: Vec<WorkflowStep>,
    /// Initiator and hints.
    pub metadata: ExecutionMetadata,
    /// Final payload; mutually exclusive with `error`.
    pub result: Option<Value>,
    /// Failure message; mutually exclusive with `result`.
    pub error: Option<String>,
    /// Trace correlation id for the whole run.
    pub trace_id: String,
    /// Creation time.
    pub started_at: DateTime<Utc>,
    /// Finalization time.
    pub completed_at: Option<DateTime<Utc>>,
    /// Total wall-clock duration, computed at finalization.
    pub total_duration_ms: Option<u64>,
}

/// A partial update merged into a step by the recorder.
#[derive(Debug, Clone, Default)]
pub struct StepUpdate {
    /// New step state, if transitioning.
    pub status: Option<StepState>,
    /// Output payload to attach.
    pub output: Option<Value>,
    /// Error message to attach.
    pub error: Option<String>,
}

impl StepUpdate {
    /// Marks the step's remote call as in flight.
    pub fn in_progress() -> Self {
        Self {
            status: Some(StepState::InProgress),
            ..Self::default()
        }
    }

    /// Marks the step completed with its output.
    pub fn completed(output: Value) -> Self {
        Self {
            status: Some(StepState::Completed),
            output: Some(output),
            error: None,
        }
    }

    /// Marks the step failed with an error message.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: Some(StepState::Failed),
            output: None,
            error: Some(error.into()),
        }
    }
}
