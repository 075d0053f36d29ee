//! Task orchestration engine for multi-agent pipelines.
//!
//! Drives a multi-phase composite job across remote worker agents, tracking
//! in-flight work in an in-memory task registry, recording a structured
//! audit trail of every dispatched step, and reporting live progress to
//! polling callers. The caller fires a job and forgets it; everything after
//! that is observed by reading the registries by id.
//!
//! # Main types
//!
//! - [`Orchestrator`] — The phase-pipeline engine.
//! - [`Launcher`] — Fire-and-forget entry point with a concurrency cap.
//! - [`TaskRegistry`] — Caller-visible job state, keyed by task id.
//! - [`ExecutionRecorder`] — Append-only audit trail of dispatched steps.
//! - [`JobPlan`] — Phase sequence resolved from a [`JobKind`].

/// The phase-pipeline engine.
pub mod engine;
/// Fire-and-forget job launching with a concurrency cap.
pub mod launcher;
/// Job plans: phase sequences and dispatch strategies per job kind.
pub mod plan;
/// The workflow execution recorder (audit trail).
pub mod recorder;
/// The caller-visible task registry.
pub mod registry;
/// Storage seams and their in-memory implementations.
pub mod store;
/// Shared orchestration types (tasks, executions, steps).
pub mod types;

pub use engine::Orchestrator;
pub use launcher::{JobRequest, LaunchReceipt, Launcher};
pub use plan::{AgentCall, DispatchMode, JobPlan, PhaseSpec};
pub use recorder::ExecutionRecorder;
pub use registry::TaskRegistry;
pub use store::{ExecutionStore, MemoryExecutionStore, MemoryTaskStore, TaskStore};
pub use types::{
    AsyncTask, ExecutionMetadata, ExecutionState, JobKind, StepState, StepUpdate, TaskState,
    WorkflowExecution, WorkflowStep,
};
