//! Job plans: the phase sequence and dispatch strategy for each job kind.
//!
//! A phase holds one or more agent calls. A single call is a sequential
//! dependency-chain hop; multiple calls fan out concurrently and fan back in
//! before the next phase. Plans for the built-in kinds are fixed; the engine
//! also accepts a custom plan for dynamically resolved phase sets.

use crate::types::JobKind;
use serde::{Deserialize, Serialize};

/// How a call is delivered to its agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// One message; the client resolves the asynchronous contract internally.
    Message,
    /// Explicit task creation plus a status poll loop in the engine.
    Task,
}

/// One remote call within a phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentCall {
    /// Agent name, resolved through the endpoint directory.
    pub agent: String,
    /// Name of the remote operation.
    pub operation: String,
    /// Delivery strategy.
    pub mode: DispatchMode,
}

impl AgentCall {
    /// A message-mode call.
    pub fn message(agent: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            operation: operation.into(),
            mode: DispatchMode::Message,
        }
    }

    /// A task-mode call (create, then poll).
    pub fn task(agent: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            operation: operation.into(),
            mode: DispatchMode::Task,
        }
    }
}

/// One stage of a composite job's pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseSpec {
    /// Phase name, surfaced as the task's `current_phase`.
    pub name: String,
    /// The calls this phase dispatches.
    pub calls: Vec<AgentCall>,
}

impl PhaseSpec {
    /// Creates a phase from its calls.
    pub fn new(name: impl Into<String>, calls: Vec<AgentCall>) -> Self {
        Self {
            name: name.into(),
            calls,
        }
    }

    /// Whether this phase fans out to multiple agents.
    pub fn is_fan_out(&self) -> bool {
        self.calls.len() > 1
    }
}

/// The resolved phase sequence for one job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobPlan {
    /// The job kind this plan executes.
    pub kind: JobKind,
    /// Phases in execution order.
    pub phases: Vec<PhaseSpec>,
}

impl JobPlan {
    /// The fixed plan for a built-in job kind.
    pub fn for_kind(kind: JobKind) -> Self {
        let phases = match kind {
            JobKind::Research => vec![
                PhaseSpec::new("search", vec![AgentCall::task("searcher", "search")]),
                PhaseSpec::new("analyze", vec![AgentCall::message("analyst", "analyze")]),
                PhaseSpec::new("synthesize", vec![AgentCall::message("writer", "synthesize")]),
            ],
            JobKind::Digest => vec![
                PhaseSpec::new("search", vec![AgentCall::message("searcher", "search")]),
                PhaseSpec::new("synthesize", vec![AgentCall::message("writer", "summarize")]),
            ],
        };
        Self { kind, phases }
    }

    /// Phase names in order, for the task record.
    pub fn phase_names(&self) -> Vec<String> {
        self.phases.iter().map(|p| p.name.clone()).collect()
    }

    /// Advisory duration hint shown to pollers.
    pub fn estimated_duration(&self) -> &'static str {
        match self.kind {
            JobKind::Research => "2-4 minutes",
            JobKind::Digest => "about 1 minute",
        }
    }
}

/// Progress checkpoint entering phase `index` of `total`. Starts at 10 and
/// climbs linearly; the last stretch to 95 and the final 100 are set at
/// pipeline completion.
pub fn checkpoint(index: usize, total: usize) -> u8 {
    if total == 0 {
        return 10;
    }
    (10 + (85 * index) / total) as u8
}

/// Progress value once every phase has finished, before finalization.
pub const PROGRESS_ALL_PHASES_DONE: u8 = 95;
