//! The phase-pipeline engine.
//!
//! Executes the phases of one composite job in order, threading each phase's
//! output into the next phase's input, keeping the task registry and the
//! execution recorder in sync with real progress. A phase with one call is a
//! sequential hop; a phase with several calls fans out concurrently and
//! combines the outputs before advancing. Any unrecoverable error finalizes
//! the job as failed and stops the pipeline; steps already recorded stay
//! visible to pollers.

use crate::plan::{checkpoint, AgentCall, DispatchMode, JobPlan, PhaseSpec, PROGRESS_ALL_PHASES_DONE};
use crate::recorder::ExecutionRecorder;
use crate::registry::TaskRegistry;
use crate::types::{StepUpdate, TaskState};
use futures_util::future::join_all;
use maestro_a2a::{AgentCaller, PollPolicy, RemoteTaskState};
use maestro_core::{envelope, MaestroError, MaestroResult};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info, info_span, Instrument};

/// The orchestration engine for one process.
///
/// Holds the shared registries and the remote-agent seam; each job is driven
/// by exactly one `execute` call, so every registry record stays
/// single-writer.
pub struct Orchestrator {
    registry: Arc<TaskRegistry>,
    recorder: Arc<ExecutionRecorder>,
    agents: Arc<dyn AgentCaller>,
    poll: PollPolicy,
}

impl Orchestrator {
    /// Creates an engine over the given registries and agent seam.
    pub fn new(
        registry: Arc<TaskRegistry>,
        recorder: Arc<ExecutionRecorder>,
        agents: Arc<dyn AgentCaller>,
    ) -> Self {
        Self {
            registry,
            recorder,
            agents,
            poll: PollPolicy::default(),
        }
    }

    /// Overrides the poll budget used for task-mode dispatches.
    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    /// The task registry this engine reports progress into.
    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    /// The execution recorder this engine writes the audit trail into.
    pub fn recorder(&self) -> &Arc<ExecutionRecorder> {
        &self.recorder
    }

    /// Runs the fixed plan for the task's job kind.
    pub async fn execute(
        &self,
        task_id: &str,
        execution_id: &str,
        request: Value,
    ) -> MaestroResult<Value> {
        let task = self
            .registry
            .get(task_id)
            .ok_or_else(|| MaestroError::not_found("task", task_id))?;
        let plan = JobPlan::for_kind(task.kind);
        self.execute_plan(task_id, execution_id, &plan, request).await
    }

    /// Runs an explicit plan, for dynamically resolved phase sets.
    pub async fn execute_plan(
        &self,
        task_id: &str,
        execution_id: &str,
        plan: &JobPlan,
        request: Value,
    ) -> MaestroResult<Value> {
        let span = info_span!("pipeline", task_id = %task_id, execution_id = %execution_id);
        self.run_pipeline(task_id, execution_id, plan, request)
            .instrument(span)
            .await
    }

    async fn run_pipeline(
        &self,
        task_id: &str,
        execution_id: &str,
        plan: &JobPlan,
        request: Value,
    ) -> MaestroResult<Value> {
        let execution = self
            .recorder
            .get(execution_id)
            .ok_or_else(|| MaestroError::not_found("execution", execution_id))?;
        let trace_id = execution.trace_id;
        let total = plan.phases.len();

        info!(kind = %plan.kind, phases = total, "pipeline starting");

        let mut input = request;
        let mut phase_log: Vec<Value> = Vec::with_capacity(total);

        for (index, phase) in plan.phases.iter().enumerate() {
            if self.cancelled(task_id) {
                info!(phase = %phase.name, "cancellation observed, stopping pipeline");
                self.finalize_cancelled(execution_id);
                return Err(MaestroError::Orchestrator(
                    "job cancelled by caller".to_string(),
                ));
            }

            self.registry
                .set_phase(task_id, &phase.name, checkpoint(index, total))?;
            info!(phase = %phase.name, fan_out = phase.is_fan_out(), "phase starting");

            let outcome = self
                .run_phase(execution_id, phase, &input, &trace_id)
                .instrument(info_span!("phase", name = %phase.name))
                .await;

            let output = match outcome {
                Ok(output) => output,
                Err(e) => {
                    let message = e.to_string();
                    error!(phase = %phase.name, error = %message, "phase failed, stopping pipeline");
                    self.finalize_failed(task_id, execution_id, &message);
                    return Err(e);
                }
            };

            phase_log.push(json!({
                "name": phase.name,
                "input": input,
                "output": output.clone(),
            }));
            input = output;
        }

        self.registry
            .set_progress(task_id, PROGRESS_ALL_PHASES_DONE)?;

        let combined = assemble_result(plan, &phase_log);
        self.registry.complete(task_id, combined.clone())?;
        self.recorder
            .complete_execution(execution_id, Some(combined.clone()), None)?;

        info!(phases = total, "pipeline complete");
        Ok(combined)
    }

    /// Runs one phase: a single sequential call, or a concurrent fan-out
    /// whose outputs are combined keyed by agent name.
    async fn run_phase(
        &self,
        execution_id: &str,
        phase: &PhaseSpec,
        input: &Value,
        trace_id: &str,
    ) -> MaestroResult<Value> {
        if let [call] = phase.calls.as_slice() {
            return self.dispatch(execution_id, call, input, trace_id).await;
        }

        let results = join_all(
            phase
                .calls
                .iter()
                .map(|call| self.dispatch(execution_id, call, input, trace_id)),
        )
        .await;

        let mut combined = serde_json::Map::new();
        for (call, result) in phase.calls.iter().zip(results) {
            combined.insert(call.agent.clone(), result?);
        }
        Ok(Value::Object(combined))
    }

    /// Dispatches one remote call, recording its step through the full
    /// lifecycle and normalizing the reply envelope.
    async fn dispatch(
        &self,
        execution_id: &str,
        call: &AgentCall,
        input: &Value,
        trace_id: &str,
    ) -> MaestroResult<Value> {
        let payload = json!({ "operation": call.operation, "input": input });
        let step_id = self.recorder.add_step(
            execution_id,
            self.agents.agent_id(&call.agent),
            call.agent.clone(),
            call.operation.clone(),
            payload.clone(),
            Some(trace_id.to_string()),
        )?;
        self.recorder
            .update_step(execution_id, &step_id, StepUpdate::in_progress())?;

        let outcome = match call.mode {
            DispatchMode::Message => self.agents.send_message(&call.agent, payload).await,
            DispatchMode::Task => self.run_remote_task(&call.agent, payload).await,
        };

        match outcome {
            Ok(reply) => {
                let output = envelope::normalize(reply);
                self.recorder.update_step(
                    execution_id,
                    &step_id,
                    StepUpdate::completed(output.clone()),
                )?;
                Ok(output)
            }
            Err(e) => {
                let message = e.to_string();
                if let Err(record_err) =
                    self.recorder
                        .update_step(execution_id, &step_id, StepUpdate::failed(message))
                {
                    error!(step_id = %step_id, error = %record_err, "failed to record step failure");
                }
                Err(e)
            }
        }
    }

    /// Task-mode dispatch: explicit creation plus a bounded status poll loop.
    async fn run_remote_task(&self, agent: &str, payload: Value) -> MaestroResult<Value> {
        let remote_id = self.agents.send_task(agent, payload).await?;

        for attempt in 1..=self.poll.max_attempts {
            let task = self.agents.poll_task(agent, &remote_id).await?;
            match task.status {
                RemoteTaskState::Completed => return Ok(task.into_payload()),
                RemoteTaskState::Failed => {
                    return Err(MaestroError::Agent(task.error.unwrap_or_else(|| {
                        format!("remote task {remote_id} on agent '{agent}' failed")
                    })));
                }
                RemoteTaskState::Cancelled => {
                    return Err(MaestroError::Agent(format!(
                        "remote task {remote_id} on agent '{agent}' was cancelled"
                    )));
                }
                RemoteTaskState::InputRequired => {
                    return Err(MaestroError::Agent(format!(
                        "remote task {remote_id} on agent '{agent}' requires additional input"
                    )));
                }
                RemoteTaskState::Submitted | RemoteTaskState::Working => {
                    if attempt < self.poll.max_attempts {
                        tokio::time::sleep(self.poll.interval).await;
                    }
                }
            }
        }

        Err(MaestroError::Transport(format!(
            "remote task {remote_id} on agent '{agent}' still working after {} polls",
            self.poll.max_attempts
        )))
    }

    fn cancelled(&self, task_id: &str) -> bool {
        self.registry
            .get(task_id)
            .is_some_and(|task| task.status == TaskState::Cancelled)
    }

    /// Finalizes both records after a phase failure. Bookkeeping errors are
    /// logged, never allowed to mask the pipeline error.
    fn finalize_failed(&self, task_id: &str, execution_id: &str, message: &str) {
        if let Err(e) = self.registry.fail(task_id, message) {
            error!(task_id = %task_id, error = %e, "failed to mark task failed");
        }
        if let Err(e) = self
            .recorder
            .complete_execution(execution_id, None, Some(message.to_string()))
        {
            error!(execution_id = %execution_id, error = %e, "failed to finalize execution");
        }
    }

    fn finalize_cancelled(&self, execution_id: &str) {
        if let Err(e) = self
            .recorder
            .mark_partial(execution_id, "job cancelled by caller")
        {
            error!(execution_id = %execution_id, error = %e, "failed to finalize cancelled execution");
        }
    }
}

/// Combined result: every phase's input and output, the final output, and a
/// derived summary.
fn assemble_result(plan: &JobPlan, phase_log: &[Value]) -> Value {
    let agents: Vec<&str> = plan
        .phases
        .iter()
        .flat_map(|p| p.calls.iter().map(|c| c.agent.as_str()))
        .collect();
    let output = phase_log
        .last()
        .and_then(|entry| entry.get("output"))
        .cloned()
        .unwrap_or(Value::Null);

    json!({
        "kind": plan.kind,
        "output": output,
        "phases": phase_log,
        "summary": {
            "phase_count": plan.phases.len(),
            "agents": agents,
        },
    })
}
