//! End-to-end pipeline tests driving the engine against scripted agents:
//! the full research flow, mid-pipeline failure, fan-out ordering,
//! cooperative cancellation, and the fire-and-forget launcher.

use async_trait::async_trait;
use maestro_a2a::{AgentCaller, PollPolicy, RemoteTask, RemoteTaskState};
use maestro_core::{MaestroError, MaestroResult};
use maestro_orchestrator::{
    AgentCall, AsyncTask, ExecutionRecorder, ExecutionState, JobKind, JobPlan, JobRequest,
    Launcher, Orchestrator, PhaseSpec, StepState, TaskRegistry, TaskState,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Scripted behavior for one agent name.
#[derive(Clone)]
enum Script {
    /// `send_message` replies with this value.
    Reply(Value),
    /// `send_message` replies after a delay.
    DelayedReply(u64, Value),
    /// `send_message` fails with this message.
    Fail(String),
    /// `send_task` accepts; polls report `working` this many times, then
    /// `completed` with the result.
    RemoteTask { working_polls: u32, result: Value },
    /// `send_task` accepts; the first poll reports `failed`.
    RemoteTaskFails(String),
}

struct ScriptedAgents {
    scripts: HashMap<String, Script>,
    poll_counts: Mutex<HashMap<String, u32>>,
}

impl ScriptedAgents {
    fn new(scripts: Vec<(&str, Script)>) -> Arc<Self> {
        Arc::new(Self {
            scripts: scripts
                .into_iter()
                .map(|(name, script)| (name.to_string(), script))
                .collect(),
            poll_counts: Mutex::new(HashMap::new()),
        })
    }

    fn script(&self, agent: &str) -> MaestroResult<Script> {
        self.scripts
            .get(agent)
            .cloned()
            .ok_or_else(|| MaestroError::Config(format!("no script for agent '{agent}'")))
    }
}

#[async_trait]
impl AgentCaller for ScriptedAgents {
    async fn send_message(&self, agent: &str, _payload: Value) -> MaestroResult<Value> {
        match self.script(agent)? {
            Script::Reply(value) => Ok(value),
            Script::DelayedReply(ms, value) => {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok(value)
            }
            Script::Fail(message) => Err(MaestroError::Agent(message)),
            _ => Err(MaestroError::Config(format!(
                "agent '{agent}' is scripted for task mode"
            ))),
        }
    }

    async fn send_task(&self, agent: &str, _payload: Value) -> MaestroResult<String> {
        match self.script(agent)? {
            Script::RemoteTask { .. } | Script::RemoteTaskFails(_) => Ok(format!("rt-{agent}")),
            _ => Err(MaestroError::Config(format!(
                "agent '{agent}' is scripted for message mode"
            ))),
        }
    }

    async fn poll_task(&self, agent: &str, task_id: &str) -> MaestroResult<RemoteTask> {
        match self.script(agent)? {
            Script::RemoteTask {
                working_polls,
                result,
            } => {
                let polls_so_far = {
                    let mut counts = self.poll_counts.lock();
                    let count = counts.entry(agent.to_string()).or_insert(0);
                    *count += 1;
                    *count
                };
                if polls_so_far > working_polls {
                    Ok(RemoteTask {
                        id: task_id.to_string(),
                        status: RemoteTaskState::Completed,
                        result: Some(result),
                        error: None,
                        message: None,
                    })
                } else {
                    Ok(RemoteTask {
                        id: task_id.to_string(),
                        status: RemoteTaskState::Working,
                        result: None,
                        error: None,
                        message: None,
                    })
                }
            }
            Script::RemoteTaskFails(message) => Ok(RemoteTask {
                id: task_id.to_string(),
                status: RemoteTaskState::Failed,
                result: None,
                error: Some(message),
                message: None,
            }),
            _ => Err(MaestroError::Config(format!(
                "agent '{agent}' is scripted for message mode"
            ))),
        }
    }

    fn agent_id(&self, agent: &str) -> String {
        format!("{agent}-01")
    }
}

fn fast_poll() -> PollPolicy {
    PollPolicy {
        interval: Duration::from_millis(2),
        max_attempts: 10,
    }
}

fn engine_with(agents: Arc<ScriptedAgents>) -> Arc<Orchestrator> {
    let registry = Arc::new(TaskRegistry::new());
    let recorder = Arc::new(ExecutionRecorder::new());
    Arc::new(Orchestrator::new(registry, recorder, agents).with_poll_policy(fast_poll()))
}

/// Creates the task and execution records the way the launcher does, without
/// spawning, so tests can drive `execute` directly.
fn seed_job(engine: &Orchestrator, kind: JobKind) -> (String, String) {
    let plan = JobPlan::for_kind(kind);
    let execution_id =
        engine
            .recorder()
            .create_execution("req-test", kind, "pipeline-tests", None, None, None);
    let task = AsyncTask::new(kind, plan.phase_names(), plan.estimated_duration())
        .with_execution(execution_id.clone());
    let task_id = engine.registry().create(task);
    (task_id, execution_id)
}

#[tokio::test]
async fn test_research_job_runs_all_three_phases() {
    let agents = ScriptedAgents::new(vec![
        (
            "searcher",
            Script::RemoteTask {
                working_polls: 1,
                result: json!({ "sources": ["a", "b"] }),
            },
        ),
        (
            "analyst",
            Script::Reply(json!({
                "artifacts": [{ "name": "analysis", "data": { "claims": 2 } }]
            })),
        ),
        ("writer", Script::Reply(json!({ "message": "final report" }))),
    ]);
    let engine = engine_with(agents);
    let (task_id, execution_id) = seed_job(&engine, JobKind::Research);

    let combined = engine
        .execute(&task_id, &execution_id, json!({ "query": "rust" }))
        .await
        .unwrap();

    let task = engine.registry().get(&task_id).unwrap();
    assert_eq!(task.status, TaskState::Completed);
    assert_eq!(task.progress, 100);
    assert!(task.current_phase.is_none());
    assert!(task.completed_at.is_some());

    let execution = engine.recorder().get(&execution_id).unwrap();
    assert_eq!(execution.status, ExecutionState::Completed);
    assert_eq!(execution.steps.len(), 3);
    assert!(execution
        .steps
        .iter()
        .all(|s| s.status == StepState::Completed));
    let numbers: Vec<u32> = execution.steps.iter().map(|s| s.step_number).collect();
    assert_eq!(numbers, vec![1, 2, 3]);
    assert!(execution.total_duration_ms.is_some());

    // Envelope normalization: the analyst's artifact data, the writer's
    // message text.
    assert_eq!(execution.steps[1].output, Some(json!({ "claims": 2 })));
    assert_eq!(combined["output"], json!("final report"));
    assert_eq!(combined["summary"]["phase_count"], json!(3));
}

#[tokio::test]
async fn test_phase_failure_stops_the_pipeline() {
    let agents = ScriptedAgents::new(vec![
        (
            "searcher",
            Script::RemoteTask {
                working_polls: 0,
                result: json!({ "sources": [] }),
            },
        ),
        (
            "analyst",
            Script::Fail("analysis model unavailable".to_string()),
        ),
        ("writer", Script::Reply(json!("never reached"))),
    ]);
    let engine = engine_with(agents);
    let (task_id, execution_id) = seed_job(&engine, JobKind::Research);

    let err = engine
        .execute(&task_id, &execution_id, json!({ "query": "rust" }))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("analysis model unavailable"));

    let task = engine.registry().get(&task_id).unwrap();
    assert_eq!(task.status, TaskState::Failed);
    assert!(task
        .error
        .as_deref()
        .unwrap()
        .contains("analysis model unavailable"));
    assert!(task.progress < 100);

    // The synthesize step is never created; the failed step stays visible.
    let execution = engine.recorder().get(&execution_id).unwrap();
    assert_eq!(execution.status, ExecutionState::Failed);
    assert_eq!(execution.steps.len(), 2);
    assert_eq!(execution.steps[0].status, StepState::Completed);
    assert_eq!(execution.steps[1].status, StepState::Failed);
}

#[tokio::test]
async fn test_remote_task_failure_propagates() {
    let agents = ScriptedAgents::new(vec![
        (
            "searcher",
            Script::RemoteTaskFails("search index offline".to_string()),
        ),
        ("analyst", Script::Reply(json!({}))),
        ("writer", Script::Reply(json!({}))),
    ]);
    let engine = engine_with(agents);
    let (task_id, execution_id) = seed_job(&engine, JobKind::Research);

    engine
        .execute(&task_id, &execution_id, json!({ "query": "rust" }))
        .await
        .unwrap_err();

    let task = engine.registry().get(&task_id).unwrap();
    assert_eq!(task.status, TaskState::Failed);
    assert!(task.error.as_deref().unwrap().contains("search index offline"));

    let execution = engine.recorder().get(&execution_id).unwrap();
    assert_eq!(execution.steps.len(), 1);
    assert_eq!(execution.steps[0].status, StepState::Failed);
}

#[tokio::test]
async fn test_fan_out_steps_keep_issue_order_numbers() {
    let agents = ScriptedAgents::new(vec![
        (
            "slowpoke",
            Script::DelayedReply(40, json!("slow result")),
        ),
        (
            "quickdraw",
            Script::DelayedReply(5, json!("fast result")),
        ),
    ]);
    let engine = engine_with(agents);
    let (task_id, execution_id) = seed_job(&engine, JobKind::Research);

    // One fan-out phase; the second call finishes well before the first.
    let plan = JobPlan {
        kind: JobKind::Research,
        phases: vec![PhaseSpec::new(
            "analyze",
            vec![
                AgentCall::message("slowpoke", "analyze"),
                AgentCall::message("quickdraw", "verify"),
            ],
        )],
    };

    let combined = engine
        .execute_plan(&task_id, &execution_id, &plan, json!({}))
        .await
        .unwrap();

    let execution = engine.recorder().get(&execution_id).unwrap();
    assert_eq!(execution.steps.len(), 2);
    assert!(execution
        .steps
        .iter()
        .all(|s| s.status == StepState::Completed));

    // Numbers reflect append order, not completion order.
    let slow = execution
        .steps
        .iter()
        .find(|s| s.agent_name == "slowpoke")
        .unwrap();
    let quick = execution
        .steps
        .iter()
        .find(|s| s.agent_name == "quickdraw")
        .unwrap();
    assert_eq!(slow.step_number, 1);
    assert_eq!(quick.step_number, 2);

    // Fan-in combines outputs keyed by agent name.
    assert_eq!(
        combined["output"],
        json!({ "slowpoke": "slow result", "quickdraw": "fast result" })
    );
}

#[tokio::test]
async fn test_cancellation_is_observed_at_phase_boundaries() {
    let agents = ScriptedAgents::new(vec![
        (
            "searcher",
            Script::DelayedReply(100, json!({ "sources": ["a"] })),
        ),
        ("writer", Script::Reply(json!("never reached"))),
    ]);
    let engine = engine_with(agents);
    let (task_id, execution_id) = seed_job(&engine, JobKind::Digest);

    let plan = JobPlan::for_kind(JobKind::Digest);
    let handle = {
        let engine = Arc::clone(&engine);
        let task_id = task_id.clone();
        let execution_id = execution_id.clone();
        tokio::spawn(async move {
            engine
                .execute_plan(&task_id, &execution_id, &plan, json!({ "query": "x" }))
                .await
        })
    };

    // Cancel while the search phase is still in flight.
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(engine.registry().cancel(&task_id).unwrap());

    let result = handle.await.unwrap();
    assert!(result.is_err());

    let task = engine.registry().get(&task_id).unwrap();
    assert_eq!(task.status, TaskState::Cancelled);
    assert!(task.progress < 100);

    // The in-flight search step ran to completion; synthesize never started.
    let execution = engine.recorder().get(&execution_id).unwrap();
    assert_eq!(execution.status, ExecutionState::Partial);
    assert_eq!(execution.steps.len(), 1);
    assert_eq!(execution.steps[0].agent_name, "searcher");
}

#[tokio::test]
async fn test_progress_only_ever_increases_while_polling() {
    let agents = ScriptedAgents::new(vec![
        ("searcher", Script::DelayedReply(15, json!(["a"]))),
        ("writer", Script::DelayedReply(15, json!("summary"))),
    ]);
    let engine = engine_with(agents);
    let (task_id, execution_id) = seed_job(&engine, JobKind::Digest);

    let handle = {
        let engine = Arc::clone(&engine);
        let task_id = task_id.clone();
        let execution_id = execution_id.clone();
        tokio::spawn(async move { engine.execute(&task_id, &execution_id, json!({})).await })
    };

    let mut observed = Vec::new();
    loop {
        let task = engine.registry().get(&task_id).unwrap();
        observed.push(task.progress);
        if task.is_terminal() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    handle.await.unwrap().unwrap();

    assert!(observed.windows(2).all(|w| w[0] <= w[1]), "{observed:?}");
    assert_eq!(*observed.last().unwrap(), 100);
}

#[tokio::test]
async fn test_launcher_returns_immediately_and_job_completes() {
    let agents = ScriptedAgents::new(vec![
        ("searcher", Script::Reply(json!(["a", "b"]))),
        ("writer", Script::Reply(json!("digest text"))),
    ]);
    let engine = engine_with(agents);
    let launcher = Launcher::new(Arc::clone(&engine));

    let receipt = launcher.launch(JobRequest::new(
        JobKind::Digest,
        "req-9",
        json!({ "query": "x" }),
        "gateway",
    ));

    // The task is visible immediately, whatever state the pipeline is in.
    let task = engine.registry().get(&receipt.task_id).unwrap();
    assert_eq!(task.metadata.get("request_id"), Some(&json!("req-9")));
    assert_eq!(task.execution_id.as_deref(), Some(receipt.execution_id.as_str()));

    let task = wait_terminal(&engine, &receipt.task_id).await;
    assert_eq!(task.status, TaskState::Completed);

    let execution = engine.recorder().get(&receipt.execution_id).unwrap();
    assert_eq!(execution.status, ExecutionState::Completed);
    assert_eq!(execution.trace_id, receipt.trace_id);
}

#[tokio::test]
async fn test_launcher_caps_concurrent_pipelines() {
    let agents = ScriptedAgents::new(vec![
        ("searcher", Script::DelayedReply(150, json!(["a"]))),
        ("writer", Script::Reply(json!("digest"))),
    ]);
    let engine = engine_with(agents);
    let launcher = Launcher::new(Arc::clone(&engine)).with_max_concurrent(1);

    let first = launcher.launch(JobRequest::new(
        JobKind::Digest,
        "req-a",
        json!({}),
        "gateway",
    ));
    let second = launcher.launch(JobRequest::new(
        JobKind::Digest,
        "req-b",
        json!({}),
        "gateway",
    ));

    // With one permit, only one pipeline may be past `initiated`.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let states = [
        engine.registry().get(&first.task_id).unwrap().status,
        engine.registry().get(&second.task_id).unwrap().status,
    ];
    assert!(states.contains(&TaskState::Working), "{states:?}");
    assert!(states.contains(&TaskState::Initiated), "{states:?}");

    // Both eventually finish once the permit frees.
    assert_eq!(
        wait_terminal(&engine, &first.task_id).await.status,
        TaskState::Completed
    );
    assert_eq!(
        wait_terminal(&engine, &second.task_id).await.status,
        TaskState::Completed
    );
}

async fn wait_terminal(engine: &Orchestrator, task_id: &str) -> AsyncTask {
    for _ in 0..400 {
        let task = engine.registry().get(task_id).unwrap();
        if task.is_terminal() {
            return task;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("task {task_id} never reached a terminal state");
}
