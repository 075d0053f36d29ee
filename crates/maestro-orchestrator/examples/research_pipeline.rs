//! Runs one research job against live agents configured through the
//! environment and polls it to completion.
//!
//! Configure at least the three research agents, then run:
//!
//! ```sh
//! export MAESTRO_AGENT_SEARCHER_URL=http://localhost:8301
//! export MAESTRO_AGENT_ANALYST_URL=http://localhost:8302
//! export MAESTRO_AGENT_WRITER_URL=http://localhost:8303
//! cargo run --example research_pipeline -- "rust async runtimes"
//! ```

use maestro_a2a::{AgentClient, AgentDirectory};
use maestro_orchestrator::{
    ExecutionRecorder, JobKind, JobRequest, Launcher, Orchestrator, TaskRegistry,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let directory = AgentDirectory::from_env();
    if directory.is_empty() {
        eprintln!("no agents configured; set MAESTRO_AGENT_<NAME>_URL variables");
        return;
    }

    let agents = Arc::new(AgentClient::new(directory));
    let registry = Arc::new(TaskRegistry::new());
    let recorder = Arc::new(ExecutionRecorder::new());
    let engine = Arc::new(Orchestrator::new(
        Arc::clone(&registry),
        Arc::clone(&recorder),
        agents,
    ));
    let launcher = Launcher::new(engine);

    let query = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "rust async runtimes".to_string());
    let receipt = launcher.launch(JobRequest::new(
        JobKind::Research,
        "example-1",
        json!({ "query": query }),
        "research_pipeline example",
    ));
    println!(
        "launched task {} (execution {})",
        receipt.task_id, receipt.execution_id
    );

    loop {
        let Some(task) = registry.get(&receipt.task_id) else {
            break;
        };
        println!(
            "[{:>3}%] {:?} phase={}",
            task.progress,
            task.status,
            task.current_phase.as_deref().unwrap_or("-")
        );
        if task.is_terminal() {
            if let Some(result) = task.result {
                println!("{result:#}");
            } else if let Some(error) = task.error {
                eprintln!("job failed: {error}");
            }
            if let Some(execution) = recorder.get(&receipt.execution_id) {
                for step in &execution.steps {
                    println!(
                        "step {} {} {} -> {:?} ({} ms)",
                        step.step_number,
                        step.agent_name,
                        step.operation,
                        step.status,
                        step.duration_ms.unwrap_or(0)
                    );
                }
            }
            break;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
}
