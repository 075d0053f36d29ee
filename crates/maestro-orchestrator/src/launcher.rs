//! Fire-and-forget job launching.
//!
//! The launcher creates the caller-visible task and the audit execution,
//! then runs the pipeline on a detached tokio task, so the caller's
//! request/response cycle never blocks on pipeline completion. A semaphore
//! caps how many pipelines run at once; jobs past the cap stay `initiated`
//! until a permit frees.

use crate::engine::Orchestrator;
use crate::plan::JobPlan;
use crate::types::{AsyncTask, JobKind};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{info, warn};
use uuid::Uuid;

/// Default cap on concurrently running pipelines.
const DEFAULT_MAX_CONCURRENT: usize = 8;

/// A request to run one composite job.
#[derive(Debug, Clone)]
pub struct JobRequest {
    /// Kind of job to run.
    pub kind: JobKind,
    /// Correlation id of the originating external request.
    pub request_id: String,
    /// Opaque job payload, threaded into the first phase.
    pub payload: Value,
    /// Who started the run.
    pub initiator: String,
    /// Extra metadata recorded on the task.
    pub metadata: HashMap<String, Value>,
    /// Requested output size, if any.
    pub size_hint: Option<String>,
    /// Intended audience, if any.
    pub audience_hint: Option<String>,
}

impl JobRequest {
    /// Creates a request with no hints or extra metadata.
    pub fn new(
        kind: JobKind,
        request_id: impl Into<String>,
        payload: Value,
        initiator: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            request_id: request_id.into(),
            payload,
            initiator: initiator.into(),
            metadata: HashMap::new(),
            size_hint: None,
            audience_hint: None,
        }
    }
}

/// Identifiers handed back to the caller at launch time; everything else is
/// observed by polling the registries.
#[derive(Debug, Clone)]
pub struct LaunchReceipt {
    /// Id to poll the task registry by.
    pub task_id: String,
    /// Id to poll the execution recorder by.
    pub execution_id: String,
    /// Trace correlation id for the run.
    pub trace_id: String,
}

/// Fire-and-forget entry point over an [`Orchestrator`].
pub struct Launcher {
    engine: Arc<Orchestrator>,
    permits: Arc<Semaphore>,
}

impl Launcher {
    /// Creates a launcher with the default concurrency cap.
    pub fn new(engine: Arc<Orchestrator>) -> Self {
        Self {
            engine,
            permits: Arc::new(Semaphore::new(DEFAULT_MAX_CONCURRENT)),
        }
    }

    /// Overrides the cap on concurrently running pipelines.
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.permits = Arc::new(Semaphore::new(max));
        self
    }

    /// Creates the task and execution records and schedules the pipeline.
    ///
    /// Returns immediately; the pipeline runs detached and reports through
    /// the registries.
    pub fn launch(&self, request: JobRequest) -> LaunchReceipt {
        let plan = JobPlan::for_kind(request.kind);
        let trace_id = Uuid::new_v4().to_string();

        let execution_id = self.engine.recorder().create_execution(
            request.request_id.clone(),
            request.kind,
            request.initiator.clone(),
            Some(trace_id.clone()),
            request.size_hint.clone(),
            request.audience_hint.clone(),
        );

        let mut task = AsyncTask::new(request.kind, plan.phase_names(), plan.estimated_duration())
            .with_execution(execution_id.clone());
        task.metadata = request.metadata;
        task.metadata
            .insert("request_id".to_string(), json!(request.request_id));
        let task_id = self.engine.registry().create(task);

        info!(
            task_id = %task_id,
            execution_id = %execution_id,
            kind = %request.kind,
            "job launched"
        );

        let engine = Arc::clone(&self.engine);
        let permits = Arc::clone(&self.permits);
        let payload = request.payload;
        let spawned_task_id = task_id.clone();
        let spawned_execution_id = execution_id.clone();

        tokio::spawn(async move {
            // Holds the job at `initiated` until a pipeline slot frees.
            let _permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return, // semaphore closed: process shutting down
            };
            if let Err(e) = engine
                .execute(&spawned_task_id, &spawned_execution_id, payload)
                .await
            {
                warn!(task_id = %spawned_task_id, error = %e, "pipeline ended with error");
            }
        });

        LaunchReceipt {
            task_id,
            execution_id,
            trace_id,
        }
    }
}
