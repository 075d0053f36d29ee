//! The remote-agent client: primary transport with automatic fallback, plus
//! the bounded poll helper that turns an asynchronous remote task into a
//! synchronous result.

use crate::config::{AgentDirectory, AgentEndpoint};
use crate::protocol::{self, AgentCard, RemoteTask, RemoteTaskState};
use crate::transport::{AgentTransport, JsonRpcTransport, RestTransport};
use async_trait::async_trait;
use maestro_core::{MaestroError, MaestroResult};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Budget for waiting on an asynchronous remote task.
///
/// Every poll loop in the engine is bounded by one of these; exhausting the
/// budget is a transport timeout error, never an endless wait.
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    /// Delay between consecutive status fetches.
    pub interval: Duration,
    /// Maximum number of status fetches before giving up.
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_attempts: 120,
        }
    }
}

/// The seam the orchestration engine drives.
///
/// [`AgentClient`] is the production implementation; engine tests substitute
/// scripted agents.
#[async_trait]
pub trait AgentCaller: Send + Sync {
    /// Delivers a message and waits for its terminal result.
    async fn send_message(&self, agent: &str, payload: Value) -> MaestroResult<Value>;

    /// Creates a remote task and returns its id without waiting.
    async fn send_task(&self, agent: &str, payload: Value) -> MaestroResult<String>;

    /// Fetches the current state of a remote task once, with no retry.
    async fn poll_task(&self, agent: &str, task_id: &str) -> MaestroResult<RemoteTask>;

    /// The logical agent id recorded in audit steps for this agent name.
    fn agent_id(&self, agent: &str) -> String;
}

/// Client for named remote agents with primary/fallback transports.
pub struct AgentClient {
    directory: AgentDirectory,
    primary: Box<dyn AgentTransport>,
    fallback: Box<dyn AgentTransport>,
    poll: PollPolicy,
}

impl AgentClient {
    /// Creates a client with the JSON-RPC primary and REST fallback
    /// transports over one shared HTTP client.
    pub fn new(directory: AgentDirectory) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            directory,
            primary: Box::new(JsonRpcTransport::new(client.clone())),
            fallback: Box::new(RestTransport::new(client)),
            poll: PollPolicy::default(),
        }
    }

    /// Overrides the poll budget for asynchronous remote tasks.
    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    /// The configured agent directory.
    pub fn directory(&self) -> &AgentDirectory {
        &self.directory
    }

    /// Runs the primary call and, on a transport-level failure only, the
    /// fallback. A lookup miss or an explicit agent error surfaces directly:
    /// retrying those on another transport cannot change the answer.
    async fn with_fallback<T, P, F>(
        &self,
        agent: &str,
        what: &'static str,
        primary: P,
        fallback: F,
    ) -> MaestroResult<T>
    where
        P: Future<Output = MaestroResult<T>> + Send,
        F: Future<Output = MaestroResult<T>> + Send,
    {
        match primary.await {
            Ok(value) => Ok(value),
            Err(MaestroError::Transport(primary_err)) => {
                warn!(
                    agent = %agent,
                    what,
                    error = %primary_err,
                    "primary transport failed, falling back"
                );
                match fallback.await {
                    Ok(value) => Ok(value),
                    Err(MaestroError::Transport(fallback_err)) => {
                        Err(MaestroError::Transport(format!(
                            "{what} to agent '{agent}' failed on both transports: \
                             {}: {primary_err}; {}: {fallback_err}",
                            self.primary.name(),
                            self.fallback.name(),
                        )))
                    }
                    Err(other) => Err(other),
                }
            }
            Err(other) => Err(other),
        }
    }

    /// Sends one logical message to a named agent and returns its terminal
    /// result.
    ///
    /// If the agent accepts the message but reports it is still working, the
    /// reply carries a task id and this call enters the bounded poll loop
    /// until the remote task reaches a terminal state.
    pub async fn send_message(&self, agent: &str, payload: Value) -> MaestroResult<Value> {
        let endpoint = self.directory.resolve(agent)?.clone();

        let reply = self
            .with_fallback(
                agent,
                "message",
                self.primary.send_message(&endpoint, &payload),
                self.fallback.send_message(&endpoint, &payload),
            )
            .await?;

        if let Some(task_id) = protocol::working_task(&reply) {
            debug!(agent = %agent, task_id = %task_id, "message accepted as async task, polling");
            return self.wait_for_task(agent, &endpoint, &task_id).await;
        }

        Ok(reply)
    }

    /// Creates a remote task and returns its id immediately.
    pub async fn send_task(&self, agent: &str, payload: Value) -> MaestroResult<String> {
        let endpoint = self.directory.resolve(agent)?.clone();

        let created = self
            .with_fallback(
                agent,
                "task create",
                self.primary.create_task(&endpoint, &payload),
                self.fallback.create_task(&endpoint, &payload),
            )
            .await?;

        info!(agent = %agent, task_id = %created.task_id, "remote task created");
        Ok(created.task_id)
    }

    /// Fetches the current state of a remote task once. Transport errors and
    /// unknown task ids surface directly; retry policy belongs to the caller.
    pub async fn poll_task_status(&self, agent: &str, task_id: &str) -> MaestroResult<RemoteTask> {
        let endpoint = self.directory.resolve(agent)?.clone();

        self.with_fallback(
            agent,
            "task poll",
            self.primary.fetch_task(&endpoint, task_id),
            self.fallback.fetch_task(&endpoint, task_id),
        )
        .await
    }

    /// Fetches the agent's discovery card. Best-effort: an unknown agent name
    /// or a failure of both transports yields `None`, never an error.
    pub async fn agent_card(&self, agent: &str) -> Option<AgentCard> {
        let endpoint = match self.directory.resolve(agent) {
            Ok(endpoint) => endpoint.clone(),
            Err(e) => {
                warn!(agent = %agent, error = %e, "agent card unavailable");
                return None;
            }
        };

        match self
            .with_fallback(
                agent,
                "card fetch",
                self.primary.fetch_card(&endpoint),
                self.fallback.fetch_card(&endpoint),
            )
            .await
        {
            Ok(card) => Some(card),
            Err(e) => {
                warn!(agent = %agent, error = %e, "agent card unavailable");
                None
            }
        }
    }

    /// Polls a remote task until terminal, within the configured budget.
    async fn wait_for_task(
        &self,
        agent: &str,
        endpoint: &AgentEndpoint,
        task_id: &str,
    ) -> MaestroResult<Value> {
        for attempt in 1..=self.poll.max_attempts {
            let task = self
                .with_fallback(
                    agent,
                    "task poll",
                    self.primary.fetch_task(endpoint, task_id),
                    self.fallback.fetch_task(endpoint, task_id),
                )
                .await?;

            match task.status {
                RemoteTaskState::Completed => {
                    debug!(agent = %agent, task_id = %task_id, attempt, "remote task completed");
                    return Ok(task.into_payload());
                }
                RemoteTaskState::Failed => {
                    return Err(MaestroError::Agent(task.error.unwrap_or_else(|| {
                        format!("remote task {task_id} on agent '{agent}' failed")
                    })));
                }
                RemoteTaskState::Cancelled => {
                    return Err(MaestroError::Agent(format!(
                        "remote task {task_id} on agent '{agent}' was cancelled"
                    )));
                }
                RemoteTaskState::InputRequired => {
                    return Err(MaestroError::Agent(format!(
                        "remote task {task_id} on agent '{agent}' requires additional input"
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
            "remote task {task_id} on agent '{agent}' still working after {} polls",
            self.poll.max_attempts
        )))
    }
}

#[async_trait]
impl AgentCaller for AgentClient {
    async fn send_message(&self, agent: &str, payload: Value) -> MaestroResult<Value> {
        AgentClient::send_message(self, agent, payload).await
    }

    async fn send_task(&self, agent: &str, payload: Value) -> MaestroResult<String> {
        AgentClient::send_task(self, agent, payload).await
    }

    async fn poll_task(&self, agent: &str, task_id: &str) -> MaestroResult<RemoteTask> {
        self.poll_task_status(agent, task_id).await
    }

    fn agent_id(&self, agent: &str) -> String {
        self.directory
            .resolve(agent)
            .map(|endpoint| endpoint.agent_id.clone())
            .unwrap_or_else(|_| agent.to_string())
    }
}
