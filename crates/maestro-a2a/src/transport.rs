//! The two alternative call paths to a remote agent.
//!
//! The primary transport speaks JSON-RPC 2.0 against the agent's base URL;
//! the fallback speaks a raw REST convention (`POST /message`, `POST /task`,
//! `GET /task/{id}`, `GET /agent`). Transport-level failures map to
//! [`MaestroError::Transport`] so the client knows when falling back is
//! warranted; a missing remote task maps to [`MaestroError::NotFound`] and is
//! surfaced as-is.

use crate::config::AgentEndpoint;
use crate::protocol::{
    AgentCard, JsonRpcResponse, RemoteTask, TaskCreated, RPC_PROTOCOL_ERRORS, RPC_TASK_NOT_FOUND,
};
use async_trait::async_trait;
use maestro_core::{MaestroError, MaestroResult};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use uuid::Uuid;

/// One call path to a remote agent.
#[async_trait]
pub trait AgentTransport: Send + Sync {
    /// Short transport name used in logs and combined error messages.
    fn name(&self) -> &'static str;

    /// Delivers one logical message and returns the raw reply.
    async fn send_message(&self, endpoint: &AgentEndpoint, payload: &Value)
        -> MaestroResult<Value>;

    /// Creates an asynchronous task on the agent.
    async fn create_task(
        &self,
        endpoint: &AgentEndpoint,
        payload: &Value,
    ) -> MaestroResult<TaskCreated>;

    /// Fetches the current state of a remote task.
    async fn fetch_task(&self, endpoint: &AgentEndpoint, task_id: &str)
        -> MaestroResult<RemoteTask>;

    /// Fetches the agent's discovery card.
    async fn fetch_card(&self, endpoint: &AgentEndpoint) -> MaestroResult<AgentCard>;
}

// --- JSON-RPC primary transport ---

/// The structured primary transport: JSON-RPC 2.0 over POST to the base URL.
pub struct JsonRpcTransport {
    client: reqwest::Client,
}

impl JsonRpcTransport {
    /// Creates the transport over a shared HTTP client.
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn call(
        &self,
        endpoint: &AgentEndpoint,
        method: &str,
        params: Value,
    ) -> MaestroResult<Value> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": Uuid::new_v4().to_string(),
            "method": method,
            "params": params,
        });

        let response = self
            .client
            .post(&endpoint.base_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                MaestroError::Transport(format!("jsonrpc request to {}: {e}", endpoint.base_url))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(MaestroError::Transport(format!(
                "jsonrpc endpoint {} returned {status}",
                endpoint.base_url
            )));
        }

        let body: JsonRpcResponse = response.json().await.map_err(|e| {
            MaestroError::Transport(format!("undecodable jsonrpc response: {e}"))
        })?;

        if let Some(error) = body.error {
            if RPC_PROTOCOL_ERRORS.contains(&error.code) {
                // The peer does not speak this protocol; let the client fall back.
                return Err(MaestroError::Transport(format!(
                    "jsonrpc protocol error {}: {}",
                    error.code, error.message
                )));
            }
            if error.code == RPC_TASK_NOT_FOUND {
                return Err(MaestroError::not_found("remote task", error.message));
            }
            return Err(MaestroError::Agent(error.message));
        }

        body.result
            .ok_or_else(|| MaestroError::Transport("jsonrpc response missing result".to_string()))
    }
}

#[async_trait]
impl AgentTransport for JsonRpcTransport {
    fn name(&self) -> &'static str {
        "jsonrpc"
    }

    async fn send_message(
        &self,
        endpoint: &AgentEndpoint,
        payload: &Value,
    ) -> MaestroResult<Value> {
        self.call(
            endpoint,
            "message/send",
            json!({ "agentId": endpoint.agent_id, "message": payload }),
        )
        .await
    }

    async fn create_task(
        &self,
        endpoint: &AgentEndpoint,
        payload: &Value,
    ) -> MaestroResult<TaskCreated> {
        let result = self
            .call(
                endpoint,
                "tasks/send",
                json!({ "agentId": endpoint.agent_id, "task": payload }),
            )
            .await?;
        decode(result)
    }

    async fn fetch_task(
        &self,
        endpoint: &AgentEndpoint,
        task_id: &str,
    ) -> MaestroResult<RemoteTask> {
        let result = self
            .call(endpoint, "tasks/get", json!({ "id": task_id }))
            .await?;
        decode(result)
    }

    async fn fetch_card(&self, endpoint: &AgentEndpoint) -> MaestroResult<AgentCard> {
        let result = self.call(endpoint, "agent/card", json!({})).await?;
        decode(result)
    }
}

// --- REST fallback transport ---

/// The raw fallback transport against the well-known REST convention.
pub struct RestTransport {
    client: reqwest::Client,
}

impl RestTransport {
    /// Creates the transport over a shared HTTP client.
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn url(endpoint: &AgentEndpoint, path: &str) -> String {
        format!("{}/{path}", endpoint.base_url.trim_end_matches('/'))
    }

    async fn read_json<T: DeserializeOwned>(
        response: reqwest::Response,
        what: &str,
    ) -> MaestroResult<T> {
        let status = response.status();
        if !status.is_success() {
            return Err(MaestroError::Transport(format!(
                "rest {what} returned {status}"
            )));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| MaestroError::Transport(format!("undecodable rest {what} response: {e}")))
    }
}

#[async_trait]
impl AgentTransport for RestTransport {
    fn name(&self) -> &'static str {
        "rest"
    }

    async fn send_message(
        &self,
        endpoint: &AgentEndpoint,
        payload: &Value,
    ) -> MaestroResult<Value> {
        let response = self
            .client
            .post(Self::url(endpoint, "message"))
            .json(payload)
            .send()
            .await
            .map_err(|e| MaestroError::Transport(format!("rest message send: {e}")))?;
        Self::read_json(response, "message").await
    }

    async fn create_task(
        &self,
        endpoint: &AgentEndpoint,
        payload: &Value,
    ) -> MaestroResult<TaskCreated> {
        let response = self
            .client
            .post(Self::url(endpoint, "task"))
            .json(payload)
            .send()
            .await
            .map_err(|e| MaestroError::Transport(format!("rest task create: {e}")))?;
        Self::read_json(response, "task create").await
    }

    async fn fetch_task(
        &self,
        endpoint: &AgentEndpoint,
        task_id: &str,
    ) -> MaestroResult<RemoteTask> {
        let response = self
            .client
            .get(Self::url(endpoint, &format!("task/{task_id}")))
            .send()
            .await
            .map_err(|e| MaestroError::Transport(format!("rest task fetch: {e}")))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(MaestroError::not_found("remote task", task_id));
        }
        Self::read_json(response, "task fetch").await
    }

    async fn fetch_card(&self, endpoint: &AgentEndpoint) -> MaestroResult<AgentCard> {
        let response = self
            .client
            .get(Self::url(endpoint, "agent"))
            .send()
            .await
            .map_err(|e| MaestroError::Transport(format!("rest card fetch: {e}")))?;
        Self::read_json(response, "card fetch").await
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> MaestroResult<T> {
    serde_json::from_value(value)
        .map_err(|e| MaestroError::Transport(format!("unexpected response shape: {e}")))
}
