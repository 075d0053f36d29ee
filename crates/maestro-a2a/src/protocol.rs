//! Wire types shared by the JSON-RPC and REST transports.
//!
//! Remote agents follow the camelCase JSON convention on the wire. These
//! types are deliberately tolerant: optional fields default, and unknown
//! fields are ignored, because agents are heterogeneous external services.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle state of a task on the remote agent's side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RemoteTaskState {
    /// Accepted, not yet started.
    Submitted,
    /// In progress.
    Working,
    /// Paused waiting for additional input from the caller.
    InputRequired,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
    /// Cancelled on the remote side.
    Cancelled,
}

impl RemoteTaskState {
    /// Whether polling can stop: the remote task will not change state again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// A task record as reported by a remote agent's status endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteTask {
    /// Remote task identifier.
    #[serde(alias = "taskId")]
    pub id: String,
    /// Current remote state.
    pub status: RemoteTaskState,
    /// Result payload, present when terminal and successful.
    #[serde(default)]
    pub result: Option<Value>,
    /// Error message, present when terminal and failed.
    #[serde(default)]
    pub error: Option<String>,
    /// Free-text status message some agents report instead of a result.
    #[serde(default)]
    pub message: Option<String>,
}

impl RemoteTask {
    /// Extracts the best available payload from a terminal task: the result,
    /// else the status message, else a minimal projection of the task itself.
    pub fn into_payload(self) -> Value {
        if let Some(result) = self.result {
            return result;
        }
        if let Some(message) = self.message {
            return Value::String(message);
        }
        serde_json::json!({ "id": self.id, "status": self.status })
    }
}

/// Acknowledgement returned when a remote task is created.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCreated {
    /// Identifier to poll the task by.
    pub task_id: String,
    /// State at creation time (normally `submitted` or `working`).
    pub status: RemoteTaskState,
}

/// One advertised capability of a remote agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSkill {
    /// Stable skill identifier.
    pub id: String,
    /// Human-readable skill name.
    pub name: String,
    /// What the skill does.
    #[serde(default)]
    pub description: String,
}

/// Discovery metadata for a remote agent. Best-effort: the orchestrator
/// never hard-depends on a card being available.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCard {
    /// Agent display name.
    pub name: String,
    /// What the agent does.
    #[serde(default)]
    pub description: String,
    /// Agent software version, if advertised.
    #[serde(default)]
    pub version: Option<String>,
    /// Advertised skills.
    #[serde(default)]
    pub skills: Vec<AgentSkill>,
}

/// A JSON-RPC 2.0 response envelope.
#[derive(Debug, Deserialize)]
pub(crate) struct JsonRpcResponse {
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Deserialize)]
pub(crate) struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

/// JSON-RPC codes that mean "the peer does not speak this protocol" and so
/// justify falling back to the raw transport.
pub(crate) const RPC_PROTOCOL_ERRORS: [i64; 3] = [-32700, -32600, -32601];
/// JSON-RPC code a remote agent uses for an unknown task id.
pub(crate) const RPC_TASK_NOT_FOUND: i64 = -32001;

/// Detects the asynchronous contract in a message reply: the agent accepted
/// the message but is still working, and handed back a task id to poll.
pub fn working_task(reply: &Value) -> Option<String> {
    let status = reply.get("status").and_then(Value::as_str)?;
    if status != "working" && status != "submitted" {
        return None;
    }
    reply
        .get("taskId")
        .or_else(|| reply.get("task_id"))
        .and_then(Value::as_str)
        .map(ToString::to_string)
}
