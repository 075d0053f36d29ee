//! Normalization of heterogeneous remote-agent replies.
//!
//! Remote agents are independently deployed services whose reply shape is not
//! guaranteed at the type level. A reply may carry its payload as a list of
//! structured artifacts, as a free-text status message, or as a bare value.
//! [`ResultEnvelope`] makes the three shapes explicit so downstream code
//! unwraps them in a fixed order instead of probing fields ad hoc.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One artifact entry inside an artifact-style reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactPart {
    /// Optional artifact name assigned by the producing agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// The artifact payload.
    pub data: Value,
}

/// The reply shapes a remote agent may produce, in unwrap priority order.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultEnvelope {
    /// A structured artifacts list; the `data` payloads are the result.
    Artifacts(Vec<ArtifactPart>),
    /// No structured result, but a free-text status message.
    StatusMessage(String),
    /// Neither shape matched; the raw reply is used as-is.
    Raw(Value),
}

impl ResultEnvelope {
    /// Classifies a raw reply into its envelope shape.
    ///
    /// Priority: an `artifacts` array whose entries carry `data` payloads,
    /// then a free-text `message` field, then the raw value.
    pub fn classify(reply: Value) -> Self {
        if let Some(items) = reply.get("artifacts").and_then(Value::as_array) {
            let parts: Vec<ArtifactPart> = items
                .iter()
                .filter(|item| item.get("data").is_some())
                .map(|item| ArtifactPart {
                    name: item
                        .get("name")
                        .and_then(Value::as_str)
                        .map(ToString::to_string),
                    data: item.get("data").cloned().unwrap_or(Value::Null),
                })
                .collect();
            if !parts.is_empty() {
                return Self::Artifacts(parts);
            }
        }

        if let Some(message) = reply.get("message").and_then(Value::as_str) {
            return Self::StatusMessage(message.to_string());
        }

        Self::Raw(reply)
    }

    /// Unwraps the envelope into the payload the pipeline threads forward.
    ///
    /// A single artifact yields its `data` directly; multiple artifacts yield
    /// an array of their payloads.
    pub fn into_payload(self) -> Value {
        match self {
            Self::Artifacts(mut parts) => {
                if parts.len() == 1 {
                    parts.remove(0).data
                } else {
                    Value::Array(parts.into_iter().map(|p| p.data).collect())
                }
            }
            Self::StatusMessage(message) => Value::String(message),
            Self::Raw(value) => value,
        }
    }
}

/// Classifies and unwraps a reply in one step.
pub fn normalize(reply: Value) -> Value {
    ResultEnvelope::classify(reply).into_payload()
}
