//! Core types and error definitions for the Maestro orchestration engine.
//!
//! This crate provides the foundational types shared across all Maestro
//! crates: the unified error enum and the result envelope used to normalize
//! heterogeneous remote-agent replies.
//!
//! # Main types
//!
//! - [`MaestroError`] — Unified error enum for all Maestro subsystems.
//! - [`MaestroResult`] — Convenience alias for `Result<T, MaestroError>`.
//! - [`ResultEnvelope`] — Tagged union over the reply shapes remote agents
//!   are known to produce.

/// Result envelope classification for remote-agent replies.
pub mod envelope;

pub use envelope::{ArtifactPart, ResultEnvelope};

use thiserror::Error;

/// Top-level error type for the Maestro engine.
///
/// Each variant corresponds to a subsystem that can produce errors.
#[derive(Debug, Error)]
pub enum MaestroError {
    /// A network-level failure talking to a remote agent: connection error,
    /// non-success status, or an undecodable response body.
    #[error("Transport error: {0}")]
    Transport(String),

    /// An explicit failure reported by a remote agent (the call itself
    /// succeeded at the transport level).
    #[error("Agent error: {0}")]
    Agent(String),

    /// A lookup against a registry or a remote task store missed.
    #[error("{resource} not found: {id}")]
    NotFound {
        /// What kind of record was looked up ("task", "execution", "step", ...).
        resource: &'static str,
        /// The identifier that missed.
        id: String,
    },

    /// An error in endpoint or engine configuration.
    #[error("Config error: {0}")]
    Config(String),

    /// An error raised by the phase pipeline itself.
    #[error("Orchestrator error: {0}")]
    Orchestrator(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MaestroError {
    /// Creates a [`MaestroError::NotFound`] for the given resource kind and id.
    pub fn not_found(resource: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource,
            id: id.into(),
        }
    }

    /// Returns `true` for lookup misses ([`MaestroError::NotFound`]).
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// A convenience `Result` alias using [`MaestroError`].
pub type MaestroResult<T> = Result<T, MaestroError>;
