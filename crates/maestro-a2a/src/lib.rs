//! Remote-agent client for the Maestro orchestration engine.
//!
//! Each remote agent is an independently deployed worker service reachable
//! over request/response HTTP, with no push notifications. This crate
//! delivers one logical message or task-creation request to a named agent
//! and obtains its result, abstracting over transport failures: a structured
//! JSON-RPC transport is tried first, and any transport-level failure falls
//! back to a raw REST convention against the same base URL. The caller only
//! sees an error when both transports fail.
//!
//! # Main types
//!
//! - [`AgentClient`] — The client: send messages, create tasks, poll status,
//!   discover agent cards.
//! - [`AgentDirectory`] — Static name → endpoint resolution, env-driven.
//! - [`AgentCaller`] — The seam trait the orchestration engine drives, so
//!   engine tests can substitute scripted agents.
//! - [`PollPolicy`] — Bounded interval/attempt budget for waiting on an
//!   asynchronous remote task.

/// Agent name → endpoint resolution.
pub mod config;
/// Wire types shared by both transports.
pub mod protocol;
/// The JSON-RPC primary and REST fallback transports.
pub mod transport;
/// The client and the `AgentCaller` seam.
pub mod client;

pub use client::{AgentCaller, AgentClient, PollPolicy};
pub use config::{AgentDirectory, AgentEndpoint};
pub use protocol::{AgentCard, AgentSkill, RemoteTask, RemoteTaskState, TaskCreated};
pub use transport::{AgentTransport, JsonRpcTransport, RestTransport};
