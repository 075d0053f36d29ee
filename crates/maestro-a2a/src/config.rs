//! Static resolution of agent names to transport addresses.
//!
//! The mapping is external configuration, not orchestration logic: each
//! logical agent name resolves to a base URL and a logical agent id, provided
//! either programmatically or through the environment.

use maestro_core::{MaestroError, MaestroResult};
use std::collections::HashMap;

/// Environment variable prefix for agent endpoint configuration.
///
/// `MAESTRO_AGENT_SEARCHER_URL=http://search:8301` registers an agent named
/// `searcher`; an optional `MAESTRO_AGENT_SEARCHER_ID` overrides the logical
/// agent id (which otherwise defaults to the name).
const ENV_PREFIX: &str = "MAESTRO_AGENT_";
const ENV_URL_SUFFIX: &str = "_URL";
const ENV_ID_SUFFIX: &str = "_ID";

/// The transport address of one remote agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentEndpoint {
    /// Base URL of the agent service (no trailing path).
    pub base_url: String,
    /// Logical agent id, as known to the remote side.
    pub agent_id: String,
}

/// Name → endpoint directory for all known remote agents.
#[derive(Debug, Clone, Default)]
pub struct AgentDirectory {
    agents: HashMap<String, AgentEndpoint>,
}

impl AgentDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an agent under the given name, replacing any previous entry.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        base_url: impl Into<String>,
        agent_id: impl Into<String>,
    ) -> &mut Self {
        self.agents.insert(
            name.into(),
            AgentEndpoint {
                base_url: base_url.into(),
                agent_id: agent_id.into(),
            },
        );
        self
    }

    /// Builder-style [`insert`](Self::insert) where the agent id equals the name.
    pub fn with_agent(mut self, name: impl Into<String>, base_url: impl Into<String>) -> Self {
        let name = name.into();
        let agent_id = name.clone();
        self.insert(name, base_url, agent_id);
        self
    }

    /// Builds a directory from `MAESTRO_AGENT_<NAME>_URL` / `_ID` variables.
    ///
    /// Names are lowercased; the id defaults to the name when no `_ID`
    /// variable is set.
    pub fn from_env() -> Self {
        let mut directory = Self::new();
        for (key, base_url) in std::env::vars() {
            let Some(rest) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let Some(raw_name) = rest.strip_suffix(ENV_URL_SUFFIX) else {
                continue;
            };
            if raw_name.is_empty() || base_url.is_empty() {
                continue;
            }
            let name = raw_name.to_lowercase();
            let agent_id = std::env::var(format!("{ENV_PREFIX}{raw_name}{ENV_ID_SUFFIX}"))
                .unwrap_or_else(|_| name.clone());
            directory.insert(name, base_url, agent_id);
        }
        directory
    }

    /// Resolves an agent name, failing with a config error when unknown.
    pub fn resolve(&self, name: &str) -> MaestroResult<&AgentEndpoint> {
        self.agents.get(name).ok_or_else(|| {
            MaestroError::Config(format!("no endpoint configured for agent '{name}'"))
        })
    }

    /// All registered agent names, unordered.
    pub fn names(&self) -> Vec<&str> {
        self.agents.keys().map(String::as_str).collect()
    }

    /// Number of registered agents.
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Whether the directory has no agents.
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
