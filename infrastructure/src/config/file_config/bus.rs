//! Bus configuration from TOML (`[bus]` section)

use serde::{Deserialize, Serialize};
use swarm_vote_application::config::BusTopology;
use swarm_vote_domain::{ConfigIssue, ConfigIssueCode};

/// Raw bus topology configuration from TOML
///
/// # Example
///
/// ```toml
/// [bus]
/// namespace = "lab"                       # optional prefix for every name
/// swarm_exchange = "swarm_exchange"
/// readiness_queue = "readiness_queue"
/// start_exchange = "start_voting_exchange"
/// proposal_exchange = "proposal_exchange"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileBusConfig {
    pub namespace: Option<String>,
    pub swarm_exchange: String,
    pub readiness_queue: String,
    pub start_exchange: String,
    pub proposal_exchange: String,
}

impl Default for FileBusConfig {
    fn default() -> Self {
        let topology = BusTopology::default();
        Self {
            namespace: None,
            swarm_exchange: topology.swarm_exchange,
            readiness_queue: topology.readiness_queue,
            start_exchange: topology.start_exchange,
            proposal_exchange: topology.proposal_exchange,
        }
    }
}

impl FileBusConfig {
    /// Convert to a topology; blank names fall back to the defaults.
    pub fn to_topology(&self) -> (BusTopology, Vec<ConfigIssue>) {
        let mut issues = Vec::new();
        let defaults = BusTopology::default();

        let mut name = |field: &str, value: &str, fallback: String| {
            if value.trim().is_empty() {
                issues.push(ConfigIssue::error(
                    ConfigIssueCode::EmptyName {
                        field: format!("bus.{}", field),
                    },
                    format!("bus.{}: name cannot be empty", field),
                ));
                fallback
            } else {
                value.to_string()
            }
        };

        let topology = BusTopology {
            swarm_exchange: name("swarm_exchange", &self.swarm_exchange, defaults.swarm_exchange),
            readiness_queue: name(
                "readiness_queue",
                &self.readiness_queue,
                defaults.readiness_queue,
            ),
            start_exchange: name("start_exchange", &self.start_exchange, defaults.start_exchange),
            proposal_exchange: name(
                "proposal_exchange",
                &self.proposal_exchange,
                defaults.proposal_exchange,
            ),
        };

        let topology = match self.namespace.as_deref().map(str::trim) {
            Some(prefix) if !prefix.is_empty() => topology.with_namespace(prefix),
            _ => topology,
        };
        (topology, issues)
    }
}
