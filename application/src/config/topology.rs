//! Bus topology: the exchange and queue names a swarm agrees on.

use serde::{Deserialize, Serialize};

pub const DEFAULT_SWARM_EXCHANGE: &str = "swarm_exchange";
pub const DEFAULT_READINESS_QUEUE: &str = "readiness_queue";
pub const DEFAULT_START_EXCHANGE: &str = "start_voting_exchange";
pub const DEFAULT_PROPOSAL_EXCHANGE: &str = "proposal_exchange";

/// Names of the broadcast points and the coordinator's queue.
///
/// Every participant of a swarm must use the same topology.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusTopology {
    /// Fanout carrying both `Ready` and `Proposal` in self-counted mode.
    pub swarm_exchange: String,
    /// Durable queue the coordinator consumes `Ready` signals from.
    pub readiness_queue: String,
    /// Fanout carrying the coordinator's `Begin`.
    pub start_exchange: String,
    /// Fanout carrying proposals in coordinated mode.
    pub proposal_exchange: String,
}

impl Default for BusTopology {
    fn default() -> Self {
        Self {
            swarm_exchange: DEFAULT_SWARM_EXCHANGE.to_string(),
            readiness_queue: DEFAULT_READINESS_QUEUE.to_string(),
            start_exchange: DEFAULT_START_EXCHANGE.to_string(),
            proposal_exchange: DEFAULT_PROPOSAL_EXCHANGE.to_string(),
        }
    }
}

impl BusTopology {
    /// Prefix every name, so several swarms can share one broker.
    pub fn with_namespace(self, prefix: &str) -> Self {
        Self {
            swarm_exchange: format!("{prefix}.{}", self.swarm_exchange),
            readiness_queue: format!("{prefix}.{}", self.readiness_queue),
            start_exchange: format!("{prefix}.{}", self.start_exchange),
            proposal_exchange: format!("{prefix}.{}", self.proposal_exchange),
        }
    }
}
