//! Readiness barrier modes

use serde::{Deserialize, Serialize};

/// How agents learn that every participant is ready
///
/// - `SelfCounted`: each agent re-broadcasts `Ready` and counts distinct
///   senders itself until the whole swarm is seen (default)
/// - `Coordinated`: each agent sends one `Ready` to the barrier coordinator
///   and waits for its `Begin` broadcast
///
/// # Example
///
/// ```
/// use swarm_vote_domain::BarrierMode;
///
/// assert_eq!("self".parse::<BarrierMode>().ok(), Some(BarrierMode::SelfCounted));
/// assert_eq!("coordinated".parse::<BarrierMode>().ok(), Some(BarrierMode::Coordinated));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BarrierMode {
    #[default]
    #[serde(rename = "self")]
    SelfCounted,
    #[serde(rename = "coordinated")]
    Coordinated,
}

impl BarrierMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BarrierMode::SelfCounted => "self",
            BarrierMode::Coordinated => "coordinated",
        }
    }

    /// Whether a coordinator process takes part in the round
    pub fn needs_coordinator(&self) -> bool {
        matches!(self, BarrierMode::Coordinated)
    }
}

impl std::fmt::Display for BarrierMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BarrierMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "self" | "self-counted" | "self_counted" => Ok(BarrierMode::SelfCounted),
            "coordinated" | "coordinator" => Ok(BarrierMode::Coordinated),
            _ => Err(format!(
                "Unknown barrier mode: {}. Valid: self, coordinated",
                s
            )),
        }
    }
}
