//! Agent identity value object

use super::error::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identity of one agent within a round.
///
/// Used as the deduplication key for readiness and proposal signals, so it
/// must be unique within the swarm. Two agents sharing an identity is a
/// protocol violation with an undefined outcome.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    /// Create an identity from a non-empty string
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(DomainError::InvalidIdentity(
                "identity must not be empty".to_string(),
            ));
        }
        Ok(Self(id))
    }

    /// Generate a fresh identity of the form `robot_<uuid>`
    pub fn generate() -> Self {
        Self(format!("robot_{}", uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for AgentId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}
