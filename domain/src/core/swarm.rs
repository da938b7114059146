//! Swarm size value object

use super::error::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroUsize;

/// Number of participants in a round, identical for every agent and the
/// coordinator and fixed before the round starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub struct SwarmSize(NonZeroUsize);

impl SwarmSize {
    pub fn new(size: usize) -> Result<Self, DomainError> {
        NonZeroUsize::new(size)
            .map(Self)
            .ok_or(DomainError::InvalidSwarmSize)
    }

    pub fn get(self) -> usize {
        self.0.get()
    }
}

impl TryFrom<usize> for SwarmSize {
    type Error = DomainError;

    fn try_from(size: usize) -> Result<Self, Self::Error> {
        Self::new(size)
    }
}

impl From<SwarmSize> for usize {
    fn from(size: SwarmSize) -> Self {
        size.get()
    }
}

impl fmt::Display for SwarmSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
