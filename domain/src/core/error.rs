//! Domain error types

use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Swarm size must be a positive integer")]
    InvalidSwarmSize,

    #[error("Invalid agent identity: {0}")]
    InvalidIdentity(String),

    #[error("Proposal '{value}' is not one of the legal proposals: {legal}")]
    IllegalProposal { value: String, legal: String },

    #[error("Empty proposal set")]
    EmptyProposalSet,

    #[error("Insufficient data: {received} of {expected} {what} collected")]
    InsufficientData {
        what: &'static str,
        received: usize,
        expected: usize,
    },
}

impl DomainError {
    /// Check if this error means the round ended without enough signals
    pub fn is_insufficient_data(&self) -> bool {
        matches!(self, DomainError::InsufficientData { .. })
    }
}
