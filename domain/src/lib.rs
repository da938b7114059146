//! Domain layer for swarm-vote
//!
//! This crate contains the protocol itself: identities and proposals, the
//! wire codec, the per-agent round state machine, the barrier coordinator
//! state and the plurality vote tally. It performs no I/O and has no
//! dependencies on infrastructure or presentation concerns.
//!
//! # Core Concepts
//!
//! ## Round
//!
//! A round takes a fixed swarm of agents through readiness synchronization,
//! a single proposal exchange and a local decision. Every agent that
//! collects the same multiset of proposals reaches the same decision.
//!
//! ## Barrier
//!
//! - **Self-counted** (default): agents count each other's `Ready` signals
//! - **Coordinated**: a coordinator counts them and broadcasts `Begin`

pub mod config;
pub mod core;
pub mod protocol;

// Re-export commonly used types
pub use config::{ConfigIssue, ConfigIssueCode, OutputFormat, Severity};
pub use core::{
    error::DomainError,
    identity::AgentId,
    proposal::{Proposal, ProposalSet},
    swarm::SwarmSize,
};
pub use protocol::{
    BarrierMode, BarrierState, BarrierStep, DecodeError, ProtocolMessage, RoundEvent,
    RoundPhase, RoundState, TallyOutcome, tally,
};
