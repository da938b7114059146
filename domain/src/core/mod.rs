//! Core domain concepts shared across the protocol.
//!
//! - [`identity::AgentId`]: unique identity of one agent in a round
//! - [`proposal::Proposal`] / [`proposal::ProposalSet`]: proposal values and the legal set
//! - [`swarm::SwarmSize`]: fixed, positive participant count
//! - [`error::DomainError`]: domain-level errors

pub mod error;
pub mod identity;
pub mod proposal;
pub mod swarm;
