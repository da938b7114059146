//! Swarm voting protocol
//!
//! # Round Flow
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  One Round                                                      │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  1. Readiness Sync                                              │
//! │     self-counted: every agent re-broadcasts Ready and counts    │
//! │                   distinct senders until the swarm is complete  │
//! │     coordinated:  every agent sends one Ready to the barrier    │
//! │                   coordinator and waits for its Begin           │
//! │                          ↓                                      │
//! │  2. Proposal Exchange                                           │
//! │     every agent broadcasts exactly one Proposal and collects    │
//! │     one proposal per peer                                       │
//! │                          ↓                                      │
//! │  3. Decision                                                    │
//! │     plurality tally, ties broken by lexicographic order         │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod barrier;
pub mod message;
pub mod mode;
pub mod round;
pub mod tally;

pub use barrier::{BarrierState, BarrierStep};
pub use message::{DecodeError, ProtocolMessage};
pub use mode::BarrierMode;
pub use round::{RoundEvent, RoundPhase, RoundState};
pub use tally::{TallyOutcome, tally};
