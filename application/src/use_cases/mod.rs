//! Use cases
//!
//! Application-level operations that orchestrate domain logic.

pub mod readiness;
pub mod run_barrier;
pub mod run_round;
pub mod run_swarm;
pub(crate) mod shared;

#[cfg(test)]
pub(crate) mod test_support;
