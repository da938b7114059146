//! Application-level configuration.
//!
//! - [`RoundParams`]: polling cadence, deadlines and coordinator linger
//! - [`BusTopology`]: exchange and queue names shared by a swarm

pub mod round_params;
pub mod topology;

pub use round_params::{Deadlines, PollingParams, RoundParams};
pub use topology::BusTopology;
