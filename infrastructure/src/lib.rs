//! Infrastructure layer for swarm-vote
//!
//! This crate contains adapters that implement the ports defined in the
//! application layer, plus configuration file loading.
//!
//! # Adapters
//!
//! - [`bus::InMemoryBroker`]: in-process message broker (`MessageBus`)
//! - [`results::CsvResultsSink`]: append-only results file (`ResultsSink`)
//! - [`config::ConfigLoader`]: figment-based TOML + env loading

pub mod bus;
pub mod config;
pub mod results;

pub use bus::{InMemoryBroker, InMemoryConnection};
pub use config::{ConfigLoader, ConfigValidationError, FileConfig};
pub use results::CsvResultsSink;
