//! Message bus adapters

mod memory;

pub use memory::{InMemoryBroker, InMemoryConnection};
