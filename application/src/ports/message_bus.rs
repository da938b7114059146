//! Message bus port
//!
//! Defines the broker operations a round needs: fanout broadcast points,
//! named and exclusive queues, acknowledged delivery and purge. Adapters
//! live in the infrastructure layer.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Broker-assigned identifier of one delivery on one connection
pub type DeliveryTag = u64;

/// Errors that can occur during bus operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Access refused: {0}")]
    AccessRefused(String),

    #[error("Unknown delivery tag: {0}")]
    UnknownDeliveryTag(DeliveryTag),

    #[error("Connection closed")]
    Closed,
}

/// One message handed to a consumer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub tag: DeliveryTag,
    pub payload: Vec<u8>,
    /// Set when the message was handed out before and requeued unacked
    pub redelivered: bool,
}

/// Where a publish goes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Destination {
    /// Copied to every queue bound to the fanout exchange
    Exchange(String),
    /// Put directly on one named queue
    Queue(String),
}

impl Destination {
    pub fn exchange(name: impl Into<String>) -> Self {
        Destination::Exchange(name.into())
    }

    pub fn queue(name: impl Into<String>) -> Self {
        Destination::Queue(name.into())
    }
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Destination::Exchange(name) => write!(f, "exchange '{}'", name),
            Destination::Queue(name) => write!(f, "queue '{}'", name),
        }
    }
}

/// One connection to the bus
///
/// Declarations are idempotent. Unacknowledged deliveries return to their
/// queue when the connection closes, and exclusive queues are deleted.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Declare a fanout exchange
    async fn declare_fanout(&self, exchange: &str) -> Result<(), BusError>;

    /// Declare a durable named queue
    async fn declare_queue(&self, queue: &str) -> Result<(), BusError>;

    /// Create a server-named exclusive queue bound to `exchange`
    async fn bind_exclusive(&self, exchange: &str) -> Result<String, BusError>;

    /// Drop every ready message on `queue`, returning how many were dropped
    async fn purge(&self, queue: &str) -> Result<usize, BusError>;

    /// Cap the number of unacknowledged deliveries on this connection
    async fn set_prefetch(&self, count: usize) -> Result<(), BusError>;

    /// Publish one payload
    async fn publish(
        &self,
        destination: &Destination,
        payload: &[u8],
        persistent: bool,
    ) -> Result<(), BusError>;

    /// Wait up to `wait` for the next delivery on `queue`
    async fn recv(&self, queue: &str, wait: Duration) -> Result<Option<Delivery>, BusError>;

    /// Acknowledge a delivery
    async fn ack(&self, tag: DeliveryTag) -> Result<(), BusError>;

    /// Release the connection
    async fn close(&self);
}

/// Opens bus connections
#[async_trait]
pub trait BusConnector: Send + Sync {
    type Connection: MessageBus + 'static;

    async fn connect(&self) -> Result<Self::Connection, BusError>;
}
