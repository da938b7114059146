//! Scripted bus for use case tests.
//!
//! Each exchange has exactly one bound queue. Publishing to an exchange
//! loops the payload back into that queue, so an agent hears itself the
//! way it would on a real fanout.

use crate::ports::message_bus::{
    BusConnector, BusError, Delivery, DeliveryTag, Destination, MessageBus,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use swarm_vote_domain::ProtocolMessage;

#[derive(Default)]
struct Inner {
    queues: HashMap<String, VecDeque<Vec<u8>>>,
    published: Vec<(Destination, Vec<u8>, bool)>,
    unacked: HashSet<DeliveryTag>,
    next_tag: DeliveryTag,
    purged: usize,
    closed: bool,
}

#[derive(Clone, Default)]
pub(crate) struct ScriptedBus {
    inner: Arc<Mutex<Inner>>,
}

impl ScriptedBus {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn queue_for(exchange: &str) -> String {
        format!("{exchange}.queue")
    }

    /// Pre-load a message as if a peer had published it on `exchange`
    pub(crate) fn script(&self, exchange: &str, message: ProtocolMessage) {
        self.script_raw(exchange, message.encode());
    }

    pub(crate) fn script_raw(&self, exchange: &str, payload: Vec<u8>) {
        self.script_queue(&Self::queue_for(exchange), payload);
    }

    /// Pre-load a message directly on a named queue
    pub(crate) fn script_queue(&self, queue: &str, payload: Vec<u8>) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .queues
            .entry(queue.to_string())
            .or_default()
            .push_back(payload);
    }

    pub(crate) fn published_to(&self, destination: &Destination) -> Vec<(Vec<u8>, bool)> {
        let inner = self.inner.lock().unwrap();
        inner
            .published
            .iter()
            .filter(|(d, _, _)| d == destination)
            .map(|(_, payload, persistent)| (payload.clone(), *persistent))
            .collect()
    }

    fn published_matching(&self, f: impl Fn(&ProtocolMessage) -> bool) -> Vec<(Vec<u8>, bool)> {
        let inner = self.inner.lock().unwrap();
        inner
            .published
            .iter()
            .filter(|(_, payload, _)| ProtocolMessage::decode(payload).is_ok_and(|m| f(&m)))
            .map(|(_, payload, persistent)| (payload.clone(), *persistent))
            .collect()
    }

    pub(crate) fn published_proposals(&self) -> Vec<(Vec<u8>, bool)> {
        self.published_matching(|m| matches!(m, ProtocolMessage::Proposal { .. }))
    }

    pub(crate) fn published_readies(&self) -> usize {
        self.published_matching(|m| matches!(m, ProtocolMessage::Ready { .. }))
            .len()
    }

    pub(crate) fn published_begins(&self) -> Vec<(Vec<u8>, bool)> {
        self.published_matching(|m| matches!(m, ProtocolMessage::Begin))
    }

    pub(crate) fn unacked(&self) -> usize {
        self.inner.lock().unwrap().unacked.len()
    }

    pub(crate) fn purged(&self) -> usize {
        self.inner.lock().unwrap().purged
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.inner.lock().unwrap().closed
    }
}

#[async_trait]
impl MessageBus for ScriptedBus {
    async fn declare_fanout(&self, _exchange: &str) -> Result<(), BusError> {
        Ok(())
    }

    async fn declare_queue(&self, queue: &str) -> Result<(), BusError> {
        self.inner
            .lock()
            .unwrap()
            .queues
            .entry(queue.to_string())
            .or_default();
        Ok(())
    }

    async fn bind_exclusive(&self, exchange: &str) -> Result<String, BusError> {
        let queue = Self::queue_for(exchange);
        self.declare_queue(&queue).await?;
        Ok(queue)
    }

    async fn purge(&self, queue: &str) -> Result<usize, BusError> {
        let mut inner = self.inner.lock().unwrap();
        let dropped = inner.queues.get_mut(queue).map(|q| q.drain(..).count()).unwrap_or(0);
        inner.purged += dropped;
        Ok(dropped)
    }

    async fn set_prefetch(&self, _count: usize) -> Result<(), BusError> {
        Ok(())
    }

    async fn publish(
        &self,
        destination: &Destination,
        payload: &[u8],
        persistent: bool,
    ) -> Result<(), BusError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.closed {
            return Err(BusError::Closed);
        }
        inner
            .published
            .push((destination.clone(), payload.to_vec(), persistent));
        let queue = match destination {
            Destination::Exchange(exchange) => Self::queue_for(exchange),
            Destination::Queue(queue) => queue.clone(),
        };
        inner
            .queues
            .entry(queue)
            .or_default()
            .push_back(payload.to_vec());
        Ok(())
    }

    async fn recv(&self, queue: &str, wait: Duration) -> Result<Option<Delivery>, BusError> {
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.closed {
                return Err(BusError::Closed);
            }
            if let Some(payload) = inner.queues.get_mut(queue).and_then(|q| q.pop_front()) {
                inner.next_tag += 1;
                let tag = inner.next_tag;
                inner.unacked.insert(tag);
                return Ok(Some(Delivery {
                    tag,
                    payload,
                    redelivered: false,
                }));
            }
        }
        tokio::time::sleep(wait).await;
        Ok(None)
    }

    async fn ack(&self, tag: DeliveryTag) -> Result<(), BusError> {
        if self.inner.lock().unwrap().unacked.remove(&tag) {
            Ok(())
        } else {
            Err(BusError::UnknownDeliveryTag(tag))
        }
    }

    async fn close(&self) {
        self.inner.lock().unwrap().closed = true;
    }
}

/// Hands out clones of one scripted bus, or refuses every connection
pub(crate) struct ScriptedConnector {
    pub(crate) bus: Option<ScriptedBus>,
}

#[async_trait]
impl BusConnector for ScriptedConnector {
    type Connection = ScriptedBus;

    async fn connect(&self) -> Result<ScriptedBus, BusError> {
        self.bus
            .clone()
            .ok_or_else(|| BusError::ConnectionError("connection refused".to_string()))
    }
}
