//! In-process broker implementing the [`MessageBus`] port.
//!
//! Models the subset of AMQP the protocol relies on: fanout exchanges,
//! durable named queues, server-named exclusive queues, per-connection
//! prefetch, manual acknowledgement and requeue-on-close. Messages live in
//! memory only, so the `persistent` flag is logged and otherwise ignored.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use swarm_vote_application::ports::message_bus::{
    BusConnector, BusError, Delivery, DeliveryTag, Destination, MessageBus,
};
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, trace};

type ConnectionId = u64;

#[derive(Debug, Clone)]
struct StoredMessage {
    payload: Vec<u8>,
    redelivered: bool,
}

#[derive(Debug)]
struct QueueState {
    ready: VecDeque<StoredMessage>,
    /// Set for server-named queues; only the owner may consume
    owner: Option<ConnectionId>,
    notify: Arc<Notify>,
}

impl QueueState {
    fn new(owner: Option<ConnectionId>) -> Self {
        Self {
            ready: VecDeque::new(),
            owner,
            notify: Arc::new(Notify::new()),
        }
    }
}

#[derive(Debug, Default)]
struct BrokerState {
    /// Exchange name → bound queue names
    exchanges: HashMap<String, HashSet<String>>,
    queues: HashMap<String, QueueState>,
    next_queue: u64,
    next_connection: ConnectionId,
    duplicate_deliveries: bool,
}

impl BrokerState {
    fn enqueue(&mut self, queue: &str, message: StoredMessage) -> Result<(), BusError> {
        let copies = if self.duplicate_deliveries { 2 } else { 1 };
        let state = self
            .queues
            .get_mut(queue)
            .ok_or_else(|| BusError::NotFound(format!("queue '{}'", queue)))?;
        for _ in 0..copies {
            state.ready.push_back(message.clone());
        }
        state.notify.notify_waiters();
        Ok(())
    }

    fn route(&mut self, destination: &Destination, message: StoredMessage) -> Result<(), BusError> {
        match destination {
            Destination::Queue(queue) => self.enqueue(queue, message),
            Destination::Exchange(exchange) => {
                let bound: Vec<String> = self
                    .exchanges
                    .get(exchange)
                    .ok_or_else(|| BusError::NotFound(format!("exchange '{}'", exchange)))?
                    .iter()
                    .cloned()
                    .collect();
                for queue in bound {
                    self.enqueue(&queue, message.clone())?;
                }
                Ok(())
            }
        }
    }
}

/// Shared in-memory broker. Clones refer to the same broker.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver every message twice, to exercise at-least-once handling
    pub fn with_duplication(self) -> Self {
        self.lock().duplicate_deliveries = true;
        self
    }

    /// Open a new connection
    pub fn connect(&self) -> InMemoryConnection {
        let id = {
            let mut state = self.lock();
            state.next_connection += 1;
            state.next_connection
        };
        InMemoryConnection {
            id,
            broker: self.clone(),
            local: Mutex::new(ConnectionState::default()),
        }
    }

    /// Publish raw bytes from outside any connection
    pub fn inject(&self, destination: &Destination, payload: impl Into<Vec<u8>>) -> Result<(), BusError> {
        self.lock().route(
            destination,
            StoredMessage {
                payload: payload.into(),
                redelivered: false,
            },
        )
    }

    /// Number of ready (undelivered) messages on `queue`
    pub fn queue_depth(&self, queue: &str) -> Option<usize> {
        self.lock().queues.get(queue).map(|q| q.ready.len())
    }

    pub fn has_exchange(&self, exchange: &str) -> bool {
        self.lock().exchanges.contains_key(exchange)
    }

    fn lock(&self) -> MutexGuard<'_, BrokerState> {
        // A panic while holding the lock leaves plain data behind; keep serving it
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl BusConnector for InMemoryBroker {
    type Connection = InMemoryConnection;

    async fn connect(&self) -> Result<InMemoryConnection, BusError> {
        Ok(InMemoryBroker::connect(self))
    }
}

#[derive(Debug, Default)]
struct ConnectionState {
    /// Tag → (queue, message) for deliveries not yet acknowledged
    unacked: HashMap<DeliveryTag, (String, StoredMessage)>,
    next_tag: DeliveryTag,
    prefetch: Option<usize>,
    exclusive_queues: Vec<String>,
    closed: bool,
}

enum Take {
    Delivered(Delivery),
    Empty(Arc<Notify>),
}

/// One participant's connection. Closed on drop.
#[derive(Debug)]
pub struct InMemoryConnection {
    id: ConnectionId,
    broker: InMemoryBroker,
    local: Mutex<ConnectionState>,
}

impl InMemoryConnection {
    fn local(&self) -> MutexGuard<'_, ConnectionState> {
        self.local.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn ensure_open(&self) -> Result<(), BusError> {
        if self.local().closed {
            Err(BusError::Closed)
        } else {
            Ok(())
        }
    }

    fn try_take(&self, queue: &str) -> Result<Take, BusError> {
        let mut local = self.local();
        if local.closed {
            return Err(BusError::Closed);
        }

        let mut broker = self.broker.lock();
        let state = broker
            .queues
            .get_mut(queue)
            .ok_or_else(|| BusError::NotFound(format!("queue '{}'", queue)))?;
        if let Some(owner) = state.owner
            && owner != self.id
        {
            return Err(BusError::AccessRefused(format!(
                "queue '{}' is exclusive to another connection",
                queue
            )));
        }

        let at_capacity = local
            .prefetch
            .is_some_and(|limit| local.unacked.len() >= limit);
        if at_capacity {
            return Ok(Take::Empty(state.notify.clone()));
        }

        match state.ready.pop_front() {
            Some(message) => {
                local.next_tag += 1;
                let tag = local.next_tag;
                let delivery = Delivery {
                    tag,
                    payload: message.payload.clone(),
                    redelivered: message.redelivered,
                };
                local.unacked.insert(tag, (queue.to_string(), message));
                Ok(Take::Delivered(delivery))
            }
            None => Ok(Take::Empty(state.notify.clone())),
        }
    }

    /// Drop exclusive queues and requeue unacknowledged deliveries
    fn shutdown(&self) {
        let mut local = self.local();
        if local.closed {
            return;
        }
        local.closed = true;

        let mut broker = self.broker.lock();
        for queue in local.exclusive_queues.drain(..) {
            broker.queues.remove(&queue);
            for bound in broker.exchanges.values_mut() {
                bound.remove(&queue);
            }
        }

        let mut unacked: Vec<_> = local.unacked.drain().collect();
        // Highest tag first so pushing to the front restores delivery order
        unacked.sort_by(|a, b| b.0.cmp(&a.0));
        let requeued = unacked.len();
        for (_, (queue, mut message)) in unacked {
            if let Some(state) = broker.queues.get_mut(&queue) {
                message.redelivered = true;
                state.ready.push_front(message);
                state.notify.notify_waiters();
            }
        }
        debug!(connection = self.id, requeued, "Connection closed");
    }
}

#[async_trait]
impl MessageBus for InMemoryConnection {
    async fn declare_fanout(&self, exchange: &str) -> Result<(), BusError> {
        self.ensure_open()?;
        self.broker
            .lock()
            .exchanges
            .entry(exchange.to_string())
            .or_default();
        Ok(())
    }

    async fn declare_queue(&self, queue: &str) -> Result<(), BusError> {
        self.ensure_open()?;
        let mut broker = self.broker.lock();
        match broker.queues.get(queue) {
            Some(existing) if existing.owner.is_some_and(|owner| owner != self.id) => Err(
                BusError::AccessRefused(format!("queue '{}' is exclusive", queue)),
            ),
            Some(_) => Ok(()),
            None => {
                broker.queues.insert(queue.to_string(), QueueState::new(None));
                Ok(())
            }
        }
    }

    async fn bind_exclusive(&self, exchange: &str) -> Result<String, BusError> {
        let mut local = self.local();
        if local.closed {
            return Err(BusError::Closed);
        }

        let mut broker = self.broker.lock();
        if !broker.exchanges.contains_key(exchange) {
            return Err(BusError::NotFound(format!("exchange '{}'", exchange)));
        }
        broker.next_queue += 1;
        let queue = format!("amq.gen-{}", broker.next_queue);
        broker
            .queues
            .insert(queue.clone(), QueueState::new(Some(self.id)));
        if let Some(bound) = broker.exchanges.get_mut(exchange) {
            bound.insert(queue.clone());
        }
        local.exclusive_queues.push(queue.clone());
        trace!(connection = self.id, %exchange, %queue, "Bound exclusive queue");
        Ok(queue)
    }

    async fn purge(&self, queue: &str) -> Result<usize, BusError> {
        self.ensure_open()?;
        let mut broker = self.broker.lock();
        let state = broker
            .queues
            .get_mut(queue)
            .ok_or_else(|| BusError::NotFound(format!("queue '{}'", queue)))?;
        let dropped = state.ready.len();
        state.ready.clear();
        Ok(dropped)
    }

    async fn set_prefetch(&self, count: usize) -> Result<(), BusError> {
        let mut local = self.local();
        if local.closed {
            return Err(BusError::Closed);
        }
        // Zero means unlimited
        local.prefetch = (count > 0).then_some(count);
        Ok(())
    }

    async fn publish(
        &self,
        destination: &Destination,
        payload: &[u8],
        persistent: bool,
    ) -> Result<(), BusError> {
        self.ensure_open()?;
        trace!(connection = self.id, %destination, bytes = payload.len(), persistent, "Publish");
        self.broker.lock().route(
            destination,
            StoredMessage {
                payload: payload.to_vec(),
                redelivered: false,
            },
        )
    }

    async fn recv(&self, queue: &str, wait: Duration) -> Result<Option<Delivery>, BusError> {
        let deadline = Instant::now() + wait;
        loop {
            let notify = match self.try_take(queue)? {
                Take::Delivered(delivery) => return Ok(Some(delivery)),
                Take::Empty(notify) => notify,
            };

            // Register interest before re-checking, so a publish in between is not missed
            let notified = notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if let Take::Delivered(delivery) = self.try_take(queue)? {
                return Ok(Some(delivery));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            if tokio::time::timeout(deadline - now, notified).await.is_err() {
                return match self.try_take(queue)? {
                    Take::Delivered(delivery) => Ok(Some(delivery)),
                    Take::Empty(_) => Ok(None),
                };
            }
        }
    }

    async fn ack(&self, tag: DeliveryTag) -> Result<(), BusError> {
        let mut local = self.local();
        if local.closed {
            return Err(BusError::Closed);
        }
        local
            .unacked
            .remove(&tag)
            .map(|_| ())
            .ok_or(BusError::UnknownDeliveryTag(tag))
    }

    async fn close(&self) {
        self.shutdown();
    }
}

impl Drop for InMemoryConnection {
    fn drop(&mut self) {
        self.shutdown();
    }
}
