//! Barrier coordinator state
//!
//! The coordinator aggregates `Ready` signals from the whole swarm into a
//! single `Begin` broadcast. Its state is an explicit value threaded through
//! [`BarrierState::on_ready`]; the returned [`BarrierStep`] tells the caller
//! whether this signal released the barrier.

use super::message::ProtocolMessage;
use crate::core::identity::AgentId;
use crate::core::swarm::SwarmSize;
use std::collections::HashSet;

/// Outcome of feeding one readiness signal to the coordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BarrierStep {
    /// A new sender was counted; the barrier still waits
    Counted { sender: AgentId, ready: usize },
    /// Repeated signal from an already counted sender
    Duplicate { sender: AgentId },
    /// This signal completed the set: broadcast `Begin` now (happens once)
    Release { sender: AgentId, ready: usize },
    /// Signal after `Begin` was sent; acknowledged and otherwise ignored
    Late { sender: AgentId },
}

impl BarrierStep {
    pub fn is_release(&self) -> bool {
        matches!(self, BarrierStep::Release { .. })
    }
}

/// Coordinator state for one round
#[derive(Debug, Clone)]
pub struct BarrierState {
    swarm_size: SwarmSize,
    ready_senders: HashSet<AgentId>,
    signal_sent: bool,
}

impl BarrierState {
    pub fn new(swarm_size: SwarmSize) -> Self {
        Self {
            swarm_size,
            ready_senders: HashSet::new(),
            signal_sent: false,
        }
    }

    /// Record a readiness signal
    pub fn on_ready(&mut self, sender: AgentId) -> BarrierStep {
        if self.signal_sent {
            return BarrierStep::Late { sender };
        }
        if !self.ready_senders.insert(sender.clone()) {
            return BarrierStep::Duplicate { sender };
        }

        let ready = self.ready_senders.len();
        if ready == self.swarm_size.get() {
            self.signal_sent = true;
            BarrierStep::Release { sender, ready }
        } else {
            BarrierStep::Counted { sender, ready }
        }
    }

    /// The message to broadcast on release
    pub fn begin_signal(&self) -> ProtocolMessage {
        ProtocolMessage::Begin
    }

    pub fn swarm_size(&self) -> SwarmSize {
        self.swarm_size
    }

    pub fn ready_count(&self) -> usize {
        self.ready_senders.len()
    }

    pub fn signal_sent(&self) -> bool {
        self.signal_sent
    }
}
