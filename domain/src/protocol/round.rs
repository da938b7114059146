//! Per-agent round state machine
//!
//! [`RoundState`] holds everything one agent knows about the current round
//! and advances it one inbound message at a time. It performs no I/O: the
//! caller feeds it decoded [`ProtocolMessage`]s and reacts to the returned
//! [`RoundEvent`]s (logging, progress, stopping the receive loop).
//!
//! ```text
//! Init ──start()──▶ ReadinessSync ──barrier──▶ ProposalExchange ──N proposals──▶ Decided
//!                         │                          │
//!                         └────────── abort() ───────┴──────────────────────────▶ Aborted
//! ```

use super::message::ProtocolMessage;
use super::mode::BarrierMode;
use super::tally::{TallyOutcome, tally};
use crate::core::error::DomainError;
use crate::core::identity::AgentId;
use crate::core::proposal::Proposal;
use crate::core::swarm::SwarmSize;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Phase of an agent's round. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundPhase {
    Init,
    ReadinessSync,
    ProposalExchange,
    Decided,
    Aborted,
}

impl RoundPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoundPhase::Init => "init",
            RoundPhase::ReadinessSync => "readiness_sync",
            RoundPhase::ProposalExchange => "proposal_exchange",
            RoundPhase::Decided => "decided",
            RoundPhase::Aborted => "aborted",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            RoundPhase::Init => "Init",
            RoundPhase::ReadinessSync => "Readiness Sync",
            RoundPhase::ProposalExchange => "Proposal Exchange",
            RoundPhase::Decided => "Decided",
            RoundPhase::Aborted => "Aborted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RoundPhase::Decided | RoundPhase::Aborted)
    }
}

impl std::fmt::Display for RoundPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// What handling one message did to the round
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundEvent {
    /// A sender was counted as ready for the first time
    ReadyCounted { sender: AgentId, ready: usize },
    /// Repeated `Ready` from an already counted sender
    DuplicateReady { sender: AgentId },
    /// `Ready` that arrived after the barrier was passed
    StaleReady { sender: AgentId },
    /// `Begin` that arrived when no coordinator signal was expected
    StaleBegin,
    /// The readiness barrier is satisfied; emitted exactly once per round
    BarrierReached { ready: usize },
    /// A proposal was added to the collected set
    ProposalCollected {
        sender: AgentId,
        value: Proposal,
        collected: usize,
    },
    /// A second proposal from a sender that already proposed
    DuplicateProposal { sender: AgentId },
    /// A proposal beyond the swarm size
    ProposalOverCap { sender: AgentId },
    /// All proposals are in and the tally produced a decision
    Decided(TallyOutcome),
    /// The message arrived in a phase that accepts nothing
    Ignored { kind: &'static str, phase: RoundPhase },
}

/// The state of one agent's round
#[derive(Debug, Clone)]
pub struct RoundState {
    identity: AgentId,
    own_proposal: Proposal,
    swarm_size: SwarmSize,
    mode: BarrierMode,
    phase: RoundPhase,
    ready_senders: HashSet<AgentId>,
    proposal_senders: HashSet<AgentId>,
    collected: Vec<Proposal>,
    decision: Option<TallyOutcome>,
}

impl RoundState {
    pub fn new(
        identity: AgentId,
        own_proposal: Proposal,
        swarm_size: SwarmSize,
        mode: BarrierMode,
    ) -> Self {
        Self {
            identity,
            own_proposal,
            swarm_size,
            mode,
            phase: RoundPhase::Init,
            ready_senders: HashSet::new(),
            proposal_senders: HashSet::new(),
            collected: Vec::new(),
            decision: None,
        }
    }

    /// Leave `Init` and begin readiness synchronization
    pub fn start(&mut self) {
        if self.phase == RoundPhase::Init {
            self.phase = RoundPhase::ReadinessSync;
        }
    }

    /// Advance the round with one inbound message
    pub fn handle(&mut self, message: ProtocolMessage) -> Vec<RoundEvent> {
        if matches!(self.phase, RoundPhase::Init) || self.phase.is_terminal() {
            return vec![RoundEvent::Ignored {
                kind: message.kind(),
                phase: self.phase,
            }];
        }

        let mut events = Vec::new();
        match message {
            ProtocolMessage::Ready { sender } => self.on_ready(sender, &mut events),
            ProtocolMessage::Proposal { sender, value } => {
                self.on_proposal(sender, value, &mut events)
            }
            ProtocolMessage::Begin => self.on_begin(&mut events),
        }
        events
    }

    /// End the round without a decision.
    ///
    /// Returns the insufficient-data error describing what was missing, or
    /// `None` if the round had already been decided (a decision is never
    /// discarded).
    pub fn abort(&mut self) -> Option<DomainError> {
        if self.phase == RoundPhase::Decided {
            return None;
        }
        let expected = self.swarm_size.get();
        let error = match self.phase {
            RoundPhase::ProposalExchange => DomainError::InsufficientData {
                what: "proposals",
                received: self.collected.len(),
                expected,
            },
            _ => DomainError::InsufficientData {
                what: "readiness signals",
                received: self.ready_senders.len(),
                expected,
            },
        };
        self.phase = RoundPhase::Aborted;
        Some(error)
    }

    fn on_ready(&mut self, sender: AgentId, events: &mut Vec<RoundEvent>) {
        match (self.phase, self.mode) {
            (RoundPhase::ReadinessSync, BarrierMode::SelfCounted) => {
                self.count_ready(sender, events);
            }
            (RoundPhase::ReadinessSync, BarrierMode::Coordinated) => {
                // Agents never consume the coordinator's readiness queue
                events.push(RoundEvent::Ignored {
                    kind: "ready",
                    phase: self.phase,
                });
            }
            _ => events.push(RoundEvent::StaleReady { sender }),
        }
    }

    fn on_proposal(&mut self, sender: AgentId, value: Proposal, events: &mut Vec<RoundEvent>) {
        self.collect_proposal(sender.clone(), value, events);

        // A peer that already proposed has passed the barrier itself
        if self.phase == RoundPhase::ReadinessSync && self.mode == BarrierMode::SelfCounted {
            self.count_ready(sender, events);
        }

        if self.phase == RoundPhase::ProposalExchange {
            self.try_decide(events);
        }
    }

    fn on_begin(&mut self, events: &mut Vec<RoundEvent>) {
        if self.phase == RoundPhase::ReadinessSync && self.mode == BarrierMode::Coordinated {
            self.pass_barrier(events);
        } else {
            events.push(RoundEvent::StaleBegin);
        }
    }

    fn count_ready(&mut self, sender: AgentId, events: &mut Vec<RoundEvent>) {
        if self.ready_senders.contains(&sender) {
            events.push(RoundEvent::DuplicateReady { sender });
            return;
        }
        self.ready_senders.insert(sender.clone());
        events.push(RoundEvent::ReadyCounted {
            sender,
            ready: self.ready_senders.len(),
        });

        if self.ready_senders.len() == self.swarm_size.get() {
            self.pass_barrier(events);
        }
    }

    fn pass_barrier(&mut self, events: &mut Vec<RoundEvent>) {
        self.phase = RoundPhase::ProposalExchange;
        events.push(RoundEvent::BarrierReached {
            ready: self.ready_senders.len(),
        });
        self.try_decide(events);
    }

    fn collect_proposal(&mut self, sender: AgentId, value: Proposal, events: &mut Vec<RoundEvent>) {
        if self.proposal_senders.contains(&sender) {
            events.push(RoundEvent::DuplicateProposal { sender });
            return;
        }
        if self.collected.len() >= self.swarm_size.get() {
            events.push(RoundEvent::ProposalOverCap { sender });
            return;
        }
        self.proposal_senders.insert(sender.clone());
        self.collected.push(value.clone());
        events.push(RoundEvent::ProposalCollected {
            sender,
            value,
            collected: self.collected.len(),
        });
    }

    fn try_decide(&mut self, events: &mut Vec<RoundEvent>) {
        if self.decision.is_some() || self.collected.len() < self.swarm_size.get() {
            return;
        }
        if let Ok(outcome) = tally(&self.collected) {
            self.phase = RoundPhase::Decided;
            self.decision = Some(outcome.clone());
            events.push(RoundEvent::Decided(outcome));
        }
    }

    // ==================== Outbound messages ====================

    /// This agent's readiness signal
    pub fn ready_message(&self) -> ProtocolMessage {
        ProtocolMessage::ready(self.identity.clone())
    }

    /// This agent's single proposal for the round
    pub fn proposal_message(&self) -> ProtocolMessage {
        ProtocolMessage::proposal(self.identity.clone(), self.own_proposal.clone())
    }

    // ==================== Accessors ====================

    pub fn identity(&self) -> &AgentId {
        &self.identity
    }

    pub fn own_proposal(&self) -> &Proposal {
        &self.own_proposal
    }

    pub fn swarm_size(&self) -> SwarmSize {
        self.swarm_size
    }

    pub fn mode(&self) -> BarrierMode {
        self.mode
    }

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    pub fn ready_count(&self) -> usize {
        self.ready_senders.len()
    }

    pub fn collected(&self) -> &[Proposal] {
        &self.collected
    }

    pub fn decision(&self) -> Option<&TallyOutcome> {
        self.decision.as_ref()
    }

    pub fn barrier_passed(&self) -> bool {
        self.phase >= RoundPhase::ProposalExchange && self.phase != RoundPhase::Aborted
    }
}
