//! Progress notification port
//!
//! Defines the interface for reporting progress while a swarm votes.

use swarm_vote_domain::{AgentId, RoundPhase, TallyOutcome};

/// Callback for progress updates during a round
///
/// Implementations live in the presentation layer. Calls arrive from
/// several agent tasks at once.
pub trait RoundProgressNotifier: Send + Sync {
    /// Called when an agent's round enters a new phase
    fn on_phase_change(&self, agent: &AgentId, phase: RoundPhase);

    /// Called when an agent reaches a decision
    fn on_decided(&self, agent: &AgentId, outcome: &TallyOutcome);

    /// Called when an agent gives up without a decision
    fn on_aborted(&self, agent: &AgentId, reason: &str);

    // ==================== Counting Callbacks ====================

    /// Called when an agent counts a new ready peer
    fn on_ready_counted(&self, _agent: &AgentId, _ready: usize, _expected: usize) {}

    /// Called when an agent collects a new proposal
    fn on_proposal_collected(&self, _agent: &AgentId, _collected: usize, _expected: usize) {}

    /// Called when the coordinator broadcasts `Begin`
    fn on_barrier_released(&self, _ready: usize) {}
}

/// No-op progress notifier for when progress reporting is not needed
pub struct NoProgress;

impl RoundProgressNotifier for NoProgress {
    fn on_phase_change(&self, _agent: &AgentId, _phase: RoundPhase) {}
    fn on_decided(&self, _agent: &AgentId, _outcome: &TallyOutcome) {}
    fn on_aborted(&self, _agent: &AgentId, _reason: &str) {}
}
