//! Run Round use case
//!
//! Takes one agent through a full round on one bus connection: readiness
//! barrier, single proposal broadcast, collection and local decision.

use super::readiness::{ReadinessStrategy, RoundContext, strategy_for};
use super::shared::{Deadline, PumpExit};
use crate::config::{BusTopology, RoundParams};
use crate::ports::message_bus::{BusError, Destination, MessageBus};
use crate::ports::progress::{NoProgress, RoundProgressNotifier};
use crate::ports::results_sink::RoundRecord;
use serde::Serialize;
use std::time::Duration;
use swarm_vote_domain::{
    AgentId, BarrierMode, DomainError, Proposal, RoundPhase, RoundState, SwarmSize, TallyOutcome,
};
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Why a round stopped waiting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortCause {
    DeadlineExceeded,
    Cancelled,
}

impl std::fmt::Display for AbortCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AbortCause::DeadlineExceeded => write!(f, "deadline exceeded"),
            AbortCause::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Errors that can occur during a round
#[derive(Error, Debug)]
pub enum RunRoundError {
    #[error("Bus error: {0}")]
    Bus(#[from] BusError),

    #[error("Round aborted in {phase} ({cause}): {source}")]
    Aborted {
        phase: RoundPhase,
        cause: AbortCause,
        #[source]
        source: DomainError,
    },
}

impl RunRoundError {
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            RunRoundError::Aborted {
                cause: AbortCause::Cancelled,
                ..
            }
        )
    }

    /// The insufficient-data error, when the round ended without enough input
    pub fn insufficient_data(&self) -> Option<&DomainError> {
        match self {
            RunRoundError::Aborted { source, .. } if source.is_insufficient_data() => Some(source),
            _ => None,
        }
    }
}

/// Move `round` to `Aborted` and describe what was missing.
pub(crate) fn abort_round(round: &mut RoundState, cause: AbortCause) -> RunRoundError {
    let phase = round.phase();
    let collected = round.collected().len();
    let expected = round.swarm_size().get();
    let source = round.abort().unwrap_or(DomainError::InsufficientData {
        what: "proposals",
        received: collected,
        expected,
    });
    RunRoundError::Aborted {
        phase,
        cause,
        source,
    }
}

/// Input for the RunRound use case
#[derive(Debug, Clone)]
pub struct RunRoundInput {
    pub identity: AgentId,
    pub proposal: Proposal,
    pub swarm_size: SwarmSize,
    pub mode: BarrierMode,
}

impl RunRoundInput {
    pub fn new(identity: AgentId, proposal: impl Into<Proposal>, swarm_size: SwarmSize) -> Self {
        Self {
            identity,
            proposal: proposal.into(),
            swarm_size,
            mode: BarrierMode::default(),
        }
    }

    pub fn with_mode(mut self, mode: BarrierMode) -> Self {
        self.mode = mode;
        self
    }
}

/// A decided round
#[derive(Debug, Clone, Serialize)]
pub struct RoundOutcome {
    pub identity: AgentId,
    pub own_proposal: Proposal,
    pub mode: BarrierMode,
    pub tally: TallyOutcome,
    /// From own proposal broadcast to decision
    pub elapsed: Duration,
}

impl RoundOutcome {
    pub fn decision(&self) -> &Proposal {
        &self.tally.decision
    }

    pub fn record(&self) -> RoundRecord {
        RoundRecord::decided(self.identity.clone(), self.tally.decision.clone(), self.elapsed)
    }
}

/// Use case for running one agent's round
///
/// Owns one bus connection and closes it when the round ends, decided or
/// not. Run a fresh instance per round.
pub struct RunRoundUseCase<B: MessageBus> {
    bus: B,
    topology: BusTopology,
    params: RoundParams,
    cancellation_token: Option<CancellationToken>,
}

impl<B: MessageBus> RunRoundUseCase<B> {
    pub fn new(bus: B, topology: BusTopology, params: RoundParams) -> Self {
        Self {
            bus,
            topology,
            params,
            cancellation_token: None,
        }
    }

    /// Set a cancellation token for graceful interruption
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = Some(token);
        self
    }

    /// Execute the round without progress reporting
    pub async fn execute(&self, input: RunRoundInput) -> Result<RoundOutcome, RunRoundError> {
        self.execute_with_progress(input, &NoProgress).await
    }

    /// Execute the round with progress callbacks
    pub async fn execute_with_progress(
        &self,
        input: RunRoundInput,
        progress: &dyn RoundProgressNotifier,
    ) -> Result<RoundOutcome, RunRoundError> {
        let strategy = strategy_for(input.mode);
        self.execute_with_strategy(input, strategy.as_ref(), progress)
            .await
    }

    /// Execute the round with an explicit barrier strategy
    pub async fn execute_with_strategy(
        &self,
        input: RunRoundInput,
        strategy: &dyn ReadinessStrategy,
        progress: &dyn RoundProgressNotifier,
    ) -> Result<RoundOutcome, RunRoundError> {
        let mut round = RoundState::new(
            input.identity,
            input.proposal,
            input.swarm_size,
            strategy.mode(),
        );
        round.start();
        progress.on_phase_change(round.identity(), RoundPhase::ReadinessSync);
        info!(
            agent = %round.identity(),
            proposal = %round.own_proposal(),
            swarm_size = %round.swarm_size(),
            mode = %round.mode(),
            "Starting round"
        );

        let result = self.drive(&mut round, strategy, progress).await;
        self.bus.close().await;

        if let Err(e) = &result {
            warn!(agent = %round.identity(), error = %e, "Round ended without a decision");
            progress.on_phase_change(round.identity(), RoundPhase::Aborted);
            progress.on_aborted(round.identity(), &e.to_string());
        }
        result
    }

    async fn drive(
        &self,
        round: &mut RoundState,
        strategy: &dyn ReadinessStrategy,
        progress: &dyn RoundProgressNotifier,
    ) -> Result<RoundOutcome, RunRoundError> {
        let ctx = RoundContext {
            bus: &self.bus,
            topology: &self.topology,
            params: &self.params,
            progress,
            cancellation_token: &self.cancellation_token,
        };

        // Phase 1: Readiness
        let channel = strategy.synchronize(&ctx, round).await?;

        // Phase 2: Proposal exchange
        self.bus
            .publish(
                &Destination::exchange(channel.exchange.as_str()),
                &round.proposal_message().encode(),
                true,
            )
            .await?;
        let started = Instant::now();
        info!(agent = %round.identity(), proposal = %round.own_proposal(), "Proposal sent");

        let deadline = Deadline::after(self.params.deadlines.proposals);
        match ctx
            .pump(&channel.queue)
            .run(round, &deadline, None, |r| r.phase() == RoundPhase::Decided)
            .await?
        {
            PumpExit::Done | PumpExit::Paused => {}
            PumpExit::Expired => return Err(abort_round(round, AbortCause::DeadlineExceeded)),
            PumpExit::Cancelled => return Err(abort_round(round, AbortCause::Cancelled)),
        }

        // Phase 3: Decision
        let Some(tally) = round.decision().cloned() else {
            return Err(abort_round(round, AbortCause::DeadlineExceeded));
        };

        Ok(RoundOutcome {
            identity: round.identity().clone(),
            own_proposal: round.own_proposal().clone(),
            mode: round.mode(),
            tally,
            elapsed: started.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::use_cases::test_support::ScriptedBus;
    use swarm_vote_domain::ProtocolMessage;
    use tracing_test::traced_test;

    fn id(s: &str) -> AgentId {
        AgentId::new(s).unwrap()
    }

    fn size(n: usize) -> SwarmSize {
        SwarmSize::new(n).unwrap()
    }

    fn fast_params() -> RoundParams {
        RoundParams::default()
            .with_poll_interval(Duration::from_millis(10))
            .with_announce_interval(Duration::from_millis(20))
    }

    #[tokio::test(start_paused = true)]
    async fn test_self_counted_round_decides_plurality() {
        let topology = BusTopology::default();
        let bus = ScriptedBus::new();
        for (peer, value) in [("r2", "y"), ("r3", "x")] {
            bus.script(&topology.swarm_exchange, ProtocolMessage::ready(id(peer)));
            bus.script(
                &topology.swarm_exchange,
                ProtocolMessage::proposal(id(peer), value.into()),
            );
        }

        let use_case = RunRoundUseCase::new(bus.clone(), topology.clone(), fast_params());
        let outcome = use_case
            .execute(RunRoundInput::new(id("r1"), "x", size(3)))
            .await
            .unwrap();

        assert_eq!(outcome.decision().as_str(), "x");
        assert_eq!(outcome.tally.total_votes, 3);
        assert_eq!(outcome.record().csv_line().split(',').nth(1), Some("x"));
        assert!(bus.is_closed());

        // Exactly one proposal, published persistently
        let proposals = bus.published_proposals();
        assert_eq!(proposals.len(), 1);
        assert!(proposals[0].1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_agent_swarm_decides_alone() {
        let bus = ScriptedBus::new();
        let use_case = RunRoundUseCase::new(bus.clone(), BusTopology::default(), fast_params());
        let outcome = use_case
            .execute(RunRoundInput::new(id("solo"), "north", size(1)))
            .await
            .unwrap();
        assert_eq!(outcome.decision().as_str(), "north");
        assert!(outcome.tally.is_unanimous());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tie_is_broken_lexicographically() {
        let topology = BusTopology::default();
        let bus = ScriptedBus::new();
        bus.script(
            &topology.swarm_exchange,
            ProtocolMessage::proposal(id("r2"), "a".into()),
        );

        let use_case = RunRoundUseCase::new(bus, topology, fast_params());
        let outcome = use_case
            .execute(RunRoundInput::new(id("r1"), "b", size(2)))
            .await
            .unwrap();
        assert_eq!(outcome.decision().as_str(), "a");
        assert!(outcome.tally.was_tie());
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_payloads_are_acked_and_skipped() {
        let topology = BusTopology::default();
        let bus = ScriptedBus::new();
        bus.script_raw(&topology.swarm_exchange, b"not json".to_vec());
        bus.script_raw(&topology.swarm_exchange, br#"{"type":"vote"}"#.to_vec());
        bus.script(
            &topology.swarm_exchange,
            ProtocolMessage::proposal(id("r2"), "y".into()),
        );

        let use_case = RunRoundUseCase::new(bus.clone(), topology, fast_params());
        let outcome = use_case
            .execute(RunRoundInput::new(id("r1"), "y", size(2)))
            .await
            .unwrap();

        assert_eq!(outcome.decision().as_str(), "y");
        assert_eq!(bus.unacked(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_proposal_deadline_aborts_with_insufficient_data() {
        let topology = BusTopology::default();
        let bus = ScriptedBus::new();
        for peer in ["r2", "r3"] {
            bus.script(&topology.swarm_exchange, ProtocolMessage::ready(id(peer)));
        }
        bus.script(
            &topology.swarm_exchange,
            ProtocolMessage::proposal(id("r2"), "y".into()),
        );

        let params = fast_params().with_proposal_timeout(Some(Duration::from_millis(500)));
        let use_case = RunRoundUseCase::new(bus.clone(), topology, params);
        let err = use_case
            .execute(RunRoundInput::new(id("r1"), "x", size(3)))
            .await
            .unwrap_err();

        assert_eq!(
            err.insufficient_data(),
            Some(&DomainError::InsufficientData {
                what: "proposals",
                received: 2,
                expected: 3
            })
        );
        assert!(!err.is_cancelled());
        assert!(bus.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_readiness_deadline_aborts_before_proposing() {
        let bus = ScriptedBus::new();
        let params = fast_params().with_readiness_timeout(Some(Duration::from_millis(300)));
        let use_case = RunRoundUseCase::new(bus.clone(), BusTopology::default(), params);
        let err = use_case
            .execute(RunRoundInput::new(id("r1"), "x", size(2)))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            RunRoundError::Aborted {
                phase: RoundPhase::ReadinessSync,
                ..
            }
        ));
        assert!(err.to_string().contains("1 of 2 readiness signals"));
        assert!(bus.published_proposals().is_empty());
        // Ready was re-announced while waiting
        assert!(bus.published_readies() > 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_aborts_round() {
        let bus = ScriptedBus::new();
        let token = CancellationToken::new();
        token.cancel();

        let use_case = RunRoundUseCase::new(bus, BusTopology::default(), fast_params())
            .with_cancellation(token);
        let err = use_case
            .execute(RunRoundInput::new(id("r1"), "x", size(2)))
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_during_exchange_reports_missing_proposals() {
        let topology = BusTopology::default();
        let bus = ScriptedBus::new();
        for peer in ["r2", "r3"] {
            bus.script(&topology.swarm_exchange, ProtocolMessage::ready(id(peer)));
        }
        bus.script(
            &topology.swarm_exchange,
            ProtocolMessage::proposal(id("r2"), "y".into()),
        );

        let token = CancellationToken::new();
        let cancel = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            cancel.cancel();
        });

        let use_case = RunRoundUseCase::new(bus.clone(), topology, fast_params())
            .with_cancellation(token);
        let err = use_case
            .execute(RunRoundInput::new(id("r1"), "x", size(3)))
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert!(matches!(
            err,
            RunRoundError::Aborted {
                phase: RoundPhase::ProposalExchange,
                ..
            }
        ));
        assert_eq!(
            err.insufficient_data(),
            Some(&DomainError::InsufficientData {
                what: "proposals",
                received: 2,
                expected: 3
            })
        );
        assert_eq!(bus.published_proposals().len(), 1);
        assert!(bus.is_closed());
    }

    #[traced_test]
    #[tokio::test(start_paused = true)]
    async fn test_stale_ready_is_logged_at_debug() {
        let topology = BusTopology::default();
        let bus = ScriptedBus::new();
        bus.script(&topology.swarm_exchange, ProtocolMessage::ready(id("r2")));
        bus.script(&topology.swarm_exchange, ProtocolMessage::ready(id("r2")));
        bus.script(
            &topology.swarm_exchange,
            ProtocolMessage::proposal(id("r2"), "y".into()),
        );

        let use_case = RunRoundUseCase::new(bus.clone(), topology, fast_params());
        let outcome = use_case
            .execute(RunRoundInput::new(id("r1"), "y", size(2)))
            .await
            .unwrap();
        assert_eq!(outcome.decision().as_str(), "y");

        logs_assert(|lines: &[&str]| {
            lines
                .iter()
                .any(|line| {
                    line.contains("DEBUG") && line.contains("Discarding Ready received after the barrier")
                })
                .then_some(())
                .ok_or_else(|| "stale Ready not logged at DEBUG".to_string())
        });
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrepresentable_timeouts_wait_without_deadline() {
        let huge = Some(Duration::from_secs(i64::MAX as u64));
        let params = fast_params()
            .with_readiness_timeout(huge)
            .with_proposal_timeout(huge);
        let use_case = RunRoundUseCase::new(ScriptedBus::new(), BusTopology::default(), params);
        let outcome = use_case
            .execute(RunRoundInput::new(id("solo"), "north", size(1)))
            .await
            .unwrap();
        assert_eq!(outcome.decision().as_str(), "north");
    }

    #[tokio::test(start_paused = true)]
    async fn test_coordinated_round_waits_for_begin() {
        let topology = BusTopology::default();
        let bus = ScriptedBus::new();
        bus.script(
            &topology.proposal_exchange,
            ProtocolMessage::proposal(id("r2"), "y".into()),
        );
        bus.script(&topology.start_exchange, ProtocolMessage::Begin);

        let use_case = RunRoundUseCase::new(bus.clone(), topology.clone(), fast_params());
        let outcome = use_case
            .execute(RunRoundInput::new(id("r1"), "y", size(2)).with_mode(BarrierMode::Coordinated))
            .await
            .unwrap();

        assert_eq!(outcome.decision().as_str(), "y");
        assert_eq!(outcome.mode, BarrierMode::Coordinated);

        let direct = bus.published_to(&Destination::queue(topology.readiness_queue.as_str()));
        assert_eq!(direct.len(), 1);
        assert!(direct[0].1, "ready to the coordinator must be persistent");
    }

    #[tokio::test(start_paused = true)]
    async fn test_coordinated_readiness_deadline() {
        let bus = ScriptedBus::new();
        let params = fast_params().with_readiness_timeout(Some(Duration::from_millis(200)));
        let use_case = RunRoundUseCase::new(bus, BusTopology::default(), params);
        let err = use_case
            .execute(RunRoundInput::new(id("r1"), "x", size(2)).with_mode(BarrierMode::Coordinated))
            .await
            .unwrap_err();
        assert!(err.insufficient_data().is_some());
    }
}
