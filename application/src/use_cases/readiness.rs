//! Readiness barrier strategies
//!
//! Both variants bring an agent from `ReadinessSync` to `ProposalExchange`
//! and tell the caller where proposals travel in this mode.
//!
//! | Strategy | Ready goes to | Barrier passes when |
//! |----------|---------------|---------------------|
//! | [`SelfCountedBarrier`] | swarm fanout (repeated) | N distinct ready senders counted |
//! | [`CoordinatedBarrier`] | coordinator queue (once) | coordinator's `Begin` arrives |

use super::run_round::{AbortCause, RunRoundError, abort_round};
use super::shared::{Deadline, Pump, PumpExit};
use crate::config::{BusTopology, RoundParams};
use crate::ports::message_bus::{Destination, MessageBus};
use crate::ports::progress::RoundProgressNotifier;
use async_trait::async_trait;
use swarm_vote_domain::{BarrierMode, RoundState};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Where proposals are published and collected once the barrier passes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalChannel {
    pub exchange: String,
    pub queue: String,
}

/// Shared handles for one agent's round
pub struct RoundContext<'a> {
    pub bus: &'a dyn MessageBus,
    pub topology: &'a BusTopology,
    pub params: &'a RoundParams,
    pub progress: &'a dyn RoundProgressNotifier,
    pub cancellation_token: &'a Option<CancellationToken>,
}

impl RoundContext<'_> {
    pub(crate) fn pump<'q>(&'q self, queue: &'q str) -> Pump<'q> {
        Pump {
            bus: self.bus,
            queue,
            poll_interval: self.params.polling.poll_interval,
            progress: self.progress,
            cancellation_token: self.cancellation_token,
        }
    }
}

/// A way of reaching the readiness barrier
#[async_trait]
pub trait ReadinessStrategy: Send + Sync {
    fn mode(&self) -> BarrierMode;

    /// Run readiness synchronization until the barrier passes.
    ///
    /// On success `round` is in `ProposalExchange` (or already `Decided`).
    async fn synchronize(
        &self,
        ctx: &RoundContext<'_>,
        round: &mut RoundState,
    ) -> Result<ProposalChannel, RunRoundError>;
}

/// Pick the strategy for a barrier mode
pub fn strategy_for(mode: BarrierMode) -> Box<dyn ReadinessStrategy> {
    match mode {
        BarrierMode::SelfCounted => Box::new(SelfCountedBarrier),
        BarrierMode::Coordinated => Box::new(CoordinatedBarrier),
    }
}

/// Peer-to-peer barrier.
///
/// The agent re-broadcasts its `Ready` with backoff and counts distinct
/// senders, itself included. Proposals share the same fanout and queue, so
/// one that arrives early is buffered by the round.
pub struct SelfCountedBarrier;

#[async_trait]
impl ReadinessStrategy for SelfCountedBarrier {
    fn mode(&self) -> BarrierMode {
        BarrierMode::SelfCounted
    }

    async fn synchronize(
        &self,
        ctx: &RoundContext<'_>,
        round: &mut RoundState,
    ) -> Result<ProposalChannel, RunRoundError> {
        let exchange = ctx.topology.swarm_exchange.clone();
        ctx.bus.declare_fanout(&exchange).await?;
        let queue = ctx.bus.bind_exclusive(&exchange).await?;
        debug!(agent = %round.identity(), %queue, "Bound to swarm exchange");

        let ready = round.ready_message().encode();
        let destination = Destination::exchange(exchange.as_str());
        let deadline = Deadline::after(ctx.params.deadlines.readiness);
        let pump = ctx.pump(&queue);
        let mut interval = ctx.params.polling.announce_interval;
        let mut announcements = 0usize;

        loop {
            ctx.bus.publish(&destination, &ready, false).await?;
            announcements += 1;

            let next_announce = Instant::now() + interval;
            match pump
                .run(round, &deadline, Some(next_announce), |r| r.barrier_passed())
                .await?
            {
                PumpExit::Done => break,
                PumpExit::Paused => {
                    interval = ctx.params.polling.next_announce_interval(interval);
                }
                PumpExit::Expired => return Err(abort_round(round, AbortCause::DeadlineExceeded)),
                PumpExit::Cancelled => return Err(abort_round(round, AbortCause::Cancelled)),
            }
        }

        info!(
            agent = %round.identity(),
            ready = round.ready_count(),
            announcements,
            "Self-counted barrier passed"
        );
        Ok(ProposalChannel { exchange, queue })
    }
}

/// Coordinator-driven barrier.
///
/// The agent binds its start and proposal queues first, sends one
/// persistent `Ready` to the coordinator's queue, then waits for `Begin`.
/// Binding the proposal queue up front keeps proposals from fast peers.
pub struct CoordinatedBarrier;

#[async_trait]
impl ReadinessStrategy for CoordinatedBarrier {
    fn mode(&self) -> BarrierMode {
        BarrierMode::Coordinated
    }

    async fn synchronize(
        &self,
        ctx: &RoundContext<'_>,
        round: &mut RoundState,
    ) -> Result<ProposalChannel, RunRoundError> {
        let topology = ctx.topology;

        ctx.bus.declare_fanout(&topology.start_exchange).await?;
        let start_queue = ctx.bus.bind_exclusive(&topology.start_exchange).await?;
        ctx.bus.declare_fanout(&topology.proposal_exchange).await?;
        let proposal_queue = ctx.bus.bind_exclusive(&topology.proposal_exchange).await?;
        ctx.bus.declare_queue(&topology.readiness_queue).await?;

        ctx.bus
            .publish(
                &Destination::queue(topology.readiness_queue.as_str()),
                &round.ready_message().encode(),
                true,
            )
            .await?;
        debug!(agent = %round.identity(), queue = %topology.readiness_queue, "Sent ready to coordinator");

        let deadline = Deadline::after(ctx.params.deadlines.readiness);
        match ctx
            .pump(&start_queue)
            .run(round, &deadline, None, |r| r.barrier_passed())
            .await?
        {
            PumpExit::Done | PumpExit::Paused => {}
            PumpExit::Expired => return Err(abort_round(round, AbortCause::DeadlineExceeded)),
            PumpExit::Cancelled => return Err(abort_round(round, AbortCause::Cancelled)),
        }

        info!(agent = %round.identity(), "Received begin signal");
        Ok(ProposalChannel {
            exchange: topology.proposal_exchange.clone(),
            queue: proposal_queue,
        })
    }
}
