//! Run Barrier use case
//!
//! The coordinator side of the coordinated barrier: consume `Ready` signals
//! from the durable readiness queue and broadcast `Begin` exactly once when
//! the whole swarm is ready.

use super::run_round::AbortCause;
use super::shared::{Deadline, Wait, is_cancelled, recv_cancellable};
use crate::config::{BusTopology, RoundParams};
use crate::ports::message_bus::{BusError, Delivery, Destination, MessageBus};
use crate::ports::progress::{NoProgress, RoundProgressNotifier};
use serde::Serialize;
use swarm_vote_domain::{BarrierState, BarrierStep, DomainError, ProtocolMessage, SwarmSize};
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Errors that can occur while coordinating the barrier
#[derive(Error, Debug)]
pub enum RunBarrierError {
    #[error("Bus error: {0}")]
    Bus(#[from] BusError),

    #[error("Barrier aborted ({cause}): {source}")]
    Aborted {
        cause: AbortCause,
        #[source]
        source: DomainError,
    },
}

/// What the coordinator saw during one round
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BarrierReport {
    /// Distinct senders counted before release
    pub ready: usize,
    /// Stale messages dropped from the readiness queue at startup
    pub purged: usize,
    pub duplicates: usize,
    /// Signals acknowledged after `Begin` went out
    pub late_signals: usize,
    /// Payloads that were not a `Ready`
    pub discarded: usize,
}

/// Use case for coordinating one round's barrier
pub struct RunBarrierUseCase<B: MessageBus> {
    bus: B,
    topology: BusTopology,
    params: RoundParams,
    cancellation_token: Option<CancellationToken>,
}

impl<B: MessageBus> RunBarrierUseCase<B> {
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

    /// Prepare and run the barrier without progress reporting
    pub async fn execute(self, swarm_size: SwarmSize) -> Result<BarrierReport, RunBarrierError> {
        self.prepare().await?.run(swarm_size, &NoProgress).await
    }

    /// Declare the topology, purge leftovers and limit prefetch.
    ///
    /// Agents must not send `Ready` before this returns, or the purge may
    /// drop their signal.
    pub async fn prepare(self) -> Result<ListeningBarrier<B>, RunBarrierError> {
        match self.declare().await {
            Ok(purged) => {
                if purged > 0 {
                    warn!(purged, queue = %self.topology.readiness_queue, "Purged stale readiness signals");
                }
                Ok(ListeningBarrier {
                    inner: self,
                    purged,
                })
            }
            Err(e) => {
                self.bus.close().await;
                Err(e.into())
            }
        }
    }

    async fn declare(&self) -> Result<usize, BusError> {
        self.bus.declare_queue(&self.topology.readiness_queue).await?;
        let purged = self.bus.purge(&self.topology.readiness_queue).await?;
        self.bus.set_prefetch(1).await?;
        self.bus.declare_fanout(&self.topology.start_exchange).await?;
        Ok(purged)
    }
}

/// A coordinator that is consuming its readiness queue
pub struct ListeningBarrier<B: MessageBus> {
    inner: RunBarrierUseCase<B>,
    purged: usize,
}

impl<B: MessageBus> ListeningBarrier<B> {
    /// Count signals until release, then linger, then close the connection
    pub async fn run(
        self,
        swarm_size: SwarmSize,
        progress: &dyn RoundProgressNotifier,
    ) -> Result<BarrierReport, RunBarrierError> {
        let mut state = BarrierState::new(swarm_size);
        let mut report = BarrierReport {
            purged: self.purged,
            ..BarrierReport::default()
        };
        info!(swarm_size = %swarm_size, "Waiting for readiness signals");

        let result = self.listen(&mut state, &mut report, progress).await;
        self.inner.bus.close().await;
        report.ready = state.ready_count();
        result.map(|_| report)
    }

    async fn listen(
        &self,
        state: &mut BarrierState,
        report: &mut BarrierReport,
        progress: &dyn RoundProgressNotifier,
    ) -> Result<(), RunBarrierError> {
        let bus = &self.inner.bus;
        let queue = self.inner.topology.readiness_queue.as_str();
        let token = &self.inner.cancellation_token;
        let poll_interval = self.inner.params.polling.poll_interval;
        let deadline = Deadline::after(self.inner.params.deadlines.readiness);

        while !state.signal_sent() {
            let cause = if is_cancelled(token) {
                Some(AbortCause::Cancelled)
            } else if deadline.expired() {
                Some(AbortCause::DeadlineExceeded)
            } else {
                None
            };
            if let Some(cause) = cause {
                return Err(Self::aborted(state, cause));
            }

            match recv_cancellable(bus, queue, deadline.clamp(poll_interval), token).await? {
                Wait::Delivery(delivery) => {
                    self.on_delivery(state, delivery, report, progress).await?
                }
                Wait::Idle => {}
                Wait::Cancelled => return Err(Self::aborted(state, AbortCause::Cancelled)),
            }
        }

        // Late signals are acknowledged so they do not linger on the queue
        let linger_until = Instant::now() + self.inner.params.linger;
        loop {
            let now = Instant::now();
            if now >= linger_until || is_cancelled(token) {
                break;
            }
            match recv_cancellable(bus, queue, linger_until - now, token).await? {
                Wait::Delivery(delivery) => {
                    self.on_delivery(state, delivery, report, progress).await?
                }
                Wait::Idle => {}
                Wait::Cancelled => break,
            }
        }
        Ok(())
    }

    async fn on_delivery(
        &self,
        state: &mut BarrierState,
        delivery: Delivery,
        report: &mut BarrierReport,
        progress: &dyn RoundProgressNotifier,
    ) -> Result<(), BusError> {
        let expected = state.swarm_size().get();
        match ProtocolMessage::decode(&delivery.payload) {
            Ok(ProtocolMessage::Ready { sender }) => match state.on_ready(sender) {
                BarrierStep::Counted { sender, ready } => {
                    info!(%sender, ready, expected, "Counted readiness signal");
                }
                BarrierStep::Duplicate { sender } => {
                    debug!(%sender, "Duplicate readiness signal");
                    report.duplicates += 1;
                }
                BarrierStep::Release { sender, ready } => {
                    info!(%sender, ready, expected, "Swarm ready");
                    self.inner
                        .bus
                        .publish(
                            &Destination::exchange(self.inner.topology.start_exchange.as_str()),
                            &state.begin_signal().encode(),
                            true,
                        )
                        .await?;
                    info!(exchange = %self.inner.topology.start_exchange, "Begin signal sent");
                    progress.on_barrier_released(ready);
                }
                BarrierStep::Late { sender } => {
                    debug!(%sender, "Readiness signal after begin");
                    report.late_signals += 1;
                }
            },
            Ok(other) => {
                warn!(kind = other.kind(), "Unexpected message on readiness queue");
                report.discarded += 1;
            }
            Err(e) => {
                warn!(error = %e, "Discarding malformed readiness signal");
                report.discarded += 1;
            }
        }

        self.inner.bus.ack(delivery.tag).await
    }

    fn aborted(state: &BarrierState, cause: AbortCause) -> RunBarrierError {
        RunBarrierError::Aborted {
            cause,
            source: DomainError::InsufficientData {
                what: "readiness signals",
                received: state.ready_count(),
                expected: state.swarm_size().get(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::use_cases::test_support::ScriptedBus;
    use std::time::Duration;
    use swarm_vote_domain::AgentId;

    fn ready(s: &str) -> Vec<u8> {
        ProtocolMessage::ready(AgentId::new(s).unwrap()).encode()
    }

    fn params() -> RoundParams {
        RoundParams::default().with_poll_interval(Duration::from_millis(10))
    }

    #[tokio::test(start_paused = true)]
    async fn test_releases_once_and_ignores_duplicates() {
        let topology = BusTopology::default();
        let bus = ScriptedBus::new();
        let use_case = RunBarrierUseCase::new(bus.clone(), topology.clone(), params());
        let listening = use_case.prepare().await.unwrap();

        for sender in ["r1", "r1", "r2", "r3"] {
            bus.script_queue(&topology.readiness_queue, ready(sender));
        }
        let report = listening
            .run(SwarmSize::new(3).unwrap(), &NoProgress)
            .await
            .unwrap();

        assert_eq!(report.ready, 3);
        assert_eq!(report.duplicates, 1);
        let begins = bus.published_begins();
        assert_eq!(begins.len(), 1);
        assert!(begins[0].1, "begin must be persistent");
        assert_eq!(bus.unacked(), 0);
        assert!(bus.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_prepare_purges_stale_signals() {
        let topology = BusTopology::default();
        let bus = ScriptedBus::new();
        bus.script_queue(&topology.readiness_queue, ready("old1"));
        bus.script_queue(&topology.readiness_queue, ready("old2"));

        let use_case = RunBarrierUseCase::new(bus.clone(), topology.clone(), params());
        let listening = use_case.prepare().await.unwrap();
        assert_eq!(bus.purged(), 2);

        bus.script_queue(&topology.readiness_queue, ready("r1"));
        let report = listening
            .run(SwarmSize::new(1).unwrap(), &NoProgress)
            .await
            .unwrap();
        assert_eq!(report.purged, 2);
        assert_eq!(report.ready, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_linger_acks_late_and_malformed_signals() {
        let topology = BusTopology::default();
        let bus = ScriptedBus::new();
        let use_case = RunBarrierUseCase::new(
            bus.clone(),
            topology.clone(),
            params().with_linger(Duration::from_millis(100)),
        );
        let listening = use_case.prepare().await.unwrap();

        bus.script_queue(&topology.readiness_queue, b"{broken".to_vec());
        bus.script_queue(&topology.readiness_queue, ready("r1"));
        bus.script_queue(&topology.readiness_queue, ready("r1"));
        bus.script_queue(&topology.readiness_queue, ready("r9"));

        let report = listening
            .run(SwarmSize::new(1).unwrap(), &NoProgress)
            .await
            .unwrap();
        assert_eq!(report.discarded, 1);
        assert_eq!(report.late_signals, 2);
        assert_eq!(bus.published_begins().len(), 1);
        assert_eq!(bus.unacked(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_aborts_without_begin() {
        let topology = BusTopology::default();
        let bus = ScriptedBus::new();
        bus.script_queue(&topology.readiness_queue, ready("r1"));

        let use_case = RunBarrierUseCase::new(
            bus.clone(),
            topology.clone(),
            params().with_readiness_timeout(Some(Duration::from_millis(200))),
        );
        // r1 is dropped by the purge
        let listening = use_case.prepare().await.unwrap();
        bus.script_queue(&topology.readiness_queue, ready("r2"));

        let err = listening
            .run(SwarmSize::new(3).unwrap(), &NoProgress)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("1 of 3 readiness signals"));
        assert!(bus.published_begins().is_empty());
    }
}
