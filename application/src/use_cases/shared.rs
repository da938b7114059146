//! Shared utilities for use cases.
//!
//! Deadline bookkeeping, cancellable receive and the decode → handle → ack
//! dispatch used by both barrier strategies and the proposal exchange.

use crate::ports::message_bus::{BusError, Delivery, MessageBus};
use crate::ports::progress::RoundProgressNotifier;
use std::time::Duration;
use swarm_vote_domain::{ProtocolMessage, RoundEvent, RoundPhase, RoundState};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Optional point in time after which a phase gives up.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Deadline(Option<Instant>);

impl Deadline {
    /// A limit too large to represent as an instant means no deadline.
    pub(crate) fn after(limit: Option<Duration>) -> Self {
        Self(limit.and_then(|limit| Instant::now().checked_add(limit)))
    }

    pub(crate) fn expired(&self) -> bool {
        self.0.is_some_and(|at| Instant::now() >= at)
    }

    /// Shorten `wait` so it never runs past the deadline.
    pub(crate) fn clamp(&self, wait: Duration) -> Duration {
        match self.0 {
            Some(at) => wait.min(at.saturating_duration_since(Instant::now())),
            None => wait,
        }
    }
}

pub(crate) fn is_cancelled(token: &Option<CancellationToken>) -> bool {
    token.as_ref().is_some_and(|t| t.is_cancelled())
}

/// Result of one bounded receive.
pub(crate) enum Wait {
    Delivery(Delivery),
    Idle,
    Cancelled,
}

/// Receive from `queue` for at most `wait`, returning early on cancellation.
pub(crate) async fn recv_cancellable(
    bus: &dyn MessageBus,
    queue: &str,
    wait: Duration,
    cancellation_token: &Option<CancellationToken>,
) -> Result<Wait, BusError> {
    let received = if let Some(token) = cancellation_token {
        tokio::select! {
            biased;
            _ = token.cancelled() => return Ok(Wait::Cancelled),
            received = bus.recv(queue, wait) => received?,
        }
    } else {
        bus.recv(queue, wait).await?
    };

    Ok(match received {
        Some(delivery) => Wait::Delivery(delivery),
        None => Wait::Idle,
    })
}

/// Why a pump loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PumpExit {
    /// The stop condition holds
    Done,
    /// The `until` instant was reached first
    Paused,
    Expired,
    Cancelled,
}

/// Everything a pump loop needs besides the round itself.
pub(crate) struct Pump<'a> {
    pub bus: &'a dyn MessageBus,
    pub queue: &'a str,
    pub poll_interval: Duration,
    pub progress: &'a dyn RoundProgressNotifier,
    pub cancellation_token: &'a Option<CancellationToken>,
}

impl Pump<'_> {
    /// Apply deliveries to `round` until `done` holds, `until` passes, the
    /// deadline expires or cancellation is requested.
    pub(crate) async fn run(
        &self,
        round: &mut RoundState,
        deadline: &Deadline,
        until: Option<Instant>,
        done: impl Fn(&RoundState) -> bool,
    ) -> Result<PumpExit, BusError> {
        loop {
            if done(round) {
                return Ok(PumpExit::Done);
            }
            if is_cancelled(self.cancellation_token) {
                return Ok(PumpExit::Cancelled);
            }
            if deadline.expired() {
                return Ok(PumpExit::Expired);
            }

            let mut wait = deadline.clamp(self.poll_interval);
            if let Some(until) = until {
                let now = Instant::now();
                if now >= until {
                    return Ok(PumpExit::Paused);
                }
                wait = wait.min(until - now);
            }

            match recv_cancellable(self.bus, self.queue, wait, self.cancellation_token).await? {
                Wait::Delivery(delivery) => {
                    apply_delivery(self.bus, round, delivery, self.progress).await?;
                }
                Wait::Idle => {}
                Wait::Cancelled => return Ok(PumpExit::Cancelled),
            }
        }
    }
}

/// Decode one delivery, advance the round and acknowledge.
///
/// Malformed payloads are logged and acknowledged so they never come back.
pub(crate) async fn apply_delivery(
    bus: &dyn MessageBus,
    round: &mut RoundState,
    delivery: Delivery,
    progress: &dyn RoundProgressNotifier,
) -> Result<Vec<RoundEvent>, BusError> {
    let events = match ProtocolMessage::decode(&delivery.payload) {
        Ok(message) => {
            trace!(
                agent = %round.identity(),
                kind = message.kind(),
                redelivered = delivery.redelivered,
                "Received message"
            );
            let events = round.handle(message);
            report_events(round, &events, progress);
            events
        }
        Err(e) => {
            warn!(agent = %round.identity(), error = %e, "Discarding malformed message");
            Vec::new()
        }
    };

    bus.ack(delivery.tag).await?;
    Ok(events)
}

fn report_events(round: &RoundState, events: &[RoundEvent], progress: &dyn RoundProgressNotifier) {
    let agent = round.identity();
    let expected = round.swarm_size().get();

    for event in events {
        match event {
            RoundEvent::ReadyCounted { sender, ready } => {
                debug!(%agent, %sender, ready, expected, "Counted ready peer");
                progress.on_ready_counted(agent, *ready, expected);
            }
            RoundEvent::BarrierReached { ready } => {
                info!(%agent, ready, "Barrier passed");
                progress.on_phase_change(agent, RoundPhase::ProposalExchange);
            }
            RoundEvent::ProposalCollected {
                sender,
                value,
                collected,
            } => {
                debug!(%agent, %sender, %value, collected, expected, "Collected proposal");
                progress.on_proposal_collected(agent, *collected, expected);
            }
            RoundEvent::Decided(outcome) => {
                info!(
                    %agent,
                    decision = %outcome.decision,
                    tally = %outcome.summary(),
                    "Decision reached"
                );
                progress.on_phase_change(agent, RoundPhase::Decided);
                progress.on_decided(agent, outcome);
            }
            RoundEvent::DuplicateProposal { sender } => {
                warn!(%agent, %sender, "Ignoring second proposal from sender");
            }
            RoundEvent::ProposalOverCap { sender } => {
                warn!(%agent, %sender, "Ignoring proposal beyond swarm size");
            }
            RoundEvent::StaleReady { sender } => {
                debug!(%agent, %sender, "Discarding Ready received after the barrier");
            }
            RoundEvent::StaleBegin => {
                debug!(%agent, "Discarding Begin received outside readiness");
            }
            RoundEvent::DuplicateReady { .. } | RoundEvent::Ignored { .. } => {
                trace!(%agent, ?event, "No effect");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_deadline_expires() {
        let deadline = Deadline::after(Some(Duration::from_millis(100)));
        assert!(!deadline.expired());
        assert_eq!(
            deadline.clamp(Duration::from_secs(1)),
            Duration::from_millis(100)
        );

        tokio::time::advance(Duration::from_millis(100)).await;
        assert!(deadline.expired());
        assert_eq!(deadline.clamp(Duration::from_secs(1)), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_deadline_never_expires() {
        let deadline = Deadline::after(None);
        tokio::time::advance(Duration::from_secs(3600)).await;
        assert!(!deadline.expired());
        assert_eq!(deadline.clamp(Duration::from_secs(1)), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrepresentable_deadline_waits_forever() {
        for limit in [Duration::MAX, Duration::from_secs(i64::MAX as u64)] {
            let deadline = Deadline::after(Some(limit));
            tokio::time::advance(Duration::from_secs(3600)).await;
            assert!(!deadline.expired());
            assert_eq!(deadline.clamp(Duration::from_secs(1)), Duration::from_secs(1));
        }
    }

    #[test]
    fn test_is_cancelled() {
        assert!(!is_cancelled(&None));
        let token = CancellationToken::new();
        let wrapped = Some(token.clone());
        assert!(!is_cancelled(&wrapped));
        token.cancel();
        assert!(is_cancelled(&wrapped));
    }
}
