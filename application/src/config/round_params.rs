//! Round parameters: receive loop control.
//!
//! [`RoundParams`] groups the timing knobs used by
//! [`RunRoundUseCase`](crate::use_cases::run_round::RunRoundUseCase) and
//! [`RunBarrierUseCase`](crate::use_cases::run_barrier::RunBarrierUseCase).
//! These are application-layer concerns, not protocol rules.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Polling and re-announcement cadence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PollingParams {
    /// Upper bound on a single blocking receive.
    pub poll_interval: Duration,
    /// Initial gap between two `Ready` broadcasts (self-counted barrier).
    pub announce_interval: Duration,
    /// Multiplier applied to the announce gap after every broadcast.
    pub announce_backoff: f64,
    /// Ceiling for the announce gap.
    pub max_announce_interval: Duration,
}

impl Default for PollingParams {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(200),
            announce_interval: Duration::from_millis(500),
            announce_backoff: 1.5,
            max_announce_interval: Duration::from_secs(5),
        }
    }
}

impl PollingParams {
    /// Largest backoff factor accepted from configuration.
    pub const MAX_ANNOUNCE_BACKOFF: f64 = 100.0;

    /// The announce gap that follows `current`.
    ///
    /// A backoff below `1.0` is treated as `1.0` so the gap never shrinks.
    /// A product too large for a `Duration` saturates at the ceiling.
    pub fn next_announce_interval(&self, current: Duration) -> Duration {
        let ceiling = self.max_announce_interval.max(self.announce_interval);
        let factor = self.announce_backoff.max(1.0);
        Duration::try_from_secs_f64(current.as_secs_f64() * factor)
            .map_or(ceiling, |next| next.min(ceiling))
    }
}

/// Optional per-phase time limits. `None` waits forever.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deadlines {
    pub readiness: Option<Duration>,
    pub proposals: Option<Duration>,
}

/// Timing for one round, on either side of the barrier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RoundParams {
    pub polling: PollingParams,
    pub deadlines: Deadlines,
    /// How long the coordinator keeps draining late signals after `Begin`.
    pub linger: Duration,
}

impl RoundParams {
    // ==================== Builder Methods ====================

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.polling.poll_interval = interval;
        self
    }

    pub fn with_announce_interval(mut self, interval: Duration) -> Self {
        self.polling.announce_interval = interval;
        self
    }

    pub fn with_announce_backoff(mut self, factor: f64, max: Duration) -> Self {
        self.polling.announce_backoff = factor;
        self.polling.max_announce_interval = max;
        self
    }

    pub fn with_readiness_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.deadlines.readiness = timeout;
        self
    }

    pub fn with_proposal_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.deadlines.proposals = timeout;
        self
    }

    pub fn with_linger(mut self, linger: Duration) -> Self {
        self.linger = linger;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        let params = RoundParams::default();
        assert_eq!(params.polling.poll_interval, Duration::from_millis(200));
        assert_eq!(params.polling.announce_interval, Duration::from_millis(500));
        assert!(params.deadlines.readiness.is_none());
        assert!(params.deadlines.proposals.is_none());
        assert_eq!(params.linger, Duration::ZERO);
    }

    #[test]
    fn test_builder() {
        let params = RoundParams::default()
            .with_poll_interval(Duration::from_millis(10))
            .with_readiness_timeout(Some(Duration::from_secs(2)))
            .with_linger(Duration::from_millis(50));

        assert_eq!(params.polling.poll_interval, Duration::from_millis(10));
        assert_eq!(params.deadlines.readiness, Some(Duration::from_secs(2)));
        assert_eq!(params.linger, Duration::from_millis(50));
    }

    #[test]
    fn test_announce_backoff_is_capped() {
        let polling = PollingParams {
            poll_interval: Duration::from_millis(100),
            announce_interval: Duration::from_millis(100),
            announce_backoff: 2.0,
            max_announce_interval: Duration::from_millis(300),
        };

        let second = polling.next_announce_interval(polling.announce_interval);
        assert_eq!(second, Duration::from_millis(200));
        let third = polling.next_announce_interval(second);
        assert_eq!(third, Duration::from_millis(300));
        assert_eq!(polling.next_announce_interval(third), Duration::from_millis(300));
    }

    #[test]
    fn test_backoff_below_one_keeps_interval() {
        let polling = PollingParams {
            announce_backoff: 0.5,
            ..PollingParams::default()
        };
        assert_eq!(
            polling.next_announce_interval(Duration::from_millis(500)),
            Duration::from_millis(500)
        );
    }

    #[test]
    fn test_huge_backoff_saturates_at_ceiling() {
        for backoff in [f64::INFINITY, 1e20, f64::MAX] {
            let polling = PollingParams {
                announce_backoff: backoff,
                ..PollingParams::default()
            };
            assert_eq!(
                polling.next_announce_interval(Duration::from_millis(500)),
                polling.max_announce_interval
            );
            assert_eq!(
                polling.next_announce_interval(Duration::MAX),
                polling.max_announce_interval
            );
        }
    }
}
