//! Timing configuration from TOML (`[timing]` section)

use serde::{Deserialize, Serialize};
use std::time::Duration;
use swarm_vote_application::config::{Deadlines, PollingParams, RoundParams};
use swarm_vote_domain::{ConfigIssue, ConfigIssueCode};

/// Raw timing configuration from TOML
///
/// # Example
///
/// ```toml
/// [timing]
/// poll_interval_ms = 200
/// announce_interval_ms = 500
/// announce_backoff = 1.5
/// max_announce_interval_ms = 5000
/// readiness_timeout_secs = 30        # omit to wait forever
/// proposal_timeout_secs = 30         # omit to wait forever
/// linger_ms = 0
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileTimingConfig {
    pub poll_interval_ms: u64,
    pub announce_interval_ms: u64,
    pub announce_backoff: f64,
    pub max_announce_interval_ms: u64,
    pub readiness_timeout_secs: Option<u64>,
    pub proposal_timeout_secs: Option<u64>,
    /// Coordinator only: how long to keep acknowledging late signals
    pub linger_ms: u64,
}

impl Default for FileTimingConfig {
    fn default() -> Self {
        let polling = PollingParams::default();
        Self {
            poll_interval_ms: polling.poll_interval.as_millis() as u64,
            announce_interval_ms: polling.announce_interval.as_millis() as u64,
            announce_backoff: polling.announce_backoff,
            max_announce_interval_ms: polling.max_announce_interval.as_millis() as u64,
            readiness_timeout_secs: None,
            proposal_timeout_secs: None,
            linger_ms: 0,
        }
    }
}

impl FileTimingConfig {
    /// Convert to round parameters, collecting issues.
    ///
    /// Zero intervals are errors; they are replaced by the defaults so the
    /// returned value is always usable.
    pub fn to_round_params(&self) -> (RoundParams, Vec<ConfigIssue>) {
        let mut issues = Vec::new();
        let defaults = PollingParams::default();

        let mut interval = |field: &str, ms: u64, fallback: Duration| {
            if ms == 0 {
                issues.push(ConfigIssue::error(
                    ConfigIssueCode::ZeroInterval {
                        field: format!("timing.{}", field),
                    },
                    format!("timing.{}: must be greater than 0", field),
                ));
                fallback
            } else {
                Duration::from_millis(ms)
            }
        };

        let poll_interval = interval("poll_interval_ms", self.poll_interval_ms, defaults.poll_interval);
        let announce_interval = interval(
            "announce_interval_ms",
            self.announce_interval_ms,
            defaults.announce_interval,
        );
        let max_announce_interval = interval(
            "max_announce_interval_ms",
            self.max_announce_interval_ms,
            defaults.max_announce_interval,
        );

        let mut timeout = |field: &str, secs: Option<u64>| match secs {
            Some(0) => {
                issues.push(ConfigIssue::error(
                    ConfigIssueCode::ZeroInterval {
                        field: format!("timing.{}", field),
                    },
                    format!("timing.{}: omit it to wait forever, 0 would abort at once", field),
                ));
                None
            }
            other => other.map(Duration::from_secs),
        };

        let deadlines = Deadlines {
            readiness: timeout("readiness_timeout_secs", self.readiness_timeout_secs),
            proposals: timeout("proposal_timeout_secs", self.proposal_timeout_secs),
        };

        let backoff = self.announce_backoff;
        let unbounded = !backoff.is_finite() || backoff > PollingParams::MAX_ANNOUNCE_BACKOFF;
        let announce_backoff = if unbounded {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::OutOfRange {
                    field: "timing.announce_backoff".to_string(),
                    value: backoff.to_string(),
                },
                format!(
                    "timing.announce_backoff: {} is not a number between 1.0 and {}",
                    backoff,
                    PollingParams::MAX_ANNOUNCE_BACKOFF
                ),
            ));
            defaults.announce_backoff
        } else {
            if backoff < 1.0 {
                issues.push(ConfigIssue::warning(
                    ConfigIssueCode::OutOfRange {
                        field: "timing.announce_backoff".to_string(),
                        value: backoff.to_string(),
                    },
                    format!(
                        "timing.announce_backoff: {} is below 1.0, announcements will not back off",
                        backoff
                    ),
                ));
            }
            backoff
        };

        let params = RoundParams {
            polling: PollingParams {
                poll_interval,
                announce_interval,
                announce_backoff,
                max_announce_interval,
            },
            deadlines,
            linger: Duration::from_millis(self.linger_ms),
        };
        (params, issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_round_trips_to_default_params() {
        let (params, issues) = FileTimingConfig::default().to_round_params();
        assert!(issues.is_empty());
        assert_eq!(params, RoundParams::default());
    }

    #[test]
    fn test_zero_interval_is_error_and_falls_back() {
        let config = FileTimingConfig {
            poll_interval_ms: 0,
            ..Default::default()
        };
        let (params, issues) = config.to_round_params();
        assert_eq!(issues.len(), 1);
        assert!(issues[0].is_error());
        assert_eq!(params.polling.poll_interval, PollingParams::default().poll_interval);
    }

    #[test]
    fn test_timeouts() {
        let config = FileTimingConfig {
            readiness_timeout_secs: Some(10),
            proposal_timeout_secs: Some(0),
            ..Default::default()
        };
        let (params, issues) = config.to_round_params();
        assert_eq!(params.deadlines.readiness, Some(Duration::from_secs(10)));
        assert_eq!(params.deadlines.proposals, None);
        assert!(matches!(
            &issues[0].code,
            ConfigIssueCode::ZeroInterval { field } if field == "timing.proposal_timeout_secs"
        ));
    }

    #[test]
    fn test_low_backoff_warns() {
        let config = FileTimingConfig {
            announce_backoff: 0.5,
            ..Default::default()
        };
        let (_, issues) = config.to_round_params();
        assert_eq!(issues.len(), 1);
        assert!(!issues[0].is_error());
    }

    #[test]
    fn test_unbounded_backoff_is_error_and_falls_back() {
        for backoff in [f64::INFINITY, f64::NAN, 1e20] {
            let config = FileTimingConfig {
                announce_backoff: backoff,
                ..Default::default()
            };
            let (params, issues) = config.to_round_params();
            assert_eq!(issues.len(), 1, "backoff {}", backoff);
            assert!(issues[0].is_error());
            assert_eq!(
                params.polling.announce_backoff,
                PollingParams::default().announce_backoff
            );
        }
    }

    #[test]
    fn test_largest_accepted_backoff() {
        let config = FileTimingConfig {
            announce_backoff: PollingParams::MAX_ANNOUNCE_BACKOFF,
            ..Default::default()
        };
        let (params, issues) = config.to_round_params();
        assert!(issues.is_empty());
        assert_eq!(
            params.polling.next_announce_interval(params.polling.max_announce_interval),
            params.polling.max_announce_interval
        );
    }
}
