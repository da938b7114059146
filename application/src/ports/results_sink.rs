//! Results sink port
//!
//! Every agent appends one record per round, decided or not.

use serde::Serialize;
use std::time::Duration;
use swarm_vote_domain::{AgentId, Proposal};
use thiserror::Error;

/// Errors that can occur while recording results
#[derive(Error, Debug)]
pub enum ResultsError {
    #[error("Failed to write results: {0}")]
    Io(#[from] std::io::Error),
}

/// One agent's result line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoundRecord {
    pub identity: AgentId,
    /// `None` when the round was aborted
    pub decision: Option<Proposal>,
    /// Time from own proposal emission to decision
    pub elapsed: Duration,
}

impl RoundRecord {
    pub fn decided(identity: AgentId, decision: Proposal, elapsed: Duration) -> Self {
        Self {
            identity,
            decision: Some(decision),
            elapsed,
        }
    }

    pub fn aborted(identity: AgentId) -> Self {
        Self {
            identity,
            decision: None,
            elapsed: Duration::ZERO,
        }
    }

    /// `identity,decision,seconds` with four decimals and no header
    pub fn csv_line(&self) -> String {
        format!(
            "{},{},{:.4}",
            self.identity,
            self.decision.as_ref().map(|d| d.as_str()).unwrap_or(""),
            self.elapsed.as_secs_f64()
        )
    }
}

/// Destination for round results
pub trait ResultsSink: Send + Sync {
    fn record(&self, record: &RoundRecord) -> Result<(), ResultsError>;
}

/// Sink that drops every record
pub struct NoResultsSink;

impl ResultsSink for NoResultsSink {
    fn record(&self, _record: &RoundRecord) -> Result<(), ResultsError> {
        Ok(())
    }
}
