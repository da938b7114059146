//! Plurality vote tally
//!
//! Turns the collected proposals of a round into one decision. The rule is
//! plurality with a deterministic tie-break: when several values share the
//! highest count, the lexicographically smallest wins. Any two agents that
//! collected the same multiset of proposals therefore decide the same value
//! without another round of communication, whatever order the proposals
//! arrived in.

use crate::core::error::DomainError;
use crate::core::proposal::Proposal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Result of tallying a round's proposals
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallyOutcome {
    /// The winning proposal
    pub decision: Proposal,
    /// Votes per distinct proposal, ordered by proposal value
    pub counts: BTreeMap<Proposal, usize>,
    /// All proposals that reached the highest count (sorted, includes the winner)
    pub leaders: Vec<Proposal>,
    /// Total number of proposals tallied
    pub total_votes: usize,
}

impl TallyOutcome {
    /// Whether the tie-break rule had to choose between several leaders
    pub fn was_tie(&self) -> bool {
        self.leaders.len() > 1
    }

    /// Number of votes the decision received
    pub fn winning_count(&self) -> usize {
        self.counts.get(&self.decision).copied().unwrap_or(0)
    }

    /// Whether every tallied proposal was the same value
    pub fn is_unanimous(&self) -> bool {
        self.winning_count() == self.total_votes
    }

    /// Compact summary such as `x:2 y:1`
    pub fn summary(&self) -> String {
        self.counts
            .iter()
            .map(|(proposal, count)| format!("{}:{}", proposal, count))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Tally proposals by plurality with lexicographic tie-break.
///
/// Fails with [`DomainError::InsufficientData`] on empty input; callers must
/// only tally once collection is complete.
pub fn tally(proposals: &[Proposal]) -> Result<TallyOutcome, DomainError> {
    if proposals.is_empty() {
        return Err(DomainError::InsufficientData {
            what: "proposals",
            received: 0,
            expected: 1,
        });
    }

    let mut counts: BTreeMap<Proposal, usize> = BTreeMap::new();
    for proposal in proposals {
        *counts.entry(proposal.clone()).or_insert(0) += 1;
    }

    let max_count = counts.values().copied().max().unwrap_or(0);

    // BTreeMap iterates in key order, so leaders come out already sorted
    let leaders: Vec<Proposal> = counts
        .iter()
        .filter(|(_, count)| **count == max_count)
        .map(|(proposal, _)| proposal.clone())
        .collect();

    let decision = leaders[0].clone();

    Ok(TallyOutcome {
        decision,
        counts,
        leaders,
        total_votes: proposals.len(),
    })
}
