//! Proposal values and the swarm-wide legal proposal set

use super::error::DomainError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single proposal value.
///
/// Ordering is the natural lexicographic order of the underlying string,
/// which is what the tie-break in [`tally`](crate::protocol::tally::tally)
/// relies on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Proposal(String);

impl Proposal {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Proposal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Proposal {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Proposal {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// The fixed, finite set of proposals every participant knows in advance.
///
/// Always non-empty; values are kept sorted and unique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalSet {
    values: Vec<Proposal>,
}

impl ProposalSet {
    /// Built-in legal proposals used when nothing is configured
    pub const DEFAULT_VALUES: [&'static str; 4] = ["east", "north", "south", "west"];

    pub fn new<I, S>(values: I) -> Result<Self, DomainError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut values: Vec<Proposal> = values
            .into_iter()
            .map(Into::into)
            .filter(|v: &String| !v.trim().is_empty())
            .map(Proposal::new)
            .collect();
        values.sort();
        values.dedup();

        if values.is_empty() {
            return Err(DomainError::EmptyProposalSet);
        }
        Ok(Self { values })
    }

    pub fn contains(&self, proposal: &Proposal) -> bool {
        self.values.binary_search(proposal).is_ok()
    }

    /// Validate a raw value against the set
    pub fn validate(&self, value: &str) -> Result<Proposal, DomainError> {
        let proposal = Proposal::new(value);
        if self.contains(&proposal) {
            Ok(proposal)
        } else {
            Err(DomainError::IllegalProposal {
                value: value.to_string(),
                legal: self.to_string(),
            })
        }
    }

    /// Pick a uniformly random member of the set
    pub fn choose_random(&self) -> Proposal {
        let index = rand::thread_rng().gen_range(0..self.values.len());
        self.values[index].clone()
    }

    pub fn values(&self) -> &[Proposal] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Default for ProposalSet {
    fn default() -> Self {
        Self {
            values: Self::DEFAULT_VALUES.iter().map(|v| Proposal::from(*v)).collect(),
        }
    }
}

impl fmt::Display for ProposalSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .values
            .iter()
            .map(Proposal::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "[{}]", joined)
    }
}
