//! Swarm configuration from TOML (`[swarm]` section)

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use swarm_vote_domain::{
    BarrierMode, ConfigIssue, ConfigIssueCode, ProposalSet, SwarmSize,
};

/// Raw swarm configuration from TOML
///
/// # Example
///
/// ```toml
/// [swarm]
/// size = 3
/// proposals = ["east", "north", "south", "west"]
/// barrier = "self"                          # "self" or "coordinated"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSwarmConfig {
    /// Number of agents; the CLI flag wins when both are given
    pub size: Option<usize>,
    /// Legal proposal values
    pub proposals: Vec<String>,
    /// Barrier variant: "self" or "coordinated"
    pub barrier: String,
}

impl Default for FileSwarmConfig {
    fn default() -> Self {
        Self {
            size: None,
            proposals: ProposalSet::DEFAULT_VALUES
                .iter()
                .map(|v| v.to_string())
                .collect(),
            barrier: BarrierMode::default().as_str().to_string(),
        }
    }
}

impl FileSwarmConfig {
    /// Parse barrier string into BarrierMode.
    ///
    /// An unknown value is an error; the default returned alongside it is
    /// only a placeholder and must not be run.
    pub fn parse_barrier(&self) -> (BarrierMode, Vec<ConfigIssue>) {
        match self.barrier.parse::<BarrierMode>() {
            Ok(mode) => (mode, vec![]),
            Err(_) => {
                let issue = ConfigIssue::error(
                    ConfigIssueCode::InvalidEnumValue {
                        field: "swarm.barrier".to_string(),
                        value: self.barrier.clone(),
                        valid_values: vec!["self".to_string(), "coordinated".to_string()],
                    },
                    format!(
                        "swarm.barrier: unknown value '{}' (expected 'self' or 'coordinated')",
                        self.barrier
                    ),
                );
                (BarrierMode::default(), vec![issue])
            }
        }
    }

    /// Parse the legal proposal set. `None` when no usable value remains.
    pub fn parse_proposals(&self) -> (Option<ProposalSet>, Vec<ConfigIssue>) {
        let mut issues = Vec::new();

        let mut seen = HashSet::new();
        for value in &self.proposals {
            if !seen.insert(value.trim()) {
                issues.push(ConfigIssue::warning(
                    ConfigIssueCode::DuplicateProposal {
                        value: value.clone(),
                    },
                    format!("swarm.proposals: '{}' is listed more than once", value),
                ));
            }
        }

        match ProposalSet::new(self.proposals.iter().map(String::as_str)) {
            Ok(set) => (Some(set), issues),
            Err(_) => {
                issues.push(ConfigIssue::error(
                    ConfigIssueCode::EmptyProposalSet,
                    "swarm.proposals: at least one non-blank value is required",
                ));
                (None, issues)
            }
        }
    }

    /// Parse the configured swarm size, if any.
    pub fn parse_size(&self) -> (Option<SwarmSize>, Vec<ConfigIssue>) {
        match self.size {
            None => (None, vec![]),
            Some(size) => match SwarmSize::new(size) {
                Ok(size) => (Some(size), vec![]),
                Err(_) => (
                    None,
                    vec![ConfigIssue::error(
                        ConfigIssueCode::ZeroSwarmSize,
                        "swarm.size: must be at least 1",
                    )],
                ),
            },
        }
    }
}
