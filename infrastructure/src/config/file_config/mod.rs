//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! They are deserialized directly and use domain types where appropriate.

mod bus;
mod logging;
mod output;
mod results;
mod swarm;
mod timing;

pub use bus::FileBusConfig;
pub use logging::FileLoggingConfig;
pub use output::FileOutputConfig;
pub use results::{DEFAULT_RESULTS_PATH, FileResultsConfig};
pub use swarm::FileSwarmConfig;
pub use timing::FileTimingConfig;

use serde::{Deserialize, Serialize};
use swarm_vote_domain::ConfigIssue;
use thiserror::Error;

/// Configuration that cannot be used as is
#[derive(Debug, Error)]
pub enum ConfigValidationError {
    #[error("{} configuration error(s):\n{}", .0.len(), .0.join("\n"))]
    Invalid(Vec<String>),
}

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Swarm size, legal proposals and barrier variant
    pub swarm: FileSwarmConfig,
    /// Poll, announce and deadline settings
    pub timing: FileTimingConfig,
    /// Exchange and queue names
    pub bus: FileBusConfig,
    /// Results file
    pub results: FileResultsConfig,
    /// Output settings
    pub output: FileOutputConfig,
    /// Log file and default filter
    pub logging: FileLoggingConfig,
}

impl FileConfig {
    /// Validate the entire configuration, returning all detected issues.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        issues.extend(self.swarm.parse_size().1);
        issues.extend(self.swarm.parse_barrier().1);
        issues.extend(self.swarm.parse_proposals().1);
        issues.extend(self.timing.to_round_params().1);
        issues.extend(self.bus.to_topology().1);
        issues
    }

    /// Fail on error-level issues; return the warnings otherwise.
    pub fn ensure_valid(&self) -> Result<Vec<ConfigIssue>, ConfigValidationError> {
        let (errors, warnings): (Vec<_>, Vec<_>) =
            self.validate().into_iter().partition(|i| i.is_error());
        if errors.is_empty() {
            Ok(warnings)
        } else {
            Err(ConfigValidationError::Invalid(
                errors.into_iter().map(|i| i.message).collect(),
            ))
        }
    }
}
