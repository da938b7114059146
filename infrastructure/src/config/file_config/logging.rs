//! Logging configuration from TOML (`[logging]` section)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw logging configuration from TOML
///
/// # Example
///
/// ```toml
/// [logging]
/// file = "logs/swarm-vote.log"     # also write logs here
/// filter = "swarm_vote=debug"      # default filter when RUST_LOG is unset
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLoggingConfig {
    pub file: Option<PathBuf>,
    pub filter: Option<String>,
}
