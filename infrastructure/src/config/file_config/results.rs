//! Results configuration from TOML (`[results]` section)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_RESULTS_PATH: &str = "results/results.csv";

/// Raw results configuration from TOML
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileResultsConfig {
    /// File the `identity,decision,elapsed` lines are appended to
    pub path: PathBuf,
}

impl Default for FileResultsConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_RESULTS_PATH),
        }
    }
}
