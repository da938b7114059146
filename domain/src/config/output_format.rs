//! Output format value object

use serde::{Deserialize, Serialize};

/// Output format for swarm round reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable per-agent summary (default)
    #[default]
    Summary,
    /// JSON output
    Json,
}
