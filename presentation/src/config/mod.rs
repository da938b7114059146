//! Presentation-level configuration
//!
//! Resolved output settings: CLI flags over file values over defaults.

use crate::cli::commands::Cli;
use swarm_vote_domain::OutputFormat;

/// Output configuration for the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputConfig {
    pub format: OutputFormat,
    /// Enable colored terminal output
    pub color: bool,
    /// Show live progress bars
    pub show_progress: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            color: true,
            show_progress: true,
        }
    }
}

impl OutputConfig {
    /// Merge CLI flags over values read from the config file
    pub fn resolve(cli: &Cli, file_format: Option<OutputFormat>, color: bool, progress: bool) -> Self {
        let format = cli
            .output
            .map(OutputFormat::from)
            .or(file_format)
            .unwrap_or_default();
        Self {
            format,
            color,
            // JSON goes to stdout; keep the terminal clean
            show_progress: progress && !cli.quiet && format != OutputFormat::Json,
        }
    }
}
