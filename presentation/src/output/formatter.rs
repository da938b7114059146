//! Output formatter trait

use swarm_vote_application::SwarmReport;

/// Trait for formatting swarm reports
pub trait OutputFormatter {
    /// Human-readable summary
    fn format(&self, report: &SwarmReport) -> String;

    /// Format as JSON
    fn format_json(&self, report: &SwarmReport) -> String;
}
