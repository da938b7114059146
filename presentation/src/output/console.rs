//! Console output formatter for swarm reports

use crate::output::formatter::OutputFormatter;
use colored::Colorize;
use swarm_vote_application::{AgentReport, SwarmReport};

/// Formats swarm reports for console display
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    /// Format the complete report
    pub fn format(report: &SwarmReport) -> String {
        let mut output = String::new();

        output.push_str(&Self::header("Swarm Vote Results"));
        output.push('\n');

        output.push_str(&format!(
            "{} {} agents, {} barrier\n",
            "Swarm:".cyan().bold(),
            report.swarm_size,
            report.mode
        ));
        let seconds = (report.finished_at - report.started_at).num_milliseconds() as f64 / 1000.0;
        output.push_str(&format!(
            "{} {} ({:.3}s)\n",
            "Started:".cyan().bold(),
            report.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
            seconds
        ));

        output.push_str(&Self::section_header("Agents"));
        for agent in &report.agents {
            output.push_str(&Self::agent_line(agent));
            output.push('\n');
        }

        if let Some(barrier) = &report.barrier {
            output.push_str(&Self::section_header("Coordinator"));
            output.push_str(&format!(
                "  ready {}  purged {}  duplicates {}  late {}  discarded {}\n",
                barrier.ready,
                barrier.purged,
                barrier.duplicates,
                barrier.late_signals,
                barrier.discarded
            ));
        }
        if let Some(error) = &report.barrier_error {
            output.push_str(&format!("  {} {}\n", "Coordinator:".red().bold(), error));
        }

        output.push('\n');
        output.push_str(&Self::verdict(report));
        output.push_str(&Self::footer());
        output
    }

    /// Format as JSON
    pub fn format_json(report: &SwarmReport) -> String {
        serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string())
    }

    fn agent_line(agent: &AgentReport) -> String {
        match (&agent.decision, agent.elapsed) {
            (Some(decision), Some(elapsed)) => {
                let tally = agent
                    .tally
                    .as_ref()
                    .map(|t| t.summary())
                    .unwrap_or_default();
                format!(
                    "  {} {:<24} proposed {:<8} decided {:<8} {:>8.4}s  {}",
                    "v".green(),
                    agent.identity.as_str(),
                    agent.proposal.as_str(),
                    decision.as_str().bold(),
                    elapsed.as_secs_f64(),
                    tally.dimmed()
                )
            }
            _ => format!(
                "  {} {:<24} proposed {:<8} {}",
                "x".red(),
                agent.identity.as_str(),
                agent.proposal.as_str(),
                agent.error.as_deref().unwrap_or("no decision").red()
            ),
        }
    }

    fn verdict(report: &SwarmReport) -> String {
        match report.agreed_decision() {
            Some(decision) => format!(
                "{} {}\n",
                "Decision:".green().bold(),
                decision.as_str().bold()
            ),
            None if report.all_decided() => format!(
                "{} agents decided differently\n",
                "Disagreement:".red().bold()
            ),
            None => format!(
                "{} {} of {} agents decided\n",
                "Incomplete:".yellow().bold(),
                report.decided_count(),
                report.agents.len()
            ),
        }
    }

    fn header(title: &str) -> String {
        let line = "=".repeat(60);
        format!("{}\n{:^60}\n{}", line.cyan(), title.bold(), line.cyan())
    }

    fn section_header(title: &str) -> String {
        format!("\n{}\n{}\n", title.cyan().bold(), "-".repeat(40))
    }

    fn footer() -> String {
        format!("{}\n", "=".repeat(60).cyan())
    }
}

impl OutputFormatter for ConsoleFormatter {
    fn format(&self, report: &SwarmReport) -> String {
        Self::format(report)
    }

    fn format_json(&self, report: &SwarmReport) -> String {
        Self::format_json(report)
    }
}
