//! CLI command definitions

use clap::{Parser, ValueEnum};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use swarm_vote_domain::BarrierMode;

/// Output format for the swarm report
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One line per agent plus the agreed decision
    Summary,
    /// JSON output
    Json,
}

impl From<OutputFormat> for swarm_vote_domain::OutputFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Summary => swarm_vote_domain::OutputFormat::Summary,
            OutputFormat::Json => swarm_vote_domain::OutputFormat::Json,
        }
    }
}

/// Readiness barrier variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BarrierArg {
    /// Agents count each other's readiness signals
    #[value(name = "self", alias = "self-counted")]
    SelfCounted,
    /// A coordinator counts signals and broadcasts the start
    #[value(alias = "coordinator")]
    Coordinated,
}

impl From<BarrierArg> for BarrierMode {
    fn from(arg: BarrierArg) -> Self {
        match arg {
            BarrierArg::SelfCounted => BarrierMode::SelfCounted,
            BarrierArg::Coordinated => BarrierMode::Coordinated,
        }
    }
}

/// CLI arguments for swarm-vote
#[derive(Parser, Debug)]
#[command(name = "swarm-vote")]
#[command(author, version, about = "Swarm agents agree on one proposal by plurality vote")]
#[command(long_about = r#"
Swarm Vote runs a swarm of agents that reach a single decision together.

Every round has three phases:
1. Readiness: agents wait until the whole swarm is present
2. Proposal exchange: every agent broadcasts one proposal
3. Decision: plurality vote, ties broken by lexicographic order

Configuration files are loaded from (in priority order):
1. SWARM_VOTE_<SECTION>__<KEY>   Environment
2. --config <path>               Explicit config file
3. ./swarm-vote.toml             Project-level config
4. ~/.config/swarm-vote/config.toml   Global config

Example:
  swarm-vote -n 3 -p x -p y -p x
  swarm-vote -n 5 --barrier coordinated --stagger-ms 200
"#)]
pub struct Cli {
    /// Number of agents in the swarm (falls back to [swarm] size)
    #[arg(short = 'n', long, value_name = "N")]
    pub swarm_size: Option<NonZeroUsize>,

    /// Agent identity, in launch order (can be specified multiple times)
    #[arg(short = 'i', long = "robot-id", value_name = "ID")]
    pub robot_ids: Vec<String>,

    /// Agent proposal, in launch order (can be specified multiple times)
    #[arg(short = 'p', long = "proposal", value_name = "VALUE")]
    pub proposals: Vec<String>,

    /// Readiness barrier variant
    #[arg(short, long, value_enum)]
    pub barrier: Option<BarrierArg>,

    /// Delay between two agent launches
    #[arg(long, value_name = "MS", default_value_t = 0)]
    pub stagger_ms: u64,

    /// Results file (identity,decision,elapsed lines are appended)
    #[arg(long, value_name = "PATH")]
    pub results: Option<PathBuf>,

    /// Give up readiness after this many seconds
    #[arg(long, value_name = "SECS")]
    pub readiness_timeout: Option<u64>,

    /// Give up collecting proposals after this many seconds
    #[arg(long, value_name = "SECS")]
    pub proposal_timeout: Option<u64>,

    /// Output format
    #[arg(short, long, value_enum)]
    pub output: Option<OutputFormat>,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress progress indicators
    #[arg(short, long)]
    pub quiet: bool,

    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long)]
    pub no_config: bool,

    /// Show configuration file locations and exit
    #[arg(long)]
    pub show_config: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_command_line() {
        let cli = Cli::try_parse_from([
            "swarm-vote", "-n", "3", "-i", "r1", "-p", "x", "-p", "y", "--barrier",
            "coordinated", "--stagger-ms", "50", "-o", "json", "-vv",
        ])
        .unwrap();

        assert_eq!(cli.swarm_size.map(NonZeroUsize::get), Some(3));
        assert_eq!(cli.robot_ids, vec!["r1"]);
        assert_eq!(cli.proposals, vec!["x", "y"]);
        assert_eq!(cli.barrier.map(BarrierMode::from), Some(BarrierMode::Coordinated));
        assert_eq!(cli.stagger_ms, 50);
        assert_eq!(cli.output, Some(OutputFormat::Json));
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_barrier_self_name() {
        let cli = Cli::try_parse_from(["swarm-vote", "-n", "2", "-b", "self"]).unwrap();
        assert_eq!(cli.barrier, Some(BarrierArg::SelfCounted));
    }

    #[test]
    fn test_zero_swarm_size_is_rejected() {
        assert!(Cli::try_parse_from(["swarm-vote", "-n", "0"]).is_err());
    }

    #[test]
    fn test_swarm_size_is_optional_for_show_config() {
        let cli = Cli::try_parse_from(["swarm-vote", "--show-config"]).unwrap();
        assert!(cli.swarm_size.is_none());
        assert!(cli.show_config);
    }
}
