//! CLI entrypoint for swarm-vote
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

use anyhow::{Context, Result, bail};
use clap::Parser;
use colored::Colorize;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use swarm_vote_application::{
    AgentPlan, RoundParams, RoundProgressNotifier, RunSwarmInput, RunSwarmUseCase, SwarmReport,
};
use swarm_vote_domain::{AgentId, BarrierMode, OutputFormat, ProposalSet, SwarmSize};
use swarm_vote_infrastructure::{ConfigLoader, CsvResultsSink, FileConfig, InMemoryBroker};
use swarm_vote_presentation::{Cli, ConsoleFormatter, OutputConfig, ProgressReporter};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    if cli.show_config {
        ConfigLoader::print_config_sources();
        return Ok(ExitCode::SUCCESS);
    }

    // Load configuration (before logging, which reads [logging])
    let config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_ref()).context("Failed to load configuration")?
    };
    let warnings = config.ensure_valid()?;

    let _log_guard = init_logging(cli.verbose, &config)?;
    for issue in &warnings {
        eprintln!("{} {}", "warning:".yellow().bold(), issue.message);
    }

    let output = OutputConfig::resolve(
        &cli,
        config.output.format,
        config.output.color,
        config.output.progress,
    );
    if !output.color {
        colored::control::set_override(false);
    }

    // === Resolve the round ===
    let swarm_size = match (cli.swarm_size, config.swarm.parse_size().0) {
        (Some(n), _) => SwarmSize::new(n.get())?,
        (None, Some(size)) => size,
        (None, None) => bail!("Swarm size is required. Use --swarm-size or set [swarm] size."),
    };
    let mode = cli
        .barrier
        .map(BarrierMode::from)
        .unwrap_or_else(|| config.swarm.parse_barrier().0);
    let legal = config
        .swarm
        .parse_proposals()
        .0
        .context("No legal proposals configured")?;
    let agents = plan_agents(&cli, swarm_size, &legal)?;
    let params = round_params(&cli, &config)?;
    let topology = config.bus.to_topology().0;

    let results_path = cli
        .results
        .as_deref()
        .unwrap_or(config.results.path.as_path());
    let sink = CsvResultsSink::open(results_path)
        .with_context(|| format!("Failed to open results file {}", results_path.display()))?;

    info!(
        swarm_size = %swarm_size,
        mode = %mode,
        legal = %legal,
        results = %results_path.display(),
        "Starting swarm-vote"
    );

    // === Dependency Injection ===
    let broker = Arc::new(InMemoryBroker::new());
    let cancellation = CancellationToken::new();
    spawn_interrupt_handler(cancellation.clone());

    let use_case = RunSwarmUseCase::new(broker, topology, params)
        .with_results_sink(Arc::new(sink))
        .with_cancellation(cancellation.clone());

    let input = RunSwarmInput::new(swarm_size, agents)
        .with_mode(mode)
        .with_stagger(Duration::from_millis(cli.stagger_ms));

    let report = if output.show_progress {
        let progress: Arc<dyn RoundProgressNotifier> = Arc::new(ProgressReporter::new(swarm_size));
        use_case.execute_with_progress(input, progress).await?
    } else {
        use_case.execute(input).await?
    };

    // Output results
    let rendered = match output.format {
        OutputFormat::Summary => ConsoleFormatter::format(&report),
        OutputFormat::Json => ConsoleFormatter::format_json(&report),
    };
    println!("{}", rendered);

    Ok(exit_code(&report, cancellation.is_cancelled()))
}

/// Install the tracing subscriber.
///
/// `RUST_LOG` wins over `-v`, which wins over `[logging] filter`. The
/// returned guard flushes the log file on drop.
fn init_logging(verbose: u8, config: &FileConfig) -> Result<Option<WorkerGuard>> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => match verbose {
            0 => EnvFilter::try_new(config.logging.filter.as_deref().unwrap_or("warn"))
                .context("Invalid [logging] filter")?,
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"), // -vvv or more
        },
    };

    let console = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let (file_layer, guard) = match &config.logging.file {
        Some(path) => {
            let (writer, guard) = tracing_appender::non_blocking(open_log_file(path)?);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .init();

    Ok(guard)
}

fn open_log_file(path: &Path) -> Result<tracing_appender::rolling::RollingFileAppender> {
    let file_name = path
        .file_name()
        .with_context(|| format!("Log file path {} has no file name", path.display()))?;
    let directory = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(directory)
        .with_context(|| format!("Failed to create log directory {}", directory.display()))?;
    Ok(tracing_appender::rolling::never(directory, file_name))
}

/// Build one plan per local agent, in launch order.
///
/// Missing identities are generated and missing proposals are drawn from
/// the legal set.
fn plan_agents(cli: &Cli, swarm_size: SwarmSize, legal: &ProposalSet) -> Result<Vec<AgentPlan>> {
    let count = swarm_size.get();
    if cli.robot_ids.len() > count {
        bail!("{} robot ids given for a swarm of {}", cli.robot_ids.len(), count);
    }
    if cli.proposals.len() > count {
        bail!("{} proposals given for a swarm of {}", cli.proposals.len(), count);
    }

    (0..count)
        .map(|i| -> Result<AgentPlan> {
            let identity = match cli.robot_ids.get(i) {
                Some(id) => AgentId::new(id.as_str())?,
                None => AgentId::generate(),
            };
            let proposal = match cli.proposals.get(i) {
                Some(value) => legal.validate(value)?,
                None => legal.choose_random(),
            };
            Ok(AgentPlan::new(identity, proposal))
        })
        .collect()
}

/// File timing with the CLI deadline flags applied on top
fn round_params(cli: &Cli, config: &FileConfig) -> Result<RoundParams> {
    let mut params = config.timing.to_round_params().0;
    if let Some(secs) = cli.readiness_timeout {
        if secs == 0 {
            bail!("--readiness-timeout must be positive");
        }
        params = params.with_readiness_timeout(Some(Duration::from_secs(secs)));
    }
    if let Some(secs) = cli.proposal_timeout {
        if secs == 0 {
            bail!("--proposal-timeout must be positive");
        }
        params = params.with_proposal_timeout(Some(Duration::from_secs(secs)));
    }
    Ok(params)
}

fn spawn_interrupt_handler(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, aborting the round");
            token.cancel();
        }
    });
}

/// Non-zero unless every agent decided the same value without interruption
fn exit_code(report: &SwarmReport, interrupted: bool) -> ExitCode {
    if interrupted {
        return ExitCode::from(130);
    }
    if report.agreed_decision().is_some() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("swarm-vote").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_plan_fills_missing_identities_and_proposals() {
        let cli = parse(&["-n", "3", "-i", "r1", "-p", "north"]);
        let legal = ProposalSet::new(ProposalSet::DEFAULT_VALUES).unwrap();
        let plans = plan_agents(&cli, SwarmSize::new(3).unwrap(), &legal).unwrap();

        assert_eq!(plans.len(), 3);
        assert_eq!(plans[0].identity.as_str(), "r1");
        assert_eq!(plans[0].proposal.as_str(), "north");
        assert_ne!(plans[1].identity, plans[2].identity);
        assert!(plans.iter().all(|p| legal.contains(&p.proposal)));
    }

    #[test]
    fn test_plan_rejects_illegal_proposal_and_extra_ids() {
        let legal = ProposalSet::new(ProposalSet::DEFAULT_VALUES).unwrap();
        let size = SwarmSize::new(2).unwrap();

        let cli = parse(&["-n", "2", "-p", "up"]);
        assert!(plan_agents(&cli, size, &legal).is_err());

        let cli = parse(&["-n", "2", "-i", "a", "-i", "b", "-i", "c"]);
        assert!(plan_agents(&cli, size, &legal).is_err());
    }

    #[test]
    fn test_cli_timeouts_override_file_timing() {
        let cli = parse(&["-n", "2", "--proposal-timeout", "7"]);
        let params = round_params(&cli, &FileConfig::default()).unwrap();
        assert_eq!(params.deadlines.proposals, Some(Duration::from_secs(7)));

        let cli = parse(&["-n", "2", "--readiness-timeout", "0"]);
        assert!(round_params(&cli, &FileConfig::default()).is_err());
    }
}
