//! Progress reporting for swarm rounds

use colored::Colorize;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use swarm_vote_application::RoundProgressNotifier;
use swarm_vote_domain::{AgentId, RoundPhase, SwarmSize, TallyOutcome};

#[derive(Default)]
struct AgentBar {
    bar: Option<ProgressBar>,
    ready: usize,
    collected: usize,
}

/// Reports progress with one bar per agent
///
/// A bar runs over `2 * swarm_size` steps: ready peers first, then
/// collected proposals.
pub struct ProgressReporter {
    multi: MultiProgress,
    swarm_size: SwarmSize,
    bars: Mutex<HashMap<AgentId, AgentBar>>,
}

impl ProgressReporter {
    pub fn new(swarm_size: SwarmSize) -> Self {
        Self {
            multi: MultiProgress::new(),
            swarm_size,
            bars: Mutex::new(HashMap::new()),
        }
    }

    fn agent_style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{spinner:.green} {prefix:.bold.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-")
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<AgentId, AgentBar>> {
        self.bars.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run `f` against the agent's bar, creating it on first use
    fn with_bar(&self, agent: &AgentId, f: impl FnOnce(&mut AgentBar, &ProgressBar)) {
        let mut bars = self.lock();
        let entry = bars.entry(agent.clone()).or_default();
        let bar = entry
            .bar
            .get_or_insert_with(|| {
                let pb = self
                    .multi
                    .add(ProgressBar::new(2 * self.swarm_size.get() as u64));
                pb.set_style(Self::agent_style());
                pb.set_prefix(agent.to_string());
                pb
            })
            .clone();
        f(entry, &bar);
    }
}

impl RoundProgressNotifier for ProgressReporter {
    fn on_phase_change(&self, agent: &AgentId, phase: RoundPhase) {
        if phase.is_terminal() {
            return;
        }
        self.with_bar(agent, |_, pb| pb.set_message(phase.display_name()));
    }

    fn on_decided(&self, agent: &AgentId, outcome: &TallyOutcome) {
        self.with_bar(agent, |_, pb| {
            pb.finish_with_message(format!(
                "{} {} ({})",
                "v".green(),
                outcome.decision.as_str().bold(),
                outcome.summary()
            ));
        });
    }

    fn on_aborted(&self, agent: &AgentId, reason: &str) {
        self.with_bar(agent, |_, pb| {
            pb.abandon_with_message(format!("{} {}", "x".red(), reason));
        });
    }

    fn on_ready_counted(&self, agent: &AgentId, ready: usize, _expected: usize) {
        self.with_bar(agent, |state, pb| {
            state.ready = ready;
            pb.set_position((state.ready + state.collected) as u64);
        });
    }

    fn on_proposal_collected(&self, agent: &AgentId, collected: usize, _expected: usize) {
        self.with_bar(agent, |state, pb| {
            // An early proposal can release the barrier without a full ready count.
            state.ready = self.swarm_size.get();
            state.collected = collected;
            pb.set_position((state.ready + state.collected) as u64);
        });
    }

    fn on_barrier_released(&self, ready: usize) {
        // Printing through the group keeps the bars intact.
        let _ = self.multi.println(format!(
            "{} coordinator released the barrier ({} ready)",
            "->".cyan(),
            ready
        ));
    }
}

/// Simple text-based progress (no fancy UI)
pub struct SimpleProgress;

impl RoundProgressNotifier for SimpleProgress {
    fn on_phase_change(&self, agent: &AgentId, phase: RoundPhase) {
        if !phase.is_terminal() {
            println!("{} {} {}", "->".cyan(), agent, phase.display_name().bold());
        }
    }

    fn on_decided(&self, agent: &AgentId, outcome: &TallyOutcome) {
        println!(
            "  {} {} decided {} ({})",
            "v".green(),
            agent,
            outcome.decision.as_str().bold(),
            outcome.summary()
        );
    }

    fn on_aborted(&self, agent: &AgentId, reason: &str) {
        println!("  {} {} aborted: {}", "x".red(), agent, reason);
    }

    fn on_barrier_released(&self, ready: usize) {
        println!("{} barrier released ({} ready)", "->".cyan(), ready);
    }
}
