//! Run Swarm use case
//!
//! Runs a whole swarm in one process: the coordinator (when the barrier
//! mode needs one) plus one task per agent, each on its own bus connection.
//! Every agent's result is written to the results sink as soon as it ends.

use super::run_barrier::{BarrierReport, RunBarrierError, RunBarrierUseCase};
use super::run_round::{RoundOutcome, RunRoundError, RunRoundInput, RunRoundUseCase};
use crate::config::{BusTopology, RoundParams};
use crate::ports::message_bus::{BusConnector, BusError};
use crate::ports::progress::{NoProgress, RoundProgressNotifier};
use crate::ports::results_sink::{NoResultsSink, ResultsSink, RoundRecord};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use swarm_vote_domain::{AgentId, BarrierMode, Proposal, SwarmSize, TallyOutcome};
use thiserror::Error;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Errors that prevent a swarm from starting
#[derive(Error, Debug)]
pub enum RunSwarmError {
    #[error("Invalid swarm plan: {0}")]
    InvalidPlan(String),

    #[error("Bus error: {0}")]
    Bus(#[from] BusError),

    #[error("Barrier coordinator failed: {0}")]
    Barrier(#[from] RunBarrierError),
}

/// One agent to launch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentPlan {
    pub identity: AgentId,
    pub proposal: Proposal,
}

impl AgentPlan {
    pub fn new(identity: AgentId, proposal: impl Into<Proposal>) -> Self {
        Self {
            identity,
            proposal: proposal.into(),
        }
    }
}

/// Input for the RunSwarm use case
#[derive(Debug, Clone)]
pub struct RunSwarmInput {
    pub swarm_size: SwarmSize,
    pub mode: BarrierMode,
    pub agents: Vec<AgentPlan>,
    /// Delay between two agent launches
    pub stagger: Duration,
}

impl RunSwarmInput {
    pub fn new(swarm_size: SwarmSize, agents: Vec<AgentPlan>) -> Self {
        Self {
            swarm_size,
            mode: BarrierMode::default(),
            agents,
            stagger: Duration::ZERO,
        }
    }

    pub fn with_mode(mut self, mode: BarrierMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_stagger(mut self, stagger: Duration) -> Self {
        self.stagger = stagger;
        self
    }

    /// Check the plan before any connection is opened.
    ///
    /// Fewer agents than the swarm size is allowed (the rest are expected
    /// elsewhere, or the round is meant to time out); more is not.
    pub fn validate(&self) -> Result<(), RunSwarmError> {
        let expected = self.swarm_size.get();
        if self.agents.is_empty() {
            return Err(RunSwarmError::InvalidPlan("no agents to launch".to_string()));
        }
        if self.agents.len() > expected {
            return Err(RunSwarmError::InvalidPlan(format!(
                "{} agents planned for a swarm of {}",
                self.agents.len(),
                expected
            )));
        }

        let mut seen = HashSet::new();
        for plan in &self.agents {
            if !seen.insert(&plan.identity) {
                return Err(RunSwarmError::InvalidPlan(format!(
                    "identity '{}' is used twice",
                    plan.identity
                )));
            }
        }
        Ok(())
    }
}

/// How one agent's round ended
#[derive(Debug, Clone, Serialize)]
pub struct AgentReport {
    pub identity: AgentId,
    pub proposal: Proposal,
    pub decision: Option<Proposal>,
    pub elapsed: Option<Duration>,
    pub tally: Option<TallyOutcome>,
    pub error: Option<String>,
}

impl AgentReport {
    fn from_result(plan: &AgentPlan, result: Result<RoundOutcome, RunRoundError>) -> Self {
        match result {
            Ok(outcome) => Self {
                identity: plan.identity.clone(),
                proposal: plan.proposal.clone(),
                decision: Some(outcome.tally.decision.clone()),
                elapsed: Some(outcome.elapsed),
                tally: Some(outcome.tally),
                error: None,
            },
            Err(e) => Self::failed(plan, e.to_string()),
        }
    }

    fn failed(plan: &AgentPlan, error: String) -> Self {
        Self {
            identity: plan.identity.clone(),
            proposal: plan.proposal.clone(),
            decision: None,
            elapsed: None,
            tally: None,
            error: Some(error),
        }
    }

    pub fn is_decided(&self) -> bool {
        self.decision.is_some()
    }

    pub fn record(&self) -> RoundRecord {
        match (&self.decision, self.elapsed) {
            (Some(decision), Some(elapsed)) => {
                RoundRecord::decided(self.identity.clone(), decision.clone(), elapsed)
            }
            _ => RoundRecord::aborted(self.identity.clone()),
        }
    }
}

/// Result of running a swarm
#[derive(Debug, Clone, Serialize)]
pub struct SwarmReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub swarm_size: SwarmSize,
    pub mode: BarrierMode,
    /// In launch order
    pub agents: Vec<AgentReport>,
    pub barrier: Option<BarrierReport>,
    pub barrier_error: Option<String>,
}

impl SwarmReport {
    pub fn decided_count(&self) -> usize {
        self.agents.iter().filter(|a| a.is_decided()).count()
    }

    pub fn aborted_count(&self) -> usize {
        self.agents.len() - self.decided_count()
    }

    pub fn all_decided(&self) -> bool {
        self.aborted_count() == 0
    }

    /// The common decision, when every agent decided and they all agree
    pub fn agreed_decision(&self) -> Option<&Proposal> {
        let first = self.agents.first()?.decision.as_ref()?;
        self.agents
            .iter()
            .all(|a| a.decision.as_ref() == Some(first))
            .then_some(first)
    }
}

/// Use case for running a whole swarm in process
pub struct RunSwarmUseCase<C: BusConnector + 'static> {
    connector: Arc<C>,
    topology: BusTopology,
    params: RoundParams,
    results: Arc<dyn ResultsSink>,
    cancellation_token: Option<CancellationToken>,
}

impl<C: BusConnector + 'static> RunSwarmUseCase<C> {
    pub fn new(connector: Arc<C>, topology: BusTopology, params: RoundParams) -> Self {
        Self {
            connector,
            topology,
            params,
            results: Arc::new(NoResultsSink),
            cancellation_token: None,
        }
    }

    /// Write every agent's result line to `sink`
    pub fn with_results_sink(mut self, sink: Arc<dyn ResultsSink>) -> Self {
        self.results = sink;
        self
    }

    /// Set a cancellation token for graceful interruption
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = Some(token);
        self
    }

    /// Execute without progress reporting
    pub async fn execute(&self, input: RunSwarmInput) -> Result<SwarmReport, RunSwarmError> {
        self.execute_with_progress(input, Arc::new(NoProgress)).await
    }

    /// Execute with progress callbacks shared by every agent task
    pub async fn execute_with_progress(
        &self,
        input: RunSwarmInput,
        progress: Arc<dyn RoundProgressNotifier>,
    ) -> Result<SwarmReport, RunSwarmError> {
        input.validate()?;
        if input.agents.len() < input.swarm_size.get() {
            warn!(
                launched = input.agents.len(),
                swarm_size = %input.swarm_size,
                "Launching fewer agents than the swarm size"
            );
        }

        let started_at = Utc::now();
        let token = self
            .cancellation_token
            .clone()
            .unwrap_or_else(CancellationToken::new);
        let barrier_token = token.child_token();
        info!(
            swarm_size = %input.swarm_size,
            agents = input.agents.len(),
            mode = %input.mode,
            "Starting swarm"
        );

        // The coordinator purges its queue, so it must be listening first
        let barrier = if input.mode.needs_coordinator() {
            let connection = self.connector.connect().await?;
            let listening = RunBarrierUseCase::new(connection, self.topology.clone(), self.params)
                .with_cancellation(barrier_token.clone())
                .prepare()
                .await?;
            let progress = Arc::clone(&progress);
            let swarm_size = input.swarm_size;
            Some(tokio::spawn(async move {
                listening.run(swarm_size, progress.as_ref()).await
            }))
        } else {
            None
        };

        let mut join_set = JoinSet::new();
        for (index, plan) in input.agents.iter().enumerate() {
            if index > 0 && !input.stagger.is_zero() {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {}
                    _ = tokio::time::sleep(input.stagger) => {}
                }
            }

            let connector = Arc::clone(&self.connector);
            let topology = self.topology.clone();
            let params = self.params;
            let progress = Arc::clone(&progress);
            let token = token.clone();
            let round_input = RunRoundInput::new(
                plan.identity.clone(),
                plan.proposal.clone(),
                input.swarm_size,
            )
            .with_mode(input.mode);

            join_set.spawn(async move {
                let result = match connector.connect().await {
                    Ok(connection) => {
                        RunRoundUseCase::new(connection, topology, params)
                            .with_cancellation(token)
                            .execute_with_progress(round_input, progress.as_ref())
                            .await
                    }
                    Err(e) => Err(RunRoundError::Bus(e)),
                };
                (index, result)
            });
        }

        let mut reports: Vec<Option<AgentReport>> = vec![None; input.agents.len()];
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, result)) => {
                    let report = AgentReport::from_result(&input.agents[index], result);
                    self.write_record(&report);
                    reports[index] = Some(report);
                }
                Err(e) => warn!(error = %e, "Agent task failed"),
            }
        }

        let agents: Vec<AgentReport> = reports
            .into_iter()
            .zip(&input.agents)
            .map(|(report, plan)| {
                report.unwrap_or_else(|| {
                    let report = AgentReport::failed(plan, "agent task failed".to_string());
                    self.write_record(&report);
                    report
                })
            })
            .collect();

        // Every local agent is done; stop a coordinator still waiting on absent peers
        barrier_token.cancel();
        let (barrier, barrier_error) = match barrier {
            Some(handle) => match handle.await {
                Ok(Ok(report)) => (Some(report), None),
                Ok(Err(e)) => {
                    warn!(error = %e, "Barrier coordinator ended without release");
                    (None, Some(e.to_string()))
                }
                Err(e) => (None, Some(format!("coordinator task failed: {e}"))),
            },
            None => (None, None),
        };

        let report = SwarmReport {
            started_at,
            finished_at: Utc::now(),
            swarm_size: input.swarm_size,
            mode: input.mode,
            agents,
            barrier,
            barrier_error,
        };
        info!(
            decided = report.decided_count(),
            aborted = report.aborted_count(),
            "Swarm finished"
        );
        Ok(report)
    }

    fn write_record(&self, report: &AgentReport) {
        if let Err(e) = self.results.record(&report.record()) {
            warn!(agent = %report.identity, error = %e, "Failed to record result");
        }
    }
}
