//! Application layer for swarm-vote
//!
//! This crate contains use cases, port definitions, and application configuration.
//! It depends only on the domain layer.

pub mod config;
pub mod ports;
pub mod use_cases;

// Re-export commonly used types
pub use config::{BusTopology, Deadlines, PollingParams, RoundParams};
pub use ports::{
    message_bus::{BusConnector, BusError, Delivery, DeliveryTag, Destination, MessageBus},
    progress::{NoProgress, RoundProgressNotifier},
    results_sink::{NoResultsSink, ResultsError, ResultsSink, RoundRecord},
};
pub use use_cases::readiness::{
    CoordinatedBarrier, ProposalChannel, ReadinessStrategy, RoundContext, SelfCountedBarrier,
    strategy_for,
};
pub use use_cases::run_barrier::{
    BarrierReport, ListeningBarrier, RunBarrierError, RunBarrierUseCase,
};
pub use use_cases::run_round::{
    AbortCause, RoundOutcome, RunRoundError, RunRoundInput, RunRoundUseCase,
};
pub use use_cases::run_swarm::{
    AgentPlan, AgentReport, RunSwarmError, RunSwarmInput, RunSwarmUseCase, SwarmReport,
};
