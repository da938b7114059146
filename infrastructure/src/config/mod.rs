//! Configuration file loading for swarm-vote
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. `SWARM_VOTE_*` environment variables
//! 2. `--config <path>` specified file
//! 3. Project root: `./swarm-vote.toml` or `./.swarm-vote.toml`
//! 4. XDG config: `$XDG_CONFIG_HOME/swarm-vote/config.toml`
//! 5. Default values

mod file_config;
mod loader;

pub use file_config::{
    ConfigValidationError, DEFAULT_RESULTS_PATH, FileBusConfig, FileConfig, FileLoggingConfig,
    FileOutputConfig, FileResultsConfig, FileSwarmConfig, FileTimingConfig,
};
pub use loader::ConfigLoader;
