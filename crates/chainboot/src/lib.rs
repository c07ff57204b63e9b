//! Dependency-ordered bring-up of a chain of node processes, with one-time
//! bridge migrations between incompatible neighbours and per-node stall
//! recovery.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod config;
mod error;
mod orchestrator;
mod status;

pub use config::{ChainConfig, DEFAULT_PROFILE, SupervisorConfig, TimingConfig, ToolConfig};
pub use error::{Error, Result};
pub use orchestrator::{Orchestrator, OrchestratorOptions};
pub use status::{NodeStatus, StatusReport};
