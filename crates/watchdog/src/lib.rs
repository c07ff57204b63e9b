//! Stall Watchdog: one independent sampling loop per node that restarts a
//! node making no progress, and wipes the chain data of a node wedged at
//! genesis.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;
mod genesis;
mod stall;
mod watchdog;

pub use error::{Error, Result};
pub use genesis::{GenesisDetector, GenesisVerdict};
pub use stall::{StallDetector, StallVerdict, WatchdogObservation};
pub use watchdog::{StallWatchdog, StallWatchdogOptions, WatchdogAction};
