//! Binary that brings up a chain of nodes from a JSON config.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use std::path::PathBuf;

use chainboot::{ChainConfig, Error, Orchestrator};
use clap::{Parser, Subcommand};
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the chain config file
    #[arg(
        long,
        default_value = "/etc/chainboot/chain.json",
        env = "CHAINBOOT_CONFIG"
    )]
    config: PathBuf,

    /// Maximum log level
    #[arg(long, default_value = "info", env = "CHAINBOOT_LOG_LEVEL")]
    log_level: Level,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Debug, Subcommand)]
enum Command {
    /// Bring the chain up and supervise it until SIGTERM or SIGINT
    Run,

    /// Print every node's probe result and every bridge's state
    Status,

    /// Run one bridge migration and exit
    Migrate {
        /// Node to export from
        #[arg(long)]
        source: String,

        /// Node to import into
        #[arg(long)]
        dest: String,

        /// Inclusive upper bound of the migrated range
        #[arg(long)]
        cutoff: u64,
    },
}

fn spawn_signal_handler(cancel: CancellationToken) -> Result<(), Error> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| Error::Io("failed to install SIGTERM handler", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| Error::Io("failed to install SIGINT handler", e))?;

    tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => info!("received SIGTERM"),
            _ = sigint.recv() => info!("received SIGINT"),
        }
        cancel.cancel();
    });

    Ok(())
}

#[tokio::main(worker_threads = 8)]
async fn main() -> Result<(), Error> {
    let args = Args::parse();

    if let Err(e) = tracing::subscriber::set_global_default(
        FmtSubscriber::builder()
            .with_max_level(args.log_level)
            .finish(),
    ) {
        eprintln!("failed to install tracing subscriber: {e}");
    }

    let config = ChainConfig::from_file(&args.config).inspect_err(|e| {
        error!(path = %args.config.display(), error = %e, "failed to load config");
    })?;

    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone())?;

    let orchestrator = Orchestrator::from_config(&config, cancel).inspect_err(|e| {
        error!(error = %e, "invalid chain");
    })?;

    match args.command {
        Command::Run => orchestrator.run().await,
        Command::Status => {
            print!("{}", orchestrator.status().await);
            Ok(())
        }
        Command::Migrate {
            source,
            dest,
            cutoff,
        } => orchestrator
            .migrate(&source, &dest, cutoff)
            .await
            .map(|outcome| info!(?outcome, "migration finished")),
    }
}
