// src/main.rs

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use nexus_relay::{Config, SyncOrchestrator};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "nexus-relay")]
#[command(author, version, about = "Replicate artifact repositories between Nexus registries", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = "/etc/nexus-relay/config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the relay broker
    Server,
    /// Sync the configured repositories through a broker
    Client {
        /// Run every sync unit once and exit, even if daemon mode is enabled
        #[arg(long)]
        once: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;
    info!(
        "nexus-relay {} ({})",
        nexus_relay::version::VERSION,
        nexus_relay::version::BUILD
    );

    match cli.command {
        Commands::Server => run_server(config).await,
        Commands::Client { once } => {
            let settings = config
                .client
                .context("no [client] section in configuration")?;
            let interval = settings.daemon.interval();
            let daemon = settings.daemon.enabled && !once;
            let orchestrator = SyncOrchestrator::new(settings)?;

            if daemon {
                orchestrator.run_scheduled(interval).await?;
                return Ok(());
            }

            let outcomes = orchestrator.run_once().await?;
            let failed = outcomes.iter().filter(|outcome| outcome.is_err()).count();
            if failed > 0 {
                anyhow::bail!("{} of {} sync units failed", failed, outcomes.len());
            }
            Ok(())
        }
    }
}

#[cfg(feature = "server")]
async fn run_server(config: Config) -> Result<()> {
    let settings = config
        .server
        .context("no [server] section in configuration")?;
    nexus_relay::server::run_server(&settings).await?;
    Ok(())
}

#[cfg(not(feature = "server"))]
async fn run_server(_config: Config) -> Result<()> {
    anyhow::bail!("broker support not compiled in; rebuild with --features server")
}
