//! stevedore — multi-cluster container deployment orchestrator.
//!
//! One-shot CLI: `deploy` rolls a service out to every configured
//! cluster with smoke-test and warm-up validation, `list` and `filter`
//! answer read-only container queries.

mod callback;
mod commands;
mod table;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use stevedore_cluster::FleetCoordinator;
use stevedore_core::ClusterConfig;
use stevedore_scheduler::SchedulerRegistry;

#[derive(Parser)]
#[command(
    name = "stevedore",
    about = "Multi-cluster container deployment orchestrator",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Path to the cluster configuration file.
    #[arg(long, global = true, default_value = "stevedore.yml")]
    config: PathBuf,

    /// Log everything at debug level.
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Roll a service out to every configured cluster
    Deploy(commands::deploy::DeployArgs),
    /// List containers across clusters
    List(commands::list::ListArgs),
    /// List containers labeled with an image and tag
    Filter(commands::filter::FilterArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let config = ClusterConfig::from_file(&cli.config)?;
    let registry = default_registry();
    let fleet = FleetCoordinator::from_config(&config, &registry)?;

    match cli.command {
        Commands::Deploy(args) => commands::deploy::run(&fleet, args).await,
        Commands::List(args) => commands::list::run(&fleet, args).await,
        Commands::Filter(args) => commands::filter::run(&fleet, args).await,
    }
}

fn init_logging(debug: bool) {
    let default_directives = if debug { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_env("STEVEDORE_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directives));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Concrete runtime drivers register themselves here by ID; the deploy
/// core only ever sees the `Scheduler` trait.
fn default_registry() -> SchedulerRegistry {
    SchedulerRegistry::new()
}
