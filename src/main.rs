mod cli;
mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// eventcast - notification orchestration for events
#[derive(Parser)]
#[command(name = "eventcast")]
#[command(about = "Event notification orchestration core", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the orchestration core (schedule worker + orchestrators)
    Serve,
    /// Run database migrations
    Migrate,
    /// Drop the database if it exists and recreate it with migrations
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = crate::config::Config::load(cli.config.as_deref())?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    if config.logging.json {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_filter(env_filter),
            )
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_filter(env_filter))
            .try_init()?;
    }

    match cli.command {
        Commands::Serve => crate::cli::serve(config).await,
        Commands::Migrate => crate::cli::migrate(config).await,
        Commands::Reset => crate::cli::reset(config).await,
    }
}
