//! Issola CLI: the main entry point.
//!
//! Without a subcommand the agent runs with the configured persona until it
//! issues a terminal command. `issola init` writes a default config.

use clap::{Parser, Subcommand};
use issola_config::AppConfig;
use std::path::PathBuf;

mod commands;
mod operator;

#[derive(Parser)]
#[command(
    name = "issola",
    about = "Issola — an autonomous research agent",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Run commands without asking for authorisation
    #[arg(long)]
    continuous: bool,

    /// Narrate the agent's thoughts
    #[arg(long)]
    speak: bool,

    /// Enable debug logging, including JSON repair attempts
    #[arg(long, global = true)]
    debug: bool,

    /// Use the fast model for every call
    #[arg(long)]
    gpt3only: bool,

    /// Stop after this many iterations
    #[arg(long, value_name = "N")]
    max_iterations: Option<u32>,

    /// Config file (defaults to ~/.issola/config.toml)
    #[arg(long, env = "ISSOLA_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Agent name
    #[arg(long)]
    name: Option<String>,

    /// Agent role, e.g. "an AI that researches Rust crates"
    #[arg(long)]
    role: Option<String>,

    /// A goal; repeat for several
    #[arg(long = "goal", value_name = "GOAL")]
    goals: Vec<String>,

    /// Start this many background research workers
    #[arg(long, value_name = "N")]
    research_workers: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config and create the data directory
    Init,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load_with_env(path),
        None => AppConfig::load(),
    }
    .map_err(|e| format!("Failed to load config: {e}"))?;

    // Initialize tracing
    let filter = if cli.debug || config.agent.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Some(Commands::Init) => commands::init::run().await?,
        None => {
            let options = commands::run::RunOptions {
                continuous: cli.continuous,
                speak: cli.speak,
                debug: cli.debug,
                gpt3only: cli.gpt3only,
                max_iterations: cli.max_iterations,
                name: cli.name,
                role: cli.role,
                goals: cli.goals,
                research_workers: cli.research_workers,
            };
            commands::run::run(config, options).await?
        }
    }

    Ok(())
}
