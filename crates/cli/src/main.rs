//! parrot CLI: the main entry point.
//!
//! Without `--message` parrot starts an interactive session. Lines starting
//! with `/` are commands (`/help` lists them); everything else is a turn for
//! the agent.

use clap::Parser;
use parrot_config::AppConfig;

mod commands;
mod input;
mod terminal;

#[derive(Parser)]
#[command(
    name = "parrot",
    about = "parrot - a terminal coding agent with a live view of your files",
    version
)]
struct Cli {
    /// Switch to PROVIDER:MODEL and remember the choice
    #[arg(long, value_name = "PROVIDER:MODEL")]
    model: Option<String>,

    /// Send a single message instead of entering interactive mode
    #[arg(short, long)]
    message: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    // Logs go to stderr and stay quiet by default so they do not interleave
    // with the streamed answer.
    let filter = if cli.verbose || config.debug { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    commands::agent::run(config, cli.model, cli.message).await
}
