//! RsxStudio CLI - Command-line interface for studio model decoding

pub mod commands;
pub mod progress;

use clap::Parser;
use commands::Commands;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rsxstudio")]
#[command(version, about = "RsxStudio: studio model decoder", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Run the RsxStudio CLI
///
/// # Errors
/// Returns an error if the selected command fails.
pub fn run_cli() -> anyhow::Result<()> {
    // Setup logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();
    cli.command.execute()?;

    Ok(())
}
