//! PakVault CLI - command-line interface for bundle archives

pub mod commands;
pub mod progress;

use clap::Parser;
use commands::Commands;

#[derive(Parser)]
#[command(name = "pakvault")]
#[command(about = "PakVault: browse, edit and repack container archives", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Run the PakVault CLI
pub fn run_cli() -> anyhow::Result<()> {
    // Setup logging
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    cli.command.execute()?;

    Ok(())
}
