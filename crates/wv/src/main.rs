//! wv CLI - page augmentation engine.
//!
//! Provides commands for:
//! - `render`: Run directives over a local storage/view file pair
//! - `confluence render`: Run directives over a Confluence page

mod commands;
mod error;
mod output;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{ConfluenceCommand, RenderArgs};
use error::CliError;
use output::Output;

/// wv - page augmentation engine.
#[derive(Parser)]
#[command(name = "wv", version, about)]
struct Cli {
    /// Enable verbose output (info-level logs).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render directives for a page stored in local files.
    Render(RenderArgs),
    /// Confluence commands.
    #[command(subcommand)]
    Confluence(ConfluenceCommand),
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    // --verbose enables INFO level, otherwise use RUST_LOG or default to WARN
    let filter = if cli.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = tokio::runtime::Runtime::new()
        .map_err(CliError::from)
        .and_then(|rt| match cli.command {
            Commands::Render(args) => rt.block_on(args.execute(&output)),
            Commands::Confluence(cmd) => rt.block_on(cmd.execute(&output)),
        });

    if let Err(err) = result {
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}
