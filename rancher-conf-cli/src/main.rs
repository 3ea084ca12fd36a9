//! rancher-conf: render configuration files from Rancher metadata.
//!
//! # Usage
//!
//! ```text
//! rancher-conf run  [--config <path>] [--metadata-url <url>] [--metadata-version <v>]
//!                   [--interval <secs>] [--onetime] [--log-level <level>] [--dry-run]
//! rancher-conf diff [--config <path>] [--metadata-url <url>] [--metadata-version <v>]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{diff::DiffArgs, run::RunArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "rancher-conf",
    version,
    about = "Render configuration files from Rancher metadata and reload services on change",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Poll metadata and publish every configured template on change.
    Run(RunArgs),

    /// Show unified diffs of what `run` would write, without writing.
    Diff(DiffArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => args.run(),
        Commands::Diff(args) => args.run(),
    }
}
