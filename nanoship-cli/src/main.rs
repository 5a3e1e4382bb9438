//! nanoship: archive sequencer output in batches and ship it to a remote store.
//!
//! # Usage
//!
//! ```text
//! nanoship watch  <data-dir> <sample> <staging-dir> [--remote-host H --remote-dir D] [--dry-run]
//! nanoship once   <data-dir> <sample> <staging-dir> [--no-transfer] [--dry-run]
//! nanoship status <staging-dir> <sample> [--json]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{once::OnceArgs, status::StatusArgs, watch::WatchArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "nanoship",
    version,
    about = "Batch, archive, and transfer nanopore reads while the sequencer runs",
    long_about = None,
    arg_required_else_help = true,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the pipeline every poll interval until Ctrl-C.
    Watch(WatchArgs),

    /// Run a single pipeline cycle and exit.
    Once(OnceArgs),

    /// List staged archives and leftover staging slots for a sample.
    Status(StatusArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Watch(args) => args.run(),
        Commands::Once(args) => args.run(),
        Commands::Status(args) => args.run(),
    }
}
