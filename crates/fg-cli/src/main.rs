use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod cmd_check;
mod cmd_explain;
mod tracing_init;

#[derive(Parser)]
#[command(name = "fg", about = "Declare and validate stream-processing topologies")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the graph from a manifest and run compile checks
    Check {
        /// Path to the topology manifest (TOML)
        manifest: PathBuf,

        /// Pass the verbose flag to operator compile checks
        #[arg(short, long)]
        verbose: bool,
    },

    /// Print the resolved topology in human-readable form
    Explain {
        /// Path to the topology manifest (TOML)
        manifest: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check { manifest, verbose } => {
            cmd_check::run(manifest, verbose)?;
        }

        Commands::Explain { manifest } => {
            cmd_explain::run(manifest)?;
        }
    }

    Ok(())
}
