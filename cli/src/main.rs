//! Telepipe CLI
//!
//! Command-line interface for checking pipeline configurations and tapping
//! payloads through a pipeline without running the ingestion node.
//!
//! # Usage
//!
//! ```bash
//! telepipe --help
//! telepipe validate pipeline.json
//! telepipe tap --config pipeline.json --data-type log logs.json
//! telepipe tap --data-type trace --encoding gzip --content-type application/x-protobuf traces.pb.gz
//! ```

#![deny(unsafe_code)]

mod commands;

use clap::{Parser, Subcommand};
use commands::TapArgs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Telepipe CLI - Observability pipeline command-line interface
#[derive(Parser)]
#[command(name = "telepipe")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a pipeline configuration and list its steps and sinks
    Validate {
        /// Pipeline configuration file
        config: PathBuf,
    },
    /// Run a payload file through a pipeline and print the terminal events
    Tap(TapArgs),
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut out = std::io::stdout().lock();

    match cli.command {
        Some(Commands::Validate { config }) => commands::validate(&config, &mut out),
        Some(Commands::Tap(args)) => commands::tap(&args, &mut out),
        None => {
            println!("Telepipe CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for usage information");
            Ok(())
        }
    }
}
