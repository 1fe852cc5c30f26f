//! Somatic variant read context evidence worker main executable

pub mod candidate;
pub mod common;
pub mod config;
pub mod err;
pub mod evidence;
pub mod pipeline;
pub mod read_context;
pub mod reads;
pub mod tier;
pub mod variant;

use clap::{Args, Parser, Subcommand};
use console::{Emoji, Term};

/// CLI parser based on clap.
#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Somatic variant evidence collection",
    long_about = "This tool collects read context evidence for somatic variant candidates \
        and applies tiered soft filters"
)]
struct Cli {
    /// Commonly used arguments
    #[command(flatten)]
    common: common::Args,

    /// The sub command to run
    #[command(subcommand)]
    command: Commands,
}

/// Enum supporting the parsing of top-level commands.
#[derive(Debug, Subcommand)]
enum Commands {
    /// Region-related commands.
    Region(Region),
}

/// Parsing of "region *" sub commands.
#[derive(Debug, Args)]
#[command(args_conflicts_with_subcommands = true)]
struct Region {
    /// The sub command to run
    #[command(subcommand)]
    command: RegionCommands,
}

/// Enum supporting the parsing of "region *" sub commands.
#[derive(Debug, Subcommand)]
enum RegionCommands {
    Call(pipeline::cli::Args),
}

fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    // Build a tracing subscriber according to the configuration in `cli.common`.
    let collector = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(match cli.common.verbose.log_level() {
            Some(level) => match level {
                log::Level::Error => tracing::Level::ERROR,
                log::Level::Warn => tracing::Level::WARN,
                log::Level::Info => tracing::Level::INFO,
                log::Level::Debug => tracing::Level::DEBUG,
                log::Level::Trace => tracing::Level::TRACE,
            },
            None => tracing::Level::INFO,
        })
        .compact()
        .finish();

    // Install collector and go into sub commands.
    let term = Term::stderr();
    tracing::subscriber::with_default(collector, || {
        match &cli.command {
            Commands::Region(region) => match &region.command {
                RegionCommands::Call(args) => {
                    pipeline::cli::run(&cli.common, args)?;
                }
            },
        }

        Ok::<(), anyhow::Error>(())
    })?;
    term.write_line(&format!("All done. Have a nice day!{}", Emoji(" 😃", "")))?;

    Ok(())
}
