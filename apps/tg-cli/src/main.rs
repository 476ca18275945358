//! # tg-cli
//!
//! Command-line interface for tickgraph.
//!
//! - `tg goal <file>` — parse a JSON goal description with the graph's
//!   domain factories and print its normalised export
//! - `tg convert --date <d> | --duration <d>` — show the tick values of a
//!   calendar date or a duration
//!
//! Both read the graph settings (tick duration, epoch, initial tick) from
//! `--config`, falling back to the defaults when the file does not exist.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tg_graph::{Graph, GraphConfig};
use tracing_subscriber::EnvFilter;

/// tickgraph CLI — inspect goal descriptions and tick conversions.
#[derive(Parser)]
#[command(name = "tg", version, about)]
struct Cli {
    /// Graph configuration file.
    #[arg(long, default_value = "graph.toml")]
    config: PathBuf,

    /// Log graph activity at debug level.
    #[arg(long, short)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a goal description and print its normalised form.
    Goal(commands::goal::GoalArgs),
    /// Convert a date or a duration into ticks.
    Convert(commands::convert::ConvertArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so they don't interfere with the printed result.
    let level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(format!("tg_graph={level}").parse()?)
                .add_directive(format!("tg_domain={level}").parse()?)
                .add_directive(format!("tg={level}").parse()?),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let config = GraphConfig::load_or_default(&cli.config)?;
    let graph = Graph::from_config(&config)?;

    match &cli.command {
        Commands::Goal(args) => commands::goal::execute(args, &graph),
        Commands::Convert(args) => commands::convert::execute(args, &graph),
    }
}
