use std::process::ExitCode;

use clap::{Parser, Subcommand};
use commands::{
    index::{run_index, IndexArgs},
    stats::{run_stats, StatsArgs},
};
use tracing_subscriber::EnvFilter;
use yansi::{Condition, Paint};

mod commands;

#[derive(Parser, Debug)]
#[command(author, version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Index(IndexArgs),
    Stats(StatsArgs),
}

fn main() -> ExitCode {
    yansi::whenever(Condition::TTY_AND_COLOR);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Index(args) => run_index(args),
        Commands::Stats(args) => run_stats(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {err:#}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}
