mod catalog;
mod cli;
mod commands;
mod dataset;
mod labels;
mod model;
mod partition;
mod resolver;
mod training;
mod util;

use anyhow::Result;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};

fn main() {
    init_tracing();

    if let Err(err) = run() {
        error!(error = %err, "command failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Recommend(args) => commands::recommend::run(args),
        Commands::SetupDataset(args) => commands::setup_dataset::run(args),
        Commands::GenerateLabels(args) => commands::generate_labels::run(args),
        Commands::Inventory(args) => commands::inventory::run(args),
        Commands::WriteConfig(args) => commands::train::write_config(args),
        Commands::Train(args) => commands::train::run(args),
        Commands::Status(args) => commands::status::run(args),
        Commands::Check(args) => commands::check::run(args),
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
