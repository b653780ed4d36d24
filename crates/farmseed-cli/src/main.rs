//! Farmseed CLI - record plantings, fields, and seed inventory, and keep a
//! shared farm workspace in sync.

mod cli;
mod commands;
mod config;
mod error;

use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::config::resolve_data_dir;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("farmseed=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let data_dir = resolve_data_dir(cli.data_dir);

    match cli.command {
        Commands::Entry { command } => commands::entry::run(command, &data_dir).await,
        Commands::Field { command } => commands::field::run(command, &data_dir).await,
        Commands::Inventory { command } => commands::inventory::run(command, &data_dir).await,
        Commands::Farm { command } => commands::farm::run(command, &data_dir).await,
        Commands::Sync { command } => commands::sync_cmd::run(command, &data_dir).await,
        Commands::Admin { command } => commands::admin::run(command, &data_dir).await,
    }
}
