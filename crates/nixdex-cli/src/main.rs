//! nixdex CLI
//!
//! Imports package and option catalogs of NixOS channels into versioned
//! search indexes and publishes them behind per-channel aliases.

#![warn(clippy::all)]
#![forbid(unsafe_code)]

mod cli;
mod commands;
mod config;
mod config_handlers;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use nixdex_core::RunContext;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};
use crate::config::NixdexConfig;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

/// RUST_LOG wins over the `-v` count.
fn init_logging(verbosity: u8) {
    let level = RunContext::new().with_verbosity(verbosity).log_level();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_ascii_lowercase())),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Config { action } => {
            config_handlers::handle_config_command(config_path, action)?;
        }
        Command::Mapping => commands::cmd_mapping()?,
        Command::Channels => {
            let config = NixdexConfig::load(config_path)?;
            commands::cmd_channels(&config)?;
        }
        Command::Import(args) => {
            let config = NixdexConfig::load(config_path)
                .and_then(NixdexConfig::with_env_overrides)
                .context("loading configuration")?;
            commands::cmd_import(config, &args, cli.verbose)
                .await
                .with_context(|| format!("importing channel '{}'", args.channel))?;
        }
    }
    Ok(())
}
