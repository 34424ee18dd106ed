//! Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use nixdex_fts::StoreBackend;

/// nixdex - package and option catalog indexer
#[derive(Parser, Debug)]
#[command(name = "nixdex", version)]
#[command(about = "Import package and option catalogs into a search index", long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Increase verbosity (-v warn, -vv info, -vvv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Import the latest evaluation of a channel and publish it
    Import(ImportArgs),
    /// List configured channels and their release prefixes
    Channels,
    /// Print the index settings and mapping as JSON
    Mapping,
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args, Debug, Default)]
pub struct ImportArgs {
    /// Channel name, as configured under `[channels]`
    #[arg(long)]
    pub channel: String,

    /// Delete and rebuild the index if it already exists
    #[arg(long)]
    pub force: bool,

    /// Index store backend
    #[arg(long, value_parser = parse_backend)]
    pub backend: Option<StoreBackend>,

    /// Elasticsearch base URL
    #[arg(long, env = "NIXDEX_ES_URL")]
    pub url: Option<String>,

    /// Root directory of the tantivy store
    #[arg(long)]
    pub path: Option<PathBuf>,

    /// Pre-fetched package listing (requires --options-file)
    #[arg(long, requires = "options_file")]
    pub packages_file: Option<PathBuf>,

    /// Pre-fetched option listing (requires --packages-file)
    #[arg(long, requires = "packages_file")]
    pub options_file: Option<PathBuf>,

    /// Attach build-farm results to packages
    #[arg(long)]
    pub fetch_builds: bool,

    /// Schema version, overriding config and INDEX_SCHEMA_VERSION
    #[arg(long)]
    pub schema_version: Option<u32>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Show the resolved config file path
    Path,
    /// Print the effective configuration as TOML
    Show,
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn parse_backend(raw: &str) -> Result<StoreBackend, String> {
    raw.parse().map_err(|e: nixdex_core::Error| e.to_string())
}

// ============================================================================
// Tests
// ============================================================================
