//! Handler functions for `nixdex config` subcommands.

use std::path::{Path, PathBuf};

use nixdex_core::{Error, Result};

use crate::cli::ConfigAction;
use crate::config::{NixdexConfig, PROJECT_NAME};

// ============================================================================
// Command dispatch
// ============================================================================

/// Handle a config subcommand.
pub fn handle_config_command(config_path: Option<&str>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Path => cmd_config_path(config_path),
        ConfigAction::Show => cmd_config_show(config_path),
        ConfigAction::Init { force } => {
            let path = NixdexConfig::resolve_config_path(config_path)
                .ok_or_else(|| Error::config("Could not determine config directory"))?;
            cmd_config_init(&path, force).map(|_| ())
        }
    }
}

// ============================================================================
// Command handlers
// ============================================================================

/// Show the resolved config file path.
pub fn cmd_config_path(config_path: Option<&str>) -> Result<()> {
    match NixdexConfig::resolve_config_path(config_path) {
        Some(path) => {
            println!("{}", path.display());
            if !path.exists() {
                eprintln!("(file does not exist; run `{PROJECT_NAME} config init` to create it)");
            }
            Ok(())
        }
        None => Err(Error::config(
            "Could not determine config directory for this platform",
        )),
    }
}

/// Print the effective configuration, environment overrides included.
pub fn cmd_config_show(config_path: Option<&str>) -> Result<()> {
    let config = NixdexConfig::load(config_path)?.with_env_overrides()?;
    print!("{}", config.to_toml_string()?);
    Ok(())
}

/// Create a default configuration file.
pub fn cmd_config_init(path: &Path, force: bool) -> Result<PathBuf> {
    if path.exists() && !force {
        return Err(Error::config(format!(
            "Config file already exists at {}. Use --force to overwrite.",
            path.display()
        )));
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::io_with_path(e, parent))?;
    }

    let toml_str = NixdexConfig::default().to_toml_string()?;
    std::fs::write(path, &toml_str).map_err(|e| Error::io_with_path(e, path))?;

    println!("Config file created at {}", path.display());
    Ok(path.to_path_buf())
}

// ============================================================================
// Tests
// ============================================================================
