//! Raw package and option listings.
//!
//! Two sources produce the same listings:
//!
//! - [`FileCatalogSource`] reads JSON files fetched beforehand;
//! - [`NixCatalogSource`] runs the evaluator against the evaluation's
//!   revision.
//!
//! Listings are JSON objects keyed by attribute or option name; entry order
//! is preserved.

use std::path::{Path, PathBuf};
use std::process::Output;

use async_trait::async_trait;
use indexmap::IndexMap;
use nixdex_core::{CatalogSource, Error, Evaluation, OptionRecord, PackageRecord, Result};
use serde::de::DeserializeOwned;
use tokio::process::Command;

use crate::retry::RetryPolicy;

/// Parse a listing object into `(name, record)` pairs in source order.
pub fn parse_listing<T: DeserializeOwned>(bytes: &[u8]) -> Result<Vec<(String, T)>> {
    let listing: IndexMap<String, T> = serde_json::from_slice(bytes)?;
    Ok(listing.into_iter().collect())
}

async fn read_listing<T: DeserializeOwned>(path: &Path) -> Result<Vec<(String, T)>> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| Error::io_with_path(e, path))?;
    parse_listing(&bytes)
}

// ----------------------------------------------------------------------------
// Files
// ----------------------------------------------------------------------------

/// Catalog read from pre-fetched `packages.json` and `options.json`.
#[derive(Debug, Clone)]
pub struct FileCatalogSource {
    packages_file: PathBuf,
    options_file: PathBuf,
}

impl FileCatalogSource {
    /// Create a source reading the two listing files.
    pub fn new(packages_file: impl Into<PathBuf>, options_file: impl Into<PathBuf>) -> Self {
        Self {
            packages_file: packages_file.into(),
            options_file: options_file.into(),
        }
    }
}

#[async_trait]
impl CatalogSource for FileCatalogSource {
    async fn packages(&self, evaluation: &Evaluation) -> Result<Vec<(String, PackageRecord)>> {
        log::debug!(
            "packages: reading {} for revision {}",
            self.packages_file.display(),
            evaluation.git_revision
        );
        read_listing(&self.packages_file).await
    }

    async fn options(&self, evaluation: &Evaluation) -> Result<Vec<(String, OptionRecord)>> {
        log::debug!(
            "options: reading {} for revision {}",
            self.options_file.display(),
            evaluation.git_revision
        );
        read_listing(&self.options_file).await
    }
}

// ----------------------------------------------------------------------------
// Evaluator
// ----------------------------------------------------------------------------

const NIX_ENV: &str = "nix-env";
const NIX_BUILD: &str = "nix-build";

/// Location of the options listing inside the `options` build output.
const OPTIONS_JSON: &str = "share/doc/nixos/options.json";

/// Catalog produced by running the evaluator.
#[derive(Debug, Clone, Default)]
pub struct NixCatalogSource {
    nixpkgs_config: Option<PathBuf>,
    retry: RetryPolicy,
}

impl NixCatalogSource {
    /// Create a source; `nixpkgs_config` is passed to `nix-env` as the
    /// nixpkgs `config` argument when set.
    pub fn new(nixpkgs_config: Option<PathBuf>, retry: RetryPolicy) -> Self {
        Self {
            nixpkgs_config,
            retry,
        }
    }

    /// Arguments of the package listing command.
    pub fn packages_args(&self, evaluation: &Evaluation) -> Vec<String> {
        let mut args = vec![
            "-f".to_string(),
            "<nixpkgs>".to_string(),
            "-I".to_string(),
            nixpkgs_path(evaluation),
        ];
        if let Some(config) = &self.nixpkgs_config {
            args.extend([
                "--arg".to_string(),
                "config".to_string(),
                format!("import {}", config.display()),
            ]);
        }
        args.extend(["-qa".to_string(), "--json".to_string()]);
        args
    }

    /// Arguments of the options build command.
    pub fn options_args(&self, evaluation: &Evaluation) -> Vec<String> {
        vec![
            "<nixpkgs/nixos/release.nix>".to_string(),
            "--no-out-link".to_string(),
            "-A".to_string(),
            "options".to_string(),
            "-I".to_string(),
            nixpkgs_path(evaluation),
        ]
    }
}

fn nixpkgs_path(evaluation: &Evaluation) -> String {
    format!(
        "nixpkgs=https://github.com/NixOS/nixpkgs/archive/{}.tar.gz",
        evaluation.git_revision
    )
}

/// Run `program` and return its stdout; a non-zero exit is an error.
async fn run_command(program: &str, args: &[String]) -> Result<Vec<u8>> {
    log::debug!("run_command: {program} {}", args.join(" "));
    let output: Output = Command::new(program)
        .args(args)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::io_with_path(e, program)
            } else {
                Error::command(program, e.to_string())
            }
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::command(
            program,
            format!("exited with {}: {}", output.status, stderr.trim()),
        ));
    }
    Ok(output.stdout)
}

#[async_trait]
impl CatalogSource for NixCatalogSource {
    async fn packages(&self, evaluation: &Evaluation) -> Result<Vec<(String, PackageRecord)>> {
        log::debug!(
            "packages: retrieving packages for revision {}",
            evaluation.git_revision
        );
        let args = self.packages_args(evaluation);
        let stdout = self
            .retry
            .run(NIX_ENV, || run_command(NIX_ENV, &args))
            .await?;
        parse_listing(&stdout)
    }

    async fn options(&self, evaluation: &Evaluation) -> Result<Vec<(String, OptionRecord)>> {
        log::debug!(
            "options: retrieving options for revision {}",
            evaluation.git_revision
        );
        let args = self.options_args(evaluation);
        let stdout = self
            .retry
            .run(NIX_BUILD, || run_command(NIX_BUILD, &args))
            .await?;

        let out = String::from_utf8_lossy(&stdout).trim().to_string();
        let path = Path::new(&out).join(OPTIONS_JSON);
        if !path.exists() {
            log::warn!("options: {} does not exist, no options", path.display());
            return Ok(Vec::new());
        }
        read_listing(&path).await
    }
}

// ============================================================================
// Tests
// ============================================================================
