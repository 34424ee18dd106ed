//! nixdex configuration file.
//!
//! Every field has a default, so an empty or missing file yields the
//! built-in configuration. Precedence, lowest first: defaults, the TOML
//! file, `INDEX_SCHEMA_VERSION`, command-line flags.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use nixdex_core::{Error, MissingFieldPolicy, Result, RunContext};
use nixdex_fts::StoreConfig;
use nixdex_sources::{DEFAULT_BUCKET_URL, DEFAULT_HYDRA_URL};
use serde::{Deserialize, Serialize};

use crate::cli::ImportArgs;

/// Project name used for the config directory.
pub const PROJECT_NAME: &str = "nixdex";

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NixdexConfig {
    /// Schema version embedded in index and alias names.
    #[serde(default)]
    pub schema_version: u32,

    /// How empty license, maintainer and attribute-set fields are filled.
    #[serde(default)]
    pub missing_fields: MissingFieldPolicy,

    /// Platforms kept in `package_platforms`.
    #[serde(default = "default_allowed_platforms")]
    pub allowed_platforms: Vec<String>,

    /// Channel name to release-bucket prefix.
    #[serde(default = "default_channels")]
    pub channels: BTreeMap<String, String>,

    /// Index store.
    #[serde(default)]
    pub store: StoreConfig,

    /// Upstream data sources.
    #[serde(default)]
    pub sources: SourcesConfig,
}

/// Where evaluations, build results and catalogs come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Release bucket base URL.
    #[serde(default = "default_bucket_url")]
    pub bucket_url: String,

    /// Build farm base URL.
    #[serde(default = "default_hydra_url")]
    pub hydra_url: String,

    /// Directory for cached build listings.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// nixpkgs config passed to `nix-env`.
    #[serde(default)]
    pub nixpkgs_config: Option<PathBuf>,

    /// Pre-fetched package listing.
    #[serde(default)]
    pub packages_file: Option<PathBuf>,

    /// Pre-fetched option listing.
    #[serde(default)]
    pub options_file: Option<PathBuf>,

    /// Attach build-farm results to packages.
    #[serde(default)]
    pub fetch_builds: bool,
}

fn default_allowed_platforms() -> Vec<String> {
    RunContext::default().allowed_platforms
}

fn default_channels() -> BTreeMap<String, String> {
    [
        ("unstable", "nixos/unstable/nixos-21.11pre"),
        ("21.05", "nixos/21.05/nixos-21.05."),
        ("20.09", "nixos/20.09/nixos-20.09."),
    ]
    .into_iter()
    .map(|(name, prefix)| (name.to_string(), prefix.to_string()))
    .collect()
}

fn default_bucket_url() -> String {
    DEFAULT_BUCKET_URL.to_string()
}

fn default_hydra_url() -> String {
    DEFAULT_HYDRA_URL.to_string()
}

impl Default for NixdexConfig {
    fn default() -> Self {
        Self {
            schema_version: 0,
            missing_fields: MissingFieldPolicy::default(),
            allowed_platforms: default_allowed_platforms(),
            channels: default_channels(),
            store: StoreConfig::default(),
            sources: SourcesConfig::default(),
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            bucket_url: default_bucket_url(),
            hydra_url: default_hydra_url(),
            cache_dir: None,
            nixpkgs_config: None,
            packages_file: None,
            options_file: None,
            fetch_builds: false,
        }
    }
}

impl SourcesConfig {
    /// Build-listing cache directory, defaulting to the user cache dir.
    pub fn resolved_cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .map(|dir| dir.join(PROJECT_NAME))
                .unwrap_or_else(|| PathBuf::from(".nixdex-cache"))
        })
    }
}

impl NixdexConfig {
    /// Default location: `<config dir>/nixdex/config.toml`.
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(PROJECT_NAME).join("config.toml"))
    }

    /// The explicit path if given, the default location otherwise.
    pub fn resolve_config_path(explicit: Option<&str>) -> Option<PathBuf> {
        match explicit {
            Some(path) => Some(PathBuf::from(path)),
            None => Self::default_config_path(),
        }
    }

    /// Load the configuration.
    ///
    /// An explicit path must exist; a missing default file yields the
    /// defaults.
    pub fn load(explicit: Option<&str>) -> Result<Self> {
        match Self::resolve_config_path(explicit) {
            Some(path) if path.exists() => Self::from_file(&path),
            Some(path) if explicit.is_some() => Err(Error::config(format!(
                "Config file does not exist at {}",
                path.display()
            ))),
            _ => {
                log::debug!("no config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Parse a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::io_with_path(e, path))?;
        Self::from_toml_str(&content)
            .map_err(|e| Error::config(format!("Failed to parse {}: {e}", path.display())))
    }

    /// Parse TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::config(e.to_string()))
    }

    /// Serialize as pretty TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::config(e.to_string()))
    }

    /// Release prefix of a configured channel.
    pub fn channel_prefix(&self, channel: &str) -> Result<&str> {
        self.channels.get(channel).map(String::as_str).ok_or_else(|| {
            let known: Vec<&str> = self.channels.keys().map(String::as_str).collect();
            Error::config(format!(
                "unknown channel '{channel}' (configured: {})",
                known.join(", ")
            ))
        })
    }

    /// Apply the `INDEX_SCHEMA_VERSION` environment override.
    pub fn with_env_overrides(mut self) -> Result<Self> {
        let ctx = RunContext::new().with_schema_version(self.schema_version);
        self.schema_version = ctx.with_schema_version_from_env()?.schema_version;
        Ok(self)
    }

    /// Apply `import` flags on top of the file and environment.
    pub fn apply_import_args(&mut self, args: &ImportArgs) {
        if let Some(version) = args.schema_version {
            self.schema_version = version;
        }
        if let Some(backend) = args.backend {
            self.store.backend = backend;
        }
        if let Some(url) = &args.url {
            self.store.url = url.clone();
        }
        if let Some(path) = &args.path {
            self.store.path = Some(path.display().to_string());
        }
        if let (Some(packages), Some(options)) = (&args.packages_file, &args.options_file) {
            self.sources.packages_file = Some(packages.clone());
            self.sources.options_file = Some(options.clone());
        }
        if args.fetch_builds {
            self.sources.fetch_builds = true;
        }
    }

    /// Per-run context handed to every component.
    pub fn run_context(&self, verbosity: u8) -> RunContext {
        RunContext::new()
            .with_schema_version(self.schema_version)
            .with_verbosity(verbosity)
            .with_missing_fields(self.missing_fields)
            .with_allowed_platforms(self.allowed_platforms.iter().cloned())
    }
}

// ============================================================================
// Tests
// ============================================================================
