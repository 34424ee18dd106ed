//! Explicit per-run configuration.
//!
//! A `RunContext` is built once by the caller and passed by reference to every
//! component that needs to know the schema version, the verbosity, or how to
//! fill in missing catalog fields. Nothing in nixdex reads these from global
//! state.

use serde::{Deserialize, Serialize};

/// Platforms kept in `package_platforms` unless configured otherwise.
pub const DEFAULT_ALLOWED_PLATFORMS: &[&str] =
    &["x86_64-linux", "aarch64-linux", "x86_64-darwin", "i686-linux"];

/// Environment variable that overrides the configured schema version.
pub const SCHEMA_VERSION_ENV: &str = "INDEX_SCHEMA_VERSION";

/// How the normalizer fills license, maintainer and attribute-set fields that
/// the catalog leaves empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingFieldPolicy {
    /// A single placeholder entry ("No license", "No maintainers",
    /// "No package set").
    #[default]
    Placeholder,
    /// Empty lists, and `null` for the attribute set.
    Empty,
}

/// Configuration shared by every stage of a single import run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunContext {
    /// Version component of index and alias names.
    #[serde(default)]
    pub schema_version: u32,

    /// Number of `-v` flags given on the command line.
    #[serde(default)]
    pub verbosity: u8,

    /// Sentinel policy for missing fields.
    #[serde(default)]
    pub missing_fields: MissingFieldPolicy,

    /// Platforms kept in package documents, in no particular order.
    #[serde(default = "default_allowed_platforms")]
    pub allowed_platforms: Vec<String>,
}

fn default_allowed_platforms() -> Vec<String> {
    DEFAULT_ALLOWED_PLATFORMS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for RunContext {
    fn default() -> Self {
        Self {
            schema_version: 0,
            verbosity: 0,
            missing_fields: MissingFieldPolicy::default(),
            allowed_platforms: default_allowed_platforms(),
        }
    }
}

impl RunContext {
    /// Create a context with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the schema version.
    pub fn with_schema_version(mut self, version: u32) -> Self {
        self.schema_version = version;
        self
    }

    /// Set the verbosity level.
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set the missing-field policy.
    pub fn with_missing_fields(mut self, policy: MissingFieldPolicy) -> Self {
        self.missing_fields = policy;
        self
    }

    /// Replace the platform allow-list.
    pub fn with_allowed_platforms<I, S>(mut self, platforms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_platforms = platforms.into_iter().map(Into::into).collect();
        self
    }

    /// Apply `INDEX_SCHEMA_VERSION` from the environment, if set.
    ///
    /// Returns a configuration error when the variable is set but is not a
    /// non-negative integer.
    pub fn with_schema_version_from_env(self) -> crate::Result<Self> {
        match std::env::var(SCHEMA_VERSION_ENV) {
            Ok(raw) => self.with_schema_version_str(&raw),
            Err(_) => Ok(self),
        }
    }

    fn with_schema_version_str(self, raw: &str) -> crate::Result<Self> {
        let version = raw.trim().parse::<u32>().map_err(|e| {
            crate::Error::config(format!("{SCHEMA_VERSION_ENV}={raw:?} is not a version: {e}"))
        })?;
        Ok(self.with_schema_version(version))
    }

    /// Whether a platform survives the allow-list filter.
    pub fn allows_platform(&self, platform: &str) -> bool {
        self.allowed_platforms.iter().any(|p| p == platform)
    }

    /// Log level implied by the verbosity count.
    pub fn log_level(&self) -> log::LevelFilter {
        match self.verbosity {
            0 => log::LevelFilter::Error,
            1 => log::LevelFilter::Warn,
            2 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
