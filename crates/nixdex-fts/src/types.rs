//! Common types for index stores.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Default number of documents sent per bulk request.
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// Which index store to write to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// Remote Elasticsearch cluster.
    #[default]
    Elasticsearch,
    /// Local Tantivy indexes under a directory.
    Tantivy,
    /// In-process store; nothing is persisted.
    Memory,
}

impl StoreBackend {
    /// Configuration name of the backend.
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreBackend::Elasticsearch => "elasticsearch",
            StoreBackend::Tantivy => "tantivy",
            StoreBackend::Memory => "memory",
        }
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreBackend {
    type Err = nixdex_core::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "elasticsearch" | "es" => Ok(StoreBackend::Elasticsearch),
            "tantivy" => Ok(StoreBackend::Tantivy),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(nixdex_core::Error::config(format!(
                "unknown store backend '{other}' (expected elasticsearch, tantivy or memory)"
            ))),
        }
    }
}

/// Index store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Backend type.
    #[serde(default)]
    pub backend: StoreBackend,

    /// Elasticsearch base URL.
    #[serde(default = "default_url")]
    pub url: String,

    /// Root directory for Tantivy indexes.
    #[serde(default)]
    pub path: Option<String>,

    /// Documents per bulk request.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

fn default_url() -> String {
    "http://localhost:9200".to_string()
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            url: default_url(),
            path: None,
            chunk_size: default_chunk_size(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
