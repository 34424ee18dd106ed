//! Index store trait and factory.
//!
//! An `IndexStore` holds named indexes and aliases. The lifecycle code only
//! talks to this trait; the three implementations differ in where the data
//! lives.
//!
//! # Stores
//!
//! - `ElasticsearchStore`: REST calls against a cluster (`elasticsearch-store` feature)
//! - `TantivyStore`: one Tantivy index per directory (`tantivy-store` feature)
//! - `MemoryStore`: in-process, for dry runs and tests

use std::collections::BTreeSet;

use async_trait::async_trait;
use nixdex_core::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::mapping::IndexSettings;
use crate::types::{StoreBackend, StoreConfig};

pub mod memory;

#[cfg(feature = "elasticsearch-store")]
pub mod elastic;

#[cfg(feature = "tantivy-store")]
pub mod tantivy;

pub use memory::{MemoryStore, StoreOp};

#[cfg(feature = "elasticsearch-store")]
pub use elastic::ElasticsearchStore;

#[cfg(feature = "tantivy-store")]
pub use self::tantivy::TantivyStore;

/// One step of an atomic alias update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AliasAction {
    /// Point `alias` at `index`.
    Add {
        /// Index name.
        index: String,
        /// Alias name.
        alias: String,
    },
    /// Stop pointing `alias` at `index`.
    Remove {
        /// Index name.
        index: String,
        /// Alias name.
        alias: String,
    },
}

impl AliasAction {
    /// Create an add action.
    pub fn add(index: impl Into<String>, alias: impl Into<String>) -> Self {
        AliasAction::Add {
            index: index.into(),
            alias: alias.into(),
        }
    }

    /// Create a remove action.
    pub fn remove(index: impl Into<String>, alias: impl Into<String>) -> Self {
        AliasAction::Remove {
            index: index.into(),
            alias: alias.into(),
        }
    }
}

/// Per-document result counts of a bulk write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkOutcome {
    /// Documents the store accepted.
    pub succeeded: usize,
    /// Documents the store rejected.
    pub failed: usize,
}

impl BulkOutcome {
    /// Add another outcome to this one.
    pub fn absorb(&mut self, other: BulkOutcome) {
        self.succeeded += other.succeeded;
        self.failed += other.failed;
    }
}

/// A store of named indexes and aliases.
///
/// Implementations apply `update_aliases` atomically: either every action
/// takes effect or none does.
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Backend name for diagnostics.
    fn name(&self) -> &str;

    /// Whether an index exists.
    async fn index_exists(&self, index: &str) -> Result<bool>;

    /// Create an index with the given settings and mapping.
    async fn create_index(&self, index: &str, settings: &IndexSettings) -> Result<()>;

    /// Delete an index and everything in it.
    async fn delete_index(&self, index: &str) -> Result<()>;

    /// Write a batch of documents.
    ///
    /// Individual rejections are counted in the outcome; an `Err` means the
    /// batch as a whole could not be submitted.
    async fn bulk_write(&self, index: &str, documents: &[Document]) -> Result<BulkOutcome>;

    /// Make everything written to `index` so far durable and visible to
    /// `count_documents`.
    async fn refresh(&self, _index: &str) -> Result<()> {
        Ok(())
    }

    /// Number of documents visible in an index.
    async fn count_documents(&self, index: &str) -> Result<u64>;

    /// Whether an alias exists.
    async fn alias_exists(&self, alias: &str) -> Result<bool>;

    /// Indexes an alias currently points at; empty if the alias is unbound.
    async fn aliased_indexes(&self, alias: &str) -> Result<BTreeSet<String>>;

    /// Apply a batch of alias actions atomically.
    async fn update_aliases(&self, actions: &[AliasAction]) -> Result<()>;

    /// Create an alias pointing at a single index.
    async fn put_alias(&self, index: &str, alias: &str) -> Result<()>;
}

/// Create an index store from configuration.
///
/// # Errors
///
/// Returns a configuration error if the backend is not compiled in or is
/// missing required settings.
pub fn create_store(config: &StoreConfig) -> Result<Box<dyn IndexStore>> {
    match config.backend {
        #[cfg(feature = "elasticsearch-store")]
        StoreBackend::Elasticsearch => Ok(Box::new(ElasticsearchStore::new(&config.url)?)),
        #[cfg(feature = "tantivy-store")]
        StoreBackend::Tantivy => {
            let path = config
                .path
                .as_deref()
                .ok_or_else(|| Error::config("store.path is required for the tantivy backend"))?;
            Ok(Box::new(TantivyStore::open(path)?))
        }
        StoreBackend::Memory => Ok(Box::new(MemoryStore::new())),
        #[allow(unreachable_patterns)]
        other => Err(Error::config(format!(
            "store backend '{other}' is not enabled in this build"
        ))),
    }
}

// ============================================================================
// Tests
// ============================================================================
