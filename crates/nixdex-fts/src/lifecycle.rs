//! Index lifecycle: create a versioned index, populate it, repoint the alias.
//!
//! States of an index are `absent → created → populated`; the alias is a
//! separate resource that is either unbound or bound to one index. The alias
//! only ever moves to an index after population finished, so readers going
//! through the alias see either the new, fully written index or the previous
//! one.
//!
//! # Example
//!
//! ```rust,ignore
//! let lifecycle = IndexLifecycle::new(store.as_ref()).with_chunk_size(500);
//! let names = IndexNames::new(ctx.schema_version, "unstable", &evaluation);
//!
//! if lifecycle.ensure_index(&names.index, force).await? {
//!     let stats = lifecycle
//!         .write_documents(&names.index, "packages", total, documents)
//!         .await?;
//!     println!("{stats}");
//! }
//! lifecycle.update_alias(&names.alias, &names.index).await?;
//! ```

use std::fmt;

use nixdex_core::{Error, Evaluation, Result};

use crate::document::Document;
use crate::mapping::{IndexSettings, index_settings};
use crate::store::{AliasAction, BulkOutcome, IndexStore};
use crate::types::DEFAULT_CHUNK_SIZE;

/// Alias and index names for one channel evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexNames {
    /// `latest-{schema_version}-{channel}`
    pub alias: String,
    /// `evaluation-{schema_version}-{channel}-{identity}`
    pub index: String,
}

impl IndexNames {
    /// Derive the names for an evaluation of `channel`.
    pub fn new(schema_version: u32, channel: &str, evaluation: &Evaluation) -> Self {
        Self {
            alias: format!("latest-{schema_version}-{channel}"),
            index: format!(
                "evaluation-{schema_version}-{channel}-{}",
                evaluation.identity()
            ),
        }
    }
}

/// Result of populating an index with one unit of documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteStats {
    /// What was written (`packages`, `options`).
    pub unit: String,
    /// Records the source reported.
    pub total: usize,
    /// Documents submitted to the store.
    pub submitted: usize,
    /// Documents the store accepted.
    pub succeeded: usize,
    /// Documents the store rejected.
    pub failed: usize,
}

impl WriteStats {
    fn empty(unit: &str, total: usize) -> Self {
        Self {
            unit: unit.to_string(),
            total,
            submitted: 0,
            succeeded: 0,
            failed: 0,
        }
    }
}

impl fmt::Display for WriteStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Indexed {}/{} {}", self.succeeded, self.total, self.unit)
    }
}

/// Drives one index through creation, population and alias publication.
pub struct IndexLifecycle<'a> {
    store: &'a dyn IndexStore,
    settings: IndexSettings,
    chunk_size: usize,
}

impl<'a> IndexLifecycle<'a> {
    /// Create a lifecycle over `store` with the default mapping and chunk size.
    pub fn new(store: &'a dyn IndexStore) -> Self {
        Self {
            store,
            settings: index_settings(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Set the number of documents sent per bulk request.
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    /// Use custom index settings instead of [`index_settings`].
    pub fn with_settings(mut self, settings: IndexSettings) -> Self {
        self.settings = settings;
        self
    }

    /// The store this lifecycle writes to.
    pub fn store(&self) -> &dyn IndexStore {
        self.store
    }

    /// Make sure `index` exists.
    ///
    /// Returns `true` if a fresh, empty index was created by this call. An
    /// existing index is left untouched unless `force` is set, in which case
    /// it is deleted and recreated.
    pub async fn ensure_index(&self, index: &str, force: bool) -> Result<bool> {
        if self.store.index_exists(index).await? {
            if !force {
                log::info!("ensure_index: '{index}' already exists, nothing created");
                return Ok(false);
            }
            log::info!("ensure_index: deleting '{index}' before recreating it");
            self.store.delete_index(index).await?;
        }
        self.store.create_index(index, &self.settings).await?;
        log::info!("ensure_index: created '{index}'");
        Ok(true)
    }

    /// Stream documents into `index` in chunks.
    ///
    /// `total` is the number of source records, used for progress and the
    /// final report; when it is zero nothing is written. Documents rejected
    /// by the store are counted and do not stop the stream. An `Err` from
    /// the stream aborts population and is returned as-is.
    pub async fn write_documents<I>(
        &self,
        index: &str,
        unit: &str,
        total: usize,
        documents: I,
    ) -> Result<WriteStats>
    where
        I: IntoIterator<Item = Result<Document>>,
    {
        if total == 0 {
            log::info!("write_documents: no {unit} to index");
            return Ok(WriteStats::empty(unit, total));
        }
        log::info!("Indexing {unit}...");

        let mut stats = WriteStats::empty(unit, total);
        let mut outcome = BulkOutcome::default();
        let mut chunk = Vec::with_capacity(self.chunk_size);

        for document in documents {
            chunk.push(document?);
            if chunk.len() >= self.chunk_size {
                self.flush(index, &mut chunk, &mut stats, &mut outcome).await?;
            }
        }
        if !chunk.is_empty() {
            self.flush(index, &mut chunk, &mut stats, &mut outcome).await?;
        }
        self.store.refresh(index).await?;

        stats.succeeded = outcome.succeeded;
        stats.failed = outcome.failed;
        if stats.failed > 0 {
            log::warn!(
                "write_documents: {} of {} {unit} were rejected by the store",
                stats.failed,
                stats.submitted
            );
        }
        Ok(stats)
    }

    async fn flush(
        &self,
        index: &str,
        chunk: &mut Vec<Document>,
        stats: &mut WriteStats,
        outcome: &mut BulkOutcome,
    ) -> Result<()> {
        outcome.absorb(self.store.bulk_write(index, chunk).await?);
        stats.submitted += chunk.len();
        chunk.clear();
        log::info!(
            "write_documents: {}/{} {} submitted",
            stats.submitted,
            stats.total,
            stats.unit
        );
        Ok(())
    }

    /// Point `alias` at `index` and nothing else.
    ///
    /// Every other index the alias points at is removed and `index` is added
    /// in a single batch, so the alias never resolves to nothing. An alias
    /// that does not exist yet is created.
    pub async fn update_alias(&self, alias: &str, index: &str) -> Result<()> {
        if !self.store.index_exists(index).await? {
            return Err(Error::not_found(index, "index"));
        }

        if !self.store.alias_exists(alias).await? {
            self.store.put_alias(index, alias).await?;
        } else {
            let current = self.store.aliased_indexes(alias).await?;
            let mut actions: Vec<AliasAction> = current
                .iter()
                .filter(|existing| existing.as_str() != index)
                .map(|existing| AliasAction::remove(existing.as_str(), alias))
                .collect();
            if !current.contains(index) {
                actions.push(AliasAction::add(index, alias));
            }
            if actions.is_empty() {
                log::debug!("update_alias: '{alias}' already points at '{index}'");
            } else {
                self.store.update_aliases(&actions).await?;
            }
        }

        log::info!("'{alias}' alias now points to '{index}' index");
        Ok(())
    }
}

impl fmt::Debug for IndexLifecycle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexLifecycle")
            .field("store", &self.store.name())
            .field("chunk_size", &self.chunk_size)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
