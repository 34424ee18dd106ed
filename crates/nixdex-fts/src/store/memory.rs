//! In-process index store.
//!
//! Nothing is persisted. Every mutating call is appended to an operation log
//! so tests can assert on exactly what a run did to the store.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use nixdex_core::{Error, Result};

use super::{AliasAction, BulkOutcome, IndexStore};
use crate::document::Document;
use crate::mapping::IndexSettings;

/// A mutating call made against a [`MemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    /// `create_index`
    CreateIndex(String),
    /// `delete_index`
    DeleteIndex(String),
    /// `bulk_write`, with the number of documents submitted
    BulkWrite {
        /// Target index.
        index: String,
        /// Documents in the batch.
        count: usize,
    },
    /// `update_aliases`
    UpdateAliases(Vec<AliasAction>),
    /// `put_alias`
    PutAlias {
        /// Target index.
        index: String,
        /// Alias name.
        alias: String,
    },
}

type RejectFn = dyn Fn(&Document) -> bool + Send + Sync;

#[derive(Default)]
struct State {
    indexes: BTreeMap<String, Vec<Document>>,
    aliases: BTreeMap<String, BTreeSet<String>>,
    ops: Vec<StoreOp>,
}

/// In-memory index store.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    reject: Option<Box<RejectFn>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every document for which `predicate` returns true, the way a
    /// real store rejects documents that fail mapping validation.
    pub fn with_rejection<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Document) -> bool + Send + Sync + 'static,
    {
        self.reject = Some(Box::new(predicate));
        self
    }

    /// Documents stored in an index.
    pub fn documents(&self, index: &str) -> Result<Vec<Document>> {
        let state = self.lock()?;
        state
            .indexes
            .get(index)
            .cloned()
            .ok_or_else(|| Error::not_found(index, "index"))
    }

    /// Every mutating call so far, in order.
    pub fn operations(&self) -> Result<Vec<StoreOp>> {
        Ok(self.lock()?.ops.clone())
    }

    /// Names of all indexes.
    pub fn index_names(&self) -> Result<Vec<String>> {
        Ok(self.lock()?.indexes.keys().cloned().collect())
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| Error::store("memory store lock poisoned"))
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("reject", &self.reject.is_some())
            .finish()
    }
}

#[async_trait]
impl IndexStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn index_exists(&self, index: &str) -> Result<bool> {
        Ok(self.lock()?.indexes.contains_key(index))
    }

    async fn create_index(&self, index: &str, _settings: &IndexSettings) -> Result<()> {
        let mut state = self.lock()?;
        if state.indexes.contains_key(index) {
            return Err(Error::store(format!("index '{index}' already exists")));
        }
        state.indexes.insert(index.to_string(), Vec::new());
        state.ops.push(StoreOp::CreateIndex(index.to_string()));
        Ok(())
    }

    async fn delete_index(&self, index: &str) -> Result<()> {
        let mut state = self.lock()?;
        if state.indexes.remove(index).is_none() {
            return Err(Error::not_found(index, "index"));
        }
        for targets in state.aliases.values_mut() {
            targets.remove(index);
        }
        state.aliases.retain(|_, targets| !targets.is_empty());
        state.ops.push(StoreOp::DeleteIndex(index.to_string()));
        Ok(())
    }

    async fn bulk_write(&self, index: &str, documents: &[Document]) -> Result<BulkOutcome> {
        let mut outcome = BulkOutcome::default();
        let accepted: Vec<Document> = documents
            .iter()
            .filter(|doc| {
                let rejected = self.reject.as_ref().is_some_and(|reject| reject(doc));
                if rejected {
                    outcome.failed += 1;
                } else {
                    outcome.succeeded += 1;
                }
                !rejected
            })
            .cloned()
            .collect();

        let mut state = self.lock()?;
        let stored = state
            .indexes
            .get_mut(index)
            .ok_or_else(|| Error::not_found(index, "index"))?;
        stored.extend(accepted);
        state.ops.push(StoreOp::BulkWrite {
            index: index.to_string(),
            count: documents.len(),
        });
        Ok(outcome)
    }

    async fn count_documents(&self, index: &str) -> Result<u64> {
        let state = self.lock()?;
        state
            .indexes
            .get(index)
            .map(|docs| docs.len() as u64)
            .ok_or_else(|| Error::not_found(index, "index"))
    }

    async fn alias_exists(&self, alias: &str) -> Result<bool> {
        Ok(self.lock()?.aliases.contains_key(alias))
    }

    async fn aliased_indexes(&self, alias: &str) -> Result<BTreeSet<String>> {
        Ok(self
            .lock()?
            .aliases
            .get(alias)
            .cloned()
            .unwrap_or_default())
    }

    async fn update_aliases(&self, actions: &[AliasAction]) -> Result<()> {
        let mut state = self.lock()?;
        let mut aliases = state.aliases.clone();
        for action in actions {
            match action {
                AliasAction::Add { index, alias } => {
                    if !state.indexes.contains_key(index) {
                        return Err(Error::not_found(index, "index"));
                    }
                    aliases.entry(alias.clone()).or_default().insert(index.clone());
                }
                AliasAction::Remove { index, alias } => {
                    let removed = aliases
                        .get_mut(alias)
                        .is_some_and(|targets| targets.remove(index));
                    if !removed {
                        return Err(Error::not_found(format!("{alias} -> {index}"), "alias"));
                    }
                }
            }
        }
        aliases.retain(|_, targets| !targets.is_empty());
        state.aliases = aliases;
        state.ops.push(StoreOp::UpdateAliases(actions.to_vec()));
        Ok(())
    }

    async fn put_alias(&self, index: &str, alias: &str) -> Result<()> {
        let mut state = self.lock()?;
        if !state.indexes.contains_key(index) {
            return Err(Error::not_found(index, "index"));
        }
        state
            .aliases
            .entry(alias.to_string())
            .or_default()
            .insert(index.to_string());
        state.ops.push(StoreOp::PutAlias {
            index: index.to_string(),
            alias: alias.to_string(),
        });
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
