//! Local index store backed by Tantivy.
//!
//! Layout under the store root:
//!
//! ```text
//! <root>/
//!   aliases.json          alias -> [index, ...]
//!   <index-name>/         one Tantivy index per index name
//!     meta.json
//!     ...
//! ```
//!
//! The Tantivy schema is derived from the field mapping. Subfields such as
//! `package_attr_name.edge` become sibling fields named `package_attr_name_edge`
//! and receive a copy of the parent value at write time.
//!
//! Each index keeps one open writer between `bulk_write` calls. Documents
//! become durable on `refresh`, which commits and closes that writer;
//! deleting an index drops its writer along with anything uncommitted.
//!
//! Alias updates rewrite `aliases.json` through a temporary file and a rename,
//! so readers see either the old table or the new one.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use nixdex_core::{Error, Result};
use serde_json::{Map, Value};
use tantivy::schema::{
    IndexRecordOption, JsonObjectOptions, STORED, STRING, Schema, SchemaBuilder,
    TextFieldIndexing, TextOptions,
};
use tantivy::tokenizer::{
    Language, LowerCaser, NgramTokenizer, RawTokenizer, SimpleTokenizer, Stemmer, TextAnalyzer,
};
use tantivy::{Index, IndexWriter, TantivyDocument};
use tokio::sync::Mutex;

use super::{AliasAction, BulkOutcome, IndexStore};
use crate::document::Document;
use crate::mapping::IndexSettings;

/// Index writer buffer size (50MB).
const WRITER_BUFFER_SIZE: usize = 50_000_000;

const ALIAS_FILE: &str = "aliases.json";
const ALIAS_TMP_FILE: &str = ".aliases.json.tmp";

type AliasTable = BTreeMap<String, BTreeSet<String>>;

/// Tantivy-backed index store rooted at a directory.
pub struct TantivyStore {
    root: PathBuf,
    alias_lock: Mutex<()>,
    writers: std::sync::Mutex<HashMap<String, IndexWriter>>,
}

impl TantivyStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root).map_err(|e| Error::io_with_path(e, &root))?;
        Ok(Self {
            root,
            alias_lock: Mutex::new(()),
            writers: std::sync::Mutex::new(HashMap::new()),
        })
    }

    /// Store root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn index_dir(&self, index: &str) -> Result<PathBuf> {
        if index.is_empty()
            || index.starts_with('.')
            || index.contains(['/', '\\'])
            || index == ALIAS_FILE
        {
            return Err(Error::config(format!("invalid index name '{index}'")));
        }
        Ok(self.root.join(index))
    }

    fn open_index(&self, index: &str) -> Result<Index> {
        let dir = self.index_dir(index)?;
        if !dir.join("meta.json").exists() {
            return Err(Error::not_found(index, "index"));
        }
        let index = Index::open_in_dir(&dir)
            .map_err(|e| Error::store(format!("Failed to open index {}: {e}", dir.display())))?;
        register_tokenizers(&index)?;
        Ok(index)
    }

    fn lock_writers(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, IndexWriter>>> {
        self.writers
            .lock()
            .map_err(|_| Error::store("index writer table lock poisoned"))
    }

    /// Detach the open writer of `index`, if any.
    fn take_writer(&self, index: &str) -> Result<Option<IndexWriter>> {
        Ok(self.lock_writers()?.remove(index))
    }

    /// Add documents through the cached writer of `index`, opening it first
    /// if needed. Nothing is committed here.
    fn add_documents(&self, index: &str, documents: &[Document]) -> Result<BulkOutcome> {
        let mut writers = self.lock_writers()?;
        let writer = match writers.entry(index.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let writer = self
                    .open_index(index)?
                    .writer(WRITER_BUFFER_SIZE)
                    .map_err(|e| Error::store(format!("Failed to create index writer: {e}")))?;
                entry.insert(writer)
            }
        };
        let schema = writer.index().schema();
        let copies = subfield_copies(&schema);

        let mut outcome = BulkOutcome::default();
        for doc in documents {
            let converted = doc
                .to_json()
                .and_then(|json| prepare_json(json, &copies))
                .and_then(|json| {
                    TantivyDocument::parse_json(&schema, &json)
                        .map_err(|e| Error::store(format!("{e}")))
                });
            let added = converted.and_then(|tantivy_doc| {
                writer
                    .add_document(tantivy_doc)
                    .map_err(|e| Error::store(format!("Failed to add document: {e}")))
            });
            match added {
                Ok(_) => outcome.succeeded += 1,
                Err(e) => {
                    log::warn!("bulk_write: rejected {} '{}': {e}", doc.kind(), doc.name());
                    outcome.failed += 1;
                }
            }
        }
        Ok(outcome)
    }

    fn read_aliases(&self) -> Result<AliasTable> {
        let path = self.root.join(ALIAS_FILE);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AliasTable::new()),
            Err(e) => Err(Error::io_with_path(e, &path)),
        }
    }

    fn write_aliases(&self, table: &AliasTable) -> Result<()> {
        let tmp = self.root.join(ALIAS_TMP_FILE);
        let path = self.root.join(ALIAS_FILE);
        let bytes = serde_json::to_vec_pretty(table)?;
        std::fs::write(&tmp, bytes).map_err(|e| Error::io_with_path(e, &tmp))?;
        std::fs::rename(&tmp, &path).map_err(|e| Error::io_with_path(e, &path))?;
        Ok(())
    }
}

impl std::fmt::Debug for TantivyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TantivyStore")
            .field("root", &self.root)
            .finish()
    }
}

#[async_trait]
impl IndexStore for TantivyStore {
    fn name(&self) -> &str {
        "tantivy"
    }

    async fn index_exists(&self, index: &str) -> Result<bool> {
        Ok(self.index_dir(index)?.join("meta.json").exists())
    }

    async fn create_index(&self, index: &str, settings: &IndexSettings) -> Result<()> {
        let dir = self.index_dir(index)?;
        if dir.join("meta.json").exists() {
            return Err(Error::store(format!("index '{index}' already exists")));
        }
        let schema = schema_from_mapping(settings)?;
        std::fs::create_dir_all(&dir).map_err(|e| Error::io_with_path(e, &dir))?;
        let created = Index::create_in_dir(&dir, schema)
            .map_err(|e| Error::store(format!("Failed to create index {index}: {e}")))?;
        register_tokenizers(&created)?;
        log::debug!("create_index: created {}", dir.display());
        Ok(())
    }

    async fn delete_index(&self, index: &str) -> Result<()> {
        let dir = self.index_dir(index)?;
        if !dir.join("meta.json").exists() {
            return Err(Error::not_found(index, "index"));
        }
        if self.take_writer(index)?.is_some() {
            log::debug!("delete_index: discarded uncommitted writes to '{index}'");
        }

        let _guard = self.alias_lock.lock().await;
        let mut table = self.read_aliases()?;
        let before = table.clone();
        for targets in table.values_mut() {
            targets.remove(index);
        }
        table.retain(|_, targets| !targets.is_empty());
        if table != before {
            self.write_aliases(&table)?;
        }

        std::fs::remove_dir_all(&dir).map_err(|e| Error::io_with_path(e, &dir))?;
        Ok(())
    }

    async fn bulk_write(&self, index: &str, documents: &[Document]) -> Result<BulkOutcome> {
        self.add_documents(index, documents)
    }

    async fn refresh(&self, index: &str) -> Result<()> {
        let Some(mut writer) = self.take_writer(index)? else {
            return Ok(());
        };
        writer
            .commit()
            .map_err(|e| Error::store(format!("Failed to commit index {index}: {e}")))?;
        log::debug!("refresh: committed '{index}'");
        Ok(())
    }

    async fn count_documents(&self, index: &str) -> Result<u64> {
        let tantivy_index = self.open_index(index)?;
        let reader = tantivy_index
            .reader()
            .map_err(|e| Error::store(format!("Failed to open index reader: {e}")))?;
        Ok(reader.searcher().num_docs())
    }

    async fn alias_exists(&self, alias: &str) -> Result<bool> {
        Ok(self.read_aliases()?.contains_key(alias))
    }

    async fn aliased_indexes(&self, alias: &str) -> Result<BTreeSet<String>> {
        Ok(self.read_aliases()?.remove(alias).unwrap_or_default())
    }

    async fn update_aliases(&self, actions: &[AliasAction]) -> Result<()> {
        let _guard = self.alias_lock.lock().await;
        let mut table = self.read_aliases()?;

        for action in actions {
            match action {
                AliasAction::Add { index, alias } => {
                    if !self.index_exists(index).await? {
                        return Err(Error::not_found(index, "index"));
                    }
                    table.entry(alias.clone()).or_default().insert(index.clone());
                }
                AliasAction::Remove { index, alias } => {
                    let removed = table
                        .get_mut(alias)
                        .is_some_and(|targets| targets.remove(index));
                    if !removed {
                        return Err(Error::not_found(format!("{alias} -> {index}"), "alias"));
                    }
                }
            }
        }
        table.retain(|_, targets| !targets.is_empty());
        self.write_aliases(&table)
    }

    async fn put_alias(&self, index: &str, alias: &str) -> Result<()> {
        self.update_aliases(&[AliasAction::add(index, alias)]).await
    }
}

// ----------------------------------------------------------------------------
// Schema derivation
// ----------------------------------------------------------------------------

/// Register the analyzers the mapping refers to.
fn register_tokenizers(index: &Index) -> Result<()> {
    let edge_tokenizer = NgramTokenizer::prefix_only(2, 50)
        .map_err(|e| Error::store(format!("Failed to build edge tokenizer: {e}")))?;
    let edge = TextAnalyzer::builder(edge_tokenizer)
        .filter(LowerCaser)
        .build();
    let lowercase = TextAnalyzer::builder(RawTokenizer::default())
        .filter(LowerCaser)
        .build();
    let english = TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(LowerCaser)
        .filter(Stemmer::new(Language::English))
        .build();

    let tokenizers = index.tokenizers();
    tokenizers.register("edge", edge);
    tokenizers.register("lowercase", lowercase);
    tokenizers.register("english", english);
    Ok(())
}

fn text_options(tokenizer: &str, record: IndexRecordOption) -> TextOptions {
    TextOptions::default()
        .set_indexing_options(
            TextFieldIndexing::default()
                .set_tokenizer(tokenizer)
                .set_index_option(record),
        )
        .set_stored()
}

fn add_mapped_field(builder: &mut SchemaBuilder, name: &str, property: &Value) -> Result<()> {
    let kind = property.get("type").and_then(Value::as_str).unwrap_or("object");
    match kind {
        "keyword" => {
            if property.get("normalizer").and_then(Value::as_str) == Some("lowercase") {
                builder.add_text_field(name, text_options("lowercase", IndexRecordOption::Basic));
            } else {
                builder.add_text_field(name, STRING | STORED);
            }
        }
        "text" => {
            let tokenizer = match property.get("analyzer").and_then(Value::as_str) {
                Some("english") => "english",
                Some("edge") => "edge",
                _ => "default",
            };
            builder.add_text_field(
                name,
                text_options(tokenizer, IndexRecordOption::WithFreqsAndPositions),
            );
        }
        "nested" | "object" | "completion" => {
            let options = JsonObjectOptions::default()
                .set_stored()
                .set_indexing_options(
                    TextFieldIndexing::default()
                        .set_tokenizer("default")
                        .set_index_option(IndexRecordOption::WithFreqsAndPositions),
                );
            builder.add_json_field(name, options);
        }
        other => {
            return Err(Error::store(format!(
                "unsupported mapping type '{other}' for field '{name}'"
            )));
        }
    }
    Ok(())
}

/// Build a Tantivy schema from the field mapping.
pub fn schema_from_mapping(settings: &IndexSettings) -> Result<Schema> {
    let mut builder = Schema::builder();
    for (name, property) in settings.properties() {
        add_mapped_field(&mut builder, name, property)?;
        if let Some(subfields) = property.get("fields").and_then(Value::as_object) {
            for (sub, sub_property) in subfields {
                add_mapped_field(&mut builder, &subfield_name(name, sub), sub_property)?;
            }
        }
    }
    Ok(builder.build())
}

fn subfield_name(parent: &str, sub: &str) -> String {
    format!("{parent}_{sub}")
}

/// `(parent, subfield)` pairs present in a schema.
fn subfield_copies(schema: &Schema) -> Vec<(String, String)> {
    schema
        .fields()
        .filter_map(|(_, entry)| {
            let name = entry.name();
            let parent = name.strip_suffix("_edge")?;
            schema
                .get_field(parent)
                .ok()
                .map(|_| (parent.to_string(), name.to_string()))
        })
        .collect()
}

/// Drop top-level nulls and fill subfields from their parents.
fn prepare_json(json: Value, copies: &[(String, String)]) -> Result<String> {
    let Value::Object(object) = json else {
        return Err(Error::store("document did not serialize to an object"));
    };
    let mut prepared: Map<String, Value> = object
        .into_iter()
        .filter(|(_, value)| !value.is_null())
        .collect();
    for (parent, sub) in copies {
        if let Some(value) = prepared.get(parent).cloned() {
            prepared.insert(sub.clone(), value);
        }
    }
    Ok(serde_json::to_string(&Value::Object(prepared))?)
}

// ============================================================================
// Tests
// ============================================================================
