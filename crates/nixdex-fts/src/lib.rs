//! Search-document engine and index lifecycle for nixdex.
//!
//! Turns raw package and option records into flat search documents and
//! publishes them into a versioned index behind a stable alias.
//!
//! # Features
//!
//! - `tantivy-store`: local `TantivyStore` (default)
//! - `elasticsearch-store`: remote `ElasticsearchStore` over HTTP (default)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      nixdex-fts                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  tokenize / suggest / reverse / prettyprint                 │
//! │  (pure helpers over identifiers and values)                 │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Normalizer → DocumentStream (lazy, pull-based)             │
//! │  Document (package | option), IndexSettings (mapping)       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  IndexLifecycle (ensure → populate → alias swap)            │
//! │  IndexStore trait                                           │
//! │  ├── ElasticsearchStore                                     │
//! │  ├── TantivyStore                                           │
//! │  └── MemoryStore                                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  import_channel (one channel, one run)                      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use nixdex_fts::{tokenize, rank};
//!
//! let tokens = tokenize("services.nginx.extraConfig");
//! assert!(tokens.contains(&"nginx.extra".to_string()));
//!
//! let suggestions = rank("services.nginx.extraConfig");
//! assert_eq!(suggestions[0].weight, 980);
//! ```

// Pure helpers
pub mod prettyprint;
pub mod reverse;
pub mod suggest;
pub mod tokenize;

// Documents and mapping
pub mod document;
pub mod mapping;
pub mod normalize;

// Stores and lifecycle
pub mod import;
pub mod lifecycle;
pub mod store;
pub mod types;

// Re-exports
pub use document::{
    Document, HydraBuild, HydraOutput, License, Maintainer, OptionDocument, PackageDocument,
};
pub use import::{Collaborators, ImportReport, import_channel};
pub use lifecycle::{IndexLifecycle, IndexNames, WriteStats};
pub use mapping::{IndexSettings, MAPPING_GENERATION, index_settings};
pub use normalize::{CatalogEntry, DocumentStream, Normalizer};
pub use prettyprint::{pretty_print, pretty_print_indented};
pub use reverse::{Reversible, reverse_text, reverse_value};
pub use store::{AliasAction, BulkOutcome, IndexStore, MemoryStore, StoreOp, create_store};
pub use suggest::{Suggestion, rank};
pub use tokenize::{segments, tokenize};
pub use types::{DEFAULT_CHUNK_SIZE, StoreBackend, StoreConfig};

#[cfg(feature = "elasticsearch-store")]
pub use store::ElasticsearchStore;

#[cfg(feature = "tantivy-store")]
pub use store::TantivyStore;
