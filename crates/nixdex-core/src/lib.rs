//! nixdex core: shared types, traits, errors, and run context.
//!
//! This crate has no internal nixdex dependencies. Everything else builds on
//! the types defined here.
//!
//! # Modules
//!
//! - [`error`]: Error types and Result alias
//! - [`value`]: The `Value` sum type for dynamically shaped catalog fields
//! - [`catalog`]: Raw package, option, evaluation and build records
//! - [`context`]: `RunContext` and the missing-field policy
//! - [`traits`]: Collaborator interfaces (evaluation, builds, catalog, markup)

pub mod catalog;
pub mod context;
pub mod error;
pub mod traits;
pub mod value;

// Re-export key types at crate root for convenience
pub use catalog::{
    BuildOutput, BuildRecord, BuildResults, Evaluation, OptionRecord, PackageMeta, PackageRecord,
    group_builds,
};
pub use context::{MissingFieldPolicy, RunContext};
pub use error::{Error, Result};
pub use traits::{
    BuildResultsSource, CatalogSource, EvaluationSource, IdentityConverter, MarkupConverter,
    NoBuilds,
};
pub use value::Value;
