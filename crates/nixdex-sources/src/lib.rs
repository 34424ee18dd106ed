//! Concrete collaborators for nixdex import runs.
//!
//! | Collaborator | Implementation |
//! |--------------|----------------|
//! | `EvaluationSource` | [`S3EvaluationSource`]: release-bucket listing |
//! | `BuildResultsSource` | [`HydraBuildSource`]: build-farm JSON, cached on disk |
//! | `CatalogSource` | [`FileCatalogSource`], [`NixCatalogSource`] |
//! | `MarkupConverter` | [`PandocConverter`] |
//!
//! Network and evaluator calls go through [`RetryPolicy`], which retries only
//! transient failures.

pub mod builds;
pub mod catalog;
pub mod evaluation;
pub mod http;
pub mod markup;
pub mod retry;

pub use builds::{DEFAULT_HYDRA_URL, HydraBuildSource};
pub use catalog::{FileCatalogSource, NixCatalogSource, parse_listing};
pub use evaluation::{DEFAULT_BUCKET_URL, S3EvaluationSource};
pub use http::HttpFetcher;
pub use markup::PandocConverter;
pub use retry::RetryPolicy;

// Sources share the core error type.
pub use nixdex_core::{Error, Result};
