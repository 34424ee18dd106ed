//! Interfaces of the collaborators an import run depends on.
//!
//! Concrete implementations live in `nixdex-sources`; tests substitute
//! in-memory fakes.

use async_trait::async_trait;

use crate::Result;
use crate::catalog::{BuildResults, Evaluation, OptionRecord, PackageRecord};

/// Finds the newest evaluation of a channel.
#[async_trait]
pub trait EvaluationSource: Send + Sync {
    /// Return the evaluation with the highest revision count under `prefix`.
    async fn latest_evaluation(&self, prefix: &str) -> Result<Evaluation>;
}

/// Supplies per-platform build results for an evaluation.
#[async_trait]
pub trait BuildResultsSource: Send + Sync {
    /// Return build records grouped by derivation name and platform.
    async fn build_results(&self, evaluation_id: &str) -> Result<BuildResults>;
}

/// Supplies the raw package and option listings of an evaluation.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Packages keyed by attribute name.
    async fn packages(&self, evaluation: &Evaluation) -> Result<Vec<(String, PackageRecord)>>;

    /// Options keyed by dotted option name.
    async fn options(&self, evaluation: &Evaluation) -> Result<Vec<(String, OptionRecord)>>;
}

/// Converts a wrapped DocBook fragment to HTML.
pub trait MarkupConverter: Send + Sync {
    /// Convert `docbook` to HTML.
    fn to_html(&self, docbook: &str) -> Result<String>;
}

/// Converter that returns its input unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityConverter;

impl MarkupConverter for IdentityConverter {
    fn to_html(&self, docbook: &str) -> Result<String> {
        Ok(docbook.to_string())
    }
}

/// Build-results source that never has any builds.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBuilds;

#[async_trait]
impl BuildResultsSource for NoBuilds {
    async fn build_results(&self, evaluation_id: &str) -> Result<BuildResults> {
        log::debug!("build_results: skipping build lookup for evaluation {evaluation_id}");
        Ok(BuildResults::new())
    }
}
