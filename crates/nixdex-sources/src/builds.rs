//! Build results from the build farm.
//!
//! The builds listing of an evaluation is large and immutable, so it is
//! downloaded once into `<cache_dir>/eval-<id>.json` and read from there on
//! later runs.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use nixdex_core::{BuildRecord, BuildResults, BuildResultsSource, Error, Result, group_builds};
use reqwest::Url;

use crate::http::{HttpFetcher, parse_url};

/// Default build-farm base URL.
pub const DEFAULT_HYDRA_URL: &str = "https://hydra.nixos.org";

/// Build-results source backed by the build farm's JSON API.
#[derive(Debug, Clone)]
pub struct HydraBuildSource {
    fetcher: HttpFetcher,
    base: Url,
    cache_dir: PathBuf,
}

impl HydraBuildSource {
    /// Create a source for the build farm at `hydra_url`, caching listings in
    /// `cache_dir`.
    pub fn new(fetcher: HttpFetcher, hydra_url: &str, cache_dir: impl Into<PathBuf>) -> Result<Self> {
        let mut raw = hydra_url.trim_end_matches('/').to_string();
        raw.push('/');
        Ok(Self {
            fetcher,
            base: parse_url(&raw)?,
            cache_dir: cache_dir.into(),
        })
    }

    /// Cache file of an evaluation's build listing.
    pub fn cache_path(&self, evaluation_id: &str) -> PathBuf {
        self.cache_dir.join(format!("eval-{evaluation_id}.json"))
    }

    fn builds_url(&self, evaluation_id: &str) -> Result<Url> {
        self.base
            .join(&format!("eval/{evaluation_id}/builds"))
            .map_err(|e| Error::config(format!("invalid evaluation id '{evaluation_id}': {e}")))
    }

    async fn download(&self, evaluation_id: &str, path: &Path) -> Result<()> {
        let url = self.builds_url(evaluation_id)?;
        log::debug!("build_results: fetching builds from {url}");
        let body = self.fetcher.get_json_bytes(&url).await?;

        tokio::fs::create_dir_all(&self.cache_dir)
            .await
            .map_err(|e| Error::io_with_path(e, &self.cache_dir))?;
        let partial = path.with_extension("json.partial");
        tokio::fs::write(&partial, &body)
            .await
            .map_err(|e| Error::io_with_path(e, &partial))?;
        tokio::fs::rename(&partial, path)
            .await
            .map_err(|e| Error::io_with_path(e, path))?;
        Ok(())
    }
}

#[async_trait]
impl BuildResultsSource for HydraBuildSource {
    async fn build_results(&self, evaluation_id: &str) -> Result<BuildResults> {
        log::debug!("build_results: retrieving builds of evaluation {evaluation_id}");
        let path = self.cache_path(evaluation_id);
        if !path.exists() {
            self.download(evaluation_id, &path).await?;
        }
        read_build_listing(&path).await
    }
}

/// Read and group a cached build listing.
pub async fn read_build_listing(path: &Path) -> Result<BuildResults> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| Error::io_with_path(e, path))?;
    let builds: Vec<BuildRecord> = serde_json::from_slice(&bytes)?;
    log::debug!("build_results: {} builds in {}", builds.len(), path.display());
    Ok(group_builds(builds))
}

// ============================================================================
// Tests
// ============================================================================
