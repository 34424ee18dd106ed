//! Latest-evaluation lookup in the release bucket.
//!
//! Each channel release lives under `<prefix><revisions>.<revision>/` in the
//! bucket. The newest one is the entry with the highest revision count; its
//! `src-url` object holds the build-farm evaluation URL, whose last path
//! segment is the evaluation id.

use async_trait::async_trait;
use nixdex_core::{Error, Evaluation, EvaluationSource, Result};
use reqwest::Url;

use crate::http::{HttpFetcher, parse_url};

/// Default public release bucket.
pub const DEFAULT_BUCKET_URL: &str = "https://nix-releases.s3.amazonaws.com";

/// Evaluation source backed by an S3-compatible listing endpoint.
#[derive(Debug, Clone)]
pub struct S3EvaluationSource {
    fetcher: HttpFetcher,
    bucket: Url,
}

impl S3EvaluationSource {
    /// Create a source for the bucket at `bucket_url`.
    pub fn new(fetcher: HttpFetcher, bucket_url: &str) -> Result<Self> {
        let mut raw = bucket_url.trim_end_matches('/').to_string();
        raw.push('/');
        Ok(Self {
            fetcher,
            bucket: parse_url(&raw)?,
        })
    }

    fn listing_url(&self, prefix: &str) -> Url {
        let mut url = self.bucket.clone();
        url.query_pairs_mut()
            .append_pair("prefix", prefix)
            .append_pair("delimiter", "/");
        url
    }

    fn object_url(&self, key: &str) -> Result<Url> {
        self.bucket
            .join(key)
            .map_err(|e| Error::config(format!("invalid object key '{key}': {e}")))
    }
}

#[async_trait]
impl EvaluationSource for S3EvaluationSource {
    async fn latest_evaluation(&self, prefix: &str) -> Result<Evaluation> {
        log::debug!("latest_evaluation: listing evaluations under {prefix}");
        let listing = self.fetcher.get_text(&self.listing_url(prefix)).await?;

        let evaluations: Vec<Evaluation> = common_prefixes(&listing)
            .into_iter()
            .filter_map(|entry| {
                let parsed = parse_evaluation_prefix(prefix, &entry);
                if parsed.is_none() {
                    log::warn!("latest_evaluation: skipping unrecognized entry {entry}");
                }
                parsed
            })
            .collect();
        log::debug!(
            "latest_evaluation: {} evaluations found for {prefix}",
            evaluations.len()
        );

        let mut latest =
            select_latest(evaluations).ok_or_else(|| Error::not_found(prefix, "evaluation"))?;

        let src_url = self
            .fetcher
            .get_text(&self.object_url(&format!("{}/src-url", latest.prefix))?)
            .await?;
        latest.id = evaluation_id_from_src_url(&src_url).ok_or_else(|| {
            Error::operation(format!("no evaluation id in src-url '{}'", src_url.trim()))
        })?;

        log::debug!("latest_evaluation: last evaluation is {latest:?}");
        Ok(latest)
    }
}

/// `<Prefix>` values inside `<CommonPrefixes>` blocks of a bucket listing.
pub fn common_prefixes(listing: &str) -> Vec<String> {
    listing
        .split("<CommonPrefixes>")
        .skip(1)
        .filter_map(|block| {
            let block = block.split("</CommonPrefixes>").next()?;
            let start = block.find("<Prefix>")? + "<Prefix>".len();
            let end = block[start..].find("</Prefix>")? + start;
            Some(block[start..end].trim().to_string())
        })
        .collect()
}

/// Parse `<prefix><revisions>.<revision>/` into an evaluation without an id.
pub fn parse_evaluation_prefix(prefix: &str, entry: &str) -> Option<Evaluation> {
    let rest = entry.strip_prefix(prefix)?.trim_end_matches('/');
    let (revisions, revision) = rest.split_once('.')?;
    if revision.is_empty() || revision.contains('.') {
        return None;
    }
    Some(Evaluation {
        revisions_since_start: revisions.parse().ok()?,
        git_revision: revision.to_string(),
        prefix: entry.trim_end_matches('/').to_string(),
        id: String::new(),
    })
}

/// The evaluation with the highest revision count.
pub fn select_latest(evaluations: Vec<Evaluation>) -> Option<Evaluation> {
    evaluations
        .into_iter()
        .max_by_key(|evaluation| evaluation.revisions_since_start)
}

/// Last path segment of an evaluation URL such as
/// `https://hydra.nixos.org/eval/1700000`.
pub fn evaluation_id_from_src_url(src_url: &str) -> Option<String> {
    let id = src_url.trim().trim_end_matches('/').rsplit('/').next()?;
    (!id.is_empty()).then(|| id.to_string())
}

// ============================================================================
// Tests
// ============================================================================
