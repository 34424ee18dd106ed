//! Elasticsearch index store.
//!
//! Talks to the cluster's REST API directly with `reqwest`. Only the handful
//! of endpoints the index lifecycle needs are used:
//!
//! | Operation | Request |
//! |-----------|---------|
//! | `index_exists` | `HEAD /{index}` |
//! | `create_index` | `PUT /{index}` |
//! | `delete_index` | `DELETE /{index}` |
//! | `bulk_write` | `POST /{index}/_bulk` (NDJSON) |
//! | `refresh` | `POST /{index}/_refresh` |
//! | `count_documents` | `GET /{index}/_count` |
//! | `alias_exists` | `HEAD /_alias/{alias}` |
//! | `aliased_indexes` | `GET /_alias/{alias}` |
//! | `update_aliases` | `POST /_aliases` |
//! | `put_alias` | `PUT /{index}/_alias/{alias}` |

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use nixdex_core::{Error, Result};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde_json::{Value, json};

use super::{AliasAction, BulkOutcome, IndexStore};
use crate::document::Document;
use crate::mapping::IndexSettings;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Index store backed by an Elasticsearch cluster.
#[derive(Debug, Clone)]
pub struct ElasticsearchStore {
    client: Client,
    base_url: String,
}

impl ElasticsearchStore {
    /// Create a store for the cluster at `url`.
    pub fn new(url: &str) -> Result<Self> {
        let base_url = url.trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(Error::config("store.url must not be empty"));
        }
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {e}"), None))?;
        Ok(Self { client, base_url })
    }

    /// Cluster base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/{}", self.base_url, path))
    }

    async fn send(&self, what: &str, request: RequestBuilder) -> Result<Response> {
        request.send().await.map_err(|e| {
            Error::http(
                format!("{what}: {e}"),
                e.status().map(|status| status.as_u16()),
            )
        })
    }

    /// Send and require a 2xx response.
    async fn send_ok(&self, what: &str, request: RequestBuilder) -> Result<Response> {
        let response = self.send(what, request).await?;
        ensure_success(what, response).await
    }

    /// Send and map the response status to a boolean (`200`/`404`).
    async fn send_exists(&self, what: &str, request: RequestBuilder) -> Result<bool> {
        let response = self.send(what, request).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            _ => ensure_success(what, response).await.map(|_| false),
        }
    }
}

async fn ensure_success(what: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(Error::http(
        format!("{what} returned {status}: {body}"),
        Some(status.as_u16()),
    ))
}

async fn response_json(what: &str, response: Response) -> Result<Value> {
    response
        .json()
        .await
        .map_err(|e| Error::http(format!("{what}: invalid response body: {e}"), None))
}

#[async_trait]
impl IndexStore for ElasticsearchStore {
    fn name(&self) -> &str {
        "elasticsearch"
    }

    async fn index_exists(&self, index: &str) -> Result<bool> {
        let what = format!("HEAD /{index}");
        self.send_exists(&what, self.request(Method::HEAD, index))
            .await
    }

    async fn create_index(&self, index: &str, settings: &IndexSettings) -> Result<()> {
        let what = format!("PUT /{index}");
        self.send_ok(&what, self.request(Method::PUT, index).json(settings))
            .await?;
        Ok(())
    }

    async fn delete_index(&self, index: &str) -> Result<()> {
        let what = format!("DELETE /{index}");
        let response = self.send(&what, self.request(Method::DELETE, index)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(Error::not_found(index, "index"));
        }
        ensure_success(&what, response).await?;
        Ok(())
    }

    async fn bulk_write(&self, index: &str, documents: &[Document]) -> Result<BulkOutcome> {
        if documents.is_empty() {
            return Ok(BulkOutcome::default());
        }
        let what = format!("POST /{index}/_bulk");
        let body = bulk_body(documents)?;
        let request = self
            .request(Method::POST, &format!("{index}/_bulk"))
            .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
            .body(body);
        let response = self.send_ok(&what, request).await?;
        let json = response_json(&what, response).await?;
        Ok(parse_bulk_response(&json))
    }

    async fn refresh(&self, index: &str) -> Result<()> {
        let what = format!("POST /{index}/_refresh");
        self.send_ok(&what, self.request(Method::POST, &format!("{index}/_refresh")))
            .await?;
        Ok(())
    }

    async fn count_documents(&self, index: &str) -> Result<u64> {
        let what = format!("GET /{index}/_count");
        let request = self.request(Method::GET, &format!("{index}/_count"));
        let response = self.send(&what, request).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(Error::not_found(index, "index"));
        }
        let json = response_json(&what, ensure_success(&what, response).await?).await?;
        json.get("count")
            .and_then(Value::as_u64)
            .ok_or_else(|| Error::http(format!("{what}: response has no count"), None))
    }

    async fn alias_exists(&self, alias: &str) -> Result<bool> {
        let what = format!("HEAD /_alias/{alias}");
        self.send_exists(&what, self.request(Method::HEAD, &format!("_alias/{alias}")))
            .await
    }

    async fn aliased_indexes(&self, alias: &str) -> Result<BTreeSet<String>> {
        let what = format!("GET /_alias/{alias}");
        let response = self
            .send(&what, self.request(Method::GET, &format!("_alias/{alias}")))
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(BTreeSet::new());
        }
        let json = response_json(&what, ensure_success(&what, response).await?).await?;
        Ok(json
            .as_object()
            .map(|indexes| indexes.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn update_aliases(&self, actions: &[AliasAction]) -> Result<()> {
        if actions.is_empty() {
            return Ok(());
        }
        let request = self
            .request(Method::POST, "_aliases")
            .json(&json!({ "actions": actions }));
        self.send_ok("POST /_aliases", request).await?;
        Ok(())
    }

    async fn put_alias(&self, index: &str, alias: &str) -> Result<()> {
        let what = format!("PUT /{index}/_alias/{alias}");
        self.send_ok(
            &what,
            self.request(Method::PUT, &format!("{index}/_alias/{alias}")),
        )
        .await?;
        Ok(())
    }
}

/// Build an NDJSON bulk body indexing every document.
///
/// The target index is part of the request path, so each action line is an
/// empty `index` action.
pub fn bulk_body(documents: &[Document]) -> Result<String> {
    let mut body = String::new();
    for doc in documents {
        body.push_str(r#"{"index":{}}"#);
        body.push('\n');
        body.push_str(&serde_json::to_string(doc)?);
        body.push('\n');
    }
    Ok(body)
}

/// Count per-item results of a bulk response.
///
/// Items with a 2xx status succeeded; anything else is logged and counted as
/// failed.
pub fn parse_bulk_response(response: &Value) -> BulkOutcome {
    let mut outcome = BulkOutcome::default();
    let items = response
        .get("items")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    for item in items {
        let result = item
            .as_object()
            .and_then(|actions| actions.values().next());
        let status = result
            .and_then(|r| r.get("status"))
            .and_then(Value::as_u64)
            .unwrap_or(0);
        if (200..300).contains(&status) {
            outcome.succeeded += 1;
        } else {
            let reason = result
                .and_then(|r| r.get("error"))
                .map(Value::to_string)
                .unwrap_or_else(|| "no error detail".to_string());
            log::warn!("bulk_write: item rejected with status {status}: {reason}");
            outcome.failed += 1;
        }
    }
    outcome
}

// ============================================================================
// Tests
// ============================================================================
