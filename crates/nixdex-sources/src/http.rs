//! Shared HTTP client with retrying GET helpers.

use std::time::Duration;

use nixdex_core::{Error, Result};
use reqwest::{Client, Url};

use crate::retry::RetryPolicy;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// HTTP client that retries transient failures.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    retry: RetryPolicy,
}

impl HttpFetcher {
    /// Create a fetcher with the given retry policy.
    pub fn new(retry: RetryPolicy) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {e}"), None))?;
        Ok(Self { client, retry })
    }

    /// GET `url` and return the body as text.
    pub async fn get_text(&self, url: &Url) -> Result<String> {
        self.retry
            .run(&format!("GET {url}"), || self.get_text_once(url))
            .await
    }

    /// GET `url` asking for JSON and return the raw body.
    pub async fn get_json_bytes(&self, url: &Url) -> Result<Vec<u8>> {
        self.retry
            .run(&format!("GET {url}"), || self.get_json_bytes_once(url))
            .await
    }

    async fn get_text_once(&self, url: &Url) -> Result<String> {
        let response = self.send(self.client.get(url.clone()), url).await?;
        response
            .text()
            .await
            .map_err(|e| Error::http(format!("GET {url}: {e}"), None))
    }

    async fn get_json_bytes_once(&self, url: &Url) -> Result<Vec<u8>> {
        let request = self
            .client
            .get(url.clone())
            .header(reqwest::header::ACCEPT, "application/json");
        let response = self.send(request, url).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::http(format!("GET {url}: {e}"), None))?;
        Ok(bytes.to_vec())
    }

    async fn send(&self, request: reqwest::RequestBuilder, url: &Url) -> Result<reqwest::Response> {
        let response = request.send().await.map_err(|e| {
            Error::http(
                format!("GET {url}: {e}"),
                e.status().map(|status| status.as_u16()),
            )
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::http(
                format!("GET {url} returned {status}"),
                Some(status.as_u16()),
            ));
        }
        Ok(response)
    }
}

/// Parse a URL, reporting failures as configuration errors.
pub fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| Error::config(format!("invalid URL '{raw}': {e}")))
}
