//! HTTP client for the RPO registry search API.

use std::time::Duration;

use reqwest::StatusCode;
use url::Url;

use crate::{
    query::SearchQuery,
    types::{RegistryRecord, SearchResponse},
    Error,
};

/// Production registry endpoint root.
pub const DEFAULT_BASE_URL: &str = "https://api.statistics.sk/rpo/v1";

/// Per-request timeout used when none is given.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(12);

/// HTTP client for the RPO search API.
///
/// Issues exactly one request per call. A 404 is the registry's way of saying
/// "nothing matched" and is returned as an empty list.
pub struct Client {
    http: reqwest::Client,
    /// Base URL for the API. Defaults to [`DEFAULT_BASE_URL`].
    base_api_url: String,
}

impl Client {
    /// Creates a new client pointing at the production registry.
    pub fn new() -> Result<Self, Error> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Creates a new client with a custom base URL. Used for testing with wiremock.
    pub fn with_base_url(base_url: &str) -> Result<Self, Error> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// Creates a client with a custom base URL and per-request timeout.
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("icolookup/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                tracing::error!("Failed to build HTTP client: {}", e);
                Error::RequestFailed(e.to_string())
            })?;
        Ok(Self {
            http,
            base_api_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_api_url
    }

    fn get_url(&self, path: &str, query: &SearchQuery) -> Result<Url, Error> {
        let url = Url::parse(format!("{}{}", &self.base_api_url, path).as_str()).map_err(|e| {
            tracing::error!("Invalid URL constructed: {}", e);
            Error::InvalidUrl(e.to_string())
        })?;
        Ok(query.add_to_url(&url))
    }

    /// Searches the registry by name, returning records in the registry's ranking order.
    pub async fn search(&self, query: &SearchQuery) -> Result<Vec<RegistryRecord>, Error> {
        let url = self.get_url("/search", query)?;
        tracing::debug!("GET {}", url);

        let resp = self
            .http
            .get(url)
            .header("accept", "application/json")
            .send()
            .await
            .map_err(classify_transport)?;

        let status = resp.status();
        let body = resp.text().await.map_err(classify_transport)?;

        if status == StatusCode::NOT_FOUND {
            tracing::debug!("No records for '{}' (HTTP 404)", query.full_name);
            return Ok(Vec::new());
        }

        if !status.is_success() {
            let snippet = truncate_body(&body);
            tracing::warn!("Search failed with status {}: {}", status, snippet);
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                body: snippet,
            });
        }

        if body.trim().is_empty() {
            return Ok(Vec::new());
        }

        let parsed = serde_json::from_str::<SearchResponse>(&body).map_err(|e| {
            let snippet = truncate_body(&body);
            tracing::error!("Failed to parse search response: {} | body: {}", e, snippet);
            Error::ParseFailed(e.to_string())
        })?;

        Ok(parsed.into_records())
    }
}

fn classify_transport(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout
    } else {
        Error::RequestFailed(e.to_string())
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 500;
    if body.len() <= MAX {
        body.to_string()
    } else {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...[truncated]", &body[..end])
    }
}
