//! Linkup search client.
//!
//! Implements [`ImageSearchProvider`] against the Linkup `/v1/search` endpoint
//! using structured output.

use crate::illustration::{ImageSearchProvider, SearchError};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://api.linkup.so";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest<'a> {
    q: &'a str,
    depth: &'a str,
    output_type: &'a str,
    structured_output_schema: String,
    include_images: bool,
}

/// HTTP client for the Linkup search API.
pub struct LinkupClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl LinkupClient {
    /// Creates a client for the public Linkup endpoint.
    pub fn new(api_key: impl Into<String>) -> Result<Self, SearchError> {
        Self::with_options(api_key, DEFAULT_BASE_URL, DEFAULT_TIMEOUT)
    }

    /// Creates a client with an explicit base URL and request timeout.
    pub fn with_options(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SearchError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ImageSearchProvider for LinkupClient {
    async fn search(&self, query: &str, schema: &Value) -> Result<Value, SearchError> {
        let url = format!("{}/v1/search", self.base_url);
        let body = SearchRequest {
            q: query,
            depth: "standard",
            output_type: "structured",
            structured_output_schema: schema.to_string(),
            include_images: true,
        };
        debug!(%url, "Sending Linkup search request");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<Value>().await?)
    }
}
