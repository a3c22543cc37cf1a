//! Exercise Illustration Lookup
//!
//! Translates a free-text exercise name into candidate illustration images by
//! querying an external image-search provider. Provider and configuration
//! failures never escape this module: they are converted into a
//! [`SearchOutcome::Failure`] whose `results` list is empty, so callers can
//! always treat an outcome as "zero or more images".

use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Fixed instruction phrase that precedes the exercise name in every query.
pub const QUERY_PREFIX: &str =
    "Return me actual illustration images for the following physiotherapy exercise - ";

/// Error text returned when no provider credential is configured.
pub const MISSING_CREDENTIAL_ERROR: &str = "LINKUP_API_KEY environment variable is not set";

/// Errors raised by an [`ImageSearchProvider`].
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("provider returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("{0}")]
    Provider(String),
}

/// An external search service able to answer a query with structured output.
///
/// Implementations receive the JSON Schema the response should follow and
/// return the provider's raw JSON. Nothing here validates the response against
/// the schema; [`IllustrationLookup`] does its own checks afterwards.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageSearchProvider: Send + Sync {
    async fn search(&self, query: &str, schema: &Value) -> Result<Value, SearchError>;
}

/// A single image candidate as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(rename = "type", default = "image_kind")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub url: String,
}

fn image_kind() -> String {
    "image".to_string()
}

impl SearchResult {
    pub fn image(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            kind: image_kind(),
            name: Some(name.into()),
            url: url.into(),
        }
    }
}

/// Result of one lookup.
///
/// Serialized untagged, so the wire shape is either
/// `{exercise_name, search_query, results}` or `{error, exercise_name, results}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SearchOutcome {
    Success {
        exercise_name: String,
        search_query: String,
        results: Vec<SearchResult>,
    },
    Failure {
        error: String,
        exercise_name: String,
        results: Vec<SearchResult>,
    },
}

impl SearchOutcome {
    /// Builds a failure. The result list is always empty.
    pub fn failure(exercise_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self::Failure {
            error: error.into(),
            exercise_name: exercise_name.into(),
            results: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn exercise_name(&self) -> &str {
        match self {
            Self::Success { exercise_name, .. } | Self::Failure { exercise_name, .. } => {
                exercise_name
            }
        }
    }

    pub fn results(&self) -> &[SearchResult] {
        match self {
            Self::Success { results, .. } | Self::Failure { results, .. } => results,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { error, .. } => Some(error),
        }
    }

    pub fn into_results(self) -> Vec<SearchResult> {
        match self {
            Self::Success { results, .. } | Self::Failure { results, .. } => results,
        }
    }
}

/// Builds the provider query for an exercise.
pub fn search_query(exercise_name: &str) -> String {
    format!("{QUERY_PREFIX}{exercise_name}")
}

/// The structured-output schema sent with every provider request.
pub fn image_search_schema() -> Value {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "title": "SearchResults",
        "type": "object",
        "required": ["results"],
        "properties": {
            "results": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["type", "name", "url"],
                    "properties": {
                        "type": { "type": "string", "enum": ["image"] },
                        "name": { "type": "string", "minLength": 1 },
                        "url": { "type": "string", "format": "uri" }
                    },
                    "additionalProperties": false
                }
            }
        },
        "additionalProperties": false
    })
}

/// Drops results that are not usable as illustrations.
///
/// A result is kept only if its `type` is `"image"` and its `url` is an
/// absolute http(s) URL. Blank names are cleared so a default can be applied
/// later. Applying this twice is the same as applying it once.
pub fn sanitize_results(exercise_name: &str, results: Vec<SearchResult>) -> Vec<SearchResult> {
    results
        .into_iter()
        .filter_map(|mut result| {
            if result.kind != "image" {
                warn!(exercise = %exercise_name, kind = %result.kind, "Dropping non-image search result");
                return None;
            }
            let valid_url = Url::parse(result.url.trim())
                .map(|url| matches!(url.scheme(), "http" | "https"))
                .unwrap_or(false);
            if !valid_url {
                warn!(exercise = %exercise_name, url = %result.url, "Dropping search result with invalid url");
                return None;
            }
            result.url = result.url.trim().to_string();
            if result.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
                result.name = None;
            }
            Some(result)
        })
        .collect()
}

/// Pulls the `results` array out of a raw provider response.
///
/// A missing or null `results` field means "no results". Elements that do not
/// look like a search result are skipped.
fn extract_results(exercise_name: &str, response: &Value) -> Vec<SearchResult> {
    let items = match response.get("results") {
        Some(Value::Array(items)) => items,
        None | Some(Value::Null) => return Vec::new(),
        Some(other) => {
            warn!(exercise = %exercise_name, results = %other, "Provider returned non-array results");
            return Vec::new();
        }
    };

    items
        .iter()
        .filter_map(
            |item| match serde_json::from_value::<SearchResult>(item.clone()) {
                Ok(result) => Some(result),
                Err(e) => {
                    warn!(exercise = %exercise_name, error = %e, "Skipping malformed search result");
                    None
                }
            },
        )
        .collect()
}

/// Runs illustration searches against an optional provider.
///
/// The lookup holds no state between calls: no caching, no retries, no rate
/// limiting. One call issues at most one provider request.
#[derive(Clone, Default)]
pub struct IllustrationLookup {
    provider: Option<Arc<dyn ImageSearchProvider>>,
}

impl IllustrationLookup {
    /// Creates a lookup backed by `provider`.
    pub fn new(provider: Arc<dyn ImageSearchProvider>) -> Self {
        Self {
            provider: Some(provider),
        }
    }

    /// Creates a lookup with no provider credential. Every search fails softly.
    pub fn unconfigured() -> Self {
        Self { provider: None }
    }

    pub fn is_configured(&self) -> bool {
        self.provider.is_some()
    }

    /// Searches for illustrations of a single exercise.
    pub async fn search_exercise_illustrations(&self, exercise_name: &str) -> SearchOutcome {
        if exercise_name.trim().is_empty() {
            return SearchOutcome::failure(exercise_name, "Exercise name must not be empty");
        }
        let Some(provider) = &self.provider else {
            warn!(exercise = %exercise_name, "Illustration search skipped: no provider credential");
            return SearchOutcome::failure(exercise_name, MISSING_CREDENTIAL_ERROR);
        };

        let query = search_query(exercise_name);
        debug!(exercise = %exercise_name, %query, "Searching for exercise illustrations");

        match provider.search(&query, &image_search_schema()).await {
            Ok(response) => {
                let raw = extract_results(exercise_name, &response);
                let results = sanitize_results(exercise_name, raw);
                info!(exercise = %exercise_name, count = results.len(), "Illustration search finished");
                SearchOutcome::Success {
                    exercise_name: exercise_name.to_string(),
                    search_query: query,
                    results,
                }
            }
            Err(e) => {
                warn!(exercise = %exercise_name, error = %e, "Illustration search failed");
                SearchOutcome::failure(
                    exercise_name,
                    format!("Error searching for {exercise_name}: {e}"),
                )
            }
        }
    }

    /// Searches for every exercise in one report, concurrently.
    ///
    /// A name that appears more than once is searched once and its outcome is
    /// reused. The returned outcomes line up with `exercise_names`.
    pub async fn illustrate_all(&self, exercise_names: &[String]) -> Vec<SearchOutcome> {
        let mut unique: Vec<&str> = Vec::new();
        for name in exercise_names {
            if !unique.contains(&name.as_str()) {
                unique.push(name);
            }
        }

        let outcomes = join_all(
            unique
                .iter()
                .map(|name| self.search_exercise_illustrations(name)),
        )
        .await;
        let by_name: HashMap<&str, SearchOutcome> = unique.into_iter().zip(outcomes).collect();

        exercise_names
            .iter()
            .map(|name| by_name[name.as_str()].clone())
            .collect()
    }
}
