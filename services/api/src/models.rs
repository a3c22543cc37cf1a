//! API Models
//!
//! REST payloads documented with `utoipa`, plus the in-memory chat history
//! kept for the lifetime of one WebSocket connection.

use motion_core::{SearchOutcome, SearchResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Ai,
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatRole::User => write!(f, "user"),
            ChatRole::Ai => write!(f, "ai"),
        }
    }
}

/// One turn of free-form chat. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn ai(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Ai,
            content: content.into(),
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct SearchIllustrationsPayload {
    #[schema(example = "Seated Banded L Ankle Dorsiflexion")]
    pub exercise_name: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct IllustrationResult {
    #[serde(rename = "type")]
    #[schema(example = "image")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[schema(example = "https://example.com/exercise.jpg")]
    pub url: String,
}

/// Wire form of a lookup outcome: `error` is present only on failure,
/// `search_query` only on success.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct IllustrationSearchResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub exercise_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_query: Option<String>,
    pub results: Vec<IllustrationResult>,
}

impl From<SearchResult> for IllustrationResult {
    fn from(result: SearchResult) -> Self {
        Self {
            kind: result.kind,
            name: result.name,
            url: result.url,
        }
    }
}

impl From<SearchOutcome> for IllustrationSearchResponse {
    fn from(outcome: SearchOutcome) -> Self {
        match outcome {
            SearchOutcome::Success {
                exercise_name,
                search_query,
                results,
            } => Self {
                error: None,
                exercise_name,
                search_query: Some(search_query),
                results: results.into_iter().map(Into::into).collect(),
            },
            SearchOutcome::Failure {
                error,
                exercise_name,
                results,
            } => Self {
                error: Some(error),
                exercise_name,
                search_query: None,
                results: results.into_iter().map(Into::into).collect(),
            },
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = "ok")]
    pub status: String,
    /// Whether a Linkup credential is configured.
    pub illustrations_configured: bool,
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}
