//! Axum Handlers for the REST API
//!
//! This module contains the logic for the plain HTTP endpoints. It uses
//! `utoipa` doc comments to generate OpenAPI documentation.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use tracing::warn;

use crate::{
    models::{
        ErrorResponse, HealthResponse, IllustrationSearchResponse, SearchIllustrationsPayload,
    },
    state::AppState,
};

pub enum ApiError {
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                warn!(%message, "Rejecting bad request");
                (StatusCode::BAD_REQUEST, Json(ErrorResponse { message })).into_response()
            }
        }
    }
}

/// Report service liveness and whether illustration search is configured.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        illustrations_configured: state.lookup.is_configured(),
    })
}

/// Search illustration images for one exercise.
///
/// Provider failures are reported inside the response body (`error` plus an
/// empty `results` list), not as HTTP errors.
#[utoipa::path(
    post,
    path = "/illustrations/search",
    request_body = SearchIllustrationsPayload,
    responses(
        (status = 200, description = "Search outcome", body = IllustrationSearchResponse),
        (status = 400, description = "Bad request", body = ErrorResponse)
    )
)]
pub async fn search_illustrations(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SearchIllustrationsPayload>,
) -> Result<Json<IllustrationSearchResponse>, ApiError> {
    let exercise_name = payload.exercise_name.trim();
    if exercise_name.is_empty() {
        return Err(ApiError::BadRequest(
            "exercise_name must not be empty".to_string(),
        ));
    }

    let outcome = state
        .lookup
        .search_exercise_illustrations(exercise_name)
        .await;
    Ok(Json(outcome.into()))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::{Config, Provider};
    use anyhow::Result;
    use async_openai::types::{ChatCompletionRequestMessage, ChatCompletionTool};
    use async_trait::async_trait;
    use motion_core::{
        drafting::StaticSoapDrafter,
        illustration::IllustrationLookup,
        llm_client::{LLMAction, LLMClient, LLMStream},
    };
    use std::{path::PathBuf, time::Duration};
    use tracing::Level;

    mockall::mock! {
        pub Llm {}

        #[async_trait]
        impl LLMClient for Llm {
            async fn decide_action(
                &self,
                messages: Vec<ChatCompletionRequestMessage>,
                tools: Vec<ChatCompletionTool>,
            ) -> Result<LLMAction>;

            async fn stream_after_tools(
                &self,
                messages_with_tool_results: Vec<ChatCompletionRequestMessage>,
            ) -> Result<LLMStream>;
        }
    }

    pub(crate) fn test_state(lookup: IllustrationLookup, llm: MockLlm) -> Arc<AppState> {
        let config = Config {
            bind_address: "127.0.0.1:0".parse().unwrap(),
            provider: Provider::Gemini,
            openai_api_key: None,
            gemini_api_key: Some("test-gemini-key".into()),
            chat_model: "test-model".into(),
            linkup_api_key: None,
            linkup_base_url: "http://localhost".into(),
            linkup_timeout: Duration::from_secs(1),
            log_level: Level::INFO,
            prompts_path: PathBuf::from("./prompts"),
        };
        Arc::new(AppState {
            drafter: Arc::new(StaticSoapDrafter),
            llm_client: Arc::new(llm),
            lookup,
            system_prompt: Arc::new("You are a physiotherapy documentation assistant.".into()),
            config: Arc::new(config),
        })
    }

    #[tokio::test]
    async fn test_health_reports_lookup_configuration() {
        let state = test_state(IllustrationLookup::unconfigured(), MockLlm::new());

        let Json(body) = health(State(state)).await;

        assert_eq!(body.status, "ok");
        assert!(!body.illustrations_configured);
    }

    #[tokio::test]
    async fn test_search_without_credential_returns_failure_body() {
        let state = test_state(IllustrationLookup::unconfigured(), MockLlm::new());

        let result = search_illustrations(
            State(state),
            Json(SearchIllustrationsPayload {
                exercise_name: "Bridges".into(),
            }),
        )
        .await;

        let Ok(Json(body)) = result else {
            panic!("Expected a search body");
        };
        assert_eq!(body.exercise_name, "Bridges");
        assert!(body.error.is_some());
        assert!(body.results.is_empty());
    }

    #[tokio::test]
    async fn test_search_rejects_blank_name() {
        let state = test_state(IllustrationLookup::unconfigured(), MockLlm::new());

        let result = search_illustrations(
            State(state),
            Json(SearchIllustrationsPayload {
                exercise_name: "   ".into(),
            }),
        )
        .await;

        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }
}
