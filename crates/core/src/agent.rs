//! Illustration Tool Service
//!
//! Exposes the exercise illustration lookup as an MCP tool so that a language
//! model can call it during a conversation. The tool takes one string argument
//! and always answers with a `SearchOutcome` JSON document; lookup failures are
//! part of that document, never a tool error.

use crate::illustration::IllustrationLookup;
use rmcp::{
    ServerHandler,
    handler::server::{router::tool::ToolRouter, tool::Parameters},
    model::{ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::info;

/// Name under which the lookup is registered with the model.
pub const SEARCH_TOOL_NAME: &str = "search_exercise_illustrations";

/// Arguments for the `search_exercise_illustrations` tool.
#[derive(Deserialize, JsonSchema, Debug)]
pub struct SearchIllustrationsArgs {
    /// The exercise to find illustrations for.
    #[schemars(
        description = "The name of the physiotherapy exercise, e.g. 'Seated Banded L Ankle Dorsiflexion'"
    )]
    pub exercise_name: String,
}

/// MCP server that serves the illustration lookup tool.
pub struct IllustrationToolService {
    lookup: IllustrationLookup,
    tool_router: ToolRouter<Self>,
}

#[tool_handler]
impl ServerHandler for IllustrationToolService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

#[tool_router]
impl IllustrationToolService {
    pub fn new(lookup: IllustrationLookup) -> Self {
        Self {
            lookup,
            tool_router: Self::tool_router(),
        }
    }

    /// Searches illustration images for one exercise.
    #[tool(
        description = "Search for illustration images of a physiotherapy exercise. Returns JSON with a `results` list of {type, name, url}; on failure the JSON carries an `error` and an empty `results` list."
    )]
    pub async fn search_exercise_illustrations(
        &self,
        args: Parameters<SearchIllustrationsArgs>,
    ) -> Result<String, String> {
        info!(exercise = %args.0.exercise_name, "Executing tool 'search_exercise_illustrations'");
        let outcome = self
            .lookup
            .search_exercise_illustrations(&args.0.exercise_name)
            .await;
        serde_json::to_string(&outcome)
            .map_err(|e| format!("Failed to serialize search outcome: {}", e))
    }
}
