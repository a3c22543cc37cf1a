//! Inbound WebSocket messages from the frontend.
//!
//! Everything sent back is a `motion_core::Message`.

use serde::Deserialize;

/// Messages sent from the client (browser) to the server.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// A session transcript to turn into a SOAP draft. Restarts the report.
    Transcript { text: String },
    /// A free-form chat message.
    UserMessage { text: String },
    /// Accepts the current draft and asks for exercise illustrations.
    ConfirmDraft,
    /// The user's answer to an exercise selection request.
    ImageSelection { selected_images: Vec<String> },
}
