//! Manages the WebSocket connection lifecycle for one report session.

use super::{cycle::handle_chat_cycle, protocol::ClientMessage};
use crate::{models::ChatTurn, state::AppState};
use anyhow::Result;
use axum::{
    extract::{
        State,
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use motion_core::{Message, agent::IllustrationToolService, workflow::ReportWorkflow};
use rmcp::ServiceExt;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Axum handler to upgrade an HTTP connection to a WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Main handler for an individual WebSocket connection.
///
/// Every connection owns a fresh report workflow and chat history; nothing
/// outlives the socket.
#[instrument(name = "ws_session", skip_all, fields(connection_id))]
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let connection_id = Uuid::new_v4();
    tracing::Span::current().record("connection_id", &connection_id.to_string());
    info!("New WebSocket connection.");

    let (socket_tx, socket_rx) = socket.split();
    if let Err(e) = run_report_session(state, socket_tx, socket_rx).await {
        error!(error = ?e, "Report session terminated with error.");
    }
    info!("Report session finished.");
}

/// The main event loop for an active WebSocket session.
async fn run_report_session(
    state: Arc<AppState>,
    mut socket_tx: SplitSink<WebSocket, WsMessage>,
    mut socket_rx: SplitStream<WebSocket>,
) -> Result<()> {
    let tool_service = IllustrationToolService::new(state.lookup.clone());
    let (server_transport, client_transport) = tokio::io::duplex(4096);

    // Serve the illustration tool to the chat model over an in-memory transport.
    let tool_handle = tokio::spawn(async move {
        if let Ok(service) = tool_service.serve(server_transport).await {
            let _ = service.waiting().await;
        }
    });
    let mcp_client = ().serve(client_transport).await?;

    let mut workflow = state.new_workflow();
    let mut history: Vec<ChatTurn> = Vec::new();

    while let Some(msg_result) = socket_rx.next().await {
        let text = match msg_result {
            Ok(WsMessage::Text(text)) => text,
            Ok(WsMessage::Close(_)) => {
                info!("Client sent close frame. Shutting down session.");
                break;
            }
            Ok(WsMessage::Binary(_)) => {
                warn!("Ignoring binary frame.");
                continue;
            }
            Ok(WsMessage::Ping(_)) | Ok(WsMessage::Pong(_)) => continue,
            Err(e) => {
                error!("Error receiving from client WebSocket: {:?}", e);
                break;
            }
        };

        let reply = match serde_json::from_str::<ClientMessage>(&text) {
            Ok(ClientMessage::UserMessage { text }) => {
                match handle_chat_cycle(&state, &workflow, &mut history, &mcp_client, &text).await
                {
                    Ok(response) => workflow
                        .chat(response)
                        .unwrap_or_else(|e| workflow.reject(&e)),
                    Err(e) => {
                        error!(error = ?e, "Chat cycle failed");
                        workflow
                            .messages()
                            .error("Failed to process chat message", Some(format!("{e:#}")))
                    }
                }
            }
            Ok(msg) => match dispatch_report_message(&mut workflow, msg).await {
                Some(reply) => reply,
                None => continue,
            },
            Err(e) => {
                warn!(error = %e, "Received malformed client message");
                workflow
                    .messages()
                    .error("Invalid message format", Some(e.to_string()))
            }
        };

        send_msg(&mut socket_tx, &reply).await?;
    }

    tool_handle.abort();
    info!("WebSocket connection closed and report session terminated.");
    Ok(())
}

/// Runs one report step and returns the message to send back.
///
/// Out-of-order requests are answered with an error message and leave the
/// report where it was. Chat messages are not report steps and yield `None`.
pub(crate) async fn dispatch_report_message(
    workflow: &mut ReportWorkflow,
    msg: ClientMessage,
) -> Option<Message> {
    let result = match msg {
        ClientMessage::Transcript { text } => workflow.draft(&text).await,
        ClientMessage::ConfirmDraft => workflow.offer_illustrations().await,
        ClientMessage::ImageSelection { selected_images } => workflow.finalize(selected_images),
        ClientMessage::UserMessage { .. } => return None,
    };
    Some(result.unwrap_or_else(|e| {
        warn!(error = %e, "Rejected out-of-order request");
        workflow.reject(&e)
    }))
}

/// Serializes a protocol message and sends it as a text frame.
pub(crate) async fn send_msg(
    socket_tx: &mut SplitSink<WebSocket, WsMessage>,
    msg: &Message,
) -> Result<()> {
    let serialized = msg.to_json_compact()?;
    socket_tx.send(WsMessage::Text(serialized.into())).await?;
    Ok(())
}
