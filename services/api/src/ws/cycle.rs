//! Contains the logic for the chat "ReAct" (Reason and Act) cycle.

use crate::{
    models::{ChatRole, ChatTurn},
    state::AppState,
};
use anyhow::{Context, Result, bail};
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestToolMessageArgs,
    ChatCompletionRequestUserMessageArgs, ChatCompletionToolArgs, FunctionObjectArgs,
};
use futures_util::StreamExt;
use motion_core::{
    conversation::ReportConversation,
    llm_client::{LLMAction, LLMStreamEvent},
    soap::SoapReport,
    workflow::ReportWorkflow,
};
use rmcp::{
    model::{CallToolRequestParam, RawContent},
    service::{RoleClient, RunningService},
};
use std::sync::Arc;
use tracing::info;

/// Most recent chat turns kept per connection; older ones are dropped.
const MAX_HISTORY_TURNS: usize = 40;

/// Describes where the report stands, appended to the system prompt each turn.
pub(crate) fn turn_context(
    conversation: &ReportConversation,
    draft: Option<&SoapReport>,
) -> Result<String> {
    let draft_json = match draft {
        Some(report) => serde_json::to_string_pretty(report)?,
        None => "null".to_string(),
    };
    let next_steps = conversation
        .expected_next()
        .iter()
        .map(|kind| kind.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let selection = match conversation.selection() {
        Some(ids) if !ids.is_empty() => ids.join(", "),
        Some(_) => "no images".to_string(),
        None => "none yet".to_string(),
    };
    Ok(format!(
        "# Current Context for This Turn\n\n**Report state:** {}\n\n**Allowed next messages:** {}\n\n**Selected images:** {}\n\n**Current SOAP draft:**\n```json\n{}\n```",
        conversation.state(),
        next_steps,
        selection,
        draft_json
    ))
}

/// Builds the model input: system prompt with context, then the chat history.
pub(crate) fn build_chat_messages(
    system_prompt: &str,
    context: &str,
    history: &[ChatTurn],
) -> Result<Vec<ChatCompletionRequestMessage>> {
    let mut messages: Vec<ChatCompletionRequestMessage> = vec![
        ChatCompletionRequestSystemMessageArgs::default()
            .content(format!("{}\n\n{}", system_prompt, context))
            .build()?
            .into(),
    ];
    for turn in history {
        match turn.role {
            ChatRole::User => messages.push(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(turn.content.clone())
                    .build()?
                    .into(),
            ),
            ChatRole::Ai => messages.push(
                ChatCompletionRequestAssistantMessageArgs::default()
                    .content(turn.content.clone())
                    .build()?
                    .into(),
            ),
        };
    }
    Ok(messages)
}

/// Handles one chat message, letting the model call the illustration tool.
///
/// This involves:
/// 1.  Constructing the prompt with the report state and chat history.
/// 2.  Calling the LLM to decide on an action (reply or use a tool).
/// 3.  If a tool is chosen, executing it and feeding the result back to the LLM.
/// 4.  Collecting the final text reply, which is returned and appended to history.
///
/// A failed turn, including a model stream that breaks off or yields no text,
/// is an error and leaves `history` untouched.
pub async fn handle_chat_cycle(
    state: &Arc<AppState>,
    workflow: &ReportWorkflow,
    history: &mut Vec<ChatTurn>,
    mcp_client: &RunningService<RoleClient, ()>,
    user_text: &str,
) -> Result<String> {
    let user_turn = ChatTurn::user(user_text);
    let mut turns = history.clone();
    turns.push(user_turn.clone());

    let context = turn_context(workflow.conversation(), workflow.current_draft())?;
    let messages = build_chat_messages(&state.system_prompt, &context, &turns)?;

    // Get the list of available tools for the model.
    let tools = mcp_client
        .list_all_tools()
        .await?
        .into_iter()
        .map(|t| {
            Ok(ChatCompletionToolArgs::default()
                .function(
                    FunctionObjectArgs::default()
                        .name(t.name)
                        .description(t.description.unwrap_or_default())
                        .parameters(serde_json::to_value(&*t.input_schema)?)
                        .build()?,
                )
                .build()?)
        })
        .collect::<Result<Vec<_>>>()?;

    let action = state
        .llm_client
        .decide_action(messages.clone(), tools)
        .await?;

    let mut full_response = String::new();
    match action {
        LLMAction::TextResponse(response_text) => full_response = response_text,
        LLMAction::ToolCall(tool_calls) => {
            let mut tool_results = vec![];
            for call in &tool_calls {
                info!(tool = %call.function.name, "Model requested tool call");
                let result = mcp_client
                    .peer()
                    .call_tool(CallToolRequestParam {
                        name: call.function.name.clone().into(),
                        arguments: Some(serde_json::from_str(&call.function.arguments)?),
                    })
                    .await?;

                let annotated_content = result
                    .content
                    .context("Tool call returned no content")?
                    .pop()
                    .context("Content list was empty")?;
                let result_text = match annotated_content.raw {
                    RawContent::Text(text_content) => text_content.text,
                    _ => "{\"error\": \"Unexpected content type from tool\", \"results\": []}"
                        .to_string(),
                };
                tool_results.push(result_text);
            }

            // Append the tool calls and their results to the history.
            let mut history_with_tools = messages;
            history_with_tools.push(
                ChatCompletionRequestAssistantMessageArgs::default()
                    .tool_calls(tool_calls.clone())
                    .build()?
                    .into(),
            );
            for (call, result) in tool_calls.iter().zip(tool_results) {
                history_with_tools.push(
                    ChatCompletionRequestToolMessageArgs::default()
                        .tool_call_id(call.id.clone())
                        .content(result)
                        .build()?
                        .into(),
                );
            }

            let mut final_stream = state
                .llm_client
                .stream_after_tools(history_with_tools)
                .await?;
            while let Some(event_result) = final_stream.next().await {
                let LLMStreamEvent::TextChunk(chunk) =
                    event_result.context("Model stream failed after tool calls")?;
                full_response.push_str(&chunk);
            }
        }
    }

    if full_response.trim().is_empty() {
        bail!("Model returned an empty reply");
    }

    history.push(user_turn);
    history.push(ChatTurn::ai(full_response.clone()));
    if history.len() > MAX_HISTORY_TURNS {
        let excess = history.len() - MAX_HISTORY_TURNS;
        history.drain(..excess);
    }
    Ok(full_response)
}
