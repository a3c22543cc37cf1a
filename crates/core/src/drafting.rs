//! SOAP Draft Generation
//!
//! Turns a session transcript into a structured [`SoapReport`], or into a list
//! of clarification questions when the transcript is not enough to write one.
//! The model is only asked for this one payload; deciding what happens next is
//! left to the report workflow.

use crate::soap::{Exercise, SoapReport};
use anyhow::{Context, Result};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs, ResponseFormat,
    },
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Prompt template key for drafting. The template must contain `{transcript}`.
pub const DRAFT_PROMPT_KEY: &str = "soap_draft";

const DRAFT_SYSTEM_MESSAGE: &str = "You are a physiotherapy documentation assistant. \
Reply with exactly one JSON object and nothing else.";

/// What the model produced for a transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DraftReply {
    Draft { soap_report: SoapReport },
    Clarification { questions: Vec<String> },
}

#[derive(Debug, Error)]
pub enum DraftParseError {
    #[error("no JSON object found in model output")]
    NoJsonObject,
    #[error("model output is not a valid draft: {0}")]
    Json(#[from] serde_json::Error),
}

/// Parses a model reply, ignoring any prose or code fences around the JSON.
pub fn parse_draft_reply(text: &str) -> Result<DraftReply, DraftParseError> {
    let start = text.find('{').ok_or(DraftParseError::NoJsonObject)?;
    let end = text.rfind('}').ok_or(DraftParseError::NoJsonObject)?;
    if end < start {
        return Err(DraftParseError::NoJsonObject);
    }
    Ok(serde_json::from_str(&text[start..=end])?)
}

/// Produces SOAP drafts from transcripts.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SoapDrafter: Send + Sync {
    /// Drafts a report for `transcript`, or asks for clarification.
    async fn draft(&self, transcript: &str) -> Result<DraftReply>;
}

/// A [`SoapDrafter`] backed by an OpenAI-compatible chat completion API.
pub struct LLMSoapDrafter {
    client: Client<OpenAIConfig>,
    model: String,
    prompts: HashMap<String, String>,
}

impl LLMSoapDrafter {
    /// # Arguments
    ///
    /// * `config` - API key and base URL of the chat completion service.
    /// * `model` - Model identifier (e.g., "gemini-2.0-flash").
    /// * `prompts` - Prompt templates; must contain [`DRAFT_PROMPT_KEY`].
    pub fn new(config: OpenAIConfig, model: String, prompts: HashMap<String, String>) -> Self {
        Self {
            client: Client::with_config(config),
            model,
            prompts,
        }
    }
}

#[async_trait]
impl SoapDrafter for LLMSoapDrafter {
    async fn draft(&self, transcript: &str) -> Result<DraftReply> {
        let template = self
            .prompts
            .get(DRAFT_PROMPT_KEY)
            .context("Missing prompt template: 'soap_draft'")?;
        let prompt = template.replace("{transcript}", transcript);

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .response_format(ResponseFormat::JsonObject)
            .messages(vec![
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(DRAFT_SYSTEM_MESSAGE)
                    .build()?
                    .into(),
                ChatCompletionRequestUserMessageArgs::default()
                    .content(prompt)
                    .build()?
                    .into(),
            ])
            .build()?;

        let response = self.client.chat().create(request).await?;

        let answer = response
            .choices
            .first()
            .context("No response choice from LLM")?
            .message
            .content
            .as_ref()
            .context("No content in LLM response")?;

        Ok(parse_draft_reply(answer)?)
    }
}

/// A [`SoapDrafter`] with fixed output, used by tests that exercise the
/// report flow without a model.
///
/// Blank transcripts get a clarification; anything else gets a lower-back-pain
/// report whose subjective section echoes the transcript.
pub struct StaticSoapDrafter;

#[async_trait]
impl SoapDrafter for StaticSoapDrafter {
    async fn draft(&self, transcript: &str) -> Result<DraftReply> {
        if transcript.trim().is_empty() {
            return Ok(DraftReply::Clarification {
                questions: vec!["Please provide the session transcript.".to_string()],
            });
        }
        Ok(DraftReply::Draft {
            soap_report: SoapReport {
                patient_name: None,
                patient_age: None,
                condition: Some("Lower back pain".to_string()),
                session_date: None,
                subjective: transcript.trim().to_string(),
                objective: "Limited lumbar flexion.".to_string(),
                assessment: "Acute lumbar strain.".to_string(),
                plan: "Home exercise program. Review in 1 week.".to_string(),
                exercises: vec![
                    Exercise::new("Cat-cow exercises", "10 repetitions, 3 times daily"),
                    Exercise::new("Bridge exercises", "Hold 10 seconds, 10 repetitions"),
                ],
            },
        })
    }
}
