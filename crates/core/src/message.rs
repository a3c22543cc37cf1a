//! Structured Message Protocol
//!
//! Defines the closed set of JSON messages sent to the frontend while a SOAP
//! report is produced. Every message serializes as
//! `{"type": ..., "timestamp": ..., <payload>}` with the payload keys in a
//! fixed order, which is the compatibility surface the frontend relies on.

use crate::illustration::{SearchResult, sanitize_results};
use crate::soap::{ExerciseWithImages, Image, SoapReport};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::Arc;

/// A flag that is always `true` on the wire.
///
/// Used for `requires_selection` and `ready_for_pdf`; deserializing `false`
/// is an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlwaysTrue;

impl Serialize for AlwaysTrue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bool(true)
    }
}

impl<'de> Deserialize<'de> for AlwaysTrue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if bool::deserialize(deserializer)? {
            Ok(AlwaysTrue)
        } else {
            Err(D::Error::custom("expected `true`"))
        }
    }
}

/// A message exchanged with the frontend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    /// Free-form conversational reply.
    #[serde(rename = "chat_message")]
    Chat { timestamp: String, content: String },
    /// First structured draft of the report, before any image selection.
    #[serde(rename = "soap_draft")]
    SoapDraft {
        timestamp: String,
        soap_report: SoapReport,
    },
    /// Asks the user to pick illustrations for each exercise.
    #[serde(rename = "exercise_selection")]
    ExerciseSelection {
        timestamp: String,
        exercises: Vec<ExerciseWithImages>,
        requires_selection: AlwaysTrue,
    },
    /// The finished report, ready to be rendered to PDF.
    #[serde(rename = "final_report")]
    FinalReport {
        timestamp: String,
        soap_report: SoapReport,
        selected_images: Vec<String>,
        ready_for_pdf: AlwaysTrue,
    },
    /// Questions for the user when the transcript is insufficient.
    #[serde(rename = "clarification_needed")]
    Clarification {
        timestamp: String,
        questions: Vec<String>,
        original_content: String,
    },
    /// An operational failure.
    #[serde(rename = "error")]
    Error {
        timestamp: String,
        error: String,
        details: Option<String>,
    },
}

/// The discriminant of a [`Message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Chat,
    SoapDraft,
    ExerciseSelection,
    FinalReport,
    Clarification,
    Error,
}

impl MessageKind {
    /// The literal used in the `type` field.
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Chat => "chat_message",
            MessageKind::SoapDraft => "soap_draft",
            MessageKind::ExerciseSelection => "exercise_selection",
            MessageKind::FinalReport => "final_report",
            MessageKind::Clarification => "clarification_needed",
            MessageKind::Error => "error",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Chat { .. } => MessageKind::Chat,
            Message::SoapDraft { .. } => MessageKind::SoapDraft,
            Message::ExerciseSelection { .. } => MessageKind::ExerciseSelection,
            Message::FinalReport { .. } => MessageKind::FinalReport,
            Message::Clarification { .. } => MessageKind::Clarification,
            Message::Error { .. } => MessageKind::Error,
        }
    }

    pub fn timestamp(&self) -> &str {
        match self {
            Message::Chat { timestamp, .. }
            | Message::SoapDraft { timestamp, .. }
            | Message::ExerciseSelection { timestamp, .. }
            | Message::FinalReport { timestamp, .. }
            | Message::Clarification { timestamp, .. }
            | Message::Error { timestamp, .. } => timestamp,
        }
    }

    /// Pretty-printed JSON for transmission.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Single-line JSON, used for WebSocket frames.
    pub fn to_json_compact(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Source of the current time for message timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// One exercise to be offered for image selection, with its raw search results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExerciseCandidate {
    pub name: String,
    pub description: String,
    pub search_results: Vec<SearchResult>,
}

impl ExerciseCandidate {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        search_results: Vec<SearchResult>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            search_results,
        }
    }
}

/// Identifier of the `index`-th (0-based) exercise in a selection message.
pub fn exercise_id(index: usize) -> String {
    format!("exercise_{}", index + 1)
}

/// Maps validated search results to images for one exercise.
fn build_images(exercise_id: &str, exercise_name: &str, results: Vec<SearchResult>) -> Vec<Image> {
    sanitize_results(exercise_name, results)
        .into_iter()
        .enumerate()
        .map(|(i, result)| Image {
            id: format!("img_{exercise_id}_{i}"),
            url: result.url,
            name: result
                .name
                .unwrap_or_else(|| format!("{exercise_name} illustration {}", i + 1)),
            selected: false,
        })
        .collect()
}

/// Builds messages stamped with a given [`Clock`].
#[derive(Clone)]
pub struct MessageFactory {
    clock: Arc<dyn Clock>,
}

impl Default for MessageFactory {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl MessageFactory {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    fn timestamp(&self) -> String {
        self.clock.now().to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    pub fn chat(&self, content: impl Into<String>) -> Message {
        Message::Chat {
            timestamp: self.timestamp(),
            content: content.into(),
        }
    }

    pub fn soap_draft(&self, soap_report: SoapReport) -> Message {
        Message::SoapDraft {
            timestamp: self.timestamp(),
            soap_report,
        }
    }

    /// Builds the selection message. Exercises get ids `exercise_1`,
    /// `exercise_2`, ... in input order; an exercise without usable search
    /// results is still listed, with no images.
    pub fn exercise_selection(&self, exercises: Vec<ExerciseCandidate>) -> Message {
        let exercises = exercises
            .into_iter()
            .enumerate()
            .map(|(index, candidate)| {
                let id = exercise_id(index);
                let images = build_images(&id, &candidate.name, candidate.search_results);
                ExerciseWithImages {
                    id,
                    name: candidate.name,
                    description: candidate.description,
                    images,
                }
            })
            .collect();

        Message::ExerciseSelection {
            timestamp: self.timestamp(),
            exercises,
            requires_selection: AlwaysTrue,
        }
    }

    /// Builds the final report. Image ids are passed through as given.
    pub fn final_report(&self, soap_report: SoapReport, selected_images: Vec<String>) -> Message {
        Message::FinalReport {
            timestamp: self.timestamp(),
            soap_report,
            selected_images,
            ready_for_pdf: AlwaysTrue,
        }
    }

    pub fn clarification(
        &self,
        questions: Vec<String>,
        original_content: impl Into<String>,
    ) -> Message {
        Message::Clarification {
            timestamp: self.timestamp(),
            questions,
            original_content: original_content.into(),
        }
    }

    pub fn error(&self, error: impl Into<String>, details: Option<String>) -> Message {
        Message::Error {
            timestamp: self.timestamp(),
            error: error.into(),
            details,
        }
    }
}

pub fn make_chat_message(content: impl Into<String>) -> Message {
    MessageFactory::default().chat(content)
}

pub fn make_soap_draft_message(soap_report: SoapReport) -> Message {
    MessageFactory::default().soap_draft(soap_report)
}

pub fn make_exercise_selection_message(exercises: Vec<ExerciseCandidate>) -> Message {
    MessageFactory::default().exercise_selection(exercises)
}

pub fn make_final_report_message(soap_report: SoapReport, selected_images: Vec<String>) -> Message {
    MessageFactory::default().final_report(soap_report, selected_images)
}

pub fn make_clarification_message(
    questions: Vec<String>,
    original_content: impl Into<String>,
) -> Message {
    MessageFactory::default().clarification(questions, original_content)
}

pub fn make_error_message(error: impl Into<String>, details: Option<String>) -> Message {
    MessageFactory::default().error(error, details)
}
