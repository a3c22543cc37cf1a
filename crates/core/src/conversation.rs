//! Report conversation state machine.
//!
//! The orchestration decides which message kind may be produced next; the
//! language model only fills in payloads. The progression is
//!
//! ```text
//! Idle -> DraftReady -> AwaitingSelection -> SelectionReceived -> Finalized
//! ```
//!
//! with `Clarifying` and `Errored` reachable from any state. A new draft is
//! accepted from any state and restarts the report.

use crate::message::{Message, MessageKind};
use std::fmt;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportState {
    Idle,
    DraftReady,
    AwaitingSelection,
    SelectionReceived,
    Finalized,
    Clarifying,
    Errored,
}

impl fmt::Display for ReportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReportState::Idle => "idle",
            ReportState::DraftReady => "draft_ready",
            ReportState::AwaitingSelection => "awaiting_selection",
            ReportState::SelectionReceived => "selection_received",
            ReportState::Finalized => "finalized",
            ReportState::Clarifying => "clarifying",
            ReportState::Errored => "errored",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("cannot emit `{kind}` while the report is {state}")]
    UnexpectedMessage { kind: MessageKind, state: ReportState },
    #[error("no image selection was requested (report is {state})")]
    UnexpectedSelection { state: ReportState },
}

/// Tracks where one report is in the protocol.
#[derive(Debug, Clone)]
pub struct ReportConversation {
    state: ReportState,
    selection: Option<Vec<String>>,
}

impl Default for ReportConversation {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportConversation {
    pub fn new() -> Self {
        Self {
            state: ReportState::Idle,
            selection: None,
        }
    }

    pub fn state(&self) -> ReportState {
        self.state
    }

    /// The image ids the user chose, once a selection has been received.
    pub fn selection(&self) -> Option<&[String]> {
        self.selection.as_deref()
    }

    /// Checks whether a message of `kind` may be emitted now.
    pub fn permits(&self, kind: MessageKind) -> bool {
        match kind {
            MessageKind::Chat
            | MessageKind::SoapDraft
            | MessageKind::Clarification
            | MessageKind::Error => true,
            MessageKind::ExerciseSelection => self.state == ReportState::DraftReady,
            MessageKind::FinalReport => self.state == ReportState::SelectionReceived,
        }
    }

    /// The message kinds the orchestration may request next.
    pub fn expected_next(&self) -> Vec<MessageKind> {
        [
            MessageKind::Chat,
            MessageKind::SoapDraft,
            MessageKind::ExerciseSelection,
            MessageKind::FinalReport,
            MessageKind::Clarification,
            MessageKind::Error,
        ]
        .into_iter()
        .filter(|kind| self.permits(*kind))
        .collect()
    }

    /// Applies an outgoing message and returns the new state.
    pub fn record(&mut self, message: &Message) -> Result<ReportState, ProtocolError> {
        let kind = message.kind();
        if !self.permits(kind) {
            return Err(ProtocolError::UnexpectedMessage {
                kind,
                state: self.state,
            });
        }

        let next = match kind {
            MessageKind::Chat => self.state,
            MessageKind::SoapDraft => {
                self.selection = None;
                ReportState::DraftReady
            }
            MessageKind::ExerciseSelection => ReportState::AwaitingSelection,
            MessageKind::FinalReport => ReportState::Finalized,
            MessageKind::Clarification => ReportState::Clarifying,
            MessageKind::Error => ReportState::Errored,
        };
        debug!(%kind, from = %self.state, to = %next, "Report state transition");
        self.state = next;
        Ok(next)
    }

    /// Applies the user's answer to an exercise selection request.
    pub fn record_selection(
        &mut self,
        selected_images: Vec<String>,
    ) -> Result<ReportState, ProtocolError> {
        match self.state {
            ReportState::AwaitingSelection | ReportState::SelectionReceived => {
                self.selection = Some(selected_images);
                self.state = ReportState::SelectionReceived;
                Ok(self.state)
            }
            state => Err(ProtocolError::UnexpectedSelection { state }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{
        make_chat_message, make_clarification_message, make_error_message,
        make_exercise_selection_message, make_final_report_message, make_soap_draft_message,
    };
    use crate::soap::SoapReport;

    fn draft() -> Message {
        make_soap_draft_message(SoapReport::default())
    }

    fn selection() -> Message {
        make_exercise_selection_message(vec![])
    }

    fn final_report() -> Message {
        make_final_report_message(SoapReport::default(), vec![])
    }

    #[test]
    fn test_happy_path() {
        let mut conv = ReportConversation::new();
        assert_eq!(conv.record(&draft()), Ok(ReportState::DraftReady));
        assert_eq!(conv.record(&selection()), Ok(ReportState::AwaitingSelection));
        assert_eq!(
            conv.record_selection(vec!["img_exercise_1_0".into()]),
            Ok(ReportState::SelectionReceived)
        );
        assert_eq!(conv.record(&final_report()), Ok(ReportState::Finalized));
        assert_eq!(conv.selection(), Some(&["img_exercise_1_0".to_string()][..]));
    }

    #[test]
    fn test_selection_requires_draft() {
        let mut conv = ReportConversation::new();
        let err = conv.record(&selection()).unwrap_err();

        assert_eq!(
            err,
            ProtocolError::UnexpectedMessage {
                kind: MessageKind::ExerciseSelection,
                state: ReportState::Idle
            }
        );
        assert_eq!(conv.state(), ReportState::Idle);
    }

    #[test]
    fn test_final_requires_user_selection() {
        let mut conv = ReportConversation::new();
        conv.record(&draft()).unwrap();
        conv.record(&selection()).unwrap();

        assert!(conv.record(&final_report()).is_err());
        assert_eq!(conv.state(), ReportState::AwaitingSelection);
    }

    #[test]
    fn test_selection_without_request_is_rejected() {
        let mut conv = ReportConversation::new();
        conv.record(&draft()).unwrap();

        assert_eq!(
            conv.record_selection(vec![]),
            Err(ProtocolError::UnexpectedSelection {
                state: ReportState::DraftReady
            })
        );
    }

    #[test]
    fn test_clarification_and_error_from_any_state() {
        let mut conv = ReportConversation::new();
        conv.record(&draft()).unwrap();
        conv.record(&selection()).unwrap();
        assert_eq!(
            conv.record(&make_clarification_message(vec![], "t")),
            Ok(ReportState::Clarifying)
        );
        assert_eq!(
            conv.record(&make_error_message("boom", None)),
            Ok(ReportState::Errored)
        );
        assert_eq!(
            conv.expected_next(),
            vec![
                MessageKind::Chat,
                MessageKind::SoapDraft,
                MessageKind::Clarification,
                MessageKind::Error
            ]
        );
    }

    #[test]
    fn test_chat_keeps_state() {
        let mut conv = ReportConversation::new();
        conv.record(&draft()).unwrap();
        assert_eq!(
            conv.record(&make_chat_message("hi")),
            Ok(ReportState::DraftReady)
        );
    }

    #[test]
    fn test_new_draft_clears_previous_selection() {
        let mut conv = ReportConversation::new();
        conv.record(&draft()).unwrap();
        conv.record(&selection()).unwrap();
        conv.record_selection(vec!["img_exercise_1_0".into()]).unwrap();

        conv.record(&draft()).unwrap();

        assert_eq!(conv.state(), ReportState::DraftReady);
        assert_eq!(conv.selection(), None);
    }

    #[test]
    fn test_protocol_error_message() {
        let err = ProtocolError::UnexpectedMessage {
            kind: MessageKind::FinalReport,
            state: ReportState::DraftReady,
        };
        assert_eq!(
            err.to_string(),
            "cannot emit `final_report` while the report is draft_ready"
        );
    }
}
