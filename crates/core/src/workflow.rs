//! Report Workflow
//!
//! Drives one report through the protocol: transcript to draft, draft to
//! exercise selection, selection to final report. Each step checks the
//! [`ReportConversation`] before doing any work, so an out-of-order request
//! fails with a [`ProtocolError`] instead of producing a message.

use crate::conversation::{ProtocolError, ReportConversation, ReportState};
use crate::drafting::{DraftReply, SoapDrafter};
use crate::illustration::IllustrationLookup;
use crate::message::{ExerciseCandidate, Message, MessageFactory, MessageKind};
use crate::soap::{ExerciseWithImages, SoapReport};
use std::sync::Arc;
use tracing::{debug, error, info};

pub struct ReportWorkflow {
    drafter: Arc<dyn SoapDrafter>,
    lookup: IllustrationLookup,
    messages: MessageFactory,
    conversation: ReportConversation,
    draft: Option<SoapReport>,
    offered: Vec<ExerciseWithImages>,
}

impl ReportWorkflow {
    pub fn new(drafter: Arc<dyn SoapDrafter>, lookup: IllustrationLookup) -> Self {
        Self {
            drafter,
            lookup,
            messages: MessageFactory::default(),
            conversation: ReportConversation::new(),
            draft: None,
            offered: Vec::new(),
        }
    }

    /// Replaces the message factory, e.g. to pin timestamps in tests.
    pub fn with_message_factory(mut self, messages: MessageFactory) -> Self {
        self.messages = messages;
        self
    }

    pub fn state(&self) -> ReportState {
        self.conversation.state()
    }

    pub fn conversation(&self) -> &ReportConversation {
        &self.conversation
    }

    /// The draft currently under review, if any.
    pub fn current_draft(&self) -> Option<&SoapReport> {
        self.draft.as_ref()
    }

    pub fn messages(&self) -> &MessageFactory {
        &self.messages
    }

    fn emit(&mut self, message: Message) -> Result<Message, ProtocolError> {
        self.conversation.record(&message)?;
        Ok(message)
    }

    /// Drafts a report from a transcript.
    ///
    /// Produces a draft, a clarification request, or an error message when
    /// the drafter fails. Any earlier report in this workflow is discarded.
    pub async fn draft(&mut self, transcript: &str) -> Result<Message, ProtocolError> {
        self.draft = None;
        self.offered.clear();

        let message = match self.drafter.draft(transcript).await {
            Ok(DraftReply::Draft { soap_report }) => {
                info!(
                    exercises = soap_report.exercises.len(),
                    "SOAP draft generated"
                );
                self.draft = Some(soap_report.clone());
                self.messages.soap_draft(soap_report)
            }
            Ok(DraftReply::Clarification { questions }) => {
                info!(questions = questions.len(), "Transcript needs clarification");
                self.messages.clarification(questions, transcript)
            }
            Err(e) => {
                error!(error = ?e, "SOAP drafting failed");
                self.messages
                    .error("Failed to generate SOAP draft", Some(format!("{e:#}")))
            }
        };
        self.emit(message)
    }

    /// Searches illustrations for every exercise in the current draft and
    /// builds the selection request.
    pub async fn offer_illustrations(&mut self) -> Result<Message, ProtocolError> {
        if !self.conversation.permits(MessageKind::ExerciseSelection) {
            return Err(ProtocolError::UnexpectedMessage {
                kind: MessageKind::ExerciseSelection,
                state: self.conversation.state(),
            });
        }

        let exercises = self
            .draft
            .as_ref()
            .map(|report| report.exercises.clone())
            .unwrap_or_default();
        let names: Vec<String> = exercises.iter().map(|e| e.name.clone()).collect();
        let outcomes = self.lookup.illustrate_all(&names).await;

        let candidates = exercises
            .into_iter()
            .zip(outcomes)
            .map(|(exercise, outcome)| {
                ExerciseCandidate::new(exercise.name, exercise.description, outcome.into_results())
            })
            .collect();
        let message = self.messages.exercise_selection(candidates);
        if let Message::ExerciseSelection { exercises, .. } = &message {
            self.offered = exercises.clone();
        }
        self.emit(message)
    }

    /// Records the user's image choice and builds the final report.
    ///
    /// Each exercise gets the URL of the first selected image offered for it.
    /// Ids that match no offered image are kept in `selected_images` as given.
    pub fn finalize(&mut self, selected_images: Vec<String>) -> Result<Message, ProtocolError> {
        self.conversation.record_selection(selected_images.clone())?;

        let mut report = self.draft.clone().unwrap_or_default();
        apply_selection(&mut report, &self.offered, &selected_images);
        let message = self.messages.final_report(report, selected_images);
        self.emit(message)
    }

    /// Records a conversational reply. Never changes the report state.
    pub fn chat(&mut self, content: impl Into<String>) -> Result<Message, ProtocolError> {
        let message = self.messages.chat(content);
        self.emit(message)
    }

    /// Builds an error message answering a rejected request.
    ///
    /// The report state is left untouched: the request failed, not the report.
    pub fn reject(&self, err: &ProtocolError) -> Message {
        self.messages
            .error("Request not allowed at this point", Some(err.to_string()))
    }
}

/// Writes the selected image URLs into the report's exercises.
///
/// `offered` lines up with `report.exercises`, as built by
/// [`ReportWorkflow::offer_illustrations`].
fn apply_selection(report: &mut SoapReport, offered: &[ExerciseWithImages], selected: &[String]) {
    for image_id in selected {
        let found = offered
            .iter()
            .enumerate()
            .find_map(|(i, ex)| ex.image(image_id).map(|img| (i, img.url.clone())));
        match found {
            Some((i, url)) => {
                if let Some(exercise) = report.exercises.get_mut(i) {
                    if exercise.selected_image.is_none() {
                        exercise.selected_image = Some(url);
                    }
                }
            }
            None => debug!(%image_id, "Selected image was not offered; passing it through"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drafting::MockSoapDrafter;
    use crate::illustration::{MockImageSearchProvider, SearchError};
    use crate::message::FixedClock;
    use crate::soap::Exercise;
    use anyhow::anyhow;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn report() -> SoapReport {
        SoapReport {
            subjective: "Lower back pain".into(),
            exercises: vec![
                Exercise::new("Cat-cow exercises", "10 reps, 3x daily"),
                Exercise::new("Bridges", "10 reps"),
            ],
            ..Default::default()
        }
    }

    fn drafting(reply: DraftReply) -> Arc<MockSoapDrafter> {
        let mut drafter = MockSoapDrafter::new();
        drafter
            .expect_draft()
            .returning(move |_| Ok(reply.clone()));
        Arc::new(drafter)
    }

    fn images_provider() -> IllustrationLookup {
        let mut provider = MockImageSearchProvider::new();
        provider.expect_search().returning(|query, _| {
            let slug = if query.ends_with("Bridges") { "bridge" } else { "cat" };
            Ok(json!({"results": [
                {"type": "image", "name": format!("{slug} a"), "url": format!("https://x/{slug}-a.jpg")},
                {"type": "image", "name": format!("{slug} b"), "url": format!("https://x/{slug}-b.jpg")}
            ]}))
        });
        IllustrationLookup::new(Arc::new(provider))
    }

    #[tokio::test]
    async fn test_full_report_flow() {
        let mut workflow = ReportWorkflow::new(
            drafting(DraftReply::Draft {
                soap_report: report(),
            }),
            images_provider(),
        );

        let draft = workflow.draft("transcript").await.unwrap();
        assert_eq!(draft.kind(), MessageKind::SoapDraft);

        let selection = workflow.offer_illustrations().await.unwrap();
        let Message::ExerciseSelection { exercises, .. } = &selection else {
            panic!("Expected exercise selection");
        };
        assert_eq!(exercises[0].images[1].id, "img_exercise_1_1");
        assert_eq!(exercises[1].images[0].url, "https://x/bridge-a.jpg");

        let selected = vec![
            "img_exercise_2_0".to_string(),
            "img_exercise_1_1".to_string(),
            "img_unknown_0".to_string(),
        ];
        let final_report = workflow.finalize(selected.clone()).unwrap();
        let Message::FinalReport {
            soap_report,
            selected_images,
            ..
        } = final_report
        else {
            panic!("Expected final report");
        };
        assert_eq!(selected_images, selected);
        assert_eq!(
            soap_report.exercises[0].selected_image.as_deref(),
            Some("https://x/cat-b.jpg")
        );
        assert_eq!(
            soap_report.exercises[1].selected_image.as_deref(),
            Some("https://x/bridge-a.jpg")
        );
        assert_eq!(workflow.state(), ReportState::Finalized);
    }

    #[tokio::test]
    async fn test_first_selection_per_exercise_wins() {
        let mut workflow = ReportWorkflow::new(
            drafting(DraftReply::Draft {
                soap_report: report(),
            }),
            images_provider(),
        );
        workflow.draft("transcript").await.unwrap();
        workflow.offer_illustrations().await.unwrap();

        let message = workflow
            .finalize(vec!["img_exercise_1_0".into(), "img_exercise_1_1".into()])
            .unwrap();

        let Message::FinalReport { soap_report, .. } = message else {
            panic!("Expected final report");
        };
        assert_eq!(
            soap_report.exercises[0].selected_image.as_deref(),
            Some("https://x/cat-a.jpg")
        );
        assert_eq!(soap_report.exercises[1].selected_image, None);
    }

    #[tokio::test]
    async fn test_offer_before_draft_does_not_search() {
        let mut provider = MockImageSearchProvider::new();
        provider.expect_search().times(0);
        let mut workflow = ReportWorkflow::new(
            Arc::new(MockSoapDrafter::new()),
            IllustrationLookup::new(Arc::new(provider)),
        );

        let err = workflow.offer_illustrations().await.unwrap_err();

        assert_eq!(
            err,
            ProtocolError::UnexpectedMessage {
                kind: MessageKind::ExerciseSelection,
                state: ReportState::Idle
            }
        );
    }

    #[tokio::test]
    async fn test_finalize_before_selection_request_fails() {
        let mut workflow = ReportWorkflow::new(
            drafting(DraftReply::Draft {
                soap_report: report(),
            }),
            IllustrationLookup::unconfigured(),
        );
        workflow.draft("transcript").await.unwrap();

        assert!(workflow.finalize(vec![]).is_err());
        assert_eq!(workflow.state(), ReportState::DraftReady);
    }

    #[tokio::test]
    async fn test_unconfigured_lookup_offers_exercises_without_images() {
        let mut workflow = ReportWorkflow::new(
            drafting(DraftReply::Draft {
                soap_report: report(),
            }),
            IllustrationLookup::unconfigured(),
        );
        workflow.draft("transcript").await.unwrap();

        let message = workflow.offer_illustrations().await.unwrap();

        let Message::ExerciseSelection { exercises, .. } = message else {
            panic!("Expected exercise selection");
        };
        assert_eq!(exercises.len(), 2);
        assert!(exercises.iter().all(|e| e.images.is_empty()));
    }

    #[tokio::test]
    async fn test_provider_failure_still_offers_exercise() {
        let mut provider = MockImageSearchProvider::new();
        provider
            .expect_search()
            .returning(|_, _| Err(SearchError::Provider("timed out".into())));
        let mut workflow = ReportWorkflow::new(
            drafting(DraftReply::Draft {
                soap_report: report(),
            }),
            IllustrationLookup::new(Arc::new(provider)),
        );
        workflow.draft("transcript").await.unwrap();

        let message = workflow.offer_illustrations().await.unwrap();

        assert_eq!(message.kind(), MessageKind::ExerciseSelection);
        assert_eq!(workflow.state(), ReportState::AwaitingSelection);
    }

    #[tokio::test]
    async fn test_clarification_carries_transcript() {
        let instant = Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap();
        let factory = MessageFactory::new(Arc::new(FixedClock(instant)));
        let mut workflow = ReportWorkflow::new(
            drafting(DraftReply::Clarification {
                questions: vec!["What is the patient's age?".into()],
            }),
            IllustrationLookup::unconfigured(),
        )
        .with_message_factory(factory.clone());

        let message = workflow.draft("Patient has knee pain.").await.unwrap();

        assert_eq!(
            message,
            factory.clarification(
                vec!["What is the patient's age?".into()],
                "Patient has knee pain."
            )
        );
        assert_eq!(workflow.state(), ReportState::Clarifying);
    }

    #[tokio::test]
    async fn test_drafter_failure_becomes_error_message() {
        let mut drafter = MockSoapDrafter::new();
        drafter
            .expect_draft()
            .returning(|_| Err(anyhow!("upstream unavailable")));
        let mut workflow = ReportWorkflow::new(Arc::new(drafter), IllustrationLookup::unconfigured());

        let message = workflow.draft("transcript").await.unwrap();

        let Message::Error { error, details, .. } = message else {
            panic!("Expected error message");
        };
        assert_eq!(error, "Failed to generate SOAP draft");
        assert_eq!(details.as_deref(), Some("upstream unavailable"));
        assert_eq!(workflow.state(), ReportState::Errored);
    }

    #[tokio::test]
    async fn test_reject_leaves_state_unchanged() {
        let mut workflow = ReportWorkflow::new(
            drafting(DraftReply::Draft {
                soap_report: report(),
            }),
            IllustrationLookup::unconfigured(),
        );
        workflow.draft("transcript").await.unwrap();
        let err = workflow.finalize(vec![]).unwrap_err();

        let message = workflow.reject(&err);

        assert_eq!(message.kind(), MessageKind::Error);
        assert_eq!(workflow.state(), ReportState::DraftReady);
    }
}
