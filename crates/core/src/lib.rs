//! Motion core: turns physiotherapy session transcripts into SOAP reports
//! illustrated with exercise images, exchanged with the frontend as typed
//! JSON messages.

pub mod agent;
pub mod conversation;
pub mod drafting;
pub mod illustration;
pub mod linkup;
pub mod llm_client;
pub mod message;
pub mod soap;
pub mod workflow;

pub use conversation::{ProtocolError, ReportConversation, ReportState};
pub use illustration::{IllustrationLookup, SearchOutcome, SearchResult};
pub use message::{Message, MessageFactory, MessageKind};
pub use soap::{Exercise, ExerciseWithImages, Image, SoapReport};
pub use workflow::ReportWorkflow;
