//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds all shared,
//! clonable resources like service clients and prompts.

use crate::config::Config;
use motion_core::{
    drafting::SoapDrafter, illustration::IllustrationLookup, llm_client::LLMClient,
    workflow::ReportWorkflow,
};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub drafter: Arc<dyn SoapDrafter>,
    pub llm_client: Arc<dyn LLMClient>,
    pub lookup: IllustrationLookup,
    pub system_prompt: Arc<String>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Starts a fresh report for a new connection.
    pub fn new_workflow(&self) -> ReportWorkflow {
        ReportWorkflow::new(self.drafter.clone(), self.lookup.clone())
    }
}
