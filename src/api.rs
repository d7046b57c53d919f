//! HTTP API for `HealthBot`

mod handlers;
mod types;

pub use handlers::create_router;
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::runtime::{
    CheckpointStore, EngineError, GenerationClient, RunReply, SearchClient, TranscriptStore,
    WorkflowEngine,
};
use crate::state_machine::MessageType;
use async_trait::async_trait;
use std::sync::Arc;

/// The workflow as seen by request handlers
#[async_trait]
pub trait ChatWorkflow: Send + Sync {
    async fn run(
        &self,
        session_id: &str,
        user_message: &str,
        message_type: MessageType,
    ) -> Result<RunReply, EngineError>;

    /// (generation configured, search configured)
    fn configured(&self) -> (bool, bool);
}

#[async_trait]
impl<C, G, S> ChatWorkflow for WorkflowEngine<C, G, S>
where
    C: CheckpointStore,
    G: GenerationClient,
    S: SearchClient,
{
    async fn run(
        &self,
        session_id: &str,
        user_message: &str,
        message_type: MessageType,
    ) -> Result<RunReply, EngineError> {
        WorkflowEngine::run(self, session_id, user_message, message_type).await
    }

    fn configured(&self) -> (bool, bool) {
        (self.generation().is_configured(), self.search_client().is_configured())
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub workflow: Arc<dyn ChatWorkflow>,
    pub transcripts: Arc<dyn TranscriptStore>,
}

impl AppState {
    pub fn new(workflow: Arc<dyn ChatWorkflow>, transcripts: Arc<dyn TranscriptStore>) -> Self {
        Self {
            workflow,
            transcripts,
        }
    }
}
