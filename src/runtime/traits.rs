//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the engine with mock implementations.

use crate::db::{ChatMessage, ChatRole, Checkpoint, DbError};
use crate::llm::{LlmError, LlmRequest, LlmService};
use crate::search::{SearchError, SearchHit, SearchRequest, SearchService};
use crate::state_machine::ConversationState;
use async_trait::async_trait;

/// Durable session id -> conversation state mapping
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Latest checkpoint for a session, `None` if the session is new
    async fn load(&self, session_id: &str) -> Result<Option<Checkpoint>, DbError>;

    /// Persist `state`, guarded by the version the caller loaded.
    /// Returns the new version.
    async fn store(
        &self,
        session_id: &str,
        state: &ConversationState,
        expected_version: Option<u64>,
    ) -> Result<u64, DbError>;
}

/// Storage for the user-visible chat transcript
#[async_trait]
pub trait TranscriptStore: Send + Sync {
    async fn add_chat_message(
        &self,
        session_id: &str,
        role: ChatRole,
        content: &str,
    ) -> Result<ChatMessage, String>;

    async fn get_chat_messages(&self, session_id: &str) -> Result<Vec<ChatMessage>, String>;
}

/// Client for text generation
#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String, LlmError>;

    /// Whether a real backend is configured
    fn is_configured(&self) -> bool {
        true
    }
}

/// Client for web search
#[async_trait]
pub trait SearchClient: Send + Sync {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchHit>, SearchError>;

    /// Whether a real backend is configured
    fn is_configured(&self) -> bool {
        true
    }
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: CheckpointStore + ?Sized> CheckpointStore for Arc<T> {
    async fn load(&self, session_id: &str) -> Result<Option<Checkpoint>, DbError> {
        (**self).load(session_id).await
    }

    async fn store(
        &self,
        session_id: &str,
        state: &ConversationState,
        expected_version: Option<u64>,
    ) -> Result<u64, DbError> {
        (**self).store(session_id, state, expected_version).await
    }
}

#[async_trait]
impl<T: TranscriptStore + ?Sized> TranscriptStore for Arc<T> {
    async fn add_chat_message(
        &self,
        session_id: &str,
        role: ChatRole,
        content: &str,
    ) -> Result<ChatMessage, String> {
        (**self).add_chat_message(session_id, role, content).await
    }

    async fn get_chat_messages(&self, session_id: &str) -> Result<Vec<ChatMessage>, String> {
        (**self).get_chat_messages(session_id).await
    }
}

#[async_trait]
impl<T: GenerationClient + ?Sized> GenerationClient for Arc<T> {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String, LlmError> {
        (**self).generate(system, prompt).await
    }

    fn is_configured(&self) -> bool {
        (**self).is_configured()
    }
}

#[async_trait]
impl<T: SearchClient + ?Sized> SearchClient for Arc<T> {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchHit>, SearchError> {
        (**self).search(request).await
    }

    fn is_configured(&self) -> bool {
        (**self).is_configured()
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

use crate::db::Database;
use std::sync::Arc;

/// Adapter to use Database as checkpoint and transcript storage
#[derive(Clone)]
pub struct DatabaseStorage {
    db: Database,
}

impl DatabaseStorage {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CheckpointStore for DatabaseStorage {
    async fn load(&self, session_id: &str) -> Result<Option<Checkpoint>, DbError> {
        self.db.load_checkpoint(session_id)
    }

    async fn store(
        &self,
        session_id: &str,
        state: &ConversationState,
        expected_version: Option<u64>,
    ) -> Result<u64, DbError> {
        self.db.store_checkpoint(session_id, state, expected_version)
    }
}

#[async_trait]
impl TranscriptStore for DatabaseStorage {
    async fn add_chat_message(
        &self,
        session_id: &str,
        role: ChatRole,
        content: &str,
    ) -> Result<ChatMessage, String> {
        let id = uuid::Uuid::new_v4().to_string();
        self.db
            .add_chat_message(&id, session_id, role, content)
            .map_err(|e| e.to_string())
    }

    async fn get_chat_messages(&self, session_id: &str) -> Result<Vec<ChatMessage>, String> {
        self.db.get_chat_messages(session_id).map_err(|e| e.to_string())
    }
}

/// Adapter to use an `LlmService` as the generation client
pub struct LlmGenerationClient {
    service: Arc<dyn LlmService>,
    configured: bool,
}

impl LlmGenerationClient {
    pub fn new(service: Arc<dyn LlmService>, configured: bool) -> Self {
        Self { service, configured }
    }
}

#[async_trait]
impl GenerationClient for LlmGenerationClient {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String, LlmError> {
        let response = self.service.complete(&LlmRequest::new(system, prompt)).await?;
        Ok(response.text)
    }

    fn is_configured(&self) -> bool {
        self.configured
    }
}

/// Adapter to use a `SearchService` as the search client
pub struct ProviderSearchClient {
    service: Arc<dyn SearchService>,
    configured: bool,
}

impl ProviderSearchClient {
    pub fn new(service: Arc<dyn SearchService>, configured: bool) -> Self {
        Self { service, configured }
    }
}

#[async_trait]
impl SearchClient for ProviderSearchClient {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchHit>, SearchError> {
        let start = std::time::Instant::now();
        let result = self.service.search(request).await;
        match &result {
            Ok(hits) => tracing::info!(
                provider = self.service.provider(),
                duration_ms = %start.elapsed().as_millis(),
                results = hits.len(),
                "Search completed"
            ),
            Err(e) => tracing::warn!(
                provider = self.service.provider(),
                duration_ms = %start.elapsed().as_millis(),
                error = %e,
                "Search failed"
            ),
        }
        result
    }

    fn is_configured(&self) -> bool {
        self.configured
    }
}
