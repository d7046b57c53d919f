//! Mock implementations for testing
//!
//! These mocks enable end-to-end workflow tests without real I/O.

use super::executor::{EngineConfig, RunReply, WorkflowEngine};
use super::traits::*;
use crate::db::{Checkpoint, DbError};
use crate::llm::LlmError;
use crate::search::{SearchError, SearchHit, SearchRequest};
use crate::state_machine::{ConversationState, MessageType, MismatchPolicy};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Mock Generation Client
// ============================================================================

/// Mock generation client that returns queued responses.
/// An empty queue behaves like an unreachable service.
pub struct MockGenerationClient {
    responses: Mutex<VecDeque<Result<String, LlmError>>>,
    delay: Option<Duration>,
    /// Record of all (system, prompt) pairs requested
    pub requests: Mutex<Vec<(String, String)>>,
}

impl MockGenerationClient {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Sleep before answering each request
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue a successful response
    pub fn queue_response(&self, text: impl Into<String>) {
        self.responses.lock().unwrap().push_back(Ok(text.into()));
    }

    /// Queue an error response
    pub fn queue_error(&self, error: LlmError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Get recorded requests
    pub fn recorded_requests(&self) -> Vec<(String, String)> {
        self.requests.lock().unwrap().clone()
    }
}

impl Default for MockGenerationClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerationClient for MockGenerationClient {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String, LlmError> {
        self.requests
            .lock()
            .unwrap()
            .push((system.to_string(), prompt.to_string()));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::network("No mock response queued")))
    }
}

// ============================================================================
// Mock Search Client
// ============================================================================

/// Mock search client with queued results.
/// An empty queue behaves like an unconfigured provider.
pub struct MockSearchClient {
    responses: Mutex<VecDeque<Result<Vec<SearchHit>, SearchError>>>,
    /// Record of search requests
    pub requests: Mutex<Vec<SearchRequest>>,
}

impl MockSearchClient {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn queue_results(&self, hits: Vec<SearchHit>) {
        self.responses.lock().unwrap().push_back(Ok(hits));
    }

    pub fn recorded_requests(&self) -> Vec<SearchRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Default for MockSearchClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchClient for MockSearchClient {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchHit>, SearchError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(SearchError::Unavailable))
    }
}

// ============================================================================
// In-Memory Checkpoint Store
// ============================================================================

/// Checkpoint store with the same versioning rules as the database.
/// States pass through JSON so round-trip fidelity is exercised.
pub struct InMemoryCheckpointStore {
    checkpoints: Mutex<HashMap<String, Checkpoint>>,
    fail_writes: AtomicBool,
    bump_on_load: Mutex<HashSet<String>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self {
            checkpoints: Mutex::new(HashMap::new()),
            fail_writes: AtomicBool::new(false),
            bump_on_load: Mutex::new(HashSet::new()),
        }
    }

    /// Make every subsequent store fail
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Simulate another writer landing right after the next load of `session_id`
    pub fn bump_on_next_load(&self, session_id: &str) {
        self.bump_on_load.lock().unwrap().insert(session_id.to_string());
    }

    /// Insert a state directly, bypassing version checks
    pub fn seed(&self, session_id: &str, state: ConversationState) {
        let mut checkpoints = self.checkpoints.lock().unwrap();
        let version = checkpoints.get(session_id).map_or(1, |c| c.version + 1);
        checkpoints.insert(session_id.to_string(), Checkpoint { state, version });
    }

    pub fn snapshot(&self, session_id: &str) -> Option<Checkpoint> {
        self.checkpoints.lock().unwrap().get(session_id).cloned()
    }
}

impl Default for InMemoryCheckpointStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn load(&self, session_id: &str) -> Result<Option<Checkpoint>, DbError> {
        let mut checkpoints = self.checkpoints.lock().unwrap();
        let loaded = checkpoints.get(session_id).cloned();
        if self.bump_on_load.lock().unwrap().remove(session_id) {
            if let Some(c) = checkpoints.get_mut(session_id) {
                c.version += 1;
            }
        }
        Ok(loaded)
    }

    async fn store(
        &self,
        session_id: &str,
        state: &ConversationState,
        expected_version: Option<u64>,
    ) -> Result<u64, DbError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DbError::Sqlite(rusqlite::Error::InvalidQuery));
        }
        let state: ConversationState = serde_json::from_str(&serde_json::to_string(state)?)?;

        let mut checkpoints = self.checkpoints.lock().unwrap();
        let found = checkpoints.get(session_id).map(|c| c.version);
        if found != expected_version {
            return Err(DbError::VersionConflict {
                session_id: session_id.to_string(),
                expected: expected_version,
                found,
            });
        }
        let version = expected_version.map_or(1, |v| v + 1);
        checkpoints.insert(session_id.to_string(), Checkpoint { state, version });
        Ok(version)
    }
}

// ============================================================================
// Test Engine
// ============================================================================

pub type MockEngine =
    WorkflowEngine<Arc<InMemoryCheckpointStore>, Arc<MockGenerationClient>, Arc<MockSearchClient>>;

/// Workflow engine wired to mocks, with handles to each mock
pub struct TestEngine {
    pub engine: MockEngine,
    pub store: Arc<InMemoryCheckpointStore>,
    pub generation: Arc<MockGenerationClient>,
    pub search: Arc<MockSearchClient>,
}

impl TestEngine {
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> TestEngineBuilder {
        TestEngineBuilder::default()
    }

    /// Run one message, panicking on engine errors
    pub async fn send(&self, session_id: &str, text: &str, message_type: MessageType) -> RunReply {
        self.engine
            .run(session_id, text, message_type)
            .await
            .expect("workflow run failed")
    }

    /// The persisted state for a session
    pub fn state(&self, session_id: &str) -> ConversationState {
        self.store
            .snapshot(session_id)
            .map(|c| c.state)
            .unwrap_or_default()
    }
}

#[derive(Default)]
pub struct TestEngineBuilder {
    config: EngineConfig,
}

impl TestEngineBuilder {
    pub fn policy(mut self, policy: MismatchPolicy) -> Self {
        self.config.mismatch_policy = policy;
        self
    }

    pub fn max_steps(mut self, max_steps: usize) -> Self {
        self.config.max_steps = max_steps;
        self
    }

    pub fn build(self) -> TestEngine {
        let store = Arc::new(InMemoryCheckpointStore::new());
        let generation = Arc::new(MockGenerationClient::new());
        let search = Arc::new(MockSearchClient::new());
        TestEngine {
            engine: WorkflowEngine::new(store.clone(), generation.clone(), search.clone(), self.config),
            store,
            generation,
            search,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::citations::citation_markers;
    use crate::state_machine::state::{Grade, ResponseType, Role, Status};
    use crate::state_machine::transition::{CLOSING_MESSAGE, QUIZ_DECLINED, RESTART_ACCEPTED};

    const SESSION: &str = "session-1";

    const QUESTION_B: &str = r#"{"question":"Which hormone lowers blood sugar?","choices":["Glucagon","Insulin","Adrenaline","Cortisol"],"correct_letter":"B"}"#;

    fn hit(url: &str, title: &str) -> SearchHit {
        SearchHit {
            url: Some(url.to_string()),
            title: Some(title.to_string()),
            content: Some(format!(
                "{title}: diabetes is a condition in which blood sugar stays higher than normal for long periods."
            )),
            ..SearchHit::default()
        }
    }

    /// Drive a session to the summary suspension point
    async fn at_summary(rt: &TestEngine) {
        rt.send(SESSION, "diabetes", MessageType::Topic).await;
    }

    /// Drive a session to the question, with `B` as the correct answer
    async fn at_question(rt: &TestEngine) {
        at_summary(rt).await;
        rt.generation.queue_response(QUESTION_B);
        rt.send(SESSION, "ready", MessageType::Confirmation).await;
    }

    #[tokio::test]
    async fn test_mock_generation_client() {
        let client = MockGenerationClient::new();
        client.queue_response("hello");
        assert_eq!(client.generate("sys", "p").await.unwrap(), "hello");
        assert!(client.generate("sys", "p").await.is_err());
        assert_eq!(client.recorded_requests().len(), 2);
    }

    #[tokio::test]
    async fn test_in_memory_store_versions() {
        let store = InMemoryCheckpointStore::new();
        let state = ConversationState::new();
        assert_eq!(store.store("s", &state, None).await.unwrap(), 1);
        assert_eq!(store.store("s", &state, Some(1)).await.unwrap(), 2);
        assert!(matches!(
            store.store("s", &state, Some(1)).await,
            Err(DbError::VersionConflict { .. })
        ));
    }

    // Scenario A
    #[tokio::test]
    async fn test_new_topic_with_failing_services_reaches_summary() {
        let rt = TestEngine::new().build();
        let reply = rt.send(SESSION, "diabetes", MessageType::Topic).await;

        assert_eq!(reply.status, Status::PresentingSummary);
        assert_eq!(reply.response_type, ResponseType::Confirmation);
        assert!(reply.confirmation_prompt.unwrap().requires_confirmation);

        let requests = rt.search.recorded_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].query, "diabetes");
        assert_eq!(requests[0].max_results, 8);

        let state = rt.state(SESSION);
        assert_eq!(state.topic, "diabetes");
        assert_eq!(state.citations, vec!["https://www.healthline.com".to_string()]);
        assert!(state.user_message.is_empty());
    }

    #[tokio::test]
    async fn test_new_topic_with_results_keeps_citations_aligned() {
        let rt = TestEngine::new().build();
        rt.search.queue_results(vec![
            hit("https://www.cdc.gov/diabetes", "CDC"),
            SearchHit {
                url: Some("https://www.webmd.com/short".to_string()),
                content: Some("short".to_string()),
                ..SearchHit::default()
            },
            hit("https://www.nih.gov/diabetes", "NIH"),
        ]);
        rt.generation
            .queue_response("Diabetes affects blood sugar [1]. Insulin helps [2]. Diet matters [5].");

        rt.send(SESSION, "diabetes", MessageType::Topic).await;
        let state = rt.state(SESSION);

        assert_eq!(state.search_results.len(), 2);
        assert_eq!(
            state.citations,
            vec!["https://www.cdc.gov/diabetes".to_string(), "https://www.nih.gov/diabetes".to_string()]
        );
        assert_eq!(citation_markers(&state.summary), vec![1, 2]);

        let (system, prompt) = rt.generation.recorded_requests().remove(0);
        assert!(system.contains("7th–9th grade"));
        assert!(prompt.contains("Source 2: NIH — https://www.nih.gov/diabetes"));
    }

    // Scenario B
    #[tokio::test]
    async fn test_ready_produces_question() {
        let rt = TestEngine::new().build();
        at_summary(&rt).await;
        rt.generation.queue_response(QUESTION_B);

        let reply = rt.send(SESSION, "ready", MessageType::Confirmation).await;

        assert_eq!(reply.status, Status::PresentQuestion);
        assert_eq!(reply.response_type, ResponseType::MultipleChoice);
        let question = reply.multiple_choice.unwrap();
        assert_eq!(question.choices.len(), 4);
        assert!(reply.bot_message.contains("B. Insulin"));
        assert_eq!(rt.state(SESSION).correct_answer, "Insulin");
    }

    #[tokio::test]
    async fn test_malformed_question_uses_fallback() {
        let rt = TestEngine::new().build();
        at_summary(&rt).await;
        rt.generation.queue_response("Sure! Here's a question: what is diabetes?");

        let reply = rt.send(SESSION, "ok", MessageType::Confirmation).await;
        let question = reply.multiple_choice.unwrap();
        assert_eq!(question.question, "What is one key point from the summary?");
    }

    // Scenario C
    #[tokio::test]
    async fn test_invalid_letter_suspends_without_grading() {
        let rt = TestEngine::new().build();
        at_question(&rt).await;
        let before = rt.state(SESSION);

        let reply = rt.send(SESSION, "Z", MessageType::Answer).await;
        let after = rt.state(SESSION);

        assert_eq!(reply.status, Status::PresentQuestion);
        assert!(after.grade.is_none());
        assert_eq!(after.multiple_choice, before.multiple_choice);
        assert!(reply.multiple_choice.is_some());
    }

    // Scenario D
    #[tokio::test]
    async fn test_correct_answer_is_graded() {
        let rt = TestEngine::new().build();
        at_question(&rt).await;
        rt.generation.queue_response("Insulin moves sugar into cells [1].");

        let reply = rt.send(SESSION, "b", MessageType::Answer).await;
        let state = rt.state(SESSION);

        assert_eq!(state.grade, Some(Grade::Correct));
        assert_eq!(state.user_answer, "B");
        assert_eq!(reply.status, Status::AskRestart);
        assert!(reply.bot_message.starts_with("✅ Correct! Insulin moves sugar into cells [1]."));
        assert!(reply.multiple_choice.is_none());
    }

    #[tokio::test]
    async fn test_wrong_answer_with_failed_explanation() {
        let rt = TestEngine::new().build();
        at_question(&rt).await;

        let reply = rt.send(SESSION, "A", MessageType::Answer).await;
        assert_eq!(rt.state(SESSION).grade, Some(Grade::Incorrect));
        assert!(reply.bot_message.contains("The correct answer was B: Insulin."));
    }

    // Scenario E
    #[tokio::test]
    async fn test_declining_restart_ends_session_for_good() {
        let rt = TestEngine::new().build();
        at_question(&rt).await;
        rt.send(SESSION, "B", MessageType::Answer).await;

        let reply = rt.send(SESSION, "no", MessageType::Restart).await;
        assert_eq!(reply.status, Status::Ended);
        assert_eq!(reply.bot_message, CLOSING_MESSAGE);

        let searches = rt.search.recorded_requests().len();
        let reply = rt.send(SESSION, "asthma", MessageType::Topic).await;
        assert_eq!(reply.status, Status::Ended);
        assert_eq!(reply.bot_message, CLOSING_MESSAGE);
        assert_eq!(rt.search.recorded_requests().len(), searches);
    }

    #[tokio::test]
    async fn test_restart_resets_cycle() {
        let rt = TestEngine::new().build();
        at_question(&rt).await;
        rt.send(SESSION, "B", MessageType::Answer).await;

        let reply = rt.send(SESSION, "another", MessageType::Restart).await;
        let state = rt.state(SESSION);

        assert_eq!(reply.bot_message, RESTART_ACCEPTED);
        assert_eq!(state.status, Status::CollectingTopic);
        assert!(state.topic.is_empty());
        assert!(state.summary.is_empty());
        assert!(state.multiple_choice.is_none());
        assert!(state.grade.is_none());
        assert!(!state.transcript.is_empty());

        let reply = rt.send(SESSION, "asthma", MessageType::Topic).await;
        assert_eq!(reply.status, Status::PresentingSummary);
        assert_eq!(rt.state(SESSION).topic, "asthma");
    }

    #[tokio::test]
    async fn test_declining_quiz_offers_new_topic() {
        let rt = TestEngine::new().build();
        at_summary(&rt).await;

        let reply = rt.send(SESSION, "not yet", MessageType::Confirmation).await;
        assert_eq!(reply.status, Status::AskRestart);
        assert!(reply.bot_message.starts_with(QUIZ_DECLINED));
    }

    #[tokio::test]
    async fn test_mismatch_wait_policy_changes_nothing() {
        let rt = TestEngine::new().policy(MismatchPolicy::Wait).build();
        at_question(&rt).await;
        let before = rt.state(SESSION);

        let reply = rt.send(SESSION, "yes", MessageType::Restart).await;
        let after = rt.state(SESSION);

        assert_eq!(reply.status, Status::PresentQuestion);
        assert_eq!(after.status, before.status);
        assert_eq!(after.topic, before.topic);
        assert_eq!(after.summary, before.summary);
        assert_eq!(after.multiple_choice, before.multiple_choice);
    }

    #[tokio::test]
    async fn test_mismatch_new_topic_policy_restarts() {
        let rt = TestEngine::new().build();
        at_question(&rt).await;

        let reply = rt.send(SESSION, "asthma", MessageType::Restart).await;
        assert_eq!(reply.status, Status::PresentingSummary);
        let state = rt.state(SESSION);
        assert_eq!(state.topic, "asthma");
        assert!(state.multiple_choice.is_none());
    }

    #[tokio::test]
    async fn test_rate_limited_summary_apologizes() {
        let rt = TestEngine::new().build();
        rt.generation.queue_error(LlmError::rate_limit("slow down"));

        let reply = rt.send(SESSION, "diabetes", MessageType::Topic).await;
        assert_eq!(reply.status, Status::PresentingSummary);
        assert!(reply.bot_message.starts_with(crate::state_machine::transition::SUMMARY_APOLOGY));
        assert!(!reply.bot_message.contains("slow down"));
    }

    #[tokio::test]
    async fn test_resumes_seeded_checkpoint() {
        let rt = TestEngine::new().build();
        let mut state = ConversationState::new();
        state.status = Status::PresentQuestion;
        state.topic = "diabetes".to_string();
        state.multiple_choice = Some(crate::state_machine::quiz::parse_question(QUESTION_B).unwrap());
        rt.store.seed(SESSION, state);

        let reply = rt.send(SESSION, "B", MessageType::Answer).await;
        assert_eq!(reply.status, Status::AskRestart);
        assert_eq!(rt.state(SESSION).grade, Some(Grade::Correct));
        assert_eq!(rt.store.snapshot(SESSION).unwrap().version, 2);
    }

    #[tokio::test]
    async fn test_empty_topic_reprompts() {
        let rt = TestEngine::new().build();
        let reply = rt.send(SESSION, "   ", MessageType::Topic).await;
        assert_eq!(reply.status, Status::CollectingTopic);
        assert!(rt.search.recorded_requests().is_empty());
    }

    #[tokio::test]
    async fn test_transcript_records_exchange() {
        let rt = TestEngine::new().build();
        at_summary(&rt).await;
        let roles: Vec<Role> = rt.state(SESSION).transcript.iter().map(|e| e.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant]);
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let rt = TestEngine::new().build();
        at_summary(&rt).await;
        rt.send("session-2", "migraine", MessageType::Topic).await;
        assert_eq!(rt.state(SESSION).topic, "diabetes");
        assert_eq!(rt.state("session-2").topic, "migraine");
    }
}
