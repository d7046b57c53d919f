//! Workflow execution engine
//!
//! One run per inbound message: load checkpoint, pick the entry step, run
//! steps until a router suspends, persist, reply.

use super::traits::{CheckpointStore, GenerationClient, SearchClient};
use crate::db::DbError;
use crate::llm::LlmError;
use crate::search::SearchError;
use crate::state_machine::routing::{close, reject_input};
use crate::state_machine::state::{ConfirmationPrompt, PublicQuestion, Role};
use crate::state_machine::{
    effect_for, entry_route, route, step, ConversationState, Effect, Entry, MessageType,
    MismatchPolicy, Next, Reply, ResponseType, Status, StepId,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_MAX_STEPS: usize = 50;
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(60);

/// Failures that end a run without persisting anything
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Checkpoint store failed: {0}")]
    Checkpoint(String),
    #[error("Step limit of {limit} exceeded (last step: {last_step})")]
    StepLimitExceeded { limit: usize, last_step: StepId },
    #[error("Session was updated by another request")]
    SessionBusy,
}

impl From<DbError> for EngineError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::VersionConflict { .. } => EngineError::SessionBusy,
            other => EngineError::Checkpoint(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    pub max_steps: usize,
    pub mismatch_policy: MismatchPolicy,
    pub call_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            mismatch_policy: MismatchPolicy::default(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}

/// What a run hands back to the request layer. Never carries the answer key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReply {
    pub bot_message: String,
    pub response_type: ResponseType,
    pub multiple_choice: Option<PublicQuestion>,
    pub confirmation_prompt: Option<ConfirmationPrompt>,
    pub status: Status,
}

impl RunReply {
    fn from_state(state: &ConversationState) -> Self {
        let multiple_choice = match state.response_type {
            ResponseType::MultipleChoice => state.multiple_choice.as_ref().map(|mc| mc.public_view()),
            _ => None,
        };
        let confirmation_prompt = match state.response_type {
            ResponseType::Confirmation => state.confirmation_prompt.clone(),
            _ => None,
        };
        Self {
            bot_message: state.bot_message.clone(),
            response_type: state.response_type,
            multiple_choice,
            confirmation_prompt,
            status: state.status,
        }
    }
}

/// Per-session run locks, so runs for one session never overlap in-process
#[derive(Default)]
struct SessionLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl SessionLocks {
    fn acquire<'a>(&'a self, session_id: &'a str) -> SessionLease<'a> {
        let mut locks = self.locks.lock().unwrap();
        let lock = locks.entry(session_id.to_string()).or_default().clone();
        SessionLease {
            owner: self,
            session_id,
            lock,
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().unwrap().len()
    }
}

/// A claim on one session's lock. Dropping it forgets the lock once nobody
/// else holds or waits on it, including when the run future is cancelled.
struct SessionLease<'a> {
    owner: &'a SessionLocks,
    session_id: &'a str,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl SessionLease<'_> {
    async fn lock(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.lock.lock().await
    }
}

impl Drop for SessionLease<'_> {
    fn drop(&mut self) {
        let mut locks = self.owner.locks.lock().unwrap();
        // The map and this lease are the only owners left
        if locks.get(self.session_id).is_some_and(|l| Arc::strong_count(l) == 2) {
            locks.remove(self.session_id);
        }
    }
}

/// Stateless, re-entrant workflow engine over injected collaborators
pub struct WorkflowEngine<C, G, S>
where
    C: CheckpointStore,
    G: GenerationClient,
    S: SearchClient,
{
    checkpoints: C,
    generation: G,
    search: S,
    config: EngineConfig,
    locks: SessionLocks,
}

impl<C, G, S> WorkflowEngine<C, G, S>
where
    C: CheckpointStore,
    G: GenerationClient,
    S: SearchClient,
{
    pub fn new(checkpoints: C, generation: G, search: S, config: EngineConfig) -> Self {
        Self {
            checkpoints,
            generation,
            search,
            config,
            locks: SessionLocks::default(),
        }
    }

    pub fn generation(&self) -> &G {
        &self.generation
    }

    pub fn search_client(&self) -> &S {
        &self.search
    }

    /// Process one user message for a session
    pub async fn run(
        &self,
        session_id: &str,
        user_message: &str,
        message_type: MessageType,
    ) -> Result<RunReply, EngineError> {
        let lease = self.locks.acquire(session_id);
        let _guard = lease.lock().await;
        self.run_locked(session_id, user_message, message_type).await
    }

    async fn run_locked(
        &self,
        session_id: &str,
        user_message: &str,
        message_type: MessageType,
    ) -> Result<RunReply, EngineError> {
        let checkpoint = self.checkpoints.load(session_id).await.map_err(|e| {
            tracing::error!(session_id, error = %e, "Failed to load checkpoint");
            EngineError::from(e)
        })?;
        let (mut state, version) = match checkpoint {
            Some(c) => (c.state, Some(c.version)),
            None => (ConversationState::new(), None),
        };

        state.user_message = user_message.to_string();
        state.message_type = message_type;

        let entry = entry_route(&state, self.config.mismatch_policy);
        tracing::info!(
            session_id,
            status = %state.status,
            message_type = %message_type,
            input_len = user_message.len(),
            entry = ?entry,
            "Starting workflow run"
        );

        match entry {
            Entry::Resume(first) => self.drive(session_id, &mut state, first).await?,
            Entry::Closed => close(&mut state),
            Entry::Rejected => {
                tracing::info!(session_id, status = %state.status, "Input does not fit suspended step");
                reject_input(&mut state);
            }
        }

        // Unconsumed input is stale once the run ends
        state.user_message.clear();
        if !state.bot_message.is_empty() {
            state.push_transcript(Role::Assistant, state.bot_message.clone());
        }

        let new_version = self
            .checkpoints
            .store(session_id, &state, version)
            .await
            .map_err(|e| {
                tracing::error!(session_id, error = %e, "Failed to store checkpoint");
                EngineError::from(e)
            })?;
        tracing::debug!(session_id, version = new_version, status = %state.status, "Checkpoint stored");

        Ok(RunReply::from_state(&state))
    }

    /// Run steps from `first` until a router suspends
    async fn drive(
        &self,
        session_id: &str,
        state: &mut ConversationState,
        first: StepId,
    ) -> Result<(), EngineError> {
        let mut current = first;
        for _ in 0..self.config.max_steps {
            let reply = match effect_for(current, state) {
                Some(effect) => Some(self.perform(effect).await),
                None => None,
            };
            if reply.as_ref().is_some_and(Reply::is_failure) {
                tracing::warn!(session_id, step = %current, "External call failed, using fallback content");
            }

            let outcome = step(current, state, reply);
            let next = route(current, outcome, state);
            tracing::info!(
                session_id,
                step = %current,
                status = %state.status,
                outcome = ?outcome,
                next = ?next,
                "Step executed"
            );

            match next {
                Next::Continue(id) => current = id,
                Next::Suspend => return Ok(()),
            }
        }

        tracing::error!(session_id, limit = self.config.max_steps, last_step = %current, "Step limit exceeded");
        Err(EngineError::StepLimitExceeded {
            limit: self.config.max_steps,
            last_step: current,
        })
    }

    async fn perform(&self, effect: Effect) -> Reply {
        let limit = self.config.call_timeout;
        match effect {
            Effect::Search(request) => {
                let result = tokio::time::timeout(limit, self.search.search(&request))
                    .await
                    .unwrap_or_else(|_| {
                        Err(SearchError::Http(format!("Search timed out after {}s", limit.as_secs())))
                    });
                Reply::Search(result)
            }
            Effect::Generate {
                purpose,
                system,
                prompt,
            } => {
                tracing::debug!(purpose = purpose.as_str(), prompt_len = prompt.len(), "Requesting generation");
                let result = tokio::time::timeout(limit, self.generation.generate(&system, &prompt))
                    .await
                    .unwrap_or_else(|_| Err(LlmError::timed_out(limit)));
                Reply::Generated(result)
            }
        }
    }

    #[cfg(test)]
    fn tracked_sessions(&self) -> usize {
        self.locks.len()
    }
}
