//! Entry router and step routers
//!
//! The entry router picks where a run resumes from the persisted state and
//! the newly arrived input. Step routers decide, after each step, whether
//! the pipeline continues or the run suspends.

use super::state::{ConversationState, MessageType, ResponseType, Role, Status};
use super::transition::{Decision, StepId, StepOutcome, CLOSING_MESSAGE};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// What to do with input whose type does not match the suspended step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MismatchPolicy {
    /// Treat the input as an out-of-band new topic
    #[default]
    NewTopic,
    /// Keep waiting: reply with a corrective prompt, change nothing
    Wait,
}

impl FromStr for MismatchPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "new_topic" | "new-topic" => Ok(MismatchPolicy::NewTopic),
            "wait" => Ok(MismatchPolicy::Wait),
            other => Err(format!("Unknown mismatch policy: {other}")),
        }
    }
}

/// Where a run begins
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entry {
    /// Resume the pipeline at this step
    Resume(StepId),
    /// Session has ended; no step runs
    Closed,
    /// Input type does not fit the suspended step; no step runs
    Rejected,
}

/// After a step: keep going, or hand control back to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next {
    Continue(StepId),
    Suspend,
}

/// The step that is suspended waiting for input at `status`
fn suspended_step(status: Status) -> Option<StepId> {
    match status {
        Status::PresentingSummary => Some(StepId::PresentSummary),
        Status::PresentQuestion => Some(StepId::PresentQuestion),
        Status::AskRestart => Some(StepId::HandleRestart),
        _ => None,
    }
}

pub fn entry_route(state: &ConversationState, policy: MismatchPolicy) -> Entry {
    if state.status == Status::Ended {
        return Entry::Closed;
    }

    if !state.has_input() {
        return StepId::for_status(state.status).map_or(Entry::Closed, Entry::Resume);
    }

    // A fresh or topic-collecting session takes any input as its topic
    if state.message_type == MessageType::Topic || state.status == Status::CollectingTopic {
        return Entry::Resume(StepId::CollectTopic);
    }

    if state.status.awaited_message_type() == Some(state.message_type) {
        if let Some(id) = suspended_step(state.status) {
            return Entry::Resume(id);
        }
    }

    match policy {
        MismatchPolicy::NewTopic => Entry::Resume(StepId::CollectTopic),
        MismatchPolicy::Wait => Entry::Rejected,
    }
}

/// Step router: the edge taken after `id` reported `outcome`
pub fn route(id: StepId, outcome: StepOutcome, state: &ConversationState) -> Next {
    match (id, outcome) {
        (_, StepOutcome::AwaitingInput) => Next::Suspend,

        (StepId::CollectTopic, _) => Next::Continue(StepId::Search),
        (StepId::Search, _) => {
            if state.pending_search.is_some() {
                Next::Continue(StepId::ExecuteSearchTool)
            } else {
                Next::Continue(StepId::Summarize)
            }
        }
        (StepId::ExecuteSearchTool, _) => Next::Continue(StepId::Summarize),
        (StepId::Summarize, _) => Next::Continue(StepId::PresentSummary),

        (StepId::PresentSummary, StepOutcome::Decided(Decision::Accept)) => {
            Next::Continue(StepId::GenerateQuestion)
        }
        (StepId::PresentSummary, StepOutcome::Decided(Decision::Decline)) => {
            Next::Continue(StepId::HandleRestart)
        }
        (StepId::PresentSummary, _) => Next::Suspend,

        (StepId::GenerateQuestion, _) => Next::Continue(StepId::PresentQuestion),
        (StepId::PresentQuestion, _) => {
            if state.status == Status::Evaluating {
                Next::Continue(StepId::Evaluate)
            } else {
                Next::Continue(StepId::GenerateQuestion)
            }
        }

        (StepId::Evaluate | StepId::HandleRestart, _) => Next::Suspend,
    }
}

/// Corrective prompt for input that does not fit the suspended step
pub fn corrective_prompt(status: Status) -> (&'static str, ResponseType) {
    match status {
        Status::PresentingSummary => (
            "Please confirm when you're ready for the quiz, or send a new health topic to start over.",
            ResponseType::Confirmation,
        ),
        Status::PresentQuestion => (
            "Please answer the question with a single letter: A, B, C, or D.",
            ResponseType::MultipleChoice,
        ),
        Status::AskRestart => (
            "Would you like to learn about another health topic? Reply 'yes' or 'no'.",
            ResponseType::Text,
        ),
        _ => ("Please wait a moment and try again.", ResponseType::Text),
    }
}

/// Answer input the suspended step cannot accept, leaving workflow state as is
pub fn reject_input(state: &mut ConversationState) {
    let input = state.take_user_message();
    if !input.is_empty() {
        state.push_transcript(Role::User, input);
    }
    let (message, response_type) = corrective_prompt(state.status);
    state.reply(message, response_type);
}

/// Re-display the closing message for an ended session
pub fn close(state: &mut ConversationState) {
    let input = state.take_user_message();
    if !input.is_empty() {
        state.push_transcript(Role::User, input);
    }
    state.reply(CLOSING_MESSAGE, ResponseType::Text);
}
