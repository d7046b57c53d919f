//! Conversation state types

use crate::search::SearchRequest;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Workflow status
// ============================================================================

/// Where a session is in the workflow. Exactly one value at rest, and it
/// names the step a run resumes at when no new input arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    CollectingTopic,
    Searching,
    Summarizing,
    #[serde(alias = "awaiting_ready_for_quiz")]
    PresentingSummary,
    #[serde(alias = "generating_question")]
    GenerateQuestion,
    #[serde(alias = "awaiting_answer")]
    PresentQuestion,
    Evaluating,
    AskRestart,
    /// Terminal. No step runs past this point.
    Ended,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::CollectingTopic => "collecting_topic",
            Status::Searching => "searching",
            Status::Summarizing => "summarizing",
            Status::PresentingSummary => "presenting_summary",
            Status::GenerateQuestion => "generate_question",
            Status::PresentQuestion => "present_question",
            Status::Evaluating => "evaluating",
            Status::AskRestart => "ask_restart",
            Status::Ended => "ended",
        }
    }

    /// The message type a session suspended at this status is waiting for,
    /// if it is waiting for one at all.
    pub fn awaited_message_type(self) -> Option<MessageType> {
        match self {
            Status::CollectingTopic => Some(MessageType::Topic),
            Status::PresentingSummary => Some(MessageType::Confirmation),
            Status::PresentQuestion => Some(MessageType::Answer),
            Status::AskRestart => Some(MessageType::Restart),
            _ => None,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Input and output classification
// ============================================================================

/// Classifies the latest user input. Set by the caller, never inferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    #[default]
    Topic,
    Confirmation,
    Answer,
    Restart,
}

impl MessageType {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageType::Topic => "topic",
            MessageType::Confirmation => "confirmation",
            MessageType::Answer => "answer",
            MessageType::Restart => "restart",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "topic" => Ok(MessageType::Topic),
            "confirmation" => Ok(MessageType::Confirmation),
            "answer" => Ok(MessageType::Answer),
            "restart" => Ok(MessageType::Restart),
            other => Err(format!("Unknown message type: {other}")),
        }
    }
}

/// Tells the presentation layer which optional payload accompanies `bot_message`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    #[default]
    Text,
    Confirmation,
    MultipleChoice,
}

// ============================================================================
// Research and quiz payloads
// ============================================================================

/// A normalized search result. List order is citation order (1-based).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub url: String,
    pub title: String,
    pub content: String,
}

/// One of the four answer letters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChoiceLetter {
    A,
    B,
    C,
    D,
}

impl ChoiceLetter {
    pub const ALL: [ChoiceLetter; 4] = [ChoiceLetter::A, ChoiceLetter::B, ChoiceLetter::C, ChoiceLetter::D];

    pub fn index(self) -> usize {
        match self {
            ChoiceLetter::A => 0,
            ChoiceLetter::B => 1,
            ChoiceLetter::C => 2,
            ChoiceLetter::D => 3,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            ChoiceLetter::A => 'A',
            ChoiceLetter::B => 'B',
            ChoiceLetter::C => 'C',
            ChoiceLetter::D => 'D',
        }
    }

    /// Case-insensitive, single character only
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'A' => Some(ChoiceLetter::A),
            'B' => Some(ChoiceLetter::B),
            'C' => Some(ChoiceLetter::C),
            'D' => Some(ChoiceLetter::D),
            _ => None,
        }
    }
}

impl fmt::Display for ChoiceLetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// The authoritative grading source. Four choices by construction, so
/// `correct_letter` always indexes validly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultipleChoice {
    pub question: String,
    pub choices: [String; 4],
    pub correct_letter: ChoiceLetter,
}

impl MultipleChoice {
    pub fn correct_choice(&self) -> &str {
        &self.choices[self.correct_letter.index()]
    }

    pub fn choice(&self, letter: ChoiceLetter) -> &str {
        &self.choices[letter.index()]
    }

    /// Client-facing view, without the answer
    pub fn public_view(&self) -> PublicQuestion {
        PublicQuestion {
            question: self.question.clone(),
            choices: self.choices.clone(),
        }
    }
}

/// Question payload safe to send to a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublicQuestion {
    pub question: String,
    pub choices: [String; 4],
}

/// "Ready for the quiz?" payload for the presentation layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationPrompt {
    pub message: String,
    pub requires_confirmation: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    Correct,
    Incorrect,
}

// ============================================================================
// Transcript
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Append-only record of exchanged messages. Never used to rebuild state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub role: Role,
    pub content: String,
}

// ============================================================================
// Conversation State
// ============================================================================

/// Everything needed to resume a session. The sole persisted entity.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationState {
    pub status: Status,
    pub message_type: MessageType,
    /// Latest raw user input. Cleared by whichever step consumes it.
    pub user_message: String,
    pub topic: String,
    pub search_results: Vec<SearchResult>,
    /// Search tool call built by the search step, consumed by the tool step
    pub pending_search: Option<SearchRequest>,
    pub summary: String,
    /// `citations[i]` is the URL behind marker `[i+1]` in `summary`
    pub citations: Vec<String>,
    /// Display text of the question with lettered choices
    pub question: String,
    /// Display text of the correct choice
    pub correct_answer: String,
    pub multiple_choice: Option<MultipleChoice>,
    pub user_answer: String,
    pub grade: Option<Grade>,
    pub explanation: String,
    pub bot_message: String,
    pub response_type: ResponseType,
    pub confirmation_prompt: Option<ConfirmationPrompt>,
    pub transcript: Vec<TranscriptEntry>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the newly arrived input for this run
    pub fn with_input(mut self, user_message: impl Into<String>, message_type: MessageType) -> Self {
        self.user_message = user_message.into();
        self.message_type = message_type;
        self
    }

    /// True when unconsumed input is waiting
    pub fn has_input(&self) -> bool {
        !self.user_message.trim().is_empty()
    }

    /// Consume the pending input. It can never be read a second time.
    pub fn take_user_message(&mut self) -> String {
        std::mem::take(&mut self.user_message).trim().to_string()
    }

    pub fn push_transcript(&mut self, role: Role, content: impl Into<String>) {
        self.transcript.push(TranscriptEntry {
            role,
            content: content.into(),
        });
    }

    /// Set the single outbound message for this turn
    pub fn reply(&mut self, message: impl Into<String>, response_type: ResponseType) {
        self.bot_message = message.into();
        self.response_type = response_type;
    }

    /// Drop everything derived from the current topic cycle
    pub fn clear_cycle(&mut self) {
        self.search_results.clear();
        self.pending_search = None;
        self.summary.clear();
        self.citations.clear();
        self.question.clear();
        self.correct_answer.clear();
        self.multiple_choice = None;
        self.user_answer.clear();
        self.grade = None;
        self.explanation.clear();
        self.confirmation_prompt = None;
    }

    /// Return to the initial shape. Transcript is preserved.
    pub fn reset_for_restart(&mut self) {
        self.clear_cycle();
        self.topic.clear();
        self.user_message.clear();
        self.status = Status::CollectingTopic;
        self.response_type = ResponseType::Text;
    }
}
