//! API request and response types

use crate::db::{ChatMessage, ChatRole};
use crate::state_machine::state::{ConfirmationPrompt, PublicQuestion};
use crate::state_machine::{ResponseType, Status};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Request to send a chat message
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    pub session_id: Option<String>,
    pub message_type: Option<String>,
}

/// Bot reply for one chat message
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BotResponse {
    pub content: String,
    pub message_id: String,
    pub timestamp: DateTime<Utc>,
    pub status: Status,
    pub response_type: ResponseType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multiple_choice: Option<PublicQuestion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmation_prompt: Option<ConfirmationView>,
}

/// "Ready for the quiz?" prompt as sent to clients
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationView {
    pub message: String,
    pub requires_confirmation: bool,
}

impl From<ConfirmationPrompt> for ConfirmationView {
    fn from(p: ConfirmationPrompt) -> Self {
        Self {
            message: p.message,
            requires_confirmation: p.requires_confirmation,
        }
    }
}

/// Response for chat action
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub session_id: String,
    /// Id of the stored user message
    pub message_id: String,
    pub response: BotResponse,
}

/// One transcript message as returned to clients
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub message_id: String,
    pub sequence_id: i64,
    pub role: ChatRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl From<ChatMessage> for MessageView {
    fn from(m: ChatMessage) -> Self {
        Self {
            message_id: m.message_id,
            sequence_id: m.sequence_id,
            role: m.role,
            content: m.content,
            timestamp: m.created_at,
        }
    }
}

/// Response with a session's chat transcript
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagesResponse {
    pub session_id: String,
    pub messages: Vec<MessageView>,
}

/// Response for the health check
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
    /// Whether a generation credential is configured
    pub generation: bool,
    /// Whether a search credential is configured
    pub search: bool,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
