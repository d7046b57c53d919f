//! HTTP request handlers

use super::types::{
    BotResponse, ChatRequest, ChatResponse, ConfirmationView, ErrorResponse, HealthResponse,
    MessageView, MessagesResponse,
};
use super::AppState;
use crate::db::ChatRole;
use crate::runtime::EngineError;
use crate::state_machine::MessageType;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/chat", post(send_chat))
        .route("/api/sessions/:id/messages", get(get_messages))
        .with_state(state)
}

// ============================================================
// Health
// ============================================================

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let (generation, search) = state.workflow.configured();
    Json(HealthResponse {
        status: "healthy",
        message: "HealthBot API is running",
        generation,
        search,
    })
}

// ============================================================
// Chat
// ============================================================

async fn send_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let message = req.message.trim();
    if message.is_empty() {
        return Err(AppError::BadRequest("Message content is required".to_string()));
    }

    let message_type = match req.message_type.as_deref() {
        Some(raw) => raw.parse::<MessageType>().map_err(AppError::BadRequest)?,
        None => MessageType::Topic,
    };

    let session_id = req
        .session_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let user_msg = state
        .transcripts
        .add_chat_message(&session_id, ChatRole::User, message)
        .await
        .map_err(|e| {
            tracing::error!(session_id = %session_id, error = %e, "Failed to store user message");
            AppError::Internal("Failed to store message".to_string())
        })?;

    let reply = state
        .workflow
        .run(&session_id, message, message_type)
        .await
        .map_err(|e| {
            tracing::error!(session_id = %session_id, error = %e, "Workflow run failed");
            AppError::from(e)
        })?;

    let bot_msg = state
        .transcripts
        .add_chat_message(&session_id, ChatRole::Bot, &reply.bot_message)
        .await
        .map_err(|e| {
            tracing::error!(session_id = %session_id, error = %e, "Failed to store bot message");
            AppError::Internal("Failed to store message".to_string())
        })?;

    Ok(Json(ChatResponse {
        session_id,
        message_id: user_msg.message_id,
        response: BotResponse {
            content: reply.bot_message,
            message_id: bot_msg.message_id,
            timestamp: bot_msg.created_at,
            status: reply.status,
            response_type: reply.response_type,
            multiple_choice: reply.multiple_choice,
            confirmation_prompt: reply.confirmation_prompt.map(ConfirmationView::from),
        },
    }))
}

// ============================================================
// Transcript
// ============================================================

async fn get_messages(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<MessagesResponse>, AppError> {
    let messages = state
        .transcripts
        .get_chat_messages(&session_id)
        .await
        .map_err(AppError::Internal)?;

    Ok(Json(MessagesResponse {
        session_id,
        messages: messages.into_iter().map(MessageView::from).collect(),
    }))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    Conflict(String),
    Internal(String),
}

impl From<EngineError> for AppError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::SessionBusy => {
                AppError::Conflict("This session is busy. Please try again.".to_string())
            }
            EngineError::Checkpoint(_) | EngineError::StepLimitExceeded { .. } => {
                AppError::Internal("Workflow execution failed".to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
