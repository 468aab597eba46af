//! HTTP request handlers

use super::sse::sse_stream;
use super::types::{ChatRequest, ChatResponse, ConversationResponse, ErrorResponse, SuccessResponse};
use super::AppState;
use crate::runtime::{Command, RuntimeError};
use crate::state_machine::Event;
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
        // Lifecycle
        .route("/api/conversations/new", post(create_conversation))
        .route("/api/conversations/:id", get(get_conversation))
        .route("/api/conversations/:id/close", post(close_conversation))
        // SSE streaming
        .route("/api/conversations/:id/stream", get(stream_conversation))
        // User actions
        .route("/api/conversations/:id/chat", post(send_chat))
        .route("/api/conversations/:id/speech/toggle", post(toggle_speech))
        .route("/api/conversations/:id/speech/finished", post(speech_finished))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Lifecycle
// ============================================================

async fn create_conversation(
    State(state): State<AppState>,
) -> Result<Json<ConversationResponse>, AppError> {
    let handle = state.runtime.create().await;
    let conversation = handle.snapshot().await?;
    Ok(Json(ConversationResponse { conversation }))
}

async fn get_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ConversationResponse>, AppError> {
    let conversation = state.runtime.snapshot(&id).await?;
    Ok(Json(ConversationResponse { conversation }))
}

async fn close_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    state.runtime.close(&id).await?;
    Ok(Json(SuccessResponse { success: true }))
}

// ============================================================
// SSE Streaming
// ============================================================

async fn stream_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let handle = state.runtime.get(&id).await?;
    // Subscribe before the snapshot so nothing falls between the two
    let broadcast_rx = handle.broadcast_tx.subscribe();
    let snapshot = handle.snapshot().await?;

    Ok(sse_stream(snapshot, broadcast_rx, handle.snapshot_source()))
}

// ============================================================
// User Actions
// ============================================================

async fn send_chat(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    if req.text.trim().is_empty() {
        return Err(AppError::BadRequest("Message is empty".to_string()));
    }

    state
        .runtime
        .send(&id, Command::Dialog(Event::utterance(req.text)))
        .await?;

    Ok(Json(ChatResponse { queued: true }))
}

async fn toggle_speech(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    state.runtime.send(&id, Command::ToggleSpeech).await?;
    Ok(Json(SuccessResponse { success: true }))
}

async fn speech_finished(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    state.runtime.send(&id, Command::SpeechFinished).await?;
    Ok(Json(SuccessResponse { success: true }))
}

async fn get_version() -> &'static str {
    concat!("vera ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    NotFound(String),
    Gone(String),
}

impl From<RuntimeError> for AppError {
    fn from(err: RuntimeError) -> Self {
        match err {
            RuntimeError::NotFound(_) => AppError::NotFound(err.to_string()),
            RuntimeError::Closed(_) => AppError::Gone(err.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Gone(msg) => (StatusCode::GONE, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
