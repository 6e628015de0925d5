use crate::models::chat::*;
use crate::services::{ConversationEngine, SessionRegistry};
use crate::utils::error::ApiError;
use crate::utils::text::normalize_question;
use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;
use tracing::info;

/// Stateless turn: the caller owns the window and the summary.
pub async fn chat_handler(
    State(engine): State<Arc<ConversationEngine>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let question = normalize_question(&request.question)
        .ok_or_else(|| ApiError::BadRequest("question must not be empty".to_string()))?;
    let recent_messages = request.recent_messages.unwrap_or_default();

    info!(
        "Chat request: question_len={}, recent_messages={}, has_summary={}",
        question.len(),
        recent_messages.len(),
        request.summary.is_some()
    );

    let result = engine
        .chat(question, &recent_messages, request.summary)
        .await?;

    Ok(Json(result.into()))
}

/// Server-side memory: the window and summary live in the session registry.
/// Unknown session ids start empty and are registered on their first turn.
/// Turns on one session run one at a time.
pub async fn session_chat_handler(
    State(engine): State<Arc<ConversationEngine>>,
    State(sessions): State<Arc<SessionRegistry>>,
    Path(session_id): Path<String>,
    Json(request): Json<SessionChatRequest>,
) -> Result<Json<SessionChatResponse>, ApiError> {
    let question = normalize_question(&request.question)
        .ok_or_else(|| ApiError::BadRequest("question must not be empty".to_string()))?;

    let turn_lock = sessions.turn_lock(&session_id);
    let _turn = turn_lock.lock().await;

    let (recent_messages, summary) = sessions.snapshot(&session_id).unwrap_or_default();

    info!(
        "Session chat: session={}, question_len={}, recent_messages={}",
        session_id,
        question.len(),
        recent_messages.len()
    );

    let result = engine.chat(question, &recent_messages, summary).await?;

    sessions.record_turn(
        &session_id,
        question,
        &result.answer,
        result.updated_summary.clone(),
    );

    Ok(Json(SessionChatResponse {
        session_id,
        answer: result.answer,
        updated_summary: result.updated_summary,
    }))
}
