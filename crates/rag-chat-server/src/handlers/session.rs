use crate::models::chat::SessionCreated;
use crate::services::SessionRegistry;
use crate::utils::error::ApiError;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use tracing::info;

pub async fn create_session_handler(
    State(sessions): State<Arc<SessionRegistry>>,
) -> (StatusCode, Json<SessionCreated>) {
    let session_id = sessions.create();
    info!("Session {} created ({} active)", session_id, sessions.len());
    (StatusCode::CREATED, Json(SessionCreated { session_id }))
}

pub async fn delete_session_handler(
    State(sessions): State<Arc<SessionRegistry>>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if sessions.clear(&session_id) {
        info!("Session {} cleared", session_id);
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("session {}", session_id)))
    }
}
