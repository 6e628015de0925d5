use crate::models::chat::GreetingResponse;
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    version: String,
    timestamp: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct ReadinessResponse {
    status: String,
    active_sessions: usize,
}

pub async fn health_check() -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: Utc::now(),
        }),
    )
}

pub async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<ReadinessResponse>) {
    (
        StatusCode::OK,
        Json(ReadinessResponse {
            status: "ready".to_string(),
            active_sessions: state.sessions.len(),
        }),
    )
}

pub async fn greeting_handler(State(state): State<AppState>) -> Json<GreetingResponse> {
    Json(GreetingResponse {
        message: state.greeting.to_string(),
    })
}
