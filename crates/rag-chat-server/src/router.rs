use axum::{
    http::HeaderValue,
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, TraceLayer},
};
use tracing::warn;

use crate::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState, allowed_origins: &[String]) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/health/ready", get(handlers::health::readiness_check));

    let chat_routes = Router::new()
        .route("/chat", post(handlers::chat::chat_handler))
        .route("/api/greeting", get(handlers::health::greeting_handler))
        .route("/api/sessions", post(handlers::session::create_session_handler))
        .route(
            "/api/sessions/{session_id}",
            delete(handlers::session::delete_session_handler),
        )
        .route(
            "/api/sessions/{session_id}/chat",
            post(handlers::chat::session_chat_handler),
        );

    Router::new()
        .merge(public_routes)
        .merge(chat_routes)
        .with_state(state)
        .layer(cors_layer(allowed_origins))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(true)),
        )
}

/// `*` (or no entries) allows any origin.
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if allowed_origins.is_empty() || allowed_origins.iter().any(|o| o.trim() == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.trim().parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring invalid CORS origin {:?}: {}", origin, e);
                None
            }
        })
        .collect();

    layer.allow_origin(origins)
}
