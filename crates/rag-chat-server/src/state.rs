use axum::extract::FromRef;
use std::sync::Arc;

use crate::config::Settings;
use crate::services::prompt::INITIAL_MESSAGE;
use crate::services::{ConversationEngine, SessionRegistry};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ConversationEngine>,
    pub sessions: Arc<SessionRegistry>,
    pub greeting: Arc<str>,
}

impl AppState {
    pub fn new(engine: ConversationEngine, sessions: SessionRegistry, greeting: impl Into<Arc<str>>) -> Self {
        Self {
            engine: Arc::new(engine),
            sessions: Arc::new(sessions),
            greeting: greeting.into(),
        }
    }

    /// Build the HTTP-backed engine and an empty session registry.
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let engine = ConversationEngine::from_settings(settings)?;
        let sessions = SessionRegistry::from_config(&settings.session);
        let greeting = settings
            .prompts
            .greeting
            .clone()
            .filter(|g| !g.trim().is_empty())
            .unwrap_or_else(|| INITIAL_MESSAGE.to_string());

        Ok(Self::new(engine, sessions, greeting))
    }
}

impl FromRef<AppState> for Arc<ConversationEngine> {
    fn from_ref(state: &AppState) -> Self {
        state.engine.clone()
    }
}

impl FromRef<AppState> for Arc<SessionRegistry> {
    fn from_ref(state: &AppState) -> Self {
        state.sessions.clone()
    }
}
