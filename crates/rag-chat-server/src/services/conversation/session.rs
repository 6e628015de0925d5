use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::SessionConfig;
use crate::models::ConversationTurn;

/// Per-session memory kept by the HTTP host.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub recent_messages: Vec<ConversationTurn>,
    pub summary: Option<String>,
    pub created_at: Instant,
    pub last_activity: Instant,
}

impl SessionState {
    fn new() -> Self {
        let now = Instant::now();
        Self {
            recent_messages: Vec::new(),
            summary: None,
            created_at: now,
            last_activity: now,
        }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.last_activity.elapsed() > ttl
    }
}

/// Drop the oldest whole exchanges until at most `max_messages` remain, so
/// the window never starts on an assistant reply.
pub fn trim_window(messages: &mut Vec<ConversationTurn>, max_messages: usize) {
    let overflow = messages.len().saturating_sub(max_messages);
    let overflow = (overflow + overflow % 2).min(messages.len());
    if overflow > 0 {
        messages.drain(..overflow);
    }
}

/// Thread-safe session store (DashMap) with an idle TTL and a bounded
/// message window. The engine never sees it; handlers pass snapshots in.
#[derive(Clone)]
pub struct SessionRegistry {
    storage: Arc<DashMap<String, SessionState>>,
    /// Serializes turns within one session.
    turn_locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
    max_messages: usize,
    ttl: Duration,
}

impl SessionRegistry {
    pub fn new(max_messages: usize, ttl: Duration) -> Self {
        info!(
            "Initializing session registry (window = {} messages, ttl = {:?})",
            max_messages, ttl
        );
        Self {
            storage: Arc::new(DashMap::new()),
            turn_locks: Arc::new(DashMap::new()),
            max_messages: max_messages.max(2),
            ttl,
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.max_messages, Duration::from_secs(config.ttl_seconds))
    }

    /// Register a fresh, empty session and return its id.
    pub fn create(&self) -> String {
        let session_id = uuid::Uuid::new_v4().to_string();
        self.storage.insert(session_id.clone(), SessionState::new());
        debug!("Created session {}", session_id);
        session_id
    }

    /// Lock held by a handler from snapshot to `record_turn`, so a turn
    /// always sees the window and summary written by the previous one.
    pub fn turn_lock(&self, session_id: &str) -> Arc<Mutex<()>> {
        self.turn_locks
            .entry(session_id.to_string())
            .or_default()
            .clone()
    }

    /// Current window and summary; `None` for unknown or expired sessions.
    pub fn snapshot(&self, session_id: &str) -> Option<(Vec<ConversationTurn>, Option<String>)> {
        let entry = self.storage.get(session_id)?;

        if entry.is_expired(self.ttl) {
            drop(entry);
            self.storage.remove(session_id);
            debug!("Session {} expired, removed from registry", session_id);
            return None;
        }

        Some((entry.recent_messages.clone(), entry.summary.clone()))
    }

    /// Append one exchange, store the summary the engine returned and trim
    /// the window to the most recent `max_messages` turns.
    pub fn record_turn(
        &self,
        session_id: &str,
        question: &str,
        answer: &str,
        summary: Option<String>,
    ) {
        let mut entry = self
            .storage
            .entry(session_id.to_string())
            .or_insert_with(SessionState::new);

        entry.recent_messages.push(ConversationTurn::user(question));
        entry.recent_messages.push(ConversationTurn::assistant(answer));

        trim_window(&mut entry.recent_messages, self.max_messages);

        entry.summary = summary;
        entry.last_activity = Instant::now();

        debug!(
            "Session {} now holds {} messages",
            session_id,
            entry.recent_messages.len()
        );
    }

    /// Returns true if the session existed.
    pub fn clear(&self, session_id: &str) -> bool {
        self.turn_locks.remove(session_id);
        match self.storage.remove(session_id) {
            Some((_, state)) => {
                debug!(
                    "Session {} cleared after {:?} ({} messages)",
                    session_id,
                    state.created_at.elapsed(),
                    state.recent_messages.len()
                );
                true
            }
            None => false,
        }
    }

    /// Returns number of sessions removed
    pub fn cleanup_expired(&self) -> usize {
        let start_len = self.storage.len();
        let ttl = self.ttl;
        self.storage.retain(|_, state| !state.is_expired(ttl));
        let count = start_len.saturating_sub(self.storage.len());

        let storage = &self.storage;
        self.turn_locks
            .retain(|id, lock| storage.contains_key(id) || Arc::strong_count(lock) > 1);

        if count > 0 {
            info!("Cleaned up {} expired sessions", count);
        }

        count
    }

    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }
}
