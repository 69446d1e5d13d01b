//! Per-user conversation state.
//!
//! Each user gets one [`ConversationState`] behind its own async mutex. The
//! dialogue engine holds that mutex for a whole turn, so messages from the
//! same user are handled one at a time while different users never wait on
//! each other beyond the map lookup.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ChatError;
use crate::types::PendingAction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

impl TurnRole {
    pub fn label(&self) -> &'static str {
        match self {
            TurnRole::User => "User",
            TurnRole::Assistant => "Assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub text: String,
    pub at: DateTime<Utc>,
}

/// History and the (at most one) pending action of a user.
#[derive(Debug, Clone, Default)]
pub struct ConversationState {
    history: Vec<Turn>,
    pending: Option<PendingAction>,
}

impl ConversationState {
    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    /// The last `n` turns, oldest first.
    pub fn recent(&self, n: usize) -> &[Turn] {
        let start = self.history.len().saturating_sub(n);
        &self.history[start..]
    }

    pub fn pending(&self) -> Option<&PendingAction> {
        self.pending.as_ref()
    }

    /// Replace whatever was pending.
    pub fn set_pending(&mut self, action: PendingAction) {
        self.pending = Some(action);
    }

    pub fn clear_pending(&mut self) -> Option<PendingAction> {
        self.pending.take()
    }

    /// Append a turn, keeping at most `limit` turns.
    pub fn push_turn(&mut self, role: TurnRole, text: impl Into<String>, at: DateTime<Utc>, limit: usize) {
        self.history.push(Turn {
            role,
            text: text.into(),
            at,
        });
        if self.history.len() > limit {
            let excess = self.history.len() - limit;
            self.history.drain(..excess);
        }
    }
}

const MAX_TTL_MINUTES: u64 = 60 * 24 * 365;

struct SessionEntry {
    state: Arc<tokio::sync::Mutex<ConversationState>>,
    last_seen: DateTime<Utc>,
}

/// Conversation states keyed by user id, evicted after a period of
/// inactivity.
pub struct SessionStore {
    sessions: Mutex<HashMap<String, SessionEntry>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl_minutes: u64) -> Self {
        // Capped at a year; longer is indistinguishable from "never".
        let minutes = ttl_minutes.min(MAX_TTL_MINUTES) as i64;
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl: Duration::minutes(minutes),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, SessionEntry>>, ChatError> {
        self.sessions
            .lock()
            .map_err(|e| ChatError::InvalidState(format!("session lock poisoned: {}", e)))
    }

    /// The user's session, created on first use. Marks it as seen at `now`
    /// and drops every other session idle past the TTL.
    pub fn session(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Arc<tokio::sync::Mutex<ConversationState>>, ChatError> {
        let mut sessions = self.lock()?;
        let ttl = self.ttl;
        let before = sessions.len();
        sessions.retain(|id, entry| id == user_id || now - entry.last_seen <= ttl);
        let evicted = before - sessions.len();
        if evicted > 0 {
            tracing::debug!(evicted, "Evicted idle chat sessions");
        }

        let entry = sessions
            .entry(user_id.to_string())
            .or_insert_with(|| SessionEntry {
                state: Arc::new(tokio::sync::Mutex::new(ConversationState::default())),
                last_seen: now,
            });
        if now - entry.last_seen > ttl {
            tracing::debug!(user_id, "Chat session expired, starting fresh");
            entry.state = Arc::new(tokio::sync::Mutex::new(ConversationState::default()));
        }
        entry.last_seen = now;
        Ok(Arc::clone(&entry.state))
    }

    /// Drop sessions idle past the TTL. Returns how many were removed.
    pub fn evict_expired(&self, now: DateTime<Utc>) -> Result<usize, ChatError> {
        let mut sessions = self.lock()?;
        let ttl = self.ttl;
        let before = sessions.len();
        sessions.retain(|_, entry| now - entry.last_seen <= ttl);
        Ok(before - sessions.len())
    }

    /// Snapshot of a user's pending action, without creating a session.
    pub async fn pending(&self, user_id: &str) -> Result<Option<PendingAction>, ChatError> {
        let state = {
            let sessions = self.lock()?;
            match sessions.get(user_id) {
                Some(entry) => Arc::clone(&entry.state),
                None => return Ok(None),
            }
        };
        let guard = state.lock().await;
        Ok(guard.pending().cloned())
    }

    pub fn remove(&self, user_id: &str) -> Result<bool, ChatError> {
        Ok(self.lock()?.remove(user_id).is_some())
    }

    pub fn len(&self) -> usize {
        self.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
