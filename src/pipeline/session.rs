// Conversation sessions
//
// One entry per (user, session) pair holding the recent turns used for
// classification context and handoff summaries.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time;

use crate::handoff::{ConversationTurn, TurnRole};

/// Turns kept per session
pub const MAX_HISTORY: usize = 40;

#[derive(Debug, Clone)]
pub struct SupportSession {
    pub user_id: String,
    pub session_id: String,
    pub history: VecDeque<ConversationTurn>,
    /// User messages seen, including ones aged out of history
    pub message_count: usize,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl SupportSession {
    fn new(user_id: &str, session_id: &str) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
            history: VecDeque::with_capacity(MAX_HISTORY),
            message_count: 0,
            created_at: now,
            last_activity: now,
        }
    }

    fn push(&mut self, turn: ConversationTurn) {
        if turn.role == TurnRole::User {
            self.message_count += 1;
        }
        if self.history.len() >= MAX_HISTORY {
            self.history.pop_front();
        }
        self.history.push_back(turn);
        self.last_activity = Utc::now();
    }

    pub fn is_expired(&self, timeout_minutes: u64) -> bool {
        let elapsed = Utc::now().signed_duration_since(self.last_activity);
        elapsed.num_minutes() >= timeout_minutes as i64
    }

    /// Last `n` user messages, oldest first
    pub fn recent_user_messages(&self, n: usize) -> Vec<String> {
        let mut recent: Vec<String> = self
            .history
            .iter()
            .rev()
            .filter(|t| t.role == TurnRole::User)
            .take(n)
            .map(|t| t.text.clone())
            .collect();
        recent.reverse();
        recent
    }
}

fn session_key(user_id: &str, session_id: &str) -> String {
    format!("{}:{}", user_id, session_id)
}

/// Concurrent session store
pub struct SessionManager {
    sessions: Arc<DashMap<String, SupportSession>>,
    max_sessions: usize,
    timeout_minutes: u64,
}

impl SessionManager {
    pub fn new(max_sessions: usize, timeout_minutes: u64) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            max_sessions: max_sessions.max(1),
            timeout_minutes,
        }
    }

    /// Append turns to a session, creating it if needed
    ///
    /// At capacity the least recently active session is evicted.
    pub fn record_turns(&self, user_id: &str, session_id: &str, turns: Vec<ConversationTurn>) -> SupportSession {
        let key = session_key(user_id, session_id);

        if !self.sessions.contains_key(&key) && self.sessions.len() >= self.max_sessions {
            self.evict_oldest();
        }

        let mut entry = self
            .sessions
            .entry(key)
            .or_insert_with(|| {
                tracing::debug!(user_id, session_id, "Created new session");
                SupportSession::new(user_id, session_id)
            });
        for turn in turns {
            entry.push(turn);
        }
        entry.clone()
    }

    fn evict_oldest(&self) {
        let oldest = self
            .sessions
            .iter()
            .min_by_key(|entry| entry.value().last_activity)
            .map(|entry| entry.key().clone());

        if let Some(key) = oldest {
            self.sessions.remove(&key);
            tracing::info!(session = %key, "Evicted least recently active session");
        }
    }

    pub fn get(&self, user_id: &str, session_id: &str) -> Option<SupportSession> {
        self.sessions
            .get(&session_key(user_id, session_id))
            .map(|entry| entry.value().clone())
    }

    pub fn history(&self, user_id: &str, session_id: &str) -> Vec<ConversationTurn> {
        self.get(user_id, session_id)
            .map(|s| s.history.into_iter().collect())
            .unwrap_or_default()
    }

    pub fn delete(&self, user_id: &str, session_id: &str) -> bool {
        self.sessions.remove(&session_key(user_id, session_id)).is_some()
    }

    pub fn active_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn clear(&self) {
        self.sessions.clear();
    }

    /// Drop expired sessions; returns how many were removed
    pub fn cleanup_expired(&self) -> usize {
        remove_expired(&self.sessions, self.timeout_minutes)
    }

    /// Sweep expired sessions once a minute
    pub fn spawn_cleanup_task(&self) -> JoinHandle<()> {
        let sessions = Arc::clone(&self.sessions);
        let timeout_minutes = self.timeout_minutes;

        tokio::spawn(async move {
            let mut interval = time::interval(Duration::from_secs(60));
            loop {
                interval.tick().await;
                remove_expired(&sessions, timeout_minutes);
            }
        })
    }
}

fn remove_expired(sessions: &DashMap<String, SupportSession>, timeout_minutes: u64) -> usize {
    let expired: Vec<String> = sessions
        .iter()
        .filter(|entry| entry.value().is_expired(timeout_minutes))
        .map(|entry| entry.key().clone())
        .collect();

    let mut removed = 0;
    for key in expired {
        if sessions.remove(&key).is_some() {
            removed += 1;
            tracing::debug!(session = %key, "Removed expired session");
        }
    }

    if removed > 0 {
        tracing::info!(removed, active = sessions.len(), "Cleaned up expired sessions");
    }
    removed
}
