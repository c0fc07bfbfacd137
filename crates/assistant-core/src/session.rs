//! Session Management
//!
//! Live session state owned by the orchestration layer. Memory owns only
//! persisted turns; sessions here track activity and arbitrary context for
//! in-flight conversations.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

/// Unique session identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A live conversation session
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    /// Unique identifier
    pub id: SessionId,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last activity timestamp
    pub last_activity: DateTime<Utc>,

    /// Arbitrary per-session context
    pub context: HashMap<String, Value>,
}

impl Session {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            created_at: now,
            last_activity: now,
            context: HashMap::new(),
        }
    }

    pub fn with_id(id: SessionId) -> Self {
        let mut session = Self::new();
        session.id = id;
        session
    }

    /// Update the activity timestamp
    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    /// Time since last activity
    pub fn idle_for(&self) -> Duration {
        Utc::now() - self.last_activity
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks live sessions for the orchestration layer.
///
/// Sessions are never deleted by the loop itself; stale entries are removed
/// by the external [`SessionManager::cleanup_inactive`] sweep.
pub struct SessionManager {
    sessions: RwLock<HashMap<SessionId, Session>>,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Create a new session and return its id
    pub fn create(&self) -> SessionId {
        let session = Session::new();
        let id = session.id.clone();
        if let Ok(mut sessions) = self.sessions.write() {
            sessions.insert(id.clone(), session);
        }
        id
    }

    /// Adopt an externally supplied session id, creating state on first use
    pub fn ensure(&self, id: &SessionId) {
        if let Ok(mut sessions) = self.sessions.write() {
            sessions
                .entry(id.clone())
                .or_insert_with(|| Session::with_id(id.clone()));
        }
    }

    /// Get a snapshot of a session
    pub fn get(&self, id: &SessionId) -> Option<Session> {
        self.sessions.read().ok()?.get(id).cloned()
    }

    /// Update last activity for a session
    pub fn touch(&self, id: &SessionId) {
        if let Ok(mut sessions) = self.sessions.write() {
            if let Some(session) = sessions.get_mut(id) {
                session.touch();
            }
        }
    }

    /// Set a context value on a session
    pub fn set_context(&self, id: &SessionId, key: impl Into<String>, value: Value) {
        if let Ok(mut sessions) = self.sessions.write() {
            if let Some(session) = sessions.get_mut(id) {
                session.context.insert(key.into(), value);
            }
        }
    }

    /// Number of live sessions
    pub fn len(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove sessions idle longer than `max_idle`, returning the count.
    /// Time-boxed external sweep, not part of the orchestration loop.
    pub fn cleanup_inactive(&self, max_idle: Duration) -> usize {
        let Ok(mut sessions) = self.sessions.write() else {
            return 0;
        };
        let before = sessions.len();
        sessions.retain(|_, session| session.idle_for() <= max_idle);
        before - sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_creation() {
        let manager = SessionManager::new();
        let id = manager.create();
        let session = manager.get(&id).unwrap();
        assert_eq!(session.id, id);
        assert!(session.context.is_empty());
    }

    #[test]
    fn test_ensure_is_idempotent() {
        let manager = SessionManager::new();
        let id = SessionId::from_string("external-1");
        manager.ensure(&id);
        manager.set_context(&id, "user", serde_json::json!("alice"));
        manager.ensure(&id);

        let session = manager.get(&id).unwrap();
        assert_eq!(session.context.get("user"), Some(&serde_json::json!("alice")));
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_touch_advances_activity() {
        let manager = SessionManager::new();
        let id = manager.create();
        let created = manager.get(&id).unwrap().last_activity;
        manager.touch(&id);
        assert!(manager.get(&id).unwrap().last_activity >= created);
    }

    #[test]
    fn test_cleanup_inactive() {
        let manager = SessionManager::new();
        let stale = manager.create();
        if let Ok(mut sessions) = manager.sessions.write() {
            if let Some(session) = sessions.get_mut(&stale) {
                session.last_activity = Utc::now() - Duration::hours(48);
            }
        }
        let fresh = manager.create();

        let removed = manager.cleanup_inactive(Duration::hours(24));
        assert_eq!(removed, 1);
        assert!(manager.get(&stale).is_none());
        assert!(manager.get(&fresh).is_some());
    }
}
