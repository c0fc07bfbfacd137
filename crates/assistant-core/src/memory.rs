//! Conversation Memory
//!
//! Durable store of completed turns: supplies bounded history for a session
//! and records one immutable [`ConversationTurn`] per orchestration pass.
//! Writes are append-only; the core never updates or deletes a persisted
//! turn (retention sweeps are a maintenance operation outside the hot path).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::RwLock;

use crate::error::{AgentError, Result};
use crate::message::Message;

/// Default system prompt synthesized at the head of reconstructed history
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an AI assistant with access to various tools.

Guidelines:
1. Always be helpful, accurate, and concise
2. Use tools when they can provide better or more current information
3. Explain your reasoning when using tools
4. If you're unsure about something, say so
5. Maintain context from previous messages in the conversation";

/// A single completed turn in a conversation.
///
/// Created once per orchestration pass (success or exhausted-iteration
/// fallback) and written exactly once, after the loop terminates.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// Store-assigned identifier (None until persisted)
    pub id: Option<i64>,

    /// Owning session
    pub session_id: String,

    /// When the turn completed
    pub timestamp: DateTime<Utc>,

    /// The original user message
    pub user_message: String,

    /// The final assistant answer
    pub assistant_message: String,

    /// Tool names invoked during the turn, in dispatch order
    pub tools_used: Vec<String>,

    /// At minimum: iteration count and streamed flag
    pub metadata: HashMap<String, Value>,
}

impl ConversationTurn {
    pub fn new(
        session_id: impl Into<String>,
        user_message: impl Into<String>,
        assistant_message: impl Into<String>,
        tools_used: Vec<String>,
        metadata: HashMap<String, Value>,
    ) -> Self {
        Self {
            id: None,
            session_id: session_id.into(),
            timestamp: Utc::now(),
            user_message: user_message.into(),
            assistant_message: assistant_message.into(),
            tools_used,
            metadata,
        }
    }
}

/// Aggregate statistics for one session
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SessionStats {
    pub total_turns: u64,
    pub first_message: Option<DateTime<Utc>>,
    pub last_message: Option<DateTime<Utc>>,
    pub total_characters: u64,
    /// Per-tool invocation counts across the session
    pub tools_used: HashMap<String, u64>,
}

/// Contract every memory backend satisfies.
///
/// `save_turn` is append-only; `conversation_history` returns oldest-first
/// messages with one synthesized system prompt when requested.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Persist a turn, returning the assigned identifier
    async fn save_turn(&self, turn: ConversationTurn) -> Result<i64>;

    /// Reconstruct user/assistant message pairs from the most recent `limit`
    /// turns, oldest-first, prefixed with the system prompt when
    /// `include_system` is set.
    async fn conversation_history(
        &self,
        session_id: &str,
        limit: usize,
        include_system: bool,
    ) -> Result<Vec<Message>>;

    /// Most recent turns for a session, newest-first
    async fn recent_turns(&self, session_id: &str, limit: usize) -> Result<Vec<ConversationTurn>>;

    /// Substring search over stored user/assistant text, newest-first,
    /// optionally scoped to one session
    async fn search_turns(
        &self,
        query: &str,
        session_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ConversationTurn>>;

    /// Aggregate statistics for a session
    async fn session_stats(&self, session_id: &str) -> Result<SessionStats>;

    /// Remove turns older than the cutoff, returning the count removed.
    /// Maintenance only; never called by the orchestration loop.
    async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize>;
}

/// In-process memory store.
///
/// Used in tests and as the credential-free default; the durable SQLite
/// implementation lives in the `assistant-memory` crate.
pub struct InMemoryStore {
    turns: RwLock<Vec<ConversationTurn>>,
    next_id: AtomicI64,
    system_prompt: String,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_system_prompt(DEFAULT_SYSTEM_PROMPT)
    }

    pub fn with_system_prompt(prompt: impl Into<String>) -> Self {
        Self {
            turns: RwLock::new(Vec::new()),
            next_id: AtomicI64::new(1),
            system_prompt: prompt.into(),
        }
    }

    fn read_turns(&self) -> Result<std::sync::RwLockReadGuard<'_, Vec<ConversationTurn>>> {
        self.turns
            .read()
            .map_err(|_| AgentError::Memory("memory store lock poisoned".into()))
    }
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    async fn save_turn(&self, mut turn: ConversationTurn) -> Result<i64> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        turn.id = Some(id);

        let mut turns = self
            .turns
            .write()
            .map_err(|_| AgentError::Memory("memory store lock poisoned".into()))?;
        turns.push(turn);
        Ok(id)
    }

    async fn conversation_history(
        &self,
        session_id: &str,
        limit: usize,
        include_system: bool,
    ) -> Result<Vec<Message>> {
        let turns = self.read_turns()?;

        let recent: Vec<&ConversationTurn> = turns
            .iter()
            .filter(|t| t.session_id == session_id)
            .rev()
            .take(limit)
            .collect();

        let mut messages = Vec::with_capacity(recent.len() * 2 + 1);
        if include_system {
            messages.push(Message::system(self.system_prompt.clone()));
        }

        // Oldest first
        for turn in recent.into_iter().rev() {
            messages.push(Message::user(turn.user_message.clone()));
            messages.push(Message::assistant(turn.assistant_message.clone()));
        }

        Ok(messages)
    }

    async fn recent_turns(&self, session_id: &str, limit: usize) -> Result<Vec<ConversationTurn>> {
        let turns = self.read_turns()?;
        Ok(turns
            .iter()
            .filter(|t| t.session_id == session_id)
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }

    async fn search_turns(
        &self,
        query: &str,
        session_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ConversationTurn>> {
        let turns = self.read_turns()?;
        Ok(turns
            .iter()
            .filter(|t| session_id.is_none_or(|sid| t.session_id == sid))
            .filter(|t| t.user_message.contains(query) || t.assistant_message.contains(query))
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }

    async fn session_stats(&self, session_id: &str) -> Result<SessionStats> {
        let turns = self.read_turns()?;
        let mut stats = SessionStats::default();

        for turn in turns.iter().filter(|t| t.session_id == session_id) {
            stats.total_turns += 1;
            stats.total_characters +=
                (turn.user_message.len() + turn.assistant_message.len()) as u64;
            if stats.first_message.is_none() {
                stats.first_message = Some(turn.timestamp);
            }
            stats.last_message = Some(turn.timestamp);
            for tool in &turn.tools_used {
                *stats.tools_used.entry(tool.clone()).or_insert(0) += 1;
            }
        }

        Ok(stats)
    }

    async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut turns = self
            .turns
            .write()
            .map_err(|_| AgentError::Memory("memory store lock poisoned".into()))?;
        let before = turns.len();
        turns.retain(|t| t.timestamp >= cutoff);
        Ok(before - turns.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Role;

    fn turn(session: &str, user: &str, assistant: &str, tools: Vec<&str>) -> ConversationTurn {
        ConversationTurn::new(
            session,
            user,
            assistant,
            tools.into_iter().map(String::from).collect(),
            HashMap::new(),
        )
    }

    #[tokio::test]
    async fn test_history_is_oldest_first_with_single_system_message() {
        let store = InMemoryStore::new();
        store.save_turn(turn("s1", "first", "one", vec![])).await.unwrap();
        store.save_turn(turn("s1", "second", "two", vec![])).await.unwrap();

        let history = store.conversation_history("s1", 10, true).await.unwrap();
        assert_eq!(history.len(), 5);
        assert_eq!(history[0].role, Role::System);
        assert_eq!(
            history.iter().filter(|m| m.role == Role::System).count(),
            1
        );
        assert_eq!(history[1].content, "first");
        assert_eq!(history[3].content, "second");

        // Non-decreasing timestamps
        for pair in history.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }
    }

    #[tokio::test]
    async fn test_history_respects_limit_keeping_newest() {
        let store = InMemoryStore::new();
        for i in 0..5 {
            store
                .save_turn(turn("s1", &format!("u{i}"), &format!("a{i}"), vec![]))
                .await
                .unwrap();
        }

        let history = store.conversation_history("s1", 2, false).await.unwrap();
        assert_eq!(history.len(), 4);
        assert_eq!(history[0].content, "u3");
        assert_eq!(history[3].content, "a4");
    }

    #[tokio::test]
    async fn test_search_round_trip_preserves_tool_order() {
        let store = InMemoryStore::new();
        store
            .save_turn(turn("s1", "what is 2+2?", "it is 4", vec!["calculator", "datetime"]))
            .await
            .unwrap();

        let found = store.search_turns("2+2", None, 10).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].assistant_message, "it is 4");
        assert_eq!(found[0].tools_used, vec!["calculator", "datetime"]);
    }

    #[tokio::test]
    async fn test_search_scoped_to_session() {
        let store = InMemoryStore::new();
        store.save_turn(turn("s1", "hello there", "hi", vec![])).await.unwrap();
        store.save_turn(turn("s2", "hello again", "hi", vec![])).await.unwrap();

        let scoped = store.search_turns("hello", Some("s2"), 10).await.unwrap();
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].session_id, "s2");
    }

    #[tokio::test]
    async fn test_stats_counts_tools() {
        let store = InMemoryStore::new();
        store
            .save_turn(turn("s1", "a", "b", vec!["calculator"]))
            .await
            .unwrap();
        store
            .save_turn(turn("s1", "cd", "ef", vec!["calculator", "datetime"]))
            .await
            .unwrap();

        let stats = store.session_stats("s1").await.unwrap();
        assert_eq!(stats.total_turns, 2);
        assert_eq!(stats.total_characters, 2 + 4);
        assert_eq!(stats.tools_used.get("calculator"), Some(&2));
        assert_eq!(stats.tools_used.get("datetime"), Some(&1));
        assert!(stats.first_message.unwrap() <= stats.last_message.unwrap());
    }

    #[tokio::test]
    async fn test_prune_removes_old_turns() {
        let store = InMemoryStore::new();
        let mut old = turn("s1", "old", "old", vec![]);
        old.timestamp = Utc::now() - chrono::Duration::days(60);
        store.save_turn(old).await.unwrap();
        store.save_turn(turn("s1", "new", "new", vec![])).await.unwrap();

        let removed = store
            .prune_older_than(Utc::now() - chrono::Duration::days(30))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.recent_turns("s1", 10).await.unwrap().len(), 1);
    }
}
