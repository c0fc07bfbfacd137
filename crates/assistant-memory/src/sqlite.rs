//! SQLite Memory Store
//!
//! Single-connection store guarded by a mutex; all database work runs on
//! the blocking pool so the async loop never stalls on disk I/O. Turns are
//! append-only rows in the `conversations` table, with tool lists and
//! metadata serialized as JSON text columns.

use std::path::Path;
use std::sync::{Arc, Mutex};

use assistant_core::{
    error::{AgentError, Result},
    memory::{ConversationTurn, MemoryStore, SessionStats, DEFAULT_SYSTEM_PROMPT},
    message::Message,
};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, Row};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS conversations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    user_message TEXT NOT NULL,
    assistant_message TEXT NOT NULL,
    tools_used TEXT NOT NULL,
    metadata TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_conversations_session ON conversations(session_id);
CREATE INDEX IF NOT EXISTS idx_conversations_timestamp ON conversations(timestamp);
";

/// Durable conversation memory backed by SQLite
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    system_prompt: String,
}

impl SqliteStore {
    /// Open (creating if necessary) a database file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(sql_err)?;
        Self::from_connection(conn, DEFAULT_SYSTEM_PROMPT)
    }

    /// Open a database file with a custom system prompt
    pub fn open_with_system_prompt(
        path: impl AsRef<Path>,
        prompt: impl Into<String>,
    ) -> Result<Self> {
        let conn = Connection::open(path).map_err(sql_err)?;
        Self::from_connection(conn, prompt)
    }

    /// Private in-memory database, mostly for tests
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(sql_err)?;
        Self::from_connection(conn, DEFAULT_SYSTEM_PROMPT)
    }

    fn from_connection(conn: Connection, prompt: impl Into<String>) -> Result<Self> {
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(sql_err)?;
        conn.busy_timeout(std::time::Duration::from_secs(5))
            .map_err(sql_err)?;
        conn.execute_batch(SCHEMA).map_err(sql_err)?;

        tracing::debug!("sqlite memory store initialized");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            system_prompt: prompt.into(),
        })
    }

    /// Run a closure against the connection on the blocking pool
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| AgentError::Memory("sqlite connection lock poisoned".into()))?;
            f(&guard)
        })
        .await
        .map_err(|e| AgentError::Memory(format!("blocking task failed: {e}")))?
    }
}

fn sql_err(e: rusqlite::Error) -> AgentError {
    AgentError::Memory(e.to_string())
}

fn encode_timestamp(ts: DateTime<Utc>) -> String {
    // Fixed-width RFC 3339 so lexical comparison matches chronological order
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn row_to_turn(row: &Row<'_>) -> Result<ConversationTurn> {
    let timestamp: String = row.get(2).map_err(sql_err)?;
    let tools_used: String = row.get(5).map_err(sql_err)?;
    let metadata: String = row.get(6).map_err(sql_err)?;

    Ok(ConversationTurn {
        id: Some(row.get(0).map_err(sql_err)?),
        session_id: row.get(1).map_err(sql_err)?,
        timestamp: DateTime::parse_from_rfc3339(&timestamp)
            .map_err(|e| AgentError::Memory(format!("corrupt timestamp column: {e}")))?
            .with_timezone(&Utc),
        user_message: row.get(3).map_err(sql_err)?,
        assistant_message: row.get(4).map_err(sql_err)?,
        tools_used: serde_json::from_str(&tools_used)
            .map_err(|e| AgentError::Memory(format!("corrupt tools_used column: {e}")))?,
        metadata: serde_json::from_str(&metadata)
            .map_err(|e| AgentError::Memory(format!("corrupt metadata column: {e}")))?,
    })
}

const TURN_COLUMNS: &str =
    "id, session_id, timestamp, user_message, assistant_message, tools_used, metadata";

fn query_turns(
    conn: &Connection,
    sql: &str,
    params: &[&dyn rusqlite::ToSql],
) -> Result<Vec<ConversationTurn>> {
    let mut stmt = conn.prepare(sql).map_err(sql_err)?;
    let mut rows = stmt.query(params).map_err(sql_err)?;

    let mut turns = Vec::new();
    while let Some(row) = rows.next().map_err(sql_err)? {
        turns.push(row_to_turn(row)?);
    }
    Ok(turns)
}

#[async_trait]
impl MemoryStore for SqliteStore {
    async fn save_turn(&self, turn: ConversationTurn) -> Result<i64> {
        self.with_conn(move |conn| {
            let tools_used = serde_json::to_string(&turn.tools_used)
                .map_err(|e| AgentError::Memory(e.to_string()))?;
            let metadata = serde_json::to_string(&turn.metadata)
                .map_err(|e| AgentError::Memory(e.to_string()))?;

            conn.execute(
                "INSERT INTO conversations \
                 (session_id, timestamp, user_message, assistant_message, tools_used, metadata) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    turn.session_id,
                    encode_timestamp(turn.timestamp),
                    turn.user_message,
                    turn.assistant_message,
                    tools_used,
                    metadata,
                ],
            )
            .map_err(sql_err)?;

            Ok(conn.last_insert_rowid())
        })
        .await
    }

    async fn conversation_history(
        &self,
        session_id: &str,
        limit: usize,
        include_system: bool,
    ) -> Result<Vec<Message>> {
        let mut turns = self.recent_turns(session_id, limit).await?;
        turns.reverse();

        let mut messages = Vec::with_capacity(turns.len() * 2 + 1);
        if include_system {
            messages.push(Message::system(self.system_prompt.clone()));
        }
        for turn in turns {
            messages.push(Message::user(turn.user_message));
            messages.push(Message::assistant(turn.assistant_message));
        }
        Ok(messages)
    }

    async fn recent_turns(&self, session_id: &str, limit: usize) -> Result<Vec<ConversationTurn>> {
        let session_id = session_id.to_string();
        let limit = limit as i64;

        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {TURN_COLUMNS} FROM conversations \
                 WHERE session_id = ?1 ORDER BY id DESC LIMIT ?2"
            );
            query_turns(conn, &sql, &[&session_id, &limit])
        })
        .await
    }

    async fn search_turns(
        &self,
        query: &str,
        session_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ConversationTurn>> {
        let pattern = format!("%{query}%");
        let session_id = session_id.map(str::to_string);
        let limit = limit as i64;

        self.with_conn(move |conn| match session_id {
            Some(sid) => {
                let sql = format!(
                    "SELECT {TURN_COLUMNS} FROM conversations \
                     WHERE session_id = ?1 \
                     AND (user_message LIKE ?2 OR assistant_message LIKE ?2) \
                     ORDER BY id DESC LIMIT ?3"
                );
                query_turns(conn, &sql, &[&sid, &pattern, &limit])
            }
            None => {
                let sql = format!(
                    "SELECT {TURN_COLUMNS} FROM conversations \
                     WHERE user_message LIKE ?1 OR assistant_message LIKE ?1 \
                     ORDER BY id DESC LIMIT ?2"
                );
                query_turns(conn, &sql, &[&pattern, &limit])
            }
        })
        .await
    }

    async fn session_stats(&self, session_id: &str) -> Result<SessionStats> {
        let session_id = session_id.to_string();

        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {TURN_COLUMNS} FROM conversations \
                 WHERE session_id = ?1 ORDER BY id ASC"
            );
            let turns = query_turns(conn, &sql, &[&session_id])?;

            let mut stats = SessionStats::default();
            for turn in &turns {
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
        })
        .await
    }

    async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let cutoff = encode_timestamp(cutoff);

        let removed = self
            .with_conn(move |conn| {
                conn.execute(
                    "DELETE FROM conversations WHERE timestamp < ?1",
                    params![cutoff],
                )
                .map_err(sql_err)
            })
            .await?;

        if removed > 0 {
            tracing::info!(removed, "pruned expired conversation turns");
        }
        Ok(removed)
    }
}
