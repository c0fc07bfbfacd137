//! # assistant-memory
//!
//! Durable conversation memory backed by SQLite. Implements the
//! `MemoryStore` contract from assistant-core with an embedded database,
//! suitable for single-process deployments that must survive restarts.

pub mod sqlite;

pub use sqlite::SqliteStore;
