//! # assistant-core
//!
//! Core agent orchestration with provider-agnostic LLM abstraction,
//! declarative tool system and conversation memory.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         Agent                                │
//! │  ┌───────────────┐  ┌─────────────┐  ┌───────────────────┐   │
//! │  │ Orchestration │  │    Tool     │  │   LlmProvider     │   │
//! │  │     Loop      │──│   Registry  │──│   (adapters)      │   │
//! │  └───────┬───────┘  └─────────────┘  └───────────────────┘   │
//! │          │                                                   │
//! │  ┌───────┴───────┐                                           │
//! │  │  MemoryStore  │  one ConversationTurn per pass            │
//! │  └───────────────┘                                           │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `LlmProvider` trait enables swapping between OpenAI-style,
//! Anthropic-style or mock backends without changing agent logic; the
//! loop never special-cases which backend is active.

pub mod error;
pub mod memory;
pub mod message;
pub mod orchestrator;
pub mod provider;
pub mod session;
pub mod tool;

pub use error::{AgentError, Result};
pub use memory::{ConversationTurn, InMemoryStore, MemoryStore, SessionStats};
pub use message::{Message, Role};
pub use orchestrator::{Agent, AgentBuilder, AgentConfig, MAX_ITERATIONS_MESSAGE};
pub use provider::{ChatOutcome, GenerationOptions, LlmProvider};
pub use session::{Session, SessionId, SessionManager};
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult, ToolSchema};
