//! # assistant-runtime
//!
//! LLM backend adapters for assistant-core: an OpenAI-compatible adapter
//! with native function calling and SSE streaming, an Anthropic-compatible
//! adapter, a deterministic mock for offline use, and a manager that
//! discovers configured backends from the environment.

pub mod anthropic;
pub mod manager;
pub mod mock;
pub mod openai;

pub use anthropic::{AnthropicConfig, AnthropicProvider};
pub use manager::ProviderManager;
pub use mock::{MockProvider, MOCK_REPLY};
pub use openai::{OpenAiConfig, OpenAiProvider};
