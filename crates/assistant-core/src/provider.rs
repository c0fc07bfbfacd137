//! LLM Provider Abstraction
//!
//! Defines a common interface for all LLM backends, normalizing "did the
//! model ask to call a tool, or did it answer in text" into one discriminated
//! result for both one-shot and streamed completions. Message translation is
//! each adapter's private responsibility and never leaks into the loop.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use assistant_core::provider::{ChatOutcome, LlmProvider};
//!
//! match provider.complete(&messages, Some(&schemas), &options).await? {
//!     ChatOutcome::Text(answer) => println!("{answer}"),
//!     ChatOutcome::ToolCall(call) => dispatch(call),
//! }
//! ```

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

use crate::error::Result;
use crate::message::Message;
use crate::tool::{ToolCall, ToolSchema};

/// Configuration for LLM generation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Model identifier (e.g., "gpt-4-turbo-preview", "claude-3-sonnet")
    pub model: String,

    /// Temperature for sampling (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Top-p nucleus sampling
    #[serde(default = "default_top_p")]
    pub top_p: f32,

    /// Stop sequences
    #[serde(default)]
    pub stop_sequences: Vec<String>,
}

fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4000
}
fn default_top_p() -> f32 {
    0.9
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            model: "gpt-4-turbo-preview".into(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            top_p: default_top_p(),
            stop_sequences: Vec::new(),
        }
    }
}

/// Outcome of one completion round trip.
///
/// A proper discriminated union: the backend either answered in text or
/// elected to invoke a tool, never both.
#[derive(Clone, Debug)]
pub enum ChatOutcome {
    /// Final natural-language answer
    Text(String),

    /// Structured request to invoke a tool
    ToolCall(ToolCall),
}

/// A chunk from streaming completion
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StreamChunk {
    /// The text delta
    pub delta: String,

    /// Whether this is the final chunk
    pub done: bool,
}

impl StreamChunk {
    pub fn delta(text: impl Into<String>) -> Self {
        Self {
            delta: text.into(),
            done: false,
        }
    }

    pub fn done() -> Self {
        Self {
            delta: String::new(),
            done: true,
        }
    }
}

/// Stream type for completion streaming. Finite and not restartable.
pub type CompletionStream = Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send>>;

/// Strategy trait for LLM providers
///
/// Implement this trait to add support for new backends. The orchestration
/// loop works exclusively through this interface and must not special-case
/// which backend is active. Backends without native tool calling simply
/// never return [`ChatOutcome::ToolCall`].
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Logical provider name (used by the manager for routing)
    fn name(&self) -> &str;

    /// Generate a completion from messages.
    ///
    /// `tools` advertises the registry's current schemas; whether to invoke
    /// one is the backend's own policy. Sequences must begin with at most
    /// one system message.
    async fn complete(
        &self,
        messages: &[Message],
        tools: Option<&[ToolSchema]>,
        options: &GenerationOptions,
    ) -> Result<ChatOutcome>;

    /// Generate a streaming completion.
    ///
    /// Defined only for the final text-answer path. A backend that cannot
    /// stream natively may produce the whole answer as a single fragment.
    async fn complete_stream(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> Result<CompletionStream>;

    /// Estimate token count for text (provider-specific tokenization)
    fn estimate_tokens(&self, text: &str) -> u32 {
        // Default: rough estimate of ~4 chars per token
        (text.len() / 4) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_options_defaults() {
        let opts = GenerationOptions::default();
        assert_eq!(opts.temperature, 0.7);
        assert_eq!(opts.max_tokens, 4000);
        assert!(opts.stop_sequences.is_empty());
    }

    #[test]
    fn test_stream_chunk_constructors() {
        let chunk = StreamChunk::delta("Hel");
        assert_eq!(chunk.delta, "Hel");
        assert!(!chunk.done);
        assert!(StreamChunk::done().done);
    }
}
