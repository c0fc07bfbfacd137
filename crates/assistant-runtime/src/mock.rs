//! Mock Provider
//!
//! Deterministic offline backend used when no API key is configured and
//! for exercising the agent loop in tests.

use std::collections::HashMap;

use assistant_core::{
    error::Result,
    message::Message,
    provider::{ChatOutcome, CompletionStream, GenerationOptions, LlmProvider, StreamChunk},
    tool::{ToolCall, ToolSchema},
};
use async_trait::async_trait;
use futures::stream;
use serde_json::{json, Value};

/// Canned reply for plain completions
pub const MOCK_REPLY: &str =
    "I'm a mock AI assistant. Please configure your API keys to use real LLM providers.";

/// Offline stand-in provider
#[derive(Clone, Copy, Debug, Default)]
pub struct MockProvider;

impl MockProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(
        &self,
        _messages: &[Message],
        tools: Option<&[ToolSchema]>,
        _options: &GenerationOptions,
    ) -> Result<ChatOutcome> {
        // With tools advertised, request the first one so the full loop runs
        if let Some(schema) = tools.and_then(|schemas| schemas.first()) {
            let mut arguments: HashMap<String, Value> = HashMap::new();
            if schema.name == "calculator" {
                arguments.insert("expression".into(), json!("2+2"));
            }
            return Ok(ChatOutcome::ToolCall(ToolCall::new(
                schema.name.clone(),
                arguments,
            )));
        }

        Ok(ChatOutcome::Text(MOCK_REPLY.to_string()))
    }

    async fn complete_stream(
        &self,
        _messages: &[Message],
        _options: &GenerationOptions,
    ) -> Result<CompletionStream> {
        let mut chunks: Vec<Result<StreamChunk>> = MOCK_REPLY
            .split_inclusive(' ')
            .map(|word| Ok(StreamChunk::delta(word)))
            .collect();
        chunks.push(Ok(StreamChunk::done()));

        Ok(Box::pin(stream::iter(chunks)))
    }
}
