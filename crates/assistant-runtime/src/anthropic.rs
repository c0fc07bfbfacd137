//! Anthropic-style Provider
//!
//! Adapter against an Anthropic-compatible messages API. This backend has
//! no native function-calling path in this adapter, so every completion
//! resolves to a text outcome; tool traffic in the transcript is folded
//! into plain text the model can still read.

use assistant_core::{
    error::{AgentError, Result},
    message::{Message, Role},
    provider::{ChatOutcome, CompletionStream, GenerationOptions, LlmProvider, StreamChunk},
    tool::ToolSchema,
};
use async_trait::async_trait;
use futures::stream;
use serde::{Deserialize, Serialize};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic provider configuration
#[derive(Clone, Debug)]
pub struct AnthropicConfig {
    /// API key
    pub api_key: String,

    /// API base URL
    pub base_url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl AnthropicConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.anthropic.com".into(),
            timeout_secs: 120,
        }
    }

    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| AgentError::Config("ANTHROPIC_API_KEY is not set".into()))?;
        let mut config = Self::new(api_key);
        if let Ok(base_url) = std::env::var("ANTHROPIC_BASE_URL") {
            config.base_url = base_url;
        }
        Ok(config)
    }
}

/// Anthropic-style LLM provider
pub struct AnthropicProvider {
    client: reqwest::Client,
    config: AnthropicConfig,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::from_config(AnthropicConfig::new(api_key))
    }

    pub fn from_config(config: AnthropicConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();
        Self { client, config }
    }

    pub fn from_env() -> Result<Self> {
        Ok(Self::from_config(AnthropicConfig::from_env()?))
    }

    /// Split the transcript into a top-level system string and alternating
    /// user/assistant wire messages.
    fn convert_messages(messages: &[Message]) -> (Option<String>, Vec<WireMessage>) {
        let mut system_parts: Vec<&str> = Vec::new();
        let mut wire: Vec<WireMessage> = Vec::new();

        for m in messages {
            match m.role {
                Role::System => system_parts.push(&m.content),
                Role::User => wire.push(WireMessage::new("user", m.content.clone())),
                Role::Assistant => {
                    let content = match &m.tool_call {
                        Some(call) => format!(
                            "[Called tool '{}' with arguments {}]",
                            call.name, call.arguments
                        ),
                        None => m.content.clone(),
                    };
                    wire.push(WireMessage::new("assistant", content));
                }
                Role::Tool => {
                    let name = m.tool_name.as_deref().unwrap_or("tool");
                    let content = format!("[Result from tool '{}']\n{}", name, m.content);
                    wire.push(WireMessage::new("user", content));
                }
            }
        }

        let system = if system_parts.is_empty() {
            None
        } else {
            Some(system_parts.join("\n\n"))
        };
        (system, wire)
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn complete(
        &self,
        messages: &[Message],
        _tools: Option<&[ToolSchema]>,
        options: &GenerationOptions,
    ) -> Result<ChatOutcome> {
        let (system, wire_messages) = Self::convert_messages(messages);

        let request = MessagesRequest {
            model: options.model.clone(),
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            system,
            messages: wire_messages,
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.config.base_url))
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| AgentError::ProviderUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::Provider(format!(
                "messages request failed with {status}: {body}"
            )));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| AgentError::Parse(e.to_string()))?;

        let text = parsed
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");

        Ok(ChatOutcome::Text(text))
    }

    async fn complete_stream(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> Result<CompletionStream> {
        // Buffered fallback: one full fragment followed by the terminator.
        let outcome = self.complete(messages, None, options).await?;
        let text = match outcome {
            ChatOutcome::Text(text) => text,
            ChatOutcome::ToolCall(_) => String::new(),
        };

        let chunks = vec![Ok(StreamChunk::delta(text)), Ok(StreamChunk::done())];
        Ok(Box::pin(stream::iter(chunks)))
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct WireMessage {
    role: String,
    content: String,
}

impl WireMessage {
    fn new(role: &str, content: String) -> Self {
        Self {
            role: role.into(),
            content,
        }
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,

    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,

    messages: Vec<WireMessage>,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}
