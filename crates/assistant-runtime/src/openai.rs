//! OpenAI-style Provider
//!
//! Implementation of `LlmProvider` against an OpenAI-compatible chat
//! completions API, with native function calling and SSE streaming. All
//! wire-format translation stays inside this adapter.

use std::collections::HashMap;

use assistant_core::{
    error::{AgentError, Result},
    message::{Message, Role},
    provider::{ChatOutcome, CompletionStream, GenerationOptions, LlmProvider, StreamChunk},
    tool::{ToolCall, ToolSchema},
};
use async_stream::try_stream;
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// OpenAI provider configuration
#[derive(Clone, Debug)]
pub struct OpenAiConfig {
    /// API key
    pub api_key: String,

    /// API base URL (override for compatible gateways)
    pub base_url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1".into(),
            timeout_secs: 120,
        }
    }

    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| AgentError::Config("OPENAI_API_KEY is not set".into()))?;
        let mut config = Self::new(api_key);
        if let Ok(base_url) = std::env::var("OPENAI_BASE_URL") {
            config.base_url = base_url;
        }
        Ok(config)
    }
}

/// OpenAI-style LLM provider
pub struct OpenAiProvider {
    client: reqwest::Client,
    config: OpenAiConfig,
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::from_config(OpenAiConfig::new(api_key))
    }

    pub fn from_config(config: OpenAiConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();
        Self { client, config }
    }

    pub fn from_env() -> Result<Self> {
        Ok(Self::from_config(OpenAiConfig::from_env()?))
    }

    /// Convert agent messages to the OpenAI wire shape
    fn convert_messages(messages: &[Message]) -> Vec<WireMessage> {
        messages
            .iter()
            .map(|m| match m.role {
                Role::System => WireMessage::plain("system", &m.content),
                Role::User => WireMessage::plain("user", &m.content),
                Role::Assistant => {
                    let mut wire = WireMessage::plain("assistant", &m.content);
                    if let Some(call) = &m.tool_call {
                        wire.function_call = Some(WireFunctionCall {
                            name: call.name.clone(),
                            arguments: call.arguments.clone(),
                        });
                    }
                    wire
                }
                Role::Tool => {
                    // Function results carry the tool name (required by the API)
                    let mut wire = WireMessage::plain("function", &m.content);
                    wire.name = m.tool_name.clone();
                    wire
                }
            })
            .collect()
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url)
    }

    fn build_request(
        &self,
        messages: &[Message],
        tools: Option<&[ToolSchema]>,
        options: &GenerationOptions,
        stream: bool,
    ) -> ChatRequest {
        let functions = tools.map(|schemas| {
            schemas
                .iter()
                .map(ToolSchema::to_function_schema)
                .collect::<Vec<_>>()
        });
        let function_call = functions.as_ref().map(|_| "auto".to_string());

        ChatRequest {
            model: options.model.clone(),
            messages: Self::convert_messages(messages),
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            top_p: options.top_p,
            stream,
            functions,
            function_call,
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(
        &self,
        messages: &[Message],
        tools: Option<&[ToolSchema]>,
        options: &GenerationOptions,
    ) -> Result<ChatOutcome> {
        let request = self.build_request(messages, tools, options, false);

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AgentError::ProviderUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::Provider(format!(
                "completion request failed with {status}: {body}"
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AgentError::Parse(e.to_string()))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AgentError::Provider("response contained no choices".into()))?;

        if let Some(call) = choice.message.function_call {
            let arguments: HashMap<String, Value> = serde_json::from_str(&call.arguments)
                .map_err(|e| {
                    AgentError::Parse(format!("malformed function call arguments: {e}"))
                })?;
            return Ok(ChatOutcome::ToolCall(ToolCall::new(call.name, arguments)));
        }

        Ok(ChatOutcome::Text(choice.message.content.unwrap_or_default()))
    }

    async fn complete_stream(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> Result<CompletionStream> {
        let request = self.build_request(messages, None, options, true);

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AgentError::ProviderUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::Provider(format!(
                "streaming request failed with {status}: {body}"
            )));
        }

        let mut bytes = response.bytes_stream();

        let stream = try_stream! {
            let mut buffer = String::new();
            let mut done = false;

            while !done {
                let Some(chunk) = bytes.next().await else {
                    break;
                };
                let chunk = chunk.map_err(|e| AgentError::Provider(e.to_string()))?;
                buffer.push_str(&String::from_utf8_lossy(&chunk));

                // SSE frames: one "data: {...}" payload per line
                while let Some(pos) = buffer.find('\n') {
                    let line = buffer[..pos].trim().to_string();
                    buffer.drain(..=pos);

                    let Some(payload) = line.strip_prefix("data:") else {
                        continue;
                    };
                    let payload = payload.trim();

                    if payload == "[DONE]" {
                        yield StreamChunk::done();
                        done = true;
                        break;
                    }

                    let Ok(parsed) = serde_json::from_str::<StreamResponse>(payload) else {
                        tracing::debug!("skipping unparseable stream frame");
                        continue;
                    };
                    let Some(choice) = parsed.choices.first() else {
                        continue;
                    };

                    if let Some(content) = &choice.delta.content {
                        if !content.is_empty() {
                            yield StreamChunk::delta(content.clone());
                        }
                    }
                    if choice.finish_reason.is_some() {
                        yield StreamChunk::done();
                        done = true;
                        break;
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Clone, Debug, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Clone, Debug, Serialize)]
struct WireMessage {
    role: String,
    content: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    function_call: Option<WireFunctionCall>,
}

impl WireMessage {
    fn plain(role: &str, content: &str) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
            name: None,
            function_call: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<WireMessage>,
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
    stream: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    functions: Option<Vec<Value>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    function_call: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,

    #[serde(default)]
    function_call: Option<WireFunctionCall>,
}

#[derive(Debug, Deserialize)]
struct StreamResponse {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: Delta,

    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}
