//! Orchestration Loop
//!
//! The bounded iterative protocol at the heart of the agent: request a
//! completion, detect a tool invocation, execute it, re-query with the
//! result appended, and converge on a final answer. A pass always completes
//! with some answer text and one persisted turn; failures never escape to
//! the caller.

use std::pin::Pin;
use std::sync::Arc;

use async_stream::stream;
use futures::{Stream, StreamExt};
use serde_json::json;

use crate::error::{AgentError, Result};
use crate::memory::{ConversationTurn, InMemoryStore, MemoryStore};
use crate::message::Message;
use crate::provider::{ChatOutcome, GenerationOptions, LlmProvider};
use crate::session::{SessionId, SessionManager};
use crate::tool::{ToolRegistry, ToolSchema};

/// Fixed answer for a pass that exhausts its iteration budget.
/// Graceful termination, not an error.
pub const MAX_ITERATIONS_MESSAGE: &str =
    "I apologize, but I reached the maximum number of tool calls. Please try rephrasing your request.";

/// Agent configuration
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// Maximum loop iterations before the exhaustion fallback
    pub max_iterations: usize,

    /// How many persisted turns seed the working history
    pub history_limit: usize,

    /// Generation options
    pub generation: GenerationOptions,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            history_limit: 10,
            generation: GenerationOptions::default(),
        }
    }
}

/// Caller-facing stream of answer fragments. Total: never yields errors.
pub type ResponseStream = Pin<Box<dyn Stream<Item = String> + Send>>;

/// What one orchestration pass produced, before persistence
struct PassOutcome {
    answer: String,
    tools_used: Vec<String>,
    iterations: usize,
}

/// The main agent: provider, registry and memory wired together by
/// explicit injection, one logical task per in-flight user message.
pub struct Agent {
    provider: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    memory: Arc<dyn MemoryStore>,
    sessions: Arc<SessionManager>,
    config: AgentConfig,
}

impl Agent {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        tools: Arc<ToolRegistry>,
        memory: Arc<dyn MemoryStore>,
        config: AgentConfig,
    ) -> Self {
        Self {
            provider,
            tools,
            memory,
            sessions: Arc::new(SessionManager::new()),
            config,
        }
    }

    pub fn builder() -> AgentBuilder {
        AgentBuilder::new()
    }

    /// Process a user message and return the complete response.
    ///
    /// Creates a session when none is supplied. Total for well-formed
    /// input: always returns answer text, never an error.
    pub async fn process_message(&self, message: &str, session_id: Option<SessionId>) -> String {
        let session_id = self.resolve_session(session_id);
        self.sessions.touch(&session_id);

        let outcome = self.run_pass(&session_id, message).await;
        self.persist_turn(&session_id, message, &outcome, false).await;
        outcome.answer
    }

    /// Process a user message, streaming the response as it is produced.
    ///
    /// Tool-request iterations stay unary; only the final answer streams.
    /// Fragments are concatenated to form the persisted assistant message.
    pub fn process_message_stream(
        &self,
        message: impl Into<String>,
        session_id: Option<SessionId>,
    ) -> ResponseStream {
        let message = message.into();
        let provider = Arc::clone(&self.provider);
        let tools = Arc::clone(&self.tools);
        let memory = Arc::clone(&self.memory);
        let sessions = Arc::clone(&self.sessions);
        let config = self.config.clone();

        Box::pin(stream! {
            let session_id = match session_id {
                Some(id) => {
                    sessions.ensure(&id);
                    id
                }
                None => sessions.create(),
            };
            sessions.touch(&session_id);

            let mut tools_used: Vec<String> = Vec::new();
            let mut iterations = 0usize;
            let mut answer_parts: Vec<String> = Vec::new();
            let mut final_answer: Option<String> = None;

            let seeded = memory
                .conversation_history(session_id.as_str(), config.history_limit, true)
                .await;
            let mut history = match seeded {
                Ok(h) => h,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to load conversation history");
                    let text = format!("I encountered an error: {e}");
                    yield text.clone();
                    save_turn(
                        memory.as_ref(),
                        &session_id,
                        &message,
                        &text,
                        Vec::new(),
                        iterations,
                        true,
                    )
                    .await;
                    return;
                }
            };
            history.push(Message::user(message.clone()));

            let schemas = tools.schemas();

            while iterations < config.max_iterations {
                iterations += 1;

                match provider
                    .complete(&history, advertised(&schemas), &config.generation)
                    .await
                {
                    Ok(ChatOutcome::ToolCall(call)) => {
                        tracing::debug!(tool = %call.name, iteration = iterations, "executing tool");
                        yield format!("\n🔧 Using tool: {}\n", call.name);

                        let result = tools.execute(&call).await;
                        history.push(Message::assistant_tool_call(
                            &call.name,
                            call.arguments_json(),
                        ));
                        history.push(Message::tool(result.to_json().to_string(), &call.name));
                        tools_used.push(call.name);

                        if result.success {
                            yield "✅ Tool completed successfully\n\n".to_string();
                        } else {
                            yield format!(
                                "❌ Tool failed: {}\n\n",
                                result.error.as_deref().unwrap_or("unknown error")
                            );
                        }
                    }
                    Ok(ChatOutcome::Text(_)) => {
                        // Final answer reached: re-request it as a stream so
                        // the caller sees fragments as they are produced.
                        match provider.complete_stream(&history, &config.generation).await {
                            Ok(mut chunks) => {
                                while let Some(chunk) = chunks.next().await {
                                    match chunk {
                                        Ok(c) => {
                                            if !c.delta.is_empty() {
                                                answer_parts.push(c.delta.clone());
                                                yield c.delta;
                                            }
                                            if c.done {
                                                break;
                                            }
                                        }
                                        Err(e) => {
                                            tracing::warn!(error = %e, "stream interrupted");
                                            let text = format!("I encountered an error: {e}");
                                            answer_parts.push(text.clone());
                                            yield text;
                                            break;
                                        }
                                    }
                                }
                                final_answer = Some(answer_parts.concat());
                            }
                            Err(e) => {
                                let text = format!("I encountered an error: {e}");
                                yield text.clone();
                                final_answer = Some(text);
                            }
                        }
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "provider call failed");
                        let text = format!("I encountered an error: {e}");
                        yield text.clone();
                        final_answer = Some(text);
                        break;
                    }
                }
            }

            let answer = match final_answer {
                Some(answer) => answer,
                None => {
                    yield MAX_ITERATIONS_MESSAGE.to_string();
                    MAX_ITERATIONS_MESSAGE.to_string()
                }
            };

            save_turn(
                memory.as_ref(),
                &session_id,
                &message,
                &answer,
                tools_used,
                iterations,
                true,
            )
            .await;
        })
    }

    /// One buffered orchestration pass. Never fails: provider and registry
    /// faults are folded into the answer text.
    async fn run_pass(&self, session_id: &SessionId, message: &str) -> PassOutcome {
        let mut tools_used = Vec::new();
        let mut iterations = 0usize;

        let mut history = match self
            .memory
            .conversation_history(session_id.as_str(), self.config.history_limit, true)
            .await
        {
            Ok(h) => h,
            Err(e) => {
                tracing::warn!(error = %e, "failed to load conversation history");
                return PassOutcome {
                    answer: format!("I encountered an error: {e}"),
                    tools_used,
                    iterations,
                };
            }
        };
        history.push(Message::user(message));

        let prompt_tokens: u32 = history
            .iter()
            .map(|m| self.provider.estimate_tokens(&m.content))
            .sum();
        tracing::debug!(session = %session_id, prompt_tokens, "starting orchestration pass");

        let schemas = self.tools.schemas();

        while iterations < self.config.max_iterations {
            iterations += 1;

            match self
                .provider
                .complete(&history, advertised(&schemas), &self.config.generation)
                .await
            {
                Ok(ChatOutcome::ToolCall(call)) => {
                    tracing::debug!(tool = %call.name, iteration = iterations, "executing tool");

                    let result = self.tools.execute(&call).await;
                    history.push(Message::assistant_tool_call(
                        &call.name,
                        call.arguments_json(),
                    ));
                    history.push(Message::tool(result.to_json().to_string(), &call.name));
                    tools_used.push(call.name);
                }
                Ok(ChatOutcome::Text(text)) => {
                    return PassOutcome {
                        answer: text,
                        tools_used,
                        iterations,
                    };
                }
                Err(e) => {
                    tracing::warn!(error = %e, "provider call failed");
                    return PassOutcome {
                        answer: format!("I encountered an error: {e}"),
                        tools_used,
                        iterations,
                    };
                }
            }
        }

        PassOutcome {
            answer: MAX_ITERATIONS_MESSAGE.to_string(),
            tools_used,
            iterations,
        }
    }

    async fn persist_turn(
        &self,
        session_id: &SessionId,
        message: &str,
        outcome: &PassOutcome,
        streamed: bool,
    ) {
        save_turn(
            self.memory.as_ref(),
            session_id,
            message,
            &outcome.answer,
            outcome.tools_used.clone(),
            outcome.iterations,
            streamed,
        )
        .await;
    }

    fn resolve_session(&self, session_id: Option<SessionId>) -> SessionId {
        match session_id {
            Some(id) => {
                self.sessions.ensure(&id);
                id
            }
            None => self.sessions.create(),
        }
    }

    /// Search persisted history, newest-first
    pub async fn search_history(
        &self,
        query: &str,
        session_id: Option<&SessionId>,
    ) -> Result<Vec<ConversationTurn>> {
        self.memory
            .search_turns(query, session_id.map(SessionId::as_str), 10)
            .await
    }

    /// Aggregate statistics for a session
    pub async fn session_stats(&self, session_id: &SessionId) -> Result<crate::memory::SessionStats> {
        self.memory.session_stats(session_id.as_str()).await
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn memory(&self) -> &dyn MemoryStore {
        self.memory.as_ref()
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }
}

/// Schemas are only advertised when at least one tool is registered
fn advertised(schemas: &[ToolSchema]) -> Option<&[ToolSchema]> {
    (!schemas.is_empty()).then_some(schemas)
}

/// Write the turn exactly once, after the pass terminates. A persistence
/// failure is logged, never surfaced mid-answer.
async fn save_turn(
    memory: &dyn MemoryStore,
    session_id: &SessionId,
    user_message: &str,
    assistant_message: &str,
    tools_used: Vec<String>,
    iterations: usize,
    streamed: bool,
) {
    let mut metadata = std::collections::HashMap::new();
    metadata.insert("iterations".to_string(), json!(iterations));
    metadata.insert("streamed".to_string(), json!(streamed));

    let turn = ConversationTurn::new(
        session_id.as_str(),
        user_message,
        assistant_message,
        tools_used,
        metadata,
    );

    if let Err(e) = memory.save_turn(turn).await {
        tracing::error!(error = %e, session = %session_id, "failed to persist conversation turn");
    }
}

/// Builder for Agent configuration
pub struct AgentBuilder {
    provider: Option<Arc<dyn LlmProvider>>,
    tools: ToolRegistry,
    memory: Option<Arc<dyn MemoryStore>>,
    config: AgentConfig,
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self {
            provider: None,
            tools: ToolRegistry::new(),
            memory: None,
            config: AgentConfig::default(),
        }
    }

    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn tool<T: crate::tool::Tool + 'static>(mut self, tool: T) -> Result<Self> {
        self.tools.register(tool)?;
        Ok(self)
    }

    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    pub fn memory(mut self, memory: Arc<dyn MemoryStore>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.generation.model = model.into();
        self
    }

    pub fn temperature(mut self, temp: f32) -> Self {
        self.config.generation.temperature = temp;
        self
    }

    pub fn max_iterations(mut self, max: usize) -> Self {
        self.config.max_iterations = max;
        self
    }

    pub fn history_limit(mut self, limit: usize) -> Self {
        self.config.history_limit = limit;
        self
    }

    pub fn build(self) -> Result<Agent> {
        let provider = self
            .provider
            .ok_or_else(|| AgentError::Config("Provider is required".into()))?;
        let memory = self
            .memory
            .unwrap_or_else(|| Arc::new(InMemoryStore::new()));

        Ok(Agent::new(provider, Arc::new(self.tools), memory, self.config))
    }
}
