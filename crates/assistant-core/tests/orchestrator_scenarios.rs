//! End-to-end orchestration tests with scripted providers.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::json;

use assistant_core::memory::InMemoryStore;
use assistant_core::message::{Message, Role};
use assistant_core::provider::{
    ChatOutcome, CompletionStream, GenerationOptions, LlmProvider, StreamChunk,
};
use assistant_core::tool::{CalculatorTool, Tool, ToolCall, ToolRegistry, ToolResult, ToolSchema};
use assistant_core::{Agent, AgentConfig, AgentError, MemoryStore, Result, SessionId, MAX_ITERATIONS_MESSAGE};

/// Provider that replays a fixed script of outcomes and records the last
/// message sequence it was given.
struct ScriptedProvider {
    script: Mutex<VecDeque<ChatOutcome>>,
    fragments: Vec<String>,
    last_messages: Mutex<Vec<Message>>,
}

impl ScriptedProvider {
    fn new(script: Vec<ChatOutcome>, fragments: Vec<&str>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            fragments: fragments.into_iter().map(String::from).collect(),
            last_messages: Mutex::new(Vec::new()),
        }
    }

    fn seen_messages(&self) -> Vec<Message> {
        self.last_messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        messages: &[Message],
        _tools: Option<&[ToolSchema]>,
        _options: &GenerationOptions,
    ) -> Result<ChatOutcome> {
        *self.last_messages.lock().unwrap() = messages.to_vec();
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| AgentError::Provider("script exhausted".into()))
    }

    async fn complete_stream(
        &self,
        _messages: &[Message],
        _options: &GenerationOptions,
    ) -> Result<CompletionStream> {
        let chunks: Vec<Result<StreamChunk>> = self
            .fragments
            .iter()
            .map(|f| Ok(StreamChunk::delta(f.clone())))
            .chain(std::iter::once(Ok(StreamChunk::done())))
            .collect();
        Ok(Box::pin(futures::stream::iter(chunks)))
    }
}

/// Provider that requests the same tool on every completion.
struct AlwaysToolProvider;

#[async_trait]
impl LlmProvider for AlwaysToolProvider {
    fn name(&self) -> &str {
        "always-tool"
    }

    async fn complete(
        &self,
        _messages: &[Message],
        _tools: Option<&[ToolSchema]>,
        _options: &GenerationOptions,
    ) -> Result<ChatOutcome> {
        Ok(ChatOutcome::ToolCall(ToolCall::new("noop", HashMap::new())))
    }

    async fn complete_stream(
        &self,
        _messages: &[Message],
        _options: &GenerationOptions,
    ) -> Result<CompletionStream> {
        Ok(Box::pin(futures::stream::iter(vec![Ok(StreamChunk::done())])))
    }
}

/// Provider whose every call fails.
struct BrokenProvider;

#[async_trait]
impl LlmProvider for BrokenProvider {
    fn name(&self) -> &str {
        "broken"
    }

    async fn complete(
        &self,
        _messages: &[Message],
        _tools: Option<&[ToolSchema]>,
        _options: &GenerationOptions,
    ) -> Result<ChatOutcome> {
        Err(AgentError::ProviderUnavailable("connection refused".into()))
    }

    async fn complete_stream(
        &self,
        _messages: &[Message],
        _options: &GenerationOptions,
    ) -> Result<CompletionStream> {
        Err(AgentError::ProviderUnavailable("connection refused".into()))
    }
}

struct NoopTool;

#[async_trait]
impl Tool for NoopTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "noop".into(),
            description: "Does nothing".into(),
            parameters: vec![],
            category: None,
        }
    }

    async fn execute(&self, _call: &ToolCall) -> Result<ToolResult> {
        Ok(ToolResult::success(json!({})))
    }
}

fn calculator_call() -> ChatOutcome {
    let mut args = HashMap::new();
    args.insert("expression".to_string(), json!("2+2"));
    ChatOutcome::ToolCall(ToolCall::new("calculator", args))
}

#[tokio::test]
async fn scenario_a_calculator_round_trip() {
    let provider = Arc::new(ScriptedProvider::new(
        vec![calculator_call(), ChatOutcome::Text("2+2 equals 4.".into())],
        vec![],
    ));
    let memory = Arc::new(InMemoryStore::new());
    let mut tools = ToolRegistry::new();
    tools.register(CalculatorTool).unwrap();

    let agent = Agent::new(
        provider.clone(),
        Arc::new(tools),
        memory.clone(),
        AgentConfig::default(),
    );

    let session = SessionId::from_string("scenario-a");
    let answer = agent
        .process_message("What is 2+2?", Some(session.clone()))
        .await;

    assert!(!answer.is_empty());
    assert_eq!(answer, "2+2 equals 4.");

    // The second completion must have seen the tool exchange.
    let seen = provider.seen_messages();
    let tool_msg = seen
        .iter()
        .find(|m| m.role == Role::Tool)
        .expect("tool result message in working history");
    assert_eq!(tool_msg.tool_name.as_deref(), Some("calculator"));
    assert!(tool_msg.content.contains("\"success\":true"));
    assert!(tool_msg.content.contains("\"result\":4.0") || tool_msg.content.contains("\"result\":4"));
    assert!(seen.iter().any(|m| m.has_tool_call()));

    let turns = memory.recent_turns("scenario-a", 10).await.unwrap();
    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0].tools_used, vec!["calculator"]);
    assert_eq!(turns[0].metadata["iterations"], json!(2));
    assert_eq!(turns[0].metadata["streamed"], json!(false));
}

#[tokio::test]
async fn scenario_b_iteration_cap_exhaustion() {
    let memory = Arc::new(InMemoryStore::new());
    let mut tools = ToolRegistry::new();
    tools.register(NoopTool).unwrap();

    let agent = Agent::new(
        Arc::new(AlwaysToolProvider),
        Arc::new(tools),
        memory.clone(),
        AgentConfig::default(),
    );

    let session = SessionId::from_string("scenario-b");
    let answer = agent.process_message("loop forever", Some(session)).await;

    assert_eq!(answer, MAX_ITERATIONS_MESSAGE);

    let turns = memory.recent_turns("scenario-b", 10).await.unwrap();
    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0].metadata["iterations"], json!(5));
    assert_eq!(turns[0].tools_used.len(), 5);
    assert!(turns[0].tools_used.iter().all(|t| t == "noop"));
}

#[tokio::test]
async fn scenario_c_streaming_fragments() {
    let provider = Arc::new(ScriptedProvider::new(
        vec![ChatOutcome::Text("buffered placeholder".into())],
        vec!["Hel", "lo"],
    ));
    let memory = Arc::new(InMemoryStore::new());

    let agent = Agent::new(
        provider,
        Arc::new(ToolRegistry::new()),
        memory.clone(),
        AgentConfig::default(),
    );

    let session = SessionId::from_string("scenario-c");
    let stream = agent.process_message_stream("say hello", Some(session));
    let fragments: Vec<String> = stream.collect().await;

    assert_eq!(fragments.concat(), "Hello");

    let turns = memory.recent_turns("scenario-c", 10).await.unwrap();
    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0].assistant_message, "Hello");
    assert_eq!(turns[0].metadata["streamed"], json!(true));
}

#[tokio::test]
async fn streaming_exhaustion_emits_apology() {
    let mut tools = ToolRegistry::new();
    tools.register(NoopTool).unwrap();
    let memory = Arc::new(InMemoryStore::new());

    let agent = Agent::new(
        Arc::new(AlwaysToolProvider),
        Arc::new(tools),
        memory.clone(),
        AgentConfig::default(),
    );

    let session = SessionId::from_string("stream-exhaust");
    let fragments: Vec<String> = agent
        .process_message_stream("loop forever", Some(session))
        .collect()
        .await;

    assert_eq!(fragments.last().unwrap(), MAX_ITERATIONS_MESSAGE);

    let turns = memory.recent_turns("stream-exhaust", 10).await.unwrap();
    assert_eq!(turns[0].assistant_message, MAX_ITERATIONS_MESSAGE);
    assert_eq!(turns[0].metadata["iterations"], json!(5));
}

#[tokio::test]
async fn provider_fault_becomes_answer_text_and_is_persisted() {
    let memory = Arc::new(InMemoryStore::new());
    let agent = Agent::new(
        Arc::new(BrokenProvider),
        Arc::new(ToolRegistry::new()),
        memory.clone(),
        AgentConfig::default(),
    );

    let session = SessionId::from_string("broken");
    let answer = agent.process_message("hello?", Some(session)).await;

    assert!(answer.starts_with("I encountered an error:"));
    assert!(answer.contains("connection refused"));

    let turns = memory.recent_turns("broken", 10).await.unwrap();
    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0].assistant_message, answer);
}

#[tokio::test]
async fn working_history_is_seeded_from_memory() {
    let memory = Arc::new(InMemoryStore::new());
    let provider = Arc::new(ScriptedProvider::new(
        vec![
            ChatOutcome::Text("first answer".into()),
            ChatOutcome::Text("second answer".into()),
        ],
        vec![],
    ));

    let agent = Agent::new(
        provider.clone(),
        Arc::new(ToolRegistry::new()),
        memory.clone(),
        AgentConfig::default(),
    );

    let session = SessionId::from_string("seeded");
    agent
        .process_message("first question", Some(session.clone()))
        .await;
    agent
        .process_message("second question", Some(session.clone()))
        .await;

    let seen = provider.seen_messages();
    // System prompt, prior user/assistant pair, then the new user message.
    assert_eq!(seen[0].role, Role::System);
    assert_eq!(seen.iter().filter(|m| m.role == Role::System).count(), 1);
    assert_eq!(seen[1].content, "first question");
    assert_eq!(seen[2].content, "first answer");
    assert_eq!(seen.last().unwrap().content, "second question");

    let stats = agent.session_stats(&session).await.unwrap();
    assert_eq!(stats.total_turns, 2);
}

#[tokio::test]
async fn anonymous_message_creates_session() {
    let provider = Arc::new(ScriptedProvider::new(
        vec![ChatOutcome::Text("hi".into())],
        vec![],
    ));
    let agent = Agent::new(
        provider,
        Arc::new(ToolRegistry::new()),
        Arc::new(InMemoryStore::new()),
        AgentConfig::default(),
    );

    assert!(agent.sessions().is_empty());
    agent.process_message("hello", None).await;
    assert_eq!(agent.sessions().len(), 1);
}

#[tokio::test]
async fn unknown_tool_request_recovers_within_pass() {
    // Provider asks for a tool that is not registered, then answers.
    let mut args = HashMap::new();
    args.insert("x".to_string(), json!(1));
    let provider = Arc::new(ScriptedProvider::new(
        vec![
            ChatOutcome::ToolCall(ToolCall::new("missing_tool", args)),
            ChatOutcome::Text("recovered".into()),
        ],
        vec![],
    ));
    let memory = Arc::new(InMemoryStore::new());

    let agent = Agent::new(
        provider.clone(),
        Arc::new(ToolRegistry::new()),
        memory.clone(),
        AgentConfig::default(),
    );

    let session = SessionId::from_string("missing-tool");
    let answer = agent.process_message("use a tool", Some(session)).await;
    assert_eq!(answer, "recovered");

    // The failure came back as a tool-role message, not a crash.
    let seen = provider.seen_messages();
    let tool_msg = seen.iter().find(|m| m.role == Role::Tool).unwrap();
    assert!(tool_msg.content.contains("\"success\":false"));
    assert!(tool_msg.content.contains("not found"));

    let turns = memory.recent_turns("missing-tool", 10).await.unwrap();
    assert_eq!(turns[0].tools_used, vec!["missing_tool"]);
}
