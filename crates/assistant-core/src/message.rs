//! Conversation Messages
//!
//! Standard message format threaded through providers, memory and the
//! orchestration loop. Ordering within a sequence is significant: it encodes
//! dialogue turn order and which tool result answers which tool call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role of a message sender
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System prompt/instructions
    System,
    /// User input
    User,
    /// Assistant (LLM) response
    Assistant,
    /// Tool result (injected as context)
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

/// A tool invocation recorded on an assistant message.
///
/// Arguments are kept in serialized form so the message stays a plain value
/// object regardless of which provider produced the call.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PendingToolCall {
    /// Tool identifier
    pub name: String,

    /// JSON-serialized arguments
    pub arguments: String,
}

/// A single message in a conversation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    /// Message role
    pub role: Role,

    /// Text content
    pub content: String,

    /// Name of the tool that produced this message (tool role only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,

    /// Tool invocation requested by this assistant message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<PendingToolCall>,

    /// Timestamp
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a new message
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_name: None,
            tool_call: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create an assistant message that requests a tool invocation
    pub fn assistant_tool_call(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        let mut msg = Self::new(Role::Assistant, "");
        msg.tool_call = Some(PendingToolCall {
            name: name.into(),
            arguments: arguments.into(),
        });
        msg
    }

    /// Create a tool result message
    pub fn tool(content: impl Into<String>, tool_name: impl Into<String>) -> Self {
        let mut msg = Self::new(Role::Tool, content);
        msg.tool_name = Some(tool_name.into());
        msg
    }

    /// Whether this message carries a tool invocation request
    pub fn has_tool_call(&self) -> bool {
        self.tool_call.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_creation() {
        let msg = Message::user("Hello");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Hello");
        assert!(msg.tool_name.is_none());
    }

    #[test]
    fn test_tool_message_carries_name() {
        let msg = Message::tool("{\"success\":true}", "calculator");
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.tool_name.as_deref(), Some("calculator"));
    }

    #[test]
    fn test_assistant_tool_call() {
        let msg = Message::assistant_tool_call("calculator", r#"{"expression":"2+2"}"#);
        assert!(msg.has_tool_call());
        assert!(msg.content.is_empty());
        let call = msg.tool_call.unwrap();
        assert_eq!(call.name, "calculator");
    }

    #[test]
    fn test_role_serialization() {
        let json = serde_json::to_string(&Role::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
    }
}
