//! Conversation model shared by the gateway and the orchestrator.
//!
//! A [`Conversation`] is built fresh for every query and only ever grows.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A tool call the model decided to make.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocationRequest {
    pub id: String,
    pub name: String,
    pub arguments: Map<String, Value>,
    /// The id was assigned by the model and goes back with the result.
    #[serde(default)]
    pub from_model: bool,
}

/// One entry of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Message {
    Human {
        content: String,
    },
    AiResponse {
        content: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolInvocationRequest>,
    },
    ToolResult {
        invocation_id: String,
        /// Name of the tool that produced the result; Gemini correlates
        /// function responses by name.
        tool_name: String,
        content: Value,
    },
}

impl Message {
    pub fn human(content: impl Into<String>) -> Self {
        Message::Human {
            content: content.into(),
        }
    }

    pub fn ai(content: impl Into<String>, tool_calls: Vec<ToolInvocationRequest>) -> Self {
        Message::AiResponse {
            content: content.into(),
            tool_calls,
        }
    }

    pub fn tool_result(request: &ToolInvocationRequest, content: Value) -> Self {
        Message::ToolResult {
            invocation_id: request.id.clone(),
            tool_name: request.name.clone(),
            content,
        }
    }
}

/// Ordered, append-only message sequence for a single query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a conversation with the user's query.
    pub fn from_query(query: impl Into<String>) -> Self {
        let mut conversation = Self::new();
        conversation.push(Message::human(query));
        conversation
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Outcome of one gateway round: answer text and/or tool calls.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    pub text: String,
    pub tool_calls: Vec<ToolInvocationRequest>,
}

impl Completion {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// The model message this completion contributes to the conversation.
    pub fn to_message(&self) -> Message {
        Message::ai(self.text.clone(), self.tool_calls.clone())
    }
}
