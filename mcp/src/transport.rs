use crate::endpoint::EndpointDescriptor;
use crate::errors::McpResult;
use crate::rpc::ToolDescriptor;
use async_trait::async_trait;
use serde_json::{Map, Value};

/// Payload returned by a tool invocation, kept as the server sent it.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocationResult {
    pub content: Vec<Value>,
}

impl ToolInvocationResult {
    /// Text blocks of the content, newline-joined.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter(|block| block.get("type").and_then(Value::as_str) == Some("text"))
            .filter_map(|block| block.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn into_value(self) -> Value {
        Value::Array(self.content)
    }
}

/// A connection to a process that exposes tools.
///
/// Implementations are single-use and not reentrant: callers hold `&mut`
/// for every operation, so at most one request is in flight.
#[async_trait]
pub trait ToolTransport: Send {
    async fn connect(&mut self, endpoint: &EndpointDescriptor) -> McpResult<()>;

    /// Fetches the current catalog and remembers it for [`call_tool`](Self::call_tool).
    async fn list_tools(&mut self) -> McpResult<Vec<ToolDescriptor>>;

    async fn call_tool(
        &mut self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> McpResult<ToolInvocationResult>;

    /// Releases the process and its pipes. Never fails; safe to repeat.
    async fn disconnect(&mut self);

    fn is_connected(&self) -> bool;
}
