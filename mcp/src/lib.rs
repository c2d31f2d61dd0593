// MCP tool calling client logic:
// - Stdio transport session to a tool-providing process
// - Tool catalog adaptation into Gemini function declarations

pub mod catalog;
pub mod endpoint;
pub mod errors;
pub mod rpc;
pub mod session;
pub mod transport;

// Re-export main types and functions for convenience
pub use catalog::to_function_declarations;
pub use endpoint::{EndpointDescriptor, EndpointKind};
pub use errors::{McpError, McpResult};
pub use rpc::ToolDescriptor;
pub use session::{SessionState, StdioSession};
pub use transport::{ToolInvocationResult, ToolTransport};
