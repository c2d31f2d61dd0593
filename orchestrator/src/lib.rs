// End-to-end query handling for the MCP chat client:
// - The query algorithm over a tool transport and a completion gateway
// - A long-lived client owning one session and one gateway

pub mod client;
pub mod coordinator;
pub mod errors;

pub use client::McpChatClient;
pub use coordinator::{process_query, QueryOptions, QueryOutcome};
pub use errors::{QueryError, QueryResult};
