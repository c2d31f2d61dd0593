// Core Gemini functionality for the MCP chat client:
// - Conversation model shared by the gateway and the orchestrator
// - Completion gateway trait and the Gemini REST adapter
// - Request/response data structures
// - Configuration loading
// - Shared error types

// Export conversation module - Messages, tool invocation requests, completions
pub mod conversation;
pub use conversation::*;

// Export gateway module - The completion capability the orchestrator depends on
pub mod gateway;
pub use gateway::CompletionGateway;

// Export client module - API client for Gemini
pub mod client;
pub use client::GeminiClient;

// Export types module - Request/response data structures
pub mod types;

// Export config module - Configuration loading
pub mod config;
pub use config::*;

// Export errors module - Shared error types
pub mod errors;
pub use errors::*;
