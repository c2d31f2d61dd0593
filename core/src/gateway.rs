use crate::conversation::{Completion, Conversation};
use crate::errors::GeminiResult;
use crate::types::FunctionDeclaration;
use async_trait::async_trait;

/// A remote model that either answers or asks for tool calls.
///
/// The model always chooses for itself whether to call a tool. An empty
/// `tools` slice means no capabilities are advertised for this round, as
/// in the follow-up completion after tool results were appended.
#[async_trait]
pub trait CompletionGateway: Send + Sync {
    async fn complete(
        &self,
        conversation: &Conversation,
        tools: &[FunctionDeclaration],
    ) -> GeminiResult<Completion>;
}
