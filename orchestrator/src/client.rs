use crate::coordinator::{process_query, QueryOptions, QueryOutcome};
use crate::errors::QueryResult;
use gemini_core::{CompletionGateway, GeminiClient, UnifiedConfig};
use gemini_mcp::{EndpointDescriptor, McpError, StdioSession, ToolTransport};
use tracing::{error, info};

/// Chat client bound to one tool server and one model.
///
/// Queries share the connection but never a conversation. The client is not
/// reentrant; wrap it in a mutex to serve concurrent callers.
pub struct McpChatClient<T, G> {
    transport: T,
    gateway: G,
    options: QueryOptions,
}

impl McpChatClient<StdioSession, GeminiClient> {
    /// Builds the production client: a stdio session and the Gemini REST gateway.
    ///
    /// Fails with `MissingCredential` when no API key is configured.
    pub fn from_config(config: &UnifiedConfig) -> QueryResult<Self> {
        let gateway = GeminiClient::new(config.gemini.clone())?;
        info!(model = %gateway.model_name(), "Gemini gateway ready");
        Ok(Self::new(
            StdioSession::new(config.mcp.clone()),
            gateway,
            QueryOptions::from(&config.orchestrator),
        ))
    }
}

impl<T, G> McpChatClient<T, G>
where
    T: ToolTransport,
    G: CompletionGateway,
{
    pub fn new(transport: T, gateway: G, options: QueryOptions) -> Self {
        Self {
            transport,
            gateway,
            options,
        }
    }

    /// Starts the tool server. Failures leave nothing running.
    pub async fn connect(&mut self, endpoint: &EndpointDescriptor) -> QueryResult<()> {
        self.transport.connect(endpoint).await.map_err(|e| {
            error!(server = %endpoint, error = %e, "Failed to connect to tool server");
            e.into()
        })
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Answers one query with a fresh conversation.
    pub async fn answer_query(&mut self, query: &str) -> QueryResult<QueryOutcome> {
        if !self.transport.is_connected() {
            return Err(McpError::TransportError(
                "not connected to a tool server; call connect first".to_string(),
            )
            .into());
        }

        info!(query = %query, "Processing query");
        let outcome = process_query(&mut self.transport, &self.gateway, query, self.options).await;
        match &outcome {
            Ok(outcome) => info!(tools = ?outcome.tool_names, "Query answered"),
            Err(e) => error!(error = %e, "Query failed"),
        }
        outcome
    }

    /// Names of the tools the server currently offers.
    pub async fn list_tool_names(&mut self) -> QueryResult<Vec<String>> {
        let tools = self.transport.list_tools().await?;
        Ok(tools.into_iter().map(|tool| tool.name).collect())
    }

    /// Stops the tool server. Never fails; safe to repeat.
    pub async fn disconnect(&mut self) {
        self.transport.disconnect().await;
    }
}
