use anyhow::Context;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use gemini_core::CompletionGateway;
use gemini_mcp::ToolTransport;
use gemini_orchestrator::{McpChatClient, QueryError, QueryOutcome};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

/// Application state shared with all routes
pub struct AppState<T, G> {
    // One session serves every request, one query at a time.
    client: Arc<Mutex<McpChatClient<T, G>>>,
}

impl<T, G> Clone for AppState<T, G> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
        }
    }
}

impl<T, G> AppState<T, G> {
    pub fn new(client: McpChatClient<T, G>) -> Self {
        Self {
            client: Arc::new(Mutex::new(client)),
        }
    }
}

#[derive(Deserialize)]
pub struct ChatParams {
    prompt: String,
}

#[derive(Serialize)]
pub struct ToolsResponse {
    tools: Vec<String>,
}

/// Error type for HTTP server
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Query(QueryError),
}

impl From<QueryError> for ApiError {
    fn from(e: QueryError) -> Self {
        Self::Query(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Self::Query(e) => {
                error!(error = %e, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub fn router<T, G>(state: AppState<T, G>) -> Router
where
    T: ToolTransport + 'static,
    G: CompletionGateway + 'static,
{
    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/tools", get(list_tools::<T, G>))
        .route("/chat", post(chat::<T, G>))
        .layer(cors)
        .with_state(state)
}

/// Serves the client until Ctrl-C, then disconnects it.
pub async fn run_server<T, G>(client: McpChatClient<T, G>, addr: SocketAddr) -> anyhow::Result<()>
where
    T: ToolTransport + 'static,
    G: CompletionGateway + 'static,
{
    let state = AppState::new(client);
    let app = router(state.clone());

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind HTTP server to {}", addr))?;
    info!("Starting HTTP server on {}", addr);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    info!("HTTP server stopped; disconnecting from tool server");
    state.client.lock().await.disconnect().await;

    served.context("HTTP server failed")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

async fn root() -> impl IntoResponse {
    Json(json!({ "message": "Welcome to the MCP chat server!" }))
}

async fn list_tools<T, G>(
    State(state): State<AppState<T, G>>,
) -> Result<Json<ToolsResponse>, ApiError>
where
    T: ToolTransport,
    G: CompletionGateway,
{
    let tools = state.client.lock().await.list_tool_names().await?;
    Ok(Json(ToolsResponse { tools }))
}

async fn chat<T, G>(
    State(state): State<AppState<T, G>>,
    Query(params): Query<ChatParams>,
) -> Result<Json<QueryOutcome>, ApiError>
where
    T: ToolTransport,
    G: CompletionGateway,
{
    let prompt = params.prompt.trim();
    if prompt.is_empty() {
        return Err(ApiError::BadRequest("prompt must not be empty".to_string()));
    }

    let outcome = state.client.lock().await.answer_query(prompt).await?;
    Ok(Json(outcome))
}
