mod io;

use self::io::{spawn_stderr_forwarder, StdioChannel};
use crate::endpoint::EndpointDescriptor;
use crate::errors::{McpError, McpResult};
use crate::rpc::{
    CallToolParams, CallToolResult, Implementation, InitializeParams, InitializeResult,
    JsonRpcError, ListToolsParams, ListToolsResult, Notification, Request, ToolDescriptor,
    PROTOCOL_VERSION,
};
use crate::transport::{ToolInvocationResult, ToolTransport};
use async_trait::async_trait;
use gemini_core::McpConfig;
use serde_json::{json, Map, Value};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Lifecycle of a [`StdioSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Ready,
}

/// Owns one MCP server process and talks to it over stdio.
///
/// A session connects at most once. The child is spawned with
/// `kill_on_drop`, so dropping a session (or a cancelled `connect` future
/// together with its session) never leaves the process running.
pub struct StdioSession {
    config: McpConfig,
    state: SessionState,
    used: bool,
    server: String,
    process: Option<Child>,
    channel: Option<StdioChannel>,
    stderr_task: Option<JoinHandle<()>>,
    catalog: Vec<ToolDescriptor>,
    next_request_id: u64,
}

impl StdioSession {
    pub fn new(config: McpConfig) -> Self {
        Self {
            config,
            state: SessionState::Disconnected,
            used: false,
            server: String::new(),
            process: None,
            channel: None,
            stderr_task: None,
            catalog: Vec::new(),
            next_request_id: 1, // Start IDs from 1
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Names from the last fetched catalog.
    pub fn tool_names(&self) -> Vec<String> {
        self.catalog.iter().map(|tool| tool.name.clone()).collect()
    }

    fn ensure_ready(&self) -> McpResult<()> {
        if self.state == SessionState::Ready {
            Ok(())
        } else {
            Err(McpError::transport(format!(
                "session is not connected (state: {:?})",
                self.state
            )))
        }
    }

    async fn launch(&mut self, endpoint: &EndpointDescriptor) -> McpResult<()> {
        let (program, args) = endpoint.command(&self.config)?;
        info!(server = %self.server, program = %program, "Launching MCP server (stdio)");

        let mut process = Command::new(&program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                McpError::transport(format!(
                    "Server '{}': Failed to spawn '{}': {}",
                    self.server, program, e
                ))
            })?;

        let stdin = process.stdin.take();
        let stdout = process.stdout.take();
        let stderr = process.stderr.take();
        // Own the child before anything else can fail so teardown always finds it.
        self.process = Some(process);

        let (Some(stdin), Some(stdout), Some(stderr)) = (stdin, stdout, stderr) else {
            return Err(McpError::transport(format!(
                "Server '{}': Failed to capture stdio pipes",
                self.server
            )));
        };

        self.stderr_task = Some(spawn_stderr_forwarder(self.server.clone(), stderr));
        self.channel = Some(StdioChannel::new(self.server.clone(), stdin, stdout));

        self.handshake().await?;
        let tools = self.fetch_catalog().await?;
        info!(
            server = %self.server,
            tools = ?tools.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
            "Connected to server"
        );
        Ok(())
    }

    async fn handshake(&mut self) -> McpResult<()> {
        let params = InitializeParams {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: json!({}),
            client_info: Implementation {
                name: "gemini-mcp".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };

        let result = self
            .request("initialize", to_params(&params)?, self.init_timeout())
            .await?
            .map_err(|e| {
                McpError::transport(format!("Server '{}' rejected initialize: {}", self.server, e))
            })?;

        let init: InitializeResult = serde_json::from_value(result).map_err(|e| {
            McpError::transport(format!(
                "Server '{}' sent a malformed initialize result: {}",
                self.server, e
            ))
        })?;
        info!(
            server = %self.server,
            server_name = %init.server_info.name,
            server_version = %init.server_info.version,
            protocol = %init.protocol_version,
            "Handshake complete"
        );

        self.notify(Notification::new("notifications/initialized", None))
            .await
    }

    async fn fetch_catalog(&mut self) -> McpResult<Vec<ToolDescriptor>> {
        let mut tools = Vec::new();
        let mut cursor = None;

        loop {
            let params = ListToolsParams { cursor };
            let result = self
                .request("tools/list", to_params(&params)?, self.init_timeout())
                .await?
                .map_err(|e| {
                    McpError::transport(format!("Server '{}' failed tools/list: {}", self.server, e))
                })?;

            let page: ListToolsResult = serde_json::from_value(result).map_err(|e| {
                McpError::transport(format!(
                    "Server '{}' sent a malformed tools/list result: {}",
                    self.server, e
                ))
            })?;
            tools.extend(page.tools);

            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        debug!(server = %self.server, count = tools.len(), "Fetched tool catalog");
        self.catalog = tools.clone();
        Ok(tools)
    }

    /// Sends one request and waits for its response.
    ///
    /// The outer error is a transport failure; the inner one is the server's
    /// JSON-RPC error, left to the caller to classify.
    async fn request(
        &mut self,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> McpResult<Result<Value, JsonRpcError>> {
        let id = self.next_request_id;
        self.next_request_id += 1;

        let channel = self
            .channel
            .as_mut()
            .ok_or_else(|| McpError::transport("session has no open channel"))?;
        let request = Request::new(id, method, params);

        let exchange = async {
            channel.send(&request).await?;
            channel.read_response(id).await
        };

        let failure = match tokio::time::timeout(timeout, exchange).await {
            Ok(Ok(response)) => return Ok(response.into_result()),
            Ok(Err(e)) => e,
            Err(_) => McpError::transport(format!(
                "Timeout after {}s waiting for '{}' from server '{}'",
                timeout.as_secs(),
                method,
                self.server
            )),
        };

        // The pipes may now hold a partial message, so the session cannot be reused.
        error!(server = %self.server, method = %method, error = %failure, "Exchange failed; closing session");
        self.teardown().await;
        Err(failure)
    }

    async fn notify(&mut self, notification: Notification) -> McpResult<()> {
        let channel = self
            .channel
            .as_mut()
            .ok_or_else(|| McpError::transport("session has no open channel"))?;
        channel.send(&notification).await
    }

    fn init_timeout(&self) -> Duration {
        Duration::from_secs(self.config.init_timeout_secs)
    }

    fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.config.tool_timeout_secs)
    }

    /// Releases the channel and the process. Errors are logged, never raised.
    async fn teardown(&mut self) {
        self.catalog.clear();

        if let Some(channel) = self.channel.take() {
            if let Err(e) = channel.close().await {
                warn!(server = %self.server, error = %e, "Failed to close server stdin");
            }
        }

        if let Some(mut process) = self.process.take() {
            let grace = Duration::from_millis(self.config.shutdown_grace_ms);
            match tokio::time::timeout(grace, process.wait()).await {
                Ok(Ok(status)) => info!(server = %self.server, %status, "MCP server exited"),
                Ok(Err(e)) => {
                    error!(server = %self.server, error = %e, "Failed to wait for MCP server");
                    Self::kill_process(&mut process, &self.server).await;
                }
                Err(_) => {
                    warn!(
                        server = %self.server,
                        grace_ms = self.config.shutdown_grace_ms,
                        "MCP server did not exit after stdin closed"
                    );
                    Self::kill_process(&mut process, &self.server).await;
                }
            }
        }

        if let Some(task) = self.stderr_task.take() {
            task.abort();
        }

        self.state = SessionState::Disconnected;
    }

    // Helper to kill child processes
    async fn kill_process(process: &mut Child, server_name: &str) {
        if let Err(e) = process.kill().await {
            error!("Failed to kill MCP server '{}': {}", server_name, e);
        } else {
            info!("Killed MCP server '{}'", server_name);
        }
    }
}

#[async_trait]
impl ToolTransport for StdioSession {
    async fn connect(&mut self, endpoint: &EndpointDescriptor) -> McpResult<()> {
        if self.used {
            return Err(McpError::transport(
                "session already used; create a new session to reconnect",
            ));
        }
        // Unsupported kinds are rejected before anything is spawned.
        endpoint.resolve_kind()?;

        self.used = true;
        self.server = endpoint.to_string();
        self.state = SessionState::Connecting;

        match self.launch(endpoint).await {
            Ok(()) => {
                self.state = SessionState::Ready;
                Ok(())
            }
            Err(e) => {
                error!(server = %self.server, error = %e, "Connection failed");
                self.teardown().await;
                Err(e)
            }
        }
    }

    async fn list_tools(&mut self) -> McpResult<Vec<ToolDescriptor>> {
        self.ensure_ready()?;
        self.fetch_catalog().await
    }

    async fn call_tool(
        &mut self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> McpResult<ToolInvocationResult> {
        self.ensure_ready()?;
        if !self.catalog.iter().any(|tool| tool.name == name) {
            return Err(McpError::ToolNotFound(name.to_string()));
        }

        info!(
            server = %self.server,
            tool = %name,
            arguments = %serde_json::Value::Object(arguments.clone()),
            "Calling tool"
        );
        let params = CallToolParams {
            name: name.to_string(),
            arguments,
        };

        let result = self
            .request("tools/call", to_params(&params)?, self.tool_timeout())
            .await?
            .map_err(|e| McpError::ToolExecutionError {
                tool: name.to_string(),
                message: e.message,
            })?;

        let result: CallToolResult = serde_json::from_value(result).map_err(|e| {
            McpError::transport(format!(
                "Server '{}' sent a malformed tools/call result: {}",
                self.server, e
            ))
        })?;

        let output = ToolInvocationResult {
            content: result.content,
        };
        if result.is_error {
            let text = output.text();
            return Err(McpError::ToolExecutionError {
                tool: name.to_string(),
                message: if text.is_empty() {
                    "tool reported an error".to_string()
                } else {
                    text
                },
            });
        }

        debug!(server = %self.server, tool = %name, result = %output.text(), "Tool returned");
        Ok(output)
    }

    async fn disconnect(&mut self) {
        match self.state {
            SessionState::Disconnected if self.process.is_none() && self.channel.is_none() => {
                debug!(server = %self.server, "Session already disconnected");
                return;
            }
            SessionState::Connecting => {
                warn!(
                    server = %self.server,
                    "Connect did not complete (interrupted or cancelled); cleaning up"
                );
            }
            _ => info!(server = %self.server, "Disconnecting from MCP server"),
        }
        self.teardown().await;
    }

    fn is_connected(&self) -> bool {
        self.state == SessionState::Ready
    }
}

fn to_params<T: serde::Serialize>(params: &T) -> McpResult<Option<Value>> {
    serde_json::to_value(params)
        .map(Some)
        .map_err(|e| McpError::transport(format!("Failed to serialize params: {}", e)))
}
