// Low-level stdio framing for MCP servers: one JSON-RPC message per line.

use crate::errors::{McpError, McpResult};
use crate::rpc::Response;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::process::{ChildStderr, ChildStdin, ChildStdout};
use tokio::task::{self, JoinHandle};
use tracing::{debug, error, info, warn};

const STDIO_BUFFER_SIZE: usize = 8192;

pub(crate) struct StdioChannel {
    server: String,
    writer: BufWriter<ChildStdin>,
    reader: BufReader<ChildStdout>,
    line: String,
}

impl StdioChannel {
    pub(crate) fn new(server: String, stdin: ChildStdin, stdout: ChildStdout) -> Self {
        Self {
            server,
            writer: BufWriter::with_capacity(STDIO_BUFFER_SIZE, stdin),
            reader: BufReader::with_capacity(STDIO_BUFFER_SIZE, stdout),
            line: String::new(),
        }
    }

    /// Writes one message followed by a newline and flushes.
    pub(crate) async fn send<T: Serialize + Sync>(&mut self, message: &T) -> McpResult<()> {
        let json = serde_json::to_string(message)
            .map_err(|e| McpError::transport(format!("Failed to serialize message: {}", e)))?;
        debug!(server = %self.server, "Stdin: {}", json);

        self.writer
            .write_all(json.as_bytes())
            .await
            .map_err(|e| self.io_error("write to", e))?;
        self.writer
            .write_all(b"\n")
            .await
            .map_err(|e| self.io_error("write to", e))?;
        self.writer
            .flush()
            .await
            .map_err(|e| self.io_error("flush", e))
    }

    /// Reads lines until the response carrying `id` arrives.
    ///
    /// Notifications and log output the server interleaves are skipped.
    /// Server-initiated `ping` requests are answered so the server does not stall.
    pub(crate) async fn read_response(&mut self, id: u64) -> McpResult<Response> {
        loop {
            self.line.clear();
            let read = self
                .reader
                .read_line(&mut self.line)
                .await
                .map_err(|e| self.io_error("read from", e))?;
            if read == 0 {
                return Err(McpError::transport(format!(
                    "Server '{}' closed its stdout while a response was pending",
                    self.server
                )));
            }

            let text = self.line.trim();
            if text.is_empty() {
                continue;
            }
            debug!(server = %self.server, "Stdout: {}", text);

            let value: Value = match serde_json::from_str(text) {
                Ok(value) => value,
                Err(e) => {
                    warn!(server = %self.server, error = %e, "Skipping non JSON-RPC line on stdout");
                    continue;
                }
            };

            if value.get("method").is_some() {
                self.handle_server_message(value).await?;
                continue;
            }

            if value.get("result").is_none() && value.get("error").is_none() {
                warn!(server = %self.server, "Received JSON is not a recognizable RPC message: {}", text);
                continue;
            }

            let response: Response = serde_json::from_value(value).map_err(|e| {
                McpError::transport(format!("Malformed response from '{}': {}", self.server, e))
            })?;

            if response.id.as_u64() == Some(id) {
                return Ok(response);
            }
            warn!(
                server = %self.server,
                expected = id,
                received = %response.id,
                "Ignoring response for unknown or timed-out request"
            );
        }
    }

    async fn handle_server_message(&mut self, message: Value) -> McpResult<()> {
        let method = message
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        match (method.as_str(), message.get("id").cloned()) {
            ("ping", Some(id)) => {
                debug!(server = %self.server, "Answering server ping");
                self.send(&Response::success(id, json!({}))).await
            }
            (_, Some(id)) => {
                warn!(server = %self.server, method = %method, "Rejecting unsupported server request");
                self.send(&Response::failure(
                    id,
                    -32601,
                    format!("Method not found: {}", method),
                ))
                .await
            }
            (_, None) => {
                debug!(server = %self.server, method = %method, "Received server notification");
                Ok(())
            }
        }
    }

    /// Closes stdin, the MCP signal for the server to exit.
    pub(crate) async fn close(mut self) -> McpResult<()> {
        self.writer
            .shutdown()
            .await
            .map_err(|e| self.io_error("close", e))
    }

    fn io_error(&self, action: &str, e: std::io::Error) -> McpError {
        McpError::transport(format!("Failed to {} stdio of '{}': {}", action, self.server, e))
    }
}

/// Forwards the server's stderr into the log until the pipe closes.
pub(crate) fn spawn_stderr_forwarder(server: String, stderr: ChildStderr) -> JoinHandle<()> {
    task::spawn(async move {
        let mut reader = BufReader::new(stderr);
        let mut line = String::new();
        loop {
            line.clear();
            match reader.read_line(&mut line).await {
                Ok(0) => {
                    info!("MCP Server '{}' stderr closed", server);
                    break;
                }
                Ok(_) => warn!("[MCP stderr - {}]: {}", server, line.trim_end()),
                Err(e) => {
                    error!("Error reading MCP stderr for '{}': {}", server, e);
                    break;
                }
            }
        }
    })
}
