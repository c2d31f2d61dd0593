// Reference MCP server exposing integer arithmetic tools over stdio.

use gemini_mcp::rpc::{CallToolParams, Notification, Request, Response, PROTOCOL_VERSION};
use serde_json::{json, Value};
use std::error::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter, Stdout};
use tracing::{debug, error, info, warn};

const TOOLS: &[(&str, &str)] = &[
    ("add", "Add two integers"),
    ("subtract", "Subtract b from a"),
    ("multiply", "Multiply two integers"),
    ("divide", "Divide a by b, returning the integer quotient and the remainder"),
];

fn tool_list() -> Value {
    let tools: Vec<Value> = TOOLS
        .iter()
        .map(|(name, description)| {
            json!({
                "name": name,
                "description": description,
                "inputSchema": {
                    "type": "object",
                    "title": format!("{}Arguments", name),
                    "properties": {
                        "a": {"type": "integer", "title": "A"},
                        "b": {"type": "integer", "title": "B"}
                    },
                    "required": ["a", "b"]
                }
            })
        })
        .collect();
    json!({ "tools": tools })
}

fn text_result(text: String, is_error: bool) -> Value {
    json!({
        "content": [{"type": "text", "text": text}],
        "isError": is_error
    })
}

// --- Tool evaluation: Ok(result) or Err(JSON-RPC error) ---
fn call_tool(params: CallToolParams) -> Result<Value, (i64, String)> {
    if !TOOLS.iter().any(|(name, _)| *name == params.name) {
        return Err((-32602, format!("Unknown tool: {}", params.name)));
    }

    let operand = |key: &str| {
        params
            .arguments
            .get(key)
            .and_then(Value::as_i64)
            .ok_or_else(|| (-32602, format!("Argument '{}' must be an integer", key)))
    };
    let (a, b) = (operand("a")?, operand("b")?);

    let result = match params.name.as_str() {
        "add" => a.checked_add(b).map(|v| v.to_string()),
        "subtract" => a.checked_sub(b).map(|v| v.to_string()),
        "multiply" => a.checked_mul(b).map(|v| v.to_string()),
        _ => {
            if b == 0 {
                return Ok(text_result("Cannot divide by zero".to_string(), true));
            }
            a.checked_div(b)
                .zip(a.checked_rem(b))
                .map(|(q, r)| format!("quotient: {}, remainder: {}", q, r))
        }
    };

    Ok(match result {
        Some(text) => text_result(text, false),
        None => text_result("Integer overflow".to_string(), true),
    })
}

async fn send<T: serde::Serialize>(
    writer: &mut BufWriter<Stdout>,
    message: &T,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let json = serde_json::to_string(message)?;
    writer.write_all(json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

// --- Function to handle all incoming requests ---
async fn handle_request(
    request: Request,
    writer: &mut BufWriter<Stdout>,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let Some(id) = request.id.clone() else {
        debug!("Received notification '{}'", request.method);
        return Ok(());
    };

    let response = match request.method.as_str() {
        "initialize" => {
            info!("Handling initialize request");
            Response::success(
                id,
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {"tools": {}},
                    "serverInfo": {"name": "calculator-mcp", "version": env!("CARGO_PKG_VERSION")}
                }),
            )
        }
        "ping" => Response::success(id, json!({})),
        "tools/list" => Response::success(id, tool_list()),
        "tools/call" => {
            let params = request.params.clone().unwrap_or_else(|| json!({}));
            match serde_json::from_value::<CallToolParams>(params) {
                Ok(params) => {
                    info!("Handling tools/call for '{}'", params.name);
                    // Log notifications may interleave with responses on stdout.
                    let log = Notification::new(
                        "notifications/message",
                        Some(json!({"level": "info", "data": format!("calling {}", params.name)})),
                    );
                    send(writer, &log).await?;

                    match call_tool(params) {
                        Ok(result) => Response::success(id, result),
                        Err((code, message)) => Response::failure(id, code, message),
                    }
                }
                Err(e) => Response::failure(id, -32602, format!("Invalid params: {}", e)),
            }
        }
        other => Response::failure(id, -32601, format!("Method not found: {}", other)),
    };

    send(writer, &response).await
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    // stdout carries the protocol, so logs go to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    info!("Starting calculator MCP server...");

    let mut stdout = BufWriter::new(tokio::io::stdout());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<Request>(&line) {
            Ok(request) => {
                if let Err(e) = handle_request(request, &mut stdout).await {
                    error!("Error handling request: {}", e);
                    break;
                }
            }
            Err(e) => {
                warn!("Failed to parse JSON-RPC request: {}", e);
                let response = Response::failure(Value::Null, -32700, format!("Parse error: {}", e));
                send(&mut stdout, &response).await?;
            }
        }
    }

    info!("Calculator MCP server shutting down (stdin closed).");
    Ok(())
}
