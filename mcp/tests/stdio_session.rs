use gemini_core::McpConfig;
use gemini_mcp::{
    to_function_declarations, EndpointDescriptor, McpError, SessionState, StdioSession,
    ToolTransport,
};
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use tempfile::TempDir;

fn calculator() -> EndpointDescriptor {
    EndpointDescriptor::with_kind(env!("CARGO_BIN_EXE_calculator-mcp"), "executable")
}

fn test_config() -> McpConfig {
    McpConfig {
        init_timeout_secs: 10,
        tool_timeout_secs: 10,
        shutdown_grace_ms: 2000,
        ..Default::default()
    }
}

fn args(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
}

/// Writes a shell script under a `.py` name; the session runs it through
/// `python_command`, which the tests point at `sh`.
fn shell_server(dir: &TempDir, body: &str) -> (McpConfig, EndpointDescriptor) {
    let path: PathBuf = dir.path().join("server.py");
    std::fs::write(&path, body).unwrap();
    let config = McpConfig {
        python_command: "sh".to_string(),
        init_timeout_secs: 1,
        shutdown_grace_ms: 200,
        ..test_config()
    };
    (config, EndpointDescriptor::new(path))
}

#[tokio::test]
async fn test_connect_and_list_tools() {
    let mut session = StdioSession::new(test_config());
    session.connect(&calculator()).await.unwrap();
    assert_eq!(session.state(), SessionState::Ready);
    assert!(session.is_connected());

    let tools = session.list_tools().await.unwrap();
    let names: Vec<_> = tools.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, ["add", "subtract", "multiply", "divide"]);
    assert_eq!(session.tool_names(), names);

    let declarations = to_function_declarations(&tools).unwrap();
    assert_eq!(declarations.len(), 4);
    assert_eq!(declarations[3].parameters, Some(tools[3].input_schema.clone()));

    session.disconnect().await;
    assert_eq!(session.state(), SessionState::Disconnected);
}

#[tokio::test]
async fn test_call_tool_returns_server_content() {
    let mut session = StdioSession::new(test_config());
    session.connect(&calculator()).await.unwrap();

    let result = session
        .call_tool("divide", args(json!({"a": 11, "b": 3})))
        .await
        .unwrap();
    assert_eq!(result.text(), "quotient: 3, remainder: 2");

    // Log notifications sent ahead of the response are skipped.
    let result = session
        .call_tool("multiply", args(json!({"a": 6, "b": 7})))
        .await
        .unwrap();
    assert_eq!(result.text(), "42");

    session.disconnect().await;
}

#[tokio::test]
async fn test_unknown_tool_is_not_found() {
    let mut session = StdioSession::new(test_config());
    session.connect(&calculator()).await.unwrap();

    let err = session
        .call_tool("modulo", args(json!({"a": 1, "b": 2})))
        .await
        .unwrap_err();
    assert!(matches!(err, McpError::ToolNotFound(ref name) if name == "modulo"));
    // The session stays usable.
    assert!(session.is_connected());

    session.disconnect().await;
}

#[tokio::test]
async fn test_tool_error_is_execution_error() {
    let mut session = StdioSession::new(test_config());
    session.connect(&calculator()).await.unwrap();

    let err = session
        .call_tool("divide", args(json!({"a": 1, "b": 0})))
        .await
        .unwrap_err();
    match err {
        McpError::ToolExecutionError { tool, message } => {
            assert_eq!(tool, "divide");
            assert!(message.contains("divide by zero"), "message: {}", message);
        }
        other => panic!("unexpected error: {:?}", other),
    }

    // Bad arguments come back as a JSON-RPC error.
    let err = session
        .call_tool("add", args(json!({"a": "one", "b": 2})))
        .await
        .unwrap_err();
    assert!(matches!(err, McpError::ToolExecutionError { ref tool, .. } if tool == "add"));

    session.disconnect().await;
}

#[tokio::test]
async fn test_operations_require_connection() {
    let mut session = StdioSession::new(test_config());

    let err = session.list_tools().await.unwrap_err();
    assert!(matches!(err, McpError::TransportError(_)));
    let err = session.call_tool("add", Map::new()).await.unwrap_err();
    assert!(matches!(err, McpError::TransportError(_)));
}

#[tokio::test]
async fn test_unsupported_kind_spawns_nothing() {
    let mut session = StdioSession::new(test_config());

    let err = session
        .connect(&EndpointDescriptor::new("server.rb"))
        .await
        .unwrap_err();
    assert!(matches!(err, McpError::UnsupportedEndpointKind(_)));
    assert_eq!(session.state(), SessionState::Disconnected);

    // Nothing was started, so the session can still be used.
    session.connect(&calculator()).await.unwrap();
    session.disconnect().await;
}

#[tokio::test]
async fn test_session_is_single_use() {
    let mut session = StdioSession::new(test_config());
    session.connect(&calculator()).await.unwrap();
    session.disconnect().await;

    let err = session.connect(&calculator()).await.unwrap_err();
    assert!(matches!(err, McpError::TransportError(_)));
    assert_eq!(session.state(), SessionState::Disconnected);
}

#[tokio::test]
async fn test_disconnect_is_idempotent() {
    let mut session = StdioSession::new(test_config());
    // Never connected.
    session.disconnect().await;

    session.connect(&calculator()).await.unwrap();
    session.disconnect().await;
    session.disconnect().await;
    assert_eq!(session.state(), SessionState::Disconnected);
}

#[tokio::test]
async fn test_spawn_failure_leaves_session_disconnected() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("no-such-server");

    let mut session = StdioSession::new(test_config());
    let err = session
        .connect(&EndpointDescriptor::with_kind(missing, "executable"))
        .await
        .unwrap_err();
    assert!(matches!(err, McpError::TransportError(_)));
    assert_eq!(session.state(), SessionState::Disconnected);

    session.disconnect().await;
    assert_eq!(session.state(), SessionState::Disconnected);
}

#[tokio::test]
async fn test_server_exiting_during_handshake() {
    let dir = TempDir::new().unwrap();
    let (config, endpoint) = shell_server(&dir, "echo starting >&2\nexit 0\n");

    let mut session = StdioSession::new(config);
    let err = session.connect(&endpoint).await.unwrap_err();
    assert!(matches!(err, McpError::TransportError(_)));
    assert_eq!(session.state(), SessionState::Disconnected);
}

#[tokio::test]
async fn test_handshake_timeout() {
    let dir = TempDir::new().unwrap();
    let (config, endpoint) = shell_server(&dir, "sleep 30\n");

    let mut session = StdioSession::new(config);
    let started = std::time::Instant::now();
    let err = session.connect(&endpoint).await.unwrap_err();
    match err {
        McpError::TransportError(message) => assert!(message.contains("Timeout"), "{}", message),
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(session.state(), SessionState::Disconnected);
    // The hung server is killed rather than waited on.
    assert!(started.elapsed() < std::time::Duration::from_secs(10));
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_disconnect_after_cancelled_connect() {
    let dir = TempDir::new().unwrap();
    let pid_file = dir.path().join("server.pid");
    let (config, endpoint) = shell_server(
        &dir,
        &format!("echo $$ > '{}'\nsleep 30\n", pid_file.display()),
    );

    let mut session = StdioSession::new(config);
    let cancelled =
        tokio::time::timeout(std::time::Duration::from_millis(500), session.connect(&endpoint))
            .await;
    assert!(cancelled.is_err());
    assert_eq!(session.state(), SessionState::Connecting);

    let pid = std::fs::read_to_string(&pid_file).unwrap().trim().to_string();
    assert!(PathBuf::from(format!("/proc/{}", pid)).exists());

    let started = std::time::Instant::now();
    session.disconnect().await;
    assert!(started.elapsed() < std::time::Duration::from_secs(5));
    assert_eq!(session.state(), SessionState::Disconnected);
    assert!(!PathBuf::from(format!("/proc/{}", pid)).exists());

    session.disconnect().await;
    assert_eq!(session.state(), SessionState::Disconnected);
}

#[tokio::test]
async fn test_tool_timeout_closes_session() {
    let dir = TempDir::new().unwrap();
    // Answers the handshake and the catalog, then never answers a call.
    let script = r#"read line
echo '{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":"2024-11-05","capabilities":{"tools":{}},"serverInfo":{"name":"stalling","version":"0"}}}'
read line
read line
echo '{"jsonrpc":"2.0","id":2,"result":{"tools":[{"name":"wait","inputSchema":{"type":"object"}}]}}'
sleep 30
"#;
    let (mut config, endpoint) = shell_server(&dir, script);
    config.tool_timeout_secs = 1;

    let mut session = StdioSession::new(config);
    session.connect(&endpoint).await.unwrap();
    assert_eq!(session.tool_names(), ["wait"]);

    let err = session.call_tool("wait", Map::new()).await.unwrap_err();
    match err {
        McpError::TransportError(message) => assert!(message.contains("Timeout"), "{}", message),
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(session.state(), SessionState::Disconnected);

    // Nothing is sent over the abandoned pipes.
    let err = session.call_tool("wait", Map::new()).await.unwrap_err();
    assert!(matches!(err, McpError::TransportError(_)));
    session.disconnect().await;
}
