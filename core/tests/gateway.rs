use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use gemini_core::{
    CompletionGateway, Conversation, GeminiClient, GeminiConfig, GeminiError, Message,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone, Default)]
struct Recorded {
    bodies: Arc<Mutex<Vec<Value>>>,
    keys: Arc<Mutex<Vec<String>>>,
}

async fn spawn_fake_gemini(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}/v1beta", addr)
}

fn client_for(base_url: String, timeout_secs: u64) -> GeminiClient {
    GeminiClient::new(GeminiConfig {
        api_key: Some("test-key".to_string()),
        base_url: Some(base_url),
        model_name: Some("gemini-test".to_string()),
        request_timeout_secs: Some(timeout_secs),
        ..GeminiConfig::default()
    })
    .unwrap()
}

#[tokio::test]
async fn test_complete_round_trip_against_fake_endpoint() {
    let recorded = Recorded::default();
    let router = Router::new()
        .route(
            "/v1beta/models/*rest",
            post(
                |State(rec): State<Recorded>,
                 headers: axum::http::HeaderMap,
                 Json(body): Json<Value>| async move {
                    rec.bodies.lock().unwrap().push(body);
                    if let Some(key) = headers.get("x-goog-api-key") {
                        rec.keys.lock().unwrap().push(key.to_str().unwrap().to_string());
                    }
                    Json(json!({
                        "candidates": [{
                            "content": {"role": "model", "parts": [{"text": "Hello there"}]},
                            "finishReason": "STOP"
                        }]
                    }))
                },
            ),
        )
        .with_state(recorded.clone());

    let client = client_for(spawn_fake_gemini(router).await, 5);
    let completion = client
        .complete(&Conversation::from_query("hi"), &[])
        .await
        .unwrap();

    assert_eq!(completion.text, "Hello there");
    assert!(completion.tool_calls.is_empty());

    let bodies = recorded.bodies.lock().unwrap();
    assert_eq!(bodies.len(), 1);
    assert!(bodies[0].get("tools").is_none());
    assert_eq!(bodies[0]["contents"][0]["parts"][0]["text"], "hi");
    assert_eq!(recorded.keys.lock().unwrap().as_slice(), ["test-key"]);
}

#[tokio::test]
async fn test_follow_up_carries_function_response() {
    let recorded = Recorded::default();
    let router = Router::new()
        .route(
            "/v1beta/models/*rest",
            post(
                |State(rec): State<Recorded>, Json(body): Json<Value>| async move {
                    rec.bodies.lock().unwrap().push(body);
                    Json(json!({
                        "candidates": [{"content": {"parts": [{"text": "The remainder is 2."}]}}]
                    }))
                },
            ),
        )
        .with_state(recorded.clone());

    let client = client_for(spawn_fake_gemini(router).await, 5);
    let request = gemini_core::ToolInvocationRequest {
        id: "call-1".to_string(),
        name: "divide".to_string(),
        arguments: json!({"a": 11, "b": 3}).as_object().cloned().unwrap(),
        from_model: false,
    };
    let mut conversation = Conversation::from_query("What is the remainder if I divide 11 by 3?");
    conversation.push(Message::ai("", vec![request.clone()]));
    conversation.push(Message::tool_result(
        &request,
        json!([{"type": "text", "text": "quotient: 3, remainder: 2"}]),
    ));

    let completion = client.complete(&conversation, &[]).await.unwrap();
    assert!(completion.text.contains('2'));

    let bodies = recorded.bodies.lock().unwrap();
    let contents = bodies[0]["contents"].as_array().unwrap();
    assert_eq!(contents.len(), 3);
    assert_eq!(contents[1]["parts"][0]["functionCall"]["name"], "divide");
    assert_eq!(
        contents[2]["parts"][0]["functionResponse"]["name"],
        "divide"
    );
}

#[tokio::test]
async fn test_server_error_is_gateway_unavailable() {
    let router = Router::new().route(
        "/v1beta/models/*rest",
        post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "overloaded").into_response() }),
    );

    let client = client_for(spawn_fake_gemini(router).await, 5);
    let err = client
        .complete(&Conversation::from_query("hi"), &[])
        .await
        .unwrap_err();

    match err {
        GeminiError::GatewayUnavailable { status, message } => {
            assert_eq!(status, Some(503));
            assert!(message.contains("overloaded"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_unreachable_endpoint_is_gateway_unavailable() {
    // Bind and immediately drop to get a port nothing listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client_for(format!("http://{}/v1beta", addr), 5);
    let err = client
        .complete(&Conversation::from_query("hi"), &[])
        .await
        .unwrap_err();
    assert!(matches!(err, GeminiError::GatewayUnavailable { status: None, .. }));
}

#[tokio::test]
async fn test_slow_endpoint_is_gateway_timeout() {
    let router = Router::new().route(
        "/v1beta/models/*rest",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Json(json!({"candidates": []}))
        }),
    );

    let client = client_for(spawn_fake_gemini(router).await, 1);
    let err = client
        .complete(&Conversation::from_query("hi"), &[])
        .await
        .unwrap_err();
    assert!(matches!(err, GeminiError::GatewayTimeout(1)));
}

#[tokio::test]
async fn test_malformed_body_is_invalid_response() {
    let router = Router::new().route(
        "/v1beta/models/*rest",
        post(|| async { "definitely not json" }),
    );

    let client = client_for(spawn_fake_gemini(router).await, 5);
    let err = client
        .complete(&Conversation::from_query("hi"), &[])
        .await
        .unwrap_err();
    assert!(matches!(err, GeminiError::InvalidResponse(_)));
}
