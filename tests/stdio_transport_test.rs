//! Stdio transport integration tests
//!
//! Exercises the full stdio pipeline against the `mock_mcp_server`
//! subprocess: spawning, the `initialize` handshake, tool listing and
//! calls, async tool polling, and the shutdown sequence.
//!
//! The `mock_mcp_server` binary must be built before running these
//! tests. The harness locates it via the `CARGO_BIN_EXE_mock_mcp_server`
//! environment variable that Cargo injects automatically when running
//! integration tests.

use std::collections::HashMap;
use std::time::Duration;

use mcpcheck::harness::protocol::{ProtocolAdapter, ProtocolVersion, SessionState};
use mcpcheck::harness::transport::stdio::StdioTransport;
use mcpcheck::harness::transport::Transport;

fn mock_server_exe() -> String {
    env!("CARGO_BIN_EXE_mock_mcp_server").to_string()
}

async fn started_transport() -> StdioTransport {
    let mut transport = StdioTransport::new(mock_server_exe(), vec![], HashMap::new());
    assert!(transport.start().await, "failed to start mock_mcp_server");
    transport
}

async fn ready_adapter(version: ProtocolVersion) -> ProtocolAdapter {
    let transport = started_transport().await;
    let mut adapter = ProtocolAdapter::new(Box::new(transport), version);
    adapter.initialize(None).await.expect("initialize failed");
    adapter
        .send_initialized()
        .await
        .expect("initialized notification failed");
    adapter
}

#[tokio::test]
async fn test_initialize_handshake_against_mock_server() {
    let mut adapter = ready_adapter(ProtocolVersion::V2024_11_05).await;

    assert_eq!(adapter.state(), SessionState::Ready);
    assert_eq!(adapter.negotiated_version(), Some("2024-11-05"));
    assert!(adapter.server_capabilities().get("tools").is_some());
    assert_eq!(adapter.server_info()["name"], "mock-mcp-server");

    adapter.stop_transport().await;
}

#[tokio::test]
async fn test_list_and_call_tools() {
    let mut adapter = ready_adapter(ProtocolVersion::V2024_11_05).await;

    let tools = adapter.list_tools().await.unwrap();
    assert_eq!(tools.len(), 2);
    assert_eq!(tools[0]["name"], "echo");

    let result = adapter
        .call_tool("echo", serde_json::json!({"message": "roundtrip"}))
        .await
        .unwrap();
    assert_eq!(result["content"][0]["text"], "roundtrip");
    assert_eq!(result["isError"], false);

    adapter.stop_transport().await;
}

#[tokio::test]
async fn test_call_tool_missing_argument_is_rejected() {
    let mut adapter = ready_adapter(ProtocolVersion::V2024_11_05).await;

    let err = adapter
        .call_tool("echo", serde_json::json!({}))
        .await
        .unwrap_err();
    let rejection = err
        .downcast_ref::<mcpcheck::McpCheckError>()
        .expect("expected a server rejection");
    assert!(rejection.is_invalid_params());

    adapter.stop_transport().await;
}

#[tokio::test]
async fn test_async_tool_call_polling_and_cancellation() {
    let mut adapter = ready_adapter(ProtocolVersion::V2025_03_26).await;

    // A sleep call stays running on the first poll and can be
    // cancelled.
    let call = adapter
        .call_tool_async("sleep", serde_json::json!({"duration": 10}))
        .await
        .unwrap();
    let first = adapter.get_tool_result(&call.id).await.unwrap();
    assert_eq!(first["status"], "running");

    adapter.cancel_tool_call(&call.id).await.unwrap();
    let status = adapter.get_tool_result(&call.id).await.unwrap();
    assert_eq!(status["status"], "cancelled");
    assert!(adapter.pending_async_calls().is_empty());

    adapter.stop_transport().await;
}

#[tokio::test]
async fn test_async_wait_for_completion() {
    let mut adapter = ready_adapter(ProtocolVersion::V2025_03_26).await;

    let call = adapter
        .call_tool_async("echo", serde_json::json!({"message": "hi"}))
        .await
        .unwrap();
    let result = adapter
        .wait_for_tool_completion(&call.id, Duration::from_secs(5), Duration::from_millis(50))
        .await
        .unwrap();
    assert_eq!(result["status"], "completed");

    adapter.stop_transport().await;
}

#[tokio::test]
async fn test_ping_and_shutdown_sequence() {
    let mut adapter = ready_adapter(ProtocolVersion::V2024_11_05).await;

    adapter.ping().await.unwrap();
    adapter.shutdown().await.unwrap();
    assert_eq!(adapter.state(), SessionState::ShuttingDown);
    adapter.exit().await.unwrap();
    assert_eq!(adapter.state(), SessionState::Exited);

    adapter.stop_transport().await;
}

#[tokio::test]
async fn test_2025_06_18_validations_against_mock_server() {
    let mut adapter = ready_adapter(ProtocolVersion::V2025_06_18).await;

    // Ping must be exactly the empty object.
    adapter.ping().await.unwrap();

    // Tool results must carry content + isError.
    let result = adapter
        .call_tool_structured("echo", serde_json::json!({"message": "structured"}))
        .await
        .unwrap();
    assert_eq!(result["structuredContent"]["message"], "structured");

    // Resource reads go through resources/read with contents.
    let resources = adapter.list_resources().await.unwrap();
    let uri = resources[0]["uri"].as_str().unwrap().to_string();
    let data = adapter.read_resource(&uri).await.unwrap();
    assert_eq!(data["contents"][0]["uri"], "mock://greeting");

    adapter.stop_transport().await;
}

#[tokio::test]
async fn test_batch_roundtrip_on_permitted_revision() {
    let mut adapter = ready_adapter(ProtocolVersion::V2025_03_26).await;

    let batch = vec![
        mcpcheck::harness::types::JsonRpcRequest::new("b1", "ping", Some(serde_json::json!({}))),
        mcpcheck::harness::types::JsonRpcRequest::new("b2", "ping", Some(serde_json::json!({}))),
    ];
    let responses = adapter.send_batch(batch).await.unwrap();
    assert_eq!(responses.len(), 2);
    assert!(responses.iter().all(|r| r.is_well_formed()));

    adapter.stop_transport().await;
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let mut transport = started_transport().await;
    assert!(transport.stop().await);
    assert!(transport.stop().await);
}
