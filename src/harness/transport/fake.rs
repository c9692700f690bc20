//! Scripted in-process transport used by unit tests
//!
//! [`FakeTransport`] plays back a queue of canned responses and records
//! every message it was asked to send, so protocol and runner tests can
//! run without a real server process.

use std::collections::VecDeque;

use crate::error::{McpCheckError, Result};
use crate::harness::transport::Transport;
use crate::harness::types::{
    JsonRpcErrorObject, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
};

/// In-process transport double.
///
/// Responses are dequeued in FIFO order; a queued response whose `id` is
/// `null` has the outgoing request's id substituted, so scripts do not
/// need to predict generated request ids.
#[derive(Debug, Default)]
pub struct FakeTransport {
    /// Canned responses, consumed front-to-back.
    queue: VecDeque<JsonRpcResponse>,
    /// Canned batch responses, one entry per expected batch call.
    batch_queue: VecDeque<Vec<JsonRpcResponse>>,
    /// Every request sent, in order.
    pub requests: Vec<JsonRpcRequest>,
    /// Every notification sent, in order.
    pub notifications: Vec<JsonRpcNotification>,
    /// When set, `start()` reports failure.
    pub fail_start: bool,
    /// Kind reported to transport-specific tests; stdio unless overridden.
    pub reported_kind: Option<crate::harness::transport::TransportKind>,
    /// Number of `stop()` calls observed.
    pub stop_calls: usize,
    started: bool,
}

impl FakeTransport {
    /// Create an empty fake.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a success response carrying `result`. The response id is
    /// auto-filled from the matching request.
    pub fn enqueue_result(&mut self, result: serde_json::Value) {
        self.queue.push_back(JsonRpcResponse {
            jsonrpc: "2.0".to_string(),
            id: serde_json::Value::Null,
            result: Some(result),
            error: None,
        });
    }

    /// Queue an error response with `code` and `message`.
    pub fn enqueue_error(&mut self, code: i64, message: &str) {
        self.queue.push_back(JsonRpcResponse {
            jsonrpc: "2.0".to_string(),
            id: serde_json::Value::Null,
            result: None,
            error: Some(JsonRpcErrorObject {
                code,
                message: message.to_string(),
                data: None,
            }),
        });
    }

    /// Queue one batch worth of responses.
    pub fn enqueue_batch(&mut self, responses: Vec<JsonRpcResponse>) {
        self.batch_queue.push_back(responses);
    }

    /// Method name of the `n`-th request sent, for assertions.
    pub fn sent_method(&self, n: usize) -> Option<&str> {
        self.requests.get(n).map(|r| r.method.as_str())
    }
}

#[async_trait::async_trait]
impl Transport for FakeTransport {
    fn kind(&self) -> crate::harness::transport::TransportKind {
        self.reported_kind
            .unwrap_or(crate::harness::transport::TransportKind::Stdio)
    }

    async fn start(&mut self) -> bool {
        if self.fail_start {
            return false;
        }
        self.started = true;
        true
    }

    async fn stop(&mut self) -> bool {
        self.stop_calls += 1;
        self.started = false;
        true
    }

    async fn send_request(&mut self, request: JsonRpcRequest) -> Result<JsonRpcResponse> {
        let mut response = self.queue.pop_front().ok_or_else(|| {
            anyhow::anyhow!(McpCheckError::Transport(format!(
                "fake transport has no scripted response for {}",
                request.method
            )))
        })?;
        if response.id.is_null() {
            response.id = request.id.clone();
        }
        self.requests.push(request);
        Ok(response)
    }

    async fn send_notification(&mut self, notification: JsonRpcNotification) -> Result<()> {
        self.notifications.push(notification);
        Ok(())
    }

    async fn send_batch(&mut self, requests: Vec<JsonRpcRequest>) -> Result<Vec<JsonRpcResponse>> {
        let responses = self.batch_queue.pop_front().ok_or_else(|| {
            anyhow::anyhow!(McpCheckError::Transport(
                "fake transport has no scripted batch response".to_string()
            ))
        })?;
        self.requests.extend(requests);
        Ok(responses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fake_echoes_request_id() {
        let mut fake = FakeTransport::new();
        fake.enqueue_result(serde_json::json!({"ok": true}));

        let response = fake
            .send_request(JsonRpcRequest::new("abc", "ping", None))
            .await
            .unwrap();
        assert_eq!(response.id, serde_json::json!("abc"));
        assert_eq!(fake.sent_method(0), Some("ping"));
    }

    #[tokio::test]
    async fn test_fake_exhausted_queue_errors() {
        let mut fake = FakeTransport::new();
        let err = fake
            .send_request(JsonRpcRequest::new("x", "tools/list", None))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no scripted response"));
    }

    #[tokio::test]
    async fn test_fake_fail_start() {
        let mut fake = FakeTransport::new();
        fake.fail_start = true;
        assert!(!fake.start().await);
    }

    #[tokio::test]
    async fn test_fake_records_notifications_and_stops() {
        let mut fake = FakeTransport::new();
        fake.send_notification(JsonRpcNotification::new("exit", None))
            .await
            .unwrap();
        fake.stop().await;
        fake.stop().await;
        assert_eq!(fake.notifications.len(), 1);
        assert_eq!(fake.stop_calls, 2);
    }
}
