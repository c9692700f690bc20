//! JSON-RPC 2.0 wire types and MCP method constants
//!
//! Every message exchanged with a server under test is one of the three
//! JSON-RPC 2.0 shapes defined here. Requests carry an `id` and a `method`;
//! responses carry an `id` and exactly one of `result`/`error`; notifications
//! carry a `method` and no `id`. All messages include `"jsonrpc": "2.0"`.
//!
//! Payloads are kept as raw [`serde_json::Value`]s on purpose: the harness
//! validates the shapes a server produces rather than assuming them, so a
//! lossy typed decode would hide exactly the defects the tests exist to
//! find.

use serde::{Deserialize, Serialize};

use crate::error::McpCheckError;

// ---------------------------------------------------------------------------
// Method constants
// ---------------------------------------------------------------------------

/// Lifecycle: client opens a session.
pub const METHOD_INITIALIZE: &str = "initialize";
/// Lifecycle: client signals readiness after the server ACKs `initialize`.
pub const METHOD_INITIALIZED: &str = "initialized";
/// Lifecycle: client requests an orderly shutdown.
pub const METHOD_SHUTDOWN: &str = "shutdown";
/// Lifecycle: client notifies that it is exiting.
pub const METHOD_EXIT: &str = "exit";
/// Keepalive ping.
pub const METHOD_PING: &str = "ping";
/// Request the list of available tools.
pub const METHOD_TOOLS_LIST: &str = "tools/list";
/// Invoke a named tool synchronously.
pub const METHOD_TOOLS_CALL: &str = "tools/call";
/// Invoke a named tool asynchronously (2025-03-26).
pub const METHOD_TOOLS_CALL_ASYNC: &str = "tools/call-async";
/// Poll the status/result of an async tool call (2025-03-26).
pub const METHOD_TOOLS_RESULT: &str = "tools/result";
/// Request cancellation of an async tool call (2025-03-26).
pub const METHOD_TOOLS_CANCEL: &str = "tools/cancel";
/// Request the list of available resources.
pub const METHOD_RESOURCES_LIST: &str = "resources/list";
/// Read a resource by `id` (2024-11-05 / 2025-03-26).
pub const METHOD_RESOURCES_GET: &str = "resources/get";
/// Read a resource by `uri` (2025-06-18).
pub const METHOD_RESOURCES_READ: &str = "resources/read";
/// Server solicits structured user input (2025-06-18).
pub const METHOD_ELICITATION_CREATE: &str = "elicitation/create";

/// Terminal statuses for an async tool call.
pub const ASYNC_TERMINAL_STATUSES: &[&str] = &["completed", "error", "cancelled"];

// ---------------------------------------------------------------------------
// JSON-RPC 2.0 wire types
// ---------------------------------------------------------------------------

/// A JSON-RPC 2.0 request object.
///
/// `jsonrpc` MUST always be `"2.0"` and `id` MUST be unique per session.
///
/// # Examples
///
/// ```
/// use mcpcheck::harness::types::JsonRpcRequest;
///
/// let req = JsonRpcRequest::new("ping-1", "ping", Some(serde_json::json!({})));
/// assert_eq!(req.jsonrpc, "2.0");
/// assert_eq!(req.method, "ping");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcRequest {
    /// Protocol version identifier; always `"2.0"`.
    pub jsonrpc: String,
    /// Request correlation identifier, unique per session.
    pub id: serde_json::Value,
    /// The method name to invoke.
    pub method: String,
    /// Optional method parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl JsonRpcRequest {
    /// Build a request with a string id.
    pub fn new(
        id: impl Into<String>,
        method: impl Into<String>,
        params: Option<serde_json::Value>,
    ) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: serde_json::Value::String(id.into()),
            method: method.into(),
            params,
        }
    }
}

/// A JSON-RPC 2.0 notification object (no `id`, no response expected).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcNotification {
    /// Protocol version identifier; always `"2.0"`.
    pub jsonrpc: String,
    /// The method name to invoke.
    pub method: String,
    /// Optional method parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl JsonRpcNotification {
    /// Build a notification.
    pub fn new(method: impl Into<String>, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.into(),
            params,
        }
    }
}

/// The `error` member of a JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcErrorObject {
    /// Numeric error code.
    pub code: i64,
    /// Short human-readable description.
    pub message: String,
    /// Optional structured error details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// A JSON-RPC 2.0 response object.
///
/// A well-formed response carries exactly one of `result`/`error`; the
/// harness validates this instead of assuming it (see
/// [`JsonRpcResponse::is_well_formed`]).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcResponse {
    /// Protocol version identifier; always `"2.0"`.
    pub jsonrpc: String,
    /// Correlation identifier copied from the request.
    #[serde(default)]
    pub id: serde_json::Value,
    /// Success payload; mutually exclusive with `error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Failure payload; mutually exclusive with `result`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcErrorObject>,
}

impl JsonRpcResponse {
    /// True when exactly one of `result`/`error` is present and the
    /// `jsonrpc` marker is `"2.0"`.
    pub fn is_well_formed(&self) -> bool {
        self.jsonrpc == "2.0" && (self.result.is_some() ^ self.error.is_some())
    }

    /// Convert the response into its `result` payload, mapping a JSON-RPC
    /// error object to [`McpCheckError::ServerRejected`].
    ///
    /// A response carrying neither member is a transport-level defect and
    /// maps to [`McpCheckError::Transport`].
    ///
    /// # Errors
    ///
    /// Returns `ServerRejected` for error responses and `Transport` for
    /// responses with no payload at all.
    pub fn into_result(self) -> Result<serde_json::Value, McpCheckError> {
        if let Some(err) = self.error {
            return Err(McpCheckError::ServerRejected {
                code: err.code,
                message: err.message,
            });
        }
        self.result.ok_or_else(|| {
            McpCheckError::Transport("response carried neither result nor error".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serializes_with_jsonrpc_marker() {
        let req = JsonRpcRequest::new("init", METHOD_INITIALIZE, Some(serde_json::json!({})));
        let raw = serde_json::to_value(&req).unwrap();
        assert_eq!(raw["jsonrpc"], "2.0");
        assert_eq!(raw["id"], "init");
        assert_eq!(raw["method"], "initialize");
    }

    #[test]
    fn test_request_omits_absent_params() {
        let req = JsonRpcRequest::new("tools_list", METHOD_TOOLS_LIST, None);
        let raw = serde_json::to_string(&req).unwrap();
        assert!(!raw.contains("params"));
    }

    #[test]
    fn test_notification_has_no_id() {
        let note = JsonRpcNotification::new(METHOD_INITIALIZED, Some(serde_json::json!({})));
        let raw = serde_json::to_value(&note).unwrap();
        assert!(raw.get("id").is_none());
        assert_eq!(raw["method"], "initialized");
    }

    #[test]
    fn test_response_well_formed_result_only() {
        let resp: JsonRpcResponse = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":"x","result":{}}"#,
        )
        .unwrap();
        assert!(resp.is_well_formed());
    }

    #[test]
    fn test_response_well_formed_error_only() {
        let resp: JsonRpcResponse = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":"x","error":{"code":-32601,"message":"Method not found"}}"#,
        )
        .unwrap();
        assert!(resp.is_well_formed());
    }

    #[test]
    fn test_response_with_both_members_is_malformed() {
        let resp: JsonRpcResponse = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":"x","result":{},"error":{"code":1,"message":"m"}}"#,
        )
        .unwrap();
        assert!(!resp.is_well_formed());
    }

    #[test]
    fn test_into_result_maps_error_to_server_rejected() {
        let resp: JsonRpcResponse = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":"x","error":{"code":-32602,"message":"Invalid params"}}"#,
        )
        .unwrap();
        let err = resp.into_result().unwrap_err();
        assert!(err.is_invalid_params());
    }

    #[test]
    fn test_into_result_returns_payload() {
        let resp: JsonRpcResponse =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":1,"result":{"ok":true}}"#).unwrap();
        let value = resp.into_result().unwrap();
        assert_eq!(value["ok"], true);
    }

    #[test]
    fn test_into_result_empty_response_is_transport_error() {
        let resp: JsonRpcResponse =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":1}"#).unwrap();
        let err = resp.into_result().unwrap_err();
        assert!(matches!(err, McpCheckError::Transport(_)));
    }

    #[test]
    fn test_error_object_data_roundtrip() {
        let obj = JsonRpcErrorObject {
            code: -32000,
            message: "server error".to_string(),
            data: Some(serde_json::json!({"detail": "backend unavailable"})),
        };
        let raw = serde_json::to_string(&obj).unwrap();
        let back: JsonRpcErrorObject = serde_json::from_str(&raw).unwrap();
        assert_eq!(back, obj);
    }
}
