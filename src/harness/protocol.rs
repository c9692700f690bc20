//! Version-polymorphic MCP protocol adapter
//!
//! [`ProtocolAdapter`] maps high-level protocol operations to JSON-RPC
//! messages for one protocol revision, drives the session lifecycle state
//! machine, and validates responses against that revision's invariants.
//!
//! # Lifecycle
//!
//! ```text
//! Fresh -> Initializing -> Ready -> ShuttingDown -> Exited
//! ```
//!
//! All feature operations fail with `NotInitialized` outside `Ready`. A
//! second `initialize` on a ready adapter returns the cached server
//! capabilities without another round-trip. `exit` tolerates send errors
//! (the peer may already be gone).
//!
//! # Revision differences
//!
//! - `2024-11-05`: boolean capability shorthands are normalized to object
//!   form; resource reads use `resources/get` keyed by `id`.
//! - `2025-03-26`: adds async tool calls (`tools/call-async`,
//!   `tools/result`, `tools/cancel`) with a poll-based completion wait.
//! - `2025-06-18`: tool results must carry `content` + `isError`;
//!   `resources/read` keyed by `uri` with validated contents; elicitation
//!   via `elicitation/create`; ping results must be exactly `{}`; JSON-RPC
//!   batching is rejected before the transport is touched; a protocol
//!   version mismatch fails the handshake outright.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{McpCheckError, Result};
use crate::harness::transport::Transport;
use crate::harness::types::{
    JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, ASYNC_TERMINAL_STATUSES,
    METHOD_ELICITATION_CREATE, METHOD_EXIT, METHOD_INITIALIZE, METHOD_INITIALIZED, METHOD_PING,
    METHOD_RESOURCES_GET, METHOD_RESOURCES_LIST, METHOD_RESOURCES_READ, METHOD_SHUTDOWN,
    METHOD_TOOLS_CALL, METHOD_TOOLS_CALL_ASYNC, METHOD_TOOLS_CANCEL, METHOD_TOOLS_LIST,
    METHOD_TOOLS_RESULT,
};

/// Default interval between `tools/result` polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

// ---------------------------------------------------------------------------
// Protocol revisions
// ---------------------------------------------------------------------------

/// A dated MCP protocol revision identifying one concrete wire contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolVersion {
    /// The original MCP specification.
    V2024_11_05,
    /// Adds asynchronous tool calls.
    V2025_03_26,
    /// Removes batching, adds structured output and elicitation.
    V2025_06_18,
}

impl ProtocolVersion {
    /// The wire version string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolVersion::V2024_11_05 => "2024-11-05",
            ProtocolVersion::V2025_03_26 => "2025-03-26",
            ProtocolVersion::V2025_06_18 => "2025-06-18",
        }
    }

    /// All revisions the harness can test against.
    pub fn all() -> &'static [ProtocolVersion] {
        &[
            ProtocolVersion::V2024_11_05,
            ProtocolVersion::V2025_03_26,
            ProtocolVersion::V2025_06_18,
        ]
    }

    /// Whether this revision defines the async tool-call operations.
    pub fn supports_async_tools(&self) -> bool {
        matches!(self, ProtocolVersion::V2025_03_26)
    }

    /// Whether this revision requires `content`/`isError` on tool results
    /// and forbids JSON-RPC batching.
    pub fn is_2025_06_18(&self) -> bool {
        matches!(self, ProtocolVersion::V2025_06_18)
    }

    /// Whether resource reads go through `resources/read` keyed by `uri`
    /// (newer) rather than `resources/get` keyed by `id` (older).
    pub fn reads_resources_by_uri(&self) -> bool {
        self.is_2025_06_18()
    }
}

impl FromStr for ProtocolVersion {
    type Err = McpCheckError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "2024-11-05" => Ok(ProtocolVersion::V2024_11_05),
            "2025-03-26" => Ok(ProtocolVersion::V2025_03_26),
            "2025-06-18" => Ok(ProtocolVersion::V2025_06_18),
            other => Err(McpCheckError::Config(format!(
                "unsupported protocol version `{}` (expected 2024-11-05, 2025-03-26 or 2025-06-18)",
                other
            ))),
        }
    }
}

impl std::fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Session state machine
// ---------------------------------------------------------------------------

/// Lifecycle state of one adapter/transport pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No messages exchanged yet.
    Fresh,
    /// `initialize` sent, response not yet accepted.
    Initializing,
    /// Handshake complete; feature calls allowed.
    Ready,
    /// `shutdown` acknowledged.
    ShuttingDown,
    /// `exit` sent; the transport may be stopped.
    Exited,
}

/// Handle for an in-flight asynchronous tool call (2025-03-26).
#[derive(Debug, Clone)]
pub struct AsyncToolCall {
    /// Identifier used for `tools/result` and `tools/cancel`.
    pub id: String,
    /// The server's acceptance payload.
    pub accepted: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Protocol adapter
// ---------------------------------------------------------------------------

/// One MCP session against a server under test.
///
/// The adapter exclusively owns its transport for the duration of one
/// test; nothing else reads or writes the underlying channel.
#[derive(Debug)]
pub struct ProtocolAdapter {
    transport: Box<dyn Transport>,
    version: ProtocolVersion,
    state: SessionState,
    server_capabilities: serde_json::Value,
    server_info: serde_json::Value,
    negotiated_version: Option<String>,
    /// In-flight `tools/call-async` operations keyed by call id. Entries
    /// are removed on terminal status or explicit cancel.
    pending_async_calls: HashMap<String, serde_json::Value>,
    next_seq: u64,
}

impl ProtocolAdapter {
    /// Bind an adapter for `version` to a started transport.
    pub fn new(transport: Box<dyn Transport>, version: ProtocolVersion) -> Self {
        Self {
            transport,
            version,
            state: SessionState::Fresh,
            server_capabilities: serde_json::Value::Object(Default::default()),
            server_info: serde_json::Value::Object(Default::default()),
            negotiated_version: None,
            pending_async_calls: HashMap::new(),
            next_seq: 0,
        }
    }

    /// The revision this adapter speaks.
    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Capabilities the server declared during the handshake.
    pub fn server_capabilities(&self) -> &serde_json::Value {
        &self.server_capabilities
    }

    /// The server's `serverInfo` block, if any.
    pub fn server_info(&self) -> &serde_json::Value {
        &self.server_info
    }

    /// The `protocolVersion` the server returned, once initialized.
    pub fn negotiated_version(&self) -> Option<&str> {
        self.negotiated_version.as_deref()
    }

    /// Ids of async tool calls whose terminal status has not been seen.
    pub fn pending_async_calls(&self) -> Vec<String> {
        self.pending_async_calls.keys().cloned().collect()
    }

    /// Stop the owned transport. Idempotent.
    pub async fn stop_transport(&mut self) -> bool {
        self.transport.stop().await
    }

    /// Which transport variant this session runs over.
    pub fn transport_kind(&self) -> crate::harness::transport::TransportKind {
        self.transport.kind()
    }

    /// Produce a session-unique request id with a readable stem.
    pub fn make_request_id(&mut self, stem: &str) -> String {
        self.next_seq += 1;
        format!("{}-{}", stem, self.next_seq)
    }

    fn ensure_ready(&self, operation: &str) -> Result<()> {
        if self.state != SessionState::Ready {
            return Err(anyhow::anyhow!(McpCheckError::NotInitialized(
                operation.to_string()
            )));
        }
        Ok(())
    }

    /// Send a request and unwrap its `result`, mapping JSON-RPC errors to
    /// [`McpCheckError::ServerRejected`]. Adapters never retry.
    async fn request(
        &mut self,
        stem: &str,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value> {
        let id = self.make_request_id(stem);
        let request = JsonRpcRequest::new(id, method, params);
        let response = self.transport.send_request(request).await?;
        Ok(response.into_result()?)
    }

    /// Pass a fully formed request through to the transport and return
    /// the raw response. Used by specification-coverage tests that assert
    /// on the response shape itself.
    pub async fn raw_request(&mut self, request: JsonRpcRequest) -> Result<JsonRpcResponse> {
        self.transport.send_request(request).await
    }

    /// Pass a raw notification through to the transport.
    pub async fn raw_notification(&mut self, notification: JsonRpcNotification) -> Result<()> {
        self.transport.send_notification(notification).await
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Perform the `initialize` exchange.
    ///
    /// On a ready adapter this is idempotent: the cached capabilities are
    /// returned without reissuing the request.
    ///
    /// # Errors
    ///
    /// Returns [`McpCheckError::Initialization`] when the response lacks a
    /// `result`, and [`McpCheckError::VersionMismatch`] when a
    /// `2025-06-18` server negotiates a different version than claimed.
    pub async fn initialize(
        &mut self,
        client_capabilities: Option<serde_json::Value>,
    ) -> Result<serde_json::Value> {
        if self.state == SessionState::Ready {
            return Ok(self.server_capabilities.clone());
        }

        self.state = SessionState::Initializing;

        let capabilities = client_capabilities.unwrap_or_else(|| self.default_capabilities());
        let params = serde_json::json!({
            "protocolVersion": self.version.as_str(),
            "capabilities": capabilities,
            "clientInfo": {
                "name": "mcpcheck",
                "version": env!("CARGO_PKG_VERSION"),
            }
        });

        let result = self
            .request("init", METHOD_INITIALIZE, Some(params))
            .await
            .map_err(|e| {
                anyhow::anyhow!(McpCheckError::Initialization(format!(
                    "initialize failed: {}",
                    e
                )))
            })?;

        let mut capabilities = result
            .get("capabilities")
            .cloned()
            .ok_or_else(|| {
                anyhow::anyhow!(McpCheckError::Initialization(
                    "initialize result is missing `capabilities`".to_string()
                ))
            })?;

        if self.version == ProtocolVersion::V2024_11_05 {
            normalize_boolean_capabilities(&mut capabilities);
        }

        self.server_info = result
            .get("serverInfo")
            .cloned()
            .unwrap_or_else(|| serde_json::Value::Object(Default::default()));
        self.negotiated_version = result
            .get("protocolVersion")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        // 2025-06-18 hard-fails on a version mismatch; older revisions
        // record it and let the versioning test report the diagnostic.
        if self.version.is_2025_06_18() {
            match self.negotiated_version.as_deref() {
                Some(got) if got != self.version.as_str() => {
                    return Err(anyhow::anyhow!(McpCheckError::VersionMismatch {
                        expected: self.version.as_str().to_string(),
                        got: got.to_string(),
                    }));
                }
                None => {
                    return Err(anyhow::anyhow!(McpCheckError::Initialization(
                        "initialize result is missing `protocolVersion`".to_string()
                    )));
                }
                _ => {}
            }
        }

        self.server_capabilities = capabilities;
        self.state = SessionState::Ready;
        Ok(result)
    }

    /// Send the `initialized` notification.
    ///
    /// # Errors
    ///
    /// Returns [`McpCheckError::NotInitialized`] before a successful
    /// `initialize`, or a transport error if the notification cannot be
    /// sent.
    pub async fn send_initialized(&mut self) -> Result<()> {
        self.ensure_ready(METHOD_INITIALIZED)?;
        self.transport
            .send_notification(JsonRpcNotification::new(
                METHOD_INITIALIZED,
                Some(serde_json::json!({})),
            ))
            .await
    }

    /// Send the `shutdown` request and await its acknowledgement.
    ///
    /// A no-op before initialization. On success the session transitions
    /// to `ShuttingDown`.
    pub async fn shutdown(&mut self) -> Result<()> {
        if self.state != SessionState::Ready {
            return Ok(());
        }
        self.request("shutdown", METHOD_SHUTDOWN, Some(serde_json::json!({})))
            .await
            .map_err(|e| anyhow::anyhow!(McpCheckError::Shutdown(e.to_string())))?;
        self.state = SessionState::ShuttingDown;
        Ok(())
    }

    /// Send the `exit` notification. Tolerant of send errors: the peer
    /// may already be gone, and the session counts as exited either way.
    pub async fn exit(&mut self) -> Result<()> {
        let result = self
            .transport
            .send_notification(JsonRpcNotification::new(
                METHOD_EXIT,
                Some(serde_json::json!({})),
            ))
            .await;
        if let Err(e) = result {
            tracing::debug!(target: "mcpcheck::protocol", "exit notification failed: {}", e);
        }
        self.state = SessionState::Exited;
        Ok(())
    }

    fn default_capabilities(&self) -> serde_json::Value {
        match self.version {
            // 2025-06-18 clients advertise the full modern surface.
            ProtocolVersion::V2025_06_18 => serde_json::json!({
                "tools": {"asyncSupported": true},
                "resources": {"subscribe": true, "listChanged": true},
                "roots": {"listChanged": true},
                "sampling": {},
                "elicitation": {},
                "logging": {}
            }),
            _ => serde_json::json!({}),
        }
    }

    // -----------------------------------------------------------------------
    // Tools
    // -----------------------------------------------------------------------

    /// List the server's tools, validating each definition.
    ///
    /// Every tool must carry `name` and `description`; on `2025-06-18`
    /// the `inputSchema` field is also required (`title` and
    /// `outputSchema` are optional additions).
    ///
    /// # Errors
    ///
    /// Returns [`McpCheckError::NotInitialized`] outside `Ready`, the
    /// mapped server rejection on error responses, or a validation error
    /// naming the offending tool.
    pub async fn list_tools(&mut self) -> Result<Vec<serde_json::Value>> {
        self.ensure_ready(METHOD_TOOLS_LIST)?;
        let result = self.request("tools_list", METHOD_TOOLS_LIST, None).await?;

        let tools = result
            .get("tools")
            .and_then(|t| t.as_array())
            .cloned()
            .ok_or_else(|| {
                anyhow::anyhow!(McpCheckError::Transport(
                    "tools/list result is missing a `tools` array".to_string()
                ))
            })?;

        for (i, tool) in tools.iter().enumerate() {
            let name = tool.get("name").and_then(|n| n.as_str());
            if name.is_none() {
                anyhow::bail!("tool at index {} is missing required `name`", i);
            }
            if tool.get("description").is_none() {
                anyhow::bail!(
                    "tool `{}` is missing required `description`",
                    name.unwrap_or("?")
                );
            }
            if self.version.is_2025_06_18() && tool.get("inputSchema").is_none() {
                anyhow::bail!(
                    "tool `{}` is missing required `inputSchema`",
                    name.unwrap_or("?")
                );
            }
        }

        Ok(tools)
    }

    /// Invoke a tool synchronously via `tools/call`.
    pub async fn call_tool(
        &mut self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value> {
        self.ensure_ready(METHOD_TOOLS_CALL)?;
        self.request(
            "tool_call",
            METHOD_TOOLS_CALL,
            Some(serde_json::json!({"name": name, "arguments": arguments})),
        )
        .await
    }

    /// Invoke a tool and validate the `2025-06-18` result contract:
    /// `content` and `isError` must both be present, `structuredContent`
    /// is optional. On older revisions this behaves exactly like
    /// [`ProtocolAdapter::call_tool`].
    pub async fn call_tool_structured(
        &mut self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value> {
        let result = self.call_tool(name, arguments).await?;

        if self.version.is_2025_06_18() {
            if result.get("content").is_none() {
                anyhow::bail!("tool result is missing required `content` field");
            }
            if result.get("isError").is_none() {
                anyhow::bail!("tool result is missing required `isError` field");
            }
            if let Some(structured) = result.get("structuredContent") {
                tracing::debug!(
                    target: "mcpcheck::protocol",
                    "tool returned structured content: {}",
                    structured
                );
            }
        }

        Ok(result)
    }

    // -----------------------------------------------------------------------
    // Async tools (2025-03-26)
    // -----------------------------------------------------------------------

    fn ensure_async_supported(&self) -> Result<()> {
        if !self.version.supports_async_tools() {
            return Err(anyhow::anyhow!(McpCheckError::Config(format!(
                "async tool calls require protocol version 2025-03-26, adapter speaks {}",
                self.version
            ))));
        }
        Ok(())
    }

    /// Start an asynchronous tool call via `tools/call-async`.
    ///
    /// The returned handle's id is used for polling and cancellation; an
    /// entry is tracked in the pending map until a terminal status is
    /// observed.
    pub async fn call_tool_async(
        &mut self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<AsyncToolCall> {
        self.ensure_async_supported()?;
        self.ensure_ready(METHOD_TOOLS_CALL_ASYNC)?;

        let request_id = uuid::Uuid::new_v4().to_string();
        let request = JsonRpcRequest::new(
            request_id.clone(),
            METHOD_TOOLS_CALL_ASYNC,
            Some(serde_json::json!({"name": name, "arguments": arguments})),
        );
        let accepted = self.transport.send_request(request).await?.into_result()?;

        // Servers return the call id in the acceptance payload; fall back
        // to the request id, which the original async contract reuses.
        let call_id = accepted
            .get("id")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or(request_id);

        self.pending_async_calls.insert(call_id.clone(), accepted.clone());
        Ok(AsyncToolCall {
            id: call_id,
            accepted,
        })
    }

    /// Poll the status of an async tool call via `tools/result`.
    ///
    /// On a terminal status (`completed`, `error`, `cancelled`) the
    /// pending-map entry is removed.
    pub async fn get_tool_result(&mut self, call_id: &str) -> Result<serde_json::Value> {
        self.ensure_async_supported()?;
        self.ensure_ready(METHOD_TOOLS_RESULT)?;

        let result = self
            .request(
                "tool_result",
                METHOD_TOOLS_RESULT,
                Some(serde_json::json!({"id": call_id})),
            )
            .await?;

        if let Some(status) = result.get("status").and_then(|s| s.as_str()) {
            if ASYNC_TERMINAL_STATUSES.contains(&status) {
                self.pending_async_calls.remove(call_id);
            }
        }

        Ok(result)
    }

    /// Request server-side cancellation of an async tool call.
    pub async fn cancel_tool_call(&mut self, call_id: &str) -> Result<serde_json::Value> {
        self.ensure_async_supported()?;
        self.ensure_ready(METHOD_TOOLS_CANCEL)?;

        let result = self
            .request(
                "tool_cancel",
                METHOD_TOOLS_CANCEL,
                Some(serde_json::json!({"id": call_id})),
            )
            .await?;
        self.pending_async_calls.remove(call_id);
        Ok(result)
    }

    /// Poll `tools/result` every `poll_interval` until the call reaches a
    /// terminal status, returning the final result.
    ///
    /// # Errors
    ///
    /// Returns [`McpCheckError::Timeout`] when `timeout` elapses before a
    /// terminal status is observed.
    pub async fn wait_for_tool_completion(
        &mut self,
        call_id: &str,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<serde_json::Value> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            let result = self.get_tool_result(call_id).await?;
            if let Some(status) = result.get("status").and_then(|s| s.as_str()) {
                if ASYNC_TERMINAL_STATUSES.contains(&status) {
                    return Ok(result);
                }
            }

            if tokio::time::Instant::now() + poll_interval > deadline {
                return Err(anyhow::anyhow!(McpCheckError::Timeout {
                    seconds: timeout.as_secs(),
                    operation: format!("async tool call {} did not complete", call_id),
                }));
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    // -----------------------------------------------------------------------
    // Resources
    // -----------------------------------------------------------------------

    /// List the server's resources, validating each has `uri` and `name`.
    pub async fn list_resources(&mut self) -> Result<Vec<serde_json::Value>> {
        self.ensure_ready(METHOD_RESOURCES_LIST)?;
        let result = self
            .request(
                "resources_list",
                METHOD_RESOURCES_LIST,
                Some(serde_json::json!({})),
            )
            .await?;

        let resources = result
            .get("resources")
            .and_then(|r| r.as_array())
            .cloned()
            .ok_or_else(|| {
                anyhow::anyhow!(McpCheckError::Transport(
                    "resources/list result is missing a `resources` array".to_string()
                ))
            })?;

        for (i, resource) in resources.iter().enumerate() {
            if resource.get("uri").is_none() {
                anyhow::bail!("resource at index {} is missing required `uri`", i);
            }
            if resource.get("name").is_none() {
                anyhow::bail!("resource at index {} is missing required `name`", i);
            }
        }

        Ok(resources)
    }

    /// Read a resource.
    ///
    /// Older revisions use `resources/get` keyed by `id`; `2025-06-18`
    /// uses `resources/read` keyed by `uri` and requires a `contents`
    /// array whose items each carry `uri` and one of `text`/`blob`.
    pub async fn read_resource(&mut self, id_or_uri: &str) -> Result<serde_json::Value> {
        self.ensure_ready("resources read")?;

        if !self.version.reads_resources_by_uri() {
            return self
                .request(
                    "resource_get",
                    METHOD_RESOURCES_GET,
                    Some(serde_json::json!({"id": id_or_uri})),
                )
                .await;
        }

        let result = self
            .request(
                "resource_read",
                METHOD_RESOURCES_READ,
                Some(serde_json::json!({"uri": id_or_uri})),
            )
            .await?;

        let contents = result
            .get("contents")
            .and_then(|c| c.as_array())
            .ok_or_else(|| anyhow::anyhow!("resource result is missing a `contents` array"))?;
        for content in contents {
            if content.get("uri").is_none() {
                anyhow::bail!("resource content is missing required `uri` field");
            }
            if content.get("text").is_none() && content.get("blob").is_none() {
                anyhow::bail!("resource content must have either `text` or `blob`");
            }
        }

        Ok(result)
    }

    // -----------------------------------------------------------------------
    // Utilities
    // -----------------------------------------------------------------------

    /// Send a `ping` and validate the result.
    ///
    /// Every revision requires an object result; `2025-06-18` requires it
    /// to be exactly the empty object.
    pub async fn ping(&mut self) -> Result<serde_json::Value> {
        self.ensure_ready(METHOD_PING)?;
        let result = self
            .request("ping", METHOD_PING, Some(serde_json::json!({})))
            .await?;

        if self.version.is_2025_06_18() {
            let empty = serde_json::json!({});
            if result != empty {
                anyhow::bail!("ping response should be empty, got: {}", result);
            }
        }

        Ok(result)
    }

    /// Solicit structured user input via `elicitation/create`
    /// (2025-06-18). Validates `action` is one of
    /// `accept`/`reject`/`cancel`.
    pub async fn create_elicitation(
        &mut self,
        schema: serde_json::Value,
        prompt: &str,
    ) -> Result<serde_json::Value> {
        self.ensure_ready(METHOD_ELICITATION_CREATE)?;

        let result = self
            .request(
                "elicit",
                METHOD_ELICITATION_CREATE,
                Some(serde_json::json!({"schema": schema, "prompt": prompt})),
            )
            .await?;

        match result.get("action").and_then(|a| a.as_str()) {
            Some("accept") | Some("reject") | Some("cancel") => Ok(result),
            Some(other) => anyhow::bail!("invalid elicitation action: {}", other),
            None => anyhow::bail!("elicitation response missing required `action` field"),
        }
    }

    /// Send a JSON-RPC batch.
    ///
    /// On `2025-06-18` this fails synchronously with
    /// [`McpCheckError::BatchingUnsupported`] without touching the
    /// transport; the batch-rejection conformance test relies on that.
    pub async fn send_batch(
        &mut self,
        requests: Vec<JsonRpcRequest>,
    ) -> Result<Vec<JsonRpcResponse>> {
        if self.version.is_2025_06_18() {
            return Err(anyhow::anyhow!(McpCheckError::BatchingUnsupported(
                self.version.as_str().to_string()
            )));
        }
        self.transport.send_batch(requests).await
    }
}

/// Normalize 2024-11-05 boolean capability shorthands to object form so
/// downstream code never branches on the shape (`true` becomes
/// `{"supported": true}`).
fn normalize_boolean_capabilities(capabilities: &mut serde_json::Value) {
    let Some(map) = capabilities.as_object_mut() else {
        return;
    };
    for value in map.values_mut() {
        if let Some(flag) = value.as_bool() {
            *value = serde_json::json!({"supported": flag});
        }
    }
}
