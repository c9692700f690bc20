//! HTTP transport for MCP servers reached by URL
//!
//! [`HttpTransport`] POSTs each JSON-RPC message as a single JSON body to
//! the configured endpoint with `Content-Type: application/json`. Query
//! parameters never carry JSON-RPC content.
//!
//! # Session management
//!
//! The server's first response may carry an `Mcp-Session-Id` header. Once
//! seen, the transport echoes that value on every subsequent request. The
//! session id is opaque and transport-private; neither the protocol
//! adapter nor any test can observe it.
//!
//! # Protocol version header
//!
//! When the adapter claims revision `2025-06-18` it installs the
//! negotiated version via [`HttpTransport::with_protocol_version_header`];
//! the transport then sends `MCP-Protocol-Version` on every request.
//!
//! # Server-initiated notifications
//!
//! An optional SSE GET stream delivers unsolicited notifications. Reading
//! it is best-effort: the stream is opened in the background after a
//! successful start, parsed events are buffered for diagnostics, and any
//! failure on this path never fails a request.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use futures::Stream;

use crate::error::{McpCheckError, Result};
use crate::harness::transport::Transport;
use crate::harness::types::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

/// Session token header, set by the server and echoed by the client.
const SESSION_ID_HEADER: &str = "Mcp-Session-Id";

/// Negotiated protocol revision header (2025-06-18).
const PROTOCOL_VERSION_HEADER: &str = "MCP-Protocol-Version";

/// How long the start-time reachability probe may take.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP transport speaking point-to-point JSON-RPC POSTs.
///
/// # Examples
///
/// ```no_run
/// use mcpcheck::harness::transport::http::HttpTransport;
///
/// let transport = HttpTransport::new("http://localhost:9000/mcp").unwrap();
/// ```
#[derive(Debug)]
pub struct HttpTransport {
    endpoint: url::Url,
    client: reqwest::Client,
    session_id: Option<String>,
    protocol_version_header: Option<String>,
    /// Unsolicited SSE notifications, newest last. Diagnostic only.
    notifications: Arc<Mutex<VecDeque<String>>>,
    sse_task: Option<tokio::task::JoinHandle<()>>,
    started: bool,
}

impl HttpTransport {
    /// Construct a transport targeting `endpoint`.
    ///
    /// No network I/O happens here; [`Transport::start`] performs the
    /// reachability probe.
    ///
    /// # Errors
    ///
    /// Returns [`McpCheckError::TransportStart`] if the endpoint is not a
    /// valid URL.
    pub fn new(endpoint: &str) -> Result<Self> {
        let endpoint = url::Url::parse(endpoint).map_err(|e| {
            anyhow::anyhow!(McpCheckError::TransportStart(format!(
                "invalid server URL `{}`: {}",
                endpoint, e
            )))
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            // Default reqwest client construction only fails when TLS
            // initialisation fails, a fatal startup condition.
            .expect("failed to build reqwest client");

        Ok(Self {
            endpoint,
            client,
            session_id: None,
            protocol_version_header: None,
            notifications: Arc::new(Mutex::new(VecDeque::new())),
            sse_task: None,
            started: false,
        })
    }

    /// Install the negotiated protocol version header (2025-06-18).
    pub fn with_protocol_version_header(mut self, version: &str) -> Self {
        self.protocol_version_header = Some(version.to_string());
        self
    }

    /// Drain the buffered unsolicited notifications, oldest first.
    pub fn drain_notifications(&self) -> Vec<String> {
        self.notifications
            .lock()
            .map(|mut q| q.drain(..).collect())
            .unwrap_or_default()
    }

    fn apply_headers(&self, mut req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(ref sid) = self.session_id {
            req = req.header(SESSION_ID_HEADER, sid.as_str());
        }
        if let Some(ref version) = self.protocol_version_header {
            req = req.header(PROTOCOL_VERSION_HEADER, version.as_str());
        }
        req
    }

    /// Capture the session token from a response, first writer wins.
    fn capture_session_id(&mut self, response: &reqwest::Response) {
        if self.session_id.is_some() {
            return;
        }
        if let Some(sid) = response
            .headers()
            .get(SESSION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            tracing::debug!(
                target: "mcpcheck::transport::http",
                "captured session id from response header"
            );
            self.session_id = Some(sid.to_string());
        }
    }

    /// POST a serialized body and return the raw response.
    async fn post(&mut self, body: String) -> Result<reqwest::Response> {
        let req = self
            .client
            .post(self.endpoint.as_str())
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .body(body);
        let req = self.apply_headers(req);

        let response = req.send().await.map_err(|e| {
            anyhow::anyhow!(McpCheckError::Transport(format!("HTTP POST failed: {}", e)))
        })?;
        self.capture_session_id(&response);
        Ok(response)
    }

    /// Open the optional SSE GET stream for server-initiated
    /// notifications. Best-effort: all failures are logged and dropped.
    fn open_notification_stream(&mut self) {
        let endpoint = self.endpoint.clone();
        let session_id = self.session_id.clone();
        let notifications = Arc::clone(&self.notifications);

        let handle = tokio::spawn(async move {
            // A dedicated client without a request timeout: the stream is
            // long-lived by design.
            let client = match reqwest::Client::builder().build() {
                Ok(c) => c,
                Err(_) => return,
            };

            let mut req = client
                .get(endpoint.as_str())
                .header("Accept", "text/event-stream");
            if let Some(sid) = session_id {
                req = req.header(SESSION_ID_HEADER, sid);
            }

            let response = match req.send().await {
                Ok(r) if r.status().is_success() => r,
                _ => return,
            };

            let events = collect_sse_events(response.bytes_stream()).await;
            if let Ok(mut queue) = notifications.lock() {
                for event in events {
                    tracing::debug!(
                        target: "mcpcheck::transport::http",
                        "sse notification: {}",
                        event
                    );
                    queue.push_back(event);
                }
            }
        });

        self.sse_task = Some(handle);
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    fn kind(&self) -> crate::harness::transport::TransportKind {
        crate::harness::transport::TransportKind::Http
    }

    /// Probe the endpoint. Any HTTP answer, including an error status,
    /// proves the server is reachable; only connection-level failures
    /// within the probe window return `false`.
    async fn start(&mut self) -> bool {
        if self.started {
            return true;
        }

        let probe = self
            .client
            .get(self.endpoint.as_str())
            .timeout(PROBE_TIMEOUT)
            .send()
            .await;

        match probe {
            Ok(_) => {
                self.started = true;
                self.open_notification_stream();
                true
            }
            Err(e) => {
                tracing::debug!(
                    target: "mcpcheck::transport::http",
                    "probe of {} failed: {}",
                    self.endpoint,
                    e
                );
                false
            }
        }
    }

    /// Release the HTTP client state. Idempotent.
    async fn stop(&mut self) -> bool {
        if let Some(task) = self.sse_task.take() {
            task.abort();
        }
        self.session_id = None;
        self.started = false;
        true
    }

    /// POST the request and parse its correlated JSON response.
    ///
    /// # Errors
    ///
    /// Returns [`McpCheckError::Transport`] on connection failure, on a
    /// `401 Unauthorized` answer (message names the status so the
    /// authorization test can recognize it), on an unparseable body, or
    /// on a response `id` mismatch.
    async fn send_request(&mut self, request: JsonRpcRequest) -> Result<JsonRpcResponse> {
        let payload = serde_json::to_string(&request)?;
        tracing::debug!(target: "mcpcheck::transport::http", ">> {}", payload);

        let response = self.post(payload).await?;
        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(anyhow::anyhow!(McpCheckError::Transport(
                "HTTP 401 Unauthorized".to_string()
            )));
        }

        let body = response.text().await.map_err(|e| {
            anyhow::anyhow!(McpCheckError::Transport(format!(
                "failed to read response body: {}",
                e
            )))
        })?;
        tracing::debug!(target: "mcpcheck::transport::http", "<< {}", body);

        let parsed: JsonRpcResponse = serde_json::from_str(&body).map_err(|e| {
            anyhow::anyhow!(McpCheckError::Transport(format!(
                "HTTP {} with unparseable body: {}",
                status, e
            )))
        })?;

        if parsed.id != request.id {
            return Err(anyhow::anyhow!(McpCheckError::Transport(format!(
                "response id {} does not match request id {}",
                parsed.id, request.id
            ))));
        }

        Ok(parsed)
    }

    /// POST the notification; any status is accepted, no body expected.
    async fn send_notification(&mut self, notification: JsonRpcNotification) -> Result<()> {
        let payload = serde_json::to_string(&notification)?;
        tracing::debug!(target: "mcpcheck::transport::http", ">> {}", payload);
        let _ = self.post(payload).await?;
        Ok(())
    }

    /// POST a JSON array of requests and parse the array of responses.
    ///
    /// # Errors
    ///
    /// Returns [`McpCheckError::Transport`] when the server answers with
    /// anything other than a JSON array of responses.
    async fn send_batch(&mut self, requests: Vec<JsonRpcRequest>) -> Result<Vec<JsonRpcResponse>> {
        let payload = serde_json::to_string(&requests)?;
        tracing::debug!(target: "mcpcheck::transport::http", ">> {}", payload);

        let response = self.post(payload).await?;
        let status = response.status();
        let body = response.text().await.map_err(|e| {
            anyhow::anyhow!(McpCheckError::Transport(format!(
                "failed to read batch response body: {}",
                e
            )))
        })?;

        serde_json::from_str::<Vec<JsonRpcResponse>>(&body).map_err(|e| {
            anyhow::anyhow!(McpCheckError::Transport(format!(
                "HTTP {} batch response is not an array of JSON-RPC objects: {}",
                status, e
            )))
        })
    }
}

// ---------------------------------------------------------------------------
// SSE frame parsing
// ---------------------------------------------------------------------------

/// Consume an SSE byte stream and collect the `data:` payloads of every
/// complete event.
///
/// Events are separated by blank lines. `event: ping` frames and `[PING]`
/// data values are discarded. Multi-line data values are joined with
/// newlines. This runs until the stream ends or errors.
pub async fn collect_sse_events(
    byte_stream: impl Stream<Item = reqwest::Result<Bytes>>,
) -> Vec<String> {
    use futures::StreamExt;

    let mut buffer = String::new();
    let mut events = Vec::new();

    tokio::pin!(byte_stream);

    while let Some(chunk) = byte_stream.next().await {
        let chunk = match chunk {
            Ok(c) => c,
            Err(_) => break,
        };
        let text = match std::str::from_utf8(&chunk) {
            Ok(s) => s,
            Err(_) => continue,
        };
        buffer.push_str(text);

        while let Some(pos) = buffer.find("\n\n") {
            let frame = buffer[..pos].to_string();
            buffer = buffer[pos + 2..].to_string();
            if let Some(data) = parse_sse_frame(&frame) {
                events.push(data);
            }
        }
    }

    if !buffer.is_empty() {
        if let Some(data) = parse_sse_frame(&buffer) {
            events.push(data);
        }
    }

    events
}

/// Parse one SSE frame (the text between two blank-line delimiters) into
/// its joined data payload, or `None` for ping/empty frames.
fn parse_sse_frame(frame: &str) -> Option<String> {
    let mut data_lines: Vec<&str> = Vec::new();
    let mut event_type: Option<&str> = None;

    for line in frame.lines() {
        if let Some(value) = line.strip_prefix("data:") {
            data_lines.push(value.trim());
        } else if let Some(value) = line.strip_prefix("event:") {
            event_type = Some(value.trim());
        }
        // `id:`/`retry:` fields and `:` comments are ignored; the harness
        // never resumes the stream.
    }

    if let Some(et) = event_type {
        if et.eq_ignore_ascii_case("ping") {
            return None;
        }
    }

    let data = data_lines.join("\n");
    if data.is_empty() || data.eq_ignore_ascii_case("[ping]") {
        return None;
    }
    Some(data)
}
