//! MCP transport abstraction and implementations
//!
//! This module defines the [`Transport`] trait that both transport
//! implementations satisfy. Concrete implementations live in submodules:
//!
//! - [`stdio::StdioTransport`] -- spawns the server under test as a child
//!   process and communicates over its stdin/stdout pipes
//!   (newline-delimited JSON).
//! - [`http::HttpTransport`] -- POSTs each JSON-RPC message to the server
//!   URL, echoing the server-assigned `Mcp-Session-Id` header once seen.
//! - [`fake::FakeTransport`] -- scripted in-process fake used in tests
//!   (cfg(test) only).
//!
//! # Design
//!
//! The trait is intentionally narrow: start, stop, one correlated request,
//! one fire-and-forget notification, and a batch probe. The harness issues
//! at most one request per transport at any moment (the runner is
//! sequential within a test), so correlation is positional on stdio and
//! id-checked on HTTP. Nothing above this layer knows which variant is in
//! use.

use crate::error::Result;
use crate::harness::types::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

/// Which transport variant a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// Child process with newline-delimited JSON over stdin/stdout.
    Stdio,
    /// HTTP POST per message, with optional session token echo.
    Http,
}

impl TransportKind {
    /// Select the transport kind for a server command string.
    ///
    /// A command starting with `http://` or `https://` is a server URL and
    /// selects [`TransportKind::Http`]; anything else is treated as a
    /// process command line.
    ///
    /// # Examples
    ///
    /// ```
    /// use mcpcheck::harness::transport::TransportKind;
    ///
    /// assert_eq!(TransportKind::for_command("https://host/mcp"), TransportKind::Http);
    /// assert_eq!(TransportKind::for_command("./minimal_server --flag"), TransportKind::Stdio);
    /// ```
    pub fn for_command(server_command: &str) -> Self {
        if server_command.starts_with("http://") || server_command.starts_with("https://") {
            TransportKind::Http
        } else {
            TransportKind::Stdio
        }
    }
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportKind::Stdio => write!(f, "stdio"),
            TransportKind::Http => write!(f, "http"),
        }
    }
}

/// Abstraction over the two harness transports.
///
/// All methods take `&mut self`: a transport is owned exclusively by one
/// protocol adapter for the duration of one test, and never shared.
#[async_trait::async_trait]
pub trait Transport: Send + std::fmt::Debug {
    /// Which variant this transport is; transport-specific compliance
    /// tests skip themselves when the other kind is in use.
    fn kind(&self) -> TransportKind;

    /// Acquire the underlying OS resource (spawn the child process, or
    /// probe the server URL).
    ///
    /// Returns `false` when the command is unresolvable or the URL is
    /// unreachable within a small probe window. Never panics.
    async fn start(&mut self) -> bool;

    /// Release the underlying resource. Idempotent; never raises.
    async fn stop(&mut self) -> bool;

    /// Send a request and deliver its correlated response.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::McpCheckError::Transport`] if the peer
    /// closes without a response, if the correlated response's `id` does
    /// not match, or if the body cannot be parsed as JSON.
    async fn send_request(&mut self, request: JsonRpcRequest) -> Result<JsonRpcResponse>;

    /// Send a notification without waiting for a response.
    ///
    /// Notifications are fire-and-forget: once the bytes are handed to the
    /// peer, later failures are swallowed.
    ///
    /// # Errors
    ///
    /// Returns an error only when the message could not be sent at all.
    async fn send_notification(&mut self, notification: JsonRpcNotification) -> Result<()>;

    /// Send a batch of requests and collect the batched responses.
    ///
    /// Only used by the batch-support probes; revisions that forbid
    /// batching reject the call in the protocol layer before it reaches
    /// the transport.
    ///
    /// # Errors
    ///
    /// Returns a transport error when the peer rejects or cannot answer
    /// the batch.
    async fn send_batch(&mut self, requests: Vec<JsonRpcRequest>) -> Result<Vec<JsonRpcResponse>>;
}

pub mod http;
pub mod stdio;

#[cfg(test)]
pub mod fake;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_kind_http_detection() {
        assert_eq!(
            TransportKind::for_command("http://localhost:9000/mcp"),
            TransportKind::Http
        );
        assert_eq!(
            TransportKind::for_command("https://mcp.example.com"),
            TransportKind::Http
        );
    }

    #[test]
    fn test_transport_kind_stdio_detection() {
        assert_eq!(
            TransportKind::for_command("python server.py"),
            TransportKind::Stdio
        );
        assert_eq!(
            TransportKind::for_command("npx -y @modelcontextprotocol/server-brave-search"),
            TransportKind::Stdio
        );
    }

    #[test]
    fn test_transport_kind_display() {
        assert_eq!(TransportKind::Stdio.to_string(), "stdio");
        assert_eq!(TransportKind::Http.to_string(), "http");
    }
}
