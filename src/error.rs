//! Error types for mcpcheck
//!
//! This module defines all error types used throughout the harness,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for mcpcheck operations
///
/// This enum encompasses every failure kind that can occur while driving a
/// server under test: transport startup and I/O, protocol lifecycle misuse,
/// JSON-RPC error responses, timeouts, and report generation.
#[derive(Error, Debug)]
pub enum McpCheckError {
    /// Configuration-related errors (bad CLI combination, unreadable profile)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Could not spawn the server process or reach the server URL
    #[error("Transport start failure: {0}")]
    TransportStart(String),

    /// Mid-session transport I/O failure or unparseable wire data
    #[error("Transport error: {0}")]
    Transport(String),

    /// The `initialize` exchange failed or returned an unusable response
    #[error("Initialization failed: {0}")]
    Initialization(String),

    /// A feature operation was attempted before the session reached `Ready`
    #[error("Session not initialized: cannot call {0}")]
    NotInitialized(String),

    /// The server answered a request with a JSON-RPC error object
    #[error("Server rejected request (code {code}): {message}")]
    ServerRejected {
        /// JSON-RPC error code (`-32601` method not found, `-32602`
        /// invalid params, `-32000..-32099` server-defined, ...)
        code: i64,
        /// Error message reported by the server
        message: String,
    },

    /// JSON-RPC batching was attempted on a revision that forbids it
    #[error("JSON-RPC batching is not supported in protocol version {0}")]
    BatchingUnsupported(String),

    /// The negotiated protocol version disagrees with the claimed version
    #[error("Protocol version mismatch: expected {expected}, got {got}")]
    VersionMismatch {
        /// Version the adapter claimed in `initialize`
        expected: String,
        /// Version the server returned
        got: String,
    },

    /// An operation did not complete within its deadline
    #[error("Timed out after {seconds}s: {operation}")]
    Timeout {
        /// Deadline that elapsed, in seconds
        seconds: u64,
        /// Human description of what was being waited for
        operation: String,
    },

    /// Shutdown or exit failed; logged only, never fails a test
    #[error("Shutdown error: {0}")]
    Shutdown(String),

    /// Report rendering or writing failed
    #[error("Report error: {0}")]
    Report(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl McpCheckError {
    /// Returns the JSON-RPC error code when this error wraps a server
    /// rejection, `None` otherwise.
    pub fn rejection_code(&self) -> Option<i64> {
        match self {
            McpCheckError::ServerRejected { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// True when the server answered `-32601 Method not found`.
    ///
    /// Several compliance tests treat this as an expected, passing outcome
    /// (optional capabilities may legitimately be absent).
    pub fn is_method_not_found(&self) -> bool {
        self.rejection_code() == Some(-32601)
    }

    /// True when the server answered `-32602 Invalid params`.
    pub fn is_invalid_params(&self) -> bool {
        self.rejection_code() == Some(-32602)
    }
}

/// Result type alias for mcpcheck operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;
