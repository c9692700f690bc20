//! Stdio transport for child-process MCP servers
//!
//! [`StdioTransport`] spawns the server under test as a child process and
//! exchanges newline-delimited JSON over its stdin/stdout pipes. This is
//! the standard transport for locally-installed MCP servers.
//!
//! # Protocol
//!
//! - Outbound messages are written to the child's stdin as a single JSON
//!   object followed by a newline (`\n`), never containing embedded
//!   newlines.
//! - Inbound messages are read from the child's stdout, one JSON object
//!   per line. Correlation is positional: the harness keeps at most one
//!   request in flight, so the next parseable line is the response to the
//!   last write. A mismatched response `id` is still rejected as a
//!   protocol violation.
//! - Non-JSON stdout lines are logged at `DEBUG` and skipped, up to a
//!   bounded number of attempts. A server emitting non-protocol bytes on
//!   stdout is tolerated here; the stdio framing test reports it.
//! - The child's stderr is drained continuously into a small ring of
//!   recent lines, which is appended to the error message when the child
//!   dies without answering.
//!
//! # Lifecycle
//!
//! The transport is created cold; [`Transport::start`] spawns the process.
//! `stop` is idempotent. On `Drop`, a best-effort SIGTERM (Unix) or
//! `start_kill` (elsewhere) is sent so an abandoned test never leaks a
//! server process.

use std::collections::{HashMap, VecDeque};
use std::process::Stdio;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use crate::error::{McpCheckError, Result};
use crate::harness::transport::Transport;
use crate::harness::types::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

/// Maximum number of recent stderr lines retained for diagnostics.
const STDERR_RING_CAPACITY: usize = 50;

/// Maximum non-JSON stdout lines skipped while waiting for a response.
const MAX_SKIPPED_LINES: usize = 64;

/// Stdio-based transport that owns one child server process.
///
/// # Examples
///
/// ```no_run
/// use std::collections::HashMap;
/// use mcpcheck::harness::transport::stdio::StdioTransport;
/// use mcpcheck::harness::transport::Transport;
///
/// # #[tokio::main]
/// # async fn main() {
/// let mut transport = StdioTransport::new(
///     "./minimal_server".to_string(),
///     vec!["--quiet".to_string()],
///     HashMap::new(),
/// );
/// assert!(transport.start().await);
/// # }
/// ```
#[derive(Debug)]
pub struct StdioTransport {
    command: String,
    args: Vec<String>,
    env: HashMap<String, String>,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stdout: Option<Lines<BufReader<ChildStdout>>>,
    /// Recent stderr lines, filled by a background drain task.
    stderr_ring: Arc<Mutex<VecDeque<String>>>,
    started: bool,
}

impl StdioTransport {
    /// Create a cold transport for `command` with `args` and `env`.
    ///
    /// No process is spawned until [`Transport::start`] is called. The
    /// given environment is applied on top of the inherited one, so
    /// profile overlays from the compatibility resolver take effect while
    /// `PATH` and friends keep working.
    pub fn new(command: String, args: Vec<String>, env: HashMap<String, String>) -> Self {
        Self {
            command,
            args,
            env,
            child: None,
            stdin: None,
            stdout: None,
            stderr_ring: Arc::new(Mutex::new(VecDeque::with_capacity(STDERR_RING_CAPACITY))),
            started: false,
        }
    }

    /// Build a transport from a full command line (executable plus args).
    ///
    /// Splits on whitespace; the first token is the executable. Used by
    /// the runner, which receives the server command as one string.
    pub fn from_command_line(command_line: &str, env: HashMap<String, String>) -> Self {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let command = parts.next().unwrap_or_default();
        let args: Vec<String> = parts.collect();
        Self::new(command, args, env)
    }

    /// Snapshot of the recent stderr lines, oldest first.
    pub fn recent_stderr(&self) -> Vec<String> {
        self.stderr_ring
            .lock()
            .map(|ring| ring.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn stderr_suffix(&self) -> String {
        let lines = self.recent_stderr();
        if lines.is_empty() {
            String::new()
        } else {
            format!("; recent stderr: {}", lines.join(" | "))
        }
    }

    /// Write one serialized message to the child's stdin, newline-framed.
    async fn write_line(&mut self, payload: &str) -> Result<()> {
        let stdin = self.stdin.as_mut().ok_or_else(|| {
            anyhow::anyhow!(McpCheckError::Transport(
                "transport is not started".to_string()
            ))
        })?;

        // One JSON object per line; serde_json never emits raw newlines
        // inside a compact document.
        let line = format!("{}\n", payload);
        stdin.write_all(line.as_bytes()).await.map_err(|e| {
            anyhow::anyhow!(McpCheckError::Transport(format!(
                "failed to write to server stdin: {}",
                e
            )))
        })?;
        stdin.flush().await.map_err(|e| {
            anyhow::anyhow!(McpCheckError::Transport(format!(
                "failed to flush server stdin: {}",
                e
            )))
        })?;
        Ok(())
    }

    /// Read the next line from stdout that parses as JSON, skipping a
    /// bounded amount of non-protocol noise.
    async fn read_json_line(&mut self) -> Result<serde_json::Value> {
        let stderr_note = self.stderr_suffix();
        let stdout = self.stdout.as_mut().ok_or_else(|| {
            anyhow::anyhow!(McpCheckError::Transport(
                "transport is not started".to_string()
            ))
        })?;

        for _ in 0..MAX_SKIPPED_LINES {
            let line = stdout.next_line().await.map_err(|e| {
                anyhow::anyhow!(McpCheckError::Transport(format!(
                    "failed to read from server stdout: {}{}",
                    e, stderr_note
                )))
            })?;

            let line = match line {
                Some(l) => l,
                None => {
                    return Err(anyhow::anyhow!(McpCheckError::Transport(format!(
                        "server closed stdout without a response{}",
                        stderr_note
                    ))));
                }
            };

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            match serde_json::from_str::<serde_json::Value>(trimmed) {
                Ok(value) => return Ok(value),
                Err(_) => {
                    tracing::debug!(
                        target: "mcpcheck::transport::stdio",
                        "skipping non-JSON stdout line: {}",
                        trimmed
                    );
                }
            }
        }

        Err(anyhow::anyhow!(McpCheckError::Transport(format!(
            "no valid JSON line within {} stdout lines{}",
            MAX_SKIPPED_LINES, stderr_note
        ))))
    }
}

#[async_trait::async_trait]
impl Transport for StdioTransport {
    fn kind(&self) -> crate::harness::transport::TransportKind {
        crate::harness::transport::TransportKind::Stdio
    }

    /// Spawn the child process and wire up its stdio pipes.
    ///
    /// Returns `false` when the executable cannot be spawned or a pipe is
    /// unavailable. A stderr drain task is started immediately so
    /// diagnostics are captured even if the server dies during
    /// initialization.
    async fn start(&mut self) -> bool {
        if self.started {
            return true;
        }

        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args)
            .envs(&self.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = match cmd.spawn() {
            Ok(c) => c,
            Err(e) => {
                tracing::debug!(
                    target: "mcpcheck::transport::stdio",
                    "failed to spawn `{}`: {}",
                    self.command,
                    e
                );
                return false;
            }
        };

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let (stdin, stdout, stderr) = match (stdin, stdout, stderr) {
            (Some(i), Some(o), Some(e)) => (i, o, e),
            _ => {
                let _ = child.start_kill();
                return false;
            }
        };

        // Background task: drain stderr into the diagnostic ring.
        let ring = Arc::clone(&self.stderr_ring);
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                tracing::debug!(
                    target: "mcpcheck::transport::stdio",
                    "server stderr: {}",
                    line
                );
                if let Ok(mut ring) = ring.lock() {
                    if ring.len() == STDERR_RING_CAPACITY {
                        ring.pop_front();
                    }
                    ring.push_back(line);
                }
            }
        });

        self.stdin = Some(stdin);
        self.stdout = Some(BufReader::new(stdout).lines());
        self.child = Some(child);
        self.started = true;
        true
    }

    /// Terminate the child process. Safe to call repeatedly.
    async fn stop(&mut self) -> bool {
        self.stdin = None;
        self.stdout = None;
        if let Some(mut child) = self.child.take() {
            let _ = child.start_kill();
            let _ = child.wait().await;
        }
        self.started = false;
        true
    }

    /// Write the request as one line and read its correlated response.
    ///
    /// # Errors
    ///
    /// Returns [`McpCheckError::Transport`] if the child closed its
    /// stdout, the body was not valid JSON within the tolerance window,
    /// or the response `id` does not match the request's.
    async fn send_request(&mut self, request: JsonRpcRequest) -> Result<JsonRpcResponse> {
        let payload = serde_json::to_string(&request)?;
        tracing::debug!(target: "mcpcheck::transport::stdio", ">> {}", payload);
        self.write_line(&payload).await?;

        let value = self.read_json_line().await?;
        tracing::debug!(target: "mcpcheck::transport::stdio", "<< {}", value);

        let response: JsonRpcResponse = serde_json::from_value(value).map_err(|e| {
            anyhow::anyhow!(McpCheckError::Transport(format!(
                "response is not a JSON-RPC object: {}",
                e
            )))
        })?;

        if response.id != request.id {
            return Err(anyhow::anyhow!(McpCheckError::Transport(format!(
                "response id {} does not match request id {}",
                response.id, request.id
            ))));
        }

        Ok(response)
    }

    /// Write the notification as one line; no response is read.
    async fn send_notification(&mut self, notification: JsonRpcNotification) -> Result<()> {
        let payload = serde_json::to_string(&notification)?;
        tracing::debug!(target: "mcpcheck::transport::stdio", ">> {}", payload);
        self.write_line(&payload).await
    }

    /// Write the batch as one JSON array line and read one array back.
    ///
    /// # Errors
    ///
    /// Returns [`McpCheckError::Transport`] when the server answers with
    /// anything other than a JSON array of responses.
    async fn send_batch(&mut self, requests: Vec<JsonRpcRequest>) -> Result<Vec<JsonRpcResponse>> {
        let payload = serde_json::to_string(&requests)?;
        tracing::debug!(target: "mcpcheck::transport::stdio", ">> {}", payload);
        self.write_line(&payload).await?;

        let value = self.read_json_line().await?;
        let responses: Vec<JsonRpcResponse> = serde_json::from_value(value).map_err(|e| {
            anyhow::anyhow!(McpCheckError::Transport(format!(
                "batch response is not an array of JSON-RPC objects: {}",
                e
            )))
        })?;
        Ok(responses)
    }
}

impl Drop for StdioTransport {
    /// Best-effort termination of the child process on drop.
    ///
    /// On Unix, sends SIGTERM to the child PID. On non-Unix platforms,
    /// calls `start_kill()`. This method never blocks.
    fn drop(&mut self) {
        if let Some(child) = self.child.as_mut() {
            #[cfg(unix)]
            {
                if let Some(pid) = child.id() {
                    // SAFETY: pid is a live process ID owned by this transport.
                    unsafe {
                        libc::kill(pid as libc::pid_t, libc::SIGTERM);
                    }
                    return;
                }
            }
            let _ = child.start_kill();
        }
    }
}
