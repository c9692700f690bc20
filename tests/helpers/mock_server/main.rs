//! Mock MCP server binary for integration tests
//!
//! Implements a minimal MCP server over stdin/stdout using
//! newline-delimited JSON (the stdio transport framing). Used
//! exclusively by integration tests to exercise the full harness
//! pipeline without a real external server.
//!
//! # Handled methods
//!
//! - `initialize` -- echoes the requested `protocolVersion`, declares
//!   `tools` (with `asyncSupported`), `resources` and `logging`.
//! - `initialized` / unknown notifications -- swallowed silently.
//! - `ping` -- returns `{}` exactly.
//! - `tools/list` -- two tools: `echo` (with `title`/`outputSchema`)
//!   and `sleep`.
//! - `tools/call` -- validates required arguments, returns
//!   `content` + `isError` (+ `structuredContent` for `echo`).
//! - `tools/call-async` / `tools/result` / `tools/cancel` -- an async
//!   call on `sleep` stays `running` for one poll (or until cancelled);
//!   everything else completes immediately.
//! - `resources/list` / `resources/read` / `resources/get` -- one fixed
//!   greeting resource.
//! - `shutdown` -- returns `{}`; `exit` -- terminates the process.
//! - JSON array input -- processed as a batch, answered as an array.
//! - Anything else -- `-32601 Method not found`.

use std::collections::HashMap;
use std::io::{self, BufRead, Write};

/// State of one asynchronous tool call.
struct AsyncCall {
    tool: String,
    polls: u32,
    cancelled: bool,
}

struct MockServer {
    async_calls: HashMap<String, AsyncCall>,
    next_call_id: u64,
}

fn main() {
    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let mut server = MockServer {
        async_calls: HashMap::new(),
        next_call_id: 0,
    };

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(_) => break,
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let message: serde_json::Value = match serde_json::from_str(trimmed) {
            Ok(v) => v,
            Err(_) => {
                let response = make_error(&serde_json::Value::Null, -32700, "Parse error");
                write_line(&mut out, &response);
                continue;
            }
        };

        // A JSON array is a batch: answer each element in order.
        if let Some(batch) = message.as_array() {
            let responses: Vec<serde_json::Value> = batch
                .iter()
                .filter_map(|request| server.handle(request))
                .collect();
            write_line(&mut out, &serde_json::Value::Array(responses));
            continue;
        }

        if message.get("method").and_then(|m| m.as_str()) == Some("exit") {
            break;
        }

        if let Some(response) = server.handle(&message) {
            write_line(&mut out, &response);
        }
    }
}

fn write_line(out: &mut impl Write, value: &serde_json::Value) {
    if let Ok(serialized) = serde_json::to_string(value) {
        let _ = writeln!(out, "{}", serialized);
        let _ = out.flush();
    }
}

impl MockServer {
    /// Handle one request; notifications return `None`.
    fn handle(&mut self, request: &serde_json::Value) -> Option<serde_json::Value> {
        let method = request.get("method").and_then(|m| m.as_str()).unwrap_or("");
        let id = match request.get("id") {
            Some(id) if !id.is_null() => id.clone(),
            // No id: a notification, swallowed silently.
            _ => return None,
        };
        let params = request
            .get("params")
            .cloned()
            .unwrap_or(serde_json::json!({}));

        let response = match method {
            "initialize" => self.handle_initialize(&id, &params),
            "ping" => make_result(&id, serde_json::json!({})),
            "tools/list" => make_result(&id, serde_json::json!({"tools": tool_definitions()})),
            "tools/call" => self.handle_tools_call(&id, &params),
            "tools/call-async" => self.handle_call_async(&id, &params),
            "tools/result" => self.handle_tool_result(&id, &params),
            "tools/cancel" => self.handle_tool_cancel(&id, &params),
            "resources/list" => make_result(
                &id,
                serde_json::json!({"resources": [
                    {"uri": "mock://greeting", "name": "greeting"}
                ]}),
            ),
            "resources/read" => make_result(
                &id,
                serde_json::json!({"contents": [
                    {"uri": params.get("uri").cloned().unwrap_or(serde_json::json!("mock://greeting")), "text": "hello from the mock server"}
                ]}),
            ),
            "resources/get" => make_result(
                &id,
                serde_json::json!({
                    "id": params.get("id").cloned().unwrap_or(serde_json::Value::Null),
                    "text": "hello from the mock server"
                }),
            ),
            "shutdown" => make_result(&id, serde_json::json!({})),
            other => make_error(&id, -32601, &format!("Method not found: {}", other)),
        };
        Some(response)
    }

    fn handle_initialize(
        &self,
        id: &serde_json::Value,
        params: &serde_json::Value,
    ) -> serde_json::Value {
        let requested_version = params
            .get("protocolVersion")
            .and_then(|v| v.as_str())
            .unwrap_or("2024-11-05");
        make_result(
            id,
            serde_json::json!({
                "protocolVersion": requested_version,
                "capabilities": {
                    "tools": {"asyncSupported": true},
                    "resources": {},
                    "logging": {}
                },
                "serverInfo": {"name": "mock-mcp-server", "version": "0.2.0"}
            }),
        )
    }

    fn handle_tools_call(
        &self,
        id: &serde_json::Value,
        params: &serde_json::Value,
    ) -> serde_json::Value {
        let name = params.get("name").and_then(|n| n.as_str()).unwrap_or("");
        let arguments = params
            .get("arguments")
            .cloned()
            .unwrap_or(serde_json::json!({}));

        match name {
            "echo" => match arguments.get("message").and_then(|m| m.as_str()) {
                Some(message) => make_result(
                    id,
                    serde_json::json!({
                        "content": [{"type": "text", "text": message}],
                        "isError": false,
                        "structuredContent": {"message": message}
                    }),
                ),
                None => make_error(id, -32602, "Missing required argument: message"),
            },
            "sleep" => match arguments.get("duration").and_then(|d| d.as_f64()) {
                Some(duration) => make_result(
                    id,
                    serde_json::json!({
                        "content": [{"type": "text", "text": format!("slept {}s", duration)}],
                        "isError": false
                    }),
                ),
                None => make_error(id, -32602, "Missing required argument: duration"),
            },
            other => make_error(id, -32602, &format!("Tool not found: {}", other)),
        }
    }

    fn handle_call_async(
        &mut self,
        id: &serde_json::Value,
        params: &serde_json::Value,
    ) -> serde_json::Value {
        let name = params.get("name").and_then(|n| n.as_str()).unwrap_or("");
        if name != "echo" && name != "sleep" {
            return make_error(id, -32602, &format!("Tool not found: {}", name));
        }

        self.next_call_id += 1;
        let call_id = format!("async-{}", self.next_call_id);
        self.async_calls.insert(
            call_id.clone(),
            AsyncCall {
                tool: name.to_string(),
                polls: 0,
                cancelled: false,
            },
        );
        make_result(id, serde_json::json!({"id": call_id, "status": "running"}))
    }

    fn handle_tool_result(
        &mut self,
        id: &serde_json::Value,
        params: &serde_json::Value,
    ) -> serde_json::Value {
        let call_id = params.get("id").and_then(|i| i.as_str()).unwrap_or("");
        let Some(call) = self.async_calls.get_mut(call_id) else {
            return make_error(id, -32602, &format!("Unknown tool call id: {}", call_id));
        };

        if call.cancelled {
            return make_result(id, serde_json::json!({"status": "cancelled"}));
        }

        call.polls += 1;
        // `sleep` reports running on the first poll so cancellation and
        // polling paths are observable; everything else finishes at once.
        if call.tool == "sleep" && call.polls == 1 {
            return make_result(id, serde_json::json!({"status": "running"}));
        }

        make_result(
            id,
            serde_json::json!({
                "status": "completed",
                "content": [{"type": "text", "text": format!("{} finished", call.tool)}],
                "isError": false
            }),
        )
    }

    fn handle_tool_cancel(
        &mut self,
        id: &serde_json::Value,
        params: &serde_json::Value,
    ) -> serde_json::Value {
        let call_id = params.get("id").and_then(|i| i.as_str()).unwrap_or("");
        match self.async_calls.get_mut(call_id) {
            Some(call) => {
                call.cancelled = true;
                make_result(id, serde_json::json!({"success": true}))
            }
            None => make_error(id, -32602, &format!("Unknown tool call id: {}", call_id)),
        }
    }
}

fn tool_definitions() -> serde_json::Value {
    serde_json::json!([
        {
            "name": "echo",
            "title": "Echo",
            "description": "Echo a message back to the caller",
            "inputSchema": {
                "type": "object",
                "properties": {"message": {"type": "string"}},
                "required": ["message"]
            },
            "outputSchema": {
                "type": "object",
                "properties": {"message": {"type": "string"}}
            }
        },
        {
            "name": "sleep",
            "description": "Sleep for the given number of seconds",
            "inputSchema": {
                "type": "object",
                "properties": {"duration": {"type": "number"}},
                "required": ["duration"]
            }
        }
    ])
}

fn make_result(id: &serde_json::Value, result: serde_json::Value) -> serde_json::Value {
    serde_json::json!({"jsonrpc": "2.0", "id": id, "result": result})
}

fn make_error(id: &serde_json::Value, code: i64, message: &str) -> serde_json::Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {"code": code, "message": message}
    })
}
