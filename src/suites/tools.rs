//! Tool compliance tests: listing, calling, and parameter validation.
//!
//! Arguments for real tool calls are synthesized from each tool's input
//! schema (see [`crate::suites::args_from_schema`]); tests adapt to
//! whatever the server exposes rather than expecting fixed tools.

use crate::error::Result;
use crate::harness::protocol::ProtocolAdapter;
use crate::suites::{
    args_from_schema, mismatched_value_for_type, required_parameters, tool_schema, Requirement,
    TestCase, TestOutcome,
};

/// Errors a tool call may legitimately produce against synthetic test
/// data without indicating non-compliance.
fn is_acceptable_tool_error(message: &str) -> Option<&'static str> {
    let lower = message.to_lowercase();
    if ["unauthorized", "forbidden", "permission", "auth"]
        .iter()
        .any(|t| lower.contains(t))
    {
        Some("requires authentication")
    } else if ["rate limit", "too many requests"]
        .iter()
        .any(|t| lower.contains(t))
    {
        Some("is rate limited")
    } else if lower.contains("not found") {
        Some("reported missing test data")
    } else {
        None
    }
}

/// Verify `tools/list` returns structurally valid tool definitions.
pub async fn test_tools_list(protocol: &mut ProtocolAdapter) -> Result<TestOutcome> {
    match protocol.list_tools().await {
        Ok(tools) => Ok(TestOutcome::pass(format!(
            "Successfully retrieved {} tools",
            tools.len()
        ))),
        Err(e) => Ok(TestOutcome::fail(format!(
            "Failed to retrieve tools list: {}",
            e
        ))),
    }
}

/// Exercise the first available tool with schema-derived arguments.
pub async fn test_tool_functionality(protocol: &mut ProtocolAdapter) -> Result<TestOutcome> {
    let tools = match protocol.list_tools().await {
        Ok(tools) => tools,
        Err(e) => return Ok(TestOutcome::fail(format!("Failed to list tools: {}", e))),
    };

    let Some(tool) = tools.first() else {
        return Ok(TestOutcome::pass("No tools available to test"));
    };
    let name = tool["name"].as_str().unwrap_or("unknown").to_string();
    let schema = tool_schema(tool);
    if schema.as_object().map(|s| s.is_empty()).unwrap_or(true) {
        return Ok(TestOutcome::pass(format!(
            "Tool {} does not have a parameter schema",
            name
        )));
    }

    let args = args_from_schema(&schema);
    match protocol.call_tool(&name, args).await {
        Ok(_) => Ok(TestOutcome::pass(format!(
            "Successfully tested tool: {}",
            name
        ))),
        Err(e) => {
            let message = e.to_string();
            if let Some(reason) = is_acceptable_tool_error(&message) {
                Ok(TestOutcome::pass(format!(
                    "Tool {} {} (acceptable error): {}",
                    name, reason, message
                )))
            } else {
                Ok(TestOutcome::fail(format!(
                    "Failed to test tool {}: {}",
                    name, message
                )))
            }
        }
    }
}

/// Verify the server rejects calls that omit required parameters.
pub async fn test_tool_with_invalid_params(protocol: &mut ProtocolAdapter) -> Result<TestOutcome> {
    let tools = match protocol.list_tools().await {
        Ok(tools) => tools,
        Err(e) => return Ok(TestOutcome::fail(format!("Failed to list tools: {}", e))),
    };

    if tools.is_empty() {
        return Ok(TestOutcome::pass(
            "No tools available to test invalid parameters",
        ));
    }

    // Find a tool that declares required parameters.
    let suitable = tools.iter().find(|tool| {
        let schema = tool_schema(tool);
        !required_parameters(&schema).is_empty()
    });

    let Some(tool) = suitable else {
        return Ok(TestOutcome::pass(
            "No tools with explicitly required parameters found (skipping validation test)",
        ));
    };
    let name = tool["name"].as_str().unwrap_or("unknown").to_string();
    let schema = tool_schema(tool);
    let required = required_parameters(&schema);

    // Missing required parameters must be rejected.
    if protocol
        .call_tool(&name, serde_json::json!({}))
        .await
        .is_ok()
    {
        return Ok(TestOutcome::fail(format!(
            "Server accepted empty parameters for tool `{}` despite requiring: {}",
            name,
            required.join(", ")
        )));
    }

    // A wrong-typed required parameter: strict rejection and lenient
    // coercion are both acceptable, the server just has to answer.
    if let Some(first_required) = required.first() {
        let param_type = schema
            .get("properties")
            .and_then(|p| p.get(first_required))
            .and_then(|d| d.get("type"))
            .and_then(|t| t.as_str())
            .unwrap_or("string");
        if let Some(bad_value) = mismatched_value_for_type(param_type) {
            let _ = protocol
                .call_tool(&name, serde_json::json!({first_required: bad_value}))
                .await;
        }
    }

    Ok(TestOutcome::pass("Server correctly validates tool parameters"))
}

/// Verify the server rejects calls to a tool that does not exist.
pub async fn test_tool_invalid_name(protocol: &mut ProtocolAdapter) -> Result<TestOutcome> {
    let suffix: u32 = rand::random();
    let bogus = format!("nonexistent_tool_{:08x}", suffix);

    match protocol.call_tool(&bogus, serde_json::json!({})).await {
        Ok(_) => Ok(TestOutcome::fail(format!(
            "Server did not reject call to non-existent tool `{}`",
            bogus
        ))),
        Err(e) => Ok(TestOutcome::pass(format!(
            "Server correctly rejected invalid tool call: {}",
            e
        ))),
    }
}

static TOOLS_LIST_REQS: &[Requirement] = &[Requirement::must("M-TOOLS-LIST")];
static TOOL_CALL_REQS: &[Requirement] = &[Requirement::must("M-TOOLS-CALL")];
static TOOL_VALIDATION_REQS: &[Requirement] = &[
    Requirement::must("M-TOOLS-PARAM-VALIDATION"),
    Requirement::should("S-TOOLS-HELPFUL-ERRORS"),
];
static TOOL_UNKNOWN_REQS: &[Requirement] = &[Requirement::must("M-TOOLS-UNKNOWN-REJECTED")];

/// Registration-ordered tool test cases.
pub fn test_cases() -> Vec<TestCase> {
    vec![
        TestCase::new("test_tools_list", TOOLS_LIST_REQS, |p| {
            Box::pin(test_tools_list(p))
        }),
        TestCase::new("test_tool_functionality", TOOL_CALL_REQS, |p| {
            Box::pin(test_tool_functionality(p))
        }),
        TestCase::new("test_tool_with_invalid_params", TOOL_VALIDATION_REQS, |p| {
            Box::pin(test_tool_with_invalid_params(p))
        }),
        TestCase::new("test_tool_invalid_name", TOOL_UNKNOWN_REQS, |p| {
            Box::pin(test_tool_invalid_name(p))
        }),
    ]
}
