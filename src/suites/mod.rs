//! Test registry: curated catalogs of compliance test cases
//!
//! Each test case is a pair of a stable name and an async function taking
//! a [`ProtocolAdapter`] and returning a [`TestOutcome`]. Requirement tags
//! (`MUST`/`SHOULD`/`MAY`) are attached at registration time and feed the
//! weighted compliance score.
//!
//! The registry is consulted, not executed, by the runner: [`collect`]
//! assembles the case list for a run from the selected mode, protocol
//! version, and async/skip flags, and [`filter_skipped`] applies the
//! skip-list afterwards.

use futures::future::BoxFuture;

use crate::error::Result;
use crate::harness::protocol::{ProtocolAdapter, ProtocolVersion};

pub mod async_tools;
pub mod dynamic;
pub mod lifecycle;
pub mod spec_coverage;
pub mod tools;
pub mod v2025_06_18;

/// Tests that destabilize servers which exit aggressively after shutdown;
/// skipped wholesale when shutdown is disabled for the run.
pub const SHUTDOWN_SENSITIVE_TESTS: &[&str] =
    &["test_shutdown_sequence", "test_exit_after_shutdown"];

// ---------------------------------------------------------------------------
// Requirement tags
// ---------------------------------------------------------------------------

/// Severity of a specification requirement, used for weighted scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequirementLevel {
    /// Mandatory; weight 10, severity Critical.
    Must,
    /// Recommended; weight 3, severity Medium.
    Should,
    /// Optional; weight 1, severity Low.
    May,
}

impl RequirementLevel {
    /// Scoring weight for this level.
    pub fn weight(&self) -> u32 {
        match self {
            RequirementLevel::Must => 10,
            RequirementLevel::Should => 3,
            RequirementLevel::May => 1,
        }
    }

    /// Severity label used in report sections.
    pub fn severity(&self) -> &'static str {
        match self {
            RequirementLevel::Must => "Critical",
            RequirementLevel::Should => "Medium",
            RequirementLevel::May => "Low",
        }
    }

    /// Display label (`MUST`/`SHOULD`/`MAY`).
    pub fn label(&self) -> &'static str {
        match self {
            RequirementLevel::Must => "MUST",
            RequirementLevel::Should => "SHOULD",
            RequirementLevel::May => "MAY",
        }
    }
}

/// One tagged requirement a test case covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requirement {
    /// Severity level.
    pub level: RequirementLevel,
    /// Stable requirement identifier, e.g. `M-JSONRPC-FORMAT`.
    pub id: &'static str,
}

impl Requirement {
    /// A MUST requirement.
    pub const fn must(id: &'static str) -> Self {
        Self {
            level: RequirementLevel::Must,
            id,
        }
    }

    /// A SHOULD requirement.
    pub const fn should(id: &'static str) -> Self {
        Self {
            level: RequirementLevel::Should,
            id,
        }
    }

    /// A MAY requirement.
    pub const fn may(id: &'static str) -> Self {
        Self {
            level: RequirementLevel::May,
            id,
        }
    }
}

// ---------------------------------------------------------------------------
// Test cases and outcomes
// ---------------------------------------------------------------------------

/// What a test function reports back to the runner.
#[derive(Debug, Clone, PartialEq)]
pub struct TestOutcome {
    /// Whether the behavior under test was compliant.
    pub passed: bool,
    /// Whether the test declined to run (counted separately, never as a
    /// failure; a skipped outcome always has `passed = true`).
    pub skipped: bool,
    /// Human-readable explanation for the report.
    pub message: String,
}

impl TestOutcome {
    /// Passing outcome.
    pub fn pass(message: impl Into<String>) -> Self {
        Self {
            passed: true,
            skipped: false,
            message: message.into(),
        }
    }

    /// Failing outcome.
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            passed: false,
            skipped: false,
            message: message.into(),
        }
    }

    /// Skipped outcome (marked passed so it never counts as a failure).
    pub fn skip(message: impl Into<String>) -> Self {
        Self {
            passed: true,
            skipped: true,
            message: message.into(),
        }
    }
}

/// Signature every registered test function satisfies.
pub type TestFn = for<'a> fn(&'a mut ProtocolAdapter) -> BoxFuture<'a, Result<TestOutcome>>;

/// A registered compliance test: `(fn, name)` plus requirement tags.
#[derive(Clone)]
pub struct TestCase {
    /// Stable identifier used for skip-lists, reporting, categorization.
    pub name: &'static str,
    /// Requirements this test covers; each is scored independently.
    pub requirements: &'static [Requirement],
    /// The test body.
    pub func: TestFn,
}

impl TestCase {
    /// Register a test case.
    pub fn new(name: &'static str, requirements: &'static [Requirement], func: TestFn) -> Self {
        Self {
            name,
            requirements,
            func,
        }
    }

    /// Tool tests get the extended `tools_timeout` and non-critical
    /// timeout treatment (prefix convention `test_tool_` / `test_tools_`).
    pub fn is_tool_test(&self) -> bool {
        self.name.starts_with("test_tool_") || self.name.starts_with("test_tools_")
    }

    /// Highest severity among this test's requirement tags.
    pub fn highest_severity(&self) -> RequirementLevel {
        let mut highest = RequirementLevel::May;
        for req in self.requirements {
            match req.level {
                RequirementLevel::Must => return RequirementLevel::Must,
                RequirementLevel::Should => highest = RequirementLevel::Should,
                RequirementLevel::May => {}
            }
        }
        highest
    }
}

impl std::fmt::Debug for TestCase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestCase")
            .field("name", &self.name)
            .field("requirements", &self.requirements)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Run assembly
// ---------------------------------------------------------------------------

/// Which test groups a run executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestMode {
    /// Every applicable group.
    All,
    /// Lifecycle tests only.
    Core,
    /// Tool tests only.
    Tools,
    /// Async tool tests only (2025-03-26).
    Async,
    /// Specification coverage tests only.
    Spec,
}

impl std::str::FromStr for TestMode {
    type Err = crate::error::McpCheckError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "all" => Ok(TestMode::All),
            "core" => Ok(TestMode::Core),
            "tools" => Ok(TestMode::Tools),
            "async" => Ok(TestMode::Async),
            "spec" => Ok(TestMode::Spec),
            other => Err(crate::error::McpCheckError::Config(format!(
                "unknown test mode `{}`",
                other
            ))),
        }
    }
}

/// How the caller wants the registry filtered.
#[derive(Debug, Clone, Copy)]
pub struct SuiteSelection {
    /// Group selector (`all`/`core`/`tools`/`async`/`spec`).
    pub mode: TestMode,
    /// Only run the adaptive dynamic tool tests (plus lifecycle).
    pub dynamic_only: bool,
    /// Only run the specification coverage tests.
    pub spec_coverage_only: bool,
    /// Exclude async tool tests even on 2025-03-26.
    pub skip_async: bool,
}

/// Assemble the ordered test list for one run.
///
/// Registration order is stable; the report preserves it.
pub fn collect(version: ProtocolVersion, selection: SuiteSelection) -> Vec<TestCase> {
    let mut cases = Vec::new();
    let async_applicable = version.supports_async_tools() && !selection.skip_async;

    if selection.dynamic_only {
        // Adaptive mode: always initialize, then exercise whatever the
        // server actually exposes.
        cases.extend(lifecycle::test_cases());
        cases.extend(dynamic::test_cases());
        if async_applicable {
            cases.extend(async_tools::test_cases());
        }
        return cases;
    }

    if selection.spec_coverage_only {
        cases.extend(spec_coverage::test_cases());
        return cases;
    }

    if matches!(selection.mode, TestMode::All | TestMode::Core) {
        cases.extend(lifecycle::test_cases());
    }
    if matches!(selection.mode, TestMode::All | TestMode::Tools) {
        cases.extend(tools::test_cases());
        cases.extend(dynamic::test_cases());
    }
    if matches!(selection.mode, TestMode::All | TestMode::Async) && async_applicable {
        cases.extend(async_tools::test_cases());
    }
    if matches!(selection.mode, TestMode::All) && version.is_2025_06_18() {
        cases.extend(v2025_06_18::test_cases());
    }
    if matches!(selection.mode, TestMode::All | TestMode::Spec) {
        cases.extend(spec_coverage::test_cases());
    }

    cases
}

/// Drop every case whose name appears in `skip_tests`.
pub fn filter_skipped(cases: Vec<TestCase>, skip_tests: &[String]) -> Vec<TestCase> {
    if skip_tests.is_empty() {
        return cases;
    }
    cases
        .into_iter()
        .filter(|case| !skip_tests.iter().any(|s| s == case.name))
        .collect()
}

// ---------------------------------------------------------------------------
// Schema-driven parameter synthesis
// ---------------------------------------------------------------------------

/// Generate call arguments for a tool from its input schema.
///
/// Understands the JSON-schema object form (`properties` + `required`)
/// and fills only required properties or those carrying a `default`, so
/// optional parameters never mask validation behavior.
pub fn args_from_schema(schema: &serde_json::Value) -> serde_json::Value {
    let mut args = serde_json::Map::new();

    let Some(properties) = schema.get("properties").and_then(|p| p.as_object()) else {
        return serde_json::Value::Object(args);
    };

    let required: Vec<&str> = schema
        .get("required")
        .and_then(|r| r.as_array())
        .map(|r| r.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default();

    for (name, details) in properties {
        if !required.contains(&name.as_str()) && details.get("default").is_none() {
            continue;
        }
        if let Some(value) = value_for_parameter(name, details) {
            args.insert(name.clone(), value);
        }
    }

    serde_json::Value::Object(args)
}

/// Names of the required properties in a tool input schema.
pub fn required_parameters(schema: &serde_json::Value) -> Vec<String> {
    schema
        .get("required")
        .and_then(|r| r.as_array())
        .map(|r| {
            r.iter()
                .filter_map(|v| v.as_str())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Generate a plausible test value for one parameter from its name, type,
/// format, and description.
pub fn value_for_parameter(name: &str, details: &serde_json::Value) -> Option<serde_json::Value> {
    let param_type = details
        .get("type")
        .and_then(|t| t.as_str())
        .unwrap_or("string");
    let format = details.get("format").and_then(|f| f.as_str()).unwrap_or("");
    let lower = name.to_lowercase();

    let contains_any = |terms: &[&str]| terms.iter().any(|t| lower.contains(t));

    match param_type {
        "string" => {
            let value = if matches!(format, "uri" | "url") || contains_any(&["url", "uri", "link"])
            {
                "https://example.com".to_string()
            } else if format == "email" || lower.contains("email") {
                "test@example.com".to_string()
            } else if format == "date-time" || contains_any(&["date", "time"]) {
                chrono::Utc::now().to_rfc3339()
            } else if lower.contains("path") {
                "test/file.txt".to_string()
            } else if contains_any(&["content", "body"]) {
                format!("Test content for {}", name)
            } else if contains_any(&["owner", "username"]) {
                "test-user".to_string()
            } else if contains_any(&["repo", "repository"]) {
                "test-repo".to_string()
            } else if lower.contains("branch") {
                "main".to_string()
            } else if contains_any(&["message", "description"]) {
                format!("Test {} message", name)
            } else if lower.contains("title") {
                format!("Test {}", name)
            } else if contains_any(&["query", "search"]) {
                "test query".to_string()
            } else if contains_any(&["token", "key"]) {
                "test-token-12345".to_string()
            } else if lower.contains("id") {
                "test-id-12345".to_string()
            } else {
                format!("test_{}", name)
            };
            Some(serde_json::Value::String(value))
        }
        "number" | "integer" => {
            let value = if lower.contains("port") {
                8080
            } else if contains_any(&["count", "limit", "max", "size"]) {
                10
            } else if lower.contains("timeout") {
                30
            } else if contains_any(&["index", "position", "offset"]) {
                0
            } else {
                42
            };
            Some(serde_json::json!(value))
        }
        "boolean" => {
            let value = !contains_any(&["disabled", "hidden"]);
            Some(serde_json::json!(value))
        }
        "array" => {
            let item_type = details
                .get("items")
                .and_then(|i| i.get("type"))
                .and_then(|t| t.as_str())
                .unwrap_or("");
            let value = match item_type {
                "string" if lower.contains("label") => serde_json::json!(["bug", "feature"]),
                "string" if lower.contains("assignee") => serde_json::json!(["user1", "user2"]),
                "string" => serde_json::json!(["item1", "item2"]),
                "number" | "integer" => serde_json::json!([1, 2, 3]),
                _ => serde_json::json!([]),
            };
            Some(value)
        }
        "object" => {
            if lower.contains("file") {
                Some(serde_json::json!({"path": "test.txt", "content": "test content"}))
            } else {
                Some(serde_json::json!({}))
            }
        }
        _ => None,
    }
}

/// A value of the wrong type for one parameter, used by the negative
/// validation tests. `None` when no obviously-wrong value exists.
pub fn mismatched_value_for_type(param_type: &str) -> Option<serde_json::Value> {
    match param_type {
        "string" => Some(serde_json::json!(12345)),
        "number" | "integer" => Some(serde_json::json!("not a number")),
        "boolean" => Some(serde_json::json!("not a boolean")),
        _ => None,
    }
}

/// The input schema field of a tool definition (`inputSchema` across
/// revisions; `parameters` tolerated as the legacy alias).
pub fn tool_schema(tool: &serde_json::Value) -> serde_json::Value {
    tool.get("inputSchema")
        .or_else(|| tool.get("parameters"))
        .cloned()
        .unwrap_or_else(|| serde_json::json!({}))
}
