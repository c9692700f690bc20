//! Per-test orchestration: fresh transport + adapter per case, timeout
//! enforcement, shutdown policy, and result aggregation.
//!
//! Each test gets its own server process (stdio) or HTTP client; no two
//! tests ever share a transport, so a misbehaving server cannot corrupt
//! the rest of the run. Within a run, non-tool tests execute first under
//! the standard timeout, then tool tests under the (independently
//! configurable) tools timeout.
//!
//! A timed-out tool test is non-critical: external tools commonly reach
//! third-party services, and slowness is not a structural compliance
//! defect. Non-tool timeouts fail the test.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::harness::protocol::{ProtocolAdapter, ProtocolVersion};
use crate::harness::transport::http::HttpTransport;
use crate::harness::transport::stdio::StdioTransport;
use crate::harness::transport::{Transport, TransportKind};
use crate::suites::{Requirement, TestCase, SHUTDOWN_SENSITIVE_TESTS};

/// Default per-test timeout, for both categories.
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(30);

fn is_false(b: &bool) -> bool {
    !*b
}

/// Configuration for one compliance run.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Server command line (stdio) or URL (HTTP).
    pub server_command: String,
    /// Which transport variant to construct per test.
    pub transport_kind: TransportKind,
    /// Protocol revision every adapter in the run speaks.
    pub protocol_version: ProtocolVersion,
    /// Environment for spawned server processes.
    pub env_vars: HashMap<String, String>,
    /// Timeout for non-tool tests.
    pub test_timeout: Duration,
    /// Timeout for tests named `test_tool_*` / `test_tools_*`.
    pub tools_timeout: Duration,
    /// When set, shutdown/exit are never sent and shutdown-sensitive
    /// tests are recorded as skipped.
    pub shutdown_disabled: bool,
    /// Per-test progress logging.
    pub verbose: bool,
}

impl RunnerConfig {
    /// Config with default timeouts and shutdown enabled.
    pub fn new(
        server_command: String,
        transport_kind: TransportKind,
        protocol_version: ProtocolVersion,
    ) -> Self {
        Self {
            server_command,
            transport_kind,
            protocol_version,
            env_vars: HashMap::new(),
            test_timeout: DEFAULT_TEST_TIMEOUT,
            tools_timeout: DEFAULT_TEST_TIMEOUT,
            shutdown_disabled: false,
            verbose: false,
        }
    }
}

/// Outcome of one executed (or skipped) test case.
#[derive(Debug, Clone, Serialize)]
pub struct TestResult {
    /// Stable test name.
    pub name: String,
    /// Compliance verdict (skipped and non-critical-timeout results are
    /// recorded as passed).
    pub passed: bool,
    /// Wall-clock duration of the test, in seconds.
    pub duration_seconds: f64,
    /// Explanation for the report.
    pub message: String,
    /// The test was skipped rather than executed.
    #[serde(skip_serializing_if = "is_false")]
    pub skipped: bool,
    /// The applicable timeout elapsed.
    #[serde(skip_serializing_if = "is_false")]
    pub timeout: bool,
    /// A timeout that does not fail the run (tool tests only).
    #[serde(skip_serializing_if = "is_false")]
    pub non_critical: bool,
    /// Requirement tags carried over from registration, for scoring.
    #[serde(skip)]
    pub requirements: &'static [Requirement],
}

impl TestResult {
    fn new(name: &str, passed: bool, message: String, duration: f64) -> Self {
        Self {
            name: name.to_string(),
            passed,
            duration_seconds: duration,
            message,
            skipped: false,
            timeout: false,
            non_critical: false,
            requirements: &[],
        }
    }
}

/// Append-only aggregate of a whole run.
///
/// Invariants: `total == results.len()` and
/// `total == passed + failed + skipped` (timeouts are counted inside
/// passed or failed depending on criticality, and tracked separately).
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    /// Every recorded result, in execution order.
    pub results: Vec<TestResult>,
    /// Number of recorded results.
    pub total: usize,
    /// Results with `passed` and not `skipped`.
    pub passed: usize,
    /// Results with `!passed`.
    pub failed: usize,
    /// Results with `skipped`.
    pub skipped: usize,
    /// Results with `timeout` (critical or not).
    pub timeouts: usize,
}

impl RunSummary {
    fn record(&mut self, result: TestResult) {
        self.total += 1;
        if result.timeout {
            self.timeouts += 1;
        }
        if result.skipped {
            self.skipped += 1;
        } else if result.passed {
            self.passed += 1;
        } else {
            self.failed += 1;
        }
        self.results.push(result);
    }

    /// `100 × passed / (total − skipped)` when the denominator is
    /// positive, `0` otherwise.
    pub fn compliance_percentage(&self) -> f64 {
        let attempted = self.total.saturating_sub(self.skipped);
        if attempted == 0 {
            return 0.0;
        }
        self.passed as f64 / attempted as f64 * 100.0
    }
}

/// Executes test cases against one server with per-test isolation.
pub struct TestRunner {
    config: RunnerConfig,
    #[cfg(test)]
    transport_factory: Option<Box<dyn Fn() -> Box<dyn Transport> + Send + Sync>>,
}

impl TestRunner {
    /// Build a runner for `config`.
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            config,
            #[cfg(test)]
            transport_factory: None,
        }
    }

    /// Replace real transports with scripted ones for unit tests.
    #[cfg(test)]
    pub fn with_transport_factory(
        config: RunnerConfig,
        factory: impl Fn() -> Box<dyn Transport> + Send + Sync + 'static,
    ) -> Self {
        Self {
            config,
            transport_factory: Some(Box::new(factory)),
        }
    }

    fn build_transport(&self) -> std::result::Result<Box<dyn Transport>, String> {
        #[cfg(test)]
        if let Some(factory) = &self.transport_factory {
            return Ok(factory());
        }

        match self.config.transport_kind {
            TransportKind::Stdio => Ok(Box::new(StdioTransport::from_command_line(
                &self.config.server_command,
                self.config.env_vars.clone(),
            ))),
            TransportKind::Http => {
                let transport =
                    HttpTransport::new(&self.config.server_command).map_err(|e| e.to_string())?;
                let transport = if self.config.protocol_version.is_2025_06_18() {
                    transport
                        .with_protocol_version_header(self.config.protocol_version.as_str())
                } else {
                    transport
                };
                Ok(Box::new(transport))
            }
        }
    }

    fn timeout_for(&self, case: &TestCase) -> Duration {
        if case.is_tool_test() {
            self.config.tools_timeout
        } else {
            self.config.test_timeout
        }
    }

    /// Execute one test case in full isolation.
    pub async fn run_test(&self, case: &TestCase) -> TestResult {
        // Shutdown-sensitive tests are skipped outright when shutdown is
        // disabled for the run.
        if self.config.shutdown_disabled && SHUTDOWN_SENSITIVE_TESTS.contains(&case.name) {
            tracing::debug!(target: "mcpcheck::runner", "skipping {} (shutdown disabled)", case.name);
            let mut result = TestResult::new(
                case.name,
                true,
                "Test skipped because shutdown is disabled via MCP_SKIP_SHUTDOWN".to_string(),
                0.0,
            );
            result.skipped = true;
            result.requirements = case.requirements;
            return result;
        }

        if self.config.verbose {
            tracing::info!(target: "mcpcheck::runner", "Running test: {}", case.name);
        }

        let started = Instant::now();
        let elapsed = |started: Instant| started.elapsed().as_secs_f64();

        // Fresh transport per test.
        let mut transport = match self.build_transport() {
            Ok(t) => t,
            Err(e) => {
                let mut result = TestResult::new(
                    case.name,
                    false,
                    format!("Transport start failure: {}", e),
                    elapsed(started),
                );
                result.requirements = case.requirements;
                return result;
            }
        };
        if !transport.start().await {
            let mut result = TestResult::new(
                case.name,
                false,
                format!(
                    "Transport start failure: could not reach `{}`",
                    self.config.server_command
                ),
                elapsed(started),
            );
            result.requirements = case.requirements;
            return result;
        }

        // Fresh adapter bound to the transport; initialization is part
        // of what every test validates.
        let mut adapter = ProtocolAdapter::new(transport, self.config.protocol_version);
        if let Err(e) = adapter.initialize(None).await {
            adapter.stop_transport().await;
            let mut result =
                TestResult::new(case.name, false, e.to_string(), elapsed(started));
            result.requirements = case.requirements;
            return result;
        }
        if let Err(e) = adapter.send_initialized().await {
            adapter.stop_transport().await;
            let mut result = TestResult::new(
                case.name,
                false,
                format!("Failed to send initialized notification: {}", e),
                elapsed(started),
            );
            result.requirements = case.requirements;
            return result;
        }

        // Invoke the test body under the applicable timeout.
        let timeout = self.timeout_for(case);
        let outcome = tokio::time::timeout(timeout, (case.func)(&mut adapter)).await;

        let mut result = match outcome {
            Err(_elapsed_timeout) => {
                if case.is_tool_test() {
                    tracing::warn!(
                        target: "mcpcheck::runner",
                        "test {} timed out after {}s (non-critical, continuing)",
                        case.name,
                        timeout.as_secs()
                    );
                    let mut result = TestResult::new(
                        case.name,
                        true,
                        format!(
                            "Test timed out after {}s but is considered non-critical",
                            timeout.as_secs()
                        ),
                        elapsed(started),
                    );
                    result.timeout = true;
                    result.non_critical = true;
                    result.requirements = case.requirements;
                    // Server state is unknown: skip shutdown, just drop
                    // the transport.
                    adapter.stop_transport().await;
                    return result;
                }
                let mut result = TestResult::new(
                    case.name,
                    false,
                    format!("Test timed out after {}s", timeout.as_secs()),
                    elapsed(started),
                );
                result.timeout = true;
                result
            }
            Ok(Ok(outcome)) => {
                let mut result = TestResult::new(
                    case.name,
                    outcome.passed,
                    outcome.message,
                    elapsed(started),
                );
                result.skipped = outcome.skipped;
                result
            }
            Ok(Err(e)) => TestResult::new(
                case.name,
                false,
                format!("Test failed with error: {}", e),
                elapsed(started),
            ),
        };
        result.requirements = case.requirements;

        if self.config.verbose {
            let status = if result.passed { "PASSED" } else { "FAILED" };
            tracing::info!(
                target: "mcpcheck::runner",
                "  {} ({:.2}s): {}",
                status,
                result.duration_seconds,
                result.message
            );
        }

        // Orderly shutdown unless disabled; a shutdown failure never
        // overrides the test's own verdict.
        if !self.config.shutdown_disabled {
            if let Err(e) = adapter.shutdown().await {
                tracing::debug!(target: "mcpcheck::runner", "shutdown error ignored: {}", e);
            }
            let _ = adapter.exit().await;
        }
        adapter.stop_transport().await;

        result
    }

    /// Execute the cases sequentially in two phases: non-tool tests
    /// first (standard timeout), then tool tests (extended timeout).
    pub async fn run_suite(&self, cases: &[TestCase]) -> RunSummary {
        let (tool_cases, non_tool_cases): (Vec<&TestCase>, Vec<&TestCase>) =
            cases.iter().partition(|c| c.is_tool_test());

        let mut summary = RunSummary::default();

        if !non_tool_cases.is_empty() {
            tracing::info!(
                target: "mcpcheck::runner",
                "Running {} non-tool tests with {}s timeout",
                non_tool_cases.len(),
                self.config.test_timeout.as_secs()
            );
            for case in non_tool_cases {
                summary.record(self.run_test(case).await);
            }
        }

        if !tool_cases.is_empty() {
            tracing::info!(
                target: "mcpcheck::runner",
                "Running {} tool tests with {}s timeout",
                tool_cases.len(),
                self.config.tools_timeout.as_secs()
            );
            for case in tool_cases {
                summary.record(self.run_test(case).await);
            }
        }

        summary
    }
}
