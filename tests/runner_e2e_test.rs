//! End-to-end runner tests: full suites against the mock server
//!
//! Runs the assembled registry through `TestRunner` exactly as the CLI
//! driver does, once per protocol revision, and checks the aggregate
//! invariants plus the rendered reports.

use chrono::TimeZone;

use mcpcheck::harness::protocol::ProtocolVersion;
use mcpcheck::harness::runner::{RunnerConfig, TestRunner};
use mcpcheck::harness::transport::TransportKind;
use mcpcheck::report::{render_json, render_markdown, ReportContext};
use mcpcheck::suites::{self, SuiteSelection, TestMode};

fn mock_server_exe() -> String {
    env!("CARGO_BIN_EXE_mock_mcp_server").to_string()
}

fn selection(mode: TestMode) -> SuiteSelection {
    SuiteSelection {
        mode,
        dynamic_only: false,
        spec_coverage_only: false,
        skip_async: false,
    }
}

async fn run_all(version: ProtocolVersion) -> mcpcheck::RunSummary {
    let config = RunnerConfig::new(mock_server_exe(), TransportKind::Stdio, version);
    let cases = suites::collect(version, selection(TestMode::All));
    TestRunner::new(config).run_suite(&cases).await
}

#[tokio::test]
async fn test_full_run_2024_11_05_passes() {
    let summary = run_all(ProtocolVersion::V2024_11_05).await;

    assert_eq!(
        summary.failed,
        0,
        "failures: {:?}",
        summary
            .results
            .iter()
            .filter(|r| !r.passed)
            .map(|r| format!("{}: {}", r.name, r.message))
            .collect::<Vec<_>>()
    );
    assert_eq!(summary.total, summary.results.len());
    assert_eq!(summary.total, summary.passed + summary.failed + summary.skipped);
    assert!((summary.compliance_percentage() - 100.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_full_run_2025_03_26_passes_with_async() {
    let summary = run_all(ProtocolVersion::V2025_03_26).await;

    assert_eq!(
        summary.failed,
        0,
        "failures: {:?}",
        summary
            .results
            .iter()
            .filter(|r| !r.passed)
            .map(|r| format!("{}: {}", r.name, r.message))
            .collect::<Vec<_>>()
    );
    assert!(summary
        .results
        .iter()
        .any(|r| r.name == "test_async_tool_cancellation" && r.passed && !r.skipped));
}

#[tokio::test]
async fn test_full_run_2025_06_18_passes() {
    let summary = run_all(ProtocolVersion::V2025_06_18).await;

    assert_eq!(
        summary.failed,
        0,
        "failures: {:?}",
        summary
            .results
            .iter()
            .filter(|r| !r.passed)
            .map(|r| format!("{}: {}", r.name, r.message))
            .collect::<Vec<_>>()
    );
    assert!(summary
        .results
        .iter()
        .any(|r| r.name == "test_batch_request_rejection" && r.passed && !r.skipped));
    // The mock server has no elicitation capability, so that test skips.
    assert!(summary
        .results
        .iter()
        .any(|r| r.name == "test_elicitation_support" && r.skipped));
}

#[tokio::test]
async fn test_shutdown_disabled_skips_sensitive_tests() {
    let mut config = RunnerConfig::new(
        mock_server_exe(),
        TransportKind::Stdio,
        ProtocolVersion::V2024_11_05,
    );
    config.shutdown_disabled = true;
    let cases = suites::collect(ProtocolVersion::V2024_11_05, selection(TestMode::Core));
    let summary = TestRunner::new(config).run_suite(&cases).await;

    let shutdown = summary
        .results
        .iter()
        .find(|r| r.name == "test_shutdown_sequence")
        .expect("shutdown test should still be reported");
    assert!(shutdown.skipped);
    assert!(shutdown.passed);
    assert_eq!(shutdown.duration_seconds, 0.0);
}

#[tokio::test]
async fn test_each_result_stays_within_timeout_budget() {
    let summary = run_all(ProtocolVersion::V2024_11_05).await;
    for result in &summary.results {
        assert!(
            result.duration_seconds <= 31.0,
            "{} took {}s",
            result.name,
            result.duration_seconds
        );
    }
}

#[tokio::test]
async fn test_transport_start_failure_fails_every_test() {
    let config = RunnerConfig::new(
        "/nonexistent/mcp/server/binary".to_string(),
        TransportKind::Stdio,
        ProtocolVersion::V2024_11_05,
    );
    let cases = suites::collect(ProtocolVersion::V2024_11_05, selection(TestMode::Core));
    let summary = TestRunner::new(config).run_suite(&cases).await;

    assert_eq!(summary.passed, 0);
    assert_eq!(summary.failed, summary.total);
    assert!(summary.results[0].message.contains("Transport start failure"));
}

#[tokio::test]
async fn test_reports_render_from_live_run() {
    let summary = run_all(ProtocolVersion::V2024_11_05).await;
    let server_command = mock_server_exe();
    let ctx = ReportContext {
        summary: &summary,
        server_command: &server_command,
        protocol_version: ProtocolVersion::V2024_11_05,
        profile: None,
        timestamp: chrono::Local.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap(),
    };

    let markdown = render_markdown(&ctx);
    assert!(markdown.contains("MCP Compliance Report"));
    assert!(markdown.contains("✅ Fully Compliant (100.0%)"));

    let json = render_json(&ctx);
    assert_eq!(json["compliance_percentage"], 100.0);
    assert_eq!(json["failed_tests"], 0);
    assert_eq!(
        json["results"].as_array().unwrap().len(),
        summary.results.len()
    );
}
