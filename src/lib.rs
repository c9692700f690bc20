//! mcpcheck - MCP server compliance test harness library
//!
//! This library drives a Model Context Protocol server through a
//! scripted JSON-RPC dialogue, checks its responses against one of
//! three protocol revisions, and renders a compliance report.
//!
//! # Architecture
//!
//! - `harness::transport`: byte-level framing over child-process stdio
//!   or HTTP, with request/response correlation
//! - `harness::protocol`: version-specific message construction,
//!   response validation, and the session lifecycle state machine
//! - `harness::runner`: per-test orchestration with timeout enforcement
//!   and deterministic cleanup
//! - `suites`: the curated test case catalogs with requirement tags
//! - `compat`: per-server profiles (environment, skip lists, protocol
//!   recommendations)
//! - `report`: weighted scoring and Markdown/JSON rendering
//!
//! # Example
//!
//! ```no_run
//! use mcpcheck::harness::protocol::ProtocolVersion;
//! use mcpcheck::harness::runner::{RunnerConfig, TestRunner};
//! use mcpcheck::harness::transport::TransportKind;
//! use mcpcheck::suites::{self, SuiteSelection, TestMode};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = RunnerConfig::new(
//!         "./minimal_server".to_string(),
//!         TransportKind::Stdio,
//!         ProtocolVersion::V2024_11_05,
//!     );
//!     let cases = suites::collect(
//!         ProtocolVersion::V2024_11_05,
//!         SuiteSelection {
//!             mode: TestMode::All,
//!             dynamic_only: false,
//!             spec_coverage_only: false,
//!             skip_async: false,
//!         },
//!     );
//!     let summary = TestRunner::new(config).run_suite(&cases).await;
//!     println!("{} of {} tests passed", summary.passed, summary.total);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod compat;
pub mod error;
pub mod harness;
pub mod report;
pub mod suites;

// Re-export commonly used types
pub use compat::{CompatResolver, ServerProfile};
pub use error::{McpCheckError, Result};
pub use harness::protocol::{ProtocolAdapter, ProtocolVersion};
pub use harness::runner::{RunSummary, RunnerConfig, TestResult, TestRunner};
pub use harness::transport::TransportKind;
