//! Command-line interface definition for mcpcheck
//!
//! This module defines the CLI structure using clap's derive API. The
//! harness is batch-only: one flat argument set, no subcommands, no
//! interactive prompts.

use clap::Parser;
use std::path::PathBuf;

/// mcpcheck - MCP server compliance test harness
///
/// Runs a scripted protocol dialogue against an MCP server (launched as
/// a child process or reached over HTTP) and generates a compliance
/// report for the selected protocol revision.
#[derive(Parser, Debug, Clone)]
#[command(name = "mcpcheck")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Command to start the server, or its URL when using HTTP transport
    #[arg(long)]
    pub server_command: String,

    /// Protocol version to test against (2024-11-05, 2025-03-26 or
    /// 2025-06-18); required unless --auto-detect is given
    #[arg(long)]
    pub protocol_version: Option<String>,

    /// Additional arguments appended to the server command
    #[arg(long, allow_hyphen_values = true)]
    pub args: Option<String>,

    /// Path to a server profile JSON document
    #[arg(long)]
    pub server_config: Option<PathBuf>,

    /// Directory to store reports
    #[arg(long, default_value = "reports")]
    pub output_dir: PathBuf,

    /// Prefix for report filenames
    #[arg(long, default_value = "cr")]
    pub report_prefix: String,

    /// Also emit a JSON report alongside the Markdown one
    #[arg(long)]
    pub json: bool,

    /// Enable debug diagnostics
    #[arg(long)]
    pub debug: bool,

    /// Exclude async tool tests even on 2025-03-26
    #[arg(long)]
    pub skip_async: bool,

    /// Force-disable the shutdown/exit sequence for this run
    #[arg(long)]
    pub skip_shutdown: bool,

    /// Comma-separated list of tools the server must expose
    #[arg(long)]
    pub required_tools: Option<String>,

    /// Comma-separated list of additional test names to skip
    #[arg(long)]
    pub skip_tests: Option<String>,

    /// Only run the adaptive dynamic tool tests
    #[arg(long)]
    pub dynamic_only: bool,

    /// Only run the specification coverage tests
    #[arg(long)]
    pub spec_coverage_only: bool,

    /// Test group selector
    #[arg(long, default_value = "all", value_parser = ["all", "core", "tools", "async", "spec"])]
    pub test_mode: String,

    /// Infer the protocol version and profile from the server command
    #[arg(long)]
    pub auto_detect: bool,

    /// Timeout for non-tool tests, in seconds
    #[arg(long, default_value_t = 30)]
    pub test_timeout: u64,

    /// Timeout for tool tests, in seconds
    #[arg(long, default_value_t = 30)]
    pub tools_timeout: u64,

    /// Per-test progress logging
    #[arg(long)]
    pub verbose: bool,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// The full server command line including any extra `--args`.
    pub fn full_server_command(&self) -> String {
        match &self.args {
            Some(extra) if !extra.is_empty() => {
                format!("{} {}", self.server_command, extra)
            }
            _ => self.server_command.clone(),
        }
    }
}
