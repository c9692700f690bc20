//! mcpcheck - MCP server compliance test harness
//!
//! Main entry point: wires the CLI, compatibility resolver, test
//! registry, runner, and report synthesizer together.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mcpcheck::cli::Cli;
use mcpcheck::compat::{is_shutdown_skipped, CompatResolver, ServerProfile};
use mcpcheck::harness::protocol::ProtocolVersion;
use mcpcheck::harness::runner::{RunnerConfig, TestRunner};
use mcpcheck::harness::transport::TransportKind;
use mcpcheck::report::{render_markdown, write_reports, ReportContext, Scoreboard};
use mcpcheck::suites::{self, SuiteSelection, TestMode};
use mcpcheck::McpCheckError;

/// Exit status for an operator interrupt (SIGINT convention).
const EXIT_INTERRUPTED: i32 = 130;

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();
    init_tracing(cli.debug);

    let code = tokio::select! {
        result = run(&cli) => match result {
            Ok(failed) if failed == 0 => 0,
            Ok(_) => 1,
            Err(e) => {
                tracing::error!("run failed: {:#}", e);
                eprintln!("Error: {:#}", e);
                1
            }
        },
        _ = tokio::signal::ctrl_c() => {
            // Dropping the run future stops the in-flight transport;
            // partial results are discarded.
            eprintln!("Interrupted");
            EXIT_INTERRUPTED
        }
    };

    std::process::exit(code);
}

/// Execute the full compliance run. Returns the number of failed tests.
async fn run(cli: &Cli) -> Result<usize> {
    let full_command = cli.full_server_command();
    let transport_kind = TransportKind::for_command(&full_command);
    match transport_kind {
        TransportKind::Http => {
            tracing::info!("Using HTTP transport with server URL: {}", full_command)
        }
        TransportKind::Stdio => {
            tracing::info!("Using STDIO transport with command: {}", full_command)
        }
    }

    // Profiles: the --server-config document first, then built-ins.
    let mut file_profiles = Vec::new();
    if let Some(path) = &cli.server_config {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            McpCheckError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let mut profile: ServerProfile = serde_json::from_str(&raw).map_err(|e| {
            McpCheckError::Config(format!("invalid server config {}: {}", path.display(), e))
        })?;
        // A config document without identifiers applies to this run's
        // server unconditionally.
        if profile.identifiers.is_empty() {
            profile.identifiers.push(full_command.clone());
        }
        tracing::info!("Loaded server configuration from {}", path.display());
        file_profiles.push(profile);
    }
    let resolver = CompatResolver::new(file_profiles);

    // Protocol version: explicit flag, else auto-detection via the
    // resolver, else the advisory environment override.
    let protocol_version: ProtocolVersion = match &cli.protocol_version {
        Some(version) => version.parse()?,
        None if cli.auto_detect => {
            let detected = resolver
                .recommended_protocol(&full_command)
                .or_else(|| std::env::var("MCP_PROTOCOL_VERSION").ok()?.parse().ok());
            match detected {
                Some(version) => {
                    tracing::info!("Auto-detected protocol version {}", version);
                    version
                }
                None => {
                    return Err(McpCheckError::Config(
                        "--auto-detect found no recommended protocol; pass --protocol-version"
                            .to_string(),
                    )
                    .into())
                }
            }
        }
        None => {
            return Err(McpCheckError::Config(
                "--protocol-version is required unless --auto-detect is given".to_string(),
            )
            .into())
        }
    };

    // Environment for spawned servers: profile overlay plus the version
    // advisory for servers that read it.
    let mut env_vars: HashMap<String, String> = resolver.prepare_environment(&full_command);
    env_vars.insert(
        "MCP_PROTOCOL_VERSION".to_string(),
        protocol_version.as_str().to_string(),
    );

    let shutdown_disabled = cli.skip_shutdown || is_shutdown_skipped(&env_vars);
    if shutdown_disabled {
        env_vars.insert("MCP_SKIP_SHUTDOWN".to_string(), "true".to_string());
        tracing::info!("Shutdown will be skipped for this run");
    }

    let profile_config = resolver.test_config(&full_command);

    // Required tools: CLI flag, then environment fallback, then profile.
    let required_tools: Vec<String> = cli
        .required_tools
        .clone()
        .or_else(|| std::env::var("MCP_REQUIRED_TOOLS").ok())
        .map(|csv| csv.split(',').map(|t| t.trim().to_string()).collect())
        .unwrap_or_else(|| profile_config.required_tools.clone());
    if !required_tools.is_empty() {
        env_vars.insert("MCP_REQUIRED_TOOLS".to_string(), required_tools.join(","));
        tracing::info!("Required tools: {}", required_tools.join(", "));
    }

    // Skip list: CLI additions on top of the profile's. When shutdown
    // is disabled, shutdown-sensitive tests stay in the run so the
    // runner records them as skipped (the report must list them).
    let mut skip_tests = profile_config.skip_tests.clone();
    if let Some(csv) = &cli.skip_tests {
        skip_tests.extend(csv.split(',').map(|t| t.trim().to_string()));
    }
    if shutdown_disabled {
        skip_tests.retain(|name| !suites::SHUTDOWN_SENSITIVE_TESTS.contains(&name.as_str()));
    }
    if !skip_tests.is_empty() {
        tracing::info!("Skipping tests: {}", skip_tests.join(", "));
    }

    // Assemble the test list.
    let mode: TestMode = cli.test_mode.parse()?;
    let selection = SuiteSelection {
        mode,
        dynamic_only: cli.dynamic_only,
        spec_coverage_only: cli.spec_coverage_only,
        skip_async: cli.skip_async,
    };
    let cases = suites::filter_skipped(suites::collect(protocol_version, selection), &skip_tests);

    tracing::info!(
        "Running {} compliance tests for protocol {} against {}",
        cases.len(),
        protocol_version,
        full_command
    );

    // Run.
    let mut config = RunnerConfig::new(full_command.clone(), transport_kind, protocol_version);
    config.env_vars = env_vars;
    config.test_timeout = Duration::from_secs(cli.test_timeout);
    config.tools_timeout = Duration::from_secs(cli.tools_timeout);
    config.shutdown_disabled = shutdown_disabled;
    config.verbose = cli.verbose;

    let runner = TestRunner::new(config);
    let summary = runner.run_suite(&cases).await;

    // Reports.
    let ctx = ReportContext {
        summary: &summary,
        server_command: &full_command,
        protocol_version,
        profile: resolver.matching_profile(&full_command),
        timestamp: chrono::Local::now(),
    };
    let scoreboard = Scoreboard::from_summary(&summary);

    println!("\nCompliance Test Results:");
    println!("Total tests: {}", summary.total);
    println!("Passed: {}", summary.passed);
    println!("Failed: {}", summary.failed);
    println!("Skipped: {}", summary.skipped);
    println!(
        "Compliance Status: {} ({:.1}%)",
        scoreboard.level.badge(),
        summary.compliance_percentage()
    );

    if cli.debug {
        // Full rendering also lands in the report file; the console copy
        // is for debugging runs without file access.
        tracing::debug!("\n{}", render_markdown(&ctx));
    }

    let written = write_reports(&ctx, &cli.output_dir, &cli.report_prefix, cli.json)?;
    for path in &written {
        println!("Report saved to: {}", path.display());
    }

    Ok(summary.failed)
}

/// Initialize tracing subscriber with environment filter
fn init_tracing(debug: bool) {
    let default_filter = if debug { "mcpcheck=debug" } else { "mcpcheck=info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
