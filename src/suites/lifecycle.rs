//! Lifecycle compliance tests: initialization, capabilities, versioning,
//! ordering discipline, and the shutdown sequence.
//!
//! The runner performs the `initialize`/`initialized` handshake before
//! invoking any test, so these tests mostly verify the handshake's
//! observable outcome plus the server's behavior around it.

use crate::error::Result;
use crate::harness::protocol::ProtocolAdapter;
use crate::harness::types::{JsonRpcRequest, METHOD_INITIALIZE, METHOD_PING};
use crate::suites::{Requirement, TestCase, TestOutcome};

/// Verify that the handshake negotiated a version and produced server
/// capabilities.
pub async fn test_initialization(protocol: &mut ProtocolAdapter) -> Result<TestOutcome> {
    if protocol.negotiated_version().is_none() {
        return Ok(TestOutcome::fail("Protocol version was not negotiated"));
    }

    let capabilities = protocol.server_capabilities();
    if !capabilities.is_object() {
        return Ok(TestOutcome::fail(
            "Server capabilities were not received as an object",
        ));
    }

    if protocol
        .server_info()
        .as_object()
        .map(|info| info.is_empty())
        .unwrap_or(true)
    {
        return Ok(TestOutcome::pass("Server info was not provided (optional)"));
    }

    Ok(TestOutcome::pass("Initialization successful"))
}

/// Verify the capability declaration is structurally sound.
pub async fn test_server_capabilities(protocol: &mut ProtocolAdapter) -> Result<TestOutcome> {
    let capabilities = protocol.server_capabilities();
    let Some(map) = capabilities.as_object() else {
        return Ok(TestOutcome::fail(format!(
            "Server capabilities is not an object: {}",
            capabilities
        )));
    };

    let declared: Vec<&str> = map.keys().map(String::as_str).collect();
    Ok(TestOutcome::pass(format!(
        "Server declared capabilities: {}",
        if declared.is_empty() {
            "none".to_string()
        } else {
            declared.join(", ")
        }
    )))
}

/// Verify the server negotiated the version the harness claimed.
///
/// A disagreement is reported with a diagnostic naming both versions.
pub async fn test_protocol_version_negotiated(
    protocol: &mut ProtocolAdapter,
) -> Result<TestOutcome> {
    let claimed = protocol.version().as_str();
    match protocol.negotiated_version() {
        None => Ok(TestOutcome::fail("Protocol version was not negotiated")),
        Some(got) if got != claimed => Ok(TestOutcome::fail(format!(
            "Negotiated protocol version `{}` disagrees with claimed version `{}`",
            got, claimed
        ))),
        Some(got) => Ok(TestOutcome::pass(format!(
            "Server correctly negotiated protocol version `{}`",
            got
        ))),
    }
}

/// Verify initialization-order discipline: requests are accepted after
/// the handshake, and a second `initialize` does not break the session.
pub async fn test_initialization_order(protocol: &mut ProtocolAdapter) -> Result<TestOutcome> {
    // A feature request after the handshake must succeed (or be a clean
    // method-not-found for servers without ping).
    let id = protocol.make_request_id("init_order");
    let response = protocol
        .raw_request(JsonRpcRequest::new(
            id,
            METHOD_PING,
            Some(serde_json::json!({})),
        ))
        .await;
    if let Err(e) = response {
        return Ok(TestOutcome::fail(format!(
            "Server did not accept a request after initialization: {}",
            e
        )));
    }

    // A reinitialization attempt may be rejected or tolerated, but the
    // server must stay responsive afterwards.
    let reinit_id = protocol.make_request_id("reinit");
    let claimed = protocol.version().as_str().to_string();
    let _ = protocol
        .raw_request(JsonRpcRequest::new(
            reinit_id,
            METHOD_INITIALIZE,
            Some(serde_json::json!({
                "protocolVersion": claimed,
                "capabilities": {},
                "clientInfo": {"name": "mcpcheck", "version": env!("CARGO_PKG_VERSION")}
            })),
        ))
        .await;

    let probe_id = protocol.make_request_id("post_reinit");
    match protocol
        .raw_request(JsonRpcRequest::new(
            probe_id,
            METHOD_PING,
            Some(serde_json::json!({})),
        ))
        .await
    {
        Ok(_) => Ok(TestOutcome::pass(
            "Server and client correctly follow initialization order",
        )),
        Err(e) => Ok(TestOutcome::fail(format!(
            "Server failed to respond after reinitialization attempt: {}",
            e
        ))),
    }
}

/// Verify the shutdown request is acknowledged.
///
/// Registered in the shutdown-sensitive set: runs only when shutdown is
/// enabled for the run, because some servers exit aggressively on any
/// request after `shutdown`.
pub async fn test_shutdown_sequence(protocol: &mut ProtocolAdapter) -> Result<TestOutcome> {
    match protocol.shutdown().await {
        Ok(()) => Ok(TestOutcome::pass(
            "Server acknowledged the shutdown request",
        )),
        Err(e) => Ok(TestOutcome::fail(format!(
            "Server rejected the shutdown request: {}",
            e
        ))),
    }
}

static INITIALIZATION_REQS: &[Requirement] = &[Requirement::must("M-LIFECYCLE-INIT")];
static CAPABILITIES_REQS: &[Requirement] = &[Requirement::must("M-LIFECYCLE-CAPABILITIES")];
static VERSION_REQS: &[Requirement] = &[
    Requirement::must("M-LIFECYCLE-VERSION-NEGOTIATION"),
    Requirement::should("S-LIFECYCLE-MULTI-VERSION"),
];
static ORDER_REQS: &[Requirement] = &[Requirement::must("M-LIFECYCLE-INIT-ORDER")];
static SHUTDOWN_REQS: &[Requirement] = &[Requirement::must("M-LIFECYCLE-SHUTDOWN")];

/// Registration-ordered lifecycle test cases.
pub fn test_cases() -> Vec<TestCase> {
    vec![
        TestCase::new("test_initialization", INITIALIZATION_REQS, |p| {
            Box::pin(test_initialization(p))
        }),
        TestCase::new("test_server_capabilities", CAPABILITIES_REQS, |p| {
            Box::pin(test_server_capabilities(p))
        }),
        TestCase::new("test_protocol_version_negotiated", VERSION_REQS, |p| {
            Box::pin(test_protocol_version_negotiated(p))
        }),
        TestCase::new("test_initialization_order", ORDER_REQS, |p| {
            Box::pin(test_initialization_order(p))
        }),
        TestCase::new("test_shutdown_sequence", SHUTDOWN_REQS, |p| {
            Box::pin(test_shutdown_sequence(p))
        }),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::protocol::ProtocolVersion;
    use crate::harness::transport::fake::FakeTransport;

    async fn ready_adapter(fake: FakeTransport, version: ProtocolVersion) -> ProtocolAdapter {
        let mut adapter = ProtocolAdapter::new(Box::new(fake), version);
        adapter.initialize(None).await.unwrap();
        adapter
    }

    fn fake_with_init(version: &str) -> FakeTransport {
        let mut fake = FakeTransport::new();
        fake.enqueue_result(serde_json::json!({
            "protocolVersion": version,
            "capabilities": {"tools": {}},
            "serverInfo": {"name": "fake", "version": "1.0.0"}
        }));
        fake
    }

    #[tokio::test]
    async fn test_initialization_passes_after_handshake() {
        let fake = fake_with_init("2024-11-05");
        let mut adapter = ready_adapter(fake, ProtocolVersion::V2024_11_05).await;
        let outcome = test_initialization(&mut adapter).await.unwrap();
        assert!(outcome.passed, "{}", outcome.message);
    }

    #[tokio::test]
    async fn test_version_negotiation_reports_both_versions_on_mismatch() {
        let fake = fake_with_init("2025-03-26");
        let mut adapter = ready_adapter(fake, ProtocolVersion::V2024_11_05).await;
        let outcome = test_protocol_version_negotiated(&mut adapter).await.unwrap();
        assert!(!outcome.passed);
        assert!(outcome.message.contains("2025-03-26"));
        assert!(outcome.message.contains("2024-11-05"));
    }

    #[tokio::test]
    async fn test_version_negotiation_passes_on_agreement() {
        let fake = fake_with_init("2024-11-05");
        let mut adapter = ready_adapter(fake, ProtocolVersion::V2024_11_05).await;
        let outcome = test_protocol_version_negotiated(&mut adapter).await.unwrap();
        assert!(outcome.passed, "{}", outcome.message);
    }

    #[tokio::test]
    async fn test_initialization_order_survives_reinit_attempt() {
        let mut fake = fake_with_init("2024-11-05");
        fake.enqueue_result(serde_json::json!({})); // post-init ping
        fake.enqueue_error(-32600, "already initialized"); // reinit attempt
        fake.enqueue_result(serde_json::json!({})); // responsiveness probe
        let mut adapter = ready_adapter(fake, ProtocolVersion::V2024_11_05).await;

        let outcome = test_initialization_order(&mut adapter).await.unwrap();
        assert!(outcome.passed, "{}", outcome.message);
    }

    #[tokio::test]
    async fn test_shutdown_sequence_passes_on_ack() {
        let mut fake = fake_with_init("2024-11-05");
        fake.enqueue_result(serde_json::json!({}));
        let mut adapter = ready_adapter(fake, ProtocolVersion::V2024_11_05).await;

        let outcome = test_shutdown_sequence(&mut adapter).await.unwrap();
        assert!(outcome.passed, "{}", outcome.message);
    }

    #[test]
    fn test_cases_registration_order() {
        let names: Vec<&str> = test_cases().iter().map(|c| c.name).collect();
        assert_eq!(names[0], "test_initialization");
        assert_eq!(*names.last().unwrap(), "test_shutdown_sequence");
    }
}
