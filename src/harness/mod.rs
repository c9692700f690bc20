//! Test execution engine: transport, protocol adapter, and runner layers
//!
//! The harness is a layered stack. [`transport`] frames JSON-RPC messages
//! over a channel (child-process stdio or HTTP), [`protocol`] encodes the
//! version-specific request shapes and lifecycle state machine on top of a
//! transport, and [`runner`] drives one fresh transport + adapter pair per
//! test case, enforcing timeouts and deterministic cleanup.

pub mod protocol;
pub mod runner;
pub mod transport;
pub mod types;
