//! Server compatibility resolver: per-server profiles for environment
//! preparation, skip lists, required tools, and protocol
//! recommendations.
//!
//! Profiles arrive already parsed (from `--server-config` or the
//! built-in set); a profile matches a run when any of its identifier
//! substrings occurs in the server command or URL. The first matching
//! profile wins.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::harness::protocol::ProtocolVersion;

/// A server profile record.
///
/// `environment` maps variable names to human descriptions of what the
/// variable is for; descriptions are surfaced in warnings when a
/// required variable has no value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerProfile {
    /// Display name, e.g. `Brave Search`.
    #[serde(default)]
    pub name: String,
    /// Substrings matched against the server command or URL.
    #[serde(default)]
    pub identifiers: Vec<String>,
    /// Required environment variables with human descriptions.
    #[serde(default)]
    pub environment: HashMap<String, String>,
    /// Test names this server should never run.
    #[serde(default)]
    pub skip_tests: Vec<String>,
    /// Tools the server is expected to expose.
    #[serde(default)]
    pub required_tools: Vec<String>,
    /// Protocol revision the server is known to work best with.
    #[serde(default)]
    pub recommended_protocol: Option<String>,
}

/// Skip-list and required-tool settings extracted for one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileTestConfig {
    /// Test names to skip.
    pub skip_tests: Vec<String>,
    /// Tools the server must expose.
    pub required_tools: Vec<String>,
}

/// Read-only profile lookup for a run.
#[derive(Debug, Clone)]
pub struct CompatResolver {
    profiles: Vec<ServerProfile>,
}

impl CompatResolver {
    /// Build a resolver over explicit profiles plus the built-in set.
    ///
    /// Explicit profiles are consulted first, so a user-supplied profile
    /// overrides the built-in one for the same server.
    pub fn new(mut profiles: Vec<ServerProfile>) -> Self {
        profiles.extend(builtin_profiles());
        Self { profiles }
    }

    /// Resolver with only the built-in profiles.
    pub fn with_builtins() -> Self {
        Self::new(Vec::new())
    }

    /// First profile whose identifier is a substring of `command`.
    pub fn matching_profile(&self, command: &str) -> Option<&ServerProfile> {
        self.profiles.iter().find(|profile| {
            profile
                .identifiers
                .iter()
                .any(|id| !id.is_empty() && command.contains(id.as_str()))
        })
    }

    /// Build the environment for a server launch.
    ///
    /// Starts from the current process environment and overlays the
    /// matching profile's variables: already-set variables are kept,
    /// unset ones are seeded from `MCP_DEFAULT_<NAME>` when present, and
    /// `MCP_SKIP_SHUTDOWN` is forced to `"true"` when the profile lists
    /// it. Missing variables without defaults produce warnings only; the
    /// launched server is expected to fail explicitly.
    pub fn prepare_environment(&self, command: &str) -> HashMap<String, String> {
        let mut env: HashMap<String, String> = std::env::vars().collect();

        let Some(profile) = self.matching_profile(command) else {
            return env;
        };
        tracing::info!(
            target: "mcpcheck::compat",
            "Found configuration for {}",
            if profile.name.is_empty() { command } else { &profile.name }
        );

        for (var, description) in &profile.environment {
            if env.get(var).map(|v| !v.is_empty()).unwrap_or(false) {
                continue;
            }

            let default_var = format!("MCP_DEFAULT_{}", var);
            if let Ok(value) = std::env::var(&default_var) {
                tracing::info!(
                    target: "mcpcheck::compat",
                    "Using default value for {} from {}",
                    var,
                    default_var
                );
                env.insert(var.clone(), value);
            } else if var == "MCP_SKIP_SHUTDOWN" {
                env.insert(var.clone(), "true".to_string());
            } else {
                tracing::warn!(
                    target: "mcpcheck::compat",
                    "{} requires {} ({}); set {} or {} for automated tests",
                    profile.name,
                    var,
                    description,
                    var,
                    default_var
                );
            }
        }

        env
    }

    /// Skip-list and required tools for the matching profile, or empty.
    pub fn test_config(&self, command: &str) -> ProfileTestConfig {
        self.matching_profile(command)
            .map(|profile| ProfileTestConfig {
                skip_tests: profile.skip_tests.clone(),
                required_tools: profile.required_tools.clone(),
            })
            .unwrap_or_default()
    }

    /// Recommended protocol revision for the matching profile, if any.
    pub fn recommended_protocol(&self, command: &str) -> Option<ProtocolVersion> {
        self.matching_profile(command)
            .and_then(|profile| profile.recommended_protocol.as_deref())
            .and_then(|version| version.parse().ok())
    }
}

/// Whether `MCP_SKIP_SHUTDOWN` is truthy in the given environment.
pub fn is_shutdown_skipped(env: &HashMap<String, String>) -> bool {
    env.get("MCP_SKIP_SHUTDOWN")
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

/// The well-known built-in profiles. Only `server-brave-search` ships by
/// default; every other server needs an explicit profile.
fn builtin_profiles() -> Vec<ServerProfile> {
    vec![ServerProfile {
        name: "Brave Search".to_string(),
        identifiers: vec!["server-brave-search".to_string()],
        environment: HashMap::from([
            (
                "BRAVE_API_KEY".to_string(),
                "API key for Brave Search API access".to_string(),
            ),
            (
                "MCP_SKIP_SHUTDOWN".to_string(),
                "Skip the shutdown request for this server".to_string(),
            ),
        ]),
        skip_tests: vec![
            "test_shutdown_sequence".to_string(),
            "test_exit_after_shutdown".to_string(),
        ],
        required_tools: vec![
            "brave_web_search".to_string(),
            "brave_local_search".to_string(),
        ],
        recommended_protocol: Some("2024-11-05".to_string()),
    }]
}
