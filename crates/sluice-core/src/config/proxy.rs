//! Proxy configuration types.

use serde::{Deserialize, Serialize};

/// Connect option that turns rewriting on or off for one connection.
pub const OPTION_REWRITE: &str = "sluice.rewrite";

/// Connect option that turns result cursor wrapping on or off for one connection.
pub const OPTION_WRAP_RESULTS: &str = "sluice.wrap_results";

/// Configuration for the proxy driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Scheme marker that prefixes every proxy address.
    #[serde(default = "default_scheme")]
    pub scheme: String,

    /// Whether statement SQL is rewritten before reaching the delegate.
    #[serde(default = "default_true")]
    pub rewrite_enabled: bool,

    /// Whether result cursors are wrapped in a filtering proxy.
    #[serde(default = "default_true")]
    pub wrap_results: bool,

    /// What happens when the rewriter cannot handle a statement.
    #[serde(default)]
    pub rewrite_failure: FailurePolicy,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            scheme: default_scheme(),
            rewrite_enabled: true,
            wrap_results: true,
            rewrite_failure: FailurePolicy::default(),
        }
    }
}

/// Rewrite failure policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Forward the original SQL unchanged.
    #[default]
    Open,
    /// Refuse to create the statement.
    Closed,
}

/// Result cursor filtering configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultsConfig {
    /// Columns removed from every wrapped cursor (case-insensitive).
    #[serde(default)]
    pub hidden_columns: Vec<String>,

    /// Columns whose non-null values are replaced with `***` (case-insensitive).
    #[serde(default)]
    pub redacted_columns: Vec<String>,
}

// Default value functions
fn default_scheme() -> String {
    "sluice:".to_string()
}

fn default_true() -> bool {
    true
}
