//! Configuration types for the sluice driver proxy.
//!
//! Configuration is loaded from a YAML file (conventionally `sluice.yaml`).
//! Every section is optional and falls back to its defaults:
//!
//! ```yaml
//! proxy:
//!   scheme: "sluice:"
//!   rewrite_enabled: true
//!   wrap_results: true
//!   rewrite_failure: open      # or "closed"
//! rewrite:
//!   tag: "app=billing"
//!   tenancy:
//!     tenant: acme
//!     default_column: tenant_id
//!     global_tables: [currencies]
//! results:
//!   hidden_columns: [password_hash]
//!   redacted_columns: [email]
//! ```

pub mod proxy;
pub mod tenancy;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub use proxy::{FailurePolicy, OPTION_REWRITE, OPTION_WRAP_RESULTS, ProxyConfig, ResultsConfig};
pub use tenancy::{TableTenancyConfig, TenancyConfig};

/// Complete sluice configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SluiceConfig {
    /// Proxy driver settings.
    #[serde(default)]
    pub proxy: ProxyConfig,

    /// Rewriter settings.
    #[serde(default)]
    pub rewrite: RewriteConfig,

    /// Result cursor filtering.
    #[serde(default)]
    pub results: ResultsConfig,
}

/// Configuration of the built-in rewriters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RewriteConfig {
    /// Comment text appended to every statement (`/* tag */`).
    #[serde(default)]
    pub tag: Option<String>,

    /// Tenant predicate injection (inline).
    #[serde(default)]
    pub tenancy: TenancyConfig,

    /// Path to a tenancy file (alternative to inline).
    #[serde(default)]
    pub tenancy_file: Option<PathBuf>,
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SluiceConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(ConfigError::from)
    }

    /// Load configuration, resolve the tenancy file and validate the result.
    ///
    /// A relative `tenancy_file` is resolved against the directory of `path`.
    pub fn load_with_context(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config = Self::from_file(path)?;

        let base_dir = path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        if let Some(tenancy_file) = &config.rewrite.tenancy_file {
            let tenancy_path = if tenancy_file.is_absolute() {
                tenancy_file.clone()
            } else {
                base_dir.join(tenancy_file)
            };

            if !tenancy_path.exists() {
                return Err(ConfigError::Config(format!(
                    "Tenancy file not found: {}",
                    tenancy_path.display()
                )));
            }
            config.rewrite.tenancy = TenancyConfig::from_file(&tenancy_path)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check invariants serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.proxy.scheme.is_empty() {
            return Err(ConfigError::Config(
                "proxy.scheme must not be empty".to_string(),
            ));
        }
        if self.rewrite.tag.as_deref().is_some_and(|t| t.contains("*/")) {
            return Err(ConfigError::Config(
                "rewrite.tag must not contain \"*/\"".to_string(),
            ));
        }
        self.rewrite.tenancy.validate()
    }
}
