//! Tenancy configuration for tenant predicate injection.
//!
//! Describes which column scopes each table to a tenant and which tables are
//! shared across tenants.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use super::ConfigError;

/// Configuration for tenant scoping.
///
/// Injection is active only when `tenant` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenancyConfig {
    /// Tenant value injected into predicates.
    #[serde(default)]
    pub tenant: Option<String>,

    /// Default column name for tenant isolation.
    /// Used when not overridden per-table.
    #[serde(default = "default_tenant_column")]
    pub default_column: String,

    /// Per-table tenant column configuration.
    #[serde(default)]
    pub tables: HashMap<String, TableTenancyConfig>,

    /// Tables that are global (no tenant scoping applied).
    #[serde(default)]
    pub global_tables: Vec<String>,
}

impl Default for TenancyConfig {
    fn default() -> Self {
        Self {
            tenant: None,
            default_column: default_tenant_column(),
            tables: HashMap::new(),
            global_tables: Vec::new(),
        }
    }
}

/// Per-table tenancy configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableTenancyConfig {
    /// The column name used for tenant isolation in this table.
    #[serde(default)]
    pub tenant_column: Option<String>,

    /// Whether this is a global table (no tenant scoping).
    #[serde(default)]
    pub global: bool,
}

impl TenancyConfig {
    /// Load tenancy configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse tenancy configuration from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(ConfigError::from)
    }

    /// Whether predicates will be injected at all.
    pub fn is_active(&self) -> bool {
        self.tenant.is_some()
    }

    /// Get the tenant column for a given table.
    ///
    /// Table names match case-insensitively. Returns None if the table is
    /// global (no tenant scoping).
    pub fn get_tenant_column(&self, table_name: &str) -> Option<&str> {
        if self.is_global_table(table_name) {
            return None;
        }

        self.table(table_name)
            .and_then(|t| t.tenant_column.as_deref())
            .or(Some(&self.default_column))
    }

    /// Check if a table is global (no tenant scoping).
    pub fn is_global_table(&self, table_name: &str) -> bool {
        if self
            .global_tables
            .iter()
            .any(|t| t.eq_ignore_ascii_case(table_name))
        {
            return true;
        }

        self.table(table_name).map(|t| t.global).unwrap_or(false)
    }

    fn table(&self, table_name: &str) -> Option<&TableTenancyConfig> {
        self.tables.get(table_name).or_else(|| {
            self.tables
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(table_name))
                .map(|(_, config)| config)
        })
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.default_column.trim().is_empty() {
            return Err(ConfigError::Config(
                "tenancy.default_column must not be empty".to_string(),
            ));
        }
        for (table, config) in &self.tables {
            if config.tenant_column.as_deref().is_some_and(|c| c.trim().is_empty()) {
                return Err(ConfigError::Config(format!(
                    "tenancy.tables.{table}.tenant_column must not be empty"
                )));
            }
        }
        Ok(())
    }
}

fn default_tenant_column() -> String {
    "tenant_id".to_string()
}
