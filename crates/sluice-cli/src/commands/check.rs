//! `sluice check` command implementation.
//!
//! Loads the configuration the way the proxy would and reports:
//! - hard errors (unreadable file, failed validation)
//! - settings that contradict each other or have no effect

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::Path;

use sluice_core::{FailurePolicy, SluiceConfig};

/// Severity level for check results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Warning => write!(f, "WARN"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// A single check finding.
#[derive(Debug, Clone)]
pub struct CheckFinding {
    pub severity: Severity,
    /// Category of the check that produced this finding.
    pub category: String,
    pub message: String,
    /// Location within the configuration (e.g. "results.hidden_columns").
    pub location: Option<String>,
}

impl CheckFinding {
    fn error(category: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            category: category.into(),
            message: message.into(),
            location: None,
        }
    }

    fn warning(category: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            category: category.into(),
            message: message.into(),
            location: None,
        }
    }

    fn info(category: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            category: category.into(),
            message: message.into(),
            location: None,
        }
    }

    fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

/// Results from running all checks.
#[derive(Debug, Default)]
pub struct CheckResults {
    pub findings: Vec<CheckFinding>,
}

impl CheckResults {
    fn extend(&mut self, findings: impl IntoIterator<Item = CheckFinding>) {
        self.findings.extend(findings);
    }

    pub fn has_errors(&self) -> bool {
        self.findings.iter().any(|f| f.severity == Severity::Error)
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity == severity)
            .count()
    }

    /// Print human-readable summary.
    pub fn print_summary(&self) {
        let mut findings: Vec<_> = self.findings.iter().collect();
        findings.sort_by(|a, b| b.severity.cmp(&a.severity).then(a.category.cmp(&b.category)));

        for finding in &findings {
            print_finding(finding);
        }

        println!();
        let errors = self.count(Severity::Error);
        let warnings = self.count(Severity::Warning);
        if errors == 0 && warnings == 0 {
            println!("✔ All checks passed!");
        } else {
            println!("Summary: {errors} error(s), {warnings} warning(s)");
        }
    }
}

fn print_finding(finding: &CheckFinding) {
    let icon = match finding.severity {
        Severity::Error => "✗",
        Severity::Warning => "⚠",
        Severity::Info => "ℹ",
    };
    let location = finding
        .location
        .as_ref()
        .map(|l| format!(" [{l}]"))
        .unwrap_or_default();

    println!(
        "  {} {} [{}]{}: {}",
        icon, finding.severity, finding.category, location, finding.message
    );
}

/// Run all checks without printing anything.
pub fn run_quiet(config_path: &Path) -> Result<CheckResults> {
    let mut results = CheckResults::default();

    // Validation errors are findings, not failures of the command.
    let config = match SluiceConfig::from_file(config_path)
        .with_context(|| format!("Failed to read {}", config_path.display()))
    {
        Ok(config) => config,
        Err(e) => {
            results.extend([CheckFinding::error("load", format!("{e:#}"))]);
            return Ok(results);
        }
    };

    // load_with_context also resolves the tenancy file.
    match SluiceConfig::load_with_context(config_path) {
        Ok(loaded) => results.extend(check_config(&loaded)),
        Err(e) => {
            results.extend([CheckFinding::error("validate", e.to_string())]);
            results.extend(check_config(&config));
        }
    }

    Ok(results)
}

/// Consistency checks on an already loaded configuration.
pub fn check_config(config: &SluiceConfig) -> Vec<CheckFinding> {
    let mut findings = Vec::new();
    let tenancy = &config.rewrite.tenancy;
    let has_rewriters = tenancy.is_active() || config.rewrite.tag.is_some();

    if !config.proxy.rewrite_enabled && has_rewriters {
        findings.push(
            CheckFinding::warning(
                "rewrite",
                "rewriters are configured but rewriting is disabled",
            )
            .with_location("proxy.rewrite_enabled"),
        );
    }

    if !has_rewriters && config.proxy.rewrite_failure == FailurePolicy::Closed {
        findings.push(
            CheckFinding::info("rewrite", "fail-closed policy has no rewriter to guard")
                .with_location("proxy.rewrite_failure"),
        );
    }

    if tenancy.tenant.is_none() && (!tenancy.tables.is_empty() || !tenancy.global_tables.is_empty())
    {
        findings.push(
            CheckFinding::warning(
                "tenancy",
                "tables are configured but no tenant is set, so no predicates are injected",
            )
            .with_location("rewrite.tenancy.tenant"),
        );
    }

    let global: HashSet<String> = tenancy
        .global_tables
        .iter()
        .map(|t| t.to_ascii_lowercase())
        .collect();
    let mut scoped: Vec<_> = tenancy
        .tables
        .iter()
        .filter(|(name, table)| {
            table.tenant_column.is_some() && global.contains(&name.to_ascii_lowercase())
        })
        .map(|(name, _)| name.as_str())
        .collect();
    scoped.sort_unstable();
    for name in scoped {
        findings.push(
            CheckFinding::warning(
                "tenancy",
                format!("table '{name}' has a tenant column but is listed as global"),
            )
            .with_location(format!("rewrite.tenancy.tables.{name}")),
        );
    }

    let results = &config.results;
    if !config.proxy.wrap_results
        && (!results.hidden_columns.is_empty() || !results.redacted_columns.is_empty())
    {
        findings.push(
            CheckFinding::warning(
                "results",
                "column filters are configured but result wrapping is disabled",
            )
            .with_location("proxy.wrap_results"),
        );
    }

    let hidden: HashSet<String> = results
        .hidden_columns
        .iter()
        .map(|c| c.to_ascii_lowercase())
        .collect();
    for column in &results.redacted_columns {
        if hidden.contains(&column.to_ascii_lowercase()) {
            findings.push(
                CheckFinding::info(
                    "results",
                    format!("column '{column}' is hidden, redacting it has no effect"),
                )
                .with_location("results.redacted_columns"),
            );
        }
    }

    findings
}

/// Run all checks and print the findings.
pub fn run(config_path: &Path) -> Result<()> {
    println!("Checking {}...", config_path.display());

    let results = run_quiet(config_path)?;
    results.print_summary();

    if results.has_errors() {
        anyhow::bail!(
            "Configuration has {} error(s)",
            results.count(Severity::Error)
        );
    }
    Ok(())
}
