//! `sluice rewrite` - show what the delegate would receive for a statement.

use anyhow::{Context, Result};
use serde_json::json;
use std::path::Path;

use sluice_core::{SluiceConfig, StatementKind};
use sluice_rewrite::RewriteResult;

/// Rewrite `sql` with the configured pipeline.
///
/// Returns `None` when rewriting is disabled in the configuration.
pub fn rewrite(
    config: &SluiceConfig,
    sql: &str,
    kind: StatementKind,
) -> Result<Option<RewriteResult>> {
    if !config.proxy.rewrite_enabled {
        return Ok(None);
    }
    let pipeline = sluice_rewrite::pipeline_from_config(config);
    let result = pipeline
        .apply(sql, kind)
        .with_context(|| format!("Statement rejected under {:?} policy", pipeline.policy()))?;
    Ok(Some(result))
}

pub fn run(config_path: &Path, sql: &str, kind: StatementKind, as_json: bool) -> Result<()> {
    let config = SluiceConfig::load_with_context(config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;

    let result = rewrite(&config, sql, kind)?
        .unwrap_or_else(|| RewriteResult::unchanged(sql, kind));

    if as_json {
        let output = json!({
            "kind": result.kind.to_string(),
            "original_sql": result.original_sql,
            "rewritten_sql": result.rewritten_sql,
            "changed": result.is_changed(),
            "rewrite_enabled": config.proxy.rewrite_enabled,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if !config.proxy.rewrite_enabled {
        println!("Rewriting is disabled (proxy.rewrite_enabled: false)");
    }
    println!("kind:      {}", result.kind);
    println!("original:  {}", result.original_sql);
    println!("rewritten: {}", result.rewritten_sql);
    if !result.is_changed() {
        println!("(unchanged)");
    }
    Ok(())
}
