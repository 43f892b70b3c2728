//! `sluice resolve` - explain how the proxy treats an address.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

use sluice_core::{ConnectOptions, SluiceConfig};
use sluice_proxy::{ProxyDriver, SharedRegistry};

/// How the proxy would handle one connect call.
#[derive(Debug, PartialEq, Eq)]
pub struct Resolution {
    pub accepted: bool,
    pub real_address: String,
    pub rewrite: bool,
    pub wrap_results: bool,
}

/// Parse a `key=value` connect option.
pub fn parse_option(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    if key.trim().is_empty() {
        return Err(format!("empty option key in '{raw}'"));
    }
    Ok((key.trim().to_string(), value.to_string()))
}

pub fn resolve(
    config: &SluiceConfig,
    address: &str,
    options: &ConnectOptions,
) -> Result<Resolution> {
    let driver = ProxyDriver::from_config(config, Arc::new(SharedRegistry::new()))?;
    let interceptors = driver.interceptors_for(options);

    Ok(Resolution {
        accepted: driver.is_proxy_address(address),
        real_address: driver.extract_real_address(address).to_string(),
        rewrite: interceptors.rewrite.is_some(),
        wrap_results: interceptors.results.is_some(),
    })
}

pub fn run(config_path: &Path, address: &str, options: Vec<(String, String)>) -> Result<()> {
    let config = SluiceConfig::load_with_context(config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;
    let options: ConnectOptions = options.into_iter().collect();

    let resolution = resolve(&config, address, &options)?;
    if !resolution.accepted {
        println!(
            "✗ '{address}' does not start with '{}'; the proxy declines it",
            config.proxy.scheme
        );
        return Ok(());
    }

    println!("✔ accepted");
    println!("  real address:  {}", resolution.real_address);
    println!("  rewrite:       {}", on_off(resolution.rewrite));
    println!("  wrap results:  {}", on_off(resolution.wrap_results));
    Ok(())
}

fn on_off(flag: bool) -> &'static str {
    if flag { "on" } else { "off" }
}
