//! The proxy driver.
//!
//! [`ProxyDriver`] claims every address that starts with its scheme marker
//! (`sluice:` by default), strips the marker, and hands the remaining real
//! address to the first registered driver that accepts it:
//!
//! ```text
//! sluice:pg://db.internal/app  ──strip──▶  pg://db.internal/app  ──▶  first accepting delegate
//! ```
//!
//! Addresses without the marker are declined with `Ok(None)` so a driver
//! manager can keep asking other candidates.

use std::sync::Arc;

use async_trait::async_trait;
use sluice_core::{ConnectOptions, Connection, Driver, Error, ProxyConfig, Result, SluiceConfig};
use sluice_rewrite::{RewritePipeline, SqlRewriter};

use crate::connection::ConnectionProxy;
use crate::interceptors::Interceptors;
use crate::registry::DriverRegistry;
use crate::result_set::{ColumnMask, ResultFilter, Unfiltered};

/// Name the proxy driver registers under unless configured otherwise.
pub const DEFAULT_DRIVER_NAME: &str = "sluice";

/// Resolves proxy addresses to delegate drivers and wraps their connections.
pub struct ProxyDriver {
    name: String,
    config: ProxyConfig,
    registry: Arc<dyn DriverRegistry>,
    pipeline: RewritePipeline,
    filter: Arc<dyn ResultFilter>,
}

impl ProxyDriver {
    /// A proxy with default settings: `sluice:` scheme, no rewriting, unfiltered results.
    pub fn new(registry: Arc<dyn DriverRegistry>) -> Self {
        Self {
            name: DEFAULT_DRIVER_NAME.to_string(),
            config: ProxyConfig::default(),
            registry,
            pipeline: RewritePipeline::passthrough(),
            filter: Arc::new(Unfiltered),
        }
    }

    /// A proxy set up from a loaded configuration.
    ///
    /// The configuration is validated first, so an empty scheme is rejected
    /// even when it did not come through `SluiceConfig::from_file`.
    pub fn from_config(config: &SluiceConfig, registry: Arc<dyn DriverRegistry>) -> Result<Self> {
        config
            .validate()
            .map_err(|e| Error::InvalidArgument(format!("invalid proxy configuration: {e}")))?;

        let mask = ColumnMask::from_config(&config.results);
        let filter: Arc<dyn ResultFilter> = if mask.is_empty() {
            Arc::new(Unfiltered)
        } else {
            Arc::new(mask)
        };

        Ok(Self {
            name: DEFAULT_DRIVER_NAME.to_string(),
            config: config.proxy.clone(),
            registry,
            pipeline: sluice_rewrite::pipeline_from_config(config),
            filter,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.config.scheme = scheme.into();
        self
    }

    /// Replace the rewriter, keeping the current failure policy.
    pub fn with_rewriter(mut self, rewriter: Arc<dyn SqlRewriter>) -> Self {
        self.pipeline = RewritePipeline::new(rewriter, self.pipeline.policy());
        self
    }

    pub fn with_pipeline(mut self, pipeline: RewritePipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn with_result_filter(mut self, filter: Arc<dyn ResultFilter>) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_config(mut self, config: ProxyConfig) -> Self {
        self.config = config;
        self
    }

    pub fn scheme(&self) -> &str {
        &self.config.scheme
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Whether the address is non-empty and carries the scheme marker.
    ///
    /// An empty scheme marks nothing.
    pub fn is_proxy_address(&self, address: &str) -> bool {
        let scheme = self.config.scheme.as_str();
        !scheme.is_empty() && !address.is_empty() && address.starts_with(scheme)
    }

    /// Remove the scheme marker, or return the address unchanged if it has none.
    pub fn extract_real_address<'a>(&self, address: &'a str) -> &'a str {
        if !self.is_proxy_address(address) {
            return address;
        }
        address
            .strip_prefix(self.config.scheme.as_str())
            .unwrap_or(address)
    }

    /// First registered driver, in registration order, that accepts the real address.
    ///
    /// The proxy itself is never a candidate. A driver whose `accepts` fails
    /// is skipped.
    pub fn find_delegate(&self, real_address: &str) -> Result<Arc<dyn Driver>> {
        for driver in self.registry.drivers() {
            if driver.name() == self.name {
                continue;
            }
            match driver.accepts(real_address) {
                Ok(true) => {
                    tracing::debug!(delegate = driver.name(), "Resolved delegate driver");
                    return Ok(driver);
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(
                        delegate = driver.name(),
                        error = %e,
                        "Delegate failed to check address, skipping"
                    );
                }
            }
        }

        Err(Error::NoDriverFound {
            address: real_address.to_string(),
        })
    }

    /// Interception settings for a connection opened with `options`.
    pub fn interceptors_for(&self, options: &ConnectOptions) -> Interceptors {
        Interceptors::resolve(&self.config, &self.pipeline, &self.filter, options)
    }

    /// Open a proxied connection.
    ///
    /// Returns `Ok(None)` without consulting the registry when the address is
    /// not a proxy address. Options reach the delegate unmodified and
    /// delegate errors are returned as the delegate produced them.
    pub async fn connect_proxy(
        &self,
        address: &str,
        options: &ConnectOptions,
    ) -> Result<Option<ConnectionProxy>> {
        if address.is_empty() {
            return Err(Error::InvalidAddress("address must not be empty".to_string()));
        }
        if !self.is_proxy_address(address) {
            tracing::trace!(driver = %self.name, "Declining non-proxy address");
            return Ok(None);
        }

        let real_address = self.extract_real_address(address);
        let delegate = self.find_delegate(real_address)?;

        let Some(connection) = delegate.connect(real_address, options).await? else {
            tracing::warn!(
                delegate = delegate.name(),
                "Delegate accepted the address but declined to connect"
            );
            return Err(Error::NoDriverFound {
                address: real_address.to_string(),
            });
        };

        Ok(Some(ConnectionProxy::new(
            connection,
            self.interceptors_for(options),
        )))
    }
}

#[async_trait]
impl Driver for ProxyDriver {
    fn name(&self) -> &str {
        &self.name
    }

    fn accepts(&self, address: &str) -> Result<bool> {
        Ok(self.is_proxy_address(address))
    }

    async fn connect(
        &self,
        address: &str,
        options: &ConnectOptions,
    ) -> Result<Option<Box<dyn Connection>>> {
        let connection = self.connect_proxy(address, options).await?;
        Ok(connection.map(|c| Box::new(c) as Box<dyn Connection>))
    }
}

impl std::fmt::Debug for ProxyDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyDriver")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}
