//! Candidate delegate drivers.
//!
//! A [`DriverRegistry`] hands out a snapshot of the drivers available at the
//! moment of the call. The proxy never caches a snapshot: the host may
//! register or remove drivers at any time.

use std::sync::{Arc, PoisonError, RwLock};

use sluice_core::{ConnectOptions, Connection, Driver, Error, Result};

/// Read-only access to the currently registered drivers, in registration order.
pub trait DriverRegistry: Send + Sync {
    fn drivers(&self) -> Vec<Arc<dyn Driver>>;
}

/// A fixed set of drivers, typically injected by tests or embedding code.
impl DriverRegistry for Vec<Arc<dyn Driver>> {
    fn drivers(&self) -> Vec<Arc<dyn Driver>> {
        self.clone()
    }
}

/// A registry the host can mutate while proxies read from it.
#[derive(Default)]
pub struct SharedRegistry {
    drivers: RwLock<Vec<Arc<dyn Driver>>>,
}

impl SharedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a driver. Later registrations are consulted after earlier ones.
    pub fn register(&self, driver: Arc<dyn Driver>) {
        tracing::debug!(driver = driver.name(), "Registering driver");
        self.drivers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(driver);
    }

    /// Remove every driver registered under `name`. Returns whether any was removed.
    pub fn deregister(&self, name: &str) -> bool {
        let mut drivers = self.drivers.write().unwrap_or_else(PoisonError::into_inner);
        let before = drivers.len();
        drivers.retain(|d| d.name() != name);
        let removed = drivers.len() != before;
        if removed {
            tracing::debug!(driver = name, "Deregistered driver");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.drivers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DriverRegistry for SharedRegistry {
    fn drivers(&self) -> Vec<Arc<dyn Driver>> {
        self.drivers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Opens connections by asking each registered driver in turn.
///
/// Every driver is offered the address through `connect` alone; `accepts` is
/// never consulted. Drivers that decline (`Ok(None)`) or fail are skipped and
/// the first connection opened wins. When none opens, the first error is
/// returned unchanged, or `NoDriverFound` if every driver declined.
#[derive(Clone)]
pub struct DriverManager {
    registry: Arc<dyn DriverRegistry>,
}

impl DriverManager {
    pub fn new(registry: Arc<dyn DriverRegistry>) -> Self {
        Self { registry }
    }

    pub async fn connect(
        &self,
        address: &str,
        options: &ConnectOptions,
    ) -> Result<Box<dyn Connection>> {
        if address.is_empty() {
            return Err(Error::InvalidAddress("address must not be empty".into()));
        }

        let mut first_error = None;
        for driver in self.registry.drivers() {
            match driver.connect(address, options).await {
                Ok(Some(connection)) => {
                    tracing::debug!(driver = driver.name(), "Driver accepted connection");
                    return Ok(connection);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::debug!(driver = driver.name(), error = %e, "Driver failed to connect");
                    first_error.get_or_insert(e);
                }
            }
        }

        Err(first_error.unwrap_or_else(|| Error::NoDriverFound {
            address: address.to_string(),
        }))
    }
}
