//! # sluice-proxy
//!
//! A transparent proxy between a database client and a real driver.
//!
//! The client sees the same driver, connection, statement and cursor
//! capabilities it would get from the real driver. Underneath, the proxy:
//! - resolves a delegate driver for addresses carrying its scheme marker
//! - rewrites SQL once, when a statement is created
//! - optionally filters what result cursors show
//!
//! ## Architecture
//!
//! ```text
//! client
//!   │  connect("sluice:pg://host/db")
//!   ▼
//! ┌──────────────────┐      ┌────────────────┐
//! │   ProxyDriver    │─────▶│ DriverRegistry │  first driver accepting "pg://host/db"
//! └────────┬─────────┘      └────────────────┘
//!          │ delegate.connect("pg://host/db", options)
//!          ▼
//! ┌──────────────────┐
//! │ ConnectionProxy  │  create_statement / prepare / prepare_call:
//! └────────┬─────────┘  rewrite SQL, then create on the delegate
//!          ▼
//! ┌──────────────────┐
//! │  StatementProxy  │  execution forwarded unchanged
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │  ResultSetProxy  │  hidden / redacted columns, same navigation
//! └──────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use sluice_core::{Connection, ConnectOptions, SluiceConfig};
//! use sluice_proxy::{DriverManager, ProxyDriver, SharedRegistry};
//!
//! # async fn run() -> sluice_core::Result<()> {
//! let registry = Arc::new(SharedRegistry::new());
//! // registry.register(Arc::new(MyPostgresDriver::new()));
//!
//! let config = SluiceConfig::default();
//! registry.register(Arc::new(ProxyDriver::from_config(&config, registry.clone())?));
//!
//! let manager = DriverManager::new(registry);
//! let conn = manager
//!     .connect("sluice:pg://localhost/app", &ConnectOptions::new())
//!     .await?;
//! conn.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod driver;
pub mod interceptors;
pub mod registry;
pub mod result_set;
pub mod statement;

pub use connection::ConnectionProxy;
pub use driver::{DEFAULT_DRIVER_NAME, ProxyDriver};
pub use interceptors::Interceptors;
pub use registry::{DriverManager, DriverRegistry, SharedRegistry};
pub use result_set::{ColumnMask, ResultFilter, ResultSetProxy, Unfiltered};
pub use statement::StatementProxy;
