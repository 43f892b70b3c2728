//! # sluice-core
//!
//! Shared building blocks for the sluice driver proxy:
//! - the driver capability traits ([`Driver`], [`Connection`], statements, [`ResultSet`])
//! - the value model passed through them
//! - the error taxonomy every driver and proxy reports with
//! - YAML configuration

pub mod config;
pub mod driver;
pub mod error;
pub mod types;

pub use config::{
    ConfigError, FailurePolicy, ProxyConfig, ResultsConfig, RewriteConfig, SluiceConfig,
    TableTenancyConfig, TenancyConfig,
};
pub use driver::{
    CallableStatement, Connection, Driver, PreparedStatement, ResultSet, Statement,
};
pub use error::{Error, Result, RewriteError};
pub use types::{Column, ConnectOptions, Row, StatementKind, Value};
