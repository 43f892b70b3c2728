//! Error types shared by drivers and proxies.
//!
//! Drivers return [`Error`] from every capability method. The proxy layer adds
//! only the variants it can originate itself (address, resolution, rewrite) and
//! hands every driver error back to the caller untouched.

use thiserror::Error;

/// Result type for sluice operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced through the driver capability set.
#[derive(Debug, Error)]
pub enum Error {
    /// The connection address was empty or absent.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// No registered driver accepts the real address.
    #[error("no suitable driver found for {address}")]
    NoDriverFound { address: String },

    /// A required argument was missing or malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Rewriting failed under a fail-closed policy.
    #[error(transparent)]
    Rewrite(#[from] RewriteError),

    /// Connection-level failure reported by a driver.
    #[error("connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Query execution failure reported by a driver.
    #[error("query error: {message}")]
    Query {
        message: String,
        sql: Option<String>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The target object has already been closed.
    #[error("{0} is closed")]
    Closed(&'static str),

    /// The driver does not support this operation.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// The operation exceeded its timeout.
    #[error("timeout: {0}")]
    Timeout(String),

    /// The operation was cancelled.
    #[error("operation cancelled")]
    Cancelled,

    /// Any other driver-specific error.
    #[error(transparent)]
    Driver(Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Create a connection error without a source.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            source: None,
        }
    }

    /// Create a query error tied to the SQL that caused it.
    pub fn query(message: impl Into<String>, sql: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
            sql: Some(sql.into()),
            source: None,
        }
    }

    /// Create an unsupported-operation error.
    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported(operation.into())
    }

    /// Whether the error was raised by the proxy layer rather than a driver.
    pub fn is_proxy_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidAddress(_) | Self::NoDriverFound { .. } | Self::Rewrite(_)
        )
    }
}

/// Errors raised while rewriting SQL text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RewriteError {
    /// The SQL could not be parsed.
    #[error("failed to parse SQL: {0}")]
    Parse(String),

    /// The statement shape is not supported by the rewriter.
    #[error("cannot rewrite statement: {reason}")]
    Unsupported { reason: String },

    /// The rewriter refused the statement.
    #[error("statement rejected: {reason}")]
    Rejected { reason: String },
}
