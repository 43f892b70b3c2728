//! Driver capability traits.
//!
//! These traits describe what a database driver exposes:
//! - Driver: address recognition and connection establishment
//! - Connection: statement creation, transaction control, lifecycle
//! - Statement / PreparedStatement / CallableStatement: execution
//! - ResultSet: positional cursor over result rows
//!
//! Every trait is object-safe so that real drivers and proxies can be mixed
//! freely behind `Box<dyn ...>` / `Arc<dyn ...>`.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::types::{Column, ConnectOptions, Row, Value};

/// A database driver that can open connections for the addresses it accepts.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Stable name used for logging and registry lookups.
    fn name(&self) -> &str;

    /// Whether this driver understands the address. Must not have side effects.
    fn accepts(&self, address: &str) -> Result<bool>;

    /// Open a connection.
    ///
    /// Returns `Ok(None)` when the address belongs to some other driver, so a
    /// driver manager can keep asking the remaining candidates.
    async fn connect(
        &self,
        address: &str,
        options: &ConnectOptions,
    ) -> Result<Option<Box<dyn Connection>>>;
}

/// An open database connection.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Create a plain statement for the given SQL.
    async fn create_statement(&self, sql: &str) -> Result<Box<dyn Statement>>;

    /// Prepare a parameterized statement.
    async fn prepare(&self, sql: &str) -> Result<Box<dyn PreparedStatement>>;

    /// Prepare a stored procedure call.
    async fn prepare_call(&self, sql: &str) -> Result<Box<dyn CallableStatement>>;

    /// Translate SQL into the driver's native grammar without executing it.
    fn native_sql(&self, sql: &str) -> Result<String> {
        Ok(sql.to_string())
    }

    async fn set_auto_commit(&self, auto_commit: bool) -> Result<()>;

    async fn auto_commit(&self) -> Result<bool>;

    async fn commit(&self) -> Result<()>;

    async fn rollback(&self) -> Result<()>;

    async fn set_read_only(&self, _read_only: bool) -> Result<()> {
        Err(Error::unsupported("set_read_only"))
    }

    async fn is_read_only(&self) -> Result<bool> {
        Ok(false)
    }

    /// Check if the connection is still usable, waiting at most `timeout`.
    async fn is_valid(&self, timeout: Duration) -> bool;

    fn is_closed(&self) -> bool;

    /// Close the connection and release its resources.
    async fn close(&self) -> Result<()>;
}

/// A statement bound to the SQL it was created with.
#[async_trait]
pub trait Statement: Send + Sync {
    /// The SQL this statement executes.
    fn sql(&self) -> &str;

    /// Execute and return a result cursor.
    async fn execute_query(&mut self) -> Result<Box<dyn ResultSet>>;

    /// Execute and return the number of affected rows.
    async fn execute_update(&mut self) -> Result<u64>;

    /// Execute; returns `true` if a result cursor is available via [`Statement::result_set`].
    async fn execute(&mut self) -> Result<bool>;

    /// Take the cursor produced by the last [`Statement::execute`], if any.
    async fn result_set(&mut self) -> Result<Option<Box<dyn ResultSet>>>;

    /// Affected row count of the last execution, if it produced one.
    fn update_count(&self) -> Option<u64>;

    async fn set_query_timeout(&mut self, timeout: Option<Duration>) -> Result<()>;

    /// Limit the rows any cursor of this statement yields (0 = unlimited).
    async fn set_max_rows(&mut self, max_rows: u64) -> Result<()>;

    async fn cancel(&self) -> Result<()>;

    fn is_closed(&self) -> bool;

    async fn close(&mut self) -> Result<()>;
}

/// A precompiled statement with positional parameters (1-based).
#[async_trait]
pub trait PreparedStatement: Statement {
    async fn set_parameter(&mut self, index: usize, value: Value) -> Result<()>;

    async fn clear_parameters(&mut self) -> Result<()>;

    /// Queue the current parameter set for [`PreparedStatement::execute_batch`].
    async fn add_batch(&mut self) -> Result<()>;

    async fn execute_batch(&mut self) -> Result<Vec<u64>>;
}

/// A stored procedure call with OUT parameters.
#[async_trait]
pub trait CallableStatement: PreparedStatement {
    async fn register_out_parameter(&mut self, index: usize, type_name: &str) -> Result<()>;

    async fn out_parameter(&self, index: usize) -> Result<Value>;
}

/// A cursor over result rows.
///
/// A fresh cursor is positioned before the first row; [`ResultSet::next`]
/// advances it and returns `false` once the rows are exhausted.
#[async_trait]
pub trait ResultSet: Send + Sync {
    fn columns(&self) -> &[Column];

    /// Move to the next row.
    async fn next(&mut self) -> Result<bool>;

    /// The row under the cursor, if positioned on one.
    fn current(&self) -> Option<&Row>;

    /// Value at a zero-based column index of the current row.
    fn get(&self, index: usize) -> Result<&Value> {
        let row = self
            .current()
            .ok_or_else(|| Error::InvalidArgument("cursor is not positioned on a row".into()))?;
        row.get(index)
            .ok_or_else(|| Error::InvalidArgument(format!("column index {index} out of range")))
    }

    /// Value of a named column (case-insensitive) of the current row.
    fn get_by_name(&self, name: &str) -> Result<&Value> {
        let index = self
            .columns()
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| Error::InvalidArgument(format!("unknown column: {name}")))?;
        self.get(index)
    }

    /// Whether the cursor supports backward movement.
    fn is_scrollable(&self) -> bool {
        false
    }

    /// Move to the previous row.
    async fn previous(&mut self) -> Result<bool> {
        Err(Error::unsupported("previous on forward-only cursor"))
    }

    /// Reposition before the first row.
    async fn before_first(&mut self) -> Result<()> {
        Err(Error::unsupported("before_first on forward-only cursor"))
    }

    fn is_closed(&self) -> bool;

    async fn close(&mut self) -> Result<()>;
}
