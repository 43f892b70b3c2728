//! Statement proxies.
//!
//! One generic wrapper serves all three statement kinds: `StatementProxy<S>`
//! implements [`Statement`], [`PreparedStatement`] and [`CallableStatement`]
//! whenever the wrapped `S` does. Only cursor-returning calls and `close` do
//! anything beyond forwarding. SQL was rewritten when the statement was
//! created and is never rewritten again here.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sluice_core::{
    CallableStatement, PreparedStatement, Result, ResultSet, Statement, StatementKind, Value,
};
use sluice_rewrite::RewriteResult;

use crate::result_set::{ResultFilter, ResultSetProxy};

/// Wraps exactly one delegate statement.
pub struct StatementProxy<S: ?Sized> {
    rewrite: RewriteResult,
    results: Option<Arc<dyn ResultFilter>>,
    closed: bool,
    inner: Box<S>,
}

impl<S: ?Sized> StatementProxy<S> {
    pub fn new(
        inner: Box<S>,
        rewrite: RewriteResult,
        results: Option<Arc<dyn ResultFilter>>,
    ) -> Self {
        Self {
            rewrite,
            results,
            closed: false,
            inner,
        }
    }

    /// SQL as the caller supplied it.
    pub fn original_sql(&self) -> &str {
        &self.rewrite.original_sql
    }

    /// SQL as the delegate received it.
    pub fn rewritten_sql(&self) -> &str {
        &self.rewrite.rewritten_sql
    }

    pub fn kind(&self) -> StatementKind {
        self.rewrite.kind
    }

    pub fn wraps_results(&self) -> bool {
        self.results.is_some()
    }

    pub fn delegate(&self) -> &S {
        &self.inner
    }

    fn wrap_cursor(&self, cursor: Box<dyn ResultSet>) -> Box<dyn ResultSet> {
        match &self.results {
            Some(filter) => {
                tracing::debug!(kind = %self.rewrite.kind, "Wrapping result cursor");
                Box::new(ResultSetProxy::new(cursor, Arc::clone(filter)))
            }
            None => cursor,
        }
    }
}

impl<S: ?Sized> std::fmt::Debug for StatementProxy<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatementProxy")
            .field("rewrite", &self.rewrite)
            .field("wraps_results", &self.results.is_some())
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<S: Statement + ?Sized> Statement for StatementProxy<S> {
    fn sql(&self) -> &str {
        self.inner.sql()
    }

    async fn execute_query(&mut self) -> Result<Box<dyn ResultSet>> {
        let cursor = self.inner.execute_query().await?;
        Ok(self.wrap_cursor(cursor))
    }

    async fn execute_update(&mut self) -> Result<u64> {
        self.inner.execute_update().await
    }

    async fn execute(&mut self) -> Result<bool> {
        self.inner.execute().await
    }

    async fn result_set(&mut self) -> Result<Option<Box<dyn ResultSet>>> {
        let cursor = self.inner.result_set().await?;
        Ok(cursor.map(|c| self.wrap_cursor(c)))
    }

    fn update_count(&self) -> Option<u64> {
        self.inner.update_count()
    }

    async fn set_query_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        self.inner.set_query_timeout(timeout).await
    }

    async fn set_max_rows(&mut self, max_rows: u64) -> Result<()> {
        self.inner.set_max_rows(max_rows).await
    }

    async fn cancel(&self) -> Result<()> {
        self.inner.cancel().await
    }

    fn is_closed(&self) -> bool {
        self.closed || self.inner.is_closed()
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.inner.close().await
    }
}

#[async_trait]
impl<S: PreparedStatement + ?Sized> PreparedStatement for StatementProxy<S> {
    async fn set_parameter(&mut self, index: usize, value: Value) -> Result<()> {
        self.inner.set_parameter(index, value).await
    }

    async fn clear_parameters(&mut self) -> Result<()> {
        self.inner.clear_parameters().await
    }

    async fn add_batch(&mut self) -> Result<()> {
        self.inner.add_batch().await
    }

    async fn execute_batch(&mut self) -> Result<Vec<u64>> {
        self.inner.execute_batch().await
    }
}

#[async_trait]
impl<S: CallableStatement + ?Sized> CallableStatement for StatementProxy<S> {
    async fn register_out_parameter(&mut self, index: usize, type_name: &str) -> Result<()> {
        self.inner.register_out_parameter(index, type_name).await
    }

    async fn out_parameter(&self, index: usize) -> Result<Value> {
        self.inner.out_parameter(index).await
    }
}
