//! Connection proxy.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use sluice_core::{
    CallableStatement, Connection, Error, PreparedStatement, Result, Statement, StatementKind,
};
use sluice_rewrite::RewriteResult;
use uuid::Uuid;

use crate::interceptors::Interceptors;
use crate::statement::StatementProxy;

/// Owns one delegate connection for its whole lifetime.
///
/// Statement creation rewrites the SQL and wraps the delegate's statement;
/// `close` reaches the delegate at most once. Everything else is forwarded
/// as-is, errors included.
pub struct ConnectionProxy {
    id: Uuid,
    delegate: Box<dyn Connection>,
    interceptors: Interceptors,
    closed: AtomicBool,
}

impl ConnectionProxy {
    pub fn new(delegate: Box<dyn Connection>, interceptors: Interceptors) -> Self {
        let id = Uuid::new_v4();
        tracing::info!(
            connection_id = %id,
            rewrite = interceptors.rewrite.is_some(),
            wrap_results = interceptors.results.is_some(),
            "Opened proxied connection"
        );
        Self {
            id,
            delegate,
            interceptors,
            closed: AtomicBool::new(false),
        }
    }

    /// Wrap a delegate connection that may be missing.
    pub fn try_new(
        delegate: Option<Box<dyn Connection>>,
        interceptors: Interceptors,
    ) -> Result<Self> {
        let delegate = delegate.ok_or_else(|| {
            Error::InvalidArgument("cannot proxy an absent connection".to_string())
        })?;
        Ok(Self::new(delegate, interceptors))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn interceptors(&self) -> &Interceptors {
        &self.interceptors
    }

    fn rewrite(&self, sql: &str, kind: StatementKind) -> Result<RewriteResult> {
        let result = self.interceptors.rewrite(sql, kind)?;
        tracing::debug!(
            connection_id = %self.id,
            kind = %kind,
            changed = result.is_changed(),
            "Creating statement"
        );
        Ok(result)
    }

    fn wrap<S: ?Sized>(&self, inner: Box<S>, rewrite: RewriteResult) -> StatementProxy<S> {
        StatementProxy::new(inner, rewrite, self.interceptors.results.clone())
    }

    /// Like [`Connection::create_statement`], keeping the concrete proxy type.
    pub async fn create_statement_proxy(
        &self,
        sql: &str,
    ) -> Result<StatementProxy<dyn Statement>> {
        let rewrite = self.rewrite(sql, StatementKind::Plain)?;
        let inner = self.delegate.create_statement(&rewrite.rewritten_sql).await?;
        Ok(self.wrap(inner, rewrite))
    }

    /// Like [`Connection::prepare`], keeping the concrete proxy type.
    pub async fn prepare_proxy(
        &self,
        sql: &str,
    ) -> Result<StatementProxy<dyn PreparedStatement>> {
        let rewrite = self.rewrite(sql, StatementKind::Prepared)?;
        let inner = self.delegate.prepare(&rewrite.rewritten_sql).await?;
        Ok(self.wrap(inner, rewrite))
    }

    /// Like [`Connection::prepare_call`], keeping the concrete proxy type.
    pub async fn prepare_call_proxy(
        &self,
        sql: &str,
    ) -> Result<StatementProxy<dyn CallableStatement>> {
        let rewrite = self.rewrite(sql, StatementKind::Callable)?;
        let inner = self.delegate.prepare_call(&rewrite.rewritten_sql).await?;
        Ok(self.wrap(inner, rewrite))
    }
}

impl std::fmt::Debug for ConnectionProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionProxy")
            .field("id", &self.id)
            .field("interceptors", &self.interceptors)
            .field("closed", &self.closed.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Connection for ConnectionProxy {
    async fn create_statement(&self, sql: &str) -> Result<Box<dyn Statement>> {
        Ok(Box::new(self.create_statement_proxy(sql).await?))
    }

    async fn prepare(&self, sql: &str) -> Result<Box<dyn PreparedStatement>> {
        Ok(Box::new(self.prepare_proxy(sql).await?))
    }

    async fn prepare_call(&self, sql: &str) -> Result<Box<dyn CallableStatement>> {
        Ok(Box::new(self.prepare_call_proxy(sql).await?))
    }

    // Translation only, no rewrite.
    fn native_sql(&self, sql: &str) -> Result<String> {
        self.delegate.native_sql(sql)
    }

    async fn set_auto_commit(&self, auto_commit: bool) -> Result<()> {
        self.delegate.set_auto_commit(auto_commit).await
    }

    async fn auto_commit(&self) -> Result<bool> {
        self.delegate.auto_commit().await
    }

    async fn commit(&self) -> Result<()> {
        self.delegate.commit().await
    }

    async fn rollback(&self) -> Result<()> {
        self.delegate.rollback().await
    }

    async fn set_read_only(&self, read_only: bool) -> Result<()> {
        self.delegate.set_read_only(read_only).await
    }

    async fn is_read_only(&self) -> Result<bool> {
        self.delegate.is_read_only().await
    }

    async fn is_valid(&self, timeout: Duration) -> bool {
        self.delegate.is_valid(timeout).await
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire) || self.delegate.is_closed()
    }

    /// Close the delegate on the first call; later calls return `Ok(())`.
    ///
    /// The connection counts as closed even if the delegate's close fails.
    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            tracing::trace!(connection_id = %self.id, "Connection already closed");
            return Ok(());
        }
        tracing::info!(connection_id = %self.id, "Closing proxied connection");
        self.delegate.close().await
    }
}
