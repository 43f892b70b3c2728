//! Per-connection interception settings.

use std::sync::Arc;

use sluice_core::config::{OPTION_REWRITE, OPTION_WRAP_RESULTS};
use sluice_core::{ConnectOptions, ProxyConfig, Result, StatementKind};
use sluice_rewrite::{RewritePipeline, RewriteResult};

use crate::result_set::ResultFilter;

/// What a [`ConnectionProxy`](crate::ConnectionProxy) intercepts.
///
/// `None` in either slot disables that interception entirely: SQL is forwarded
/// as given and cursors are returned raw.
#[derive(Clone, Default)]
pub struct Interceptors {
    pub rewrite: Option<RewritePipeline>,
    pub results: Option<Arc<dyn ResultFilter>>,
}

impl Interceptors {
    /// Forward everything untouched.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_rewrite(mut self, pipeline: RewritePipeline) -> Self {
        self.rewrite = Some(pipeline);
        self
    }

    pub fn with_results(mut self, filter: Arc<dyn ResultFilter>) -> Self {
        self.results = Some(filter);
        self
    }

    /// Settings for one connection.
    ///
    /// `sluice.rewrite` and `sluice.wrap_results` in the connect options
    /// override the driver-wide flags. Unrecognized values are ignored.
    pub fn resolve(
        config: &ProxyConfig,
        pipeline: &RewritePipeline,
        filter: &Arc<dyn ResultFilter>,
        options: &ConnectOptions,
    ) -> Self {
        let rewrite_enabled = options
            .get_bool(OPTION_REWRITE)
            .unwrap_or(config.rewrite_enabled);
        let wrap_results = options
            .get_bool(OPTION_WRAP_RESULTS)
            .unwrap_or(config.wrap_results);

        Self {
            rewrite: rewrite_enabled.then(|| pipeline.clone()),
            results: wrap_results.then(|| Arc::clone(filter)),
        }
    }

    /// Rewrite statement SQL, or pass it through when rewriting is off.
    pub(crate) fn rewrite(&self, sql: &str, kind: StatementKind) -> Result<RewriteResult> {
        match &self.rewrite {
            Some(pipeline) => Ok(pipeline.apply(sql, kind)?),
            None => Ok(RewriteResult::unchanged(sql, kind)),
        }
    }
}

impl std::fmt::Debug for Interceptors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interceptors")
            .field("rewrite", &self.rewrite)
            .field("results", &self.results.is_some())
            .finish()
    }
}
