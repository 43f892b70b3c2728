//! # sluice-rewrite
//!
//! The query-rewrite hook of the sluice driver proxy.
//!
//! A [`SqlRewriter`] turns the SQL a client passes to a statement-creation
//! call into the SQL the real driver receives. Rewriting happens once per
//! statement, when the statement is created; execution never rewrites again.
//!
//! ## Built-in rewriters
//!
//! | Rewriter         | Effect                                                  |
//! |------------------|---------------------------------------------------------|
//! | [`Passthrough`]  | Returns the input unchanged                             |
//! | [`CommentTagger`]| Appends `/* tag */`                                     |
//! | [`TenantScoper`] | Adds `<table>.<tenant column> = '<tenant>'` predicates  |
//! | [`RewriteChain`] | Runs several rewriters in order                         |
//!
//! ## Failure policy
//!
//! [`RewritePipeline`] pairs a rewriter with a [`FailurePolicy`]. The default,
//! fail-open, forwards the original SQL when rewriting fails; fail-closed
//! refuses to create the statement and reports a `RewriteError`.

pub mod parser;
pub mod rewriter;
pub mod tag;
pub mod tenant;

use std::sync::Arc;

pub use parser::{SqlAnalyzer, SqlOperation, TableReference};
pub use rewriter::{Passthrough, RewriteChain, RewritePipeline, RewriteResult, SqlRewriter};
pub use sluice_core::{FailurePolicy, RewriteError};
pub use tag::CommentTagger;
pub use tenant::TenantScoper;

use sluice_core::SluiceConfig;

/// Build the rewriter chain described by the configuration.
///
/// Tenant scoping runs before tagging so the tag comment stays last.
pub fn chain_from_config(config: &SluiceConfig) -> RewriteChain {
    let mut chain = RewriteChain::new();

    if config.rewrite.tenancy.is_active() {
        chain.push(Arc::new(TenantScoper::new(config.rewrite.tenancy.clone())));
    }
    if let Some(tag) = &config.rewrite.tag {
        chain.push(Arc::new(CommentTagger::new(tag)));
    }

    tracing::debug!(rewriters = chain.len(), "Built rewrite chain");
    chain
}

/// Build the pipeline (rewriter chain plus failure policy) for the configuration.
pub fn pipeline_from_config(config: &SluiceConfig) -> RewritePipeline {
    RewritePipeline::new(
        Arc::new(chain_from_config(config)),
        config.proxy.rewrite_failure,
    )
}
