//! The rewrite hook and its failure policy.

use std::sync::Arc;

use sluice_core::{FailurePolicy, RewriteError, StatementKind};

/// Transforms SQL text before it reaches the delegate driver.
///
/// Implementations must be stateless with respect to calls: the same input
/// under the same configuration yields the same output, and concurrent calls
/// from unrelated connections need no coordination. Idempotence is not
/// required.
pub trait SqlRewriter: Send + Sync {
    fn rewrite(&self, sql: &str, kind: StatementKind) -> Result<String, RewriteError>;
}

impl<F> SqlRewriter for F
where
    F: Fn(&str, StatementKind) -> Result<String, RewriteError> + Send + Sync,
{
    fn rewrite(&self, sql: &str, kind: StatementKind) -> Result<String, RewriteError> {
        self(sql, kind)
    }
}

/// Returns SQL unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl SqlRewriter for Passthrough {
    fn rewrite(&self, sql: &str, _kind: StatementKind) -> Result<String, RewriteError> {
        Ok(sql.to_string())
    }
}

/// Applies rewriters in order, each one seeing the previous output.
#[derive(Clone, Default)]
pub struct RewriteChain {
    rewriters: Vec<Arc<dyn SqlRewriter>>,
}

impl RewriteChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, rewriter: impl SqlRewriter + 'static) -> Self {
        self.rewriters.push(Arc::new(rewriter));
        self
    }

    pub fn push(&mut self, rewriter: Arc<dyn SqlRewriter>) {
        self.rewriters.push(rewriter);
    }

    pub fn len(&self) -> usize {
        self.rewriters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rewriters.is_empty()
    }
}

impl SqlRewriter for RewriteChain {
    fn rewrite(&self, sql: &str, kind: StatementKind) -> Result<String, RewriteError> {
        let mut current = sql.to_string();
        for rewriter in &self.rewriters {
            current = rewriter.rewrite(&current, kind)?;
        }
        Ok(current)
    }
}

/// Outcome of rewriting one statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteResult {
    /// The SQL the caller supplied.
    pub original_sql: String,
    /// The SQL sent to the delegate.
    pub rewritten_sql: String,
    /// Statement variant the SQL was rewritten for.
    pub kind: StatementKind,
}

impl RewriteResult {
    /// A result that forwards the input as-is.
    pub fn unchanged(sql: &str, kind: StatementKind) -> Self {
        Self {
            original_sql: sql.to_string(),
            rewritten_sql: sql.to_string(),
            kind,
        }
    }

    pub fn is_changed(&self) -> bool {
        self.original_sql != self.rewritten_sql
    }
}

/// A rewriter paired with the policy applied when it fails.
///
/// Under [`FailurePolicy::Open`] a failing rewrite is logged and the original
/// SQL is forwarded. Under [`FailurePolicy::Closed`] the error is returned and
/// no statement is created.
#[derive(Clone)]
pub struct RewritePipeline {
    rewriter: Arc<dyn SqlRewriter>,
    policy: FailurePolicy,
}

impl RewritePipeline {
    pub fn new(rewriter: Arc<dyn SqlRewriter>, policy: FailurePolicy) -> Self {
        Self { rewriter, policy }
    }

    /// A pipeline that never changes anything.
    pub fn passthrough() -> Self {
        Self::new(Arc::new(Passthrough), FailurePolicy::Open)
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Rewrite one statement's SQL.
    pub fn apply(&self, sql: &str, kind: StatementKind) -> Result<RewriteResult, RewriteError> {
        match self.rewriter.rewrite(sql, kind) {
            Ok(rewritten_sql) => {
                tracing::debug!(
                    kind = %kind,
                    original = sql,
                    rewritten = %rewritten_sql,
                    "Rewrote SQL"
                );
                Ok(RewriteResult {
                    original_sql: sql.to_string(),
                    rewritten_sql,
                    kind,
                })
            }
            Err(e) => match self.policy {
                FailurePolicy::Open => {
                    tracing::warn!(
                        kind = %kind,
                        error = %e,
                        "Rewrite failed, forwarding original SQL"
                    );
                    Ok(RewriteResult::unchanged(sql, kind))
                }
                FailurePolicy::Closed => {
                    tracing::warn!(kind = %kind, error = %e, "Rewrite failed, rejecting statement");
                    Err(e)
                }
            },
        }
    }
}

impl std::fmt::Debug for RewritePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RewritePipeline")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
