//! Comment tagging.

use sluice_core::{RewriteError, StatementKind};

use crate::rewriter::SqlRewriter;

/// Appends a `/* tag */` comment to every statement.
///
/// A trailing semicolon stays last: `SELECT 1;` becomes `SELECT 1 /* tag */;`.
/// When the last line holds a `--` comment the tag goes on a line of its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentTagger {
    comment: String,
}

impl CommentTagger {
    pub fn new(tag: impl AsRef<str>) -> Self {
        // A tag must never terminate the comment it lives in.
        let tag = tag.as_ref().replace("*/", "* /");
        Self {
            comment: format!("/* {} */", tag.trim()),
        }
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    fn attach(&self, body: &str) -> String {
        let last_line = body.rsplit('\n').next().unwrap_or(body);
        if last_line.contains("--") {
            format!("{}\n{}", body, self.comment)
        } else {
            format!("{} {}", body, self.comment)
        }
    }
}

impl SqlRewriter for CommentTagger {
    fn rewrite(&self, sql: &str, _kind: StatementKind) -> Result<String, RewriteError> {
        let trimmed = sql.trim_end();
        if trimmed.is_empty() {
            return Ok(sql.to_string());
        }

        match trimmed.strip_suffix(';') {
            Some(body) => Ok(format!("{};", self.attach(body.trim_end()))),
            None => Ok(self.attach(trimmed)),
        }
    }
}
