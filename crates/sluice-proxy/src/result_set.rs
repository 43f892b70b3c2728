//! Result cursor proxy.
//!
//! [`ResultSetProxy`] changes what a cursor shows, never how it moves: it
//! starts before the first row, reports exhaustion exactly when the delegate
//! does, and is scrollable only if the delegate is.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use sluice_core::{Column, ResultSet, ResultsConfig, Result, Row, Value};

/// Decides which parts of a cursor are visible.
pub trait ResultFilter: Send + Sync {
    /// Indices of delegate columns that stay visible, in display order.
    fn project(&self, columns: &[Column]) -> Vec<usize> {
        (0..columns.len()).collect()
    }

    /// Whether a delegate row is visible at all.
    fn keep_row(&self, _columns: &[Column], _row: &Row) -> bool {
        true
    }

    /// Replace a visible value.
    fn map_value(&self, _column: &Column, value: Value) -> Value {
        value
    }
}

/// Shows everything unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unfiltered;

impl ResultFilter for Unfiltered {}

/// Hides and redacts columns by name (case-insensitive).
#[derive(Debug, Clone, Default)]
pub struct ColumnMask {
    hidden: HashSet<String>,
    redacted: HashSet<String>,
}

impl ColumnMask {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &ResultsConfig) -> Self {
        let mut mask = Self::new();
        for column in &config.hidden_columns {
            mask = mask.hide(column);
        }
        for column in &config.redacted_columns {
            mask = mask.redact(column);
        }
        mask
    }

    /// Remove a column from every cursor.
    pub fn hide(mut self, column: impl AsRef<str>) -> Self {
        self.hidden.insert(column.as_ref().to_ascii_lowercase());
        self
    }

    /// Keep a column but replace its non-null values with `"***"`.
    pub fn redact(mut self, column: impl AsRef<str>) -> Self {
        self.redacted.insert(column.as_ref().to_ascii_lowercase());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.hidden.is_empty() && self.redacted.is_empty()
    }
}

impl ResultFilter for ColumnMask {
    fn project(&self, columns: &[Column]) -> Vec<usize> {
        columns
            .iter()
            .enumerate()
            .filter(|(_, c)| !self.hidden.contains(&c.name.to_ascii_lowercase()))
            .map(|(i, _)| i)
            .collect()
    }

    fn map_value(&self, column: &Column, value: Value) -> Value {
        if value.is_null() || !self.redacted.contains(&column.name.to_ascii_lowercase()) {
            return value;
        }
        Value::Text("***".to_string())
    }
}

/// Wraps one delegate cursor and exposes a filtered view of it.
pub struct ResultSetProxy {
    inner: Box<dyn ResultSet>,
    filter: Arc<dyn ResultFilter>,
    projection: Vec<usize>,
    columns: Vec<Column>,
    current: Option<Row>,
}

impl ResultSetProxy {
    pub fn new(inner: Box<dyn ResultSet>, filter: Arc<dyn ResultFilter>) -> Self {
        let delegate_columns = inner.columns();
        let projection: Vec<usize> = filter
            .project(delegate_columns)
            .into_iter()
            .filter(|&i| i < delegate_columns.len())
            .collect();
        let columns = projection
            .iter()
            .map(|&i| delegate_columns[i].clone())
            .collect();

        Self {
            inner,
            filter,
            projection,
            columns,
            current: None,
        }
    }

    /// Wrap a cursor if there is one.
    pub fn wrap(inner: Option<Box<dyn ResultSet>>, filter: Arc<dyn ResultFilter>) -> Option<Self> {
        inner.map(|rs| Self::new(rs, filter))
    }

    /// Refresh the visible row from the delegate's position.
    ///
    /// Returns `false` when the delegate row is filtered out.
    fn load_current(&mut self) -> bool {
        let Some(row) = self.inner.current() else {
            self.current = None;
            return true;
        };
        if !self.filter.keep_row(self.inner.columns(), row) {
            return false;
        }

        let delegate_columns = self.inner.columns();
        let values = self
            .projection
            .iter()
            .map(|&i| {
                let value = row.get(i).cloned().unwrap_or(Value::Null);
                self.filter.map_value(&delegate_columns[i], value)
            })
            .collect::<Vec<_>>();
        self.current = Some(Row::new(values));
        true
    }
}

#[async_trait]
impl ResultSet for ResultSetProxy {
    fn columns(&self) -> &[Column] {
        &self.columns
    }

    async fn next(&mut self) -> Result<bool> {
        loop {
            if !self.inner.next().await? {
                self.current = None;
                return Ok(false);
            }
            if self.load_current() {
                return Ok(true);
            }
        }
    }

    fn current(&self) -> Option<&Row> {
        self.current.as_ref()
    }

    fn is_scrollable(&self) -> bool {
        self.inner.is_scrollable()
    }

    async fn previous(&mut self) -> Result<bool> {
        loop {
            if !self.inner.previous().await? {
                self.current = None;
                return Ok(false);
            }
            if self.load_current() {
                return Ok(true);
            }
        }
    }

    async fn before_first(&mut self) -> Result<()> {
        self.inner.before_first().await?;
        self.current = None;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    async fn close(&mut self) -> Result<()> {
        self.current = None;
        self.inner.close().await
    }
}
