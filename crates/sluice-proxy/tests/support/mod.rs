//! In-memory delegate driver that records every call it receives.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sluice_core::{
    CallableStatement, Column, ConnectOptions, Connection, Driver, Error, PreparedStatement,
    Result, ResultSet, Row, Statement, StatementKind, Value,
};

/// Everything a [`MemDriver`] and the objects it created were asked to do.
#[derive(Default)]
pub struct Calls {
    pub accepts: Mutex<Vec<String>>,
    pub connects: Mutex<Vec<(String, ConnectOptions)>>,
    pub created: Mutex<Vec<(StatementKind, String)>>,
    pub executed: Mutex<Vec<String>>,
    pub parameters: Mutex<Vec<(usize, Value)>>,
    pub connection_closes: AtomicUsize,
    pub statement_closes: AtomicUsize,
    pub commits: AtomicUsize,
}

impl Calls {
    pub fn accepts(&self) -> Vec<String> {
        self.accepts.lock().unwrap().clone()
    }

    pub fn connects(&self) -> Vec<(String, ConnectOptions)> {
        self.connects.lock().unwrap().clone()
    }

    pub fn created(&self) -> Vec<(StatementKind, String)> {
        self.created.lock().unwrap().clone()
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    pub fn parameters(&self) -> Vec<(usize, Value)> {
        self.parameters.lock().unwrap().clone()
    }

    pub fn connection_closes(&self) -> usize {
        self.connection_closes.load(Ordering::SeqCst)
    }

    pub fn statement_closes(&self) -> usize {
        self.statement_closes.load(Ordering::SeqCst)
    }
}

/// Rows every query of a [`MemDriver`] returns.
#[derive(Clone, Default)]
pub struct Table {
    pub columns: Vec<Column>,
    pub rows: Vec<Row>,
    pub scrollable: bool,
}

impl Table {
    pub fn users() -> Self {
        Self {
            columns: vec![
                Column::new("id", "INT"),
                Column::new("email", "TEXT"),
                Column::new("password_hash", "TEXT"),
            ],
            rows: vec![
                Row::new(vec![Value::Int(1), Value::from("a@x.io"), Value::from("h1")]),
                Row::new(vec![Value::Int(2), Value::Null, Value::from("h2")]),
            ],
            scrollable: false,
        }
    }
}

/// How the driver reacts to `accepts` and `connect`.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub enum Behavior {
    #[default]
    Normal,
    /// `accepts` itself fails.
    AcceptsFails,
    /// `accepts` says yes, `connect` says "not mine".
    Declines,
    /// `connect` fails with a connection error.
    ConnectFails,
    /// Connections fail to close and stay open.
    CloseFails,
}

pub struct MemDriver {
    name: String,
    prefix: String,
    behavior: Behavior,
    table: Table,
    pub calls: Arc<Calls>,
}

impl MemDriver {
    pub fn new(name: &str, prefix: &str) -> Self {
        Self {
            name: name.to_string(),
            prefix: prefix.to_string(),
            behavior: Behavior::Normal,
            table: Table::users(),
            calls: Arc::new(Calls::default()),
        }
    }

    pub fn with_behavior(mut self, behavior: Behavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn with_table(mut self, table: Table) -> Self {
        self.table = table;
        self
    }
}

#[async_trait]
impl Driver for MemDriver {
    fn name(&self) -> &str {
        &self.name
    }

    fn accepts(&self, address: &str) -> Result<bool> {
        self.calls.accepts.lock().unwrap().push(address.to_string());
        if self.behavior == Behavior::AcceptsFails {
            return Err(Error::connection("accepts exploded"));
        }
        Ok(address.starts_with(&self.prefix))
    }

    async fn connect(
        &self,
        address: &str,
        options: &ConnectOptions,
    ) -> Result<Option<Box<dyn Connection>>> {
        if !address.starts_with(&self.prefix) {
            return Ok(None);
        }
        self.calls
            .connects
            .lock()
            .unwrap()
            .push((address.to_string(), options.clone()));

        match self.behavior {
            Behavior::Declines => Ok(None),
            Behavior::ConnectFails => {
                Err(Error::connection(format!("{} refused: {address}", self.name)))
            }
            _ => Ok(Some(Box::new(MemConnection {
                calls: Arc::clone(&self.calls),
                table: self.table.clone(),
                closed: AtomicBool::new(false),
                auto_commit: AtomicBool::new(true),
                close_fails: self.behavior == Behavior::CloseFails,
            }))),
        }
    }
}

pub struct MemConnection {
    calls: Arc<Calls>,
    table: Table,
    closed: AtomicBool,
    auto_commit: AtomicBool,
    close_fails: bool,
}

impl MemConnection {
    fn statement(&self, kind: StatementKind, sql: &str) -> MemStatement {
        self.calls
            .created
            .lock()
            .unwrap()
            .push((kind, sql.to_string()));
        MemStatement {
            sql: sql.to_string(),
            calls: Arc::clone(&self.calls),
            table: self.table.clone(),
            params: BTreeMap::new(),
            batch: Vec::new(),
            outs: BTreeMap::new(),
            pending: None,
            update_count: None,
            closed: false,
        }
    }
}

#[async_trait]
impl Connection for MemConnection {
    async fn create_statement(&self, sql: &str) -> Result<Box<dyn Statement>> {
        Ok(Box::new(self.statement(StatementKind::Plain, sql)))
    }

    async fn prepare(&self, sql: &str) -> Result<Box<dyn PreparedStatement>> {
        if sql.trim().is_empty() {
            return Err(Error::query("empty statement", sql));
        }
        Ok(Box::new(self.statement(StatementKind::Prepared, sql)))
    }

    async fn prepare_call(&self, sql: &str) -> Result<Box<dyn CallableStatement>> {
        Ok(Box::new(self.statement(StatementKind::Callable, sql)))
    }

    fn native_sql(&self, sql: &str) -> Result<String> {
        Ok(sql.replace("{fn NOW()}", "CURRENT_TIMESTAMP"))
    }

    async fn set_auto_commit(&self, auto_commit: bool) -> Result<()> {
        self.auto_commit.store(auto_commit, Ordering::SeqCst);
        Ok(())
    }

    async fn auto_commit(&self) -> Result<bool> {
        Ok(self.auto_commit.load(Ordering::SeqCst))
    }

    async fn commit(&self) -> Result<()> {
        if self.auto_commit.load(Ordering::SeqCst) {
            return Err(Error::InvalidArgument("commit with auto-commit on".into()));
        }
        self.calls.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        Ok(())
    }

    async fn is_valid(&self, _timeout: Duration) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<()> {
        self.calls.connection_closes.fetch_add(1, Ordering::SeqCst);
        if self.close_fails {
            return Err(Error::connection("socket reset during close"));
        }
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

pub struct MemStatement {
    sql: String,
    calls: Arc<Calls>,
    table: Table,
    params: BTreeMap<usize, Value>,
    batch: Vec<BTreeMap<usize, Value>>,
    outs: BTreeMap<usize, String>,
    pending: Option<Box<dyn ResultSet>>,
    update_count: Option<u64>,
    closed: bool,
}

impl MemStatement {
    fn record(&self) -> Result<()> {
        if self.closed {
            return Err(Error::Closed("statement"));
        }
        self.calls.executed.lock().unwrap().push(self.sql.clone());
        Ok(())
    }

    fn is_query(&self) -> bool {
        self.sql.trim_start().to_ascii_uppercase().starts_with("SELECT")
    }

    fn cursor(&self) -> Box<dyn ResultSet> {
        Box::new(MemCursor::new(self.table.clone()))
    }
}

#[async_trait]
impl Statement for MemStatement {
    fn sql(&self) -> &str {
        &self.sql
    }

    async fn execute_query(&mut self) -> Result<Box<dyn ResultSet>> {
        self.record()?;
        if !self.is_query() {
            return Err(Error::query("statement does not return rows", self.sql.as_str()));
        }
        Ok(self.cursor())
    }

    async fn execute_update(&mut self) -> Result<u64> {
        self.record()?;
        let count = self.table.rows.len() as u64;
        self.update_count = Some(count);
        Ok(count)
    }

    async fn execute(&mut self) -> Result<bool> {
        self.record()?;
        if self.is_query() {
            self.pending = Some(self.cursor());
            self.update_count = None;
            Ok(true)
        } else {
            self.update_count = Some(self.table.rows.len() as u64);
            Ok(false)
        }
    }

    async fn result_set(&mut self) -> Result<Option<Box<dyn ResultSet>>> {
        Ok(self.pending.take())
    }

    fn update_count(&self) -> Option<u64> {
        self.update_count
    }

    async fn set_query_timeout(&mut self, _timeout: Option<Duration>) -> Result<()> {
        Ok(())
    }

    async fn set_max_rows(&mut self, max_rows: u64) -> Result<()> {
        if max_rows > 0 {
            self.table.rows.truncate(max_rows as usize);
        }
        Ok(())
    }

    async fn cancel(&self) -> Result<()> {
        Err(Error::Cancelled)
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    async fn close(&mut self) -> Result<()> {
        self.calls.statement_closes.fetch_add(1, Ordering::SeqCst);
        self.closed = true;
        Ok(())
    }
}

#[async_trait]
impl PreparedStatement for MemStatement {
    async fn set_parameter(&mut self, index: usize, value: Value) -> Result<()> {
        if index == 0 {
            return Err(Error::InvalidArgument("parameter indices start at 1".into()));
        }
        self.calls
            .parameters
            .lock()
            .unwrap()
            .push((index, value.clone()));
        self.params.insert(index, value);
        Ok(())
    }

    async fn clear_parameters(&mut self) -> Result<()> {
        self.params.clear();
        Ok(())
    }

    async fn add_batch(&mut self) -> Result<()> {
        self.batch.push(std::mem::take(&mut self.params));
        Ok(())
    }

    async fn execute_batch(&mut self) -> Result<Vec<u64>> {
        self.record()?;
        Ok(self.batch.drain(..).map(|_| 1).collect())
    }
}

#[async_trait]
impl CallableStatement for MemStatement {
    async fn register_out_parameter(&mut self, index: usize, type_name: &str) -> Result<()> {
        self.outs.insert(index, type_name.to_string());
        Ok(())
    }

    async fn out_parameter(&self, index: usize) -> Result<Value> {
        match self.outs.get(&index) {
            Some(type_name) => Ok(Value::Text(format!("out:{type_name}"))),
            None => Err(Error::InvalidArgument(format!(
                "parameter {index} not registered"
            ))),
        }
    }
}

/// A cursor over a [`Table`]. Starts before the first row.
pub struct MemCursor {
    table: Table,
    position: Option<usize>,
    closed: bool,
}

impl MemCursor {
    pub fn new(table: Table) -> Self {
        Self {
            table,
            position: None,
            closed: false,
        }
    }
}

#[async_trait]
impl ResultSet for MemCursor {
    fn columns(&self) -> &[Column] {
        &self.table.columns
    }

    async fn next(&mut self) -> Result<bool> {
        let next = self.position.map_or(0, |i| i + 1);
        let len = self.table.rows.len();
        self.position = Some(next.min(len));
        Ok(next < len)
    }

    fn current(&self) -> Option<&Row> {
        self.position.and_then(|i| self.table.rows.get(i))
    }

    fn is_scrollable(&self) -> bool {
        self.table.scrollable
    }

    async fn previous(&mut self) -> Result<bool> {
        if !self.table.scrollable {
            return Err(Error::unsupported("previous on forward-only cursor"));
        }
        match self.position {
            Some(i) if i > 0 => {
                self.position = Some(i - 1);
                Ok(true)
            }
            _ => {
                self.position = None;
                Ok(false)
            }
        }
    }

    async fn before_first(&mut self) -> Result<()> {
        if !self.table.scrollable {
            return Err(Error::unsupported("before_first on forward-only cursor"));
        }
        self.position = None;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

/// Drain a cursor into its visible rows.
pub async fn collect(cursor: &mut dyn ResultSet) -> Vec<Vec<Value>> {
    let mut rows = Vec::new();
    while cursor.next().await.unwrap() {
        rows.push(cursor.current().unwrap().values().to_vec());
    }
    rows
}
