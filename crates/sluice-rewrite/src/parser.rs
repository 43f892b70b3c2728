//! SQL parsing and analysis.

use sluice_core::RewriteError;
use sqlparser::ast::{Expr, FromTable, Statement, TableFactor, TableWithJoins, UpdateTableFromKind};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

/// Analyzes SQL statements to extract table references.
#[derive(Debug)]
pub struct SqlAnalyzer {
    dialect: GenericDialect,
}

impl Clone for SqlAnalyzer {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl Default for SqlAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlAnalyzer {
    /// Create a new SQL analyzer.
    pub fn new() -> Self {
        Self {
            dialect: GenericDialect {},
        }
    }

    /// Parse a SQL string into statements.
    pub fn parse(&self, sql: &str) -> Result<Vec<Statement>, RewriteError> {
        Parser::parse_sql(&self.dialect, sql).map_err(|e| RewriteError::Parse(e.to_string()))
    }

    /// Parse a standalone expression such as `o.tenant_id = 'acme'`.
    pub fn parse_expr(&self, expr: &str) -> Result<Expr, RewriteError> {
        Parser::new(&self.dialect)
            .try_with_sql(expr)
            .and_then(|mut p| p.parse_expr())
            .map_err(|e| RewriteError::Parse(e.to_string()))
    }

    /// Extract the tables a statement reads or writes at its own level.
    ///
    /// Tables inside subqueries and derived tables belong to those queries and
    /// are not included.
    pub fn extract_tables(&self, stmt: &Statement) -> Vec<TableReference> {
        let mut tables = Vec::new();
        match stmt {
            Statement::Query(query) => {
                if let Some(body) = query.body.as_select() {
                    tables = self.tables_in(&body.from);
                }
            }
            Statement::Update(update) => {
                self.visit_table_with_joins(&update.table, &mut tables);
                if let Some(
                    UpdateTableFromKind::BeforeSet(from) | UpdateTableFromKind::AfterSet(from),
                ) = &update.from
                {
                    tables.extend(self.tables_in(from));
                }
            }
            Statement::Delete(delete) => {
                match &delete.from {
                    FromTable::WithFromKeyword(twjs) | FromTable::WithoutKeyword(twjs) => {
                        tables = self.tables_in(twjs);
                    }
                }
                if let Some(using) = &delete.using {
                    tables.extend(self.tables_in(using));
                }
            }
            _ => {}
        }
        tables
    }

    /// Tables named in a FROM list, including both sides of every join.
    pub fn tables_in(&self, from: &[TableWithJoins]) -> Vec<TableReference> {
        let mut tables = Vec::new();
        for table_with_joins in from {
            self.visit_table_with_joins(table_with_joins, &mut tables);
        }
        tables
    }

    fn visit_table_with_joins(
        &self,
        table_with_joins: &TableWithJoins,
        tables: &mut Vec<TableReference>,
    ) {
        let relations = std::iter::once(&table_with_joins.relation)
            .chain(table_with_joins.joins.iter().map(|j| &j.relation));

        for relation in relations {
            match relation {
                TableFactor::NestedJoin {
                    table_with_joins, ..
                } => self.visit_table_with_joins(table_with_joins, tables),
                _ => {
                    if let Some(name) = extract_table_name(relation) {
                        tables.push(TableReference {
                            name,
                            alias: extract_table_alias(relation),
                        });
                    }
                }
            }
        }
    }

    /// Get the type of SQL operation.
    pub fn get_operation(&self, stmt: &Statement) -> SqlOperation {
        match stmt {
            Statement::Query(_) => SqlOperation::Select,
            Statement::Insert { .. } => SqlOperation::Insert,
            Statement::Update { .. } => SqlOperation::Update,
            Statement::Delete(_) => SqlOperation::Delete,
            Statement::CreateTable { .. }
            | Statement::AlterTable { .. }
            | Statement::Drop { .. }
            | Statement::Truncate { .. } => SqlOperation::Ddl,
            _ => SqlOperation::Other,
        }
    }
}

fn extract_table_name(table_factor: &TableFactor) -> Option<String> {
    match table_factor {
        TableFactor::Table { name, .. } => Some(name.to_string()),
        _ => None,
    }
}

fn extract_table_alias(table_factor: &TableFactor) -> Option<String> {
    match table_factor {
        TableFactor::Table { alias, .. } => alias.as_ref().map(|a| a.name.value.clone()),
        _ => None,
    }
}

/// A reference to a table in a SQL statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableReference {
    /// The table name, possibly schema-qualified.
    pub name: String,
    /// Optional alias.
    pub alias: Option<String>,
}

impl TableReference {
    /// The table name without any schema prefix.
    pub fn unqualified_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }

    /// The identifier columns of this table are referenced through.
    pub fn qualifier(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// Types of SQL operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlOperation {
    Select,
    Insert,
    Update,
    Delete,
    Ddl,
    Other,
}
