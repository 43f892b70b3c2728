//! Tenant predicate injection.

use std::collections::HashSet;
use std::ops::ControlFlow;

use sluice_core::{RewriteError, StatementKind, TenancyConfig};
use sqlparser::ast::{
    BinaryOperator, Expr, Query, SetExpr, Statement, TableFactor, VisitMut, VisitorMut,
    visit_relations,
};

use crate::parser::{SqlAnalyzer, SqlOperation, TableReference};
use crate::rewriter::SqlRewriter;

/// Scopes SELECT, UPDATE and DELETE statements to a single tenant.
///
/// **Before:**
/// ```sql
/// SELECT * FROM orders WHERE status = 'pending'
/// ```
///
/// **After:**
/// ```sql
/// SELECT * FROM orders WHERE (status = 'pending') AND orders.tenant_id = 'acme'
/// ```
///
/// Every query block is scoped on its own: subqueries, derived tables, CTE
/// bodies and each side of a set operation get predicates for the tables in
/// their own FROM list. UPDATE ... FROM and DELETE ... USING tables are
/// scoped alongside the target.
///
/// Global tables, system catalogs and references to CTEs are never scoped.
/// INSERT statements and statements without tenant tables are returned
/// unchanged, byte for byte.
#[derive(Clone)]
pub struct TenantScoper {
    analyzer: SqlAnalyzer,
    config: TenancyConfig,
}

impl TenantScoper {
    /// Create a scoper for the tenant configured in `config`.
    pub fn new(config: TenancyConfig) -> Self {
        Self {
            analyzer: SqlAnalyzer::new(),
            config,
        }
    }

    /// Predicates scoping each tenant table in `tables`.
    fn predicates(
        &self,
        tenant: &str,
        tables: &[TableReference],
        ctes: &HashSet<String>,
    ) -> Vec<String> {
        let literal = tenant.replace('\'', "''");
        tables
            .iter()
            .filter(|table| {
                if is_system_catalog_table(&table.name) {
                    tracing::debug!(
                        table = table.name,
                        "Skipping tenant predicate for system catalog table"
                    );
                    return false;
                }
                !ctes.contains(&table.name.to_ascii_lowercase())
            })
            .filter_map(|table| {
                self.config
                    .get_tenant_column(table.unqualified_name())
                    .map(|column| format!("{}.{} = '{}'", table.qualifier(), column, literal))
            })
            .collect()
    }
}

impl SqlRewriter for TenantScoper {
    fn rewrite(&self, sql: &str, _kind: StatementKind) -> Result<String, RewriteError> {
        let Some(tenant) = self.config.tenant.as_deref() else {
            return Ok(sql.to_string());
        };

        let mut statements = self.analyzer.parse(sql)?;
        if statements.is_empty() {
            return Ok(sql.to_string());
        }
        if statements.len() > 1 {
            return Err(RewriteError::Unsupported {
                reason: format!("expected one statement, found {}", statements.len()),
            });
        }

        let stmt = &mut statements[0];
        match self.analyzer.get_operation(stmt) {
            SqlOperation::Select | SqlOperation::Update | SqlOperation::Delete => {}
            _ => return Ok(sql.to_string()),
        }

        let mut scope = Scope {
            scoper: self,
            tenant,
            ctes: HashSet::new(),
            changed: false,
        };
        if let ControlFlow::Break(err) = stmt.visit(&mut scope) {
            return Err(err);
        }

        if scope.changed {
            Ok(stmt.to_string())
        } else {
            Ok(sql.to_string())
        }
    }
}

/// Walks one statement and adds predicates to every query block in it.
struct Scope<'a> {
    scoper: &'a TenantScoper,
    tenant: &'a str,
    /// Lowercased CTE names; references to them are not tables.
    ctes: HashSet<String>,
    changed: bool,
}

impl Scope<'_> {
    fn scope_selection(
        &mut self,
        tables: &[TableReference],
        selection: &mut Option<Expr>,
    ) -> Result<(), RewriteError> {
        let predicates = self.scoper.predicates(self.tenant, tables, &self.ctes);
        if predicates.is_empty() {
            return Ok(());
        }

        let predicate = self.scoper.analyzer.parse_expr(&predicates.join(" AND "))?;
        *selection = Some(match selection.take() {
            Some(existing) => Expr::BinaryOp {
                left: Box::new(Expr::Nested(Box::new(existing))),
                op: BinaryOperator::And,
                right: Box::new(predicate),
            },
            None => predicate,
        });
        self.changed = true;
        Ok(())
    }

    fn scope_body(&mut self, body: &mut SetExpr) -> Result<(), RewriteError> {
        match body {
            SetExpr::Select(select) => {
                let tables = self.scoper.analyzer.tables_in(&select.from);
                self.scope_selection(&tables, &mut select.selection)
            }
            SetExpr::SetOperation { left, right, .. } => {
                self.scope_body(left)?;
                self.scope_body(right)
            }
            // Nested queries and DML bodies are visited on their own.
            SetExpr::Query(_)
            | SetExpr::Values(_)
            | SetExpr::Insert(_)
            | SetExpr::Update(_)
            | SetExpr::Delete(_) => Ok(()),
            SetExpr::Merge(_) | SetExpr::Table(_) => Err(RewriteError::Unsupported {
                reason: "MERGE and TABLE query bodies cannot be scoped".to_string(),
            }),
        }
    }
}

impl VisitorMut for Scope<'_> {
    type Break = RewriteError;

    fn pre_visit_query(&mut self, query: &mut Query) -> ControlFlow<RewriteError> {
        let Some(with) = &query.with else {
            return ControlFlow::Continue(());
        };
        for cte in &with.cte_tables {
            let name = cte.alias.name.value.to_ascii_lowercase();
            // A non-recursive CTE that reads a table of its own name would hide that table.
            if !with.recursive {
                visit_relations(&*cte.query, |relation| {
                    if relation.to_string().eq_ignore_ascii_case(&name) {
                        ControlFlow::Break(RewriteError::Unsupported {
                            reason: format!("CTE `{name}` shadows a table it reads"),
                        })
                    } else {
                        ControlFlow::Continue(())
                    }
                })?;
            }
            self.ctes.insert(name);
        }
        ControlFlow::Continue(())
    }

    fn post_visit_query(&mut self, query: &mut Query) -> ControlFlow<RewriteError> {
        into_flow(self.scope_body(&mut query.body))
    }

    fn pre_visit_table_factor(
        &mut self,
        table_factor: &mut TableFactor,
    ) -> ControlFlow<RewriteError> {
        match table_factor {
            TableFactor::NestedJoin { alias: Some(alias), .. } => {
                ControlFlow::Break(RewriteError::Unsupported {
                    reason: format!("aliased join `{}` hides its tables", alias.name),
                })
            }
            _ => ControlFlow::Continue(()),
        }
    }

    fn post_visit_statement(&mut self, statement: &mut Statement) -> ControlFlow<RewriteError> {
        let tables = self.scoper.analyzer.extract_tables(statement);
        let selection = match statement {
            Statement::Update(update) => &mut update.selection,
            Statement::Delete(delete) => &mut delete.selection,
            _ => return ControlFlow::Continue(()),
        };
        into_flow(self.scope_selection(&tables, selection))
    }
}

fn into_flow(result: Result<(), RewriteError>) -> ControlFlow<RewriteError> {
    match result {
        Ok(()) => ControlFlow::Continue(()),
        Err(err) => ControlFlow::Break(err),
    }
}

/// Check if a table is a system catalog table that must not be scoped.
fn is_system_catalog_table(table_name: &str) -> bool {
    let table_lower = table_name.to_lowercase();
    table_lower.starts_with("pg_catalog.")
        || table_lower.starts_with("information_schema.")
        || table_lower.starts_with("pg_")
}
