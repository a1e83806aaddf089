// Query Planner Module
//
// Assembles SELECT and COUNT statements from a root table, its joins, an
// optional filter, order terms and paging.

pub mod join;
pub mod predicate;

use std::sync::Arc;

use crate::catalog::column::quote_ident;
use crate::catalog::table::Table;
use crate::query::ast::{ColumnRef, Expr};
use crate::query::executor::engine::SqlStatement;
use crate::query::executor::result::{DataValue, QueryResult};

pub use self::join::{JoinKind, JoinSpec};
pub use self::predicate::{CompiledPredicate, TableScope};

/// One ORDER BY term
#[derive(Debug, Clone, PartialEq)]
pub struct OrderTerm {
    pub column: ColumnRef,
    pub descending: bool,
}

/// Row window: at most `limit` records after skipping `skip`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Paging {
    pub limit: Option<u64>,
    pub skip: u64,
}

impl Paging {
    fn clause(&self, params: &mut Vec<DataValue>) -> String {
        params.push(DataValue::Integer(self.limit.map_or(-1, clamp)));
        params.push(DataValue::Integer(clamp(self.skip)));
        " LIMIT ? OFFSET ?".to_string()
    }

    /// Apply the window to records already in memory
    pub fn apply<T>(&self, records: Vec<T>) -> Vec<T> {
        let skip = usize::try_from(self.skip).unwrap_or(usize::MAX);
        let window = records.into_iter().skip(skip);
        match self.limit {
            Some(limit) => window.take(usize::try_from(limit).unwrap_or(usize::MAX)).collect(),
            None => window.collect(),
        }
    }
}

fn clamp(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// Everything needed to read records of one root table
#[derive(Debug, Clone)]
pub struct SelectPlan {
    pub root: Arc<Table>,
    pub joins: Vec<JoinSpec>,
    pub filter: Option<Expr>,
    pub order: Vec<OrderTerm>,
    pub paging: Option<Paging>,
}

impl SelectPlan {
    pub fn new(root: Arc<Table>) -> Self {
        SelectPlan {
            root,
            joins: Vec::new(),
            filter: None,
            order: Vec::new(),
            paging: None,
        }
    }

    pub fn scope(&self) -> TableScope {
        join::scope_for(self.root.clone(), &self.joins)
    }

    /// Paging the statement cannot express, because joined rows are not
    /// one per record; the hydrator applies it instead
    pub fn record_paging(&self) -> Option<Paging> {
        if self.joins.is_empty() { None } else { self.paging }
    }

    fn where_clause(&self, scope: &TableScope, params: &mut Vec<DataValue>) -> QueryResult<String> {
        match &self.filter {
            Some(expr) => {
                let compiled = predicate::compile(expr, scope)?;
                params.extend(compiled.params);
                Ok(format!(" WHERE {}", compiled.sql))
            }
            None => Ok(String::new()),
        }
    }

    fn order_clause(&self, scope: &TableScope) -> QueryResult<String> {
        if self.order.is_empty() {
            return Ok(String::new());
        }
        let terms = self.order.iter()
            .map(|term| {
                let column = scope.resolve(&term.column)?;
                Ok(format!("{} {}", column, if term.descending { "DESC" } else { "ASC" }))
            })
            .collect::<QueryResult<Vec<_>>>()?;
        Ok(format!(" ORDER BY {}", terms.join(", ")))
    }

    pub fn select_statement(&self) -> QueryResult<SqlStatement> {
        let scope = self.scope();
        let mut params = Vec::new();
        let mut sql = format!(
            "SELECT {} FROM {}",
            join::select_list(&scope),
            join::from_clause(&self.root, &self.joins)
        );
        sql.push_str(&self.where_clause(&scope, &mut params)?);
        sql.push_str(&self.order_clause(&scope)?);
        if self.joins.is_empty() {
            if let Some(paging) = &self.paging {
                sql.push_str(&paging.clause(&mut params));
            }
        }
        Ok(SqlStatement::query(sql, params))
    }

    /// Count the records `select_statement` would produce after hydration
    pub fn count_statement(&self) -> QueryResult<SqlStatement> {
        let scope = self.scope();
        let mut params = Vec::new();
        let from = join::from_clause(&self.root, &self.joins);
        let filter = self.where_clause(&scope, &mut params)?;

        let sql = if self.joins.is_empty() {
            match &self.paging {
                None => format!("SELECT COUNT(*) FROM {}{}", from, filter),
                Some(paging) => format!(
                    "SELECT COUNT(*) FROM (SELECT 1 FROM {}{}{})",
                    from,
                    filter,
                    paging.clause(&mut params)
                ),
            }
        } else {
            let window = match &self.paging {
                Some(paging) => paging.clause(&mut params),
                None => String::new(),
            };
            format!(
                "SELECT COUNT(*) FROM (SELECT DISTINCT {} FROM {}{}{})",
                self.root_identity_columns(),
                from,
                filter,
                window
            )
        };
        Ok(SqlStatement::query(sql, params))
    }

    /// Columns identifying a root record: its key, or every column when keyless
    fn root_identity_columns(&self) -> String {
        let key = self.root.primary_key_columns();
        let columns = if key.is_empty() { self.root.columns().iter().collect() } else { key };
        columns.iter()
            .map(|c| format!("t0.{}", quote_ident(c.name())))
            .collect::<Vec<_>>()
            .join(", ")
    }
}
