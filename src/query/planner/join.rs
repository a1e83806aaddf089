// Join Resolver
//
// Expands a root table and its ordered join list into the FROM clause and the
// aliased column list of one SELECT. Joins are emitted in the order given.

use std::sync::Arc;

use crate::catalog::column::quote_ident;
use crate::catalog::table::Table;
use crate::query::executor::result::{QueryError, QueryResult};
use crate::query::planner::predicate::TableScope;

/// How a related table is reached from the root
#[derive(Debug, Clone)]
pub enum JoinKind {
    /// `root.parent_key = child.child_key`
    Direct {
        parent_key: String,
        child_key: String,
    },
    /// `root.parent_key = pivot.pivot_parent_key`, then
    /// `pivot.pivot_child_key = child.child_key`
    Pivot {
        pivot: Arc<Table>,
        parent_key: String,
        pivot_parent_key: String,
        child_key: String,
        pivot_child_key: String,
    },
}

/// One relationship followed by a query
#[derive(Debug, Clone)]
pub struct JoinSpec {
    /// Relation field on the root shape
    pub relation: &'static str,
    /// Table holding the related records
    pub child: Arc<Table>,
    pub kind: JoinKind,
}

impl JoinSpec {
    /// Check every key column against the tables it names
    pub fn validate(&self, root: &Table) -> QueryResult<()> {
        let require = |table: &Table, column: &str| {
            if table.has_column(column) {
                Ok(())
            } else {
                Err(QueryError::MalformedExpression(format!(
                    "join on {}: {} has no column {}",
                    self.relation,
                    table.name(),
                    column
                )))
            }
        };
        match &self.kind {
            JoinKind::Direct { parent_key, child_key } => {
                require(root, parent_key)?;
                require(&self.child, child_key)
            }
            JoinKind::Pivot { pivot, parent_key, pivot_parent_key, child_key, pivot_child_key } => {
                require(root, parent_key)?;
                require(pivot, pivot_parent_key)?;
                require(&self.child, child_key)?;
                require(pivot, pivot_child_key)
            }
        }
    }

    /// Qualified columns name their table, so each table may appear only once per query
    pub fn check_unambiguous(&self, scope: &TableScope) -> QueryResult<()> {
        let mut seen: Vec<&str> = scope.entries().iter().map(|e| e.table.name()).collect();
        for table in self.pivot().into_iter().chain(std::iter::once(&self.child)) {
            if seen.contains(&table.name()) {
                return Err(QueryError::MalformedExpression(format!(
                    "join on {}: table {} is already part of this query",
                    self.relation,
                    table.name()
                )));
            }
            seen.push(table.name());
        }
        Ok(())
    }

    pub fn pivot(&self) -> Option<&Arc<Table>> {
        match &self.kind {
            JoinKind::Pivot { pivot, .. } => Some(pivot),
            JoinKind::Direct { .. } => None,
        }
    }
}

/// Alias of the child table of the join at `position` (0-based)
pub fn child_alias(position: usize) -> String {
    format!("t{}", position + 1)
}

/// Alias of the pivot table of the join at `position` (0-based)
pub fn pivot_alias(position: usize) -> String {
    format!("p{}", position + 1)
}

/// Every table the joins bring into scope, pivots included
pub fn scope_for(root: Arc<Table>, joins: &[JoinSpec]) -> TableScope {
    let mut scope = TableScope::new(root);
    for (i, join) in joins.iter().enumerate() {
        if let Some(pivot) = join.pivot() {
            scope.push(pivot_alias(i), pivot.clone());
        }
        scope.push(child_alias(i), join.child.clone());
    }
    scope
}

/// `"root" AS t0 JOIN ... ON ...`
pub fn from_clause(root: &Table, joins: &[JoinSpec]) -> String {
    let mut sql = format!("{} AS t0", quote_ident(root.name()));
    for (i, join) in joins.iter().enumerate() {
        let child = child_alias(i);
        match &join.kind {
            JoinKind::Direct { parent_key, child_key } => {
                sql.push_str(&format!(
                    " JOIN {} AS {} ON t0.{} = {}.{}",
                    quote_ident(join.child.name()),
                    child,
                    quote_ident(parent_key),
                    child,
                    quote_ident(child_key)
                ));
            }
            JoinKind::Pivot { pivot, parent_key, pivot_parent_key, child_key, pivot_child_key } => {
                let p = pivot_alias(i);
                sql.push_str(&format!(
                    " JOIN {} AS {} ON t0.{} = {}.{} JOIN {} AS {} ON {}.{} = {}.{}",
                    quote_ident(pivot.name()),
                    p,
                    quote_ident(parent_key),
                    p,
                    quote_ident(pivot_parent_key),
                    quote_ident(join.child.name()),
                    child,
                    p,
                    quote_ident(pivot_child_key),
                    child,
                    quote_ident(child_key)
                ));
            }
        }
    }
    sql
}

/// Qualified, aliased column list in row layout order: root columns, then
/// for each join its pivot columns (if any) followed by its child columns
pub fn select_list(scope: &TableScope) -> String {
    let mut columns = Vec::new();
    for entry in scope.entries() {
        for column in entry.table.columns() {
            columns.push(format!(
                "{}.{} AS {}",
                entry.alias,
                quote_ident(column.name()),
                quote_ident(&format!("{}.{}", entry.alias, column.name()))
            ));
        }
    }
    columns.join(", ")
}
