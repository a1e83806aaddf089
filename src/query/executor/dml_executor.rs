// Data Manipulation Statement Builder
//
// Produces INSERT, UPDATE and DELETE statements for one table. Values always
// travel as bound parameters; only identifiers are written into the text.

use crate::catalog::column::quote_ident;
use crate::catalog::table::Table;
use crate::query::ast::Expr;
use crate::query::executor::engine::SqlStatement;
use crate::query::executor::result::{DataValue, QueryError, QueryResult};
use crate::query::planner::predicate::{self, TableScope};

/// Which columns a write covers
#[derive(Debug, Clone, Copy)]
pub enum ColumnSelection<'a> {
    All,
    /// Every column except these
    Ignoring(&'a [&'a str]),
    /// Only these, in table order
    Only(&'a [&'a str]),
}

/// Resolve a selection to column positions, in table order
pub fn column_positions(table: &Table, selection: ColumnSelection<'_>) -> QueryResult<Vec<usize>> {
    let named = match selection {
        ColumnSelection::All => &[][..],
        ColumnSelection::Ignoring(names) | ColumnSelection::Only(names) => names,
    };
    for name in named {
        if !table.has_column(name) {
            return Err(QueryError::MalformedExpression(format!(
                "{} has no column {}",
                table.name(),
                name
            )));
        }
    }

    let positions: Vec<usize> = table.columns().iter()
        .enumerate()
        .filter(|(_, column)| match selection {
            ColumnSelection::All => true,
            ColumnSelection::Ignoring(names) => !names.iter().any(|n| *n == column.name()),
            ColumnSelection::Only(names) => names.iter().any(|n| *n == column.name()),
        })
        .map(|(i, _)| i)
        .collect();

    if positions.is_empty() {
        return Err(QueryError::MalformedExpression(format!(
            "no columns of {} left to write",
            table.name()
        )));
    }
    Ok(positions)
}

fn check_width(table: &Table, row: &[DataValue]) -> QueryResult<()> {
    if row.len() != table.columns().len() {
        return Err(QueryError::BindingError {
            expected: table.columns().len(),
            actual: row.len(),
        });
    }
    Ok(())
}

fn pick(row: &[DataValue], positions: &[usize]) -> Vec<DataValue> {
    positions.iter().map(|&i| row[i].clone()).collect()
}

/// `INSERT INTO "t" (...) VALUES (?, ...)` for one record's values
pub fn insert_statement(table: &Table, positions: &[usize], row: &[DataValue]) -> QueryResult<SqlStatement> {
    check_width(table, row)?;
    let columns = table.columns();
    let names: Vec<String> = positions.iter().map(|&i| quote_ident(columns[i].name())).collect();
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(table.name()),
        names.join(", "),
        vec!["?"; positions.len()].join(", ")
    );
    Ok(SqlStatement::command(sql, pick(row, positions)))
}

/// `UPDATE "t" AS t0 SET ... [WHERE ...]`
pub fn update_statement(
    table: &Table,
    positions: &[usize],
    row: &[DataValue],
    scope: &TableScope,
    filter: Option<&Expr>,
) -> QueryResult<SqlStatement> {
    check_width(table, row)?;
    let columns = table.columns();
    let assignments: Vec<String> = positions.iter()
        .map(|&i| format!("{} = ?", quote_ident(columns[i].name())))
        .collect();
    let mut params = pick(row, positions);
    let mut sql = format!(
        "UPDATE {} AS t0 SET {}",
        quote_ident(table.name()),
        assignments.join(", ")
    );
    if let Some(expr) = filter {
        let compiled = predicate::compile(expr, scope)?;
        sql.push_str(" WHERE ");
        sql.push_str(&compiled.sql);
        params.extend(compiled.params);
    }
    Ok(SqlStatement::command(sql, params))
}

/// `DELETE FROM "t" AS t0 [WHERE ...]`
pub fn delete_statement(table: &Table, scope: &TableScope, filter: Option<&Expr>) -> QueryResult<SqlStatement> {
    let mut sql = format!("DELETE FROM {} AS t0", quote_ident(table.name()));
    let mut params = Vec::new();
    if let Some(expr) = filter {
        let compiled = predicate::compile(expr, scope)?;
        sql.push_str(" WHERE ");
        sql.push_str(&compiled.sql);
        params = compiled.params;
    }
    Ok(SqlStatement::command(sql, params))
}
