// Predicate Compiler
//
// Turns an expression tree into a fully parenthesized SQL fragment plus the
// parameters it binds, in placeholder order. Column references are checked
// against the tables in scope and rendered with their per-query alias.

use std::sync::Arc;

use crate::catalog::column::quote_ident;
use crate::catalog::table::Table;
use crate::query::ast::{ColumnRef, CompareOp, Expr, Operand, PatternKind, PatternMatch};
use crate::query::executor::result::{DataValue, QueryError, QueryResult};

/// A table visible to a statement, with the alias it is known by
#[derive(Debug, Clone)]
pub struct ScopeEntry {
    pub alias: String,
    pub table: Arc<Table>,
}

/// Tables a predicate may reference. The first entry is the root.
#[derive(Debug, Clone)]
pub struct TableScope {
    entries: Vec<ScopeEntry>,
}

impl TableScope {
    pub fn new(root: Arc<Table>) -> Self {
        TableScope {
            entries: vec![ScopeEntry { alias: "t0".to_string(), table: root }],
        }
    }

    pub fn push(&mut self, alias: impl Into<String>, table: Arc<Table>) {
        self.entries.push(ScopeEntry { alias: alias.into(), table });
    }

    pub fn root(&self) -> &ScopeEntry {
        &self.entries[0]
    }

    pub fn entries(&self) -> &[ScopeEntry] {
        &self.entries
    }

    fn lookup(&self, table: Option<&str>) -> QueryResult<&ScopeEntry> {
        match table {
            None => Ok(self.root()),
            Some(name) => self.entries.iter()
                .find(|e| e.table.name() == name)
                .ok_or_else(|| QueryError::MalformedExpression(format!(
                    "table {} is not part of this query",
                    name
                ))),
        }
    }

    /// Render `column` as `alias."name"`
    pub fn resolve(&self, column: &ColumnRef) -> QueryResult<String> {
        let entry = self.lookup(column.table.as_deref())?;
        if !entry.table.has_column(&column.column) {
            return Err(QueryError::MalformedExpression(format!(
                "{} has no column {}",
                entry.table.name(),
                column.column
            )));
        }
        Ok(format!("{}.{}", entry.alias, quote_ident(&column.column)))
    }
}

/// A compiled WHERE fragment
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledPredicate {
    pub sql: String,
    pub params: Vec<DataValue>,
}

/// Compile `expr` against the tables in `scope`
pub fn compile(expr: &Expr, scope: &TableScope) -> QueryResult<CompiledPredicate> {
    let mut compiler = PredicateCompiler { scope, sql: String::new(), params: Vec::new() };
    compiler.emit(expr)?;
    Ok(CompiledPredicate { sql: compiler.sql, params: compiler.params })
}

struct PredicateCompiler<'a> {
    scope: &'a TableScope,
    sql: String,
    params: Vec<DataValue>,
}

impl PredicateCompiler<'_> {
    fn emit(&mut self, expr: &Expr) -> QueryResult<()> {
        match expr {
            Expr::Compare { left, op, right } => self.emit_compare(left, *op, right),
            Expr::In { column, values, negated } => self.emit_in(column, values, *negated),
            Expr::Pattern { column, pattern } => self.emit_pattern(column, pattern),
            Expr::And(a, b) => self.emit_binary(a, "AND", b),
            Expr::Or(a, b) => self.emit_binary(a, "OR", b),
            Expr::Not(inner) => {
                self.sql.push_str("(NOT ");
                self.emit(inner)?;
                self.sql.push(')');
                Ok(())
            }
        }
    }

    fn emit_binary(&mut self, left: &Expr, keyword: &str, right: &Expr) -> QueryResult<()> {
        self.sql.push('(');
        self.emit(left)?;
        self.sql.push(' ');
        self.sql.push_str(keyword);
        self.sql.push(' ');
        self.emit(right)?;
        self.sql.push(')');
        Ok(())
    }

    fn emit_compare(&mut self, left: &Operand, op: CompareOp, right: &Operand) -> QueryResult<()> {
        match (left, right) {
            (Operand::List(_), _) | (_, Operand::List(_)) => Err(QueryError::MalformedExpression(
                format!("a list cannot be compared with {}; use a membership test", op.sql()),
            )),
            (Operand::Column(a), Operand::Column(b)) => {
                let a = self.scope.resolve(a)?;
                let b = self.scope.resolve(b)?;
                self.sql.push_str(&format!("({} {} {})", a, op.sql(), b));
                Ok(())
            }
            (Operand::Column(c), Operand::Value(v)) => self.emit_column_value(c, op, v),
            (Operand::Value(v), Operand::Column(c)) => self.emit_column_value(c, op.flipped(), v),
            (Operand::Value(a), Operand::Value(b)) if a.is_null() && b.is_null() => Err(
                QueryError::MalformedExpression("null compared with null".to_string()),
            ),
            (Operand::Value(_), Operand::Value(_)) => Err(QueryError::MalformedExpression(
                "comparison needs at least one column operand".to_string(),
            )),
        }
    }

    fn emit_column_value(&mut self, column: &ColumnRef, op: CompareOp, value: &DataValue) -> QueryResult<()> {
        let column = self.scope.resolve(column)?;
        if value.is_null() {
            let test = match op {
                CompareOp::Eq => "IS NULL",
                CompareOp::Ne => "IS NOT NULL",
                _ => {
                    return Err(QueryError::MalformedExpression(format!(
                        "{} {} NULL is not a valid comparison",
                        column,
                        op.sql()
                    )));
                }
            };
            self.sql.push_str(&format!("({} {})", column, test));
        } else {
            self.sql.push_str(&format!("({} {} ?)", column, op.sql()));
            self.params.push(value.clone());
        }
        Ok(())
    }

    fn emit_in(&mut self, column: &ColumnRef, values: &[DataValue], negated: bool) -> QueryResult<()> {
        let column = self.scope.resolve(column)?;
        if values.is_empty() {
            self.sql.push_str(if negated { "(1 = 1)" } else { "(1 = 0)" });
            return Ok(());
        }
        let placeholders = vec!["?"; values.len()].join(", ");
        let keyword = if negated { "NOT IN" } else { "IN" };
        self.sql.push_str(&format!("({} {} ({}))", column, keyword, placeholders));
        self.params.extend(values.iter().cloned());
        Ok(())
    }

    fn emit_pattern(&mut self, column: &ColumnRef, pattern: &PatternMatch) -> QueryResult<()> {
        let column = self.scope.resolve(column)?;
        let (target, text) = if pattern.case_insensitive {
            (format!("lower({})", column), pattern.text.to_ascii_lowercase())
        } else {
            (column, pattern.text.clone())
        };
        let test = format!("({} GLOB ?)", target);
        if pattern.negated {
            self.sql.push_str(&format!("(NOT {})", test));
        } else {
            self.sql.push_str(&test);
        }
        self.params.push(DataValue::Text(glob_pattern(pattern.kind, &text)));
        Ok(())
    }
}

/// Build a GLOB pattern matching `text` literally at the position `kind` asks for
pub fn glob_pattern(kind: PatternKind, text: &str) -> String {
    let mut literal = String::with_capacity(text.len() + 2);
    for ch in text.chars() {
        match ch {
            '*' | '?' | '[' => {
                literal.push('[');
                literal.push(ch);
                literal.push(']');
            }
            _ => literal.push(ch),
        }
    }
    match kind {
        PatternKind::Contains => format!("*{}*", literal),
        PatternKind::StartsWith => format!("{}*", literal),
        PatternKind::EndsWith => format!("*{}", literal),
    }
}
