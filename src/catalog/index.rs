// Index Descriptor Module
//
// Indexes are only ever created on explicit request; nothing derives them.

use super::column::quote_ident;
use super::table::Table;
use crate::query::executor::result::{QueryError, QueryResult};

/// Represents an index over one or more columns of a table
#[derive(Debug, Clone, PartialEq)]
pub struct Index {
    /// Indexed table
    table: String,
    /// Indexed columns, in key order
    columns: Vec<String>,
    /// Whether the index enforces uniqueness
    unique: bool,
}

impl Index {
    /// Describe an index, checking the columns against the table descriptor
    pub fn new(table: &Table, columns: &[&str], unique: bool) -> QueryResult<Self> {
        if columns.is_empty() {
            return Err(QueryError::MalformedExpression(format!(
                "index on {} names no columns",
                table.name()
            )));
        }
        for col in columns {
            if !table.has_column(col) {
                return Err(QueryError::MalformedExpression(format!(
                    "cannot index unknown column {}.{}",
                    table.name(),
                    col
                )));
            }
        }
        Ok(Index {
            table: table.name().to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            unique,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    /// Index name: `index_<table>_<col>_<col>...`
    pub fn name(&self) -> String {
        format!("index_{}_{}", self.table, self.columns.join("_"))
    }

    pub fn create_sql(&self) -> String {
        let cols: Vec<String> = self.columns.iter().map(|c| quote_ident(c)).collect();
        format!(
            "CREATE {}INDEX IF NOT EXISTS {} ON {} ({})",
            if self.unique { "UNIQUE " } else { "" },
            quote_ident(&self.name()),
            quote_ident(&self.table),
            cols.join(", ")
        )
    }
}
