// DDL Statement Builder
//
// Produces the schema statements the reconciler issues, and the queries it
// uses to read the live schema back.

use crate::catalog::column::{Column, quote_ident};
use crate::catalog::index::Index;
use crate::catalog::table::Table;
use crate::query::executor::engine::SqlStatement;

pub fn create_table(table: &Table) -> SqlStatement {
    SqlStatement::ddl(table.create_sql())
}

pub fn drop_table(table_name: &str) -> SqlStatement {
    SqlStatement::ddl(format!("DROP TABLE IF EXISTS {}", quote_ident(table_name)))
}

pub fn add_column(table_name: &str, column: &Column) -> SqlStatement {
    SqlStatement::ddl(format!(
        "ALTER TABLE {} ADD COLUMN {}",
        quote_ident(table_name),
        column.definition_sql(false)
    ))
}

pub fn create_index(index: &Index) -> SqlStatement {
    SqlStatement::ddl(index.create_sql())
}

pub fn table_exists(table_name: &str) -> SqlStatement {
    SqlStatement::query(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        vec![table_name.into()],
    )
}

/// Live columns: name, declared type, not-null flag, primary key position
pub fn table_info(table_name: &str) -> SqlStatement {
    SqlStatement::query(
        "SELECT name, type, \"notnull\", pk FROM pragma_table_info(?) ORDER BY cid",
        vec![table_name.into()],
    )
}
