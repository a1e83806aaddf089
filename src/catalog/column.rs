// Column Management Module
//
// This module defines the Column type that describes one stored field of a shape.

use super::schema::DataType;

/// Represents a column in a table descriptor
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Column name
    name: String,
    /// Logical data type
    data_type: DataType,
    /// Whether this column can contain NULL values
    nullable: bool,
    /// Whether this column is part of the primary key
    primary_key: bool,
}

impl Column {
    /// Create a new column
    pub fn new(name: impl Into<String>, data_type: DataType, nullable: bool, primary_key: bool) -> Self {
        Column {
            name: name.into(),
            data_type,
            nullable,
            primary_key,
        }
    }

    /// Get the column name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the column data type
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Check if the column can contain NULL values
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// Check if the column is part of the primary key
    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    pub(crate) fn set_primary_key(&mut self, primary_key: bool) {
        self.primary_key = primary_key;
    }

    /// Column definition as used inside `CREATE TABLE` and `ADD COLUMN`
    pub fn definition_sql(&self, inline_primary_key: bool) -> String {
        let mut sql = format!("{} {}", quote_ident(&self.name), self.data_type.storage_type());
        if inline_primary_key && self.primary_key {
            sql.push_str(" PRIMARY KEY");
        }
        if !self.nullable {
            sql.push_str(" NOT NULL");
        }
        sql
    }
}

/// Quote an identifier for the target dialect
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
