//! Table Descriptor Module
//!
//! This module defines the Table type that describes how one shape is laid out
//! in storage, and resolves it from an [`Entity`] field list.

use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::column::{Column, quote_ident};
use super::entity::{Entity, FieldKind};
use super::DESCRIPTOR_CACHE;
use crate::query::executor::result::{QueryError, QueryResult};

/// A field that is stored in another table and loaded through a join
#[derive(Debug, Clone)]
pub struct RelationField {
    /// Field name on the parent shape
    pub name: String,
    /// Descriptor of the child table
    pub descriptor: fn() -> QueryResult<Arc<Table>>,
}

/// Represents a table descriptor
#[derive(Debug, Clone)]
pub struct Table {
    /// Table name
    name: String,
    /// Stored columns, in shape field order
    columns: Vec<Column>,
    /// Column name to index lookup
    column_map: HashMap<String, usize>,
    /// Primary key column indices
    primary_key_columns: Vec<usize>,
    /// To-many relation fields, excluded from the column list
    relations: Vec<RelationField>,
}

impl Table {
    /// Build a descriptor from explicit columns. Primary key flags on the
    /// columns decide the key.
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> QueryResult<Self> {
        let name = name.into();
        let mut column_map = HashMap::new();
        let mut primary_key_columns = Vec::new();

        for (i, col) in columns.iter().enumerate() {
            if column_map.insert(col.name().to_string(), i).is_some() {
                return Err(QueryError::UnsupportedFieldType {
                    table: name,
                    field: col.name().to_string(),
                    type_name: "duplicate column".to_string(),
                });
            }
            if col.is_primary_key() {
                primary_key_columns.push(i);
            }
        }

        Ok(Table {
            name,
            columns,
            column_map,
            primary_key_columns,
            relations: Vec::new(),
        })
    }

    /// Resolve the descriptor for `E`, reusing the cached one when present
    pub fn resolve<E: Entity>() -> QueryResult<Arc<Table>> {
        let key = TypeId::of::<E>();
        if let Some(table) = DESCRIPTOR_CACHE.read().get(&key) {
            return Ok(table.clone());
        }
        let table = Arc::new(Self::describe::<E>(E::PRIMARY_KEY)?);
        DESCRIPTOR_CACHE.write().insert(key, table.clone());
        Ok(table)
    }

    /// Resolve the descriptor for `E` with an explicit primary key. Not cached.
    pub fn resolve_with_primary_key<E: Entity>(primary_key: &[&str]) -> QueryResult<Arc<Table>> {
        Self::describe::<E>(primary_key).map(Arc::new)
    }

    fn describe<E: Entity>(primary_key: &[&str]) -> QueryResult<Table> {
        let table_name = E::table_name();
        let mut columns = Vec::new();
        let mut relations = Vec::new();
        let mut seen = HashSet::new();

        for field in E::fields() {
            if !seen.insert(field.name) {
                return Err(QueryError::UnsupportedFieldType {
                    table: table_name.to_string(),
                    field: field.name.to_string(),
                    type_name: "duplicate field".to_string(),
                });
            }
            match field.kind {
                FieldKind::Column { data_type, nullable } => {
                    columns.push(Column::new(field.name, data_type, nullable, false));
                }
                FieldKind::ToMany { descriptor } => relations.push(RelationField {
                    name: field.name.to_string(),
                    descriptor,
                }),
                FieldKind::Embedded { type_name } => {
                    return Err(QueryError::UnsupportedFieldType {
                        table: table_name.to_string(),
                        field: field.name.to_string(),
                        type_name: type_name.to_string(),
                    });
                }
            }
        }

        let key_names: Vec<&str> = if primary_key.is_empty() {
            columns.iter().map(|c| c.name()).filter(|n| *n == "id").collect()
        } else {
            primary_key.to_vec()
        };
        let key_names: Vec<String> = key_names.into_iter().map(str::to_string).collect();
        for key in &key_names {
            match columns.iter_mut().find(|c| c.name() == key) {
                Some(column) => column.set_primary_key(true),
                None => {
                    return Err(QueryError::UnsupportedFieldType {
                        table: table_name.to_string(),
                        field: key.clone(),
                        type_name: "primary key is not a column field".to_string(),
                    });
                }
            }
        }

        let mut table = Table::new(table_name, columns)?;
        table.relations = relations;
        Ok(table)
    }

    /// Get the table name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get all columns
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Get a column by name
    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.column_map.get(name).map(|&idx| &self.columns[idx])
    }

    /// Check if the table has a column with the given name
    pub fn has_column(&self, name: &str) -> bool {
        self.column_map.contains_key(name)
    }

    /// Get the column index for a column name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.column_map.get(name).copied()
    }

    /// Get primary key columns
    pub fn primary_key_columns(&self) -> Vec<&Column> {
        self.primary_key_columns.iter()
            .map(|&idx| &self.columns[idx])
            .collect()
    }

    /// Positions of the primary key columns
    pub fn primary_key_indices(&self) -> &[usize] {
        &self.primary_key_columns
    }

    /// To-many relation fields
    pub fn relations(&self) -> &[RelationField] {
        &self.relations
    }

    /// The `CREATE TABLE` statement for this descriptor
    pub fn create_sql(&self) -> String {
        let inline_key = self.primary_key_columns.len() == 1;
        let mut defs: Vec<String> = self.columns.iter()
            .map(|col| col.definition_sql(inline_key))
            .collect();
        if self.primary_key_columns.len() > 1 {
            let keys: Vec<String> = self.primary_key_columns().iter()
                .map(|c| quote_ident(c.name()))
                .collect();
            defs.push(format!("PRIMARY KEY ({})", keys.join(", ")));
        }
        format!("CREATE TABLE {} ({})", quote_ident(&self.name), defs.join(", "))
    }
}
