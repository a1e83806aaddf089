//! Shape Description Module
//!
//! Persistable types describe themselves through [`Entity`]: an ordered field
//! list, conversion of a record into column values, and positional decoding of
//! a row back into a record. Nothing here is discovered at runtime.

use std::marker::PhantomData;
use std::sync::Arc;

use crate::catalog::schema::DataType;
use crate::catalog::table::Table;
use crate::catalog::value::ColumnType;
use crate::query::executor::result::{DataValue, QueryError, QueryResult};

/// How a declared field maps onto storage
#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    /// A single column
    Column { data_type: DataType, nullable: bool },
    /// A collection of related records stored in their own table
    ToMany { descriptor: fn() -> QueryResult<Arc<Table>> },
    /// A single nested record; not representable as a column
    Embedded { type_name: &'static str },
}

/// One declared field of a shape
#[derive(Debug, Clone, Copy)]
pub struct FieldDef {
    pub name: &'static str,
    pub kind: FieldKind,
}

impl FieldDef {
    /// A scalar column whose type and nullability follow `T`
    pub fn column<T: ColumnType>(name: &'static str) -> Self {
        FieldDef {
            name,
            kind: FieldKind::Column {
                data_type: T::DATA_TYPE,
                nullable: T::NULLABLE,
            },
        }
    }

    /// A to-many relation to records of `C`
    pub fn to_many<C: Entity>(name: &'static str) -> Self {
        FieldDef {
            name,
            kind: FieldKind::ToMany { descriptor: Table::resolve::<C> },
        }
    }

    /// A single nested record of `C`
    pub fn embedded<C: Entity>(name: &'static str) -> Self {
        FieldDef {
            name,
            kind: FieldKind::Embedded { type_name: std::any::type_name::<C>() },
        }
    }
}

/// A record type that can be persisted in one table
///
/// `to_row` yields one value per column field, in `fields()` order, and
/// `from_row` reads them back in the same order. Relation fields are left
/// empty by `from_row`; joins fill them in.
pub trait Entity: Sized + 'static {
    /// Explicit primary key columns. Empty means a field named `id`, if any.
    const PRIMARY_KEY: &'static [&'static str] = &[];

    /// Name of the backing table
    fn table_name() -> &'static str {
        let full = std::any::type_name::<Self>();
        let base = full.split('<').next().unwrap_or(full);
        base.rsplit("::").next().unwrap_or(base)
    }

    fn fields() -> Vec<FieldDef>;

    fn to_row(&self) -> Vec<DataValue>;

    fn from_row(row: &mut RowReader<'_>) -> QueryResult<Self>;
}

/// Sequential reader over the column values that belong to one record
pub struct RowReader<'a> {
    table: &'a str,
    columns: &'a [crate::catalog::column::Column],
    values: std::slice::Iter<'a, DataValue>,
    position: usize,
}

impl<'a> RowReader<'a> {
    pub(crate) fn new(table: &'a Table, values: &'a [DataValue]) -> Self {
        RowReader {
            table: table.name(),
            columns: table.columns(),
            values: values.iter(),
            position: 0,
        }
    }

    /// Decode the next column as `T`
    pub fn next<T: ColumnType>(&mut self) -> QueryResult<T> {
        let column = self.columns.get(self.position).map(|c| c.name()).unwrap_or("?");
        let value = self.values.next().cloned().ok_or_else(|| {
            QueryError::DecodingError(format!(
                "{}: row ended before column {} ({})",
                self.table, self.position, column
            ))
        })?;
        let decoded = T::from_value(value).map_err(|e| match e {
            QueryError::DecodingError(msg) => {
                QueryError::DecodingError(format!("{}.{}: {}", self.table, column, msg))
            }
            other => other,
        })?;
        self.position += 1;
        Ok(decoded)
    }

    pub(crate) fn remaining(&self) -> usize {
        self.values.len()
    }
}

/// A to-many slot on `P` holding records of `C`
pub struct Relation<P, C> {
    name: &'static str,
    slot: fn(&mut P) -> &mut Option<Vec<C>>,
    _marker: PhantomData<fn(P, C)>,
}

impl<P, C> Clone for Relation<P, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<P, C> Copy for Relation<P, C> {}

impl<P: Entity, C: Entity> Relation<P, C> {
    pub const fn new(name: &'static str, slot: fn(&mut P) -> &mut Option<Vec<C>>) -> Self {
        Relation {
            name,
            slot,
            _marker: PhantomData,
        }
    }

    /// Field name of the relation on the parent shape
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn assign(&self, parent: &mut P, children: Vec<C>) {
        *(self.slot)(parent) = Some(children);
    }
}
