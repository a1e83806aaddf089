// Row Decoder / Hydrator
//
// Plain queries decode each row into one record. Joined queries group rows by
// the root record's identity in first-seen order and collect each relation's
// distinct children before decoding.

use std::sync::Arc;

use linked_hash_map::LinkedHashMap;

use crate::catalog::entity::{Entity, Relation, RowReader};
use crate::catalog::table::Table;
use crate::query::executor::result::{DataValue, QueryError, QueryResult, ResultRow};

/// Decodes the children of one relation and stores them on the parent
pub trait RelationLoader<P>: Send + Sync {
    fn child_table(&self) -> &Arc<Table>;

    /// Columns of the pivot table that precede the child columns, if any
    fn pivot_width(&self) -> usize;

    fn load(&self, parent: &mut P, rows: Vec<Vec<DataValue>>) -> QueryResult<()>;
}

/// Loader for a typed relation slot
pub struct TypedLoader<P, C> {
    relation: Relation<P, C>,
    child: Arc<Table>,
    pivot_width: usize,
}

impl<P: Entity, C: Entity> TypedLoader<P, C> {
    pub fn new(relation: Relation<P, C>, child: Arc<Table>, pivot_width: usize) -> Self {
        TypedLoader { relation, child, pivot_width }
    }
}

impl<P: Entity, C: Entity> RelationLoader<P> for TypedLoader<P, C> {
    fn child_table(&self) -> &Arc<Table> {
        &self.child
    }

    fn pivot_width(&self) -> usize {
        self.pivot_width
    }

    fn load(&self, parent: &mut P, rows: Vec<Vec<DataValue>>) -> QueryResult<()> {
        let children = rows.iter()
            .map(|values| decode_one::<C>(&self.child, values))
            .collect::<QueryResult<Vec<C>>>()?;
        self.relation.assign(parent, children);
        Ok(())
    }
}

/// Decode one record, requiring every value to be consumed
pub fn decode_one<T: Entity>(table: &Table, values: &[DataValue]) -> QueryResult<T> {
    if values.len() != table.columns().len() {
        return Err(QueryError::DecodingError(format!(
            "{} has {} columns but the row carries {}",
            table.name(),
            table.columns().len(),
            values.len()
        )));
    }
    let mut reader = RowReader::new(table, values);
    let record = T::from_row(&mut reader)?;
    if reader.remaining() != 0 {
        return Err(QueryError::DecodingError(format!(
            "{} left {} columns unread",
            table.name(),
            reader.remaining()
        )));
    }
    Ok(record)
}

/// Identity of a record: its key values, or every value when keyless
fn identity(table: &Table, values: &[DataValue]) -> Vec<DataValue> {
    let key = table.primary_key_indices();
    if key.is_empty() {
        values.to_vec()
    } else {
        key.iter().map(|&i| values[i].clone()).collect()
    }
}

struct Group {
    root: Vec<DataValue>,
    // One entry per relation: child identity -> child values
    children: Vec<LinkedHashMap<Vec<DataValue>, Vec<DataValue>>>,
}

/// Accumulates joined rows and produces hydrated root records
pub struct Hydrator<'a, T> {
    root: &'a Table,
    loaders: &'a [Arc<dyn RelationLoader<T>>],
    groups: LinkedHashMap<Vec<DataValue>, Group>,
}

impl<'a, T: Entity> Hydrator<'a, T> {
    pub fn new(root: &'a Table, loaders: &'a [Arc<dyn RelationLoader<T>>]) -> Self {
        Hydrator { root, loaders, groups: LinkedHashMap::new() }
    }

    /// Fold one joined row into its root group
    pub fn push(&mut self, row: ResultRow) -> QueryResult<()> {
        let root_width = self.root.columns().len();
        let root_values = row.slice(0, root_width)?;
        let key = identity(self.root, root_values);

        let relations = self.loaders.len();
        let group = self.groups.entry(key).or_insert_with(|| Group {
            root: root_values.to_vec(),
            children: (0..relations).map(|_| LinkedHashMap::new()).collect(),
        });

        let mut offset = root_width;
        for (loader, seen) in self.loaders.iter().zip(group.children.iter_mut()) {
            offset += loader.pivot_width();
            let child = loader.child_table();
            let width = child.columns().len();
            let values = row.slice(offset, width)?;
            seen.entry(identity(child, values)).or_insert_with(|| values.to_vec());
            offset += width;
        }

        if offset != row.len() {
            return Err(QueryError::DecodingError(format!(
                "joined row has {} columns, layout covers {}",
                row.len(),
                offset
            )));
        }
        Ok(())
    }

    pub fn finish(self) -> QueryResult<Vec<T>> {
        let mut records = Vec::with_capacity(self.groups.len());
        for (_, group) in self.groups {
            let mut record = decode_one::<T>(self.root, &group.root)?;
            for (loader, children) in self.loaders.iter().zip(group.children) {
                loader.load(&mut record, children.into_iter().map(|(_, v)| v).collect())?;
            }
            records.push(record);
        }
        Ok(records)
    }
}
