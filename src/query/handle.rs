//! Table and query handle
//!
//! [`Query`] is the typed entry point for reading and writing one shape. It is
//! an immutable builder: every builder method returns a new query, so a base
//! query can be refined several ways.
//!
//! ```ignore
//! let lars = db.table::<Person>()
//!     .order_by("lastName")
//!     .order_by("firstName")
//!     .join(PHONE_NUMBERS, "id", "personId")?
//!     .order_by_desc("planetCode")
//!     .filter(field::<Person>("lastName").eq("Lars").and(field::<PhoneNumber>("planetCode").eq(12)))
//!     .select()?;
//! ```

use std::sync::Arc;

use log::Level;

use crate::catalog::entity::{Entity, Relation};
use crate::catalog::index::Index;
use crate::catalog::table::Table;
use crate::common::logging::{EventCategory, LogEvent};
use crate::database::Database;
use crate::query::ast::{ColumnRef, Expr};
use crate::query::executor::ddl_executor;
use crate::query::executor::dml_executor::{self, ColumnSelection};
use crate::query::executor::hydrate::{self, Hydrator, RelationLoader, TypedLoader};
use crate::query::executor::result::{QueryError, QueryResult};
use crate::query::planner::{JoinKind, JoinSpec, OrderTerm, Paging, SelectPlan, TableScope};

/// A query over the table backing `T`
pub struct Query<'db, T: Entity> {
    db: &'db Database,
    plan: SelectPlan,
    loaders: Vec<Arc<dyn RelationLoader<T>>>,
}

impl<T: Entity> Clone for Query<'_, T> {
    fn clone(&self) -> Self {
        Query {
            db: self.db,
            plan: self.plan.clone(),
            loaders: self.loaders.clone(),
        }
    }
}

impl<'db, T: Entity> Query<'db, T> {
    pub(crate) fn new(db: &'db Database, table: Arc<Table>) -> Self {
        Query {
            db,
            plan: SelectPlan::new(table),
            loaders: Vec::new(),
        }
    }

    /// Descriptor of the root table
    pub fn table(&self) -> &Arc<Table> {
        &self.plan.root
    }

    pub fn plan(&self) -> &SelectPlan {
        &self.plan
    }

    /// Restrict the query; repeated filters are AND-ed together
    pub fn filter(mut self, expr: Expr) -> Self {
        self.plan.filter = Some(match self.plan.filter.take() {
            Some(existing) => existing.and(expr),
            None => expr,
        });
        self
    }

    // Unqualified order columns belong to the most recently joined table
    fn order_target(&self, column: &str) -> ColumnRef {
        let table = match self.plan.joins.last() {
            Some(join) => join.child.name(),
            None => self.plan.root.name(),
        };
        ColumnRef { table: Some(table.to_string()), column: column.to_string() }
    }

    pub fn order_by(mut self, column: &str) -> Self {
        let column = self.order_target(column);
        self.plan.order.push(OrderTerm { column, descending: false });
        self
    }

    pub fn order_by_desc(mut self, column: &str) -> Self {
        let column = self.order_target(column);
        self.plan.order.push(OrderTerm { column, descending: true });
        self
    }

    /// Return at most `limit` records after skipping `skip`
    pub fn limit(mut self, limit: u64, skip: u64) -> Self {
        self.plan.paging = Some(Paging { limit: Some(limit), skip });
        self
    }

    /// Skip the first `skip` records without bounding the result
    pub fn skip(mut self, skip: u64) -> Self {
        let limit = self.plan.paging.and_then(|p| p.limit);
        self.plan.paging = Some(Paging { limit, skip });
        self
    }

    /// Load `relation` through `root.on = child.equals`
    pub fn join<C: Entity>(self, relation: Relation<T, C>, on: &str, equals: &str) -> QueryResult<Self> {
        let child = Table::resolve::<C>()?;
        let spec = JoinSpec {
            relation: relation.name(),
            child: child.clone(),
            kind: JoinKind::Direct {
                parent_key: on.to_string(),
                child_key: equals.to_string(),
            },
        };
        self.push_join(spec, Arc::new(TypedLoader::new(relation, child, 0)))
    }

    /// Load `relation` through pivot table `V`:
    /// `root.on = pivot.equals` and `child.and = pivot.is`
    pub fn join_pivot<V: Entity, C: Entity>(
        self,
        relation: Relation<T, C>,
        on: &str,
        equals: &str,
        and: &str,
        is: &str,
    ) -> QueryResult<Self> {
        let pivot = Table::resolve::<V>()?;
        let child = Table::resolve::<C>()?;
        let pivot_width = pivot.columns().len();
        let spec = JoinSpec {
            relation: relation.name(),
            child: child.clone(),
            kind: JoinKind::Pivot {
                pivot,
                parent_key: on.to_string(),
                pivot_parent_key: equals.to_string(),
                child_key: and.to_string(),
                pivot_child_key: is.to_string(),
            },
        };
        self.push_join(spec, Arc::new(TypedLoader::new(relation, child, pivot_width)))
    }

    fn push_join(mut self, spec: JoinSpec, loader: Arc<dyn RelationLoader<T>>) -> QueryResult<Self> {
        spec.validate(&self.plan.root)?;
        spec.check_unambiguous(&self.plan.scope())?;
        self.plan.joins.push(spec);
        self.loaders.push(loader);
        Ok(self)
    }

    /// Run the query and decode every matching record
    pub fn select(&self) -> QueryResult<Vec<T>> {
        let statement = self.plan.select_statement()?;
        let engine = self.db.engine();

        if self.loaders.is_empty() {
            let mut records = Vec::new();
            engine.query_each(&statement, |row| {
                records.push(hydrate::decode_one::<T>(&self.plan.root, row.values())?);
                Ok(())
            })?;
            return Ok(records);
        }

        let mut hydrator = Hydrator::new(&self.plan.root, &self.loaders);
        engine.query_each(&statement, |row| hydrator.push(row))?;
        let records = hydrator.finish()?;
        Ok(match self.plan.record_paging() {
            Some(paging) => paging.apply(records),
            None => records,
        })
    }

    /// The first matching record, if any
    pub fn first(&self) -> QueryResult<Option<T>> {
        let mut narrowed = self.clone();
        let paging = self.plan.paging.unwrap_or_default();
        narrowed.plan.paging = Some(Paging {
            limit: Some(paging.limit.map_or(1, |l| l.min(1))),
            skip: paging.skip,
        });
        Ok(narrowed.select()?.into_iter().next())
    }

    /// Number of records `select` would return
    pub fn count(&self) -> QueryResult<u64> {
        let n = self.db.engine().query_scalar(&self.plan.count_statement()?)?;
        u64::try_from(n).map_err(|_| QueryError::DecodingError(format!("negative count {}", n)))
    }

    /// Insert every record; the batch is all-or-nothing
    pub fn insert(&self, records: &[T]) -> QueryResult<usize> {
        self.insert_selected(records, ColumnSelection::All)
    }

    /// Insert leaving `ignored` columns to their defaults
    pub fn insert_ignoring(&self, records: &[T], ignored: &[&str]) -> QueryResult<usize> {
        self.insert_selected(records, ColumnSelection::Ignoring(ignored))
    }

    /// Insert writing only the `only` columns
    pub fn insert_only(&self, records: &[T], only: &[&str]) -> QueryResult<usize> {
        self.insert_selected(records, ColumnSelection::Only(only))
    }

    fn insert_selected(&self, records: &[T], selection: ColumnSelection<'_>) -> QueryResult<usize> {
        let table = &self.plan.root;
        let positions = dml_executor::column_positions(table, selection)?;
        self.db.run_in_transaction(|| {
            let mut inserted = 0;
            for record in records {
                let statement = dml_executor::insert_statement(table, &positions, &record.to_row())?;
                inserted += self.db.engine().execute(&statement)?;
            }
            Ok(inserted)
        })
    }

    /// Overwrite every column of the matching rows with `record`'s values
    pub fn update(&self, record: &T) -> QueryResult<usize> {
        self.update_selected(record, ColumnSelection::All)
    }

    /// Overwrite only the `only` columns of the matching rows
    pub fn update_only(&self, record: &T, only: &[&str]) -> QueryResult<usize> {
        self.update_selected(record, ColumnSelection::Only(only))
    }

    fn update_selected(&self, record: &T, selection: ColumnSelection<'_>) -> QueryResult<usize> {
        self.reject_joins("update")?;
        let table = &self.plan.root;
        let positions = dml_executor::column_positions(table, selection)?;
        let statement = dml_executor::update_statement(
            table,
            &positions,
            &record.to_row(),
            &TableScope::new(table.clone()),
            self.plan.filter.as_ref(),
        )?;
        self.db.engine().execute(&statement)
    }

    /// Delete the matching rows
    pub fn delete(&self) -> QueryResult<usize> {
        self.reject_joins("delete")?;
        let table = &self.plan.root;
        let statement = dml_executor::delete_statement(
            table,
            &TableScope::new(table.clone()),
            self.plan.filter.as_ref(),
        )?;
        self.db.engine().execute(&statement)
    }

    fn reject_joins(&self, operation: &str) -> QueryResult<()> {
        if self.plan.joins.is_empty() {
            Ok(())
        } else {
            Err(QueryError::MalformedExpression(format!(
                "{} cannot be applied to a joined query",
                operation
            )))
        }
    }

    /// Create an index over `columns` unless one of the same name exists
    pub fn index(&self, columns: &[&str], unique: bool) -> QueryResult<Index> {
        let index = Index::new(&self.plan.root, columns, unique)?;
        self.db.engine().execute(&ddl_executor::create_index(&index))?;
        self.db.engine().emit(LogEvent::new(
            Level::Info,
            EventCategory::Ddl,
            format!("created index {}", index.name()),
        ));
        Ok(index)
    }
}
