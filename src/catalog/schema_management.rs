//! Schema Reconciliation
//!
//! Brings the live schema in line with a table descriptor under a
//! caller-chosen [`Policy`]. Only additive changes are ever applied in place;
//! anything destructive is reported as [`QueryError::SchemaConflict`].

use std::collections::HashSet;
use std::ops::{BitOr, BitOrAssign};

use log::Level;

use crate::catalog::table::Table;
use crate::common::logging::{EventCategory, LogEvent};
use crate::query::executor::ddl_executor;
use crate::query::executor::engine::ExecutionEngine;
use crate::query::executor::result::{DataValue, QueryError, QueryResult};
use crate::transaction::TransactionManager;

/// Flags governing a schema operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Policy(u8);

impl Policy {
    /// Create the table only if it is absent
    pub const DEFAULT: Policy = Policy(0);
    /// Drop the table if present, then create it fresh
    pub const DROP_TABLE: Policy = Policy(1);
    /// Create if absent, otherwise add missing columns
    pub const RECONCILE_TABLE: Policy = Policy(1 << 1);
    /// Leave relation tables alone
    pub const SHALLOW: Policy = Policy(1 << 2);

    pub const fn contains(self, other: Policy) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Policy {
    type Output = Policy;

    fn bitor(self, rhs: Policy) -> Policy {
        Policy(self.0 | rhs.0)
    }
}

impl BitOrAssign for Policy {
    fn bitor_assign(&mut self, rhs: Policy) {
        self.0 |= rhs.0;
    }
}

/// A column as it exists in the storage engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveColumn {
    pub name: String,
    pub declared_type: String,
    pub not_null: bool,
    /// 1-based position in the primary key, 0 when not a key column
    pub primary_key_position: i64,
}

/// Applies table descriptors to the live schema
pub struct SchemaReconciler<'a> {
    engine: &'a ExecutionEngine,
    transactions: &'a TransactionManager,
}

impl<'a> SchemaReconciler<'a> {
    pub fn new(engine: &'a ExecutionEngine, transactions: &'a TransactionManager) -> Self {
        SchemaReconciler { engine, transactions }
    }

    pub fn table_exists(&self, table_name: &str) -> QueryResult<bool> {
        Ok(self.engine.query_scalar(&ddl_executor::table_exists(table_name))? > 0)
    }

    /// Read the live column set of `table_name`; empty when the table is absent
    pub fn live_columns(&self, table_name: &str) -> QueryResult<Vec<LiveColumn>> {
        let rows = self.engine.query(&ddl_executor::table_info(table_name))?;
        rows.into_iter()
            .map(|row| match row.values() {
                [DataValue::Text(name), declared, DataValue::Integer(not_null), DataValue::Integer(pk)] => {
                    Ok(LiveColumn {
                        name: name.clone(),
                        declared_type: match declared {
                            DataValue::Text(t) => t.clone(),
                            _ => String::new(),
                        },
                        not_null: *not_null != 0,
                        primary_key_position: *pk,
                    })
                }
                other => Err(QueryError::DecodingError(format!(
                    "unexpected table_info row for {}: {:?}",
                    table_name, other
                ))),
            })
            .collect()
    }

    /// Create or reconcile `table` (and, unless shallow, its relation tables)
    /// as one atomic unit
    pub fn create_or_reconcile(&self, table: &Table, policy: Policy) -> QueryResult<()> {
        self.transactions.run(self.engine, || {
            let mut visited = HashSet::new();
            self.apply(table, policy, &mut visited)
        })
    }

    fn apply(&self, table: &Table, policy: Policy, visited: &mut HashSet<String>) -> QueryResult<()> {
        if !visited.insert(table.name().to_string()) {
            return Ok(());
        }

        if policy.contains(Policy::DROP_TABLE) {
            self.engine.execute(&ddl_executor::drop_table(table.name()))?;
            self.engine.execute(&ddl_executor::create_table(table))?;
            self.note(format!("recreated table {}", table.name()));
        } else if !self.table_exists(table.name())? {
            self.engine.execute(&ddl_executor::create_table(table))?;
            self.note(format!("created table {}", table.name()));
        } else if policy.contains(Policy::RECONCILE_TABLE) {
            self.reconcile(table)?;
        }

        if !policy.contains(Policy::SHALLOW) {
            for relation in table.relations() {
                let child = (relation.descriptor)()?;
                self.apply(&child, policy, visited)?;
            }
        }
        Ok(())
    }

    fn reconcile(&self, table: &Table) -> QueryResult<()> {
        let live = self.live_columns(table.name())?;
        let find = |name: &str| live.iter().find(|l| l.name.eq_ignore_ascii_case(name));

        let live_keys: HashSet<String> = live.iter()
            .filter(|l| l.primary_key_position > 0)
            .map(|l| l.name.to_ascii_lowercase())
            .collect();
        let wanted_keys: HashSet<String> = table.primary_key_columns().iter()
            .map(|c| c.name().to_ascii_lowercase())
            .collect();
        if live_keys != wanted_keys {
            return Err(QueryError::SchemaConflict(format!(
                "primary key of {} differs from the live table",
                table.name()
            )));
        }

        let mut missing = Vec::new();
        for column in table.columns() {
            match find(column.name()) {
                Some(existing) if !column.data_type().matches_declared(&existing.declared_type) => {
                    return Err(QueryError::SchemaConflict(format!(
                        "{}.{} is declared {} but the shape needs {}",
                        table.name(),
                        column.name(),
                        existing.declared_type,
                        column.data_type().storage_type()
                    )));
                }
                Some(existing) if existing.not_null == column.is_nullable() && !column.is_primary_key() => {
                    return Err(QueryError::SchemaConflict(format!(
                        "{}.{} is {} in the live table but the shape needs it {}",
                        table.name(),
                        column.name(),
                        if existing.not_null { "NOT NULL" } else { "nullable" },
                        if column.is_nullable() { "nullable" } else { "NOT NULL" }
                    )));
                }
                Some(_) => {}
                None if !column.is_nullable() => {
                    return Err(QueryError::SchemaConflict(format!(
                        "cannot add non-null column {}.{} to an existing table",
                        table.name(),
                        column.name()
                    )));
                }
                None => missing.push(column),
            }
        }

        for column in &missing {
            self.engine.execute(&ddl_executor::add_column(table.name(), column))?;
        }
        if !missing.is_empty() {
            let names: Vec<&str> = missing.iter().map(|c| c.name()).collect();
            self.note(format!("reconciled table {}: added {}", table.name(), names.join(", ")));
        }
        Ok(())
    }

    fn note(&self, message: String) {
        self.engine.emit(LogEvent::new(Level::Info, EventCategory::Ddl, message));
    }
}
