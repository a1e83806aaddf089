//! Catalog Module
//!
//! Resolves shape descriptions into table, column and index descriptors and
//! reconciles them with the live schema inside the storage engine.

pub mod schema;
pub mod column;
pub mod table;
pub mod index;
pub mod entity;
pub mod value;
pub mod schema_management;

// Re-export key types
pub use self::schema::DataType;
pub use self::column::Column;
pub use self::table::{Table, RelationField};
pub use self::index::Index;
pub use self::entity::{Entity, FieldDef, FieldKind, Relation, RowReader};
pub use self::value::ColumnType;
pub use self::schema_management::{LiveColumn, Policy, SchemaReconciler};

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

// Resolved descriptors, one per shape type
static DESCRIPTOR_CACHE: Lazy<RwLock<HashMap<TypeId, Arc<Table>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));
