// Query Result Implementation
//
// This module defines the value, row and error types shared by the whole pipeline.

use std::fmt;
use std::hash::{Hash, Hasher};

use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use thiserror::Error;

/// A scalar as the storage engine sees it
#[derive(Debug, Clone)]
pub enum DataValue {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
    Blob(Vec<u8>),
}

// Floats are keyed by normalized bits: both zeros are one key and every NaN is one key
fn float_key(f: f64) -> u64 {
    if f == 0.0 {
        0
    } else if f.is_nan() {
        f64::NAN.to_bits()
    } else {
        f.to_bits()
    }
}

impl PartialEq for DataValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (DataValue::Null, DataValue::Null) => true,
            (DataValue::Integer(a), DataValue::Integer(b)) => a == b,
            (DataValue::Float(a), DataValue::Float(b)) => float_key(*a) == float_key(*b),
            (DataValue::Text(a), DataValue::Text(b)) => a == b,
            (DataValue::Blob(a), DataValue::Blob(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for DataValue {}

impl Hash for DataValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            DataValue::Null => 0.hash(state),
            DataValue::Integer(i) => { 1.hash(state); i.hash(state); }
            DataValue::Float(f) => { 2.hash(state); float_key(*f).hash(state); }
            DataValue::Text(s) => { 3.hash(state); s.hash(state); }
            DataValue::Blob(b) => { 4.hash(state); b.hash(state); }
        }
    }
}

impl fmt::Display for DataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataValue::Null => write!(f, "NULL"),
            DataValue::Integer(i) => write!(f, "{}", i),
            DataValue::Float(fl) => write!(f, "{}", fl),
            DataValue::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
            DataValue::Blob(b) => write!(f, "X'{}'", hex::encode(b)),
        }
    }
}

impl DataValue {
    pub fn is_null(&self) -> bool {
        matches!(self, DataValue::Null)
    }

    /// Storage class name, used in decoding diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            DataValue::Null => "NULL",
            DataValue::Integer(_) => "INTEGER",
            DataValue::Float(_) => "REAL",
            DataValue::Text(_) => "TEXT",
            DataValue::Blob(_) => "BLOB",
        }
    }

    pub(crate) fn from_value_ref(value: ValueRef<'_>) -> QueryResult<Self> {
        Ok(match value {
            ValueRef::Null => DataValue::Null,
            ValueRef::Integer(i) => DataValue::Integer(i),
            ValueRef::Real(f) => DataValue::Float(f),
            ValueRef::Text(bytes) => DataValue::Text(
                String::from_utf8(bytes.to_vec())
                    .map_err(|e| QueryError::DecodingError(format!("Invalid UTF-8 in TEXT value: {}", e)))?,
            ),
            ValueRef::Blob(bytes) => DataValue::Blob(bytes.to_vec()),
        })
    }
}

impl ToSql for DataValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::Borrowed(match self {
            DataValue::Null => ValueRef::Null,
            DataValue::Integer(i) => ValueRef::Integer(*i),
            DataValue::Float(f) => ValueRef::Real(*f),
            DataValue::Text(s) => ValueRef::Text(s.as_bytes()),
            DataValue::Blob(b) => ValueRef::Blob(b),
        }))
    }
}

impl From<i64> for DataValue {
    fn from(value: i64) -> Self {
        DataValue::Integer(value)
    }
}

impl From<i32> for DataValue {
    fn from(value: i32) -> Self {
        DataValue::Integer(value as i64)
    }
}

impl From<f64> for DataValue {
    fn from(value: f64) -> Self {
        DataValue::Float(value)
    }
}

impl From<bool> for DataValue {
    fn from(value: bool) -> Self {
        DataValue::Integer(value as i64)
    }
}

impl From<&str> for DataValue {
    fn from(value: &str) -> Self {
        DataValue::Text(value.to_string())
    }
}

impl From<String> for DataValue {
    fn from(value: String) -> Self {
        DataValue::Text(value)
    }
}

impl From<Vec<u8>> for DataValue {
    fn from(value: Vec<u8>) -> Self {
        DataValue::Blob(value)
    }
}

impl From<uuid::Uuid> for DataValue {
    fn from(value: uuid::Uuid) -> Self {
        DataValue::Text(value.hyphenated().to_string())
    }
}

impl<T: Into<DataValue>> From<Option<T>> for DataValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(DataValue::Null, Into::into)
    }
}

/// One raw result row: values by column position
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultRow {
    values: Vec<DataValue>,
}

impl ResultRow {
    pub fn new(values: Vec<DataValue>) -> Self {
        ResultRow { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get a value by column position
    pub fn get(&self, index: usize) -> Option<&DataValue> {
        self.values.get(index)
    }

    pub fn values(&self) -> &[DataValue] {
        &self.values
    }

    /// Column values in `range`, or a decoding error when the row is too short
    pub fn slice(&self, start: usize, len: usize) -> QueryResult<&[DataValue]> {
        self.values.get(start..start + len).ok_or_else(|| {
            QueryError::DecodingError(format!(
                "Row has {} columns, expected at least {}",
                self.values.len(),
                start + len
            ))
        })
    }

    pub fn into_values(self) -> Vec<DataValue> {
        self.values
    }
}

/// Represents query pipeline errors
#[derive(Error, Debug)]
pub enum QueryError {
    /// A shape field cannot be mapped to a column or a to-many relation
    #[error("Unsupported field type: {table}.{field} ({type_name})")]
    UnsupportedFieldType {
        table: String,
        field: String,
        type_name: String,
    },
    /// Reconciling would need a destructive or ambiguous change
    #[error("Schema conflict: {0}")]
    SchemaConflict(String),
    /// The predicate tree or query shape is internally inconsistent
    #[error("Malformed expression: {0}")]
    MalformedExpression(String),
    /// Parameter count does not match placeholder count
    #[error("Binding error: statement has {expected} placeholders but {actual} parameters were supplied")]
    BindingError { expected: usize, actual: usize },
    /// The storage engine rejected a statement
    #[error("Execution error: {source} (statement: {sql})")]
    ExecutionError {
        sql: String,
        #[source]
        source: rusqlite::Error,
    },
    /// A result row does not match the expected record shape
    #[error("Decoding error: {0}")]
    DecodingError(String),
    /// A nested unit failed but its enclosing transaction attempted to commit
    #[error("Transaction error: {0}")]
    TransactionError(String),
}

impl QueryError {
    pub(crate) fn execution(sql: impl Into<String>, source: rusqlite::Error) -> Self {
        QueryError::ExecutionError { sql: sql.into(), source }
    }

    /// The engine's own result code, when this is an execution error
    pub fn sqlite_error_code(&self) -> Option<rusqlite::ErrorCode> {
        match self {
            QueryError::ExecutionError { source, .. } => source.sqlite_error_code(),
            _ => None,
        }
    }
}

/// Result type for query operations
pub type QueryResult<T> = Result<T, QueryError>;
