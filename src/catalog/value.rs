// Field Value Conversion Module
//
// Maps Rust field types onto logical data types and converts them to and from
// stored values.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use uuid::Uuid;

use crate::catalog::schema::DataType;
use crate::query::executor::result::{DataValue, QueryError, QueryResult};

/// A Rust type that can be stored in a single column
pub trait ColumnType: Sized {
    /// Logical type of the column
    const DATA_TYPE: DataType;
    /// Whether the column accepts NULL
    const NULLABLE: bool = false;

    fn to_value(&self) -> DataValue;

    fn from_value(value: DataValue) -> QueryResult<Self>;
}

fn mismatch<T>(expected: DataType, value: &DataValue) -> QueryResult<T> {
    Err(QueryError::DecodingError(format!(
        "expected {} value, found {}",
        expected,
        value.type_name()
    )))
}

macro_rules! integer_column {
    ($($ty:ty),*) => {
        $(
            impl ColumnType for $ty {
                const DATA_TYPE: DataType = DataType::Integer;

                fn to_value(&self) -> DataValue {
                    DataValue::Integer(*self as i64)
                }

                fn from_value(value: DataValue) -> QueryResult<Self> {
                    match value {
                        DataValue::Integer(i) => <$ty>::try_from(i).map_err(|_| {
                            QueryError::DecodingError(format!(
                                "integer {} out of range for {}",
                                i,
                                stringify!($ty)
                            ))
                        }),
                        other => mismatch(Self::DATA_TYPE, &other),
                    }
                }
            }
        )*
    };
}

integer_column!(i8, i16, i32, i64, u8, u16, u32);

impl ColumnType for bool {
    const DATA_TYPE: DataType = DataType::Boolean;

    fn to_value(&self) -> DataValue {
        DataValue::Integer(*self as i64)
    }

    fn from_value(value: DataValue) -> QueryResult<Self> {
        match value {
            DataValue::Integer(i) => Ok(i != 0),
            other => mismatch(Self::DATA_TYPE, &other),
        }
    }
}

impl ColumnType for f64 {
    const DATA_TYPE: DataType = DataType::Float;

    fn to_value(&self) -> DataValue {
        DataValue::Float(*self)
    }

    fn from_value(value: DataValue) -> QueryResult<Self> {
        match value {
            DataValue::Float(f) => Ok(f),
            // REAL affinity hands back integral values as integers
            DataValue::Integer(i) => Ok(i as f64),
            other => mismatch(Self::DATA_TYPE, &other),
        }
    }
}

impl ColumnType for f32 {
    const DATA_TYPE: DataType = DataType::Float;

    fn to_value(&self) -> DataValue {
        DataValue::Float(*self as f64)
    }

    fn from_value(value: DataValue) -> QueryResult<Self> {
        f64::from_value(value).map(|f| f as f32)
    }
}

impl ColumnType for String {
    const DATA_TYPE: DataType = DataType::Text;

    fn to_value(&self) -> DataValue {
        DataValue::Text(self.clone())
    }

    fn from_value(value: DataValue) -> QueryResult<Self> {
        match value {
            DataValue::Text(s) => Ok(s),
            other => mismatch(Self::DATA_TYPE, &other),
        }
    }
}

impl ColumnType for Vec<u8> {
    const DATA_TYPE: DataType = DataType::Blob;

    fn to_value(&self) -> DataValue {
        DataValue::Blob(self.clone())
    }

    fn from_value(value: DataValue) -> QueryResult<Self> {
        match value {
            DataValue::Blob(b) => Ok(b),
            other => mismatch(Self::DATA_TYPE, &other),
        }
    }
}

impl ColumnType for DateTime<Utc> {
    const DATA_TYPE: DataType = DataType::Timestamp;

    fn to_value(&self) -> DataValue {
        DataValue::Text(self.to_rfc3339_opts(SecondsFormat::Nanos, true))
    }

    fn from_value(value: DataValue) -> QueryResult<Self> {
        match value {
            DataValue::Text(s) => DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| QueryError::DecodingError(format!("invalid timestamp '{}': {}", s, e))),
            other => mismatch(Self::DATA_TYPE, &other),
        }
    }
}

impl ColumnType for NaiveDateTime {
    const DATA_TYPE: DataType = DataType::Timestamp;

    fn to_value(&self) -> DataValue {
        DataValue::Text(self.format("%Y-%m-%dT%H:%M:%S%.9f").to_string())
    }

    fn from_value(value: DataValue) -> QueryResult<Self> {
        match value {
            DataValue::Text(s) => NaiveDateTime::parse_from_str(&s, "%Y-%m-%dT%H:%M:%S%.f")
                .map_err(|e| QueryError::DecodingError(format!("invalid timestamp '{}': {}", s, e))),
            other => mismatch(Self::DATA_TYPE, &other),
        }
    }
}

impl ColumnType for NaiveDate {
    const DATA_TYPE: DataType = DataType::Date;

    fn to_value(&self) -> DataValue {
        DataValue::Text(self.format("%Y-%m-%d").to_string())
    }

    fn from_value(value: DataValue) -> QueryResult<Self> {
        match value {
            DataValue::Text(s) => NaiveDate::parse_from_str(&s, "%Y-%m-%d")
                .map_err(|e| QueryError::DecodingError(format!("invalid date '{}': {}", s, e))),
            other => mismatch(Self::DATA_TYPE, &other),
        }
    }
}

impl ColumnType for Uuid {
    const DATA_TYPE: DataType = DataType::Uuid;

    fn to_value(&self) -> DataValue {
        DataValue::Text(self.hyphenated().to_string())
    }

    fn from_value(value: DataValue) -> QueryResult<Self> {
        match value {
            DataValue::Text(s) => Uuid::parse_str(&s)
                .map_err(|e| QueryError::DecodingError(format!("invalid uuid '{}': {}", s, e))),
            other => mismatch(Self::DATA_TYPE, &other),
        }
    }
}

impl<T: ColumnType> ColumnType for Option<T> {
    const DATA_TYPE: DataType = T::DATA_TYPE;
    const NULLABLE: bool = true;

    fn to_value(&self) -> DataValue {
        match self {
            Some(v) => v.to_value(),
            None => DataValue::Null,
        }
    }

    fn from_value(value: DataValue) -> QueryResult<Self> {
        match value {
            DataValue::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}
