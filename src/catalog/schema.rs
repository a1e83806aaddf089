// Schema Type Module
//
// This module defines the logical data types a shape field can carry and how
// each one is declared in storage.

/// Logical data types supported by shape fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Integer,
    Boolean,
    Float,
    Text,
    Blob,
    Date,
    Timestamp,
    Uuid,
}

impl DataType {
    /// Column type used in `CREATE TABLE` / `ALTER TABLE ADD COLUMN`
    pub fn storage_type(&self) -> &'static str {
        match self {
            DataType::Integer | DataType::Boolean => "INTEGER",
            DataType::Float => "REAL",
            DataType::Text | DataType::Date | DataType::Timestamp | DataType::Uuid => "TEXT",
            DataType::Blob => "BLOB",
        }
    }

    /// Whether a live declared column type is the one this type would declare
    pub fn matches_declared(&self, declared: &str) -> bool {
        declared.trim().eq_ignore_ascii_case(self.storage_type())
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DataType::Integer => "integer",
            DataType::Boolean => "boolean",
            DataType::Float => "float",
            DataType::Text => "text",
            DataType::Blob => "blob",
            DataType::Date => "date",
            DataType::Timestamp => "timestamp",
            DataType::Uuid => "uuid",
        };
        f.write_str(name)
    }
}
