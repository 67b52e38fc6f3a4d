use std::fmt;
use serde::{Deserialize, Serialize};
use crate::core::{DbError, Result};

/// Attribute column value. Variants never coerce into each other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnValue {
    Integer(i64),
    Double(f64),
    Boolean(bool),
    Binary(Vec<u8>),
    String(String),
}

impl ColumnValue {
    pub fn column_type(&self) -> ColumnType {
        match self {
            Self::Integer(_) => ColumnType::Integer,
            Self::Double(_) => ColumnType::Double,
            Self::Boolean(_) => ColumnType::Boolean,
            Self::Binary(_) => ColumnType::Binary,
            Self::String(_) => ColumnType::String,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.column_type().name()
    }

    pub fn as_integer(&self) -> Result<i64> {
        match self {
            Self::Integer(i) => Ok(*i),
            other => Err(mismatch(ColumnType::Integer, other)),
        }
    }

    pub fn as_double(&self) -> Result<f64> {
        match self {
            Self::Double(f) => Ok(*f),
            other => Err(mismatch(ColumnType::Double, other)),
        }
    }

    pub fn as_boolean(&self) -> Result<bool> {
        match self {
            Self::Boolean(b) => Ok(*b),
            other => Err(mismatch(ColumnType::Boolean, other)),
        }
    }

    pub fn as_binary(&self) -> Result<&[u8]> {
        match self {
            Self::Binary(b) => Ok(b),
            other => Err(mismatch(ColumnType::Binary, other)),
        }
    }

    pub fn as_string(&self) -> Result<&str> {
        match self {
            Self::String(s) => Ok(s),
            other => Err(mismatch(ColumnType::String, other)),
        }
    }

    /// Approximate payload size in bytes, used for split sizing.
    pub fn size_in_bytes(&self) -> usize {
        match self {
            Self::Integer(_) | Self::Double(_) => 8,
            Self::Boolean(_) => 1,
            Self::Binary(b) => b.len(),
            Self::String(s) => s.len(),
        }
    }
}

fn mismatch(expected: ColumnType, actual: &ColumnValue) -> DbError {
    DbError::TypeMismatch(format!(
        "Expected {} value, got {}",
        expected.name(),
        actual.type_name()
    ))
}

impl fmt::Display for ColumnValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(i) => write!(f, "{}", i),
            Self::Double(d) => write!(f, "{}", d),
            Self::Boolean(b) => write!(f, "{}", b),
            Self::Binary(b) => write!(f, "<binary {} bytes>", b.len()),
            Self::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for ColumnValue {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<f64> for ColumnValue {
    fn from(f: f64) -> Self {
        Self::Double(f)
    }
}

impl From<bool> for ColumnValue {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<Vec<u8>> for ColumnValue {
    fn from(b: Vec<u8>) -> Self {
        Self::Binary(b)
    }
}

impl From<String> for ColumnValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&str> for ColumnValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    Integer,
    Double,
    Boolean,
    Binary,
    String,
}

impl ColumnType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Integer => "INTEGER",
            Self::Double => "DOUBLE",
            Self::Boolean => "BOOLEAN",
            Self::Binary => "BINARY",
            Self::String => "STRING",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Primary key column value.
///
/// Variant order defines the sort order: `InfMin` sorts below and `InfMax`
/// above every real value. Within one column all real values share the
/// schema type, so cross-type ordering only matters for the sentinels.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PrimaryKeyValue {
    InfMin,
    Integer(i64),
    String(String),
    Binary(Vec<u8>),
    InfMax,
}

impl PrimaryKeyValue {
    pub fn is_infinite(&self) -> bool {
        matches!(self, Self::InfMin | Self::InfMax)
    }

    pub fn key_type(&self) -> Option<PrimaryKeyType> {
        match self {
            Self::Integer(_) => Some(PrimaryKeyType::Integer),
            Self::String(_) => Some(PrimaryKeyType::String),
            Self::Binary(_) => Some(PrimaryKeyType::Binary),
            Self::InfMin | Self::InfMax => None,
        }
    }

    pub fn as_integer(&self) -> Result<i64> {
        match self {
            Self::Integer(i) => Ok(*i),
            _ => Err(DbError::TypeMismatch(format!("Expected INTEGER key, got {}", self))),
        }
    }

    pub fn as_string(&self) -> Result<&str> {
        match self {
            Self::String(s) => Ok(s),
            _ => Err(DbError::TypeMismatch(format!("Expected STRING key, got {}", self))),
        }
    }

    pub fn size_in_bytes(&self) -> usize {
        match self {
            Self::Integer(_) => 8,
            Self::String(s) => s.len(),
            Self::Binary(b) => b.len(),
            Self::InfMin | Self::InfMax => 0,
        }
    }

    /// Converts an attribute value into a key value; doubles and booleans
    /// cannot be keys.
    pub fn from_column_value(value: &ColumnValue) -> Option<Self> {
        match value {
            ColumnValue::Integer(i) => Some(Self::Integer(*i)),
            ColumnValue::String(s) => Some(Self::String(s.clone())),
            ColumnValue::Binary(b) => Some(Self::Binary(b.clone())),
            ColumnValue::Double(_) | ColumnValue::Boolean(_) => None,
        }
    }

    pub fn to_column_value(&self) -> Option<ColumnValue> {
        match self {
            Self::Integer(i) => Some(ColumnValue::Integer(*i)),
            Self::String(s) => Some(ColumnValue::String(s.clone())),
            Self::Binary(b) => Some(ColumnValue::Binary(b.clone())),
            Self::InfMin | Self::InfMax => None,
        }
    }
}

impl fmt::Display for PrimaryKeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InfMin => write!(f, "INF_MIN"),
            Self::InfMax => write!(f, "INF_MAX"),
            Self::Integer(i) => write!(f, "{}", i),
            Self::String(s) => write!(f, "{}", s),
            Self::Binary(b) => write!(f, "<binary {} bytes>", b.len()),
        }
    }
}

impl From<i64> for PrimaryKeyValue {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<String> for PrimaryKeyValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&str> for PrimaryKeyValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<Vec<u8>> for PrimaryKeyValue {
    fn from(b: Vec<u8>) -> Self {
        Self::Binary(b)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimaryKeyType {
    Integer,
    String,
    Binary,
}

impl PrimaryKeyType {
    pub fn accepts(&self, value: &PrimaryKeyValue) -> bool {
        matches!(
            (self, value),
            (Self::Integer, PrimaryKeyValue::Integer(_))
                | (Self::String, PrimaryKeyValue::String(_))
                | (Self::Binary, PrimaryKeyValue::Binary(_))
        )
    }

    /// Key type a defined column contributes when it becomes an index key.
    pub fn from_column_type(column_type: ColumnType) -> Option<Self> {
        match column_type {
            ColumnType::Integer => Some(Self::Integer),
            ColumnType::String => Some(Self::String),
            ColumnType::Binary => Some(Self::Binary),
            ColumnType::Double | ColumnType::Boolean => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Integer => "INTEGER",
            Self::String => "STRING",
            Self::Binary => "BINARY",
        }
    }
}

impl fmt::Display for PrimaryKeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
