//! Value types - the closed set of scalars a key can hold
//!
//! Every key is stored under exactly one of four types:
//! - `String`: engine-native text
//! - `Bool`: stored as a SQLite BOOLEAN (0/1)
//! - `Float`: 64-bit IEEE float
//! - `Int`: 64-bit signed integer

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Table name prefix shared by all value tables. Enumeration relies on it.
pub const TABLE_PREFIX: &str = "kvp_";

/// The type tag of a stored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    String,
    Bool,
    Float,
    Int,
}

impl ValueType {
    /// Get the string representation of the type tag
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::String => "string",
            ValueType::Bool => "bool",
            ValueType::Float => "float",
            ValueType::Int => "int",
        }
    }

    /// Name of the table holding values of this type
    pub fn table_name(&self) -> &'static str {
        match self {
            ValueType::String => "kvp_string",
            ValueType::Bool => "kvp_bool",
            ValueType::Float => "kvp_float",
            ValueType::Int => "kvp_int",
        }
    }

    /// Recover a type from a table name: the suffix after [`TABLE_PREFIX`]
    /// must be an exact type tag.
    pub fn from_table_name(table: &str) -> Option<ValueType> {
        let suffix = table.strip_prefix(TABLE_PREFIX)?;
        ValueType::all().iter().copied().find(|ty| ty.as_str() == suffix)
    }

    /// Get all value types
    pub fn all() -> &'static [ValueType] {
        &[
            ValueType::String,
            ValueType::Bool,
            ValueType::Float,
            ValueType::Int,
        ]
    }
}

impl FromStr for ValueType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "string" | "str" | "text" => Ok(ValueType::String),
            "bool" | "boolean" => Ok(ValueType::Bool),
            "float" | "real" | "f64" => Ok(ValueType::Float),
            "int" | "integer" | "i64" => Ok(ValueType::Int),
            _ => Err(Error::InvalidType(s.to_string())),
        }
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A typed scalar value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Value {
    String(String),
    Bool(bool),
    Float(f64),
    Int(i64),
}

impl Value {
    /// The type tag this value is stored under
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::String(_) => ValueType::String,
            Value::Bool(_) => ValueType::Bool,
            Value::Float(_) => ValueType::Float,
            Value::Int(_) => ValueType::Int,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::String(s) => write!(f, "{}", s),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Float(x) => write!(f, "{}", x),
            Value::Int(i) => write!(f, "{}", i),
        }
    }
}

impl rusqlite::ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
        match self {
            Value::String(s) => s.to_sql(),
            Value::Bool(b) => b.to_sql(),
            Value::Float(x) => x.to_sql(),
            Value::Int(i) => i.to_sql(),
        }
    }
}

/// A Rust type that maps onto one [`ValueType`].
///
/// Implemented for `String`, `bool`, `f64` and `i64` only; the set is closed.
pub trait Scalar: Sized + Clone + Send + Sync + 'static {
    /// The type tag values of this type are stored under.
    const TYPE: ValueType;

    fn into_value(self) -> Value;

    /// Extract a value of this type, or `None` if `value` holds another type.
    fn from_value(value: Value) -> Option<Self>;

    /// Read column `idx` of `row` as this type.
    ///
    /// Reads go through the requested type rather than whatever is on disk,
    /// so a row of the wrong storage class surfaces as an engine error.
    fn read_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Self>;
}

macro_rules! impl_scalar {
    ($ty:ty, $variant:ident) => {
        impl_scalar!($ty, $variant, |row, idx| row.get(idx));
    };
    ($ty:ty, $variant:ident, |$row:ident, $idx:ident| $read:expr) => {
        impl Scalar for $ty {
            const TYPE: ValueType = ValueType::$variant;

            fn into_value(self) -> Value {
                Value::$variant(self)
            }

            fn from_value(value: Value) -> Option<Self> {
                match value {
                    Value::$variant(v) => Some(v),
                    _ => None,
                }
            }

            fn read_column($row: &rusqlite::Row<'_>, $idx: usize) -> rusqlite::Result<Self> {
                $read
            }
        }
    };
}

impl_scalar!(String, String);
impl_scalar!(bool, Bool);
// SQLite binds NaN as NULL, so a NULL float reads back as NaN.
impl_scalar!(f64, Float, |row, idx| row
    .get::<_, Option<f64>>(idx)
    .map(|v| v.unwrap_or(f64::NAN)));
impl_scalar!(i64, Int);
