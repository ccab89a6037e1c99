//! Opaque value slots
//!
//! Values are type-erased: the builder only checks operand shape, the engine
//! (or a registry layer) is responsible for type compatibility.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::{FieldRef, QuerySpec};

/// Text form of timestamps: RFC 3339 in UTC, with a signed year outside
/// 0000..=9999 and 0, 3, 6 or 9 fractional digits.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.fZ";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
    Array(Vec<Value>),
    /// Reference to another field, compared column against column.
    Field(FieldRef),
    /// Positional placeholder bound by the engine at execution time.
    Prepared,
    /// Find or Group query whose rows an `In` comparison tests membership in.
    Subquery(Box<QuerySpec>),
}

impl Value {
    /// Reference to a (possibly qualified) field, e.g. `"orders.user_id"`.
    pub fn field(path: &str) -> Self {
        Value::Field(FieldRef::from(path))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Uuid(_) => "uuid",
            Value::Timestamp(_) => "timestamp",
            Value::Array(_) => "array",
            Value::Field(_) => "field",
            Value::Prepared => "prepared",
            Value::Subquery(_) => "subquery",
        }
    }

    /// Number of `Prepared` slots, including those nested in arrays
    pub fn placeholder_count(&self) -> usize {
        match self {
            Value::Prepared => 1,
            Value::Array(items) => items.iter().map(Value::placeholder_count).sum(),
            Value::Subquery(query) => query.placeholder_count(),
            _ => 0,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Value::Uuid(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}

impl From<QuerySpec> for Value {
    fn from(v: QuerySpec) -> Self {
        Value::Subquery(Box::new(v))
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            // Debug keeps the shortest round-trip form and always a `.` or exponent
            Value::Float(x) => write!(f, "{:?}", x),
            Value::String(s) => write_quoted(f, s, '"'),
            Value::Bytes(b) => write!(f, "x\"{}\"", hex::encode(b)),
            Value::Uuid(u) => write!(f, "uuid\"{}\"", u.hyphenated()),
            Value::Timestamp(ts) => write!(f, "ts\"{}\"", ts.format(TIMESTAMP_FORMAT)),
            Value::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Value::Field(field) => write!(f, "@{}", field),
            Value::Prepared => f.write_str("?"),
            Value::Subquery(query) => write!(f, "({})", query),
        }
    }
}

/// Write `s` between `quote` characters, backslash-escaping the quote,
/// backslashes and control whitespace.
pub(crate) fn write_quoted(f: &mut fmt::Formatter<'_>, s: &str, quote: char) -> fmt::Result {
    use fmt::Write;

    f.write_char(quote)?;
    for c in s.chars() {
        match c {
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            c if c == quote => {
                f.write_char('\\')?;
                f.write_char(c)?;
            }
            c => f.write_char(c)?,
        }
    }
    f.write_char(quote)
}
