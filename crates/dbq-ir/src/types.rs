//! Type system for collection schemas
//!
//! The builder itself is schema agnostic; these types are consumed by
//! downstream validation layers.

use serde::{Deserialize, Serialize};

use crate::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Bool,
    Int,
    Float,
    String,
    Bytes,
    Uuid,
    Timestamp,
    Array(Box<DataType>),

    // Accepts any value kind
    Any,
}

impl DataType {
    /// Whether a literal of this shape can be stored in or compared with
    /// a field of this type. Nulls, placeholders, field references and
    /// subqueries are resolved by the engine and always accepted here.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null | Value::Prepared | Value::Field(_) | Value::Subquery(_)) => true,
            (DataType::Any, _) => true,
            (DataType::Bool, Value::Bool(_)) => true,
            (DataType::Int, Value::Int(_)) => true,
            (DataType::Float, Value::Int(_) | Value::Float(_)) => true,
            (DataType::String, Value::String(_)) => true,
            (DataType::Bytes, Value::Bytes(_)) => true,
            (DataType::Uuid, Value::Uuid(_)) => true,
            (DataType::Timestamp, Value::Timestamp(_)) => true,
            (DataType::Array(inner), Value::Array(items)) => items.iter().all(|v| inner.accepts(v)),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldType {
    pub name: String,
    pub data_type: DataType,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
}

fn default_nullable() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionSchema {
    pub name: String,
    pub fields: Vec<FieldType>,
}

impl CollectionSchema {
    pub fn new(name: impl Into<String>, fields: Vec<FieldType>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    pub fn find_field(&self, name: &str) -> Option<&FieldType> {
        self.fields.iter().find(|f| f.name == name)
    }
}
