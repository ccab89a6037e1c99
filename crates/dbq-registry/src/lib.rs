//! Collection registry and schema validation
//!
//! The builder never consults a registry; unknown collections and fields are
//! reported here, when a sealed spec is validated against registered
//! collection schemas.

use dbq_ir::{
    CollectionSchema, CompareOp, Comparison, DataType, Expr, FieldRef, FieldType, QueryBody,
    QuerySpec, Value,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    #[error("Unknown join target: {0}")]
    UnknownJoinTarget(String),

    #[error("Unknown field `{field}` in collection `{collection}`")]
    UnknownField { collection: String, field: String },

    #[error("Type mismatch for `{field}`: expected {expected:?}, got {actual}")]
    TypeMismatch {
        field: String,
        expected: DataType,
        actual: &'static str,
    },

    #[error("Field `{0}` is not nullable")]
    NotNullable(String),

    #[error("Failed to read schema file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML schema: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON schema: {0}")]
    Json(#[from] serde_json::Error),
}

/// Answers whether a collection name is known
pub trait CollectionResolver {
    fn exists(&self, name: &str) -> bool;
}

/// On-disk schema document, YAML or JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaFile {
    #[serde(default = "default_version")]
    pub version: String,
    pub collections: Vec<CollectionSchema>,
}

fn default_version() -> String {
    "0.1.0".to_string()
}

pub struct CollectionRegistry {
    collections: HashMap<String, CollectionSchema>,
    version: String, // Semver of the schema document
}

impl CollectionRegistry {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            collections: HashMap::new(),
            version: version.into(),
        }
    }

    /// Register a schema, replacing any previous schema of the same name
    pub fn register(&mut self, schema: CollectionSchema) {
        self.collections.insert(schema.name.clone(), schema);
    }

    pub fn lookup(&self, name: &str) -> Result<&CollectionSchema, RegistryError> {
        self.collections
            .get(name)
            .ok_or_else(|| RegistryError::UnknownCollection(name.to_string()))
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn len(&self) -> usize {
        self.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }

    pub fn from_schema_file(file: SchemaFile) -> Self {
        let mut registry = Self::new(file.version);
        for schema in file.collections {
            registry.register(schema);
        }
        registry
    }

    pub fn from_yaml(source: &str) -> Result<Self, RegistryError> {
        let file: SchemaFile = serde_yaml::from_str(source)?;
        Ok(Self::from_schema_file(file))
    }

    pub fn from_json(source: &str) -> Result<Self, RegistryError> {
        let file: SchemaFile = serde_json::from_str(source)?;
        Ok(Self::from_schema_file(file))
    }

    /// Load a schema file; `.json` files are read as JSON, anything else as YAML
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let registry = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json(&contents)?,
            _ => Self::from_yaml(&contents)?,
        };
        debug!(
            path = %path.display(),
            collections = registry.len(),
            version = %registry.version,
            "Loaded collection schemas"
        );
        Ok(registry)
    }

    /// Check a sealed spec against the registered schemas
    pub fn validate(&self, spec: &QuerySpec) -> Result<(), RegistryError> {
        let scope = Scope::new(self, spec)?;

        if let Some(condition) = &spec.condition {
            scope.check_expr(condition)?;
        }
        for join in &spec.joins {
            scope.check_expr(&join.condition)?;
        }

        match &spec.body {
            QueryBody::Insert { values } => {
                for (field, value) in values {
                    scope.check_assigned(field, value)?;
                }
            }
            QueryBody::Update { assignments } => {
                for (field, assignment) in assignments {
                    scope.check_assigned(field, &assignment.value)?;
                }
            }
            QueryBody::Replace { key_fields, values } => {
                for field in key_fields {
                    scope.resolve(&FieldRef::new(field.as_str()))?;
                }
                for (field, value) in values {
                    scope.check_assigned(field, value)?;
                }
            }
            QueryBody::Find(selection) | QueryBody::Group(selection) => {
                for projection in &selection.projections {
                    scope.resolve(&projection.field)?;
                }
                for key in &selection.group_by {
                    scope.resolve(&key.field)?;
                }
                for key in &selection.order_by {
                    scope.resolve(&key.field)?;
                }
                for union in &selection.unions {
                    self.validate(union)?;
                }
            }
            QueryBody::Delete => {}
        }

        debug!(
            kind = %spec.kind(),
            collection = %spec.collection,
            "Spec matches registered schemas"
        );
        Ok(())
    }
}

impl CollectionResolver for CollectionRegistry {
    fn exists(&self, name: &str) -> bool {
        self.collections.contains_key(name)
    }
}

impl Default for CollectionRegistry {
    fn default() -> Self {
        Self::new(default_version())
    }
}

/// Collections visible to one spec: the primary collection plus join targets
struct Scope<'a> {
    registry: &'a CollectionRegistry,
    primary: &'a CollectionSchema,
    joined: Vec<&'a CollectionSchema>,
}

impl<'a> Scope<'a> {
    fn new(registry: &'a CollectionRegistry, spec: &QuerySpec) -> Result<Self, RegistryError> {
        let primary = registry.lookup(&spec.collection)?;
        let joined = spec
            .joins
            .iter()
            .map(|join| {
                registry
                    .collections
                    .get(&join.target)
                    .ok_or_else(|| RegistryError::UnknownJoinTarget(join.target.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            registry,
            primary,
            joined,
        })
    }

    fn resolve(&self, field: &FieldRef) -> Result<&'a FieldType, RegistryError> {
        let schema = match &field.collection {
            None => self.primary,
            Some(name) if *name == self.primary.name => self.primary,
            Some(name) => self
                .joined
                .iter()
                .copied()
                .find(|schema| schema.name == *name)
                .ok_or_else(|| RegistryError::UnknownCollection(name.clone()))?,
        };

        schema
            .find_field(&field.name)
            .ok_or_else(|| RegistryError::UnknownField {
                collection: schema.name.clone(),
                field: field.name.clone(),
            })
    }

    fn check_expr(&self, expr: &Expr) -> Result<(), RegistryError> {
        let mut result = Ok(());
        expr.for_each_comparison(&mut |comparison| {
            if result.is_ok() {
                result = self.check_comparison(comparison);
            }
        });
        result
    }

    fn check_comparison(&self, comparison: &Comparison) -> Result<(), RegistryError> {
        let field = self.resolve(&comparison.field)?;
        match &comparison.value {
            Value::Field(other) => {
                self.resolve(other)?;
            }
            // Subqueries resolve against their own collection
            Value::Subquery(query) => return self.registry.validate(query),
            _ => {}
        }

        // Aggregated operands no longer carry the field's type
        if comparison.aggregation.is_some() || comparison.op.is_unary() {
            return Ok(());
        }

        match (comparison.op, &comparison.value) {
            (CompareOp::In | CompareOp::Between, Value::Array(items)) => {
                items.iter().try_for_each(|item| check_type(field, item))
            }
            (_, value) => check_type(field, value),
        }
    }

    fn check_assigned(&self, field: &str, value: &Value) -> Result<(), RegistryError> {
        let field = self.resolve(&FieldRef::new(field))?;
        if value.is_null() && !field.nullable {
            return Err(RegistryError::NotNullable(field.name.clone()));
        }
        check_type(field, value)
    }
}

fn check_type(field: &FieldType, value: &Value) -> Result<(), RegistryError> {
    if field.data_type.accepts(value) {
        Ok(())
    } else {
        Err(RegistryError::TypeMismatch {
            field: field.name.clone(),
            expected: field.data_type.clone(),
            actual: value.kind_name(),
        })
    }
}
