//! Collection factory
//!
//! Entry point of the builder: binds a collection name and creates empty
//! query specs of each kind. No existence check happens here; resolving
//! collection names is up to the engine or a registry layer.

use dbq_ir::{QueryKind, QuerySpec, SpecError};

use crate::query::QueryBuilder;
use crate::scope;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collection {
    name: String,
}

impl Collection {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Empty builder of `kind` bound to this collection
    pub fn create_query(&self, kind: QueryKind) -> QueryBuilder {
        QueryBuilder::new(kind, self.name.clone())
    }

    /// Create, configure and seal a spec of `kind`
    pub fn query<F>(&self, kind: QueryKind, configure: F) -> Result<QuerySpec, SpecError>
    where
        F: FnOnce(&mut QueryBuilder) -> Result<(), SpecError>,
    {
        scope::build(|| self.create_query(kind), configure)?.seal()
    }

    pub fn insert<F>(&self, configure: F) -> Result<QuerySpec, SpecError>
    where
        F: FnOnce(&mut QueryBuilder) -> Result<(), SpecError>,
    {
        self.query(QueryKind::Insert, configure)
    }

    pub fn find<F>(&self, configure: F) -> Result<QuerySpec, SpecError>
    where
        F: FnOnce(&mut QueryBuilder) -> Result<(), SpecError>,
    {
        self.query(QueryKind::Find, configure)
    }

    pub fn update<F>(&self, configure: F) -> Result<QuerySpec, SpecError>
    where
        F: FnOnce(&mut QueryBuilder) -> Result<(), SpecError>,
    {
        self.query(QueryKind::Update, configure)
    }

    pub fn replace<F>(&self, configure: F) -> Result<QuerySpec, SpecError>
    where
        F: FnOnce(&mut QueryBuilder) -> Result<(), SpecError>,
    {
        self.query(QueryKind::Replace, configure)
    }

    /// Same create-then-configure shape as every other kind; the callback
    /// runs exactly once.
    pub fn delete<F>(&self, configure: F) -> Result<QuerySpec, SpecError>
    where
        F: FnOnce(&mut QueryBuilder) -> Result<(), SpecError>,
    {
        self.query(QueryKind::Delete, configure)
    }

    pub fn group<F>(&self, configure: F) -> Result<QuerySpec, SpecError>
    where
        F: FnOnce(&mut QueryBuilder) -> Result<(), SpecError>,
    {
        self.query(QueryKind::Group, configure)
    }
}
