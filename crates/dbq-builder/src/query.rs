//! Per-kind query builders
//!
//! A [`QueryBuilder`] wraps one empty [`QuerySpec`] during its configuration
//! phase. Mutators that do not apply to the builder's kind fail with
//! [`SpecError::Configuration`] instead of being ignored.

use dbq_ir::{
    check_assignment, Aggregation, AssignOp, Assignment, FieldRef, GroupKey, JoinKind, JoinSpec,
    Limit, Projection, QueryBody, QueryKind, QuerySpec, Selection, SortKey, SortOrder, SpecError,
    Value,
};
use tracing::{debug, warn};

use crate::join::JoinBuilder;
use crate::predicate::{Conditional, Slot};
use crate::scope;

#[derive(Debug)]
pub struct QueryBuilder {
    spec: QuerySpec,
    merged: bool,
}

impl QueryBuilder {
    pub fn new(kind: QueryKind, collection: impl Into<String>) -> Self {
        Self {
            spec: QuerySpec::empty(kind, collection),
            merged: false,
        }
    }

    pub fn kind(&self) -> QueryKind {
        self.spec.kind()
    }

    pub fn collection(&self) -> &str {
        &self.spec.collection
    }

    /// Current state of the spec being configured
    pub fn spec(&self) -> &QuerySpec {
        &self.spec
    }

    fn reject(&self, field: &'static str) -> SpecError {
        let kind = self.kind();
        warn!(
            kind = %kind,
            field,
            collection = %self.spec.collection,
            "Rejected mutator for query kind"
        );
        SpecError::Configuration { kind, field }
    }

    /// Set a field value (Insert, Replace) or a `Set` assignment (Update)
    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> Result<&mut Self, SpecError> {
        if field.is_empty() {
            return Err(SpecError::MissingName("field"));
        }
        if !matches!(self.kind(), QueryKind::Insert | QueryKind::Replace | QueryKind::Update) {
            return Err(self.reject("values"));
        }

        let value = value.into();
        match &mut self.spec.body {
            QueryBody::Insert { values } | QueryBody::Replace { values, .. } => {
                values.insert(field.to_string(), value);
            }
            QueryBody::Update { assignments } => {
                assignments.insert(field.to_string(), Assignment::set(value));
            }
            _ => {}
        }
        Ok(self)
    }

    /// Record an assignment on an Update query
    pub fn assign(&mut self, field: &str, assignment: Assignment) -> Result<&mut Self, SpecError> {
        let QueryBody::Update { assignments } = &mut self.spec.body else {
            return Err(self.reject("assignments"));
        };
        check_assignment(field, &assignment)?;
        assignments.insert(field.to_string(), assignment);
        Ok(self)
    }

    pub fn add(&mut self, field: &str, value: impl Into<Value>) -> Result<&mut Self, SpecError> {
        self.assign(field, Assignment { op: AssignOp::Add, value: value.into() })
    }

    pub fn subtract(
        &mut self,
        field: &str,
        value: impl Into<Value>,
    ) -> Result<&mut Self, SpecError> {
        self.assign(field, Assignment { op: AssignOp::Subtract, value: value.into() })
    }

    pub fn multiply(
        &mut self,
        field: &str,
        value: impl Into<Value>,
    ) -> Result<&mut Self, SpecError> {
        self.assign(field, Assignment { op: AssignOp::Multiply, value: value.into() })
    }

    pub fn divide(&mut self, field: &str, value: impl Into<Value>) -> Result<&mut Self, SpecError> {
        self.assign(field, Assignment { op: AssignOp::Divide, value: value.into() })
    }

    /// Mark a field as part of the key a Replace query matches on
    pub fn key(&mut self, field: &str) -> Result<&mut Self, SpecError> {
        let QueryBody::Replace { key_fields, .. } = &mut self.spec.body else {
            return Err(self.reject("key_fields"));
        };
        if field.is_empty() {
            return Err(SpecError::MissingName("key field"));
        }
        key_fields.push(field.to_string());
        Ok(self)
    }

    fn selection(&mut self, field: &'static str) -> Result<&mut Selection, SpecError> {
        let kind = self.kind();
        if !kind.is_selection() {
            return Err(self.reject(field));
        }
        match &mut self.spec.body {
            QueryBody::Find(selection) | QueryBody::Group(selection) => Ok(selection),
            _ => Err(SpecError::Configuration { kind, field }),
        }
    }

    fn project(&mut self, projection: Projection) -> Result<&mut Self, SpecError> {
        if projection.field.name.is_empty() {
            return Err(SpecError::MissingName("field"));
        }
        self.selection("projections")?.projections.push(projection);
        Ok(self)
    }

    pub fn get(&mut self, field: impl Into<FieldRef>) -> Result<&mut Self, SpecError> {
        self.project(Projection {
            field: field.into(),
            aggregation: None,
            alias: None,
        })
    }

    pub fn get_as(
        &mut self,
        field: impl Into<FieldRef>,
        alias: &str,
    ) -> Result<&mut Self, SpecError> {
        self.project(Projection {
            field: field.into(),
            aggregation: None,
            alias: Some(alias.to_string()),
        })
    }

    pub fn get_aggregated(
        &mut self,
        aggregation: Aggregation,
        field: impl Into<FieldRef>,
    ) -> Result<&mut Self, SpecError> {
        self.project(Projection {
            field: field.into(),
            aggregation: Some(aggregation),
            alias: None,
        })
    }

    pub fn get_aggregated_as(
        &mut self,
        aggregation: Aggregation,
        field: impl Into<FieldRef>,
        alias: &str,
    ) -> Result<&mut Self, SpecError> {
        self.project(Projection {
            field: field.into(),
            aggregation: Some(aggregation),
            alias: Some(alias.to_string()),
        })
    }

    pub fn group_by(&mut self, field: impl Into<FieldRef>) -> Result<&mut Self, SpecError> {
        self.group(GroupKey::from(field.into()))
    }

    pub fn group_by_aggregated(
        &mut self,
        aggregation: Aggregation,
        field: impl Into<FieldRef>,
    ) -> Result<&mut Self, SpecError> {
        self.group(GroupKey {
            field: field.into(),
            aggregation: Some(aggregation),
        })
    }

    fn group(&mut self, key: GroupKey) -> Result<&mut Self, SpecError> {
        if key.field.name.is_empty() {
            return Err(SpecError::MissingName("field"));
        }
        self.selection("group_by")?.group_by.push(key);
        Ok(self)
    }

    pub fn order_by(
        &mut self,
        field: impl Into<FieldRef>,
        order: SortOrder,
    ) -> Result<&mut Self, SpecError> {
        let key = SortKey {
            field: field.into(),
            aggregation: None,
            order,
        };
        self.selection("order_by")?.order_by.push(key);
        Ok(self)
    }

    pub fn order_by_aggregated(
        &mut self,
        aggregation: Aggregation,
        field: impl Into<FieldRef>,
        order: SortOrder,
    ) -> Result<&mut Self, SpecError> {
        let key = SortKey {
            field: field.into(),
            aggregation: Some(aggregation),
            order,
        };
        self.selection("order_by")?.order_by.push(key);
        Ok(self)
    }

    pub fn limit_offset(&mut self, limit: u64, offset: u64) -> Result<&mut Self, SpecError> {
        self.selection("limit")?.limit = Some(Limit { limit, offset });
        Ok(self)
    }

    pub fn limit(&mut self, limit: u64) -> Result<&mut Self, SpecError> {
        self.limit_offset(limit, 0)
    }

    pub fn only_one(&mut self) -> Result<&mut Self, SpecError> {
        self.limit(1)
    }

    /// One page of `per_page` entries; pages are numbered from 1
    pub fn page(&mut self, page: u64, per_page: u64) -> Result<&mut Self, SpecError> {
        let offset = page.saturating_sub(1).saturating_mul(per_page);
        self.limit_offset(per_page, offset)
    }

    /// Entries `start` through `end`, both inclusive and numbered from 1
    pub fn index(&mut self, start: u64, end: u64) -> Result<&mut Self, SpecError> {
        let limit = end.saturating_add(1).saturating_sub(start);
        self.limit_offset(limit, start.saturating_sub(1))
    }

    /// Append the rows of another sealed Find or Group spec
    pub fn union(&mut self, query: QuerySpec) -> Result<&mut Self, SpecError> {
        let selection = self.selection("unions")?;
        if !query.kind().is_selection() {
            return Err(SpecError::Configuration {
                kind: query.kind(),
                field: "unions",
            });
        }
        selection.unions.push(query);
        Ok(self)
    }

    /// Append a join built in its own scope. Joins keep call order and are
    /// never de-duplicated.
    pub fn join<F>(
        &mut self,
        target: &str,
        kind: JoinKind,
        configure: F,
    ) -> Result<&JoinSpec, SpecError>
    where
        F: FnOnce(&mut JoinBuilder) -> Result<(), SpecError>,
    {
        if !self.kind().is_filterable() {
            return Err(self.reject("joins"));
        }
        if target.is_empty() {
            return Err(SpecError::MissingName("join target"));
        }

        let join = scope::build(|| JoinBuilder::new(target, kind), configure)?.finish()?;
        self.spec.joins.push(join);

        let joins = &self.spec.joins;
        Ok(&joins[joins.len() - 1])
    }

    pub fn inner_join<F>(&mut self, target: &str, configure: F) -> Result<&JoinSpec, SpecError>
    where
        F: FnOnce(&mut JoinBuilder) -> Result<(), SpecError>,
    {
        self.join(target, JoinKind::Inner, configure)
    }

    pub fn left_join<F>(&mut self, target: &str, configure: F) -> Result<&JoinSpec, SpecError>
    where
        F: FnOnce(&mut JoinBuilder) -> Result<(), SpecError>,
    {
        self.join(target, JoinKind::Left, configure)
    }

    /// End the configuration phase and hand out the finished spec
    pub fn seal(self) -> Result<QuerySpec, SpecError> {
        self.spec.check()?;
        debug!(
            kind = %self.spec.kind(),
            collection = %self.spec.collection,
            joins = self.spec.joins.len(),
            "Sealed query spec"
        );
        Ok(self.spec)
    }
}

impl Conditional for QueryBuilder {
    fn condition_slot(&mut self) -> Result<Slot<'_>, SpecError> {
        if !self.kind().is_filterable() {
            return Err(self.reject("condition"));
        }
        Ok(Slot::new(&mut self.spec.condition, &mut self.merged))
    }
}
