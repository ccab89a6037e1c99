//! DBQ Intermediate Representation (IR)
//!
//! In-memory description of one database operation prior to execution.
//! All types are deterministically serializable so an engine can cache
//! sealed specs by fingerprint.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

mod error;
mod expr;
mod types;
mod value;

pub use error::SpecError;
pub use expr::*;
pub use types::*;
pub use value::{Value, TIMESTAMP_FORMAT};

use expr::Name;

/// CRUD kind of a query spec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryKind {
    Insert,
    Find,
    Update,
    Replace,
    Delete,
    Group,
}

impl QueryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            QueryKind::Insert => "insert",
            QueryKind::Find => "find",
            QueryKind::Update => "update",
            QueryKind::Replace => "replace",
            QueryKind::Delete => "delete",
            QueryKind::Group => "group",
        }
    }

    /// Kinds that carry a predicate tree and joins
    pub fn is_filterable(self) -> bool {
        !matches!(self, QueryKind::Insert)
    }

    /// Kinds that carry projections, grouping, ordering and paging
    pub fn is_selection(self) -> bool {
        matches!(self, QueryKind::Find | QueryKind::Group)
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sealed query spec handed to the execution engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
    pub collection: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Expr>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub joins: Vec<JoinSpec>,

    pub body: QueryBody,
}

/// Kind-specific attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum QueryBody {
    Insert {
        #[serde(default)]
        values: BTreeMap<String, Value>,
    },
    Find(Selection),
    Update {
        #[serde(default)]
        assignments: BTreeMap<String, Assignment>,
    },
    Replace {
        #[serde(default)]
        key_fields: Vec<String>,
        #[serde(default)]
        values: BTreeMap<String, Value>,
    },
    Delete,
    Group(Selection),
}

impl QueryBody {
    pub fn empty(kind: QueryKind) -> Self {
        match kind {
            QueryKind::Insert => QueryBody::Insert {
                values: BTreeMap::new(),
            },
            QueryKind::Find => QueryBody::Find(Selection::default()),
            QueryKind::Update => QueryBody::Update {
                assignments: BTreeMap::new(),
            },
            QueryKind::Replace => QueryBody::Replace {
                key_fields: Vec::new(),
                values: BTreeMap::new(),
            },
            QueryKind::Delete => QueryBody::Delete,
            QueryKind::Group => QueryBody::Group(Selection::default()),
        }
    }

    pub fn kind(&self) -> QueryKind {
        match self {
            QueryBody::Insert { .. } => QueryKind::Insert,
            QueryBody::Find(_) => QueryKind::Find,
            QueryBody::Update { .. } => QueryKind::Update,
            QueryBody::Replace { .. } => QueryKind::Replace,
            QueryBody::Delete => QueryKind::Delete,
            QueryBody::Group(_) => QueryKind::Group,
        }
    }
}

/// Projection, grouping, ordering and paging of Find/Group queries.
/// `group_by` and `order_by` are passed through to the engine untouched.
///
/// `unions` are further Find/Group specs whose rows are appended to this
/// one's, in list order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub projections: Vec<Projection>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group_by: Vec<GroupKey>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub order_by: Vec<SortKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<Limit>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unions: Vec<QuerySpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupKey {
    pub field: FieldRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<Aggregation>,
}

impl From<FieldRef> for GroupKey {
    fn from(field: FieldRef) -> Self {
        Self {
            field,
            aggregation: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Projection {
    pub field: FieldRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<Aggregation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: FieldRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<Aggregation>,
    pub order: SortOrder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limit {
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignOp {
    Set,
    Add,
    Subtract,
    Multiply,
    Divide,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub op: AssignOp,
    pub value: Value,
}

impl Assignment {
    pub fn set(value: impl Into<Value>) -> Self {
        Self {
            op: AssignOp::Set,
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
}

/// One join clause; applied by the engine in list order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinSpec {
    pub target: String,
    pub kind: JoinKind,
    pub condition: Expr,
}

/// Optional bounds applied on top of the structural checks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    #[serde(default)]
    pub max_depth: Option<usize>,
    #[serde(default)]
    pub max_joins: Option<usize>,
}

impl QuerySpec {
    /// Empty spec of `kind` bound to `collection`
    pub fn empty(kind: QueryKind, collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            condition: None,
            joins: Vec::new(),
            body: QueryBody::empty(kind),
        }
    }

    pub fn kind(&self) -> QueryKind {
        self.body.kind()
    }

    /// Calculate fingerprint (SHA-256) for deterministic caching
    pub fn fingerprint(&self) -> String {
        let json = serde_json::to_string(self).expect("IR should always serialize");
        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Number of prepared placeholders the engine must bind, in tree order
    pub fn placeholder_count(&self) -> usize {
        let from_body = match &self.body {
            QueryBody::Insert { values } | QueryBody::Replace { values, .. } => {
                values.values().map(Value::placeholder_count).sum()
            }
            QueryBody::Update { assignments } => assignments
                .values()
                .map(|a| a.value.placeholder_count())
                .sum(),
            QueryBody::Find(selection) | QueryBody::Group(selection) => selection
                .unions
                .iter()
                .map(QuerySpec::placeholder_count)
                .sum(),
            QueryBody::Delete => 0,
        };
        let from_joins: usize = self.joins.iter().map(|j| j.condition.placeholder_count()).sum();
        let from_condition = self.condition.as_ref().map_or(0, Expr::placeholder_count);

        from_body + from_joins + from_condition
    }

    /// Check the invariants a sealed spec guarantees to the engine
    pub fn check(&self) -> Result<(), SpecError> {
        self.check_with(&Limits::default())
    }

    pub fn check_with(&self, limits: &Limits) -> Result<(), SpecError> {
        let kind = self.kind();

        if self.collection.is_empty() {
            return Err(SpecError::MissingName("collection"));
        }

        if !kind.is_filterable() {
            if self.condition.is_some() {
                return Err(SpecError::Configuration { kind, field: "condition" });
            }
            if !self.joins.is_empty() {
                return Err(SpecError::Configuration { kind, field: "joins" });
            }
        }

        if let Some(condition) = &self.condition {
            condition.check()?;
            check_depth(condition, limits)?;
        }

        if let Some(max) = limits.max_joins {
            if self.joins.len() > max {
                return Err(SpecError::LimitExceeded(format!(
                    "{} joins, at most {} allowed",
                    self.joins.len(),
                    max
                )));
            }
        }

        for join in &self.joins {
            if join.target.is_empty() {
                return Err(SpecError::MissingName("join target"));
            }
            join.condition.check()?;
            check_depth(&join.condition, limits)?;
        }

        match &self.body {
            QueryBody::Insert { values } | QueryBody::Replace { values, .. } => {
                if values.keys().any(String::is_empty) {
                    return Err(SpecError::MissingName("field"));
                }
            }
            QueryBody::Update { assignments } => {
                for (field, assignment) in assignments {
                    check_assignment(field, assignment)?;
                }
            }
            QueryBody::Find(selection) | QueryBody::Group(selection) => {
                for union in &selection.unions {
                    if !union.kind().is_selection() {
                        return Err(SpecError::Configuration {
                            kind: union.kind(),
                            field: "unions",
                        });
                    }
                    union.check_with(limits)?;
                }
            }
            QueryBody::Delete => {}
        }

        if let QueryBody::Replace { key_fields, .. } = &self.body {
            if key_fields.iter().any(String::is_empty) {
                return Err(SpecError::MissingName("key field"));
            }
        }

        Ok(())
    }
}

fn check_depth(expr: &Expr, limits: &Limits) -> Result<(), SpecError> {
    match limits.max_depth {
        Some(max) if expr.depth() > max => Err(SpecError::LimitExceeded(format!(
            "predicate depth {} exceeds {}",
            expr.depth(),
            max
        ))),
        _ => Ok(()),
    }
}

/// Arithmetic assignments need a numeric (or prepared) operand
pub fn check_assignment(field: &str, assignment: &Assignment) -> Result<(), SpecError> {
    if field.is_empty() {
        return Err(SpecError::MissingName("field"));
    }
    let numeric = assignment.value.is_numeric() || matches!(assignment.value, Value::Prepared);
    if assignment.op != AssignOp::Set && !numeric {
        return Err(SpecError::InvalidAssignment {
            field: field.to_string(),
            reason: format!(
                "{:?} needs a numeric operand, got {}",
                assignment.op,
                assignment.value.kind_name()
            ),
        });
    }
    Ok(())
}

impl fmt::Display for JoinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            JoinKind::Inner => "INNER",
            JoinKind::Left => "LEFT",
            JoinKind::Right => "RIGHT",
            JoinKind::Full => "FULL",
        })
    }
}

impl fmt::Display for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.aggregation {
            Some(agg) => write!(f, "{}({})", agg, self.field)?,
            None => write!(f, "{}", self.field)?,
        }
        if let Some(alias) = &self.alias {
            write!(f, " AS {}", Name(alias))?;
        }
        Ok(())
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.aggregation {
            Some(agg) => write!(f, "{}({})", agg, self.field),
            None => write!(f, "{}", self.field),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.aggregation {
            Some(agg) => write!(f, "{}({})", agg, self.field)?,
            None => write!(f, "{}", self.field)?,
        }
        match self.order {
            SortOrder::Asc => f.write_str(" ASC"),
            SortOrder::Desc => f.write_str(" DESC"),
        }
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

fn write_values<'a, V: fmt::Display + 'a>(
    f: &mut fmt::Formatter<'_>,
    entries: impl Iterator<Item = (&'a String, V)>,
) -> fmt::Result {
    f.write_str("{")?;
    for (i, (field, value)) in entries.enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{} = {}", FieldRef::new(field.as_str()), value)?;
    }
    f.write_str("}")
}

impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.op {
            AssignOp::Set => write!(f, "{}", self.value),
            AssignOp::Add => write!(f, "+ {}", self.value),
            AssignOp::Subtract => write!(f, "- {}", self.value),
            AssignOp::Multiply => write!(f, "* {}", self.value),
            AssignOp::Divide => write!(f, "/ {}", self.value),
        }
    }
}

/// One-line explain text, e.g.
/// `FIND users GET [name] LEFT JOIN orders ON orders.user_id = @users.id WHERE age > 30`
///
/// Find and Group specs parse back with `dbq_syntax::parse_query`.
impl fmt::Display for QuerySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = self.kind().as_str().to_uppercase();
        write!(f, "{} {}", kind, Name(&self.collection))?;

        match &self.body {
            QueryBody::Insert { values } => {
                f.write_str(" SET ")?;
                write_values(f, values.iter())?;
            }
            QueryBody::Update { assignments } => {
                f.write_str(" SET ")?;
                write_values(f, assignments.iter())?;
            }
            QueryBody::Replace { key_fields, values } => {
                f.write_str(" KEY [")?;
                write_list(f, key_fields)?;
                f.write_str("] SET ")?;
                write_values(f, values.iter())?;
            }
            QueryBody::Find(selection) | QueryBody::Group(selection) => {
                if !selection.projections.is_empty() {
                    f.write_str(" GET [")?;
                    write_list(f, &selection.projections)?;
                    f.write_str("]")?;
                }
            }
            QueryBody::Delete => {}
        }

        for join in &self.joins {
            write!(f, " {} JOIN {} ON {}", join.kind, Name(&join.target), join.condition)?;
        }

        if let Some(condition) = &self.condition {
            write!(f, " WHERE {}", condition)?;
        }

        if let QueryBody::Find(selection) | QueryBody::Group(selection) = &self.body {
            if !selection.group_by.is_empty() {
                f.write_str(" GROUP BY ")?;
                write_list(f, &selection.group_by)?;
            }
            if !selection.order_by.is_empty() {
                f.write_str(" ORDER BY ")?;
                write_list(f, &selection.order_by)?;
            }
            if let Some(limit) = selection.limit {
                write!(f, " LIMIT {} OFFSET {}", limit.limit, limit.offset)?;
            }
            for union in &selection.unions {
                write!(f, " UNION ({})", union)?;
            }
        }

        Ok(())
    }
}
