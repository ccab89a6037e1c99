//! Expression nodes of the boolean predicate tree
//!
//! Leaves are always [`Comparison`]s. `And`/`Or` hold one or more children in
//! insertion order; `Not` holds exactly one. Children are owned (`Vec`/`Box`),
//! so trees are finite, acyclic and never shared between specs.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::SpecError;
use crate::value::write_quoted;
use crate::Value;

/// Field reference, optionally qualified by its collection
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
    pub name: String,
}

impl FieldRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            collection: None,
            name: name.into(),
        }
    }

    pub fn qualified(collection: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            collection: Some(collection.into()),
            name: name.into(),
        }
    }
}

/// `"a.b"` splits on the first dot into collection `a` and field `b`
impl From<&str> for FieldRef {
    fn from(path: &str) -> Self {
        match path.split_once('.') {
            Some((collection, name)) if !collection.is_empty() && !name.is_empty() => {
                FieldRef::qualified(collection, name)
            }
            _ => FieldRef::new(path),
        }
    }
}

impl From<String> for FieldRef {
    fn from(path: String) -> Self {
        FieldRef::from(path.as_str())
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(collection) = &self.collection {
            write_segment(f, collection)?;
            f.write_str(".")?;
        }
        write_segment(f, &self.name)
    }
}

/// Single-segment name (collection, join target, alias), rendered like a
/// field segment
pub(crate) struct Name<'a>(pub &'a str);

impl fmt::Display for Name<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_segment(f, self.0)
    }
}

fn write_segment(f: &mut fmt::Formatter<'_>, segment: &str) -> fmt::Result {
    if is_plain_ident(segment) {
        f.write_str(segment)
    } else {
        write_quoted(f, segment, '`')
    }
}

fn is_plain_ident(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Aggregation {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl Aggregation {
    pub fn as_str(self) -> &'static str {
        match self {
            Aggregation::Count => "COUNT",
            Aggregation::Sum => "SUM",
            Aggregation::Avg => "AVG",
            Aggregation::Min => "MIN",
            Aggregation::Max => "MAX",
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Like,
    In,
    Between,
    IsNull,
    IsEmpty,
}

impl CompareOp {
    pub fn as_str(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Like => "LIKE",
            CompareOp::In => "IN",
            CompareOp::Between => "BETWEEN",
            CompareOp::IsNull => "IS NULL",
            CompareOp::IsEmpty => "IS EMPTY",
        }
    }

    /// Unary checks carry no operand of their own
    pub fn is_unary(self) -> bool {
        matches!(self, CompareOp::IsNull | CompareOp::IsEmpty)
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Leaf predicate: `field op value`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub field: FieldRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<Aggregation>,
    pub op: CompareOp,
    pub value: Value,
}

impl Comparison {
    pub fn new(
        field: impl Into<FieldRef>,
        op: CompareOp,
        value: impl Into<Value>,
    ) -> Result<Self, SpecError> {
        let comparison = Self {
            field: field.into(),
            aggregation: None,
            op,
            value: value.into(),
        };
        comparison.check()?;
        Ok(comparison)
    }

    pub fn with_aggregation(mut self, aggregation: Aggregation) -> Self {
        self.aggregation = Some(aggregation);
        self
    }

    /// Validate the operand shape required by the operator
    pub fn check(&self) -> Result<(), SpecError> {
        if self.field.name.is_empty() {
            return Err(SpecError::MissingName("field"));
        }

        if let Value::Subquery(query) = &self.value {
            if self.op != CompareOp::In || !query.kind().is_selection() {
                return Err(SpecError::malformed(format!(
                    "operator {} does not accept a {} subquery on `{}`",
                    self.op,
                    query.kind(),
                    self.field
                )));
            }
            return query.check();
        }

        let ok = match (self.op, &self.value) {
            (op, Value::Null) if op.is_unary() => true,
            (op, _) if op.is_unary() => false,
            (CompareOp::In, Value::Array(_) | Value::Prepared) => true,
            (CompareOp::In, _) => false,
            (CompareOp::Between, Value::Array(bounds)) => bounds.len() == 2,
            (CompareOp::Between, _) => false,
            (CompareOp::Like, Value::String(_) | Value::Prepared) => true,
            (CompareOp::Like, _) => false,
            (_, Value::Array(_)) => false,
            _ => true,
        };

        if ok {
            Ok(())
        } else {
            Err(SpecError::malformed(format!(
                "operator {} does not accept a {} operand on `{}`",
                self.op,
                self.value.kind_name(),
                self.field
            )))
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.aggregation {
            Some(agg) => write!(f, "{}({})", agg, self.field)?,
            None => write!(f, "{}", self.field)?,
        }
        if self.op.is_unary() {
            write!(f, " {}", self.op)
        } else {
            write!(f, " {} {}", self.op, self.value)
        }
    }
}

/// Logical connective used when siblings are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connective {
    And,
    Or,
}

/// Expression node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Expr {
    Comparison(Comparison),
    And { children: Vec<Expr> },
    Or { children: Vec<Expr> },
    Not { child: Box<Expr> },
}

impl Expr {
    pub fn not(child: Expr) -> Self {
        Expr::Not {
            child: Box::new(child),
        }
    }

    /// Build an `And`/`Or` node; an empty child list is rejected
    pub fn combine(connective: Connective, children: Vec<Expr>) -> Result<Self, SpecError> {
        if children.is_empty() {
            return Err(SpecError::malformed(format!(
                "{:?} node needs at least one child",
                connective
            )));
        }
        Ok(match connective {
            Connective::And => Expr::And { children },
            Connective::Or => Expr::Or { children },
        })
    }

    /// Connective of this node, if it is an `And` or `Or`
    pub fn connective(&self) -> Option<Connective> {
        match self {
            Expr::And { .. } => Some(Connective::And),
            Expr::Or { .. } => Some(Connective::Or),
            _ => None,
        }
    }

    pub fn children(&self) -> &[Expr] {
        match self {
            Expr::Comparison(_) => &[],
            Expr::And { children } | Expr::Or { children } => children,
            Expr::Not { child } => std::slice::from_ref(child.as_ref()),
        }
    }

    pub fn as_comparison(&self) -> Option<&Comparison> {
        match self {
            Expr::Comparison(c) => Some(c),
            _ => None,
        }
    }

    /// Number of nodes on the longest root-to-leaf path
    pub fn depth(&self) -> usize {
        1 + self.children().iter().map(Expr::depth).max().unwrap_or(0)
    }

    /// Visit every leaf comparison in left-to-right order
    pub fn for_each_comparison<'a>(&'a self, f: &mut impl FnMut(&'a Comparison)) {
        match self {
            Expr::Comparison(c) => f(c),
            other => {
                for child in other.children() {
                    child.for_each_comparison(f);
                }
            }
        }
    }

    pub fn placeholder_count(&self) -> usize {
        let mut count = 0;
        self.for_each_comparison(&mut |c| count += c.value.placeholder_count());
        count
    }

    /// Check structural invariants: non-empty combinators, valid leaves
    pub fn check(&self) -> Result<(), SpecError> {
        match self {
            Expr::Comparison(c) => c.check(),
            Expr::And { children } | Expr::Or { children } => {
                if children.is_empty() {
                    return Err(SpecError::malformed(format!(
                        "{:?} node has no children",
                        self.connective().unwrap_or(Connective::And)
                    )));
                }
                children.iter().try_for_each(Expr::check)
            }
            Expr::Not { child } => child.check(),
        }
    }
}

impl From<Comparison> for Expr {
    fn from(c: Comparison) -> Self {
        Expr::Comparison(c)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (name, children) = match self {
            Expr::Comparison(c) => return write!(f, "{}", c),
            Expr::And { children } => ("AND", children.as_slice()),
            Expr::Or { children } => ("OR", children.as_slice()),
            Expr::Not { child } => ("NOT", std::slice::from_ref(child.as_ref())),
        };

        write!(f, "{}(", name)?;
        for (i, child) in children.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", child)?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eq(field: &str, value: impl Into<Value>) -> Expr {
        Comparison::new(field, CompareOp::Eq, value).unwrap().into()
    }

    #[test]
    fn test_field_ref_from_path() {
        assert_eq!(FieldRef::from("age"), FieldRef::new("age"));
        assert_eq!(
            FieldRef::from("orders.user_id"),
            FieldRef::qualified("orders", "user_id")
        );
        assert_eq!(FieldRef::from(".x"), FieldRef::new(".x"));
    }

    #[test]
    fn test_field_ref_quotes_non_idents() {
        assert_eq!(FieldRef::new("first name").to_string(), "`first name`");
        assert_eq!(FieldRef::qualified("o", "a`b").to_string(), "o.`a\\`b`");
    }

    #[test]
    fn test_operand_shapes() {
        assert!(Comparison::new("age", CompareOp::In, vec![Value::Int(1)]).is_ok());
        assert!(Comparison::new("age", CompareOp::In, 1).is_err());
        assert!(Comparison::new("age", CompareOp::Between, vec![Value::Int(1)]).is_err());
        assert!(Comparison::new("name", CompareOp::Like, 3).is_err());
        assert!(Comparison::new("name", CompareOp::IsNull, Value::Null).is_ok());
        assert!(Comparison::new("name", CompareOp::IsNull, 1).is_err());
        assert!(Comparison::new("age", CompareOp::Gt, vec![Value::Int(1)]).is_err());
        assert_eq!(
            Comparison::new("", CompareOp::Eq, 1),
            Err(SpecError::MissingName("field"))
        );
    }

    #[test]
    fn test_display_tree() {
        let tree = Expr::combine(
            Connective::And,
            vec![
                eq("age", 30),
                Expr::not(Comparison::new("email", CompareOp::IsNull, Value::Null).unwrap().into()),
            ],
        )
        .unwrap();
        assert_eq!(tree.to_string(), "AND(age = 30, NOT(email IS NULL))");
        assert_eq!(tree.depth(), 3);
    }

    #[test]
    fn test_check_rejects_empty_combinator() {
        let tree = Expr::Or { children: vec![] };
        assert!(matches!(tree.check(), Err(SpecError::MalformedTree(_))));
        assert!(Expr::combine(Connective::Or, vec![]).is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let tree = Expr::combine(Connective::Or, vec![eq("a", 1), eq("b", "x")]).unwrap();
        let json = serde_json::to_string(&tree).unwrap();
        let parsed: Expr = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, tree);
    }
}
