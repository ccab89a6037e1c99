//! Predicate tree builder
//!
//! Any holder of an optional condition (query builders, join builders and
//! nested [`Predicate`] scopes) implements [`Conditional`] and gets the leaf
//! mutators and the `and`/`or`/`not` combinators for free.
//!
//! Merge policy when a new subtree is attached to a slot:
//! - empty slot: the subtree becomes the condition, no single-child wrapper
//! - slot holds a merge node of the same connective: the subtree is appended
//! - anything else: a new merge node `[old, subtree]` replaces the slot
//!
//! Only nodes created by the policy itself are extended. A compound subtree
//! taken over from an `and`/`or` scope stays one child of its parent.
//!
//! Plain leaf mutators attach with the `And` policy.

use dbq_ir::{
    Aggregation, CompareOp, Comparison, Connective, Expr, FieldRef, QuerySpec, SpecError, Value,
};
use tracing::trace;

use crate::pattern::Pattern;
use crate::scope;

/// A holder's condition together with whether its top node is a merge node
#[derive(Debug)]
pub struct Slot<'a> {
    condition: &'a mut Option<Expr>,
    merged: &'a mut bool,
}

impl<'a> Slot<'a> {
    pub fn new(condition: &'a mut Option<Expr>, merged: &'a mut bool) -> Self {
        Self { condition, merged }
    }
}

/// Attach `child` to `slot` under `connective`, returning the child as it
/// now sits in the tree.
pub(crate) fn attach(slot: Slot<'_>, child: Expr, connective: Connective) -> &Expr {
    let Slot { condition, merged } = slot;
    let existing = match condition.take() {
        None => {
            *merged = false;
            return condition.insert(child);
        }
        Some(existing) => existing,
    };

    let node = match (existing, connective, *merged) {
        (Expr::And { mut children }, Connective::And, true) => {
            children.push(child);
            Expr::And { children }
        }
        (Expr::Or { mut children }, Connective::Or, true) => {
            children.push(child);
            Expr::Or { children }
        }
        (existing, Connective::And, _) => Expr::And {
            children: vec![existing, child],
        },
        (existing, Connective::Or, _) => Expr::Or {
            children: vec![existing, child],
        },
    };
    *merged = true;

    let node: &Expr = condition.insert(node);
    node.children().last().unwrap_or(node)
}

/// Fresh, empty predicate scope handed to `and`/`or`/`not` callbacks
#[derive(Debug, Default)]
pub struct Predicate {
    condition: Option<Expr>,
    merged: bool,
}

impl Predicate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a standalone predicate; `None` if `configure` added nothing
    pub fn build<F>(configure: F) -> Result<Option<Expr>, SpecError>
    where
        F: FnOnce(&mut Predicate) -> Result<(), SpecError>,
    {
        Ok(scope::build(Predicate::new, configure)?.condition)
    }

    pub fn condition(&self) -> Option<&Expr> {
        self.condition.as_ref()
    }

    pub fn into_condition(self) -> Option<Expr> {
        self.condition
    }
}

impl Conditional for Predicate {
    fn condition_slot(&mut self) -> Result<Slot<'_>, SpecError> {
        Ok(Slot::new(&mut self.condition, &mut self.merged))
    }
}

/// Condition-building surface shared by every condition holder
pub trait Conditional {
    /// The holder's condition slot. Holders whose kind carries no condition
    /// return a configuration error.
    fn condition_slot(&mut self) -> Result<Slot<'_>, SpecError>;

    /// Add `field op value`, AND-ed with whatever is already there
    fn where_cmp(
        &mut self,
        field: impl Into<FieldRef>,
        op: CompareOp,
        value: impl Into<Value>,
    ) -> Result<&mut Self, SpecError>
    where
        Self: Sized,
    {
        let leaf = Comparison::new(field, op, value)?;
        attach(self.condition_slot()?, leaf.into(), Connective::And);
        Ok(self)
    }

    fn where_eq(
        &mut self,
        field: impl Into<FieldRef>,
        value: impl Into<Value>,
    ) -> Result<&mut Self, SpecError>
    where
        Self: Sized,
    {
        self.where_cmp(field, CompareOp::Eq, value)
    }

    fn where_ne(
        &mut self,
        field: impl Into<FieldRef>,
        value: impl Into<Value>,
    ) -> Result<&mut Self, SpecError>
    where
        Self: Sized,
    {
        self.where_cmp(field, CompareOp::Ne, value)
    }

    fn where_gt(
        &mut self,
        field: impl Into<FieldRef>,
        value: impl Into<Value>,
    ) -> Result<&mut Self, SpecError>
    where
        Self: Sized,
    {
        self.where_cmp(field, CompareOp::Gt, value)
    }

    fn where_ge(
        &mut self,
        field: impl Into<FieldRef>,
        value: impl Into<Value>,
    ) -> Result<&mut Self, SpecError>
    where
        Self: Sized,
    {
        self.where_cmp(field, CompareOp::Ge, value)
    }

    fn where_lt(
        &mut self,
        field: impl Into<FieldRef>,
        value: impl Into<Value>,
    ) -> Result<&mut Self, SpecError>
    where
        Self: Sized,
    {
        self.where_cmp(field, CompareOp::Lt, value)
    }

    fn where_le(
        &mut self,
        field: impl Into<FieldRef>,
        value: impl Into<Value>,
    ) -> Result<&mut Self, SpecError>
    where
        Self: Sized,
    {
        self.where_cmp(field, CompareOp::Le, value)
    }

    fn where_like(
        &mut self,
        field: impl Into<FieldRef>,
        pattern: &str,
    ) -> Result<&mut Self, SpecError>
    where
        Self: Sized,
    {
        self.where_cmp(field, CompareOp::Like, pattern)
    }

    fn where_pattern(
        &mut self,
        field: impl Into<FieldRef>,
        pattern: &Pattern,
    ) -> Result<&mut Self, SpecError>
    where
        Self: Sized,
    {
        self.where_cmp(field, CompareOp::Like, pattern.build())
    }

    fn where_in<I, V>(
        &mut self,
        field: impl Into<FieldRef>,
        values: I,
    ) -> Result<&mut Self, SpecError>
    where
        Self: Sized,
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        self.where_cmp(field, CompareOp::In, values)
    }

    /// Membership in the rows of a sealed Find or Group spec
    fn where_in_query(
        &mut self,
        field: impl Into<FieldRef>,
        query: QuerySpec,
    ) -> Result<&mut Self, SpecError>
    where
        Self: Sized,
    {
        self.where_cmp(field, CompareOp::In, query)
    }

    fn where_between(
        &mut self,
        field: impl Into<FieldRef>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Result<&mut Self, SpecError>
    where
        Self: Sized,
    {
        self.where_cmp(field, CompareOp::Between, vec![low.into(), high.into()])
    }

    fn where_is_null(&mut self, field: impl Into<FieldRef>) -> Result<&mut Self, SpecError>
    where
        Self: Sized,
    {
        self.where_cmp(field, CompareOp::IsNull, Value::Null)
    }

    fn where_is_empty(&mut self, field: impl Into<FieldRef>) -> Result<&mut Self, SpecError>
    where
        Self: Sized,
    {
        self.where_cmp(field, CompareOp::IsEmpty, Value::Null)
    }

    /// Comparison against a placeholder bound at execution time
    fn where_prepared(
        &mut self,
        field: impl Into<FieldRef>,
        op: CompareOp,
    ) -> Result<&mut Self, SpecError>
    where
        Self: Sized,
    {
        self.where_cmp(field, op, Value::Prepared)
    }

    /// Column-against-column equality, e.g. `orders.user_id = users.id`
    fn where_field_eq(
        &mut self,
        field: impl Into<FieldRef>,
        other: impl Into<FieldRef>,
    ) -> Result<&mut Self, SpecError>
    where
        Self: Sized,
    {
        self.where_cmp(field, CompareOp::Eq, Value::Field(other.into()))
    }

    fn where_aggregated(
        &mut self,
        aggregation: Aggregation,
        field: impl Into<FieldRef>,
        op: CompareOp,
        value: impl Into<Value>,
    ) -> Result<&mut Self, SpecError>
    where
        Self: Sized,
    {
        let leaf = Comparison::new(field, op, value)?.with_aggregation(aggregation);
        attach(self.condition_slot()?, leaf.into(), Connective::And);
        Ok(self)
    }

    /// Build a sub-predicate in a fresh scope and AND it into this holder.
    /// An empty scope is skipped and yields `None`.
    fn and<F>(&mut self, configure: F) -> Result<Option<&Expr>, SpecError>
    where
        Self: Sized,
        F: FnOnce(&mut Predicate) -> Result<(), SpecError>,
    {
        combine(self, Connective::And, configure)
    }

    /// Build a sub-predicate in a fresh scope and OR it into this holder.
    /// An empty scope is skipped and yields `None`.
    fn or<F>(&mut self, configure: F) -> Result<Option<&Expr>, SpecError>
    where
        Self: Sized,
        F: FnOnce(&mut Predicate) -> Result<(), SpecError>,
    {
        combine(self, Connective::Or, configure)
    }

    /// Wrap a sub-predicate in a single-child `Not` and AND it into this
    /// holder. Returns the `Not` node.
    fn not<F>(&mut self, configure: F) -> Result<&Expr, SpecError>
    where
        Self: Sized,
        F: FnOnce(&mut Predicate) -> Result<(), SpecError>,
    {
        self.condition_slot()?;
        let child = Predicate::build(configure)?.ok_or_else(|| {
            SpecError::MalformedTree("`not` applied to an empty scope".to_string())
        })?;

        Ok(attach(self.condition_slot()?, Expr::not(child), Connective::And))
    }
}

fn combine<'a, C, F>(
    holder: &'a mut C,
    connective: Connective,
    configure: F,
) -> Result<Option<&'a Expr>, SpecError>
where
    C: Conditional,
    F: FnOnce(&mut Predicate) -> Result<(), SpecError>,
{
    // Reject holders without a condition before running the callback
    holder.condition_slot()?;

    match Predicate::build(configure)? {
        Some(child) => Ok(Some(attach(holder.condition_slot()?, child, connective))),
        None => {
            trace!(connective = ?connective, "Skipping empty predicate scope");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(field: &str, value: i64) -> Expr {
        Comparison::new(field, CompareOp::Eq, value).unwrap().into()
    }

    #[test]
    fn test_attach_to_empty_slot() {
        let (mut slot, mut merged) = (None, true);
        let attached =
            attach(Slot::new(&mut slot, &mut merged), leaf("a", 1), Connective::Or).clone();

        assert_eq!(attached, leaf("a", 1));
        assert_eq!(slot, Some(leaf("a", 1)));
        assert!(!merged);
    }

    #[test]
    fn test_attach_extends_merge_node() {
        let mut slot = Some(Expr::And {
            children: vec![leaf("a", 1), leaf("b", 2)],
        });
        let mut merged = true;
        attach(Slot::new(&mut slot, &mut merged), leaf("c", 3), Connective::And);

        assert_eq!(
            slot,
            Some(Expr::And {
                children: vec![leaf("a", 1), leaf("b", 2), leaf("c", 3)],
            })
        );
    }

    #[test]
    fn test_attach_keeps_adopted_compound_whole() {
        let adopted = Expr::And {
            children: vec![leaf("a", 1), leaf("b", 2)],
        };
        let mut slot = Some(adopted.clone());
        let mut merged = false;
        attach(Slot::new(&mut slot, &mut merged), leaf("c", 3), Connective::And);

        assert_eq!(
            slot,
            Some(Expr::And {
                children: vec![adopted, leaf("c", 3)],
            })
        );
        assert!(merged);
    }

    #[test]
    fn test_attach_wraps_other_connective() {
        let existing = Expr::And {
            children: vec![leaf("a", 1), leaf("b", 2)],
        };
        let mut slot = Some(existing.clone());
        let mut merged = true;
        let attached =
            attach(Slot::new(&mut slot, &mut merged), leaf("c", 3), Connective::Or).clone();

        assert_eq!(attached, leaf("c", 3));
        assert_eq!(
            slot,
            Some(Expr::Or {
                children: vec![existing, leaf("c", 3)],
            })
        );
    }

    #[test]
    fn test_compound_scopes_stay_separate() {
        let condition = Predicate::build(|p| {
            p.and(|inner| {
                inner.where_eq("a", 1)?.where_eq("b", 2)?;
                Ok(())
            })?;
            p.and(|inner| {
                inner.where_eq("c", 3)?;
                Ok(())
            })?;
            p.where_eq("d", 4)?;
            Ok(())
        })
        .unwrap()
        .unwrap();

        assert_eq!(condition.to_string(), "AND(AND(a = 1, b = 2), c = 3, d = 4)");
    }

    #[test]
    fn test_leaf_after_compound_scope() {
        let condition = Predicate::build(|p| {
            p.or(|inner| {
                inner.where_eq("a", 1)?;
                inner.or(|alt| {
                    alt.where_eq("b", 2)?;
                    Ok(())
                })?;
                Ok(())
            })?;
            p.where_eq("c", 3)?;
            Ok(())
        })
        .unwrap()
        .unwrap();

        assert_eq!(condition.to_string(), "AND(OR(a = 1, b = 2), c = 3)");
    }

    #[test]
    fn test_leaves_are_and_ed() {
        let mut predicate = Predicate::new();
        predicate.where_eq("a", 1).unwrap().where_eq("b", 2).unwrap();

        assert_eq!(
            predicate.into_condition(),
            Some(Expr::And {
                children: vec![leaf("a", 1), leaf("b", 2)],
            })
        );
    }

    #[test]
    fn test_bad_operand_leaves_scope_untouched() {
        let mut predicate = Predicate::new();
        predicate.where_eq("a", 1).unwrap();

        let err = predicate.where_cmp("b", CompareOp::Between, 3).unwrap_err();

        assert!(matches!(err, SpecError::MalformedTree(_)));
        assert_eq!(predicate.condition(), Some(&leaf("a", 1)));
    }

    #[test]
    fn test_nested_error_propagates() {
        let result = Predicate::build(|p| {
            p.where_eq("a", 1)?;
            p.or(|inner| {
                inner.where_in("b", Vec::<i64>::new())?;
                inner.where_cmp("c", CompareOp::Like, 5)?;
                Ok(())
            })?;
            Ok(())
        });

        assert!(matches!(result, Err(SpecError::MalformedTree(_))));
    }

    #[test]
    fn test_where_helpers_build_expected_leaves() {
        let condition = Predicate::build(|p| {
            p.where_between("age", 18, 65)?
                .where_pattern("name", &Pattern::new().starts_with("Al"))?
                .where_is_empty("nick")?
                .where_aggregated(Aggregation::Count, "id", CompareOp::Gt, 2)?;
            Ok(())
        })
        .unwrap()
        .unwrap();

        assert_eq!(
            condition.to_string(),
            r#"AND(age BETWEEN [18, 65], name LIKE "Al%", nick IS EMPTY, COUNT(id) > 2)"#
        );
    }
}
