//! Join spec builder

use dbq_ir::{Expr, FieldRef, JoinKind, JoinSpec, SpecError};

use crate::predicate::{Conditional, Slot};

/// Scope handed to `join` callbacks; builds the join condition
#[derive(Debug)]
pub struct JoinBuilder {
    target: String,
    kind: JoinKind,
    condition: Option<Expr>,
    merged: bool,
}

impl JoinBuilder {
    pub fn new(target: impl Into<String>, kind: JoinKind) -> Self {
        Self {
            target: target.into(),
            kind,
            condition: None,
            merged: false,
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn kind(&self) -> JoinKind {
        self.kind
    }

    /// Join rows where `left` equals `right`
    pub fn on(
        &mut self,
        left: impl Into<FieldRef>,
        right: impl Into<FieldRef>,
    ) -> Result<&mut Self, SpecError> {
        self.where_field_eq(left, right)
    }

    /// Finish the join; a join without a condition is rejected
    pub fn finish(self) -> Result<JoinSpec, SpecError> {
        if self.target.is_empty() {
            return Err(SpecError::MissingName("join target"));
        }
        let condition = self.condition.ok_or_else(|| {
            SpecError::MalformedTree(format!("join on `{}` has no condition", self.target))
        })?;

        Ok(JoinSpec {
            target: self.target,
            kind: self.kind,
            condition,
        })
    }
}

impl Conditional for JoinBuilder {
    fn condition_slot(&mut self) -> Result<Slot<'_>, SpecError> {
        Ok(Slot::new(&mut self.condition, &mut self.merged))
    }
}
