//! Error taxonomy shared by the IR checks and the builders

use thiserror::Error;

use crate::QueryKind;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecError {
    /// A mutator was used on a query kind that has no such attribute.
    #[error("`{field}` cannot be configured on a {kind} query")]
    Configuration { kind: QueryKind, field: &'static str },

    #[error("Malformed predicate tree: {0}")]
    MalformedTree(String),

    #[error("Missing {0} name")]
    MissingName(&'static str),

    #[error("Invalid assignment for `{field}`: {reason}")]
    InvalidAssignment { field: String, reason: String },

    #[error("Limit exceeded: {0}")]
    LimitExceeded(String),
}

impl SpecError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        SpecError::MalformedTree(reason.into())
    }
}
