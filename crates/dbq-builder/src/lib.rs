//! DBQ builder - fluent construction of query specs
//!
//! ```
//! use dbq_builder::prelude::*;
//!
//! let users = Collection::new("users");
//! let spec = users.find(|q| {
//!     q.get("name")?.where_gt("age", 30)?;
//!     q.or(|p| {
//!         p.where_eq("role", "admin")?;
//!         Ok(())
//!     })?;
//!     Ok(())
//! })?;
//!
//! assert_eq!(
//!     spec.to_string(),
//!     r#"FIND users GET [name] WHERE OR(age > 30, role = "admin")"#
//! );
//! # Ok::<(), dbq_builder::SpecError>(())
//! ```

pub mod collection;
pub mod join;
pub mod pattern;
pub mod predicate;
pub mod query;
pub mod scope;

pub use collection::Collection;
pub use dbq_ir::SpecError;
pub use join::JoinBuilder;
pub use pattern::Pattern;
pub use predicate::{Conditional, Predicate};
pub use query::QueryBuilder;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::collection::Collection;
    pub use crate::join::JoinBuilder;
    pub use crate::pattern::Pattern;
    pub use crate::predicate::{Conditional, Predicate};
    pub use crate::query::QueryBuilder;
    pub use dbq_ir::{
        Aggregation, CompareOp, Expr, GroupKey, JoinKind, QueryKind, QuerySpec, SortOrder,
        SpecError, Value,
    };
}
