//! DBQ predicate text format
//!
//! Parses the one-line rendering produced by `Expr`'s `Display` impl back
//! into a predicate tree, so rendered conditions can be stored in logs or
//! config files and rebuilt later. Find and Group specs, which may appear
//! as subqueries and unions, parse back the same way.
//!
//! ```
//! use dbq_syntax::{parse_predicate, parse_query};
//!
//! let expr = parse_predicate("AND(age > 30, NOT(email IS NULL))").unwrap();
//! assert_eq!(expr.to_string(), "AND(age > 30, NOT(email IS NULL))");
//!
//! let text = "FIND users GET [name] WHERE id IN (FIND orders GET [user_id])";
//! assert_eq!(parse_query(text).unwrap().to_string(), text);
//! ```

mod parser;

pub use parser::{parse_predicate, parse_query, parse_value, ParseError, Rule};
