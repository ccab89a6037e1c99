//! Pest-based parser for the predicate and query text formats

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use dbq_ir::{
    Aggregation, CompareOp, Comparison, Connective, Expr, FieldRef, GroupKey, JoinKind, JoinSpec,
    Limit, Projection, QueryBody, QueryKind, QuerySpec, Selection, SortKey, SortOrder, SpecError,
    Value, TIMESTAMP_FORMAT,
};
use pest::iterators::{Pair, Pairs};
use pest::Parser;
use pest_derive::Parser;
use thiserror::Error;
use uuid::Uuid;

#[derive(Parser)]
#[grammar = "predicate.pest"]
pub struct PredicateParser;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Syntax error: {0}")]
    Syntax(String),

    #[error("Pest error: {0}")]
    Pest(#[from] pest::error::Error<Rule>),

    #[error("Invalid literal `{text}`: {reason}")]
    Literal { text: String, reason: String },

    #[error("Invalid predicate: {0}")]
    Invalid(#[from] SpecError),
}

/// Parse predicate text such as `AND(age > 30, NOT(email IS NULL))`
pub fn parse_predicate(source: &str) -> Result<Expr, ParseError> {
    let mut pairs = PredicateParser::parse(Rule::predicate, source)?;
    let predicate = next(&mut pairs, "predicate")?;
    let expr = next(&mut predicate.into_inner(), "expression")?;
    build_expr(expr)
}

/// Parse a single literal such as `42`, `"Alice"` or `[1, 2]`
pub fn parse_value(source: &str) -> Result<Value, ParseError> {
    let mut pairs = PredicateParser::parse(Rule::value_input, source)?;
    let input = next(&mut pairs, "value")?;
    let value = next(&mut input.into_inner(), "value")?;
    build_value(value)
}

/// Parse a rendered Find or Group spec such as
/// `FIND users GET [name] WHERE age > 30 ORDER BY age DESC`
pub fn parse_query(source: &str) -> Result<QuerySpec, ParseError> {
    let mut pairs = PredicateParser::parse(Rule::query_input, source)?;
    let input = next(&mut pairs, "query")?;
    let spec = build_query(next(&mut input.into_inner(), "query")?)?;
    spec.check()?;
    Ok(spec)
}

fn next<'i>(pairs: &mut Pairs<'i, Rule>, what: &str) -> Result<Pair<'i, Rule>, ParseError> {
    pairs
        .next()
        .ok_or_else(|| ParseError::Syntax(format!("Missing {}", what)))
}

fn build_expr(pair: Pair<Rule>) -> Result<Expr, ParseError> {
    match pair.as_rule() {
        Rule::and_node => Ok(Expr::combine(Connective::And, build_children(pair)?)?),
        Rule::or_node => Ok(Expr::combine(Connective::Or, build_children(pair)?)?),
        Rule::not_node => {
            let child = next(&mut pair.into_inner(), "NOT operand")?;
            Ok(Expr::not(build_expr(child)?))
        }
        Rule::comparison => Ok(build_comparison(pair)?.into()),
        rule => Err(ParseError::Syntax(format!("Unexpected {:?}", rule))),
    }
}

fn build_children(pair: Pair<Rule>) -> Result<Vec<Expr>, ParseError> {
    pair.into_inner().map(build_expr).collect()
}

fn build_comparison(pair: Pair<Rule>) -> Result<Comparison, ParseError> {
    let mut inner = pair.into_inner();
    let (aggregation, field) = build_operand(next(&mut inner, "field")?)?;

    let op_pair = next(&mut inner, "operator")?;
    let comparison = match op_pair.as_rule() {
        Rule::unary_op => {
            // `IS NULL` / `IS EMPTY` with any whitespace in between
            let op = match op_pair.as_str().split_whitespace().last() {
                Some("NULL") => CompareOp::IsNull,
                Some("EMPTY") => CompareOp::IsEmpty,
                _ => {
                    let op = op_pair.as_str();
                    return Err(ParseError::Syntax(format!("Unknown operator: {}", op)));
                }
            };
            Comparison::new(field, op, Value::Null)?
        }
        _ => {
            let op = match op_pair.as_str() {
                "=" => CompareOp::Eq,
                "!=" => CompareOp::Ne,
                ">" => CompareOp::Gt,
                ">=" => CompareOp::Ge,
                "<" => CompareOp::Lt,
                "<=" => CompareOp::Le,
                "LIKE" => CompareOp::Like,
                "IN" => CompareOp::In,
                "BETWEEN" => CompareOp::Between,
                other => return Err(ParseError::Syntax(format!("Unknown operator: {}", other))),
            };
            let value = build_value(next(&mut inner, "value")?)?;
            Comparison::new(field, op, value)?
        }
    };

    Ok(match aggregation {
        Some(aggregation) => comparison.with_aggregation(aggregation),
        None => comparison,
    })
}

/// `field` or `AGG(field)`
fn build_operand(pair: Pair<Rule>) -> Result<(Option<Aggregation>, FieldRef), ParseError> {
    match pair.as_rule() {
        Rule::aggregated => {
            let mut parts = pair.into_inner();
            let aggregation = build_aggregation(next(&mut parts, "aggregation")?)?;
            Ok((Some(aggregation), build_field(next(&mut parts, "field")?)?))
        }
        _ => Ok((None, build_field(pair)?)),
    }
}

fn build_aggregation(pair: Pair<Rule>) -> Result<Aggregation, ParseError> {
    match pair.as_str() {
        "COUNT" => Ok(Aggregation::Count),
        "SUM" => Ok(Aggregation::Sum),
        "AVG" => Ok(Aggregation::Avg),
        "MIN" => Ok(Aggregation::Min),
        "MAX" => Ok(Aggregation::Max),
        other => Err(ParseError::Syntax(format!("Unknown aggregation: {}", other))),
    }
}

fn build_field(pair: Pair<Rule>) -> Result<FieldRef, ParseError> {
    let segments = pair
        .into_inner()
        .map(|segment| match segment.as_rule() {
            Rule::quoted_ident => unescape(inner_text(segment)?),
            _ => Ok(segment.as_str().to_string()),
        })
        .collect::<Result<Vec<_>, _>>()?;

    match <[String; 2]>::try_from(segments) {
        Ok([collection, name]) => Ok(FieldRef::qualified(collection, name)),
        Err(mut segments) => match segments.pop() {
            Some(name) if segments.is_empty() => Ok(FieldRef::new(name)),
            _ => Err(ParseError::Syntax("Malformed field reference".to_string())),
        },
    }
}

fn build_value(pair: Pair<Rule>) -> Result<Value, ParseError> {
    let text = pair.as_str();
    let value = match pair.as_rule() {
        Rule::null => Value::Null,
        Rule::boolean => Value::Bool(text == "true"),
        Rule::int => Value::Int(text.parse().map_err(|e| literal(text, e))?),
        Rule::float => Value::Float(text.parse().map_err(|e| literal(text, e))?),
        Rule::string => Value::String(unescape(inner_text(pair)?)?),
        Rule::bytes => Value::Bytes(hex::decode(inner_text(pair)?).map_err(|e| literal(text, e))?),
        Rule::uuid => {
            Value::Uuid(Uuid::parse_str(inner_text(pair)?).map_err(|e| literal(text, e))?)
        }
        Rule::timestamp => {
            Value::Timestamp(parse_timestamp(inner_text(pair)?).map_err(|e| literal(text, e))?)
        }
        Rule::field_value => Value::Field(build_field(next(&mut pair.into_inner(), "field")?)?),
        Rule::prepared => Value::Prepared,
        Rule::subquery => {
            let query = build_query(next(&mut pair.into_inner(), "subquery")?)?;
            Value::Subquery(Box::new(query))
        }
        Rule::array => Value::Array(pair.into_inner().map(build_value).collect::<Result<_, _>>()?),
        rule => return Err(ParseError::Syntax(format!("Unexpected {:?}", rule))),
    };
    Ok(value)
}

/// Rendered timestamps (signed extended years included), falling back to
/// RFC 3339 with an explicit offset
fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .or_else(|_| DateTime::parse_from_rfc3339(text).map(|ts| ts.with_timezone(&Utc)))
}

fn build_query(pair: Pair<Rule>) -> Result<QuerySpec, ParseError> {
    let mut clauses = pair.into_inner();
    let kind = match next(&mut clauses, "query kind")?.as_str() {
        "FIND" => QueryKind::Find,
        "GROUP" => QueryKind::Group,
        other => return Err(ParseError::Syntax(format!("Unknown query kind: {}", other))),
    };
    let mut spec = QuerySpec::empty(kind, build_name(next(&mut clauses, "collection")?)?);
    let mut selection = Selection::default();

    for clause in clauses {
        match clause.as_rule() {
            Rule::projections => {
                selection.projections = clause
                    .into_inner()
                    .map(build_projection)
                    .collect::<Result<_, _>>()?;
            }
            Rule::join => spec.joins.push(build_join(clause)?),
            Rule::where_clause => {
                let condition = next(&mut clause.into_inner(), "condition")?;
                spec.condition = Some(build_expr(condition)?);
            }
            Rule::group_clause => {
                for operand in clause.into_inner() {
                    let (aggregation, field) = build_operand(operand)?;
                    selection.group_by.push(GroupKey { field, aggregation });
                }
            }
            Rule::order_clause => {
                selection.order_by = clause
                    .into_inner()
                    .map(build_sort_key)
                    .collect::<Result<_, _>>()?;
            }
            Rule::limit_clause => {
                let mut numbers = clause.into_inner();
                let limit = build_number(next(&mut numbers, "limit")?)?;
                let offset = build_number(next(&mut numbers, "offset")?)?;
                selection.limit = Some(Limit { limit, offset });
            }
            Rule::union_clause => {
                let union = next(&mut clause.into_inner(), "union")?;
                selection.unions.push(build_query(union)?);
            }
            rule => return Err(ParseError::Syntax(format!("Unexpected {:?}", rule))),
        }
    }

    spec.body = match kind {
        QueryKind::Group => QueryBody::Group(selection),
        _ => QueryBody::Find(selection),
    };
    Ok(spec)
}

fn build_name(pair: Pair<Rule>) -> Result<String, ParseError> {
    let segment = next(&mut pair.into_inner(), "name")?;
    match segment.as_rule() {
        Rule::quoted_ident => unescape(inner_text(segment)?),
        _ => Ok(segment.as_str().to_string()),
    }
}

fn build_projection(pair: Pair<Rule>) -> Result<Projection, ParseError> {
    let mut inner = pair.into_inner();
    let (aggregation, field) = build_operand(next(&mut inner, "projection")?)?;
    let alias = inner.next().map(build_name).transpose()?;
    Ok(Projection {
        field,
        aggregation,
        alias,
    })
}

fn build_join(pair: Pair<Rule>) -> Result<JoinSpec, ParseError> {
    let mut inner = pair.into_inner();
    let kind = match next(&mut inner, "join kind")?.as_str() {
        "INNER" => JoinKind::Inner,
        "LEFT" => JoinKind::Left,
        "RIGHT" => JoinKind::Right,
        "FULL" => JoinKind::Full,
        other => return Err(ParseError::Syntax(format!("Unknown join kind: {}", other))),
    };
    let target = build_name(next(&mut inner, "join target")?)?;
    let condition = build_expr(next(&mut inner, "join condition")?)?;
    Ok(JoinSpec {
        target,
        kind,
        condition,
    })
}

fn build_sort_key(pair: Pair<Rule>) -> Result<SortKey, ParseError> {
    let mut inner = pair.into_inner();
    let (aggregation, field) = build_operand(next(&mut inner, "sort key")?)?;
    let order = match next(&mut inner, "sort order")?.as_str() {
        "DESC" => SortOrder::Desc,
        _ => SortOrder::Asc,
    };
    Ok(SortKey {
        field,
        aggregation,
        order,
    })
}

fn build_number(pair: Pair<Rule>) -> Result<u64, ParseError> {
    let text = pair.as_str();
    text.parse().map_err(|e| literal(text, e))
}

fn literal(text: &str, reason: impl ToString) -> ParseError {
    ParseError::Literal {
        text: text.to_string(),
        reason: reason.to_string(),
    }
}

/// Text between the delimiters of a quoted token
fn inner_text(pair: Pair<'_, Rule>) -> Result<&str, ParseError> {
    let text = next(&mut pair.into_inner(), "quoted text")?;
    Ok(text.as_str())
}

fn unescape(raw: &str) -> Result<String, ParseError> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some(c @ ('\\' | '"' | '`')) => out.push(c),
            Some(other) => return Err(literal(raw, format!("unknown escape `\\{}`", other))),
            None => return Err(literal(raw, "dangling escape")),
        }
    }
    Ok(out)
}
