//! Rendered predicates parse back into the same tree
//!
//! Run with: cargo test --package dbq-syntax --test round_trip

use chrono::{Duration, TimeZone, Utc};
use dbq_ir::{
    Aggregation, CompareOp, Comparison, Connective, Expr, FieldRef, GroupKey, JoinKind, JoinSpec,
    Limit, Projection, QueryBody, QueryKind, QuerySpec, SortKey, SortOrder, Value,
};
use dbq_syntax::{parse_predicate, parse_query};
use uuid::Uuid;

fn cmp(field: impl Into<FieldRef>, op: CompareOp, value: impl Into<Value>) -> Expr {
    Comparison::new(field, op, value).unwrap().into()
}

fn assert_round_trip(expr: &Expr) {
    let text = expr.to_string();
    let parsed =
        parse_predicate(&text).unwrap_or_else(|e| panic!("failed to parse `{}`: {}", text, e));
    assert_eq!(&parsed, expr, "round trip of `{}`", text);
}

#[test]
fn test_every_operator_round_trips() {
    let leaves = vec![
        cmp("age", CompareOp::Eq, 30),
        cmp("age", CompareOp::Ne, -1),
        cmp("score", CompareOp::Gt, 2.5),
        cmp("score", CompareOp::Ge, 1e-7),
        cmp("score", CompareOp::Lt, 1e100),
        cmp("score", CompareOp::Le, 0.0),
        cmp("name", CompareOp::Like, "Al%"),
        cmp("role", CompareOp::In, vec![Value::from("admin"), Value::from("owner")]),
        cmp("age", CompareOp::Between, vec![Value::Int(18), Value::Int(65)]),
        cmp("email", CompareOp::IsNull, Value::Null),
        cmp("tags", CompareOp::IsEmpty, Value::Null),
    ];

    for leaf in &leaves {
        assert_round_trip(leaf);
    }
    assert_round_trip(&Expr::combine(Connective::And, leaves).unwrap());
}

#[test]
fn test_value_kinds_round_trip() {
    let id = Uuid::parse_str("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap();
    let at = Utc.with_ymd_and_hms(2024, 2, 29, 12, 30, 0).unwrap();

    let exprs = vec![
        cmp("deleted", CompareOp::Eq, false),
        cmp("parent", CompareOp::Eq, Value::Null),
        cmp("blob", CompareOp::Eq, Value::Bytes(vec![0, 1, 0xfe, 0xff])),
        cmp("id", CompareOp::Eq, id),
        cmp("created_at", CompareOp::Ge, at),
        cmp("orders.user_id", CompareOp::Eq, Value::field("users.id")),
        cmp("id", CompareOp::In, Value::Prepared),
        cmp("bio", CompareOp::Eq, "line one\nline \"two\"\t\\"),
        cmp("matrix", CompareOp::In, vec![Value::Array(vec![Value::Int(1)]), Value::Array(vec![])]),
    ];

    for expr in &exprs {
        assert_round_trip(expr);
    }
}

#[test]
fn test_quoted_fields_round_trip() {
    assert_round_trip(&cmp(FieldRef::new("first name"), CompareOp::Eq, "x"));
    assert_round_trip(&cmp(FieldRef::new("a.b"), CompareOp::Eq, 1));
    assert_round_trip(&cmp(FieldRef::qualified("order items", "qty`s"), CompareOp::Gt, 0));
    assert_round_trip(&cmp(FieldRef::new("9lives"), CompareOp::IsNull, Value::Null));
}

#[test]
fn test_nested_connectives_round_trip() {
    let inner = Expr::combine(
        Connective::Or,
        vec![
            cmp("b", CompareOp::Gt, 2),
            Expr::not(cmp("c", CompareOp::IsNull, Value::Null)),
        ],
    )
    .unwrap();
    let tree = Expr::combine(
        Connective::And,
        vec![
            cmp("a", CompareOp::Eq, 1),
            inner,
            Expr::not(Expr::combine(Connective::And, vec![cmp("d", CompareOp::Lt, 4)]).unwrap()),
        ],
    )
    .unwrap();

    assert_eq!(
        tree.to_string(),
        "AND(a = 1, OR(b > 2, NOT(c IS NULL)), NOT(AND(d < 4)))"
    );
    assert_round_trip(&tree);
}

#[test]
fn test_aggregated_round_trip() {
    let expr: Expr = Comparison::new("total", CompareOp::Ge, 100)
        .unwrap()
        .with_aggregation(Aggregation::Sum)
        .into();
    assert_round_trip(&expr);
}

#[test]
fn test_whitespace_is_insignificant() {
    let spaced = parse_predicate("  AND (\n  a = 1 ,\tb   IS   NULL )  ").unwrap();
    assert_eq!(spaced.to_string(), "AND(a = 1, b IS NULL)");
}

#[test]
fn test_timestamps_outside_four_digit_years_round_trip() {
    let stamps = vec![
        Utc.with_ymd_and_hms(12000, 1, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(-44, 3, 15, 9, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(0, 1, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59).unwrap() + Duration::microseconds(1),
    ];

    for at in stamps {
        assert_round_trip(&cmp("at", CompareOp::Eq, at));
    }
    assert_eq!(
        cmp("t", CompareOp::Eq, Utc.with_ymd_and_hms(12000, 1, 1, 0, 0, 0).unwrap()).to_string(),
        r#"t = ts"+12000-01-01T00:00:00Z""#
    );
}

#[test]
fn test_offset_timestamps_are_normalized_to_utc() {
    let parsed = parse_predicate(r#"at = ts"2024-02-29T14:30:00+02:00""#).unwrap();
    assert_eq!(parsed.to_string(), r#"at = ts"2024-02-29T12:30:00Z""#);
}

fn totals_by_user() -> QuerySpec {
    let mut spec = QuerySpec::empty(QueryKind::Group, "orders");
    spec.condition = Some(cmp("status", CompareOp::Ne, "void"));
    if let QueryBody::Group(selection) = &mut spec.body {
        selection.projections.push(Projection {
            field: FieldRef::new("user_id"),
            aggregation: None,
            alias: None,
        });
        selection.group_by.push(GroupKey {
            field: FieldRef::new("user_id"),
            aggregation: None,
        });
        selection.group_by.push(GroupKey {
            field: FieldRef::new("total"),
            aggregation: Some(Aggregation::Max),
        });
    }
    spec
}

#[test]
fn test_subquery_round_trips() {
    let expr = cmp("id", CompareOp::In, totals_by_user());
    assert_eq!(
        expr.to_string(),
        r#"id IN (GROUP orders GET [user_id] WHERE status != "void" GROUP BY user_id, MAX(total))"#
    );
    assert_round_trip(&expr);

    let nested = Expr::combine(
        Connective::Or,
        vec![expr, Expr::not(cmp("id", CompareOp::In, Value::Prepared))],
    )
    .unwrap();
    assert_round_trip(&nested);
}

#[test]
fn test_query_round_trips() {
    let mut spec = QuerySpec::empty(QueryKind::Find, "users");
    spec.joins.push(JoinSpec {
        target: "order items".to_string(),
        kind: JoinKind::Full,
        condition: cmp(
            FieldRef::qualified("order items", "user_id"),
            CompareOp::Eq,
            Value::field("users.id"),
        ),
    });
    spec.condition = Some(cmp("id", CompareOp::In, totals_by_user()));
    if let QueryBody::Find(selection) = &mut spec.body {
        selection.projections.push(Projection {
            field: FieldRef::new("name"),
            aggregation: None,
            alias: Some("user name".to_string()),
        });
        selection.projections.push(Projection {
            field: FieldRef::qualified("order items", "qty"),
            aggregation: Some(Aggregation::Sum),
            alias: Some("qty".to_string()),
        });
        selection.order_by.push(SortKey {
            field: FieldRef::new("name"),
            aggregation: None,
            order: SortOrder::Asc,
        });
        selection.order_by.push(SortKey {
            field: FieldRef::new("qty"),
            aggregation: Some(Aggregation::Count),
            order: SortOrder::Desc,
        });
        selection.limit = Some(Limit {
            limit: 4,
            offset: 4,
        });
        selection.unions.push(totals_by_user());
    }

    let text = spec.to_string();
    let parsed = parse_query(&text).unwrap_or_else(|e| panic!("failed to parse `{}`: {}", text, e));
    assert_eq!(parsed, spec, "round trip of `{}`", text);
    assert_eq!(parsed.fingerprint(), spec.fingerprint());
}

#[test]
fn test_bare_queries_round_trip() {
    for text in [
        "FIND users",
        "GROUP orders GROUP BY region",
        "FIND GROUP WHERE WHERE = 1 LIMIT 1 OFFSET 0",
        "FIND `order items` GET [COUNT AS n]",
    ] {
        assert_eq!(parse_query(text).unwrap().to_string(), text);
    }
    assert_eq!(parse_query("FIND `users`").unwrap().collection, "users");
}
