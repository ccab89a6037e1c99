//! Built specs checked against registered collection schemas
//!
//! Run with: cargo test --package dbq-registry --test validation

use dbq_builder::prelude::*;
use dbq_ir::{CollectionSchema, DataType, FieldType};
use dbq_registry::{CollectionRegistry, CollectionResolver, RegistryError};

fn field(name: &str, data_type: DataType, nullable: bool) -> FieldType {
    FieldType {
        name: name.to_string(),
        data_type,
        nullable,
    }
}

fn registry() -> CollectionRegistry {
    let mut registry = CollectionRegistry::new("1.0.0");
    registry.register(CollectionSchema::new(
        "users",
        vec![
            field("id", DataType::Int, false),
            field("name", DataType::String, true),
            field("age", DataType::Int, true),
            field("score", DataType::Float, true),
        ],
    ));
    registry.register(CollectionSchema::new(
        "orders",
        vec![
            field("user_id", DataType::Int, false),
            field("total", DataType::Float, true),
        ],
    ));
    registry
}

#[test]
fn test_valid_find_with_join() {
    let spec = Collection::new("users")
        .find(|q| {
            q.get("name")?.order_by("age", SortOrder::Desc)?;
            q.inner_join("orders", |j| {
                j.on("orders.user_id", "users.id")?;
                j.where_gt("orders.total", 10)?;
                Ok(())
            })?;
            q.where_between("age", 18, 65)?;
            q.where_gt("score", 2)?;
            Ok(())
        })
        .unwrap();

    registry().validate(&spec).unwrap();
}

#[test]
fn test_unknown_collection() {
    let spec = Collection::new("accounts").delete(|_| Ok(())).unwrap();
    let registry = registry();

    assert!(!registry.exists("accounts"));
    assert!(matches!(
        registry.validate(&spec),
        Err(RegistryError::UnknownCollection(name)) if name == "accounts"
    ));
}

#[test]
fn test_unknown_field() {
    let spec = Collection::new("users")
        .find(|q| {
            q.where_eq("email", "a@b.c")?;
            Ok(())
        })
        .unwrap();

    match registry().validate(&spec) {
        Err(RegistryError::UnknownField { collection, field }) => {
            assert_eq!(collection, "users");
            assert_eq!(field, "email");
        }
        other => panic!("expected UnknownField, got {:?}", other),
    }
}

#[test]
fn test_qualified_field_outside_joins() {
    let spec = Collection::new("users")
        .find(|q| {
            q.where_eq("orders.total", 1.5)?;
            Ok(())
        })
        .unwrap();

    assert!(matches!(
        registry().validate(&spec),
        Err(RegistryError::UnknownCollection(name)) if name == "orders"
    ));
}

#[test]
fn test_type_mismatch_in_list() {
    let spec = Collection::new("users")
        .find(|q| {
            q.where_in("age", vec![Value::Int(1), Value::from("two")])?;
            Ok(())
        })
        .unwrap();

    assert!(matches!(
        registry().validate(&spec),
        Err(RegistryError::TypeMismatch { actual: "string", .. })
    ));
}

#[test]
fn test_insert_null_into_required_field() {
    let spec = Collection::new("users")
        .insert(|q| {
            q.set("id", Value::Null)?.set("name", "Alice")?;
            Ok(())
        })
        .unwrap();

    assert!(matches!(
        registry().validate(&spec),
        Err(RegistryError::NotNullable(name)) if name == "id"
    ));
}

#[test]
fn test_aggregated_and_prepared_operands_skip_type_check() {
    let spec = Collection::new("orders")
        .group(|q| {
            q.get_aggregated(Aggregation::Count, "user_id")?.group_by("user_id")?;
            q.where_aggregated(Aggregation::Avg, "total", CompareOp::Gt, 2.5)?;
            q.where_prepared("user_id", CompareOp::Eq)?;
            Ok(())
        })
        .unwrap();

    registry().validate(&spec).unwrap();
}

#[test]
fn test_update_assignment_types() {
    let ok = Collection::new("users")
        .update(|q| {
            q.add("age", 1)?.multiply("score", 1.5)?;
            Ok(())
        })
        .unwrap();
    registry().validate(&ok).unwrap();

    let bad = Collection::new("users")
        .update(|q| {
            q.set("age", "old")?;
            Ok(())
        })
        .unwrap();
    assert!(matches!(
        registry().validate(&bad),
        Err(RegistryError::TypeMismatch { .. })
    ));
}

#[test]
fn test_subqueries_and_unions_are_validated() {
    let buyers = Collection::new("orders")
        .group(|q| {
            q.get("user_id")?
                .group_by("user_id")?
                .group_by_aggregated(Aggregation::Sum, "total")?;
            Ok(())
        })
        .unwrap();
    let spec = Collection::new("users")
        .find(|q| {
            q.get("name")?.where_in_query("id", buyers.clone())?;
            q.union(Collection::new("users").find(|u| {
                u.get("name")?.where_lt("age", 18)?;
                Ok(())
            })?)?;
            Ok(())
        })
        .unwrap();
    registry().validate(&spec).unwrap();

    let bad_subquery = Collection::new("users")
        .find(|q| {
            q.where_in_query(
                "id",
                Collection::new("orders").find(|s| {
                    s.get("customer")?;
                    Ok(())
                })?,
            )?;
            Ok(())
        })
        .unwrap();
    assert!(matches!(
        registry().validate(&bad_subquery),
        Err(RegistryError::UnknownField { collection, field })
            if collection == "orders" && field == "customer"
    ));

    let bad_union = Collection::new("users")
        .find(|q| {
            q.union(Collection::new("accounts").find(|_| Ok(()))?)?;
            Ok(())
        })
        .unwrap();
    assert!(matches!(
        registry().validate(&bad_union),
        Err(RegistryError::UnknownCollection(name)) if name == "accounts"
    ));

    let bad_group = Collection::new("orders")
        .group(|q| {
            q.group_by_aggregated(Aggregation::Max, "discount")?;
            Ok(())
        })
        .unwrap();
    assert!(matches!(
        registry().validate(&bad_group),
        Err(RegistryError::UnknownField { field, .. }) if field == "discount"
    ));
}
