//! Built specs handed to an engine through the executor
//!
//! Run with: cargo test --package dbq-engine --test handoff

use dbq_builder::prelude::*;
use dbq_engine::{EngineError, ExecutionEngine, Executor, RecordingEngine, RowSet};
use dbq_ir::{CollectionSchema, DataType, FieldType, Limits};
use dbq_registry::{CollectionRegistry, RegistryError};

fn users_registry() -> CollectionRegistry {
    let mut registry = CollectionRegistry::default();
    registry.register(CollectionSchema::new(
        "users",
        vec![
            FieldType {
                name: "id".to_string(),
                data_type: DataType::Int,
                nullable: false,
            },
            FieldType {
                name: "name".to_string(),
                data_type: DataType::String,
                nullable: true,
            },
        ],
    ));
    registry
}

#[test]
fn test_specs_recorded_in_handoff_order() {
    let users = Collection::new("users");
    let insert = users
        .insert(|q| {
            q.set("id", 1)?.set("name", "Alice")?;
            Ok(())
        })
        .unwrap();
    let find = users
        .find(|q| {
            q.get("name")?.where_eq("id", 1)?;
            Ok(())
        })
        .unwrap();

    let engine = RecordingEngine::new();
    engine
        .preset(
            "users",
            RowSet::new(vec!["name".to_string()], vec![vec!["Alice".into()]]),
        )
        .unwrap();
    let executor = Executor::new(engine).with_registry(users_registry());

    assert_eq!(executor.execute(&insert).unwrap(), RowSet::affected(0));
    let rows = executor.execute(&find).unwrap();
    assert_eq!(rows.row_count, 1);
    assert_eq!(rows.rows[0][0], "Alice");

    let executed = executor.engine().executed().unwrap();
    assert_eq!(executed, vec![insert, find]);
    assert_eq!(executor.engine().name(), "recording");
}

#[test]
fn test_schema_errors_stop_handoff() {
    let spec = Collection::new("users")
        .delete(|q| {
            q.where_eq("email", "a@b.c")?;
            Ok(())
        })
        .unwrap();

    let executor = Executor::new(RecordingEngine::new()).with_registry(users_registry());

    assert!(matches!(
        executor.execute(&spec),
        Err(EngineError::Registry(RegistryError::UnknownField { .. }))
    ));
    assert!(executor.engine().executed().unwrap().is_empty());
}

#[test]
fn test_join_limit() {
    let spec = Collection::new("users")
        .find(|q| {
            for target in ["a", "b"] {
                q.left_join(target, |j| {
                    j.where_field_eq(format!("{}.user_id", target), "users.id")?;
                    Ok(())
                })?;
            }
            Ok(())
        })
        .unwrap();

    let executor = Executor::new(RecordingEngine::new()).with_limits(Limits {
        max_depth: None,
        max_joins: Some(1),
    });

    assert!(matches!(
        executor.execute(&spec),
        Err(EngineError::Spec(SpecError::LimitExceeded(_)))
    ));
}

#[test]
fn test_deserialized_spec_is_checked() {
    let json = r#"{"collection": "", "body": {"kind": "Delete"}}"#;
    let spec: QuerySpec = serde_json::from_str(json).unwrap();

    let executor = Executor::new(RecordingEngine::new());
    assert!(matches!(
        executor.execute(&spec),
        Err(EngineError::Spec(SpecError::MissingName(_)))
    ));
}
