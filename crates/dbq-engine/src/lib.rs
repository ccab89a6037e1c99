//! Execution boundary for sealed query specs
//!
//! DBQ does not execute anything itself. An [`ExecutionEngine`] receives
//! sealed specs; the [`Executor`] re-checks each spec (limits, optional
//! schema validation) before handing it off and applies the row budget to
//! the result.

use dbq_ir::{Limits, QuerySpec, SpecError};
use dbq_registry::{CollectionRegistry, RegistryError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

mod recording;

pub use recording::RecordingEngine;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid spec: {0}")]
    Spec(#[from] SpecError),

    #[error("Schema validation failed: {0}")]
    Registry(#[from] RegistryError),

    #[error("Budget exceeded: {0}")]
    BudgetExceeded(String),

    #[error("Engine error: {0}")]
    Backend(String),
}

/// Result rows of one executed spec
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
    pub row_count: usize,
}

impl RowSet {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<serde_json::Value>>) -> Self {
        let row_count = rows.len();
        Self {
            columns,
            rows,
            row_count,
        }
    }

    /// Row set reporting only an affected-row count (insert/update/delete)
    pub fn affected(row_count: usize) -> Self {
        Self {
            row_count,
            ..Self::default()
        }
    }
}

/// Anything that can run a sealed spec
pub trait ExecutionEngine {
    fn name(&self) -> &str;

    fn execute(&self, spec: &QuerySpec) -> Result<RowSet, EngineError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionBudget {
    pub max_rows: Option<u64>,
}

/// Checks specs and hands them to an engine
pub struct Executor<E> {
    engine: E,
    limits: Limits,
    registry: Option<CollectionRegistry>,
    budget: ExecutionBudget,
}

impl<E: ExecutionEngine> Executor<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            limits: Limits::default(),
            registry: None,
            budget: ExecutionBudget::default(),
        }
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_registry(mut self, registry: CollectionRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_budget(mut self, budget: ExecutionBudget) -> Self {
        self.budget = budget;
        self
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn registry(&self) -> Option<&CollectionRegistry> {
        self.registry.as_ref()
    }

    /// Structural checks, limits and (if configured) schema validation
    pub fn check(&self, spec: &QuerySpec) -> Result<(), EngineError> {
        spec.check_with(&self.limits)?;
        if let Some(registry) = &self.registry {
            registry.validate(spec)?;
        }
        Ok(())
    }

    pub fn execute(&self, spec: &QuerySpec) -> Result<RowSet, EngineError> {
        if let Err(e) = self.check(spec) {
            warn!(collection = %spec.collection, error = %e, "Rejected spec before handoff");
            return Err(e);
        }

        let fingerprint = spec.fingerprint();
        debug!(
            engine = self.engine.name(),
            kind = %spec.kind(),
            collection = %spec.collection,
            fingerprint = %fingerprint,
            placeholders = spec.placeholder_count(),
            "Handing spec to engine"
        );

        let start = Instant::now();
        let rows = self.engine.execute(spec)?;

        if let Some(max_rows) = self.budget.max_rows {
            if rows.row_count as u64 > max_rows {
                return Err(EngineError::BudgetExceeded(format!(
                    "Max rows ({}) exceeded",
                    max_rows
                )));
            }
        }

        info!(
            engine = self.engine.name(),
            fingerprint = %fingerprint,
            row_count = rows.row_count,
            duration_ms = start.elapsed().as_millis() as u64,
            "Spec executed"
        );
        Ok(rows)
    }
}

/// Results keyed by collection name; shared by in-memory engines
#[derive(Debug, Default)]
pub(crate) struct Presets {
    rows: Mutex<HashMap<String, RowSet>>,
}

impl Presets {
    pub(crate) fn insert(&self, collection: String, rows: RowSet) -> Result<(), EngineError> {
        self.rows
            .lock()
            .map_err(|_| EngineError::Backend("preset lock poisoned".to_string()))?
            .insert(collection, rows);
        Ok(())
    }

    pub(crate) fn get(&self, collection: &str) -> Result<Option<RowSet>, EngineError> {
        let rows = self
            .rows
            .lock()
            .map_err(|_| EngineError::Backend("preset lock poisoned".to_string()))?;
        Ok(rows.get(collection).cloned())
    }
}
