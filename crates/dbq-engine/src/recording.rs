//! In-memory engine that records every spec it receives

use dbq_ir::{QueryKind, QuerySpec};
use std::sync::Mutex;
use tracing::trace;

use crate::{EngineError, ExecutionEngine, Presets, RowSet};

/// Records handed-off specs in order. Find/Group specs answer with the row
/// set preset for their collection (empty if none); write kinds report zero
/// affected rows.
#[derive(Debug, Default)]
pub struct RecordingEngine {
    executed: Mutex<Vec<QuerySpec>>,
    presets: Presets,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows returned for selections on `collection`
    pub fn preset(&self, collection: impl Into<String>, rows: RowSet) -> Result<(), EngineError> {
        self.presets.insert(collection.into(), rows)
    }

    /// Copies of every spec executed so far, in handoff order
    pub fn executed(&self) -> Result<Vec<QuerySpec>, EngineError> {
        let executed = self
            .executed
            .lock()
            .map_err(|_| EngineError::Backend("recording lock poisoned".to_string()))?;
        Ok(executed.clone())
    }
}

impl ExecutionEngine for RecordingEngine {
    fn name(&self) -> &str {
        "recording"
    }

    fn execute(&self, spec: &QuerySpec) -> Result<RowSet, EngineError> {
        trace!(fingerprint = %spec.fingerprint(), "Recording spec");
        self.executed
            .lock()
            .map_err(|_| EngineError::Backend("recording lock poisoned".to_string()))?
            .push(spec.clone());

        match spec.kind() {
            QueryKind::Find | QueryKind::Group => {
                Ok(self.presets.get(&spec.collection)?.unwrap_or_default())
            }
            _ => Ok(RowSet::affected(0)),
        }
    }
}
