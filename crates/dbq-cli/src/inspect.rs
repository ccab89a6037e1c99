//! Subcommand implementations

use anyhow::{bail, Context, Result};
use dbq_engine::{Executor, RecordingEngine, RowSet};
use dbq_ir::{QueryKind, QuerySpec};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Serialize)]
pub struct SpecReport {
    pub source: String,
    pub kind: QueryKind,
    pub collection: String,
    pub text: String,
    pub fingerprint: String,
    pub placeholders: usize,
}

#[derive(Debug, Serialize)]
pub struct PredicateReport {
    pub text: String,
    pub depth: usize,
    pub placeholders: usize,
}

#[derive(Debug, Serialize)]
pub struct RunReport {
    pub source: String,
    pub fingerprint: String,
    pub rows: RowSet,
}

pub fn read_spec(path: &Path) -> Result<QuerySpec> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let spec = serde_json::from_str(&contents)
        .with_context(|| format!("{} is not a valid query spec", path.display()))?;
    debug!(path = %path.display(), "Loaded spec");
    Ok(spec)
}

/// Check every spec file and describe it
pub fn check_specs(
    executor: &Executor<RecordingEngine>,
    paths: &[PathBuf],
) -> Result<Vec<SpecReport>> {
    paths
        .iter()
        .map(|path| {
            let spec = read_spec(path)?;
            executor
                .check(&spec)
                .with_context(|| format!("{} failed checks", path.display()))?;

            Ok(SpecReport {
                source: path.display().to_string(),
                kind: spec.kind(),
                collection: spec.collection.clone(),
                text: spec.to_string(),
                fingerprint: spec.fingerprint(),
                placeholders: spec.placeholder_count(),
            })
        })
        .collect()
}

/// Parse predicate text and normalize it
pub fn check_predicate(text: &str, max_depth: Option<usize>) -> Result<PredicateReport> {
    let expr = dbq_syntax::parse_predicate(text).context("Failed to parse predicate")?;

    let depth = expr.depth();
    if let Some(max) = max_depth {
        if depth > max {
            bail!("predicate depth {} exceeds {}", depth, max);
        }
    }

    Ok(PredicateReport {
        text: expr.to_string(),
        depth,
        placeholders: expr.placeholder_count(),
    })
}

/// Hand every spec file to the engine, in order
pub fn run_specs(
    executor: &Executor<RecordingEngine>,
    paths: &[PathBuf],
) -> Result<Vec<RunReport>> {
    let mut reports = Vec::with_capacity(paths.len());
    for path in paths {
        let spec = read_spec(path)?;
        let rows = executor
            .execute(&spec)
            .with_context(|| format!("Failed to execute {}", path.display()))?;
        reports.push(RunReport {
            source: path.display().to_string(),
            fingerprint: spec.fingerprint(),
            rows,
        });
    }
    info!(specs = reports.len(), "Run complete");
    Ok(reports)
}
