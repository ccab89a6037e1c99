//! dbq-inspect: check, render and dry-run DBQ query specs
//!
//! Reads sealed specs as JSON (or predicate text), applies the configured
//! limits and schema checks, and prints the rendered form and fingerprint.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dbq_engine::{Executor, RecordingEngine};
use dbq_registry::CollectionRegistry;
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

mod config;
mod inspect;
mod logging;

use config::Config;

#[derive(Debug, Parser)]
#[command(name = "dbq-inspect", version, about = "Check and render DBQ query specs")]
struct Cli {
    /// Configuration file; missing files fall back to defaults
    #[arg(long, env = "DBQ_CONFIG", default_value = "dbq.yaml")]
    config: PathBuf,

    /// Collection schema file, overrides `registry.schema_path`
    #[arg(long)]
    schema: Option<PathBuf>,

    /// Print reports as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Check spec files and print their rendered form and fingerprint
    Spec { files: Vec<PathBuf> },
    /// Parse predicate text and print it normalized
    Predicate { text: String },
    /// Hand spec files to the recording engine
    Run { files: Vec<PathBuf> },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = Config::load_or_default(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    config.apply_logging_env();
    logging::init()?;

    info!(config = %cli.config.display(), "dbq-inspect starting");
    let executor = build_executor(&cli, &config)?;

    match &cli.command {
        Command::Spec { files } => {
            let reports = inspect::check_specs(&executor, files)?;
            print_reports(cli.json, &reports, |r| {
                format!(
                    "{}\n  {}\n  fingerprint: {}  placeholders: {}",
                    r.source, r.text, r.fingerprint, r.placeholders
                )
            })?;
        }
        Command::Predicate { text } => {
            let report = inspect::check_predicate(text, config.builder.max_depth)?;
            print_reports(cli.json, &[report], |r| {
                format!("{}\n  depth: {}  placeholders: {}", r.text, r.depth, r.placeholders)
            })?;
        }
        Command::Run { files } => {
            let reports = inspect::run_specs(&executor, files)?;
            print_reports(cli.json, &reports, |r| {
                format!("{}\n  {} rows  fingerprint: {}", r.source, r.rows.row_count, r.fingerprint)
            })?;
        }
    }

    Ok(())
}

fn build_executor(cli: &Cli, config: &Config) -> Result<Executor<RecordingEngine>> {
    let executor = Executor::new(RecordingEngine::new()).with_limits(config.limits());

    let schema = cli
        .schema
        .clone()
        .or_else(|| config.registry.schema_path.as_ref().map(PathBuf::from));

    match schema {
        Some(path) => {
            let registry = CollectionRegistry::load(&path)
                .with_context(|| format!("Failed to load schema {}", path.display()))?;
            info!(
                path = %path.display(),
                collections = registry.len(),
                "Schema validation enabled"
            );
            Ok(executor.with_registry(registry))
        }
        None => Ok(executor),
    }
}

fn print_reports<T: Serialize>(
    json: bool,
    reports: &[T],
    render: impl Fn(&T) -> String,
) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(reports)?);
    } else {
        for report in reports {
            println!("{}", render(report));
        }
    }
    Ok(())
}
