//! Subcommand execution. Every command writes its result to stdout.

use std::io::Read;
use std::path::Path;

use rollup_core::rename::{parse_display_names, rename_identifiers};
use rollup_core::{MatrixSource, RollupConfig, aggregate, normalize, parse_events, project};
use rollup_error::{Result, RollupError};
use rollup_store::{RunKey, Store};
use rollup_types::RunInput;
use tracing::info;

use crate::args::Command;

pub fn execute(command: Command, config: &RollupConfig) -> Result<String> {
    match command {
        Command::Help => Ok(crate::args::HELP.to_owned()),
        Command::Munge { input } => munge(input.as_deref()),
        Command::Aggregate { depth, input } => {
            let run = read_run(input.as_deref())?;
            let groups = aggregate(&run.tests, depth.unwrap_or(config.depth))?;
            Ok(serde_json::to_string_pretty(&groups)?)
        }
        Command::Table {
            depth,
            strict,
            runs,
        } => {
            let config = overlay(config, depth, strict);
            let mut sources = Vec::with_capacity(runs.len());
            for path in &runs {
                let run = read_run(Some(path.as_path()))?;
                sources.push(MatrixSource::from_aggregate(
                    implementation_id(path)?,
                    &run,
                    config.depth,
                )?);
            }
            Ok(project(&sources, &config.matrix_options())?.to_markdown())
        }
        Command::Ingest { replace, db, runs } => {
            let replace = replace || config.replace_existing_runs;
            let mut store = Store::open(&db)?;
            let mut report = Vec::with_capacity(runs.len());
            for path in &runs {
                let id = implementation_id(path)?;
                let run = read_run(Some(path.as_path()))?;
                let summary = store.load_run(&id, &run, replace)?;
                report.push(format!(
                    "{id}@{}: {} results ({} synthesized), {} metadata rows",
                    run.info().version_or_unknown(),
                    summary.results,
                    summary.synthesized,
                    summary.metadata
                ));
            }
            Ok(report.join("\n"))
        }
        Command::Rollups {
            db,
            implementation,
            version,
        } => {
            let store = open_existing(&db)?;
            let key = RunKey::new(implementation, version);
            if store.run(&key)?.is_none() {
                return Err(RollupError::UnknownSource(key.to_string()));
            }
            Ok(serde_json::to_string_pretty(&store.rollups(&key)?)?)
        }
        Command::DbTable { depth, strict, db } => {
            let config = overlay(config, depth, strict);
            let store = open_existing(&db)?;
            let mut sources = Vec::new();
            for run in store.runs()? {
                sources.push(store.matrix_source(
                    &run.key(),
                    run.implementation_id.clone(),
                    config.depth,
                )?);
            }
            info!(sources = sources.len(), "rendering stored runs");
            Ok(project(&sources, &config.matrix_options())?.to_markdown())
        }
        Command::Rename { names, document } => {
            let raw_names = read_file(&names)?;
            let names = parse_display_names(&names.display().to_string(), &raw_names)?;
            Ok(rename_identifiers(&read_file(&document)?, &names))
        }
    }
}

fn overlay(config: &RollupConfig, depth: Option<usize>, strict: bool) -> RollupConfig {
    RollupConfig {
        depth: depth.unwrap_or(config.depth),
        strict_metadata: strict || config.strict_metadata,
        ..config.clone()
    }
}

fn munge(input: Option<&Path>) -> Result<String> {
    let raw = read_input(input)?;
    let events = parse_events(&raw)?;
    let records = normalize(events)?;
    let run = RunInput::from_records(records);
    info!(
        tests = run.tests.len(),
        version = run.info().version_or_unknown(),
        "munged events"
    );
    Ok(serde_json::to_string_pretty(&run.to_json_value()?)?)
}

fn read_run(input: Option<&Path>) -> Result<RunInput> {
    let context = input.map_or_else(|| "stdin".to_owned(), |path| path.display().to_string());
    RunInput::from_json_str(&context, &read_input(input)?)
}

fn read_input(input: Option<&Path>) -> Result<String> {
    match input {
        Some(path) => read_file(path),
        None => {
            let mut raw = String::new();
            std::io::stdin().read_to_string(&mut raw)?;
            Ok(raw)
        }
    }
}

fn read_file(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(RollupError::MissingInput(path.display().to_string()));
    }
    Ok(std::fs::read_to_string(path)?)
}

fn open_existing(db: &Path) -> Result<Store> {
    if !db.exists() {
        return Err(RollupError::MissingInput(db.display().to_string()));
    }
    Store::open(db)
}

/// File name up to its first `.`: `kubo.v0.21.json` is `kubo`.
fn implementation_id(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.split('.').next())
        .filter(|id| !id.is_empty())
        .map(str::to_owned)
        .ok_or_else(|| RollupError::MissingInput(format!("implementation id of {}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn implementation_id_stops_at_first_dot() {
        assert_eq!(
            implementation_id(&PathBuf::from("out/kubo.v0.21.json")).unwrap(),
            "kubo"
        );
        assert!(implementation_id(&PathBuf::from(".hidden")).is_err());
    }

    #[test]
    fn flags_overlay_config() {
        let base = RollupConfig {
            depth: 3,
            strict_metadata: true,
            ..RollupConfig::default()
        };
        let merged = overlay(&base, Some(1), false);
        assert_eq!(merged.depth, 1);
        assert!(merged.strict_metadata);
        assert_eq!(overlay(&base, None, false).depth, 3);
    }
}
