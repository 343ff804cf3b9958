use std::path::PathBuf;

use rollup_error::{Result, RollupError};

pub const HELP: &str = "\
rollup - fold go test events into per-test records, aggregates and comparison tables

USAGE:
    rollup [GLOBAL OPTIONS] <COMMAND> [ARGS]

COMMANDS:
    munge [--input <events>]                  Events (stdin by default) to run input JSON
    aggregate [--depth N] [--input <run>]     Run input to aggregate groups JSON
    table [--depth N] [--strict] <run>...     Markdown comparison table of run inputs
    ingest [--replace] <db> <run>...          Load run inputs into a SQLite store
    rollups <db> <implementation> <version>   Subtree rollups of one stored run as JSON
    db-table [--depth N] [--strict] <db>      Markdown comparison table of every stored run
    rename <names.json> <doc.md>              Rewrite test identifiers into display names

GLOBAL OPTIONS:
    --config <PATH>   TOML configuration (depth, strict_metadata, replace_existing_runs, spec_url_scheme)
    --log-json        Emit logs as JSON lines on stderr (filter with RUST_LOG, default warn)
    -h, --help        Show this help

The implementation id of a run input is its file name up to the first '.'.
";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Munge {
        input: Option<PathBuf>,
    },
    Aggregate {
        depth: Option<usize>,
        input: Option<PathBuf>,
    },
    Table {
        depth: Option<usize>,
        strict: bool,
        runs: Vec<PathBuf>,
    },
    Ingest {
        replace: bool,
        db: PathBuf,
        runs: Vec<PathBuf>,
    },
    Rollups {
        db: PathBuf,
        implementation: String,
        version: String,
    },
    DbTable {
        depth: Option<usize>,
        strict: bool,
        db: PathBuf,
    },
    Rename {
        names: PathBuf,
        document: PathBuf,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliArgs {
    pub config: Option<PathBuf>,
    pub log_json: bool,
    pub command: Command,
}

/// Flags and positionals of one subcommand.
#[derive(Debug, Default)]
struct SubArgs {
    depth: Option<usize>,
    input: Option<PathBuf>,
    strict: bool,
    replace: bool,
    positionals: Vec<String>,
}

fn take_value(args: &[String], index: &mut usize, flag: &str) -> Result<String> {
    *index += 1;
    args.get(*index)
        .cloned()
        .ok_or_else(|| RollupError::MissingInput(format!("{flag} requires a value")))
}

pub fn parse_args(args: &[String]) -> Result<CliArgs> {
    let mut config = None;
    let mut log_json = false;
    let mut rest = Vec::new();

    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--config" => config = Some(PathBuf::from(take_value(args, &mut index, "--config")?)),
            "--log-json" => log_json = true,
            "-h" | "--help" => {
                return Ok(CliArgs {
                    config,
                    log_json,
                    command: Command::Help,
                });
            }
            _ => rest.push(args[index].clone()),
        }
        index += 1;
    }

    let Some((name, sub)) = rest.split_first() else {
        return Err(RollupError::MissingInput("command".to_owned()));
    };
    let command = parse_command(name, sub)?;
    Ok(CliArgs {
        config,
        log_json,
        command,
    })
}

fn parse_sub_args(name: &str, args: &[String], allowed: &[&str]) -> Result<SubArgs> {
    let mut sub = SubArgs::default();
    let mut index = 0;
    while index < args.len() {
        let arg = args[index].as_str();
        if arg.starts_with("--") && !allowed.contains(&arg) {
            return Err(RollupError::UnknownSource(format!(
                "option {arg} for command {name}"
            )));
        }
        match arg {
            "--depth" => {
                let raw = take_value(args, &mut index, "--depth")?;
                let depth = raw.parse::<usize>().map_err(|error| RollupError::Config {
                    path: "--depth".to_owned(),
                    detail: format!("{raw:?}: {error}"),
                })?;
                sub.depth = Some(depth);
            }
            "--input" => sub.input = Some(PathBuf::from(take_value(args, &mut index, "--input")?)),
            "--strict" => sub.strict = true,
            "--replace" => sub.replace = true,
            _ => sub.positionals.push(args[index].clone()),
        }
        index += 1;
    }
    Ok(sub)
}

fn positional(sub: &SubArgs, position: usize, what: &str) -> Result<String> {
    sub.positionals
        .get(position)
        .cloned()
        .ok_or_else(|| RollupError::MissingInput(what.to_owned()))
}

fn parse_command(name: &str, args: &[String]) -> Result<Command> {
    let command = match name {
        "munge" => {
            let sub = parse_sub_args(name, args, &["--input"])?;
            Command::Munge { input: sub.input }
        }
        "aggregate" => {
            let sub = parse_sub_args(name, args, &["--depth", "--input"])?;
            Command::Aggregate {
                depth: sub.depth,
                input: sub.input,
            }
        }
        "table" => {
            let sub = parse_sub_args(name, args, &["--depth", "--strict"])?;
            if sub.positionals.is_empty() {
                return Err(RollupError::MissingInput("run input files".to_owned()));
            }
            Command::Table {
                depth: sub.depth,
                strict: sub.strict,
                runs: sub.positionals.iter().map(PathBuf::from).collect(),
            }
        }
        "ingest" => {
            let sub = parse_sub_args(name, args, &["--replace"])?;
            let db = positional(&sub, 0, "database path")?;
            if sub.positionals.len() < 2 {
                return Err(RollupError::MissingInput("run input files".to_owned()));
            }
            Command::Ingest {
                replace: sub.replace,
                db: PathBuf::from(db),
                runs: sub.positionals[1..].iter().map(PathBuf::from).collect(),
            }
        }
        "rollups" => {
            let sub = parse_sub_args(name, args, &[])?;
            Command::Rollups {
                db: PathBuf::from(positional(&sub, 0, "database path")?),
                implementation: positional(&sub, 1, "implementation id")?,
                version: positional(&sub, 2, "version")?,
            }
        }
        "db-table" => {
            let sub = parse_sub_args(name, args, &["--depth", "--strict"])?;
            Command::DbTable {
                depth: sub.depth,
                strict: sub.strict,
                db: PathBuf::from(positional(&sub, 0, "database path")?),
            }
        }
        "rename" => {
            let sub = parse_sub_args(name, args, &[])?;
            Command::Rename {
                names: PathBuf::from(positional(&sub, 0, "names file")?),
                document: PathBuf::from(positional(&sub, 1, "markdown document")?),
            }
        }
        unknown => return Err(RollupError::UnknownSource(format!("command {unknown}"))),
    };
    Ok(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|arg| (*arg).to_owned()).collect()
    }

    #[test]
    fn global_flags_may_follow_the_command() {
        let parsed = parse_args(&args(&["table", "--log-json", "a.json", "--config", "r.toml"]))
            .expect("parse");
        assert!(parsed.log_json);
        assert_eq!(parsed.config, Some(PathBuf::from("r.toml")));
        assert_eq!(
            parsed.command,
            Command::Table {
                depth: None,
                strict: false,
                runs: vec![PathBuf::from("a.json")],
            }
        );
    }

    #[test]
    fn ingest_splits_database_from_runs() {
        let parsed =
            parse_args(&args(&["ingest", "--replace", "db.sqlite", "kubo.json", "boxo.json"]))
                .expect("parse");
        assert_eq!(
            parsed.command,
            Command::Ingest {
                replace: true,
                db: PathBuf::from("db.sqlite"),
                runs: vec![PathBuf::from("kubo.json"), PathBuf::from("boxo.json")],
            }
        );
    }

    #[test]
    fn missing_positionals_are_reported() {
        let err = parse_args(&args(&["rollups", "db.sqlite", "kubo"])).expect_err("no version");
        assert!(matches!(err, RollupError::MissingInput(ref what) if what == "version"));

        let err = parse_args(&args(&[])).expect_err("no command");
        assert!(matches!(err, RollupError::MissingInput(_)));
    }

    #[test]
    fn unknown_command_and_option_are_rejected() {
        let err = parse_args(&args(&["publish"])).expect_err("unknown command");
        assert!(matches!(err, RollupError::UnknownSource(_)));

        let err = parse_args(&args(&["munge", "--depth", "2"])).expect_err("unknown option");
        assert!(matches!(err, RollupError::UnknownSource(_)));
    }

    #[test]
    fn depth_must_be_a_number() {
        let err = parse_args(&args(&["aggregate", "--depth", "two"])).expect_err("bad depth");
        assert!(matches!(err, RollupError::Config { .. }));
    }

    #[test]
    fn help_wins_over_everything() {
        let parsed = parse_args(&args(&["table", "--help"])).expect("parse");
        assert_eq!(parsed.command, Command::Help);
    }
}
