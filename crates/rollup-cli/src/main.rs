use std::env;
use std::process::ExitCode;

use rollup_core::RollupConfig;
use rollup_error::Result;
use tracing::error;
use tracing_subscriber::EnvFilter;

mod args;
mod commands;

use args::{CliArgs, Command, parse_args};

/// Logs go to stderr; stdout carries command output only.
fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.compact().try_init()
    };
}

fn run(cli: CliArgs) -> Result<String> {
    if cli.command == Command::Help {
        return Ok(args::HELP.to_owned());
    }
    let config = match &cli.config {
        Some(path) => RollupConfig::load(path)?,
        None => RollupConfig::default(),
    };
    commands::execute(cli.command, &config)
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();
    let cli = match parse_args(&args) {
        Ok(cli) => cli,
        Err(err) => {
            eprintln!("error: {err}");
            eprintln!("run `rollup --help` for usage");
            return ExitCode::FAILURE;
        }
    };
    init_logging(cli.log_json);

    match run(cli) {
        Ok(output) => {
            if !output.is_empty() {
                println!("{output}");
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(kind = err.kind(), error = %err, "command failed");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
