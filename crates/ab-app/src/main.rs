//! `abada` command-line front-end
//!
//! Each invocation opens a session on the configured database, runs one
//! command and exits.

use std::env;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use ab_data::{AppConfig, SqliteStore};

mod commands;

use commands::Command;

fn usage() {
    eprintln!(
        "Usage:\n  \
  abada [--config PATH] tables\n  \
  abada [--config PATH] search TABLE [COLUMN=TEXT ...]\n  \
  abada [--config PATH] insert TABLE VALUE...        (use '' for NULL)\n  \
  abada [--config PATH] delete TABLE [COLUMN=TEXT ...] [--yes]\n  \
  abada [--config PATH] query 'SELECT ... FROM ...'\n  \
  abada [--config PATH] saved-files\n  \
  abada [--config PATH] import-csv PATH TABLE\n  \
  abada [--config PATH] hmm PATH [NAME]\n  \
  abada [--config PATH] plot EXPERIMENT.json event|segment X_AXIS Y_AXIS [EXCLUSIONS.json]\n  \
  abada [--config PATH] export EXPERIMENT.json\n\n  \
  Filter text: 'None' matches NULL, a trailing '*' matches substrings.\n  \
  Set RUST_LOG to change the log level (default: info)."
    );
}

/// Split off a leading `--config PATH`
fn parse_global_config_arg(args: &[String]) -> (Option<PathBuf>, usize) {
    if args.len() >= 3 && args[1] == "--config" {
        return (Some(PathBuf::from(&args[2])), 3);
    }
    (None, 1)
}

fn open_store(config: &AppConfig) -> Result<SqliteStore> {
    let store = match &config.database.path {
        Some(path) => SqliteStore::open(path)?,
        None => SqliteStore::open_in_memory()?,
    };
    Ok(store)
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run() {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    let (config_path, cmd_idx) = parse_global_config_arg(&args);
    if args.len() <= cmd_idx {
        usage();
        bail!("Missing command");
    }

    let command = match Command::parse(&args[cmd_idx..]) {
        Ok(command) => command,
        Err(e) => {
            usage();
            return Err(e);
        }
    };

    let config = AppConfig::load(config_path.as_deref()).context("Failed to load configuration")?;
    let store = open_store(&config)?;
    info!(database = store.source_name(), "Opened database");

    let output = commands::execute(command, store, config)?;
    if !output.is_empty() {
        println!("{}", output);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_global_config_arg() {
        let (path, idx) = parse_global_config_arg(&args(&["abada", "--config", "x.json", "tables"]));
        assert_eq!(path, Some(PathBuf::from("x.json")));
        assert_eq!(idx, 3);

        let (path, idx) = parse_global_config_arg(&args(&["abada", "tables"]));
        assert!(path.is_none());
        assert_eq!(idx, 1);
    }
}
