use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, warn};
use viewstore_core::logging::{init_logging_with_config, LogConfig, LogLevel};
use viewstore_core::storage::{ListIndex, MapIndex, MemoryDb, ModificationTracker, StorageError};
use viewstore_core::transaction::{ClearAllThenFail, TransactionExecutor};
use viewstore_core::Config;

#[derive(Parser, Debug)]
#[command(name = "viewstore")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Set the log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Enable JSON formatted logging
    #[arg(long)]
    json_logs: bool,

    /// Configuration file; defaults and VIEWSTORE_* variables otherwise
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Parser, Debug)]
enum Command {
    /// Run a scripted session against an in-memory database and print a report
    Demo {
        /// Number of list elements to start with
        #[arg(long, default_value_t = 3)]
        elements: u64,
    },
    /// Load and validate a configuration file
    CheckConfig {
        path: PathBuf,
    },
}

/// What the demo session observed
#[derive(Debug, Serialize)]
struct DemoReport {
    committed_list: Vec<String>,
    committed_map: Vec<(String, u64)>,
    late_stream: Vec<String>,
    invalidated_iterator: String,
    snapshot_write: String,
    rolled_back: String,
    list_after_rollback: usize,
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display())),
        None => Config::from_env().context("invalid VIEWSTORE_* environment"),
    }
}

fn run_demo(config: &Config, elements: u64) -> Result<DemoReport> {
    let db = MemoryDb::with_config(config.database.clone(), ModificationTracker::global());

    let fork = db.create_fork();
    let list: ListIndex<String> = ListIndex::new("events", &fork)?;
    list.extend((1..=elements).map(|i| format!("v{}", i)))?;
    let map: MapIndex<String, u64> = MapIndex::new("counters", &fork)?;
    map.put(&"events".to_string(), elements)?;

    // Late binding: the push happens before the first pull and is visible.
    let stream = list.stream();
    list.push("late".to_string())?;
    let late_stream = stream.collect::<Result<Vec<_>, _>>()?;

    // An alias modifies the list while an iterator is open.
    let mut iter = list.iter()?;
    let alias: ListIndex<String> = ListIndex::new("events", &fork)?;
    alias.pop()?;
    let invalidated_iterator = match iter.next() {
        Some(Err(err)) => err.to_string(),
        other => anyhow::bail!("expected the iterator to fail, got {:?}", other),
    };

    db.merge(fork)?;

    let snapshot = db.create_snapshot();
    let committed: ListIndex<String> = ListIndex::new("events", &snapshot)?;
    let snapshot_write = match committed.push("rejected".to_string()) {
        Err(err @ StorageError::UnsupportedOperation(_)) => err.to_string(),
        other => anyhow::bail!("expected the snapshot to reject writes, got {:?}", other),
    };
    let committed_list = committed.iter()?.collect::<Result<Vec<_>, _>>()?;
    let committed_map = MapIndex::<String, u64>::new("counters", &snapshot)?
        .iter()?
        .collect::<Result<Vec<_>, _>>()?;

    let executor = TransactionExecutor::new(db.create_fork())?;
    let tx = ClearAllThenFail::new(vec!["events".to_string()], vec!["counters".to_string()], 1);
    let rolled_back = match executor.execute(&tx) {
        Err(err) => err.to_string(),
        Ok(()) => anyhow::bail!("clear_all_then_fail succeeded"),
    };
    let list_after_rollback = ListIndex::<String>::new("events", executor.fork())?.len()? as usize;

    Ok(DemoReport {
        committed_list,
        committed_map,
        late_stream,
        invalidated_iterator,
        snapshot_write,
        rolled_back,
        list_after_rollback,
    })
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(args.config.as_ref())?;

    let mut log_config = LogConfig::from_config(&config.logging)?;
    if let Some(level) = &args.log_level {
        log_config.level = level.parse().unwrap_or_else(|_| {
            eprintln!("Invalid log level '{}', using 'info'", level);
            LogLevel::Info
        });
    }
    if args.json_logs {
        log_config.json_format = true;
    }
    init_logging_with_config(log_config)?;

    if config.metrics.enabled {
        viewstore_core::metrics::init_metrics();
    }

    info!("viewstore CLI started");

    match args.command {
        Command::Demo { elements } => {
            let report = run_demo(&config, elements)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::CheckConfig { path } => match Config::from_file(&path) {
            Ok(loaded) => {
                info!(path = %path.display(), "configuration is valid");
                println!("{}", serde_json::to_string_pretty(&loaded)?);
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "configuration rejected");
                return Err(err.into());
            }
        },
    }

    Ok(())
}
