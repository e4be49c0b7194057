//! Cache command implementations.

use colored::Colorize;
use std::path::PathBuf;

use super::open_existing_storage;
use crate::cli::CacheCommands;
use crate::error::Result;
use crate::storage::MetricKey;

/// Execute cache commands.
pub fn execute(command: &CacheCommands, db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    match command {
        CacheCommands::Show => show(db_path, json),
        CacheCommands::Get { metric } => get(metric, db_path, json),
    }
}

fn show(db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let storage = open_existing_storage(db_path)?;

    if json {
        println!("{}", serde_json::to_string(&storage.load_snapshot()?)?);
        return Ok(());
    }

    let values = storage.snapshot_values()?;
    if values.is_empty() {
        println!("Cache is empty. Run `hsync sync run` first.");
        return Ok(());
    }

    for key in MetricKey::ALL {
        match values.get(&key) {
            Some(value) => println!("{:<24} {value}", key.as_str()),
            None => println!("{:<24} {}", key.as_str(), "-".dimmed()),
        }
    }
    Ok(())
}

fn get(metric: &str, db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let key: MetricKey = metric.parse()?;
    let storage = open_existing_storage(db_path)?;
    let value = storage.get(key)?;

    if json {
        let output = serde_json::json!({
            "key": key.as_str(),
            "value": value,
        });
        println!("{output}");
        return Ok(());
    }

    match value {
        Some(value) => println!("{value}"),
        None => println!("{}", "(not set)".dimmed()),
    }
    Ok(())
}
