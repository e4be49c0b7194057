//! Config command implementations.

use colored::Colorize;
use serde::Serialize;

use crate::cli::ConfigCommands;
use crate::config::{
    config_path, credentials_path, Credentials, HealthSyncConfig, SyncSettings,
};
use crate::error::{Error, Result};

/// Execute config commands.
pub fn execute(command: &ConfigCommands, json: bool) -> Result<()> {
    match command {
        ConfigCommands::Show => show(json),
        ConfigCommands::Set { key, value } => set(key, value, json),
        ConfigCommands::SetApiKey { key } => set_api_key(key, json),
    }
}

#[derive(Serialize)]
struct ShowOutput {
    config_path: String,
    server_url: Option<String>,
    device_secret_set: bool,
    api_key: Option<String>,
    preferred_source: String,
    lookback_days: u32,
    sync_interval_minutes: u64,
    provider_dir: Option<String>,
    dispatch_hrv: bool,
}

fn show(json: bool) -> Result<()> {
    let path = config_path()?;
    let settings = SyncSettings::resolve()?;

    // Show the key as resolved, so an HSYNC_API_KEY override is visible too.
    let api_key = Credentials {
        api_key: settings.api_key.clone(),
    }
    .masked_api_key();

    let output = ShowOutput {
        config_path: path.display().to_string(),
        server_url: settings.server_url.clone(),
        device_secret_set: settings.device_secret.is_some(),
        api_key,
        preferred_source: settings.preferred_source.clone(),
        lookback_days: settings.lookback_days,
        sync_interval_minutes: settings.sync_interval.as_secs() / 60,
        provider_dir: settings.provider_dir.as_ref().map(|p| p.display().to_string()),
        dispatch_hrv: settings.dispatch_hrv,
    };

    if json {
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    let unset = || "(not set)".dimmed().to_string();
    println!("Config: {}", output.config_path.dimmed());
    println!();
    println!("  server_url             {}", output.server_url.unwrap_or_else(unset));
    println!(
        "  device_secret          {}",
        if output.device_secret_set { "set".to_string() } else { unset() }
    );
    println!("  api_key                {}", output.api_key.unwrap_or_else(unset));
    println!("  preferred_source       {}", output.preferred_source);
    println!("  lookback_days          {}", output.lookback_days);
    println!("  sync_interval_minutes  {}", output.sync_interval_minutes);
    println!("  provider_dir           {}", output.provider_dir.unwrap_or_else(unset));
    println!("  dispatch_hrv           {}", output.dispatch_hrv);

    if settings.api_key.is_none() {
        println!();
        println!("Store an API key with: hsync config set-api-key <key>");
    }
    Ok(())
}

fn set(key: &str, value: &str, json: bool) -> Result<()> {
    let path = config_path()?;
    let mut config = HealthSyncConfig::load_from(&path)?;
    config.set(key, value)?;
    config.save_to(&path)?;

    if json {
        let output = serde_json::json!({
            "key": key,
            "value": value,
            "path": path.display().to_string(),
        });
        println!("{output}");
    } else if value.trim().is_empty() {
        println!("Cleared {key}");
    } else {
        println!("Set {key} = {value}");
    }
    Ok(())
}

fn set_api_key(key: &str, json: bool) -> Result<()> {
    let key = key.trim();
    if key.is_empty() {
        return Err(Error::InvalidArgument("API key must not be empty".into()));
    }

    let path = credentials_path()?;
    let credentials = Credentials {
        api_key: Some(key.to_string()),
    };
    credentials.save_to(&path)?;

    let masked = credentials.masked_api_key().unwrap_or_default();
    if json {
        let output = serde_json::json!({
            "api_key": masked,
            "path": path.display().to_string(),
        });
        println!("{output}");
    } else {
        println!("Saved API key {masked} to {}", path.display());
    }
    Ok(())
}
