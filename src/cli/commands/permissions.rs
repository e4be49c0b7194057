//! Permissions command: granted vs required provider permissions.

use colored::Colorize;
use serde::Serialize;
use std::path::Path;

use super::{open_provider, runtime};
use crate::config::SyncSettings;
use crate::error::Result;
use crate::provider::{HealthDataProvider, Permission, ProviderRecordType};

#[derive(Serialize)]
struct PermissionRow {
    permission: Permission,
    granted: bool,
}

#[derive(Serialize)]
struct PermissionsOutput {
    provider: String,
    all_granted: bool,
    permissions: Vec<PermissionRow>,
}

/// Execute the permissions command.
pub fn execute(source: Option<&Path>, json: bool) -> Result<()> {
    let settings = SyncSettings::resolve()?;
    let provider = open_provider(source, &settings)?;

    let rt = runtime()?;
    let granted = rt.block_on(provider.granted_permissions())?;

    let permissions: Vec<PermissionRow> = ProviderRecordType::ALL
        .into_iter()
        .map(Permission::read)
        .map(|permission| PermissionRow {
            granted: granted.contains(&permission),
            permission,
        })
        .collect();
    let all_granted = permissions.iter().all(|p| p.granted);

    if json {
        let output = PermissionsOutput {
            provider: provider.dir().display().to_string(),
            all_granted,
            permissions,
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    println!("Provider: {}", provider.dir().display());
    println!();
    for row in &permissions {
        let mark = if row.granted { "✓".green() } else { "✗".red() };
        println!("  {mark} {}", row.permission);
    }
    if !all_granted {
        println!();
        println!(
            "{}",
            "Types without permission are skipped on every run.".yellow()
        );
    }
    Ok(())
}
