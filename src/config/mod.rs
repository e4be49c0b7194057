//! Configuration management.
//!
//! This module locates the HealthSync directory, resolves the database
//! path, and loads settings and credentials.
//!
//! # Layout
//!
//! Everything lives under one base directory, `~/.healthsync/` unless
//! `HSYNC_HOME` points elsewhere:
//! - `config.json`: non-secret settings ([`HealthSyncConfig`])
//! - `credentials.json`: the API key ([`Credentials`]), mode 0600
//! - `data/healthsync.db`: the snapshot database

mod credentials;
mod settings;

pub use credentials::Credentials;
pub use settings::{
    HealthSyncConfig, HttpTimeouts, SyncSettings, CONFIG_KEYS, DEFAULT_LOOKBACK_DAYS,
    DEFAULT_PREFERRED_SOURCE, DEFAULT_SYNC_INTERVAL_MINUTES,
};

use crate::error::{Error, Result};

use std::fs;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

/// Environment variable overriding the base directory.
pub const HOME_ENV: &str = "HSYNC_HOME";

/// Environment variable overriding the database path.
pub const DB_ENV: &str = "HSYNC_DB";

/// Get the HealthSync base directory.
///
/// `HSYNC_HOME` wins; otherwise `~/.healthsync/`.
#[must_use]
pub fn base_dir() -> Option<PathBuf> {
    base_dir_from(std::env::var(HOME_ENV).ok())
}

fn base_dir_from(home_override: Option<String>) -> Option<PathBuf> {
    if let Some(dir) = home_override.filter(|d| !d.trim().is_empty()) {
        return Some(PathBuf::from(dir));
    }
    directories::BaseDirs::new().map(|b| b.home_dir().join(".healthsync"))
}

fn require_base_dir() -> Result<PathBuf> {
    base_dir().ok_or_else(|| Error::Config("Could not determine home directory".into()))
}

/// Path of `config.json`.
///
/// # Errors
///
/// Returns `Config` if no home directory can be determined.
pub fn config_path() -> Result<PathBuf> {
    Ok(require_base_dir()?.join("config.json"))
}

/// Path of `credentials.json`.
///
/// # Errors
///
/// Returns `Config` if no home directory can be determined.
pub fn credentials_path() -> Result<PathBuf> {
    Ok(require_base_dir()?.join("credentials.json"))
}

/// Resolve the database path.
///
/// Priority:
/// 1. If `explicit_path` is provided, use it directly
/// 2. `HSYNC_DB` environment variable
/// 3. `<base>/data/healthsync.db`
#[must_use]
pub fn resolve_db_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return Some(path.to_path_buf());
    }

    if let Ok(db_path) = std::env::var(DB_ENV) {
        if !db_path.trim().is_empty() {
            return Some(PathBuf::from(db_path));
        }
    }

    base_dir().map(|dir| dir.join("data").join("healthsync.db"))
}

/// Write `bytes` to `path` via a temp file and rename.
///
/// The temp file is created with mode 0600 on unix, so the final file
/// never exists with looser permissions. Parent directories are created.
pub(crate) fn atomic_write(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    {
        let mut opts = fs::OpenOptions::new();
        opts.write(true).create(true).truncate(true);
        #[cfg(unix)]
        opts.mode(0o600);
        let mut file = opts.open(&temp_path)?;
        file.write_all(bytes)?;
        file.flush()?;
    }
    fs::rename(&temp_path, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_db_path_with_explicit() {
        let explicit = PathBuf::from("/custom/path/health.db");
        assert_eq!(resolve_db_path(Some(&explicit)), Some(explicit));
    }

    #[test]
    fn test_base_dir_override() {
        assert_eq!(
            base_dir_from(Some("/tmp/hs-home".into())),
            Some(PathBuf::from("/tmp/hs-home"))
        );
        let default = base_dir_from(Some("  ".into())).unwrap();
        assert!(default.ends_with(".healthsync"));
    }

    #[test]
    fn test_atomic_write_replaces_content() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a").join("file.json");

        atomic_write(&path, b"one").unwrap();
        atomic_write(&path, b"two").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "two");
        assert!(!temp.path().join("a").join("file.json.tmp").exists());
    }
}
