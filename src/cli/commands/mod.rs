//! Command implementations.

pub mod cache;
pub mod completions;
pub mod config;
pub mod daemon;
pub mod permissions;
pub mod remote;
pub mod sync;
pub mod version;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{resolve_db_path, SyncSettings};
use crate::error::{Error, Result};
use crate::provider::ExportDirProvider;
use crate::scheduler::{Scheduler, ServerReachability, SyncWorker};
use crate::storage::SqliteStorage;
use crate::sync::{EngineSettings, SyncDispatcher, SyncEngine};

/// Scheduler type shared by `sync run` and `daemon`.
pub(crate) type CliScheduler = Scheduler<SyncWorker<ExportDirProvider>, ServerReachability>;

fn db_path(db_path: Option<&PathBuf>) -> Result<PathBuf> {
    resolve_db_path(db_path.map(PathBuf::as_path))
        .ok_or_else(|| Error::Config("Could not determine home directory".into()))
}

/// Open the snapshot database, failing if it was never created.
pub(crate) fn open_existing_storage(db: Option<&PathBuf>) -> Result<SqliteStorage> {
    SqliteStorage::open_existing(&db_path(db)?)
}

/// Open the provider at `source`, falling back to the configured directory.
pub(crate) fn open_provider(
    source: Option<&Path>,
    settings: &SyncSettings,
) -> Result<ExportDirProvider> {
    let dir = source
        .map(Path::to_path_buf)
        .or_else(|| settings.provider_dir.clone())
        .ok_or_else(|| {
            Error::ProviderUnavailable("no provider directory configured".into())
        })?;
    ExportDirProvider::open(dir)
}

/// Wire provider, dispatcher, storage, and network check into a scheduler.
pub(crate) fn build_scheduler(
    settings: &SyncSettings,
    source: Option<&Path>,
    db: Option<&PathBuf>,
) -> Result<CliScheduler> {
    let server_url = settings.require_server_url()?;
    let dispatcher = SyncDispatcher::new(
        server_url,
        settings.require_device_secret()?,
        settings.require_api_key()?,
        &settings.timeouts,
    )?;
    let network = ServerReachability::from_url(server_url, settings.timeouts.connect)?;

    let provider = open_provider(source, settings)?;
    let storage = Arc::new(SqliteStorage::open(&db_path(db)?)?);

    let engine = SyncEngine::new(
        provider,
        dispatcher,
        storage,
        EngineSettings::from_settings(settings),
    );
    Ok(Scheduler::new(SyncWorker::new(engine), network))
}

pub(crate) fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Error::Other(format!("Failed to create async runtime: {e}")))
}
