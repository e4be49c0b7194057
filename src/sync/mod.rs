//! Health data synchronization.
//!
//! This module holds the pipeline that runs on every sync:
//!
//! - **Reader**: drains provider pagination and applies source preference
//! - **Correlator**: joins weight, body fat, and lean mass by time
//! - **Dispatcher**: posts each family to the sync endpoint
//! - **Engine**: runs the above per family and updates the snapshot cache
//!
//! # Example
//!
//! ```ignore
//! use hsync::sync::{EngineSettings, SyncDispatcher, SyncEngine};
//!
//! let dispatcher = SyncDispatcher::new(&url, &secret, &api_key, &timeouts)?;
//! let engine = SyncEngine::new(provider, dispatcher, storage, EngineSettings::default());
//! let report = engine.run(Trigger::Manual).await?;
//! ```

mod correlate;
mod dispatch;
mod engine;
mod reader;

pub use correlate::{correlate, CORRELATION_WINDOW};
pub use dispatch::{DispatchError, DispatchResult, SyncAck, SyncDispatcher, SYNC_PATH};
pub(crate) use dispatch::authorized_client;
pub use engine::{DispatchStatus, EngineSettings, SyncEngine, SyncReport, TypeReport};
pub use reader::{apply_source_preference, gating_type, RecordReader};
