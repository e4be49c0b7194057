//! SQLite storage layer for HealthSync.
//!
//! This module provides the persistence layer using SQLite with:
//! - WAL mode so display readers never block the sync writer
//! - Transactional multi-key snapshot writes
//! - Run history for `sync status`
//!
//! # Submodules
//!
//! - [`schema`] - Database schema definitions
//! - [`snapshot`] - Snapshot cache keys and values
//! - [`sqlite`] - Main SQLite storage implementation

pub mod migrations;
pub mod schema;
pub mod snapshot;
pub mod sqlite;

pub use snapshot::{MetricKey, Snapshot, SnapshotValue};
pub use sqlite::SqliteStorage;
