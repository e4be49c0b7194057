//! HealthSync - biometric sync engine
//!
//! This crate provides the core functionality for the `hsync` CLI tool:
//! pull blood pressure, sleep, body composition and HRV records from a
//! health data provider, forward them to an aggregation server, and cache
//! the latest value of each metric locally.
//!
//! # Architecture
//!
//! - [`provider`] - Health data provider boundary (permissions, paginated reads)
//! - [`sync`] - Record reader, dispatcher, and the sync engine
//! - [`scheduler`] - Periodic and one-shot triggering with backoff
//! - [`storage`] - SQLite snapshot cache and run history
//! - [`api`] - Read client for the server's display endpoints
//! - [`config`] - Settings, credentials, and path resolution
//! - [`model`] - Record and run types
//! - [`cli`] - Command-line interface using clap
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod model;
pub mod provider;
pub mod scheduler;
pub mod storage;
pub mod sync;

pub use error::{Error, Result};
