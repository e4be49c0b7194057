//! Error types for HealthSync.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=db, 3=provider, 4=validation, etc.)
//! - Retryability flags so the scheduler and scripts can decide to try again
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers

use std::path::PathBuf;
use thiserror::Error;

use crate::provider::ProviderRecordType;

/// Result type alias for HealthSync operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Database (exit 2)
    NotInitialized,
    DatabaseError,

    // Provider (exit 3)
    ProviderUnavailable,
    ProviderReadFailed,

    // Validation (exit 4)
    InvalidArgument,
    UnknownMetric,

    // Network (exit 5)
    NetworkError,
    RemoteApiError,

    // Sync (exit 6)
    SyncInProgress,
    SyncFailed,

    // Config (exit 7)
    ConfigError,

    // I/O (exit 8)
    IoError,
    JsonError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::ProviderUnavailable => "PROVIDER_UNAVAILABLE",
            Self::ProviderReadFailed => "PROVIDER_READ_FAILED",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::UnknownMetric => "UNKNOWN_METRIC",
            Self::NetworkError => "NETWORK_ERROR",
            Self::RemoteApiError => "REMOTE_API_ERROR",
            Self::SyncInProgress => "SYNC_IN_PROGRESS",
            Self::SyncFailed => "SYNC_FAILED",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code (1-8).
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::NotInitialized | Self::DatabaseError => 2,
            Self::ProviderUnavailable | Self::ProviderReadFailed => 3,
            Self::InvalidArgument | Self::UnknownMetric => 4,
            Self::NetworkError | Self::RemoteApiError => 5,
            Self::SyncInProgress | Self::SyncFailed => 6,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError => 8,
        }
    }

    /// Whether trying the same operation again later can succeed.
    ///
    /// True for transient provider, network, and lock conditions.
    /// False for bad input, missing configuration, or internal errors.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ProviderUnavailable
                | Self::ProviderReadFailed
                | Self::NetworkError
                | Self::RemoteApiError
                | Self::SyncInProgress
                | Self::SyncFailed
                | Self::DatabaseError
        )
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in HealthSync operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database not found at {path}")]
    NotInitialized { path: PathBuf },

    #[error("Health data provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Failed to read {record_type} records: {message}")]
    ProviderRead {
        record_type: ProviderRecordType,
        message: String,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Remote API error: {0}")]
    RemoteApi(#[from] crate::api::ApiError),

    #[error("A sync run is already in progress")]
    SyncInProgress,

    #[error("Sync failed: {0}")]
    SyncFailed(String),

    #[error("Unknown metric: {0}")]
    UnknownMetric(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotInitialized { .. } => ErrorCode::NotInitialized,
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::ProviderUnavailable(_) => ErrorCode::ProviderUnavailable,
            Self::ProviderRead { .. } => ErrorCode::ProviderReadFailed,
            Self::Http(_) => ErrorCode::NetworkError,
            Self::RemoteApi(_) => ErrorCode::RemoteApiError,
            Self::SyncInProgress => ErrorCode::SyncInProgress,
            Self::SyncFailed(_) => ErrorCode::SyncFailed,
            Self::UnknownMetric(_) => ErrorCode::UnknownMetric,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::NotInitialized { path } => Some(format!(
                "No snapshot database at {}. Run `hsync sync run` once to create it.",
                path.display()
            )),

            Self::ProviderUnavailable(_) => Some(
                "Point HealthSync at a provider export with `--source <dir>` \
                 or `hsync config set provider_dir <dir>`."
                    .to_string(),
            ),

            Self::SyncInProgress => {
                Some("Another sync run holds the lock. Wait for it to finish.".to_string())
            }

            Self::UnknownMetric(_) => Some(format!(
                "Valid metrics: {}",
                crate::storage::MetricKey::ALL
                    .iter()
                    .map(crate::storage::MetricKey::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            )),

            Self::RemoteApi(e) => Some(e.friendly_message()),

            Self::Config(msg) if msg.contains("api key") || msg.contains("API key") => {
                Some("Store one with `hsync config set-api-key <key>`.".to_string())
            }

            Self::Config(msg) if msg.contains("device secret") => Some(
                "Set HSYNC_DEVICE_SECRET or `hsync config set device_secret <value>`.".to_string(),
            ),

            Self::ProviderRead { .. }
            | Self::Http(_)
            | Self::SyncFailed(_)
            | Self::Database(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::InvalidArgument(_)
            | Self::Config(_)
            | Self::Other(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}
