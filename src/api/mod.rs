//! Remote read endpoints.
//!
//! These serve display commands only; the sync pipeline never reads back
//! from the server. Failures are classified into [`ApiError`] so callers
//! can show a short, friendly message instead of a transport error.

mod client;

pub use client::{
    BodyMeasurementResponse, BpReadingResponse, ServerApiClient, SleepSessionResponse,
    WorkoutResponse, WorkoutStatsSummaryResponse, DEFAULT_DAYS, DEFAULT_WORKOUT_LIMIT,
};

use thiserror::Error;

/// Result type for read-endpoint calls.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Classified read-endpoint failure.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request timed out")]
    Timeout,

    #[error("connection refused")]
    ConnectionRefused,

    #[error("could not resolve host")]
    UnresolvedHost,

    #[error("HTTP {status}")]
    Status { status: u16 },

    #[error("{0}")]
    Other(String),
}

impl ApiError {
    /// Classify a transport or status error.
    #[must_use]
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Timeout;
        }
        if let Some(status) = err.status() {
            return Self::Status {
                status: status.as_u16(),
            };
        }
        if err.is_connect() {
            return if source_chain_mentions(err, &["dns error", "failed to lookup address"]) {
                Self::UnresolvedHost
            } else {
                Self::ConnectionRefused
            };
        }
        Self::Other(err.to_string())
    }

    /// One-line message suitable for showing to the user.
    #[must_use]
    pub fn friendly_message(&self) -> String {
        match self {
            Self::Timeout => "Server unreachable — check your connection".to_string(),
            Self::ConnectionRefused => "Cannot connect to server".to_string(),
            Self::UnresolvedHost => "No network connection".to_string(),
            Self::Status { status: 401 } => "Not authorized — check your API key".to_string(),
            Self::Status { status } => format!("Server error ({status})"),
            Self::Other(_) => "Server unreachable — try again".to_string(),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        Self::from_reqwest(&err)
    }
}

fn source_chain_mentions(err: &(dyn std::error::Error + 'static), needles: &[&str]) -> bool {
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = current {
        let text = e.to_string();
        if needles.iter().any(|n| text.contains(n)) {
            return true;
        }
        current = e.source();
    }
    false
}
