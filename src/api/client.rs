//! Read client for the aggregation server.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ApiError, ApiResult};
use crate::config::HttpTimeouts;
use crate::error::Result;

pub const DEFAULT_DAYS: u32 = 30;
pub const DEFAULT_WORKOUT_LIMIT: u32 = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BpReadingResponse {
    #[serde(default)]
    pub id: Option<String>,
    pub systolic: i32,
    pub diastolic: i32,
    #[serde(default)]
    pub pulse: Option<i32>,
    pub measured_at: String,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SleepSessionResponse {
    #[serde(default)]
    pub id: Option<String>,
    pub sleep_start: String,
    #[serde(default)]
    pub sleep_end: Option<String>,
    pub duration_minutes: i32,
    #[serde(default)]
    pub deep_sleep_minutes: Option<i32>,
    #[serde(default)]
    pub rem_sleep_minutes: Option<i32>,
    #[serde(default)]
    pub light_sleep_minutes: Option<i32>,
    #[serde(default)]
    pub sleep_score: Option<i32>,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyMeasurementResponse {
    #[serde(default)]
    pub id: Option<String>,
    pub measured_at: String,
    #[serde(default)]
    pub weight_kg: Option<f64>,
    #[serde(default)]
    pub body_fat_percent: Option<f64>,
    #[serde(default)]
    pub muscle_mass_kg: Option<f64>,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutResponse {
    pub id: String,
    #[serde(default)]
    pub hevy_id: Option<String>,
    pub started_at: String,
    #[serde(default)]
    pub ended_at: Option<String>,
    #[serde(default)]
    pub duration_minutes: Option<i32>,
    pub title: String,
    #[serde(default)]
    pub total_volume_kg: Option<f64>,
    #[serde(default)]
    pub total_sets: Option<i32>,
    #[serde(default)]
    pub total_reps: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutStatsSummaryResponse {
    pub total_workouts: i32,
    #[serde(default)]
    pub avg_duration: Option<i32>,
    #[serde(default)]
    pub total_volume_kg: Option<f64>,
    #[serde(default)]
    pub avg_sets_per_workout: Option<i32>,
}

/// Authenticated client for the `GET /api/...` endpoints.
#[derive(Debug, Clone)]
pub struct ServerApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ServerApiClient {
    /// # Errors
    ///
    /// Returns `Config` for an API key that cannot be sent as a header and
    /// `Http` if the client cannot be built.
    pub fn new(base_url: &str, api_key: &str, timeouts: &HttpTimeouts) -> Result<Self> {
        Ok(Self {
            client: crate::sync::authorized_client(api_key, timeouts)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, u32)]) -> ApiResult<T> {
        let url = format!("{}{path}", self.base_url);
        debug!(url = %url, ?query, "GET");

        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await?
            .error_for_status()?;

        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Other(format!("invalid response from {path}: {e}")))
    }

    /// Blood-pressure readings from the last `days` days.
    ///
    /// # Errors
    ///
    /// Returns the classified transport or status failure.
    pub async fn blood_pressure(&self, days: u32) -> ApiResult<Vec<BpReadingResponse>> {
        self.get("/api/bp", &[("days", days)]).await
    }

    /// # Errors
    ///
    /// Returns the classified transport or status failure.
    pub async fn sleep(&self, days: u32) -> ApiResult<Vec<SleepSessionResponse>> {
        self.get("/api/sleep", &[("days", days)]).await
    }

    /// # Errors
    ///
    /// Returns the classified transport or status failure.
    pub async fn body_measurements(&self, days: u32) -> ApiResult<Vec<BodyMeasurementResponse>> {
        self.get("/api/body", &[("days", days)]).await
    }

    /// One page of workouts, newest first as served.
    ///
    /// # Errors
    ///
    /// Returns the classified transport or status failure.
    pub async fn workouts(&self, limit: u32, offset: u32) -> ApiResult<Vec<WorkoutResponse>> {
        self.get("/api/workouts", &[("limit", limit), ("offset", offset)])
            .await
    }

    /// # Errors
    ///
    /// Returns the classified transport or status failure.
    pub async fn workout_stats_summary(&self, days: u32) -> ApiResult<WorkoutStatsSummaryResponse> {
        self.get("/api/workouts/stats/summary", &[("days", days)])
            .await
    }
}
