//! Raw record types as served by the health data provider.
//!
//! These mirror the provider's own record shapes (units, metadata, stage
//! intervals) before any reconciliation. The reader converts them into
//! [`HealthRecord`](crate::model::HealthRecord) values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Record types the provider can be queried for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderRecordType {
    BloodPressure,
    SleepSession,
    Weight,
    BodyFat,
    LeanBodyMass,
    HeartRateVariability,
}

impl ProviderRecordType {
    /// Every provider record type the engine reads.
    pub const ALL: [Self; 6] = [
        Self::BloodPressure,
        Self::SleepSession,
        Self::Weight,
        Self::BodyFat,
        Self::LeanBodyMass,
        Self::HeartRateVariability,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::BloodPressure => "blood_pressure",
            Self::SleepSession => "sleep_session",
            Self::Weight => "weight",
            Self::BodyFat => "body_fat",
            Self::LeanBodyMass => "lean_body_mass",
            Self::HeartRateVariability => "heart_rate_variability",
        }
    }
}

impl std::fmt::Display for ProviderRecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderRecordType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("Unknown provider record type: {s}"))
    }
}

/// A provider permission string, e.g. `read:blood_pressure`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(String);

impl Permission {
    /// The permission needed to read records of `record_type`.
    #[must_use]
    pub fn read(record_type: ProviderRecordType) -> Self {
        Self(format!("read:{}", record_type.as_str()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Permission {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Read permissions for every record type the engine consumes.
#[must_use]
pub fn required_permissions() -> HashSet<Permission> {
    ProviderRecordType::ALL.into_iter().map(Permission::read).collect()
}

/// Provenance attached to every provider record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    /// Package name of the app that wrote the record.
    pub data_origin: String,
    /// Manufacturer of the recording device, if the writer reported one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_manufacturer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BloodPressureSample {
    pub time: DateTime<Utc>,
    pub systolic_mmhg: f64,
    pub diastolic_mmhg: f64,
    pub metadata: RecordMetadata,
}

/// Sleep stage tags as reported by the provider.
///
/// Tags this build does not know deserialize as `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SleepStageType {
    Awake,
    Sleeping,
    OutOfBed,
    Light,
    Deep,
    Rem,
    AwakeInBed,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepStage {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub stage: SleepStageType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepSessionSample {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub stages: Vec<SleepStage>,
    pub metadata: RecordMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightSample {
    pub time: DateTime<Utc>,
    pub weight_kg: f64,
    pub metadata: RecordMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyFatSample {
    pub time: DateTime<Utc>,
    pub percentage: f64,
    pub metadata: RecordMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeanBodyMassSample {
    pub time: DateTime<Utc>,
    pub mass_kg: f64,
    pub metadata: RecordMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HrvSample {
    pub time: DateTime<Utc>,
    pub rmssd_ms: f64,
    pub metadata: RecordMetadata,
}

/// Tagged union of every raw provider record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RawRecord {
    BloodPressure(BloodPressureSample),
    SleepSession(SleepSessionSample),
    Weight(WeightSample),
    BodyFat(BodyFatSample),
    LeanBodyMass(LeanBodyMassSample),
    HeartRateVariability(HrvSample),
}

impl RawRecord {
    #[must_use]
    pub const fn record_type(&self) -> ProviderRecordType {
        match self {
            Self::BloodPressure(_) => ProviderRecordType::BloodPressure,
            Self::SleepSession(_) => ProviderRecordType::SleepSession,
            Self::Weight(_) => ProviderRecordType::Weight,
            Self::BodyFat(_) => ProviderRecordType::BodyFat,
            Self::LeanBodyMass(_) => ProviderRecordType::LeanBodyMass,
            Self::HeartRateVariability(_) => ProviderRecordType::HeartRateVariability,
        }
    }

    #[must_use]
    pub const fn metadata(&self) -> &RecordMetadata {
        match self {
            Self::BloodPressure(r) => &r.metadata,
            Self::SleepSession(r) => &r.metadata,
            Self::Weight(r) => &r.metadata,
            Self::BodyFat(r) => &r.metadata,
            Self::LeanBodyMass(r) => &r.metadata,
            Self::HeartRateVariability(r) => &r.metadata,
        }
    }

    /// Package name of the writing app.
    #[must_use]
    pub fn data_origin(&self) -> &str {
        &self.metadata().data_origin
    }

    /// The instant used for time-range filtering (session start for sleep).
    #[must_use]
    pub const fn time(&self) -> DateTime<Utc> {
        match self {
            Self::BloodPressure(r) => r.time,
            Self::SleepSession(r) => r.start_time,
            Self::Weight(r) => r.time,
            Self::BodyFat(r) => r.time,
            Self::LeanBodyMass(r) => r.time,
            Self::HeartRateVariability(r) => r.time,
        }
    }
}

/// One bounded query against the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadRequest {
    pub record_type: ProviderRecordType,
    /// Only records at or after this instant are returned.
    pub since: DateTime<Utc>,
    /// Opaque continuation token from the previous page, `None` for the first page.
    pub page_token: Option<String>,
}

/// One page of provider results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadPage {
    pub records: Vec<RawRecord>,
    /// Token for the next page; `None` when the result set is exhausted.
    pub next_page_token: Option<String>,
}
