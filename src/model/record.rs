//! Reconciled health records.
//!
//! A [`HealthRecord`] is what the reader emits after pagination,
//! source preference, and correlation. Records are built fresh on every
//! run, never mutated, and dropped after dispatch. Field names serialize
//! in the camelCase form the sync endpoint expects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The four metric families the engine syncs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordType {
    BloodPressure,
    Sleep,
    BodyMeasurements,
    Hrv,
}

impl RecordType {
    /// Processing order within a run.
    pub const ALL: [Self; 4] = [
        Self::BloodPressure,
        Self::Sleep,
        Self::BodyMeasurements,
        Self::Hrv,
    ];

    /// The `data_type` tag sent to the sync endpoint.
    #[must_use]
    pub const fn wire_tag(&self) -> &'static str {
        match self {
            Self::BloodPressure => "blood_pressure",
            Self::Sleep => "sleep",
            Self::BodyMeasurements => "body_measurements",
            Self::Hrv => "hrv",
        }
    }

    /// Human-readable label for CLI output.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::BloodPressure => "Blood pressure",
            Self::Sleep => "Sleep",
            Self::BodyMeasurements => "Body measurements",
            Self::Hrv => "HRV",
        }
    }
}

impl std::fmt::Display for RecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wire_tag())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BloodPressureReading {
    pub systolic: i32,
    pub diastolic: i32,
    pub measured_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_app: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SleepSession {
    #[serde(rename = "sleepStart")]
    pub start: DateTime<Utc>,
    #[serde(rename = "sleepEnd")]
    pub end: DateTime<Utc>,
    pub duration_minutes: i64,
    pub deep_sleep_minutes: i64,
    pub rem_sleep_minutes: i64,
    pub light_sleep_minutes: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_app: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
}

/// Composite of weight, body fat, and lean mass taken around the same time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BodyMeasurement {
    pub measured_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight_kg: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_fat_percent: Option<f64>,
    /// Lean body mass, sent under the server's `muscleMassKg` name.
    #[serde(
        default,
        rename = "muscleMassKg",
        skip_serializing_if = "Option::is_none"
    )]
    pub lean_mass_kg: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_app: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HrvReading {
    pub measured_at: DateTime<Utc>,
    #[serde(rename = "hrvMs")]
    pub rmssd_ms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_app: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
}

/// A reconciled record of any metric family.
///
/// Serializes as the bare variant object so a list of records for one
/// type is a plain JSON array.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum HealthRecord {
    BloodPressure(BloodPressureReading),
    Sleep(SleepSession),
    Body(BodyMeasurement),
    Hrv(HrvReading),
}

impl HealthRecord {
    #[must_use]
    pub const fn record_type(&self) -> RecordType {
        match self {
            Self::BloodPressure(_) => RecordType::BloodPressure,
            Self::Sleep(_) => RecordType::Sleep,
            Self::Body(_) => RecordType::BodyMeasurements,
            Self::Hrv(_) => RecordType::Hrv,
        }
    }

    /// The instant that orders records of one type; sessions order by end.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::BloodPressure(r) => r.measured_at,
            Self::Sleep(r) => r.end,
            Self::Body(r) => r.measured_at,
            Self::Hrv(r) => r.measured_at,
        }
    }

    #[must_use]
    pub fn source_app(&self) -> Option<&str> {
        match self {
            Self::BloodPressure(r) => r.source_app.as_deref(),
            Self::Sleep(r) => r.source_app.as_deref(),
            Self::Body(r) => r.source_app.as_deref(),
            Self::Hrv(r) => r.source_app.as_deref(),
        }
    }
}

/// The most recent record of a batch by timestamp.
///
/// Ties resolve to the record that appears last in the batch.
#[must_use]
pub fn latest(records: &[HealthRecord]) -> Option<&HealthRecord> {
    records.iter().max_by_key(|r| r.timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn bp(systolic: i32, diastolic: i32, hour: u32) -> HealthRecord {
        HealthRecord::BloodPressure(BloodPressureReading {
            systolic,
            diastolic,
            measured_at: Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap(),
            source_app: None,
            device_name: Some("Omron".into()),
        })
    }

    #[test]
    fn test_blood_pressure_wire_shape() {
        let json = serde_json::to_value(bp(120, 80, 8)).unwrap();
        assert_eq!(json["systolic"], 120);
        assert_eq!(json["measuredAt"], "2024-01-01T08:00:00Z");
        assert_eq!(json["deviceName"], "Omron");
        assert!(json.get("sourceApp").is_none());
    }

    #[test]
    fn test_body_measurement_wire_names() {
        let record = HealthRecord::Body(BodyMeasurement {
            measured_at: Utc.with_ymd_and_hms(2024, 1, 1, 7, 0, 0).unwrap(),
            weight_kg: Some(80.5),
            body_fat_percent: None,
            lean_mass_kg: Some(62.0),
            source_app: Some("com.withings.wiscale2".into()),
            device_name: None,
        });
        let json = serde_json::to_value(record).unwrap();
        assert_eq!(json["weightKg"], 80.5);
        assert_eq!(json["muscleMassKg"], 62.0);
        assert!(json.get("bodyFatPercent").is_none());
    }

    #[test]
    fn test_latest_ignores_input_order() {
        let records = vec![bp(118, 78, 9), bp(120, 80, 8)];
        let HealthRecord::BloodPressure(newest) = latest(&records).unwrap() else {
            panic!("expected blood pressure");
        };
        assert_eq!(newest.systolic, 118);
        assert!(latest(&[]).is_none());
    }
}
