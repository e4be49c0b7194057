//! Snapshot cache keys and values.
//!
//! The cache holds one "latest known value" per metric. A missing key means
//! the metric was never observed, which is distinct from an observed zero.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::Error;

/// Every slot in the snapshot cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKey {
    #[serde(rename = "last_bp_systolic")]
    BpSystolic,
    #[serde(rename = "last_bp_diastolic")]
    BpDiastolic,
    #[serde(rename = "last_bp_time")]
    BpTime,
    #[serde(rename = "last_sleep_duration_min")]
    SleepDurationMin,
    #[serde(rename = "last_sleep_deep_min")]
    SleepDeepMin,
    #[serde(rename = "last_sleep_rem_min")]
    SleepRemMin,
    #[serde(rename = "last_sleep_time")]
    SleepTime,
    #[serde(rename = "last_weight_kg")]
    WeightKg,
    #[serde(rename = "last_weight_time")]
    WeightTime,
    #[serde(rename = "last_hrv_ms")]
    HrvMs,
    #[serde(rename = "last_hrv_time")]
    HrvTime,
    /// Epoch milliseconds of the last completed run.
    #[serde(rename = "last_sync")]
    LastSync,
}

impl MetricKey {
    pub const ALL: [Self; 12] = [
        Self::BpSystolic,
        Self::BpDiastolic,
        Self::BpTime,
        Self::SleepDurationMin,
        Self::SleepDeepMin,
        Self::SleepRemMin,
        Self::SleepTime,
        Self::WeightKg,
        Self::WeightTime,
        Self::HrvMs,
        Self::HrvTime,
        Self::LastSync,
    ];

    /// Storage key.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::BpSystolic => "last_bp_systolic",
            Self::BpDiastolic => "last_bp_diastolic",
            Self::BpTime => "last_bp_time",
            Self::SleepDurationMin => "last_sleep_duration_min",
            Self::SleepDeepMin => "last_sleep_deep_min",
            Self::SleepRemMin => "last_sleep_rem_min",
            Self::SleepTime => "last_sleep_time",
            Self::WeightKg => "last_weight_kg",
            Self::WeightTime => "last_weight_time",
            Self::HrvMs => "last_hrv_ms",
            Self::HrvTime => "last_hrv_time",
            Self::LastSync => "last_sync",
        }
    }
}

impl std::fmt::Display for MetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MetricKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| Error::UnknownMetric(s.to_string()))
    }
}

/// A cached value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SnapshotValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl SnapshotValue {
    /// Store an instant as RFC 3339 text, keeping any fractional seconds.
    #[must_use]
    pub fn time(at: DateTime<Utc>) -> Self {
        Self::Text(at.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }

    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
        }
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            Self::Text(_) => None,
        }
    }

    #[must_use]
    pub fn as_time(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Text(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            _ => None,
        }
    }

    /// Rebuild from the stored text and kind tag.
    pub(crate) fn decode(raw: String, kind: &str) -> Option<Self> {
        match kind {
            "int" => raw.parse().ok().map(Self::Int),
            "float" => raw.parse().ok().map(Self::Float),
            "text" => Some(Self::Text(raw)),
            _ => None,
        }
    }

    pub(crate) fn encode(&self) -> String {
        match self {
            Self::Int(v) => v.to_string(),
            Self::Float(v) => v.to_string(),
            Self::Text(v) => v.clone(),
        }
    }
}

impl std::fmt::Display for SnapshotValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

/// Typed view over the whole cache, as read by display collaborators.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    pub bp_systolic: Option<i64>,
    pub bp_diastolic: Option<i64>,
    pub bp_time: Option<DateTime<Utc>>,
    pub sleep_duration_min: Option<i64>,
    pub sleep_deep_min: Option<i64>,
    pub sleep_rem_min: Option<i64>,
    pub sleep_time: Option<DateTime<Utc>>,
    pub weight_kg: Option<f64>,
    pub weight_time: Option<DateTime<Utc>>,
    pub hrv_ms: Option<f64>,
    pub hrv_time: Option<DateTime<Utc>>,
    pub last_sync: Option<DateTime<Utc>>,
}

impl Snapshot {
    #[must_use]
    pub fn from_values(values: &HashMap<MetricKey, SnapshotValue>) -> Self {
        let int = |k: MetricKey| values.get(&k).and_then(SnapshotValue::as_i64);
        let float = |k: MetricKey| values.get(&k).and_then(SnapshotValue::as_f64);
        let time = |k: MetricKey| values.get(&k).and_then(SnapshotValue::as_time);

        Self {
            bp_systolic: int(MetricKey::BpSystolic),
            bp_diastolic: int(MetricKey::BpDiastolic),
            bp_time: time(MetricKey::BpTime),
            sleep_duration_min: int(MetricKey::SleepDurationMin),
            sleep_deep_min: int(MetricKey::SleepDeepMin),
            sleep_rem_min: int(MetricKey::SleepRemMin),
            sleep_time: time(MetricKey::SleepTime),
            weight_kg: float(MetricKey::WeightKg),
            weight_time: time(MetricKey::WeightTime),
            hrv_ms: float(MetricKey::HrvMs),
            hrv_time: time(MetricKey::HrvTime),
            last_sync: int(MetricKey::LastSync).and_then(DateTime::from_timestamp_millis),
        }
    }

    /// True if no metric has ever been observed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_metric_key_parse() {
        assert_eq!("last_hrv_ms".parse::<MetricKey>().unwrap(), MetricKey::HrvMs);
        assert!(matches!(
            "hrv".parse::<MetricKey>(),
            Err(Error::UnknownMetric(_))
        ));
        for key in MetricKey::ALL {
            assert_eq!(serde_json::to_value(key).unwrap(), key.as_str());
        }
    }

    #[test]
    fn test_value_decode() {
        assert_eq!(SnapshotValue::decode("118".into(), "int"), Some(SnapshotValue::Int(118)));
        assert_eq!(
            SnapshotValue::decode("41.5".into(), "float"),
            Some(SnapshotValue::Float(41.5))
        );
        assert_eq!(SnapshotValue::decode("x".into(), "int"), None);
    }

    #[test]
    fn test_snapshot_from_values() {
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 8, 30, 0).unwrap();
        let mut values = HashMap::new();
        values.insert(MetricKey::BpSystolic, SnapshotValue::Int(118));
        values.insert(MetricKey::BpTime, SnapshotValue::time(at));
        values.insert(
            MetricKey::LastSync,
            SnapshotValue::Int(at.timestamp_millis()),
        );

        let snapshot = Snapshot::from_values(&values);
        assert_eq!(snapshot.bp_systolic, Some(118));
        assert_eq!(snapshot.bp_time, Some(at));
        assert_eq!(snapshot.last_sync, Some(at));
        assert!(snapshot.weight_kg.is_none());
        assert!(!snapshot.is_empty());
        assert!(Snapshot::from_values(&HashMap::new()).is_empty());
    }

    #[test]
    fn test_time_keeps_milliseconds() {
        let at = Utc.timestamp_millis_opt(1_717_230_618_585).unwrap();
        let value = SnapshotValue::time(at);
        assert_eq!(value, SnapshotValue::Text("2024-06-01T08:30:18.585Z".into()));
        assert_eq!(value.as_time(), Some(at));

        let whole = Utc.with_ymd_and_hms(2024, 6, 1, 8, 30, 18).unwrap();
        assert_eq!(
            SnapshotValue::time(whole),
            SnapshotValue::Text("2024-06-01T08:30:18Z".into())
        );
    }
}
