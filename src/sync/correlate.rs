//! Body-composition correlation.
//!
//! Weight, body fat, and lean mass arrive as three independent record
//! streams. Each weight reading anchors one [`BodyMeasurement`]; the first
//! body-fat and the first lean-mass reading (in read order) whose timestamp
//! lies within [`CORRELATION_WINDOW`] of the weight are merged into it.
//! There is no closest-in-time tie-break, and readings that match no weight
//! are dropped.

use chrono::{DateTime, TimeDelta, Utc};

use crate::model::BodyMeasurement;
use crate::provider::{BodyFatSample, LeanBodyMassSample, WeightSample};

/// Maximum distance, inclusive, between a weight and a merged reading.
pub const CORRELATION_WINDOW: TimeDelta = TimeDelta::hours(1);

fn within_window(anchor: DateTime<Utc>, candidate: DateTime<Utc>) -> bool {
    (candidate - anchor).num_milliseconds().abs() <= CORRELATION_WINDOW.num_milliseconds()
}

/// Merge the three streams into composite measurements, one per weight.
#[must_use]
pub fn correlate(
    weights: &[WeightSample],
    body_fats: &[BodyFatSample],
    lean_masses: &[LeanBodyMassSample],
) -> Vec<BodyMeasurement> {
    weights
        .iter()
        .map(|weight| {
            let body_fat = body_fats.iter().find(|bf| within_window(weight.time, bf.time));
            let lean_mass = lean_masses
                .iter()
                .find(|lm| within_window(weight.time, lm.time));

            BodyMeasurement {
                measured_at: weight.time,
                weight_kg: Some(weight.weight_kg),
                body_fat_percent: body_fat.map(|bf| bf.percentage),
                lean_mass_kg: lean_mass.map(|lm| lm.mass_kg),
                source_app: Some(weight.metadata.data_origin.clone()),
                device_name: weight.metadata.device_manufacturer.clone(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::RecordMetadata;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, 7, 0, 0).unwrap()
    }

    fn meta() -> RecordMetadata {
        RecordMetadata {
            data_origin: "com.withings.wiscale2".into(),
            device_manufacturer: Some("Withings".into()),
        }
    }

    fn weight(at: DateTime<Utc>, kg: f64) -> WeightSample {
        WeightSample {
            time: at,
            weight_kg: kg,
            metadata: meta(),
        }
    }

    fn fat(at: DateTime<Utc>, pct: f64) -> BodyFatSample {
        BodyFatSample {
            time: at,
            percentage: pct,
            metadata: meta(),
        }
    }

    fn lean(at: DateTime<Utc>, kg: f64) -> LeanBodyMassSample {
        LeanBodyMassSample {
            time: at,
            mass_kg: kg,
            metadata: meta(),
        }
    }

    #[test]
    fn test_merges_within_59_minutes() {
        let merged = correlate(
            &[weight(t0(), 80.0)],
            &[fat(t0() + TimeDelta::minutes(59), 18.5)],
            &[lean(t0() - TimeDelta::minutes(59), 63.0)],
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].body_fat_percent, Some(18.5));
        assert_eq!(merged[0].lean_mass_kg, Some(63.0));
        assert_eq!(merged[0].device_name.as_deref(), Some("Withings"));
    }

    #[test]
    fn test_rejects_beyond_61_minutes() {
        let merged = correlate(
            &[weight(t0(), 80.0)],
            &[fat(t0() + TimeDelta::minutes(61), 18.5)],
            &[],
        );
        assert_eq!(merged.len(), 1);
        assert!(merged[0].body_fat_percent.is_none());
        assert!(merged[0].lean_mass_kg.is_none());
    }

    #[test]
    fn test_first_match_not_closest() {
        let merged = correlate(
            &[weight(t0(), 80.0)],
            &[
                fat(t0() + TimeDelta::minutes(50), 20.0),
                fat(t0() + TimeDelta::minutes(1), 19.0),
            ],
            &[],
        );
        assert_eq!(merged[0].body_fat_percent, Some(20.0));
    }

    #[test]
    fn test_orphans_dropped_and_weight_required() {
        let merged = correlate(&[], &[fat(t0(), 18.0)], &[lean(t0(), 60.0)]);
        assert!(merged.is_empty());
    }

    #[test]
    fn test_one_reading_can_serve_several_weights() {
        let merged = correlate(
            &[weight(t0(), 80.0), weight(t0() + TimeDelta::minutes(30), 79.8)],
            &[fat(t0() + TimeDelta::minutes(15), 18.0)],
            &[],
        );
        assert_eq!(merged.len(), 2);
        assert!(merged.iter().all(|m| m.body_fat_percent == Some(18.0)));
    }
}
