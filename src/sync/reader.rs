//! Record Reader.
//!
//! Drains provider pagination for one record type, applies the
//! source-preference policy, and maps raw provider records into
//! [`HealthRecord`] values. Body composition is read as three streams and
//! joined by the [correlator](super::correlate).

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::{debug, info, warn};

use super::correlate::correlate;
use crate::error::Result;
use crate::model::{BloodPressureReading, HealthRecord, HrvReading, RecordType, SleepSession};
use crate::provider::{
    BloodPressureSample, HealthDataProvider, HrvSample, Permission, ProviderRecordType, RawRecord,
    ReadRequest, SleepSessionSample, SleepStageType,
};

/// Provider record types whose read permission gates a metric family.
///
/// Body fat and lean mass are optional extras for body measurements: without
/// their permissions the composite carries weight only.
#[must_use]
pub const fn gating_type(record_type: RecordType) -> ProviderRecordType {
    match record_type {
        RecordType::BloodPressure => ProviderRecordType::BloodPressure,
        RecordType::Sleep => ProviderRecordType::SleepSession,
        RecordType::BodyMeasurements => ProviderRecordType::Weight,
        RecordType::Hrv => ProviderRecordType::HeartRateVariability,
    }
}

/// Reads reconciled records of one metric family from a provider.
pub struct RecordReader<'a, P> {
    provider: &'a P,
    preferred_source: &'a str,
    granted: &'a HashSet<Permission>,
}

impl<'a, P: HealthDataProvider> RecordReader<'a, P> {
    /// Create a reader over `provider` with the permissions granted for this run.
    pub const fn new(
        provider: &'a P,
        preferred_source: &'a str,
        granted: &'a HashSet<Permission>,
    ) -> Self {
        Self {
            provider,
            preferred_source,
            granted,
        }
    }

    fn is_granted(&self, record_type: ProviderRecordType) -> bool {
        self.granted.contains(&Permission::read(record_type))
    }

    /// Drain every page of `record_type` at or after `since`.
    ///
    /// # Errors
    ///
    /// Any page failure aborts the whole read; records accumulated from
    /// earlier pages are discarded.
    pub async fn read_all(
        &self,
        record_type: ProviderRecordType,
        since: DateTime<Utc>,
    ) -> Result<Vec<RawRecord>> {
        let mut request = ReadRequest {
            record_type,
            since,
            page_token: None,
        };
        let mut records = Vec::new();
        let mut pages = 0usize;

        loop {
            let page = self.provider.read_page(&request).await?;
            pages += 1;
            records.extend(page.records);
            match page.next_page_token {
                Some(token) => request.page_token = Some(token),
                None => break,
            }
        }

        debug!(
            provider = self.provider.name(),
            record_type = %record_type,
            pages,
            count = records.len(),
            "Drained provider pages"
        );
        Ok(records)
    }

    /// Read one metric family since `since`.
    ///
    /// Returns `Ok(None)` when the gating read permission is not granted;
    /// the family is skipped for this run.
    ///
    /// # Errors
    ///
    /// Returns the provider's error if any page read fails.
    pub async fn read(
        &self,
        record_type: RecordType,
        since: DateTime<Utc>,
    ) -> Result<Option<Vec<HealthRecord>>> {
        let gate = gating_type(record_type);
        if !self.is_granted(gate) {
            warn!(
                record_type = %record_type,
                permission = %Permission::read(gate),
                "Permission not granted, skipping"
            );
            return Ok(None);
        }

        let records = match record_type {
            RecordType::BloodPressure => self
                .read_all(ProviderRecordType::BloodPressure, since)
                .await?
                .into_iter()
                .filter_map(|r| match r {
                    RawRecord::BloodPressure(s) => Some(map_blood_pressure(&s)),
                    _ => None,
                })
                .collect(),
            RecordType::Sleep => {
                let raw = self.read_all(ProviderRecordType::SleepSession, since).await?;
                apply_source_preference(raw, self.preferred_source)
                    .into_iter()
                    .filter_map(|r| match r {
                        RawRecord::SleepSession(s) => Some(map_sleep(&s)),
                        _ => None,
                    })
                    .collect()
            }
            RecordType::BodyMeasurements => self.read_body(since).await?,
            RecordType::Hrv => {
                let raw = self
                    .read_all(ProviderRecordType::HeartRateVariability, since)
                    .await?;
                apply_source_preference(raw, self.preferred_source)
                    .into_iter()
                    .filter_map(|r| match r {
                        RawRecord::HeartRateVariability(s) => Some(map_hrv(&s)),
                        _ => None,
                    })
                    .collect()
            }
        };

        info!(record_type = %record_type, count = records.len(), "Read records");
        Ok(Some(records))
    }

    async fn read_body(&self, since: DateTime<Utc>) -> Result<Vec<HealthRecord>> {
        let weights: Vec<_> = self
            .read_all(ProviderRecordType::Weight, since)
            .await?
            .into_iter()
            .filter_map(|r| match r {
                RawRecord::Weight(s) => Some(s),
                _ => None,
            })
            .collect();

        let body_fats: Vec<_> = self
            .read_optional(ProviderRecordType::BodyFat, since)
            .await?
            .into_iter()
            .filter_map(|r| match r {
                RawRecord::BodyFat(s) => Some(s),
                _ => None,
            })
            .collect();

        let lean_masses: Vec<_> = self
            .read_optional(ProviderRecordType::LeanBodyMass, since)
            .await?
            .into_iter()
            .filter_map(|r| match r {
                RawRecord::LeanBodyMass(s) => Some(s),
                _ => None,
            })
            .collect();

        Ok(correlate(&weights, &body_fats, &lean_masses)
            .into_iter()
            .map(HealthRecord::Body)
            .collect())
    }

    async fn read_optional(
        &self,
        record_type: ProviderRecordType,
        since: DateTime<Utc>,
    ) -> Result<Vec<RawRecord>> {
        if self.is_granted(record_type) {
            self.read_all(record_type, since).await
        } else {
            warn!(
                permission = %Permission::read(record_type),
                "Permission not granted, body measurements will omit it"
            );
            Ok(Vec::new())
        }
    }
}

/// Narrow a batch to the preferred source if it holds any of its records.
///
/// This is a whole-batch decision: either every record from other sources
/// is dropped, or the batch is returned untouched.
#[must_use]
pub fn apply_source_preference(records: Vec<RawRecord>, preferred: &str) -> Vec<RawRecord> {
    if !records.iter().any(|r| r.data_origin() == preferred) {
        return records;
    }

    let before = records.len();
    let kept: Vec<RawRecord> = records
        .into_iter()
        .filter(|r| r.data_origin() == preferred)
        .collect();
    debug!(
        preferred,
        kept = kept.len(),
        dropped = before - kept.len(),
        "Applied source preference"
    );
    kept
}

#[allow(clippy::cast_possible_truncation)]
fn map_blood_pressure(sample: &BloodPressureSample) -> HealthRecord {
    HealthRecord::BloodPressure(BloodPressureReading {
        systolic: sample.systolic_mmhg as i32,
        diastolic: sample.diastolic_mmhg as i32,
        measured_at: sample.time,
        source_app: Some(sample.metadata.data_origin.clone()),
        device_name: sample.metadata.device_manufacturer.clone(),
    })
}

fn map_sleep(sample: &SleepSessionSample) -> HealthRecord {
    let stage_minutes = |wanted: SleepStageType| -> i64 {
        sample
            .stages
            .iter()
            .filter(|s| s.stage == wanted)
            .map(|s| (s.end_time - s.start_time).num_minutes())
            .sum()
    };

    HealthRecord::Sleep(SleepSession {
        start: sample.start_time,
        end: sample.end_time,
        duration_minutes: (sample.end_time - sample.start_time).num_minutes(),
        deep_sleep_minutes: stage_minutes(SleepStageType::Deep),
        rem_sleep_minutes: stage_minutes(SleepStageType::Rem),
        light_sleep_minutes: stage_minutes(SleepStageType::Light),
        source_app: Some(sample.metadata.data_origin.clone()),
        device_name: sample.metadata.device_manufacturer.clone(),
    })
}

fn map_hrv(sample: &HrvSample) -> HealthRecord {
    HealthRecord::Hrv(HrvReading {
        measured_at: sample.time,
        rmssd_ms: sample.rmssd_ms,
        source_app: Some(sample.metadata.data_origin.clone()),
        device_name: sample.metadata.device_manufacturer.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{
        required_permissions, BodyFatSample, MemoryProvider, RecordMetadata, SleepStage,
        WeightSample,
    };
    use chrono::{TimeDelta, TimeZone};

    const OURA: &str = "com.ouraring.oura";
    const WATCH: &str = "com.samsung.android.wear.shealth";

    fn t(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, hour, minute, 0).unwrap()
    }

    fn since() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
    }

    fn meta(origin: &str) -> RecordMetadata {
        RecordMetadata {
            data_origin: origin.into(),
            device_manufacturer: None,
        }
    }

    fn bp(systolic: f64, diastolic: f64, at: DateTime<Utc>) -> RawRecord {
        RawRecord::BloodPressure(BloodPressureSample {
            time: at,
            systolic_mmhg: systolic,
            diastolic_mmhg: diastolic,
            metadata: meta("com.omronhealthcare.omronconnect"),
        })
    }

    fn hrv(origin: &str, ms: f64) -> RawRecord {
        RawRecord::HeartRateVariability(HrvSample {
            time: t(6, 0),
            rmssd_ms: ms,
            metadata: meta(origin),
        })
    }

    fn stage(start: DateTime<Utc>, minutes: i64, stage: SleepStageType) -> SleepStage {
        SleepStage {
            start_time: start,
            end_time: start + TimeDelta::minutes(minutes),
            stage,
        }
    }

    #[tokio::test]
    async fn test_pagination_returns_union_of_pages() {
        let provider = MemoryProvider::new()
            .with_page(ProviderRecordType::BloodPressure, vec![bp(120.0, 80.0, t(8, 0))])
            .with_page(ProviderRecordType::BloodPressure, vec![])
            .with_page(
                ProviderRecordType::BloodPressure,
                vec![bp(118.0, 78.0, t(9, 0)), bp(121.0, 79.0, t(10, 0))],
            );
        let granted = required_permissions();
        let reader = RecordReader::new(&provider, OURA, &granted);

        let raw = reader
            .read_all(ProviderRecordType::BloodPressure, since())
            .await
            .unwrap();
        assert_eq!(raw.len(), 3);
        assert_eq!(provider.requests().len(), 3);
        assert_eq!(provider.requests()[2].page_token.as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_failure_mid_pagination_aborts_read() {
        let provider = MemoryProvider::new()
            .with_page(ProviderRecordType::BloodPressure, vec![bp(120.0, 80.0, t(8, 0))])
            .with_failing_page(ProviderRecordType::BloodPressure, "permission revoked");
        let granted = required_permissions();
        let reader = RecordReader::new(&provider, OURA, &granted);

        assert!(reader.read(RecordType::BloodPressure, since()).await.is_err());
    }

    #[tokio::test]
    async fn test_blood_pressure_truncates() {
        let provider = MemoryProvider::new()
            .with_page(ProviderRecordType::BloodPressure, vec![bp(120.9, 80.4, t(8, 0))]);
        let granted = required_permissions();
        let reader = RecordReader::new(&provider, OURA, &granted);

        let records = reader
            .read(RecordType::BloodPressure, since())
            .await
            .unwrap()
            .unwrap();
        let HealthRecord::BloodPressure(reading) = &records[0] else {
            panic!("expected blood pressure");
        };
        assert_eq!((reading.systolic, reading.diastolic), (120, 80));
    }

    #[test]
    fn test_source_preference_keeps_only_preferred() {
        let batch = vec![hrv(WATCH, 40.0), hrv(OURA, 52.0), hrv(WATCH, 41.0)];
        let filtered = apply_source_preference(batch, OURA);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].data_origin(), OURA);
    }

    #[test]
    fn test_source_preference_without_preferred_is_identity() {
        let batch = vec![hrv(WATCH, 40.0), hrv("com.fitbit.FitbitMobile", 45.0)];
        let filtered = apply_source_preference(batch.clone(), OURA);
        assert_eq!(filtered, batch);
    }

    #[tokio::test]
    async fn test_sleep_stage_minutes() {
        let start = t(0, 0);
        let session = SleepSessionSample {
            start_time: start,
            end_time: start + TimeDelta::minutes(420),
            stages: vec![
                stage(start, 90, SleepStageType::Light),
                stage(start + TimeDelta::minutes(90), 60, SleepStageType::Deep),
                stage(start + TimeDelta::minutes(150), 30, SleepStageType::Awake),
                stage(start + TimeDelta::minutes(180), 45, SleepStageType::Rem),
                stage(start + TimeDelta::minutes(225), 20, SleepStageType::Deep),
                stage(start + TimeDelta::minutes(245), 15, SleepStageType::Unknown),
            ],
            metadata: meta(OURA),
        };
        let provider = MemoryProvider::new().with_page(
            ProviderRecordType::SleepSession,
            vec![RawRecord::SleepSession(session)],
        );
        let granted = required_permissions();
        let reader = RecordReader::new(&provider, OURA, &granted);

        let records = reader.read(RecordType::Sleep, since()).await.unwrap().unwrap();
        let HealthRecord::Sleep(sleep) = &records[0] else {
            panic!("expected sleep");
        };
        assert_eq!(sleep.duration_minutes, 420);
        assert_eq!(sleep.deep_sleep_minutes, 80);
        assert_eq!(sleep.rem_sleep_minutes, 45);
        assert_eq!(sleep.light_sleep_minutes, 90);
    }

    #[tokio::test]
    async fn test_sleep_prefers_configured_source() {
        let session = |origin: &str, start: DateTime<Utc>, hours: i64| {
            RawRecord::SleepSession(SleepSessionSample {
                start_time: start,
                end_time: start + TimeDelta::hours(hours),
                stages: Vec::new(),
                metadata: meta(origin),
            })
        };
        let provider = MemoryProvider::new().with_page(
            ProviderRecordType::SleepSession,
            vec![
                session(WATCH, t(0, 0), 6),
                session(OURA, t(0, 30), 7),
                session(WATCH, t(13, 0), 1),
            ],
        );
        let granted = required_permissions();

        let preferred = RecordReader::new(&provider, OURA, &granted)
            .read(RecordType::Sleep, since())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(preferred.len(), 1);
        assert_eq!(preferred[0].source_app(), Some(OURA));

        let absent = RecordReader::new(&provider, "com.fitbit.FitbitMobile", &granted)
            .read(RecordType::Sleep, since())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(absent.len(), 3);
    }

    #[tokio::test]
    async fn test_missing_permission_skips_type() {
        let provider = MemoryProvider::new()
            .with_page(ProviderRecordType::BloodPressure, vec![bp(120.0, 80.0, t(8, 0))])
            .with_granted([Permission::read(ProviderRecordType::Weight)]);
        let granted = provider.granted_permissions().await.unwrap();
        let reader = RecordReader::new(&provider, OURA, &granted);

        assert!(reader.read(RecordType::BloodPressure, since()).await.unwrap().is_none());
        assert!(provider.requests().is_empty());
    }

    #[tokio::test]
    async fn test_body_without_fat_permission_keeps_weight() {
        let weight = RawRecord::Weight(WeightSample {
            time: t(7, 0),
            weight_kg: 81.2,
            metadata: meta("com.withings.wiscale2"),
        });
        let fat = RawRecord::BodyFat(BodyFatSample {
            time: t(7, 0),
            percentage: 19.0,
            metadata: meta("com.withings.wiscale2"),
        });
        let provider = MemoryProvider::new()
            .with_page(ProviderRecordType::Weight, vec![weight])
            .with_page(ProviderRecordType::BodyFat, vec![fat])
            .with_granted([Permission::read(ProviderRecordType::Weight)]);
        let granted = provider.granted_permissions().await.unwrap();
        let reader = RecordReader::new(&provider, OURA, &granted);

        let records = reader
            .read(RecordType::BodyMeasurements, since())
            .await
            .unwrap()
            .unwrap();
        let HealthRecord::Body(body) = &records[0] else {
            panic!("expected body measurement");
        };
        assert_eq!(body.weight_kg, Some(81.2));
        assert!(body.body_fat_percent.is_none());
    }
}
