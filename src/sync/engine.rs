//! The sync pipeline for one run.
//!
//! For each metric family, in order: read (draining pagination, applying
//! source preference, correlating body composition), dispatch to the sync
//! endpoint, then write the newest record into the snapshot cache. The
//! cache write depends only on the read, never on the dispatch outcome.
//!
//! A read failure aborts the run with an error; a dispatch failure is
//! recorded in the [`SyncReport`] and the run continues.

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use super::dispatch::{DispatchResult, SyncDispatcher};
use super::reader::RecordReader;
use crate::config::SyncSettings;
use crate::error::Result;
use crate::model::{latest, HealthRecord, RecordType, Trigger};
use crate::provider::HealthDataProvider;
use crate::storage::{MetricKey, SnapshotValue, SqliteStorage};

/// Engine knobs resolved from [`SyncSettings`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    pub lookback: TimeDelta,
    pub preferred_source: String,
    pub dispatch_hrv: bool,
}

impl EngineSettings {
    #[must_use]
    pub fn from_settings(settings: &SyncSettings) -> Self {
        Self {
            lookback: TimeDelta::days(i64::from(settings.lookback_days)),
            preferred_source: settings.preferred_source.clone(),
            dispatch_hrv: settings.dispatch_hrv,
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            lookback: TimeDelta::days(i64::from(crate::config::DEFAULT_LOOKBACK_DAYS)),
            preferred_source: crate::config::DEFAULT_PREFERRED_SOURCE.to_string(),
            dispatch_hrv: false,
        }
    }
}

/// What happened to one family's dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DispatchStatus {
    Sent {
        success: bool,
        synced: i64,
        #[serde(skip_serializing_if = "Option::is_none")]
        sync_id: Option<String>,
    },
    /// Nothing was read, so no request was made.
    Skipped,
    /// Dispatch is turned off for this family.
    Disabled,
    /// The family was not read, so there was nothing to dispatch.
    NotAttempted,
    Failed { error: String },
}

impl DispatchStatus {
    fn from_result(result: DispatchResult) -> Self {
        match result {
            Ok(ack) if ack.skipped => Self::Skipped,
            Ok(ack) => Self::Sent {
                success: ack.success,
                synced: ack.synced,
                sync_id: ack.sync_id,
            },
            Err(e) => Self::Failed {
                error: e.to_string(),
            },
        }
    }

    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Per-family outcome of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeReport {
    pub record_type: RecordType,
    /// False when the gating read permission was not granted.
    pub permitted: bool,
    pub read: usize,
    pub dispatch: DispatchStatus,
    /// True if the snapshot cache was written for this family.
    pub cached: bool,
}

/// Outcome of a completed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub run_id: String,
    pub trigger: Trigger,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub types: Vec<TypeReport>,
}

impl SyncReport {
    #[must_use]
    pub fn total_read(&self) -> usize {
        self.types.iter().map(|t| t.read).sum()
    }

    #[must_use]
    pub fn dispatch_failures(&self) -> usize {
        self.types.iter().filter(|t| t.dispatch.is_failure()).count()
    }

    #[must_use]
    pub fn get(&self, record_type: RecordType) -> Option<&TypeReport> {
        self.types.iter().find(|t| t.record_type == record_type)
    }
}

/// Reads, dispatches, and caches every metric family.
pub struct SyncEngine<P> {
    provider: P,
    dispatcher: SyncDispatcher,
    storage: Arc<SqliteStorage>,
    settings: EngineSettings,
}

impl<P: HealthDataProvider> SyncEngine<P> {
    pub const fn new(
        provider: P,
        dispatcher: SyncDispatcher,
        storage: Arc<SqliteStorage>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            provider,
            dispatcher,
            storage,
            settings,
        }
    }

    #[must_use]
    pub const fn storage(&self) -> &Arc<SqliteStorage> {
        &self.storage
    }

    #[must_use]
    pub const fn provider(&self) -> &P {
        &self.provider
    }

    fn dispatch_enabled(&self, record_type: RecordType) -> bool {
        record_type != RecordType::Hrv || self.settings.dispatch_hrv
    }

    /// Run the full pipeline once.
    ///
    /// # Errors
    ///
    /// Returns the first provider or storage error. Families processed
    /// before the failure keep whatever they wrote to the cache.
    pub async fn run(&self, trigger: Trigger) -> Result<SyncReport> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let since = started_at - self.settings.lookback;

        info!(
            run_id = %run_id,
            trigger = %trigger,
            provider = self.provider.name(),
            since = %since,
            "Sync run started"
        );

        let granted = self.provider.granted_permissions().await?;
        let reader = RecordReader::new(&self.provider, &self.settings.preferred_source, &granted);
        let mut types = Vec::with_capacity(RecordType::ALL.len());

        for record_type in RecordType::ALL {
            let Some(records) = reader.read(record_type, since).await? else {
                types.push(TypeReport {
                    record_type,
                    permitted: false,
                    read: 0,
                    dispatch: DispatchStatus::NotAttempted,
                    cached: false,
                });
                continue;
            };

            let dispatch = if self.dispatch_enabled(record_type) {
                DispatchStatus::from_result(self.dispatcher.dispatch(record_type, &records).await)
            } else {
                DispatchStatus::Disabled
            };

            if let DispatchStatus::Failed { error } = &dispatch {
                warn!(record_type = %record_type, count = records.len(), error = %error, "Dispatch failed");
            } else {
                info!(record_type = %record_type, count = records.len(), dispatch = ?dispatch, "Processed records");
            }

            let cached = self.update_cache(&records)?;
            types.push(TypeReport {
                record_type,
                permitted: true,
                read: records.len(),
                dispatch,
                cached,
            });
        }

        let finished_at = Utc::now();
        self.storage.set(
            MetricKey::LastSync,
            &SnapshotValue::Int(finished_at.timestamp_millis()),
        )?;

        let report = SyncReport {
            run_id,
            trigger,
            started_at,
            finished_at,
            types,
        };
        info!(
            run_id = %report.run_id,
            read = report.total_read(),
            dispatch_failures = report.dispatch_failures(),
            "Sync run finished"
        );
        Ok(report)
    }

    /// Write the newest record of a batch into the cache.
    fn update_cache(&self, records: &[HealthRecord]) -> Result<bool> {
        let Some(newest) = latest(records) else {
            return Ok(false);
        };

        let entries = cache_entries(newest);
        if entries.is_empty() {
            return Ok(false);
        }
        self.storage.set_many(&entries)?;
        Ok(true)
    }
}

fn cache_entries(record: &HealthRecord) -> Vec<(MetricKey, SnapshotValue)> {
    match record {
        HealthRecord::BloodPressure(bp) => vec![
            (MetricKey::BpSystolic, SnapshotValue::Int(i64::from(bp.systolic))),
            (MetricKey::BpDiastolic, SnapshotValue::Int(i64::from(bp.diastolic))),
            (MetricKey::BpTime, SnapshotValue::time(bp.measured_at)),
        ],
        HealthRecord::Sleep(sleep) => vec![
            (MetricKey::SleepDurationMin, SnapshotValue::Int(sleep.duration_minutes)),
            (MetricKey::SleepDeepMin, SnapshotValue::Int(sleep.deep_sleep_minutes)),
            (MetricKey::SleepRemMin, SnapshotValue::Int(sleep.rem_sleep_minutes)),
            (MetricKey::SleepTime, SnapshotValue::time(sleep.end)),
        ],
        HealthRecord::Body(body) => body
            .weight_kg
            .map(|kg| {
                vec![
                    (MetricKey::WeightKg, SnapshotValue::Float(kg)),
                    (MetricKey::WeightTime, SnapshotValue::time(body.measured_at)),
                ]
            })
            .unwrap_or_default(),
        HealthRecord::Hrv(hrv) => vec![
            (MetricKey::HrvMs, SnapshotValue::Float(hrv.rmssd_ms)),
            (MetricKey::HrvTime, SnapshotValue::time(hrv.measured_at)),
        ],
    }
}
