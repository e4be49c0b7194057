//! Data models for HealthSync.

mod record;
mod run;

pub use record::{
    latest, BloodPressureReading, BodyMeasurement, HealthRecord, HrvReading, RecordType,
    SleepSession,
};
pub use run::{RunOutcome, SyncRunRecord, Trigger};
