//! SQLite storage implementation.
//!
//! One connection behind a mutex, shared between the sync pipeline (the
//! only writer) and display readers. Every multi-key write runs in an
//! IMMEDIATE transaction.

use crate::error::{Error, Result};
use crate::model::SyncRunRecord;
use crate::storage::schema::apply_schema;
use crate::storage::snapshot::{MetricKey, Snapshot, SnapshotValue};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// SQLite-based storage backend.
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Open a database at the given path.
    ///
    /// Creates the database and applies schema if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, None)
    }

    /// Open a database with an optional busy timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open_with_timeout(path: &Path, timeout_ms: Option<u64>) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_millis(timeout_ms.unwrap_or(5000)))?;
        apply_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an existing database, failing if the file is absent.
    ///
    /// Used by read-only commands so they never create an empty database.
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` if no file exists at `path`.
    pub fn open_existing(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::NotInitialized {
                path: path.to_path_buf(),
            });
        }
        Self::open(path)
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Other("storage connection lock poisoned".into()))
    }

    // ==================
    // Snapshot Cache
    // ==================

    /// Read one cached value. `None` means never observed.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get(&self, key: MetricKey) -> Result<Option<SnapshotValue>> {
        let conn = self.lock()?;
        let row: Option<(String, String)> = conn
            .query_row(
                "SELECT value, value_kind FROM snapshot WHERE key = ?1",
                [key.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        Ok(row.and_then(|(raw, kind)| SnapshotValue::decode(raw, &kind)))
    }

    /// Overwrite one cached value.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn set(&self, key: MetricKey, value: &SnapshotValue) -> Result<()> {
        self.set_many(&[(key, value.clone())])
    }

    /// Overwrite several cached values in one transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if any write fails; nothing is written in that case.
    pub fn set_many(&self, entries: &[(MetricKey, SnapshotValue)]) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        let now = Utc::now().timestamp_millis();

        {
            let mut stmt = tx.prepare(
                "INSERT INTO snapshot (key, value, value_kind, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    value_kind = excluded.value_kind,
                    updated_at = excluded.updated_at",
            )?;
            for (key, value) in entries {
                stmt.execute(rusqlite::params![
                    key.as_str(),
                    value.encode(),
                    value.kind(),
                    now
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// Every cached value keyed by metric.
    ///
    /// Rows with unknown keys (written by a newer build) are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn snapshot_values(&self) -> Result<HashMap<MetricKey, SnapshotValue>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT key, value, value_kind FROM snapshot")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows
            .into_iter()
            .filter_map(|(key, raw, kind)| {
                let key = key.parse::<MetricKey>().ok()?;
                SnapshotValue::decode(raw, &kind).map(|v| (key, v))
            })
            .collect())
    }

    /// Typed view of the whole cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn load_snapshot(&self) -> Result<Snapshot> {
        Ok(Snapshot::from_values(&self.snapshot_values()?))
    }

    // ==================
    // Run History
    // ==================

    /// Persist one run's outcome.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn record_run(&self, run: &SyncRunRecord) -> Result<()> {
        let summary = run
            .summary
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO sync_runs (id, trigger, started_at, finished_at, outcome, error, summary)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                run.id,
                run.trigger.as_str(),
                run.started_at.timestamp_millis(),
                run.finished_at.timestamp_millis(),
                run.outcome.as_str(),
                run.error,
                summary,
            ],
        )?;
        Ok(())
    }

    /// Most recent runs, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn recent_runs(&self, limit: u32) -> Result<Vec<SyncRunRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, trigger, started_at, finished_at, outcome, error, summary
             FROM sync_runs ORDER BY started_at DESC LIMIT ?1",
        )?;

        let rows = stmt
            .query_map([limit], map_run_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ==================
    // Run Lock
    // ==================

    /// Claim the database-wide run lock for `holder`.
    ///
    /// Every process syncing into this database shares the lock, so a daemon
    /// and a one-shot run never overlap. A claim older than `stale_after` is
    /// taken over, which covers a holder that died without releasing.
    /// Re-claiming a lock `holder` already owns succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails.
    pub fn try_acquire_sync_lock(&self, holder: &str, stale_after: Duration) -> Result<bool> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let now = Utc::now().timestamp_millis();
        let current: Option<(String, i64)> = tx
            .query_row(
                "SELECT holder, acquired_at FROM sync_lock WHERE id = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        if let Some((owner, acquired_at)) = current {
            let stale_ms = i64::try_from(stale_after.as_millis()).unwrap_or(i64::MAX);
            if owner != holder && now.saturating_sub(acquired_at) < stale_ms {
                return Ok(false);
            }
            if owner != holder {
                tracing::warn!(owner = %owner, "Taking over stale sync lock");
            }
        }

        tx.execute(
            "INSERT INTO sync_lock (id, holder, acquired_at) VALUES (1, ?1, ?2)
             ON CONFLICT(id) DO UPDATE SET holder = excluded.holder, acquired_at = excluded.acquired_at",
            rusqlite::params![holder, now],
        )?;
        tx.commit()?;
        Ok(true)
    }

    /// Release the run lock if `holder` still owns it.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn release_sync_lock(&self, holder: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM sync_lock WHERE id = 1 AND holder = ?1", [holder])?;
        Ok(())
    }
}

fn map_run_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SyncRunRecord> {
    let conversion = |idx: usize, msg: String| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            Box::new(Error::Other(msg)),
        )
    };

    let trigger: String = row.get(1)?;
    let outcome: String = row.get(4)?;
    let summary: Option<String> = row.get(6)?;

    Ok(SyncRunRecord {
        id: row.get(0)?,
        trigger: trigger.parse().map_err(|e| conversion(1, e))?,
        started_at: millis_to_datetime(row.get(2)?),
        finished_at: millis_to_datetime(row.get(3)?),
        outcome: outcome.parse().map_err(|e| conversion(4, e))?,
        error: row.get(5)?,
        summary: summary.and_then(|s| serde_json::from_str(&s).ok()),
    })
}

fn millis_to_datetime(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RunOutcome, Trigger};
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn test_get_missing_is_none() {
        let storage = SqliteStorage::open_memory().unwrap();
        assert!(storage.get(MetricKey::BpSystolic).unwrap().is_none());
        assert!(storage.load_snapshot().unwrap().is_empty());
    }

    #[test]
    fn test_set_overwrites() {
        let storage = SqliteStorage::open_memory().unwrap();
        storage.set(MetricKey::BpSystolic, &SnapshotValue::Int(120)).unwrap();
        storage.set(MetricKey::BpSystolic, &SnapshotValue::Int(118)).unwrap();
        assert_eq!(
            storage.get(MetricKey::BpSystolic).unwrap(),
            Some(SnapshotValue::Int(118))
        );
    }

    #[test]
    fn test_observed_zero_is_not_absent() {
        let storage = SqliteStorage::open_memory().unwrap();
        storage.set(MetricKey::SleepDeepMin, &SnapshotValue::Int(0)).unwrap();
        assert_eq!(
            storage.get(MetricKey::SleepDeepMin).unwrap(),
            Some(SnapshotValue::Int(0))
        );
        assert!(storage.get(MetricKey::SleepRemMin).unwrap().is_none());
    }

    #[test]
    fn test_set_many_and_typed_snapshot() {
        let storage = SqliteStorage::open_memory().unwrap();
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 7, 15, 0).unwrap();
        storage
            .set_many(&[
                (MetricKey::WeightKg, SnapshotValue::Float(80.4)),
                (MetricKey::WeightTime, SnapshotValue::time(at)),
            ])
            .unwrap();

        let snapshot = storage.load_snapshot().unwrap();
        assert_eq!(snapshot.weight_kg, Some(80.4));
        assert_eq!(snapshot.weight_time, Some(at));
    }

    #[test]
    fn test_persists_across_reopen() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("data").join("healthsync.db");
        {
            let storage = SqliteStorage::open(&path).unwrap();
            storage.set(MetricKey::HrvMs, &SnapshotValue::Float(42.0)).unwrap();
        }
        let storage = SqliteStorage::open_existing(&path).unwrap();
        assert_eq!(
            storage.get(MetricKey::HrvMs).unwrap(),
            Some(SnapshotValue::Float(42.0))
        );
    }

    #[test]
    fn test_open_existing_missing() {
        let temp = TempDir::new().unwrap();
        let err = SqliteStorage::open_existing(&temp.path().join("nope.db")).unwrap_err();
        assert!(matches!(err, Error::NotInitialized { .. }));
    }

    #[test]
    fn test_run_history_newest_first() {
        let storage = SqliteStorage::open_memory().unwrap();
        let base = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();

        for (i, outcome) in [RunOutcome::Retry, RunOutcome::Success].into_iter().enumerate() {
            let started = base + chrono::TimeDelta::minutes(15 * i as i64);
            storage
                .record_run(&SyncRunRecord {
                    id: format!("run-{i}"),
                    trigger: Trigger::Periodic,
                    started_at: started,
                    finished_at: started + chrono::TimeDelta::seconds(3),
                    outcome,
                    error: (outcome == RunOutcome::Retry).then(|| "provider down".to_string()),
                    summary: Some(serde_json::json!({"types": []})),
                })
                .unwrap();
        }

        let runs = storage.recent_runs(10).unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].id, "run-1");
        assert_eq!(runs[0].outcome, RunOutcome::Success);
        assert_eq!(runs[1].error.as_deref(), Some("provider down"));
        assert_eq!(runs[0].summary, Some(serde_json::json!({"types": []})));
    }

    #[test]
    fn test_sync_lock_excludes_other_connections() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("healthsync.db");
        let daemon = SqliteStorage::open(&path).unwrap();
        let oneshot = SqliteStorage::open(&path).unwrap();
        let stale_after = Duration::from_secs(1800);

        assert!(daemon.try_acquire_sync_lock("daemon", stale_after).unwrap());
        assert!(!oneshot.try_acquire_sync_lock("oneshot", stale_after).unwrap());
        // Re-entrant for the current holder
        assert!(daemon.try_acquire_sync_lock("daemon", stale_after).unwrap());

        // Releasing someone else's lock is a no-op
        oneshot.release_sync_lock("oneshot").unwrap();
        assert!(!oneshot.try_acquire_sync_lock("oneshot", stale_after).unwrap());

        daemon.release_sync_lock("daemon").unwrap();
        assert!(oneshot.try_acquire_sync_lock("oneshot", stale_after).unwrap());
        assert!(!daemon.try_acquire_sync_lock("daemon", stale_after).unwrap());
    }

    #[test]
    fn test_stale_sync_lock_is_taken_over() {
        let storage = SqliteStorage::open_memory().unwrap();
        assert!(storage
            .try_acquire_sync_lock("crashed", Duration::from_secs(1800))
            .unwrap());
        assert!(storage.try_acquire_sync_lock("next", Duration::ZERO).unwrap());

        // The old holder's release no longer clears the new claim
        storage.release_sync_lock("crashed").unwrap();
        assert!(!storage
            .try_acquire_sync_lock("crashed", Duration::from_secs(1800))
            .unwrap());
    }
}
