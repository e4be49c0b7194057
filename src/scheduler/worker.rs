//! The job the scheduler runs.

use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

use crate::model::{RunOutcome, SyncRunRecord, Trigger};
use crate::provider::HealthDataProvider;
use crate::sync::{SyncEngine, SyncReport};

/// What a job hands back to the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome<R> {
    Success(R),
    /// The attempt failed and should be retried; carries the reason.
    Retry(String),
}

impl<R> JobOutcome<R> {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// A claimed run lock older than this is assumed abandoned.
pub const SYNC_LOCK_STALE_AFTER: Duration = Duration::from_secs(30 * 60);

/// A unit of work the scheduler can trigger.
///
/// Implementations never fail: every error becomes [`JobOutcome::Retry`].
pub trait SyncJob: Send + Sync + 'static {
    type Report: Send + 'static;

    fn run(&self, trigger: Trigger) -> impl Future<Output = JobOutcome<Self::Report>> + Send;

    /// Claim any lock shared with other processes before a run.
    /// Returning `false` means someone else is running.
    fn try_claim(&self) -> bool {
        true
    }

    /// Give back what [`try_claim`](Self::try_claim) took.
    fn release(&self) {}
}

/// Runs the sync engine and records each run in the history table.
pub struct SyncWorker<P> {
    engine: SyncEngine<P>,
    holder: String,
}

impl<P: HealthDataProvider> SyncWorker<P> {
    pub fn new(engine: SyncEngine<P>) -> Self {
        Self {
            engine,
            holder: format!("{}:{}", std::process::id(), uuid::Uuid::new_v4()),
        }
    }

    #[must_use]
    pub const fn engine(&self) -> &SyncEngine<P> {
        &self.engine
    }

    fn record(&self, run: &SyncRunRecord) {
        if let Err(e) = self.engine.storage().record_run(run) {
            warn!(run_id = %run.id, error = %e, "Failed to record sync run");
        }
    }
}

impl<P: HealthDataProvider + 'static> SyncJob for SyncWorker<P> {
    type Report = SyncReport;

    fn try_claim(&self) -> bool {
        match self
            .engine
            .storage()
            .try_acquire_sync_lock(&self.holder, SYNC_LOCK_STALE_AFTER)
        {
            Ok(claimed) => claimed,
            Err(e) => {
                warn!(error = %e, "Failed to claim sync lock");
                false
            }
        }
    }

    fn release(&self) {
        if let Err(e) = self.engine.storage().release_sync_lock(&self.holder) {
            warn!(error = %e, "Failed to release sync lock");
        }
    }

    async fn run(&self, trigger: Trigger) -> JobOutcome<SyncReport> {
        let started_at = chrono::Utc::now();

        match self.engine.run(trigger).await {
            Ok(report) => {
                self.record(&SyncRunRecord {
                    id: report.run_id.clone(),
                    trigger,
                    started_at: report.started_at,
                    finished_at: report.finished_at,
                    outcome: RunOutcome::Success,
                    error: None,
                    summary: serde_json::to_value(&report.types).ok(),
                });
                JobOutcome::Success(report)
            }
            Err(e) => {
                error!(trigger = %trigger, error = %e, "Sync run failed, requesting retry");
                self.record(&SyncRunRecord {
                    id: uuid::Uuid::new_v4().to_string(),
                    trigger,
                    started_at,
                    finished_at: chrono::Utc::now(),
                    outcome: RunOutcome::Retry,
                    error: Some(e.to_string()),
                    summary: None,
                });
                JobOutcome::Retry(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpTimeouts;
    use crate::provider::{MemoryProvider, ProviderRecordType};
    use crate::scheduler::{AlwaysConnected, Scheduler, TriggerOutcome};
    use crate::storage::SqliteStorage;
    use crate::sync::{EngineSettings, SyncDispatcher};
    use std::path::Path;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn worker_with(provider: MemoryProvider, storage: SqliteStorage) -> SyncWorker<MemoryProvider> {
        // Nothing is read in these tests, so the endpoint is never contacted.
        let dispatcher =
            SyncDispatcher::new("http://127.0.0.1:9", "s", "k", &HttpTimeouts::default()).unwrap();
        SyncWorker::new(SyncEngine::new(
            provider,
            dispatcher,
            Arc::new(storage),
            EngineSettings::default(),
        ))
    }

    fn worker(provider: MemoryProvider) -> SyncWorker<MemoryProvider> {
        worker_with(provider, SqliteStorage::open_memory().unwrap())
    }

    fn worker_on(path: &Path) -> SyncWorker<MemoryProvider> {
        worker_with(MemoryProvider::new(), SqliteStorage::open(path).unwrap())
    }

    #[tokio::test]
    async fn test_read_failure_requests_retry_and_is_recorded() {
        let worker = worker(
            MemoryProvider::new().with_failing_page(ProviderRecordType::BloodPressure, "io error"),
        );

        let outcome = worker.run(Trigger::Periodic).await;
        assert!(matches!(outcome, JobOutcome::Retry(ref msg) if msg.contains("io error")));

        let runs = worker.engine().storage().recent_runs(5).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].outcome, RunOutcome::Retry);
        assert!(runs[0].error.as_deref().unwrap().contains("io error"));
    }

    #[tokio::test]
    async fn test_unavailable_provider_requests_retry() {
        let worker = worker(MemoryProvider::new().unavailable("not installed"));
        assert!(!worker.run(Trigger::Manual).await.is_success());
    }

    #[tokio::test]
    async fn test_empty_run_succeeds() {
        let worker = worker(MemoryProvider::new());
        let outcome = worker.run(Trigger::Manual).await;
        let JobOutcome::Success(report) = outcome else {
            panic!("expected success");
        };
        assert_eq!(report.total_read(), 0);

        let runs = worker.engine().storage().recent_runs(5).unwrap();
        assert_eq!(runs[0].outcome, RunOutcome::Success);
        assert!(runs[0].summary.is_some());
    }

    #[tokio::test]
    async fn test_run_releases_sync_lock() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("healthsync.db");
        let daemon = worker_on(&path);
        let oneshot = worker_on(&path);

        assert!(daemon.try_claim());
        assert!(!oneshot.try_claim());
        daemon.release();
        assert!(oneshot.try_claim());
        oneshot.release();
    }

    #[tokio::test]
    async fn test_second_process_sees_run_in_progress() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("healthsync.db");

        // Two schedulers over one database, as `hsync daemon` and
        // `hsync sync run` would be.
        let daemon = Scheduler::new(worker_on(&path), AlwaysConnected);
        let oneshot = Scheduler::new(worker_on(&path), AlwaysConnected);

        assert!(daemon.job().try_claim());
        assert_eq!(oneshot.run_now().await, TriggerOutcome::AlreadyRunning);
        assert!(oneshot.job().engine().storage().recent_runs(5).unwrap().is_empty());

        daemon.job().release();
        assert!(matches!(
            oneshot.run_now().await,
            TriggerOutcome::Completed(JobOutcome::Success(_))
        ));
        // The finished run left the lock free for the daemon.
        assert!(daemon.job().try_claim());
    }
}
