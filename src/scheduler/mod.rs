//! Periodic and one-shot triggering of sync runs.
//!
//! The [`Scheduler`] owns a registry of uniquely named periodic jobs and a
//! single-flight guard shared by every trigger path. The job's own claim
//! ([`SyncJob::try_claim`]) extends that guard across processes, so at most
//! one run is in progress at any time. Each attempt is gated by a
//! [`NetworkCondition`]; a periodic attempt deferred for lack of network is
//! re-checked every [`NETWORK_RECHECK`]. Failed attempts are retried with
//! exponential [`BackoffPolicy`] delays.
//!
//! # Job states
//!
//! `Idle -> Running -> {Succeeded, Retrying}`, observable through
//! [`Scheduler::subscribe`].

mod backoff;
mod network;
mod worker;

pub use backoff::BackoffPolicy;
pub use network::{AlwaysConnected, NetworkCondition, ServerReachability};
pub use worker::{JobOutcome, SyncJob, SyncWorker, SYNC_LOCK_STALE_AFTER};

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::model::Trigger;

/// Name of the recurring sync job.
pub const PERIODIC_JOB_NAME: &str = "health_sync_periodic";

/// How often a deferred periodic run re-checks the network.
pub const NETWORK_RECHECK: Duration = Duration::from_secs(60);

/// Observable state of the scheduled work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Idle,
    Running,
    Succeeded,
    /// The last attempt asked for a retry; `attempt` is its 1-based number.
    Retrying { attempt: u32 },
}

/// Result of registering a periodic job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    Enqueued,
    /// A job with this name is already active; the existing schedule is kept.
    AlreadyScheduled,
}

/// Result of one trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOutcome<R> {
    Completed(JobOutcome<R>),
    /// Another run, in this process or another, holds the guard; this
    /// trigger did nothing.
    AlreadyRunning,
    /// The network precondition was not met; the job was not started.
    Deferred,
}

/// Parameters of a periodic job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodicRequest {
    pub interval: Duration,
    pub backoff: BackoffPolicy,
}

impl PeriodicRequest {
    #[must_use]
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            backoff: BackoffPolicy::default(),
        }
    }
}

struct Core<J, N> {
    job: J,
    network: N,
    guard: tokio::sync::Mutex<()>,
    state: watch::Sender<JobState>,
}

impl<J: SyncJob, N: NetworkCondition> Core<J, N> {
    async fn attempt(&self, trigger: Trigger, attempt: u32) -> TriggerOutcome<J::Report> {
        let Ok(_guard) = self.guard.try_lock() else {
            info!(trigger = %trigger, "Sync already in progress, skipping trigger");
            return TriggerOutcome::AlreadyRunning;
        };

        if !self.network.is_satisfied().await {
            info!(trigger = %trigger, "Network unavailable, deferring sync");
            return TriggerOutcome::Deferred;
        }

        if !self.job.try_claim() {
            info!(trigger = %trigger, "Sync running in another process, skipping trigger");
            return TriggerOutcome::AlreadyRunning;
        }

        self.state.send_replace(JobState::Running);
        let outcome = self.job.run(trigger).await;
        self.job.release();
        self.state.send_replace(match &outcome {
            JobOutcome::Success(_) => JobState::Succeeded,
            JobOutcome::Retry(_) => JobState::Retrying { attempt },
        });
        TriggerOutcome::Completed(outcome)
    }
}

struct PeriodicHandle {
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Triggers a [`SyncJob`] periodically or on demand.
pub struct Scheduler<J, N> {
    core: Arc<Core<J, N>>,
    jobs: Mutex<HashMap<String, PeriodicHandle>>,
}

impl<J: SyncJob, N: NetworkCondition> Scheduler<J, N> {
    pub fn new(job: J, network: N) -> Self {
        let (state, _) = watch::channel(JobState::Idle);
        Self {
            core: Arc::new(Core {
                job,
                network,
                guard: tokio::sync::Mutex::new(()),
                state,
            }),
            jobs: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn job(&self) -> &J {
        &self.core.job
    }

    /// Receiver that sees every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<JobState> {
        self.core.state.subscribe()
    }

    #[must_use]
    pub fn state(&self) -> JobState {
        *self.core.state.borrow()
    }

    /// Register a uniquely named periodic job.
    ///
    /// If a job with `name` is still active the call is a no-op and the
    /// existing schedule keeps its timing. The first run fires immediately.
    /// Must be called from within a tokio runtime.
    pub fn schedule_periodic(&self, name: &str, request: PeriodicRequest) -> ScheduleOutcome {
        let Ok(mut jobs) = self.jobs.lock() else {
            warn!(name, "Job registry lock poisoned");
            return ScheduleOutcome::AlreadyScheduled;
        };

        if jobs.get(name).is_some_and(|h| !h.task.is_finished()) {
            debug!(name, "Periodic job already scheduled, keeping existing");
            return ScheduleOutcome::AlreadyScheduled;
        }

        let (cancel, cancel_rx) = watch::channel(false);
        let task = tokio::spawn(periodic_loop(
            Arc::clone(&self.core),
            name.to_string(),
            request,
            cancel_rx,
        ));
        jobs.insert(name.to_string(), PeriodicHandle { cancel, task });

        info!(name, interval_secs = request.interval.as_secs(), "Scheduled periodic sync");
        ScheduleOutcome::Enqueued
    }

    /// Cancel the periodic job `name`.
    ///
    /// Future invocations and pending backoff waits are dropped; a run
    /// already in progress finishes. Returns false if no such job exists.
    pub fn cancel(&self, name: &str) -> bool {
        let Some(handle) = self.jobs.lock().ok().and_then(|mut jobs| jobs.remove(name)) else {
            return false;
        };
        let _ = handle.cancel.send(true);
        info!(name, "Cancelled periodic sync");
        true
    }

    #[must_use]
    pub fn is_scheduled(&self, name: &str) -> bool {
        self.jobs
            .lock()
            .map(|jobs| jobs.get(name).is_some_and(|h| !h.task.is_finished()))
            .unwrap_or(false)
    }

    /// Run one attempt now ("Sync Now").
    pub async fn run_now(&self) -> TriggerOutcome<J::Report> {
        self.core.attempt(Trigger::Manual, 1).await
    }

    /// Run now, retrying failed attempts with `backoff` delays.
    ///
    /// Stops at the first outcome that is not a retry request, or when the
    /// policy allows no further retries.
    pub async fn run_now_with_backoff(&self, backoff: &BackoffPolicy) -> TriggerOutcome<J::Report> {
        let mut attempt = 1;
        loop {
            let outcome = self.core.attempt(Trigger::Manual, attempt).await;
            let TriggerOutcome::Completed(JobOutcome::Retry(reason)) = &outcome else {
                return outcome;
            };
            if !backoff.allows(attempt) {
                return outcome;
            }

            let delay = backoff.delay_for(attempt);
            warn!(attempt, delay_secs = delay.as_secs(), reason = %reason, "Retrying sync after backoff");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Wait until no run is in progress.
    pub async fn wait_idle(&self) {
        drop(self.core.guard.lock().await);
    }
}

impl<J, N> Drop for Scheduler<J, N> {
    fn drop(&mut self) {
        if let Ok(jobs) = self.jobs.get_mut() {
            for handle in jobs.values() {
                let _ = handle.cancel.send(true);
            }
        }
    }
}

async fn periodic_loop<J: SyncJob, N: NetworkCondition>(
    core: Arc<Core<J, N>>,
    name: String,
    request: PeriodicRequest,
    mut cancel: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(request.interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = cancel.changed() => break,
        }
        if *cancel.borrow() {
            break;
        }

        let mut attempt = 1;
        loop {
            let delay = match core.attempt(Trigger::Periodic, attempt).await {
                TriggerOutcome::Deferred => {
                    debug!(name = %name, "Rechecking network shortly");
                    NETWORK_RECHECK
                }
                TriggerOutcome::Completed(JobOutcome::Retry(reason)) => {
                    if !request.backoff.allows(attempt) {
                        break;
                    }
                    let delay = request.backoff.delay_for(attempt);
                    warn!(name = %name, attempt, delay_secs = delay.as_secs(), reason = %reason, "Periodic sync failed, backing off");
                    attempt += 1;
                    delay
                }
                TriggerOutcome::Completed(JobOutcome::Success(_)) | TriggerOutcome::AlreadyRunning => {
                    break;
                }
            };

            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                _ = cancel.changed() => return,
            }
        }
    }

    debug!(name = %name, "Periodic loop stopped");
}
