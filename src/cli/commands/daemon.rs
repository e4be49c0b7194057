//! Daemon command: periodic sync until Ctrl-C.

use colored::Colorize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use super::{build_scheduler, runtime};
use crate::config::SyncSettings;
use crate::error::{Error, Result};
use crate::scheduler::{JobState, PeriodicRequest, ScheduleOutcome, PERIODIC_JOB_NAME};

/// Execute the daemon command.
pub fn execute(
    source: Option<&Path>,
    interval_minutes: Option<u32>,
    db_path: Option<&PathBuf>,
    json: bool,
) -> Result<()> {
    let mut settings = SyncSettings::resolve()?;
    if let Some(minutes) = interval_minutes {
        if minutes == 0 {
            return Err(Error::InvalidArgument(
                "--interval-minutes must be positive".into(),
            ));
        }
        settings.sync_interval = Duration::from_secs(u64::from(minutes) * 60);
    }

    let scheduler = build_scheduler(&settings, source, db_path)?;
    let rt = runtime()?;

    rt.block_on(async {
        let request = PeriodicRequest::every(settings.sync_interval);
        if scheduler.schedule_periodic(PERIODIC_JOB_NAME, request) == ScheduleOutcome::Enqueued
            && !json
        {
            println!(
                "Syncing every {} min. Press Ctrl-C to stop.",
                settings.sync_interval.as_secs() / 60
            );
        }

        let mut states = scheduler.subscribe();
        loop {
            tokio::select! {
                signal = tokio::signal::ctrl_c() => {
                    if let Err(e) = signal {
                        warn!(error = %e, "Failed to listen for Ctrl-C");
                    }
                    break;
                }
                changed = states.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let state = *states.borrow_and_update();
                    print_state(state, json);
                }
            }
        }

        info!("Shutting down periodic sync");
        scheduler.cancel(PERIODIC_JOB_NAME);
        scheduler.wait_idle().await;
    });

    Ok(())
}

fn print_state(state: JobState, json: bool) {
    let now = chrono::Utc::now();
    if json {
        let (name, attempt) = match state {
            JobState::Idle => ("idle", None),
            JobState::Running => ("running", None),
            JobState::Succeeded => ("succeeded", None),
            JobState::Retrying { attempt } => ("retrying", Some(attempt)),
        };
        let line = serde_json::json!({
            "at": now.to_rfc3339(),
            "state": name,
            "attempt": attempt,
        });
        println!("{line}");
        return;
    }

    let stamp = now.format("%H:%M:%S").to_string();
    match state {
        JobState::Idle => {}
        JobState::Running => println!("{} sync running", stamp.dimmed()),
        JobState::Succeeded => println!("{} {}", stamp.dimmed(), "sync succeeded".green()),
        JobState::Retrying { attempt } => println!(
            "{} {}",
            stamp.dimmed(),
            format!("sync failed (attempt {attempt}), will retry").red()
        ),
    }
}
