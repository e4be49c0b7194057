//! Sync command implementations.

use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;

use super::{build_scheduler, open_existing_storage, runtime};
use crate::cli::SyncCommands;
use crate::config::SyncSettings;
use crate::error::{Error, Result};
use crate::model::{RunOutcome, SyncRunRecord};
use crate::scheduler::{BackoffPolicy, JobOutcome, TriggerOutcome};
use crate::storage::Snapshot;
use crate::sync::{DispatchStatus, SyncReport};

/// Execute sync commands.
pub fn execute(command: &SyncCommands, db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    match command {
        SyncCommands::Run { source, retries } => {
            run(source.as_deref(), *retries, db_path, json)
        }
        SyncCommands::Status { limit } => status(*limit, db_path, json),
    }
}

fn run(
    source: Option<&std::path::Path>,
    retries: Option<u32>,
    db_path: Option<&PathBuf>,
    json: bool,
) -> Result<()> {
    let settings = SyncSettings::resolve()?;
    let scheduler = build_scheduler(&settings, source, db_path)?;

    let rt = runtime()?;
    let outcome = rt.block_on(async {
        match retries {
            Some(n) => {
                scheduler
                    .run_now_with_backoff(&BackoffPolicy::default().with_max_retries(n))
                    .await
            }
            None => scheduler.run_now().await,
        }
    });

    match outcome {
        TriggerOutcome::Completed(JobOutcome::Success(report)) => {
            print_report(&report, json)?;
            Ok(())
        }
        TriggerOutcome::Completed(JobOutcome::Retry(reason)) => Err(Error::SyncFailed(reason)),
        TriggerOutcome::AlreadyRunning => Err(Error::SyncInProgress),
        TriggerOutcome::Deferred => Err(Error::SyncFailed(format!(
            "network unavailable, could not resolve {}",
            settings.server_url.as_deref().unwrap_or_default()
        ))),
    }
}

/// Print a completed run.
pub(crate) fn print_report(report: &SyncReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(report)?);
        return Ok(());
    }

    println!(
        "{} Sync {} ({})",
        "✓".green(),
        report.run_id.dimmed(),
        report.trigger
    );
    for t in &report.types {
        let read = if t.permitted {
            format!("{} read", t.read)
        } else {
            "not permitted".yellow().to_string()
        };
        println!(
            "  {:<18} {:<14} {}",
            t.record_type.label(),
            read,
            describe_dispatch(&t.dispatch)
        );
    }

    let failures = report.dispatch_failures();
    if failures > 0 {
        println!();
        println!(
            "{}",
            format!("{failures} dispatch(es) failed; cached values may be ahead of the server.")
                .yellow()
        );
    }
    Ok(())
}

fn describe_dispatch(status: &DispatchStatus) -> String {
    match status {
        DispatchStatus::Sent { synced, .. } => format!("{} {synced} synced", "sent".green()),
        DispatchStatus::Skipped => "nothing to send".dimmed().to_string(),
        DispatchStatus::Disabled => "dispatch disabled".dimmed().to_string(),
        DispatchStatus::NotAttempted => "-".dimmed().to_string(),
        DispatchStatus::Failed { error } => format!("{} {error}", "failed".red()),
    }
}

#[derive(Serialize)]
struct StatusOutput<'a> {
    snapshot: &'a Snapshot,
    runs: &'a [SyncRunRecord],
}

fn status(limit: u32, db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let storage = open_existing_storage(db_path)?;
    let snapshot = storage.load_snapshot()?;
    let runs = storage.recent_runs(limit)?;

    if json {
        let output = StatusOutput {
            snapshot: &snapshot,
            runs: &runs,
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    println!("HealthSync Status");
    println!("=================");
    println!();

    match snapshot.last_sync {
        Some(at) => println!("Last sync: {}", at.format("%Y-%m-%d %H:%M:%S UTC")),
        None => println!("Last sync: {}", "never".dimmed()),
    }
    if let (Some(sys), Some(dia)) = (snapshot.bp_systolic, snapshot.bp_diastolic) {
        println!("  Blood pressure: {sys}/{dia} mmHg");
    }
    if let Some(minutes) = snapshot.sleep_duration_min {
        println!("  Sleep:          {}h {:02}m", minutes / 60, minutes % 60);
    }
    if let Some(kg) = snapshot.weight_kg {
        println!("  Weight:         {kg:.1} kg");
    }
    if let Some(ms) = snapshot.hrv_ms {
        println!("  HRV:            {ms:.0} ms");
    }
    println!();

    if runs.is_empty() {
        println!("No runs recorded.");
        println!();
        println!("Start one with: hsync sync run");
        return Ok(());
    }

    println!("Recent runs:");
    for run in &runs {
        let outcome = match run.outcome {
            RunOutcome::Success => run.outcome.as_str().green(),
            RunOutcome::Retry => run.outcome.as_str().red(),
        };
        print!(
            "  {}  {:<8} {:<7}",
            run.started_at.format("%Y-%m-%d %H:%M:%S"),
            run.trigger.as_str(),
            outcome
        );
        match &run.error {
            Some(error) => println!(" {}", error.dimmed()),
            None => println!(),
        }
    }
    Ok(())
}
