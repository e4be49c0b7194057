//! Remote read-endpoint commands.

use serde::Serialize;

use super::runtime;
use crate::api::ServerApiClient;
use crate::cli::RemoteCommands;
use crate::config::SyncSettings;
use crate::error::Result;

/// Execute remote commands.
pub fn execute(command: &RemoteCommands, json: bool) -> Result<()> {
    let settings = SyncSettings::resolve()?;
    let client = ServerApiClient::new(
        settings.require_server_url()?,
        settings.require_api_key()?,
        &settings.timeouts,
    )?;
    let rt = runtime()?;

    match command {
        RemoteCommands::Bp { days } => {
            let readings = rt.block_on(client.blood_pressure(*days))?;
            render(&readings, json, |r| {
                let pulse = r.pulse.map(|p| format!("  pulse {p}")).unwrap_or_default();
                format!("{}  {}/{} mmHg{pulse}", r.measured_at, r.systolic, r.diastolic)
            })
        }
        RemoteCommands::Sleep { days } => {
            let sessions = rt.block_on(client.sleep(*days))?;
            render(&sessions, json, |s| {
                format!(
                    "{}  {}h {:02}m  deep {}  rem {}  light {}",
                    s.sleep_start,
                    s.duration_minutes / 60,
                    s.duration_minutes % 60,
                    minutes(s.deep_sleep_minutes),
                    minutes(s.rem_sleep_minutes),
                    minutes(s.light_sleep_minutes),
                )
            })
        }
        RemoteCommands::Body { days } => {
            let measurements = rt.block_on(client.body_measurements(*days))?;
            render(&measurements, json, |m| {
                let fat = m
                    .body_fat_percent
                    .map(|f| format!("  fat {f:.1}%"))
                    .unwrap_or_default();
                match m.weight_kg {
                    Some(kg) => format!("{}  {kg:.1} kg{fat}", m.measured_at),
                    None => format!("{}  -{fat}", m.measured_at),
                }
            })
        }
        RemoteCommands::Workouts { limit, offset } => {
            let workouts = rt.block_on(client.workouts(*limit, *offset))?;
            render(&workouts, json, |w| {
                let duration = w
                    .duration_minutes
                    .map(|d| format!("  {d} min"))
                    .unwrap_or_default();
                format!("{}  {}{duration}", w.started_at, w.title)
            })
        }
        RemoteCommands::WorkoutStats { days } => {
            let stats = rt.block_on(client.workout_stats_summary(*days))?;
            if json {
                println!("{}", serde_json::to_string(&stats)?);
            } else {
                println!("Workouts:        {}", stats.total_workouts);
                if let Some(avg) = stats.avg_duration {
                    println!("Avg duration:    {avg} min");
                }
                if let Some(volume) = stats.total_volume_kg {
                    println!("Total volume:    {volume:.0} kg");
                }
                if let Some(sets) = stats.avg_sets_per_workout {
                    println!("Avg sets:        {sets}");
                }
            }
            Ok(())
        }
    }
}

fn minutes(value: Option<i32>) -> String {
    value.map_or_else(|| "-".to_string(), |m| format!("{m}m"))
}

fn render<T: Serialize>(items: &[T], json: bool, line: impl Fn(&T) -> String) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(items)?);
        return Ok(());
    }
    if items.is_empty() {
        println!("No records.");
    }
    for item in items {
        println!("{}", line(item));
    }
    Ok(())
}

