//! CLI definitions using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

/// HealthSync CLI - Sync biometric records to your aggregation server
#[derive(Parser, Debug)]
#[command(name = "hsync", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database path (default: ~/.healthsync/data/healthsync.db)
    #[arg(long, global = true, env = "HSYNC_DB")]
    pub db: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run or inspect syncs
    Sync {
        #[command(subcommand)]
        command: SyncCommands,
    },

    /// Sync periodically until interrupted
    Daemon {
        /// Provider export directory (overrides provider_dir)
        #[arg(long)]
        source: Option<PathBuf>,

        /// Minutes between runs (overrides sync_interval_minutes)
        #[arg(long)]
        interval_minutes: Option<u32>,
    },

    /// Read the cached latest values
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },

    /// Show or change settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Show granted vs required provider permissions
    Permissions {
        /// Provider export directory (overrides provider_dir)
        #[arg(long)]
        source: Option<PathBuf>,
    },

    /// Query the server's read endpoints
    Remote {
        #[command(subcommand)]
        command: RemoteCommands,
    },

    /// Print version information
    Version,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Supported shells for completions.
#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

// ============================================================================
// Sync Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum SyncCommands {
    /// Run one sync now
    Run {
        /// Provider export directory (overrides provider_dir)
        #[arg(long)]
        source: Option<PathBuf>,

        /// Retry failed runs with backoff, at most N times
        #[arg(long)]
        retries: Option<u32>,
    },

    /// Show cached values and recent runs
    Status {
        /// Number of runs to show
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
}

// ============================================================================
// Cache Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Show every cached metric
    Show,

    /// Print one cached metric
    Get {
        /// Metric key (e.g. last_bp_systolic)
        metric: String,
    },
}

// ============================================================================
// Config Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show resolved settings
    Show,

    /// Set a config.json key (empty value clears it)
    Set {
        key: String,
        value: String,
    },

    /// Store the API key in credentials.json
    SetApiKey {
        key: String,
    },
}

// ============================================================================
// Remote Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum RemoteCommands {
    /// Blood-pressure readings
    Bp {
        #[arg(long, default_value_t = crate::api::DEFAULT_DAYS)]
        days: u32,
    },

    /// Sleep sessions
    Sleep {
        #[arg(long, default_value_t = crate::api::DEFAULT_DAYS)]
        days: u32,
    },

    /// Body measurements
    Body {
        #[arg(long, default_value_t = crate::api::DEFAULT_DAYS)]
        days: u32,
    },

    /// Workouts, newest first
    Workouts {
        #[arg(long, default_value_t = crate::api::DEFAULT_WORKOUT_LIMIT)]
        limit: u32,

        #[arg(long, default_value_t = 0)]
        offset: u32,
    },

    /// Workout summary statistics
    WorkoutStats {
        #[arg(long, default_value_t = crate::api::DEFAULT_DAYS)]
        days: u32,
    },
}
