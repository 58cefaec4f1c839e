//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "amr", version, about = "Differential-drive base controller")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/amr_config.toml")]
    pub config: PathBuf,

    /// Optional encoder calibration CSV (header: pulses,revolutions)
    #[arg(long, value_name = "FILE")]
    pub calibration: Option<PathBuf>,

    /// Log as JSON lines instead of pretty
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Drive both wheels at a target rate for a fixed time
    Run {
        /// Left wheel target in encoder pulses per second (negative = reverse)
        #[arg(long, value_name = "PPS", allow_hyphen_values = true)]
        left_pps: f64,
        /// Right wheel target; defaults to the left target
        #[arg(long, value_name = "PPS", allow_hyphen_values = true)]
        right_pps: Option<f64>,
        /// How long to drive before the soft stop
        #[arg(long, value_name = "MS", default_value_t = 3000)]
        duration_ms: u64,
        /// Override velocity.ramp_ms from the config
        #[arg(long, value_name = "MS")]
        ramp_ms: Option<u64>,
        /// Starting heading in degrees
        #[arg(long, value_name = "DEG", default_value_t = 0.0, allow_hyphen_values = true)]
        heading_deg: f64,
    },
    /// Spin both wheels briefly and verify the encoders count
    SelfCheck,
    /// Health check for operational monitoring (no motion)
    Health,
}
