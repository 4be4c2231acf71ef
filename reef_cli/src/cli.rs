//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "reefdose", version, about = "Reef dosing controller")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/reefdose.toml")]
    pub config: PathBuf,

    /// Path to the persistent state file
    #[arg(long, value_name = "FILE", default_value = "reefdose_state.toml")]
    pub state: PathBuf,

    /// Optional per-pump flow calibration CSV (strict header)
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
    /// Run the dosing controller; reads JSON command lines on stdin
    Run {
        /// Scheduler tick interval in ms
        #[arg(long, value_name = "MS", default_value_t = 1000)]
        tick_ms: u64,
    },
    /// One-shot plan adjustment from two water tests (nothing is actuated)
    Plan {
        /// Previous test as ca,alk,mg,ph
        #[arg(long, value_name = "CA,ALK,MG,PH")]
        prev: String,
        /// Current test as ca,alk,mg,ph
        #[arg(long, value_name = "CA,ALK,MG,PH")]
        cur: String,
        /// Days between the two tests
        #[arg(long, value_name = "DAYS", default_value_t = 1.0)]
        gap_days: f32,
        /// Current plan as kalk,afr,mg,aux ml/day (defaults when omitted)
        #[arg(long, value_name = "ML,ML,ML,ML")]
        plan: Option<String>,
    },
    /// Print the slot table for a dosing window
    Schedule {
        /// Window start hour (0-23)
        #[arg(long, default_value_t = 9)]
        start_hour: u8,
        /// Window end hour (0-23); equal to start spans a full day
        #[arg(long, default_value_t = 17)]
        end_hour: u8,
        /// Minutes between slots
        #[arg(long, default_value_t = 60)]
        every_minutes: u16,
    },
    /// Quick health check (state file readable, config valid)
    SelfCheck,
}
