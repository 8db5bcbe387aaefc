//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Beacon - operator tool for the client-side telemetry delivery pipeline
#[derive(Parser, Debug)]
#[command(
    name = "beacon",
    author,
    version,
    about = "Client-side telemetry delivery pipeline tool",
    long_about = "Operator tool for the beacon telemetry pipeline.\n\n\
                  Validates pipeline configuration files and drives a live \n\
                  pipeline against a collector endpoint for smoke testing."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "BEACON_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "BEACON_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send test events through a live pipeline
    Run(RunArgs),

    /// Validate a configuration file without running
    Validate(ValidateArgs),

    /// Display resolved configuration
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "beacon.toml", env = "BEACON_CONFIG")]
    pub config: PathBuf,

    /// API token attached to every record
    #[arg(long, env = "BEACON_TOKEN")]
    pub token: String,

    /// Number of test events to send
    #[arg(long, default_value = "10")]
    pub count: u64,

    /// Event name for the test events
    #[arg(long, default_value = "beacon_cli_smoke")]
    pub event: String,

    /// Milliseconds to wait for delivery after the final flush
    #[arg(long, default_value = "2000")]
    pub flush_wait_ms: u64,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "BEACON_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "beacon.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "beacon.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}
