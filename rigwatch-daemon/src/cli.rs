//! CLI argument definitions for rigwatch-daemon.

use std::path::PathBuf;

use clap::Parser;

/// rigwatch mining rig monitoring daemon.
///
/// Tails miner, plotter and full-node logs, exposes the derived counters for
/// Prometheus, and reports machine state to the control plane.
#[derive(Parser, Debug)]
#[command(name = "rigwatch-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to rigwatch.toml configuration file.
    #[arg(short, long, default_value = "/etc/rigwatch/rigwatch.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration file and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,
}
