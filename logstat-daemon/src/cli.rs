//! CLI argument definitions for the `logstat` binary.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// Periodic log statistics collector.
///
/// Reads log lines from a file, stdin or a syslog listener, aggregates
/// them per filter over a fixed period and sends the metrics to the
/// configured outputs.
#[derive(Parser, Debug)]
#[command(name = "logstat")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to the configuration file (.toml, .json, .yaml).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Run exactly one period, send its metrics and exit.
    #[arg(long)]
    pub one: bool,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration file and exit without starting the pipeline.
    #[arg(long)]
    pub validate: bool,
}

impl DaemonCli {
    /// Usage summary printed when the daemon cannot start.
    pub fn usage() -> String {
        use clap::CommandFactory;
        Self::command().render_help().to_string()
    }

    /// Fatal startup report: `ERROR <reason>` followed by the usage summary.
    pub fn fatal_report(reason: impl std::fmt::Display) -> String {
        format!("ERROR {reason}\n{}", Self::usage())
    }
}
