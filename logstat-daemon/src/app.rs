//! Daemon application: config resolution and pipeline lifecycle.
//!
//! # Lifecycle
//!
//! 1. [`load_config`] reads the file, applies `LOGSTAT_*` env overrides,
//!    then CLI overrides, and validates the result.
//! 2. [`App::build`] compiles the stats pipeline (regexes, DSN, outputs).
//! 3. [`App::run`] starts the pipeline and blocks until a shutdown signal
//!    or a fatal scheduler error; [`App::run_once`] runs a single period.

use std::path::Path;

use anyhow::Result;

use logstat_core::config::LogstatConfig;
use logstat_core::pipeline::Pipeline;
use logstat_log_pipeline::{DispatchReport, StatsPipeline, StatsPipelineBuilder, TickReport};

use crate::cli::DaemonCli;

/// Load, override and validate the configuration.
///
/// Precedence: CLI flags > environment variables > config file > defaults.
///
/// # Errors
///
/// Returns an error if the file is missing, cannot be parsed, or fails
/// validation after overrides are applied.
pub async fn load_config(path: &Path, cli: &DaemonCli) -> Result<LogstatConfig> {
    let mut config = LogstatConfig::from_file(path)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load config {}: {}", path.display(), e))?;
    config.apply_env_overrides();
    apply_cli_overrides(&mut config, cli);
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid config {}: {}", path.display(), e))?;
    Ok(config)
}

/// Apply CLI flag overrides on top of the loaded configuration.
pub fn apply_cli_overrides(config: &mut LogstatConfig, cli: &DaemonCli) {
    if let Some(level) = &cli.log_level {
        config.general.log_level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.general.log_format = format.clone();
    }
}

/// The running daemon: one stats pipeline built from the configuration.
pub struct App {
    pipeline: StatsPipeline,
}

impl App {
    /// Build the stats pipeline from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a regex does not compile, the input DSN is
    /// malformed, or an output type is unknown or fails to initialize.
    pub fn build(config: LogstatConfig) -> Result<Self> {
        let pipeline = StatsPipelineBuilder::new()
            .config(config)
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build stats pipeline: {}", e))?;
        tracing::debug!(pipeline = ?pipeline, "stats pipeline built");
        Ok(Self { pipeline })
    }

    /// Access the underlying pipeline.
    pub fn pipeline(&self) -> &StatsPipeline {
        &self.pipeline
    }

    /// Run a single period, wait for its metrics to be sent, and return.
    pub async fn run_once(&mut self) -> Result<(TickReport, DispatchReport)> {
        self.pipeline
            .run_once()
            .await
            .map_err(|e| anyhow::anyhow!("single tick failed: {}", e))
    }

    /// Start the pipeline and block until shutdown.
    ///
    /// # Shutdown Triggers
    ///
    /// - `SIGTERM` / `SIGINT` (Ctrl+C): clean stop, returns `Ok`
    /// - fatal scheduler error (e.g. `numeric_parse_policy = "fatal"`):
    ///   the pipeline is stopped and the error is returned
    pub async fn run(&mut self) -> Result<()> {
        self.pipeline
            .start()
            .await
            .map_err(|e| anyhow::anyhow!("failed to start stats pipeline: {}", e))?;

        tracing::info!("entering main loop");
        let outcome = tokio::select! {
            signal = wait_for_shutdown_signal() => signal.map(|name| {
                tracing::info!(signal = name, "shutdown signal received");
            }),
            result = self.pipeline.wait() => {
                result.map_err(|e| anyhow::anyhow!("scheduler stopped: {}", e))
            }
        };

        if let Err(e) = self.pipeline.stop().await {
            tracing::error!(error = %e, "failed to stop stats pipeline");
        }
        outcome
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
///
/// # Errors
///
/// Returns an error if signal handlers cannot be installed.
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}
