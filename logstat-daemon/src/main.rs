use std::process::ExitCode;

use clap::Parser;

use logstat_daemon::app::{self, App};
use logstat_daemon::cli::DaemonCli;
use logstat_daemon::logging::init_tracing;

/// Exit code for a missing or unusable command line.
const EXIT_USAGE: u8 = 2;

/// Exit code for an invalid configuration.
const EXIT_CONFIG: u8 = 1;

fn fail(reason: impl std::fmt::Display, code: u8) -> ExitCode {
    eprintln!("{}", DaemonCli::fatal_report(reason));
    ExitCode::from(code)
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = DaemonCli::parse();

    let Some(config_path) = cli.config.clone() else {
        return Ok(fail("config not set", EXIT_USAGE));
    };

    let config = match app::load_config(&config_path, &cli).await {
        Ok(config) => config,
        Err(e) => return Ok(fail(format!("{e:#}"), EXIT_CONFIG)),
    };
    init_tracing(&config.general)?;
    logstat_core::metrics::describe_all();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path.display(),
        "logstat starting"
    );

    let mut app = match App::build(config) {
        Ok(app) => app,
        Err(e) => {
            tracing::error!(error = %e, "startup failed");
            return Ok(fail(format!("{e:#}"), EXIT_CONFIG));
        }
    };

    if cli.validate {
        tracing::info!("configuration is valid");
        return Ok(ExitCode::SUCCESS);
    }

    if cli.one {
        app.run_once().await?;
    } else {
        app.run().await?;
    }

    tracing::info!("logstat shut down");
    Ok(ExitCode::SUCCESS)
}
