//! Diagnostic logging for the `logstat` binary.
//!
//! stdout belongs to the `console` output sink, which prints one metric
//! per line every period. All tracing output (startup banner, skipped
//! lines, sink failures) is therefore written to stderr, so metric lines
//! can be piped without filtering.
//!
//! The subscriber is configured from `[general] log_level` / `log_format`
//! after CLI and `LOGSTAT_*` overrides have been applied.

use anyhow::Result;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use logstat_core::config::GeneralConfig;

/// Install the global stderr tracing subscriber for the daemon.
///
/// Called once from `main`, after the config is loaded and before the
/// pipeline is built. `RUST_LOG` takes precedence over `config.log_level`.
/// `log_format = "json"` emits JSON lines for log shippers; `"pretty"`
/// (the default) is meant for a terminal.
pub fn init_tracing(config: &GeneralConfig) -> Result<()> {
    let fmt_layer: Box<dyn Layer<Registry> + Send + Sync> = match config.log_format.as_str() {
        "json" => fmt::layer().json().with_writer(std::io::stderr).boxed(),
        "pretty" => fmt::layer().pretty().with_writer(std::io::stderr).boxed(),
        other => {
            return Err(anyhow::anyhow!(
                "unknown log format '{other}', expected 'json' or 'pretty'"
            ));
        }
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .try_init()
        .map_err(|e| {
            anyhow::anyhow!(
                "failed to initialize {} tracing subscriber: {}",
                config.log_format,
                e
            )
        })
}
