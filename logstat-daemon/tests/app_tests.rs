//! Daemon integration tests.
//!
//! Tests the full flow: config file -> overrides -> validation -> pipeline build -> single tick.

use std::io::Write;
use std::path::Path;

use clap::Parser;
use serial_test::serial;
use tempfile::NamedTempFile;

use logstat_core::pipeline::Pipeline;
use logstat_daemon::app::{App, load_config};
use logstat_daemon::cli::DaemonCli;

/// Helper: write `content` into a temp file with the given suffix.
fn write_config(content: &str, suffix: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("failed to create temp config");
    file.write_all(content.as_bytes())
        .expect("failed to write temp config");
    file
}

/// Helper: a minimal valid TOML config reading from `input`.
fn stats_config(input: &str) -> String {
    format!(
        r#"
input = "{input}"
regexp = 'status=(?P<status>\d+) time=(?P<time>[\d.]+)'
period = "500ms"
counts = ["status"]
aggregates = ["time"]

[general]
log_level = "info"

[tail]
from_start = true
poll_interval_ms = 20

[[filters]]
filter = "*"

[[filters.items]]
field = "status"
metrics = ["cps_200", "uniq"]

[[filters.items]]
field = "time"
metrics = ["max"]

[[output]]
type = "console"
"#
    )
}

fn cli(args: &[&str]) -> DaemonCli {
    DaemonCli::parse_from(std::iter::once("logstat").chain(args.iter().copied()))
}

#[tokio::test]
async fn test_missing_config_file_is_an_error() {
    // Given: A path that does not exist
    let path = Path::new("/nonexistent/logstat.toml");

    // When: Loading config
    let result = load_config(path, &cli(&[])).await;

    // Then: Should fail with the path in the message
    let err = result.expect_err("missing file should fail");
    assert!(err.to_string().contains("failed to load config"));
    assert!(err.to_string().contains("/nonexistent/logstat.toml"));
}

#[tokio::test]
#[serial]
async fn test_valid_config_loads() {
    // Given: A valid config file
    let file = write_config(&stats_config("stdin:"), ".toml");

    // When: Loading config
    let config = load_config(file.path(), &cli(&[]))
        .await
        .expect("config should load");

    // Then: Sections should be populated
    assert_eq!(config.input, "stdin:");
    assert_eq!(config.filters.len(), 1);
    assert_eq!(config.outputs.len(), 1);
    assert!(config.tail.from_start);
}

#[tokio::test]
#[serial]
async fn test_cli_overrides_win_over_env() {
    // Given: Env and CLI both override log level
    let file = write_config(&stats_config("stdin:"), ".toml");
    // SAFETY: serialized test, no other thread reads the environment
    unsafe {
        std::env::set_var("LOGSTAT_GENERAL_LOG_LEVEL", "warn");
        std::env::set_var("LOGSTAT_GENERAL_LOG_FORMAT", "json");
    }

    // When: Loading config with --log-level
    let result = load_config(file.path(), &cli(&["--log-level", "debug"])).await;

    // SAFETY: see above
    unsafe {
        std::env::remove_var("LOGSTAT_GENERAL_LOG_LEVEL");
        std::env::remove_var("LOGSTAT_GENERAL_LOG_FORMAT");
    }

    // Then: CLI level wins, env format applies
    let config = result.expect("config should load");
    assert_eq!(config.general.log_level, "debug");
    assert_eq!(config.general.log_format, "json");
}

#[tokio::test]
#[serial]
async fn test_invalid_cli_override_fails_validation() {
    // Given: A valid file but an unknown log level on the CLI
    let file = write_config(&stats_config("stdin:"), ".toml");

    // When: Loading config
    let result = load_config(file.path(), &cli(&["--log-level", "loud"])).await;

    // Then: Validation should reject it
    let err = result.expect_err("unknown level should fail");
    assert!(err.to_string().contains("invalid config"));
}

#[tokio::test]
#[serial]
async fn test_config_without_filters_is_rejected() {
    // Given: A config with no filters
    let content = r#"
input = "stdin:"
regexp = '(?P<status>\d+)'
period = "1s"
counts = ["status"]

[[output]]
type = "console"
"#;
    let file = write_config(content, ".toml");

    // When: Loading config
    let result = load_config(file.path(), &cli(&[])).await;

    // Then: Should fail
    assert!(result.is_err(), "config without filters must not load");
}

#[tokio::test]
#[serial]
async fn test_json_config_is_detected_by_extension() {
    // Given: The same config as JSON
    let content = r#"{
  "input": "stdin:",
  "regexp": "status=(?P<status>\\d+)",
  "period": "1s",
  "counts": ["status"],
  "filters": [{"filter": "*", "items": [{"field": "status", "metrics": ["cps_200"]}]}],
  "output": [{"type": "console"}]
}"#;
    let file = write_config(content, ".json");

    // When: Loading config
    let config = load_config(file.path(), &cli(&[]))
        .await
        .expect("json config should load");

    // Then: Parsed from JSON
    assert_eq!(config.counts, vec!["status".to_owned()]);
    assert_eq!(config.filters[0].items[0].metrics, vec!["cps_200".to_owned()]);
}

#[tokio::test]
#[serial]
async fn test_unknown_output_type_fails_build() {
    // Given: A config naming an output type nobody registered
    let content = stats_config("stdin:").replace("type = \"console\"", "type = \"carbon\"");
    let file = write_config(&content, ".toml");
    let config = load_config(file.path(), &cli(&[]))
        .await
        .expect("config should load");

    // When: Building the app
    let result = App::build(config);

    // Then: Build should fail
    let err = result.err().expect("unknown output should fail");
    assert!(err.to_string().contains("failed to build stats pipeline"));
}

#[tokio::test]
#[serial]
async fn test_malformed_syslog_dsn_fails_build() {
    // Given: A syslog DSN without an application part
    let file = write_config(&stats_config("syslog:udp:127.0.0.1:0"), ".toml");
    let config = load_config(file.path(), &cli(&[]))
        .await
        .expect("scheme is known, shape is checked at build");

    // When: Building the app
    let result = App::build(config);

    // Then: Build should fail
    assert!(result.is_err());
}

#[tokio::test]
#[serial]
async fn test_run_once_processes_one_period() {
    // Given: A log file with three records and a config tailing it from start
    let mut log = NamedTempFile::new().expect("failed to create log file");
    writeln!(log, "status=200 time=0.5").expect("write");
    writeln!(log, "status=200 time=1.5").expect("write");
    writeln!(log, "status=404 time=0.1").expect("write");
    writeln!(log, "garbage line").expect("write");
    log.flush().expect("flush");

    let input = format!("file:{}", log.path().display());
    let file = write_config(&stats_config(&input), ".toml");
    let config = load_config(file.path(), &cli(&["--one"]))
        .await
        .expect("config should load");
    let mut app = App::build(config).expect("app should build");

    // When: Running a single tick
    let (tick, dispatched) = app.run_once().await.expect("single tick should succeed");

    // Then: Every line was seen once and metrics were sent
    assert_eq!(tick.records, 3);
    assert_eq!(tick.skipped, 1);
    assert_eq!(dispatched.aggregators, 1);
    assert_eq!(dispatched.metrics, 3);
    assert_eq!(dispatched.failed_sends, 0);

    // And: The pipeline cannot be started again
    assert!(app.pipeline().health_check().await.is_unhealthy());
}
