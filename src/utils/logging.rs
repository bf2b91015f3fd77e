use std::{path::Path, sync::LazyLock};

use anyhow::Result;
use tracing::level_filters::LevelFilter;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::{
    fmt::{format::FmtSpan, writer::MakeWriterExt},
    EnvFilter,
};

pub const CLI_PREFIX: &str = "cli";
pub const DAEMON_PREFIX: &str = "daemon";

const LOGS_DIR: &str = "logs";
const KEPT_LOG_FILES: usize = 5;

/// Logs into daily files under `<application dir>/logs`, mirrored into stdout when `show_std` is
/// set. Without an explicit `log_level` the level comes from `RUST_LOG`, then defaults to info.
pub fn enable_logging(
    prefix: &str,
    application_data_path: &Path,
    log_level: Option<LevelFilter>,
    show_std: bool,
) -> Result<()> {
    let appender = tracing_appender::rolling::Builder::new()
        .rotation(Rotation::DAILY)
        .max_log_files(KEPT_LOG_FILES)
        .filename_prefix(prefix)
        .build(application_data_path.join(LOGS_DIR))?;

    let stdout = std::io::stdout.with_filter(move |_| show_std);

    tracing_subscriber::fmt()
        .with_env_filter(crate_filter(log_level))
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(false)
        .with_writer(stdout.and(appender))
        .try_init()
        .map_err(anyhow::Error::msg)
}

fn crate_filter(log_level: Option<LevelFilter>) -> EnvFilter {
    let level = log_level
        .map(|v| v.to_string())
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| "info".into());
    EnvFilter::new(format!("{}={level}", env!("CARGO_PKG_NAME").replace('-', "_")))
}

pub static TEST_LOGGING: LazyLock<()> = LazyLock::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_max_level(LevelFilter::TRACE)
        .with_test_writer()
        .pretty()
        .try_init();
});
