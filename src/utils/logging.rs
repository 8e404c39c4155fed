use std::{path::Path, sync::LazyLock};

use anyhow::Result;
use tracing::level_filters::LevelFilter;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{format::FmtSpan, writer::MakeWriterExt},
    EnvFilter,
};

pub const CLI_PREFIX: &str = "cli";
pub const SESSION_PREFIX: &str = "session";

const DEFAULT_LEVEL: &str = "info";
const MAX_LOG_FILES: usize = 5;

/// Only events of this crate are kept. An explicit level wins over `RUST_LOG`.
fn crate_filter(log_level: Option<LevelFilter>) -> Result<EnvFilter> {
    let level = match log_level {
        Some(level) => level.to_string(),
        None => std::env::var(EnvFilter::DEFAULT_ENV).unwrap_or_else(|_| DEFAULT_LEVEL.into()),
    };
    Ok(EnvFilter::try_new(format!("{}={level}", env!("CARGO_CRATE_NAME")))?)
}

/// Daily rotated files named after `prefix` inside `app_dir/logs`.
fn log_files(prefix: &str, app_dir: &Path) -> Result<RollingFileAppender> {
    Ok(RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .max_log_files(MAX_LOG_FILES)
        .filename_prefix(prefix)
        .build(app_dir.join("logs"))?)
}

/// Installs the global subscriber. The session and the one-shot commands log to separate file
/// sets so a long running session doesn't push command logs out of rotation. Stdout only gets a
/// copy when `show_std` is set.
pub fn enable_logging(
    prefix: &str,
    app_dir: &Path,
    log_level: Option<LevelFilter>,
    show_std: bool,
) -> Result<()> {
    let files = log_files(prefix, app_dir)?;
    let stdout = std::io::stdout.with_filter(move |_| show_std);

    tracing_subscriber::fmt()
        .with_env_filter(crate_filter(log_level)?)
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(stdout.and(files))
        .pretty()
        .init();
    Ok(())
}

pub static TEST_LOGGING: LazyLock<()> = LazyLock::new(|| {
    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::TRACE)
        .with_test_writer()
        .pretty()
        .init()
});
