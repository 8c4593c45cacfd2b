//! `tracing` subscriber initialization.
//!
//! Level filter and sink are both driven by [`Config::preset`]: `log_levels`
//! picks the lowest enabled level (tracing filters are threshold-based, not
//! a set, so the minimum of the configured levels is what's installed),
//! and `log_file` switches the writer from stdout to a daily-rolling file
//! via `tracing-appender`.

use crate::{config::Config, errors::ConfigError};
use std::cmp::Reverse;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{filter::LevelFilter, fmt, EnvFilter};

/// Installs the global `tracing` subscriber for the process.
///
/// Returns a [`WorkerGuard`] when logging to a file: it must be held for
/// the process lifetime, since dropping it stops the background flush
/// task and truncates in-flight log lines.
pub fn init_logging(config: &Config) -> Result<Option<WorkerGuard>, ConfigError> {
    let levels = config.resolved_log_levels()?;
    let min_level = levels
        .into_iter()
        .min_by_key(|level| Reverse(level.clone()))
        .unwrap_or(tracing::Level::INFO);

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(min_level).into())
        .from_env_lossy();

    match &config.preset.log_file {
        Some(path) => {
            let directory = std::path::Path::new(path).parent().unwrap_or_else(|| std::path::Path::new("."));
            let file_name = std::path::Path::new(path)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "lanehost.log".into());

            let file_appender = tracing_appender::rolling::never(directory, file_name);
            let (writer, guard) = tracing_appender::non_blocking(file_appender);

            fmt().with_env_filter(filter).with_writer(writer).with_ansi(false).init();

            Ok(Some(guard))
        }
        None => {
            fmt().with_env_filter(filter).init();
            Ok(None)
        }
    }
}
