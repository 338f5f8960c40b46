//! Tracing setup: stderr plus a plain `app.log` in the log directory.

use std::fs;
use std::path::Path;

use anyhow::Context;
use time::macros::format_description;
use time::UtcOffset;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::time::OffsetTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

pub const LOG_ENV: &str = "NOWCAST_LOG";
pub const LOG_FILE: &str = "app.log";

fn file_appender(log_dir: &Path) -> anyhow::Result<RollingFileAppender> {
    fs::create_dir_all(log_dir).with_context(|| format!("creating log directory {}", log_dir.display()))?;

    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(LOG_FILE)
        .build(log_dir)
        .with_context(|| format!("opening {} in {}", LOG_FILE, log_dir.display()))
}

/// Install the global subscriber. Keep the guard alive until exit or the file
/// writer stops flushing.
///
/// Must run before any other thread is spawned: the local offset lookup refuses
/// to work in a multi-threaded process on Unix and we would fall back to UTC.
pub fn init(log_dir: &Path) -> anyhow::Result<WorkerGuard> {
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    let timer = OffsetTime::new(
        offset,
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]"),
    );

    let (file_writer, guard) = tracing_appender::non_blocking(file_appender(log_dir)?);

    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_timer(timer.clone()).with_writer(std::io::stderr))
        .with(fmt::layer().with_timer(timer).with_ansi(false).with_writer(file_writer))
        .try_init()
        .context("installing tracing subscriber")?;

    tracing::info!("[Main] Logging to {}", log_dir.join(LOG_FILE).display());
    Ok(guard)
}
