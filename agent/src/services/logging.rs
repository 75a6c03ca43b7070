//! Tracing subscriber setup
//!
//! `RUST_LOG` wins when set. Otherwise the filter comes from `PMM_LOG_LEVEL`,
//! which also accepts the `WARNING` and `CRITICAL` level names alongside the
//! tracing ones.
//!
//! Events go to stdout (pretty or JSON) and, unless disabled, to a plain-text
//! log file through a non-blocking writer.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LogFormat;

type BoxedSubscriber = Box<dyn Subscriber + Send + Sync>;

/// Map a configured level name to an `EnvFilter` directive
pub fn level_directive(level: &str) -> &'static str {
    match level.trim().to_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "warn" | "warning" => "warn",
        "error" | "critical" | "fatal" => "error",
        _ => "info",
    }
}

/// Default filter: the configured level for this crate, quieter HTTP internals
pub fn default_filter(level: &str) -> String {
    let level = level_directive(level);
    format!("curator={level},reqwest=warn,hyper=warn,tokio_cron_scheduler=warn")
}

/// Open the log file for appending, creating it (and its directory) if needed
fn file_appender(path: &Path) -> Result<RollingFileAppender> {
    let directory = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .with_context(|| format!("Log file path {} has no file name", path.display()))?;

    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name.to_string_lossy())
        .build(directory)
        .with_context(|| format!("Failed to open log file {}", path.display()))
}

/// Build the layer stack. The guard flushes the file writer when dropped.
pub fn build_subscriber(
    level: &str,
    format: LogFormat,
    log_file: Option<&Path>,
) -> Result<(BoxedSubscriber, Option<WorkerGuard>)> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(level)));

    let (json, pretty) = match format {
        LogFormat::Json => (Some(fmt::layer().json()), None),
        LogFormat::Pretty => (None, Some(fmt::layer())),
    };

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let (writer, guard) = tracing_appender::non_blocking(file_appender(path)?);
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        None => (None, None),
    };

    let subscriber: BoxedSubscriber = Box::new(
        tracing_subscriber::registry()
            .with(filter)
            .with(json)
            .with(pretty)
            .with(file_layer),
    );
    Ok((subscriber, guard))
}

/// Install the global subscriber. Keep the returned guard alive for the
/// lifetime of the process or buffered file output is lost.
pub fn init_tracing(
    level: &str,
    format: LogFormat,
    log_file: Option<&Path>,
) -> Result<Option<WorkerGuard>> {
    let (subscriber, guard) = build_subscriber(level, format, log_file)?;
    subscriber.init();
    Ok(guard)
}
