//! Logging setup.
//!
//! Logs go to stderr and, when configured, to a file through a non-blocking
//! writer. `RUST_LOG` takes precedence over the configured level.

use std::path::Path;

pub use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingSettings;
use crate::error::{PyramidError, PyramidResult};

/// Filter from `RUST_LOG`, falling back to `default_level`.
pub fn build_filter(default_level: &str) -> PyramidResult<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| {
            PyramidError::Logging(format!("invalid log filter '{}': {}", default_level, e))
        })
}

/// Install the global subscriber.
///
/// Returns the file writer's guard when a log file is configured; keep it
/// alive until exit so buffered lines are flushed.
///
/// # Errors
///
/// Fails if the filter is invalid, the log directory cannot be created, or a
/// global subscriber is already installed.
pub fn init_logging(settings: &LoggingSettings) -> PyramidResult<Option<WorkerGuard>> {
    let filter = build_filter(&settings.level)?;
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_timer(LocalTime::rfc_3339())
        .with_target(false);

    let Some(path) = settings.file.as_deref() else {
        tracing_subscriber::registry()
            .with(filter)
            .with(stderr_layer)
            .try_init()
            .map_err(|e| PyramidError::Logging(e.to_string()))?;
        return Ok(None);
    };

    let (dir, file_name) = split_log_path(path)?;
    std::fs::create_dir_all(dir).map_err(|source| PyramidError::DirectoryFailed {
        path: dir.to_path_buf(),
        source,
    })?;
    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_timer(LocalTime::rfc_3339());

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| PyramidError::Logging(e.to_string()))?;
    Ok(Some(guard))
}

fn split_log_path(path: &Path) -> PyramidResult<(&Path, &std::ffi::OsStr)> {
    let file_name = path.file_name().ok_or_else(|| {
        PyramidError::Logging(format!("log path {} has no file name", path.display()))
    })?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    Ok((dir, file_name))
}
