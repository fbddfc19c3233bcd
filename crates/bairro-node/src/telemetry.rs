//! Logging initialization.
//!
//! Structured logging through tracing, pretty or JSON, on stderr so that
//! command output on stdout stays clean.

use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Keeps the file writer flushing until the process exits
static LOG_GUARD: Mutex<Option<tracing_appender::non_blocking::WorkerGuard>> = Mutex::new(None);

/// Initialize logging to stderr.
pub fn init_telemetry(log_level: &str, json_format: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(log_level)?;

    if json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .try_init()?;
    }

    Ok(())
}

/// Initialize logging to an append-only file.
pub fn init_telemetry_with_file(
    log_level: &str,
    json_format: bool,
    log_file: &Path,
) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(log_level)?;

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .map_err(|e| anyhow::anyhow!("Failed to open log file '{}': {}", log_file.display(), e))?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    if json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(non_blocking))
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_ansi(false).with_writer(non_blocking))
            .try_init()?;
    }

    if let Ok(mut g) = LOG_GUARD.lock() {
        *g = Some(guard);
    }

    Ok(())
}
