//! Logging setup
//!
//! `VERBA_LOG_FORMAT=json|pretty` picks the console format (default pretty).
//! `RUST_LOG` overrides the default `verba=info` filter. With `VERBA_LOG_DIR`
//! set, JSON lines also go to a daily rolling file there.

use crate::telemetry;
use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_FILTER: &str = "verba=info";
const LOG_FILE_PREFIX: &str = "verba.log";

/// Keeps the file writer flushing; drop it last
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

pub fn init() -> Result<LogGuard> {
    let log_format = std::env::var("VERBA_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))
        .context("Failed to create env filter")?;

    let mut layers: Vec<telemetry::BoxedLayer> = Vec::new();
    match log_format.as_str() {
        // Production: JSON structured logging
        "json" => layers.push(fmt::layer().json().boxed()),
        // Development: Pretty formatting with colors
        _ => layers.push(fmt::layer().pretty().boxed()),
    }

    let mut file_guard = None;
    if let Ok(dir) = std::env::var("VERBA_LOG_DIR") {
        let appender = tracing_appender::rolling::daily(&dir, LOG_FILE_PREFIX);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        layers.push(fmt::layer().json().with_ansi(false).with_writer(writer).boxed());
        file_guard = Some(guard);
    }

    if let Some(layer) = telemetry::layer()? {
        layers.push(layer);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(LogGuard { _file: file_guard })
}
