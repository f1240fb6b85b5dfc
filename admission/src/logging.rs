//! Process-wide `tracing` setup for the binary.

use crate::config::{LogFormat, LoggingConfig};
use crate::error::{Error, Result};

use std::fs::OpenOptions;
use std::io;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Keeps the non-blocking log writer alive. Buffered records are flushed
/// when it is dropped.
#[must_use = "dropping the guard stops log output"]
pub struct LoggingGuard {
  _guard: WorkerGuard,
}

/// Installs the global subscriber. `RUST_LOG` overrides `config.level`.
pub fn init(config: &LoggingConfig) -> Result<LoggingGuard> {
  let (writer, guard) = match &config.file {
    Some(path) => {
      if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
          std::fs::create_dir_all(parent)
            .map_err(|e| Error::LoggingInit(format!("Failed to create directory {:?}: {}", parent, e)))?;
        }
      }
      let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| Error::LoggingInit(format!("Failed to open file {:?}: {}", path, e)))?;
      tracing_appender::non_blocking(file)
    }
    None => tracing_appender::non_blocking(io::stdout()),
  };

  let filter = EnvFilter::try_from_default_env()
    .or_else(|_| EnvFilter::try_new(&config.level))
    .map_err(|e| Error::LoggingInit(format!("Invalid log level '{}': {}", config.level, e)))?;

  let layer = match config.format {
    LogFormat::Pattern => fmt::layer()
      .with_writer(writer)
      .with_thread_names(true)
      .with_ansi(config.file.is_none())
      .boxed(),
    LogFormat::Json => fmt::layer().json().with_writer(writer).boxed(),
  };

  tracing_log::LogTracer::init().map_err(|e| Error::LoggingInit(e.to_string()))?;
  let subscriber = tracing_subscriber::registry().with(layer.with_filter(filter));
  tracing::subscriber::set_global_default(subscriber)
    .map_err(|e| Error::LoggingInit(e.to_string()))?;

  Ok(LoggingGuard { _guard: guard })
}
