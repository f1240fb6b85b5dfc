use crate::config::raw::{ConfigRaw, LoggingConfigRaw};
use crate::error::{Error, Result};
use crate::features::DEFAULT_HIST_FEATURES;
use crate::learner::Hyperparameters;
use crate::orchestrator::RefitStrategy;

use std::path::PathBuf;

/// Validated run configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
  pub cache_size: u64,
  pub window_size: u64,
  /// Decision threshold for scoring predictions. Not used for labeling.
  pub cutoff: f64,
  pub hist_features: usize,
  pub refit_strategy: RefitStrategy,
  pub refit_iterations: usize,
  /// Windows queued for the trainer thread; 0 runs every stage inline.
  pub pipeline_depth: usize,
  pub hyperparameters: Hyperparameters,
  pub logging: LoggingConfig,
}

impl SimulationConfig {
  /// A configuration with default settings for everything but the three run
  /// parameters.
  pub fn new(cache_size: u64, window_size: u64, cutoff: f64) -> Result<Self> {
    let raw = ConfigRaw {
      cache_size: Some(cache_size),
      window_size: Some(window_size),
      cutoff: Some(cutoff),
      ..ConfigRaw::default()
    };
    process_raw_config(raw)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
  Pattern,
  Json,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
  pub level: String,
  pub format: LogFormat,
  pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
  fn default() -> Self {
    Self {
      level: "info".to_string(),
      format: LogFormat::Pattern,
      file: None,
    }
  }
}

pub fn process_raw_config(raw: ConfigRaw) -> Result<SimulationConfig> {
  let cache_size = raw
    .cache_size
    .ok_or_else(|| Error::invalid_config("cache_size", "is required"))?;
  let window_size = raw
    .window_size
    .ok_or_else(|| Error::invalid_config("window_size", "is required"))?;
  if window_size == 0 {
    return Err(Error::invalid_config("window_size", "must be positive"));
  }
  let cutoff = raw
    .cutoff
    .ok_or_else(|| Error::invalid_config("cutoff", "is required"))?;
  if !(0.0..=1.0).contains(&cutoff) {
    return Err(Error::invalid_config(
      "cutoff",
      format!("{} is outside [0, 1]", cutoff),
    ));
  }
  if raw.hist_features == 0 {
    return Err(Error::invalid_config("hist_features", "must be positive"));
  }
  if raw.hist_features != DEFAULT_HIST_FEATURES {
    tracing::debug!(hist_features = raw.hist_features, "Using non-default history length");
  }

  let refit_strategy = match raw.refit.strategy.as_deref().map(str::to_lowercase).as_deref() {
    None | Some("refit") => RefitStrategy::Refit,
    Some("retrain") => RefitStrategy::Retrain,
    Some(other) => {
      return Err(Error::invalid_config(
        "refit.strategy",
        format!("unknown strategy '{}', expected 'refit' or 'retrain'", other),
      ))
    }
  };

  let mut hyperparameters = Hyperparameters::default();
  for (key, value) in raw.hyperparameters {
    let value = match value {
      serde_yaml::Value::String(s) => s,
      serde_yaml::Value::Number(n) => n.to_string(),
      serde_yaml::Value::Bool(b) => b.to_string(),
      _ => {
        return Err(Error::invalid_config(
          &format!("hyperparameters.{}", key),
          "must be a string, number or boolean",
        ))
      }
    };
    hyperparameters.set(key, value);
  }

  Ok(SimulationConfig {
    cache_size,
    window_size,
    cutoff,
    hist_features: raw.hist_features,
    refit_strategy,
    refit_iterations: raw.refit.iterations,
    pipeline_depth: raw.pipeline_depth,
    hyperparameters,
    logging: process_logging(raw.logging)?,
  })
}

fn process_logging(raw: LoggingConfigRaw) -> Result<LoggingConfig> {
  let format = match raw.format.to_lowercase().as_str() {
    "pattern" | "text" => LogFormat::Pattern,
    "json" => LogFormat::Json,
    other => {
      return Err(Error::invalid_config(
        "logging.format",
        format!("unknown format '{}', expected 'pattern' or 'json'", other),
      ))
    }
  };
  let file = match raw.file {
    Some(path) if path.is_empty() => {
      return Err(Error::invalid_config("logging.file", "path cannot be empty"))
    }
    Some(path) => Some(PathBuf::from(path)),
    None => None,
  };
  Ok(LoggingConfig {
    level: raw.level,
    format,
    file,
  })
}
