use serde::Deserialize;
use std::collections::HashMap;

/// The YAML file as written. Run parameters are optional here because the
/// command line may supply them.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ConfigRaw {
  #[serde(default)]
  pub cache_size: Option<u64>,
  #[serde(default)]
  pub window_size: Option<u64>,
  #[serde(default)]
  pub cutoff: Option<f64>,
  #[serde(default = "default_hist_features")]
  pub hist_features: usize,
  #[serde(default)]
  pub pipeline_depth: usize,
  #[serde(default)]
  pub refit: RefitConfigRaw,
  /// Learner parameters laid over the defaults. Scalars of any type.
  #[serde(default)]
  pub hyperparameters: HashMap<String, serde_yaml::Value>,
  #[serde(default)]
  pub logging: LoggingConfigRaw,
}

impl Default for ConfigRaw {
  fn default() -> Self {
    Self {
      cache_size: None,
      window_size: None,
      cutoff: None,
      hist_features: default_hist_features(),
      pipeline_depth: 0,
      refit: RefitConfigRaw::default(),
      hyperparameters: HashMap::new(),
      logging: LoggingConfigRaw::default(),
    }
  }
}

fn default_hist_features() -> usize {
  crate::features::DEFAULT_HIST_FEATURES
}

#[derive(Debug, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct RefitConfigRaw {
  /// "refit" or "retrain".
  #[serde(default)]
  pub strategy: Option<String>,
  /// Boosting rounds for the window model the old trees are merged into.
  #[serde(default)]
  pub iterations: usize,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfigRaw {
  /// An `EnvFilter` directive, e.g. "info" or "fibre_admission=debug".
  #[serde(default = "default_level")]
  pub level: String,
  /// "pattern" or "json".
  #[serde(default = "default_format")]
  pub format: String,
  /// Log to this file instead of stdout.
  #[serde(default)]
  pub file: Option<String>,
}

impl Default for LoggingConfigRaw {
  fn default() -> Self {
    Self {
      level: default_level(),
      format: default_format(),
      file: None,
    }
  }
}

fn default_level() -> String {
  "info".to_string()
}

fn default_format() -> String {
  "pattern".to_string()
}
