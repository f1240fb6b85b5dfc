use crate::learner::LearnerStage;

use thiserror::Error;

/// The main error type for `fibre_admission`.
#[derive(Debug, Error)]
pub enum Error {
  #[error("Configuration file not found: {0}")]
  ConfigNotFound(String),

  #[error("Failed to read configuration file: {0}")]
  ConfigRead(#[source] std::io::Error),

  #[error("Failed to parse configuration: {0}")]
  ConfigParse(String),

  #[error("Invalid configuration value for '{field}': {message}")]
  InvalidConfigValue { field: String, message: String },

  #[error("Failed to open trace '{path}': {source}")]
  TraceIo {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error("Failed to assemble feature matrix: {0}")]
  FeatureMatrix(#[source] fibre_gbdt::Error),

  /// The learner failed; the run cannot continue without a model.
  #[error("Learner failed during {stage}: {source}")]
  Learner {
    stage: LearnerStage,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },

  #[error("Failed to write report: {0}")]
  Report(#[from] std::io::Error),

  #[error("Window pipeline failed: {0}")]
  Pipeline(String),

  #[error("Failed to initialize logging: {0}")]
  LoggingInit(String),
}

impl Error {
  pub(crate) fn invalid_config(field: &str, message: impl Into<String>) -> Self {
    Error::InvalidConfigValue {
      field: field.to_string(),
      message: message.into(),
    }
  }
}

/// A specialized `Result` type for `fibre_admission` operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;
