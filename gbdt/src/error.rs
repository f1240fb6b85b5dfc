use thiserror::Error;

/// Errors raised while building datasets, training, predicting or refitting.
#[derive(Debug, Error)]
pub enum Error {
  #[error("Invalid sparse matrix: {0}")]
  InvalidMatrix(String),

  #[error("Label count {labels} does not match row count {rows}")]
  LabelMismatch { labels: usize, rows: usize },

  #[error("Label {value} at row {row} is not a binary label (expected 0 or 1)")]
  InvalidLabel { row: usize, value: f32 },

  #[error("Invalid value for parameter '{name}': {message}")]
  InvalidParameter { name: String, message: String },

  #[error("Model expects {expected} feature columns, matrix has {found}")]
  FeatureMismatch { expected: usize, found: usize },

  #[error("Leaf assignment shape is invalid: {0}")]
  LeafShape(String),

  #[error("Failed to build worker pool: {0}")]
  ThreadPool(String),
}

/// A specialized `Result` type for `fibre_gbdt` operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;
