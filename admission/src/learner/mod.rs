//! The classifier boundary: what the window pipeline needs from a learner.

mod gbdt;

pub use self::gbdt::GbdtLearner;
pub use fibre_gbdt::{CsrMatrix, LeafAssignment};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Opaque learner configuration, passed through as string key/value pairs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hyperparameters(BTreeMap<String, String>);

const DEFAULT_HYPERPARAMETERS: &[(&str, &str)] = &[
  ("boosting", "gbdt"),
  ("objective", "binary"),
  ("metric", "binary_logloss,auc"),
  ("metric_freq", "1"),
  ("is_provide_training_metric", "true"),
  ("max_bin", "255"),
  ("num_iterations", "50"),
  ("learning_rate", "0.1"),
  ("num_leaves", "31"),
  ("tree_learner", "serial"),
  ("num_threads", "0"),
  ("feature_fraction", "0.8"),
  ("bagging_freq", "5"),
  ("bagging_fraction", "0.8"),
  ("min_data_in_leaf", "50"),
  ("min_sum_hessian_in_leaf", "5.0"),
  ("is_enable_sparse", "true"),
  ("two_round", "false"),
  ("save_binary", "false"),
];

impl Default for Hyperparameters {
  fn default() -> Self {
    Self(
      DEFAULT_HYPERPARAMETERS
        .iter()
        .map(|&(k, v)| (k.to_string(), v.to_string()))
        .collect(),
    )
  }
}

impl Hyperparameters {
  pub fn get(&self, key: &str) -> Option<&str> {
    self.0.get(key).map(String::as_str)
  }

  pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
    self.0.insert(key.into(), value.into());
  }

  /// A copy with `key` replaced.
  pub fn with(&self, key: &str, value: impl Into<String>) -> Self {
    let mut next = self.clone();
    next.set(key, value);
    next
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
    self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Hyperparameters {
  fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
    Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
  }
}

/// Which learner call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LearnerStage {
  Fit,
  Predict,
  PredictLeaf,
  Merge,
  Refit,
}

impl fmt::Display for LearnerStage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      LearnerStage::Fit => "fit",
      LearnerStage::Predict => "predict",
      LearnerStage::PredictLeaf => "leaf prediction",
      LearnerStage::Merge => "merge",
      LearnerStage::Refit => "refit",
    };
    f.write_str(name)
  }
}

/// A binary classifier that can be refit window by window.
///
/// Models are moved through `merge` and `refit`, so an implementation may
/// update them in place.
pub trait Learner {
  type Model;
  type Error: std::error::Error + Send + Sync + 'static;

  /// Trains a fresh model.
  fn fit(
    &self,
    matrix: &CsrMatrix,
    labels: &[f32],
    params: &Hyperparameters,
  ) -> Result<Self::Model, Self::Error>;

  /// Positive-class probability per row.
  fn predict(
    &self,
    model: &Self::Model,
    matrix: &CsrMatrix,
    params: &Hyperparameters,
  ) -> Result<Vec<f64>, Self::Error>;

  /// Leaf reached in every tree, per row.
  fn predict_leaf(
    &self,
    model: &Self::Model,
    matrix: &CsrMatrix,
    params: &Hyperparameters,
  ) -> Result<LeafAssignment, Self::Error>;

  /// Combines `other`'s trees into `model`, `other`'s first.
  fn merge(&self, model: Self::Model, other: &Self::Model) -> Result<Self::Model, Self::Error>;

  /// Re-estimates leaf outputs of `model` for the rows of `matrix`, which
  /// land in the leaves named by `leaves`. Tree structure is kept.
  fn refit(
    &self,
    model: Self::Model,
    leaves: &LeafAssignment,
    matrix: &CsrMatrix,
    labels: &[f32],
  ) -> Result<Self::Model, Self::Error>;
}
