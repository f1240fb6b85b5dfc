use crate::error::{Error, Result};

use std::str::FromStr;

/// Training configuration for a [`Booster`](crate::Booster).
///
/// Usually built from string key/value pairs with [`BoosterParams::from_pairs`],
/// using the conventional gradient-boosting parameter names.
#[derive(Debug, Clone, PartialEq)]
pub struct BoosterParams {
  pub num_iterations: usize,
  pub learning_rate: f64,
  pub num_leaves: usize,
  pub max_bin: usize,
  pub min_data_in_leaf: usize,
  pub min_sum_hessian_in_leaf: f64,
  pub feature_fraction: f64,
  pub bagging_fraction: f64,
  pub bagging_freq: usize,
  pub lambda_l2: f64,
  /// Weight of the previous leaf output when refitting.
  pub refit_decay_rate: f64,
  pub num_threads: usize,
  pub seed: u64,
}

impl Default for BoosterParams {
  fn default() -> Self {
    Self {
      num_iterations: 50,
      learning_rate: 0.1,
      num_leaves: 31,
      max_bin: 255,
      min_data_in_leaf: 50,
      min_sum_hessian_in_leaf: 5.0,
      feature_fraction: 0.8,
      bagging_fraction: 0.8,
      bagging_freq: 5,
      lambda_l2: 0.0,
      refit_decay_rate: 0.9,
      num_threads: num_cpus::get(),
      seed: 0,
    }
  }
}

// Keys that other boosting front-ends accept and this learner has no use for.
const IGNORED_KEYS: &[&str] = &[
  "metric",
  "metric_freq",
  "is_provide_training_metric",
  "tree_learner",
  "is_enable_sparse",
  "two_round",
  "save_binary",
  "verbosity",
];

impl BoosterParams {
  /// Parses parameters from key/value pairs, starting from the defaults.
  ///
  /// Only `boosting = gbdt` and `objective = binary` are supported. Unknown
  /// keys are logged and skipped.
  pub fn from_pairs<'a, I>(pairs: I) -> Result<Self>
  where
    I: IntoIterator<Item = (&'a str, &'a str)>,
  {
    let mut params = Self::default();
    for (key, value) in pairs {
      let value = value.trim();
      match key {
        "boosting" | "boosting_type" => expect_choice(key, value, "gbdt")?,
        "objective" => expect_choice(key, value, "binary")?,
        "num_iterations" | "num_boost_round" => params.num_iterations = parse(key, value)?,
        "learning_rate" | "shrinkage_rate" => params.learning_rate = parse(key, value)?,
        "num_leaves" => params.num_leaves = parse(key, value)?,
        "max_bin" => params.max_bin = parse(key, value)?,
        "min_data_in_leaf" => params.min_data_in_leaf = parse(key, value)?,
        "min_sum_hessian_in_leaf" => params.min_sum_hessian_in_leaf = parse(key, value)?,
        "feature_fraction" | "colsample_bytree" => params.feature_fraction = parse(key, value)?,
        "bagging_fraction" | "subsample" => params.bagging_fraction = parse(key, value)?,
        "bagging_freq" => params.bagging_freq = parse(key, value)?,
        "lambda_l2" | "reg_lambda" => params.lambda_l2 = parse(key, value)?,
        "refit_decay_rate" => params.refit_decay_rate = parse(key, value)?,
        "num_threads" => params.num_threads = parse(key, value)?,
        "seed" => params.seed = parse(key, value)?,
        k if IGNORED_KEYS.contains(&k) => {}
        other => tracing::warn!(key = other, "Ignoring unknown booster parameter"),
      }
    }
    params.validate()?;
    Ok(params)
  }

  /// Checks that every value is within its accepted range.
  pub fn validate(&mut self) -> Result<()> {
    if !(self.learning_rate > 0.0) {
      return Err(invalid("learning_rate", "must be positive"));
    }
    if self.num_leaves < 2 {
      return Err(invalid("num_leaves", "must be at least 2"));
    }
    if !(2..=255).contains(&self.max_bin) {
      return Err(invalid("max_bin", "must be within 2..=255"));
    }
    if !(self.feature_fraction > 0.0 && self.feature_fraction <= 1.0) {
      return Err(invalid("feature_fraction", "must be within (0, 1]"));
    }
    if !(self.bagging_fraction > 0.0 && self.bagging_fraction <= 1.0) {
      return Err(invalid("bagging_fraction", "must be within (0, 1]"));
    }
    if !(0.0..=1.0).contains(&self.refit_decay_rate) {
      return Err(invalid("refit_decay_rate", "must be within [0, 1]"));
    }
    if self.lambda_l2 < 0.0 {
      return Err(invalid("lambda_l2", "cannot be negative"));
    }
    if self.num_threads == 0 {
      self.num_threads = num_cpus::get();
    }
    Ok(())
  }

  /// Whether rows are resampled on this iteration.
  pub(crate) fn bagging_enabled(&self) -> bool {
    self.bagging_freq > 0 && self.bagging_fraction < 1.0
  }
}

fn parse<T: FromStr>(name: &str, value: &str) -> Result<T>
where
  T::Err: std::fmt::Display,
{
  value.parse::<T>().map_err(|e| Error::InvalidParameter {
    name: name.to_string(),
    message: format!("'{}': {}", value, e),
  })
}

fn expect_choice(name: &str, value: &str, supported: &str) -> Result<()> {
  if value.eq_ignore_ascii_case(supported) {
    Ok(())
  } else {
    Err(Error::InvalidParameter {
      name: name.to_string(),
      message: format!("'{}' is not supported, only '{}' is", value, supported),
    })
  }
}

fn invalid(name: &str, message: &str) -> Error {
  Error::InvalidParameter {
    name: name.to_string(),
    message: message.to_string(),
  }
}
