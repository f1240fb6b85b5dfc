//! Keeps one evolving model consistent across windows.

use crate::error::{Error, Result};
use crate::evaluator::{evaluate, ErrorRates};
use crate::features::FeatureSet;
use crate::learner::{Hyperparameters, Learner, LearnerStage};

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// The model owned by the caller between windows.
#[derive(Debug, Clone)]
pub enum ModelState<M> {
  /// No window has closed yet.
  Uninitialized,
  Trained(M),
}

impl<M> Default for ModelState<M> {
  fn default() -> Self {
    ModelState::Uninitialized
  }
}

impl<M> ModelState<M> {
  pub fn is_trained(&self) -> bool {
    matches!(self, ModelState::Trained(_))
  }

  pub fn model(&self) -> Option<&M> {
    match self {
      ModelState::Trained(model) => Some(model),
      ModelState::Uninitialized => None,
    }
  }
}

/// How a trained model absorbs a new window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefitStrategy {
  /// Merge the old trees into a model fit on the window, then refit their
  /// leaf outputs against the window's labels.
  #[default]
  Refit,
  /// Replace the model with one trained from scratch on the window.
  Retrain,
}

/// What happened to the model at a window boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelUpdate {
  InitialFit,
  Refit,
  Retrain,
}

/// Result of one window's pass through the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowOutcome {
  /// Rates of the previous model on this window; `None` for the first window.
  pub error_rates: Option<ErrorRates>,
  pub update: ModelUpdate,
  /// Time spent predicting and scoring the previous model.
  pub check_time: Option<Duration>,
  /// Time spent in the whole window, learner calls included.
  pub train_time: Duration,
}

/// Sequences evaluation and model updates for each closed window.
#[derive(Debug)]
pub struct Orchestrator<L> {
  learner: L,
  params: Hyperparameters,
  refit_params: Hyperparameters,
  strategy: RefitStrategy,
  cutoff: f64,
}

impl<L: Learner> Orchestrator<L> {
  /// `refit_iterations` boosting rounds are used for the window model that
  /// the old trees are merged into under [`RefitStrategy::Refit`].
  pub fn new(
    learner: L,
    params: Hyperparameters,
    strategy: RefitStrategy,
    refit_iterations: usize,
    cutoff: f64,
  ) -> Self {
    let refit_params = params.with("num_iterations", refit_iterations.to_string());
    Self {
      learner,
      params,
      refit_params,
      strategy,
      cutoff,
    }
  }

  pub fn learner(&self) -> &L {
    &self.learner
  }

  pub fn hyperparameters(&self) -> &Hyperparameters {
    &self.params
  }

  pub fn strategy(&self) -> RefitStrategy {
    self.strategy
  }

  pub fn cutoff(&self) -> f64 {
    self.cutoff
  }

  /// Consumes the current state and returns the state for the next window.
  ///
  /// The first window only trains. Later windows first score the previous
  /// model on this window's labels, then update it. Learner failures are
  /// fatal.
  pub fn process_window(
    &self,
    state: ModelState<L::Model>,
    features: &FeatureSet,
  ) -> Result<(ModelState<L::Model>, WindowOutcome)> {
    let started = Instant::now();
    let matrix = &features.matrix;
    let labels = features.labels.as_slice();

    let old = match state {
      ModelState::Uninitialized => {
        let model = self
          .learner
          .fit(matrix, labels, &self.params)
          .map_err(learner_error(LearnerStage::Fit))?;
        let outcome = WindowOutcome {
          error_rates: None,
          update: ModelUpdate::InitialFit,
          check_time: None,
          train_time: started.elapsed(),
        };
        return Ok((ModelState::Trained(model), outcome));
      }
      ModelState::Trained(model) => model,
    };

    let predictions = self
      .learner
      .predict(&old, matrix, &self.params)
      .map_err(learner_error(LearnerStage::Predict))?;
    let rates = evaluate(labels, &predictions, self.cutoff);
    let check_time = started.elapsed();
    tracing::debug!(
      fpr = rates.false_positive_rate,
      fnr = rates.false_negative_rate,
      "Scored previous model"
    );

    let (model, update) = match self.strategy {
      RefitStrategy::Refit => {
        let fresh = self
          .learner
          .fit(matrix, labels, &self.refit_params)
          .map_err(learner_error(LearnerStage::Fit))?;
        let leaves = self
          .learner
          .predict_leaf(&old, matrix, &self.params)
          .map_err(learner_error(LearnerStage::PredictLeaf))?;
        let merged = self
          .learner
          .merge(fresh, &old)
          .map_err(learner_error(LearnerStage::Merge))?;
        drop(old);
        let refit = self
          .learner
          .refit(merged, &leaves, matrix, labels)
          .map_err(learner_error(LearnerStage::Refit))?;
        (refit, ModelUpdate::Refit)
      }
      RefitStrategy::Retrain => {
        let model = self
          .learner
          .fit(matrix, labels, &self.params)
          .map_err(learner_error(LearnerStage::Fit))?;
        (model, ModelUpdate::Retrain)
      }
    };

    let outcome = WindowOutcome {
      error_rates: Some(rates),
      update,
      check_time: Some(check_time),
      train_time: started.elapsed(),
    };
    Ok((ModelState::Trained(model), outcome))
  }
}

fn learner_error<E>(stage: LearnerStage) -> impl FnOnce(E) -> Error
where
  E: std::error::Error + Send + Sync + 'static,
{
  move |source| {
    tracing::error!(%stage, error = %source, "Learner call failed");
    Error::Learner {
      stage,
      source: Box::new(source),
    }
  }
}
