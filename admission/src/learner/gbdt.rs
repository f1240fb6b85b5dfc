use super::{CsrMatrix, Hyperparameters, LeafAssignment, Learner};

use fibre_gbdt::{Booster, BoosterParams};

/// [`Learner`] backed by the in-tree gradient-boosted trees.
#[derive(Debug, Clone, Copy, Default)]
pub struct GbdtLearner;

impl GbdtLearner {
  pub fn new() -> Self {
    Self
  }

  fn params(params: &Hyperparameters) -> fibre_gbdt::Result<BoosterParams> {
    BoosterParams::from_pairs(params.iter())
  }
}

impl Learner for GbdtLearner {
  type Model = Booster;
  type Error = fibre_gbdt::Error;

  fn fit(&self, matrix: &CsrMatrix, labels: &[f32], params: &Hyperparameters) -> Result<Booster, Self::Error> {
    let params = Self::params(params)?;
    let booster = Booster::train(matrix, labels, &params)?;
    tracing::debug!(
      rows = matrix.num_rows(),
      trees = booster.num_trees(),
      "Fitted booster"
    );
    Ok(booster)
  }

  fn predict(&self, model: &Booster, matrix: &CsrMatrix, _params: &Hyperparameters) -> Result<Vec<f64>, Self::Error> {
    model.predict(matrix)
  }

  fn predict_leaf(
    &self,
    model: &Booster,
    matrix: &CsrMatrix,
    _params: &Hyperparameters,
  ) -> Result<LeafAssignment, Self::Error> {
    model.predict_leaf(matrix)
  }

  fn merge(&self, mut model: Booster, other: &Booster) -> Result<Booster, Self::Error> {
    model.merge_from(other)?;
    Ok(model)
  }

  fn refit(
    &self,
    mut model: Booster,
    leaves: &LeafAssignment,
    matrix: &CsrMatrix,
    labels: &[f32],
  ) -> Result<Booster, Self::Error> {
    model.refit(leaves, matrix, labels)?;
    Ok(model)
  }
}
