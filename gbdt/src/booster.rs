use crate::binning::BinnedMatrix;
use crate::csr::CsrMatrix;
use crate::error::{Error, Result};
use crate::params::BoosterParams;
use crate::tree::{leaf_output, Tree, TreeGrower};

use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use rayon::prelude::*;
use rayon::ThreadPool;

/// Label means are clamped away from 0 and 1 before taking log-odds.
const LABEL_MEAN_EPSILON: f64 = 1e-15;

/// Per-row, per-tree leaf indices, stored row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafAssignment {
  num_rows: usize,
  num_trees: usize,
  leaves: Vec<u32>,
}

impl LeafAssignment {
  /// Wraps a row-major leaf table. `leaves.len()` must equal `num_rows * num_trees`.
  pub fn new(num_rows: usize, num_trees: usize, leaves: Vec<u32>) -> Result<Self> {
    if leaves.len() != num_rows * num_trees {
      return Err(Error::LeafShape(format!(
        "{} leaf ids cannot form {} rows x {} trees",
        leaves.len(),
        num_rows,
        num_trees
      )));
    }
    Ok(Self {
      num_rows,
      num_trees,
      leaves,
    })
  }

  pub fn num_rows(&self) -> usize {
    self.num_rows
  }

  pub fn num_trees(&self) -> usize {
    self.num_trees
  }

  pub fn get(&self, row: usize, tree: usize) -> u32 {
    self.leaves[row * self.num_trees + tree]
  }

  pub fn row(&self, row: usize) -> &[u32] {
    &self.leaves[row * self.num_trees..(row + 1) * self.num_trees]
  }
}

/// A binary classifier made of an additive ensemble of regression trees.
#[derive(Debug, Clone)]
pub struct Booster {
  trees: Vec<Tree>,
  num_features: usize,
  params: BoosterParams,
}

impl Booster {
  /// Trains a fresh model with binary log-loss.
  ///
  /// With `num_iterations == 0` the result is an empty ensemble bound to the
  /// matrix width; it predicts 0.5 for every row until trees are merged in.
  pub fn train(matrix: &CsrMatrix, labels: &[f32], params: &BoosterParams) -> Result<Self> {
    check_labels(matrix, labels)?;
    let mut booster = Self {
      trees: Vec::new(),
      num_features: matrix.num_cols(),
      params: params.clone(),
    };
    if params.num_iterations == 0 || matrix.num_rows() == 0 {
      return Ok(booster);
    }

    let pool = build_pool(params.num_threads)?;
    booster.trees = pool.install(|| boost(matrix, labels, params));
    Ok(booster)
  }

  /// An empty ensemble for matrices of `num_features` columns.
  pub fn empty(num_features: usize, params: BoosterParams) -> Self {
    Self {
      trees: Vec::new(),
      num_features,
      params,
    }
  }

  pub fn num_trees(&self) -> usize {
    self.trees.len()
  }

  pub fn num_features(&self) -> usize {
    self.num_features
  }

  pub fn trees(&self) -> &[Tree] {
    &self.trees
  }

  pub fn params(&self) -> &BoosterParams {
    &self.params
  }

  /// Summed tree outputs (log-odds) per row.
  pub fn predict_raw(&self, matrix: &CsrMatrix) -> Result<Vec<f64>> {
    self.check_width(matrix)?;
    let pool = build_pool(self.params.num_threads)?;
    let width = matrix.num_cols().max(self.num_features);
    Ok(pool.install(|| {
      (0..matrix.num_rows())
        .into_par_iter()
        .map_init(
          || vec![0.0; width],
          |buf, row| {
            matrix.fill_dense(row, buf);
            self.trees.iter().map(|t| t.leaf_value(t.leaf_index(buf))).sum::<f64>()
          },
        )
        .collect()
    }))
  }

  /// Probability of the positive class per row.
  pub fn predict(&self, matrix: &CsrMatrix) -> Result<Vec<f64>> {
    let mut raw = self.predict_raw(matrix)?;
    raw.iter_mut().for_each(|v| *v = sigmoid(*v));
    Ok(raw)
  }

  /// Leaf index reached in every tree, per row.
  pub fn predict_leaf(&self, matrix: &CsrMatrix) -> Result<LeafAssignment> {
    self.check_width(matrix)?;
    let pool = build_pool(self.params.num_threads)?;
    let width = matrix.num_cols().max(self.num_features);
    let num_trees = self.trees.len();
    let rows: Vec<Vec<u32>> = pool.install(|| {
      (0..matrix.num_rows())
        .into_par_iter()
        .map_init(
          || vec![0.0; width],
          |buf, row| {
            matrix.fill_dense(row, buf);
            self
              .trees
              .iter()
              .map(|t| t.leaf_index(buf) as u32)
              .collect()
          },
        )
        .collect()
    });
    LeafAssignment::new(matrix.num_rows(), num_trees, rows.concat())
  }

  /// Prepends `other`'s trees to this ensemble.
  pub fn merge_from(&mut self, other: &Booster) -> Result<()> {
    if !self.trees.is_empty() && !other.trees.is_empty() && self.num_features != other.num_features {
      return Err(Error::FeatureMismatch {
        expected: self.num_features,
        found: other.num_features,
      });
    }
    if self.trees.is_empty() {
      self.num_features = other.num_features;
    }
    let mut merged = other.trees.clone();
    merged.append(&mut self.trees);
    self.trees = merged;
    Ok(())
  }

  /// Re-estimates the leaf outputs of the first `leaves.num_trees()` trees
  /// from the gradients of `labels`, keeping every split unchanged.
  ///
  /// Each new output is blended with the old one using `refit_decay_rate`.
  /// Leaves that receive no rows keep their value.
  pub fn refit(&mut self, leaves: &LeafAssignment, matrix: &CsrMatrix, labels: &[f32]) -> Result<()> {
    check_labels(matrix, labels)?;
    if leaves.num_rows() != matrix.num_rows() {
      return Err(Error::LeafShape(format!(
        "{} rows of leaf ids for a matrix of {} rows",
        leaves.num_rows(),
        matrix.num_rows()
      )));
    }
    if leaves.num_trees() > self.trees.len() {
      return Err(Error::LeafShape(format!(
        "{} trees of leaf ids for a model of {} trees",
        leaves.num_trees(),
        self.trees.len()
      )));
    }
    for (t, tree) in self.trees.iter().take(leaves.num_trees()).enumerate() {
      if let Some(row) = (0..leaves.num_rows()).find(|&r| leaves.get(r, t) as usize >= tree.num_leaves()) {
        return Err(Error::LeafShape(format!(
          "row {} names leaf {} of tree {}, which has {} leaves",
          row,
          leaves.get(row, t),
          t,
          tree.num_leaves()
        )));
      }
    }

    let decay = self.params.refit_decay_rate;
    let mut scores = vec![0.0; matrix.num_rows()];
    for t in 0..leaves.num_trees() {
      let tree = &mut self.trees[t];
      let mut grad_sum = vec![0.0; tree.num_leaves()];
      let mut hess_sum = vec![0.0; tree.num_leaves()];
      let mut counts = vec![0usize; tree.num_leaves()];
      for (row, (&score, &label)) in scores.iter().zip(labels).enumerate() {
        let leaf = leaves.get(row, t) as usize;
        let p = sigmoid(score);
        grad_sum[leaf] += p - f64::from(label);
        hess_sum[leaf] += (p * (1.0 - p)).max(f64::EPSILON);
        counts[leaf] += 1;
      }
      for leaf in 0..tree.num_leaves() {
        if counts[leaf] == 0 {
          continue;
        }
        let fresh = leaf_output(grad_sum[leaf], hess_sum[leaf], &self.params);
        let old = tree.leaf_value(leaf);
        tree.set_leaf_value(leaf, decay * old + (1.0 - decay) * fresh);
      }
      for (row, score) in scores.iter_mut().enumerate() {
        *score += tree.leaf_value(leaves.get(row, t) as usize);
      }
    }
    Ok(())
  }

  fn check_width(&self, matrix: &CsrMatrix) -> Result<()> {
    match self.trees.iter().filter_map(Tree::max_feature).max() {
      Some(max) if max >= matrix.num_cols() => Err(Error::FeatureMismatch {
        expected: self.num_features,
        found: matrix.num_cols(),
      }),
      _ => Ok(()),
    }
  }
}

/// Runs the boosting loop. Must be called inside the training thread pool.
fn boost(matrix: &CsrMatrix, labels: &[f32], params: &BoosterParams) -> Vec<Tree> {
  let mut trees: Vec<Tree> = Vec::with_capacity(params.num_iterations);
  let num_rows = matrix.num_rows();
  let binned = BinnedMatrix::build(matrix, params.max_bin);
  let mut rng = Pcg64::seed_from_u64(params.seed);

  let mean = labels.iter().map(|&l| f64::from(l)).sum::<f64>() / num_rows as f64;
  let mean = mean.clamp(LABEL_MEAN_EPSILON, 1.0 - LABEL_MEAN_EPSILON);
  let init_score = (mean / (1.0 - mean)).ln();

  let mut scores = vec![init_score; num_rows];
  let mut grad = vec![0.0; num_rows];
  let mut hess = vec![0.0; num_rows];
  let mut bag: Vec<u32> = (0..num_rows as u32).collect();
  let num_features = binned.num_features();
  let features_per_tree = ((num_features as f64 * params.feature_fraction).ceil() as usize)
    .clamp(1, num_features.max(1));

  for iteration in 0..params.num_iterations {
    grad
      .par_iter_mut()
      .zip(hess.par_iter_mut())
      .zip(scores.par_iter().zip(labels.par_iter()))
      .for_each(|((g, h), (&score, &label))| {
        let p = sigmoid(score);
        *g = p - f64::from(label);
        *h = (p * (1.0 - p)).max(f64::EPSILON);
      });

    if params.bagging_enabled() && iteration % params.bagging_freq == 0 {
      bag = (0..num_rows as u32)
        .filter(|_| rng.random::<f64>() < params.bagging_fraction)
        .collect();
    }
    let mut features = if features_per_tree < num_features {
      index::sample(&mut rng, num_features, features_per_tree).into_vec()
    } else {
      (0..num_features).collect()
    };
    features.sort_unstable();

    let grower = TreeGrower {
      binned: &binned,
      grad: &grad,
      hess: &hess,
      features: &features,
      params,
    };
    let mut tree = grower.grow(bag.clone());

    if tree.num_leaves() == 1 {
      tracing::debug!(
        iteration,
        "Stopped boosting: no leaf meets the split requirements"
      );
      if trees.is_empty() {
        trees.push(Tree::constant(init_score));
      }
      break;
    }

    scores.par_iter_mut().enumerate().for_each(|(row, score)| {
      *score += tree.leaf_value(tree.leaf_index_binned(&binned, row));
    });
    if trees.is_empty() {
      tree.add_bias(init_score);
    }
    trees.push(tree);
  }

  tracing::debug!(
    trees = trees.len(),
    rows = num_rows,
    "Finished boosting"
  );
  trees
}

fn sigmoid(x: f64) -> f64 {
  1.0 / (1.0 + (-x).exp())
}

fn check_labels(matrix: &CsrMatrix, labels: &[f32]) -> Result<()> {
  if labels.len() != matrix.num_rows() {
    return Err(Error::LabelMismatch {
      labels: labels.len(),
      rows: matrix.num_rows(),
    });
  }
  if let Some((row, &value)) = labels
    .iter()
    .enumerate()
    .find(|&(_, &l)| l != 0.0 && l != 1.0)
  {
    return Err(Error::InvalidLabel { row, value });
  }
  Ok(())
}

fn build_pool(num_threads: usize) -> Result<ThreadPool> {
  rayon::ThreadPoolBuilder::new()
    .num_threads(num_threads)
    .thread_name(|i| format!("fibre-gbdt-{}", i))
    .build()
    .map_err(|e| Error::ThreadPool(e.to_string()))
}
