//! Regression trees and the leaf-wise histogram grower.

use crate::binning::BinnedMatrix;
use crate::params::BoosterParams;

use rayon::prelude::*;

/// Gains at or below this (plus the relative share of the parent score) are
/// treated as rounding noise.
const MIN_SPLIT_GAIN: f64 = 1e-12;
const MIN_SPLIT_GAIN_RELATIVE: f64 = 1e-9;

/// Where a split node's branch leads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Child {
  Split(usize),
  Leaf(usize),
}

/// An internal node: rows with `value <= threshold` go left.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitNode {
  pub feature: usize,
  pub threshold: f64,
  pub gain: f64,
  pub left: Child,
  pub right: Child,
  // Bin-space threshold; only meaningful against the training bins.
  threshold_bin: u8,
}

/// A binary regression tree with one output value per leaf.
#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
  splits: Vec<SplitNode>,
  leaf_values: Vec<f64>,
}

impl Tree {
  /// A tree that maps every row to a single leaf.
  pub fn constant(value: f64) -> Self {
    Self {
      splits: Vec::new(),
      leaf_values: vec![value],
    }
  }

  pub fn num_leaves(&self) -> usize {
    self.leaf_values.len()
  }

  pub fn splits(&self) -> &[SplitNode] {
    &self.splits
  }

  pub fn leaf_value(&self, leaf: usize) -> f64 {
    self.leaf_values[leaf]
  }

  pub fn leaf_values(&self) -> &[f64] {
    &self.leaf_values
  }

  pub(crate) fn set_leaf_value(&mut self, leaf: usize, value: f64) {
    self.leaf_values[leaf] = value;
  }

  /// Shifts every leaf output by `bias`.
  pub(crate) fn add_bias(&mut self, bias: f64) {
    self.leaf_values.iter_mut().for_each(|v| *v += bias);
  }

  /// Largest feature index referenced by a split.
  pub fn max_feature(&self) -> Option<usize> {
    self.splits.iter().map(|s| s.feature).max()
  }

  /// Leaf reached by a dense row of raw feature values.
  pub fn leaf_index(&self, row: &[f64]) -> usize {
    if self.splits.is_empty() {
      return 0;
    }
    let mut node = 0;
    loop {
      let split = &self.splits[node];
      let value = row.get(split.feature).copied().unwrap_or(0.0);
      let next = if value <= split.threshold {
        split.left
      } else {
        split.right
      };
      match next {
        Child::Split(i) => node = i,
        Child::Leaf(leaf) => return leaf,
      }
    }
  }

  /// Leaf reached by a training row, walking bin thresholds.
  pub(crate) fn leaf_index_binned(&self, binned: &BinnedMatrix, row: usize) -> usize {
    if self.splits.is_empty() {
      return 0;
    }
    let mut node = 0;
    loop {
      let split = &self.splits[node];
      let next = if binned.bin(row, split.feature) <= split.threshold_bin {
        split.left
      } else {
        split.right
      };
      match next {
        Child::Split(i) => node = i,
        Child::Leaf(leaf) => return leaf,
      }
    }
  }
}

/// Per-bin gradient statistics.
#[derive(Debug, Clone, Copy, Default)]
struct BinStat {
  grad: f64,
  hess: f64,
  count: usize,
}

impl BinStat {
  fn add(&mut self, other: &BinStat) {
    self.grad += other.grad;
    self.hess += other.hess;
    self.count += other.count;
  }

  fn minus(&self, other: &BinStat) -> BinStat {
    BinStat {
      grad: self.grad - other.grad,
      hess: self.hess - other.hess,
      count: self.count - other.count,
    }
  }
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
  feature: usize,
  bin: u8,
  gain: f64,
}

/// A leaf under construction.
struct GrowingLeaf {
  rows: Vec<u32>,
  total: BinStat,
  best: Option<SplitCandidate>,
  // The split node slot pointing at this leaf: (node, is_left).
  parent: Option<(usize, bool)>,
}

/// Builds one tree against fixed gradients.
pub(crate) struct TreeGrower<'a> {
  pub(crate) binned: &'a BinnedMatrix,
  pub(crate) grad: &'a [f64],
  pub(crate) hess: &'a [f64],
  pub(crate) features: &'a [usize],
  pub(crate) params: &'a BoosterParams,
}

impl<'a> TreeGrower<'a> {
  /// Grows a tree over `rows`, splitting the highest-gain leaf first until
  /// `num_leaves` is reached or no split has positive gain. Must be called
  /// inside the training thread pool.
  pub(crate) fn grow(&self, rows: Vec<u32>) -> Tree {
    let total = self.sum(&rows);
    let mut leaves = vec![GrowingLeaf {
      best: self.best_split(&rows, &total),
      rows,
      total,
      parent: None,
    }];
    let mut splits: Vec<SplitNode> = Vec::new();

    while leaves.len() < self.params.num_leaves {
      let chosen = leaves
        .iter()
        .enumerate()
        .filter_map(|(i, leaf)| leaf.best.map(|best| (i, best)))
        .max_by(|(ia, a), (ib, b)| a.gain.total_cmp(&b.gain).then(ib.cmp(ia)));
      let (leaf_idx, candidate) = match chosen {
        Some(found) => found,
        None => break,
      };

      let column = self.binned.column(candidate.feature);
      let rows = std::mem::take(&mut leaves[leaf_idx].rows);
      let (left_rows, right_rows): (Vec<u32>, Vec<u32>) = rows
        .into_iter()
        .partition(|&r| column[r as usize] <= candidate.bin);

      let node = splits.len();
      let new_leaf = leaves.len();
      splits.push(SplitNode {
        feature: candidate.feature,
        threshold: self.binned.mapper(candidate.feature).upper_bound(candidate.bin),
        gain: candidate.gain,
        left: Child::Leaf(leaf_idx),
        right: Child::Leaf(new_leaf),
        threshold_bin: candidate.bin,
      });
      if let Some((parent, is_left)) = leaves[leaf_idx].parent {
        if is_left {
          splits[parent].left = Child::Split(node);
        } else {
          splits[parent].right = Child::Split(node);
        }
      }

      let left_total = self.sum(&left_rows);
      let right_total = leaves[leaf_idx].total.minus(&left_total);
      leaves[leaf_idx] = GrowingLeaf {
        best: self.best_split(&left_rows, &left_total),
        rows: left_rows,
        total: left_total,
        parent: Some((node, true)),
      };
      leaves.push(GrowingLeaf {
        best: self.best_split(&right_rows, &right_total),
        rows: right_rows,
        total: right_total,
        parent: Some((node, false)),
      });
    }

    let leaf_values = leaves
      .iter()
      .map(|leaf| leaf_output(leaf.total.grad, leaf.total.hess, self.params))
      .collect();
    Tree {
      splits,
      leaf_values,
    }
  }

  fn sum(&self, rows: &[u32]) -> BinStat {
    let mut total = BinStat::default();
    for &r in rows {
      total.grad += self.grad[r as usize];
      total.hess += self.hess[r as usize];
    }
    total.count = rows.len();
    total
  }

  fn best_split(&self, rows: &[u32], total: &BinStat) -> Option<SplitCandidate> {
    let params = self.params;
    if rows.len() < 2 * params.min_data_in_leaf.max(1) {
      return None;
    }
    let parent_score = score(total.grad, total.hess, params.lambda_l2);
    let min_gain = MIN_SPLIT_GAIN + MIN_SPLIT_GAIN_RELATIVE * parent_score.abs();

    self
      .features
      .par_iter()
      .filter_map(|&feature| {
        let num_bins = self.binned.mapper(feature).num_bins();
        if num_bins < 2 {
          return None;
        }
        let column = self.binned.column(feature);
        let mut histogram = vec![BinStat::default(); num_bins];
        for &r in rows {
          let stat = &mut histogram[column[r as usize] as usize];
          stat.grad += self.grad[r as usize];
          stat.hess += self.hess[r as usize];
          stat.count += 1;
        }

        let mut left = BinStat::default();
        let mut best: Option<SplitCandidate> = None;
        for (bin, stat) in histogram.iter().enumerate().take(num_bins - 1) {
          left.add(stat);
          let right = total.minus(&left);
          if left.count < params.min_data_in_leaf || right.count < params.min_data_in_leaf {
            continue;
          }
          if left.hess < params.min_sum_hessian_in_leaf || right.hess < params.min_sum_hessian_in_leaf {
            continue;
          }
          let gain = score(left.grad, left.hess, params.lambda_l2)
            + score(right.grad, right.hess, params.lambda_l2)
            - parent_score;
          if gain > min_gain && best.map_or(true, |b| gain > b.gain) {
            best = Some(SplitCandidate {
              feature,
              bin: bin as u8,
              gain,
            });
          }
        }
        best
      })
      .reduce_with(|a, b| {
        if b.gain > a.gain || (b.gain == a.gain && b.feature < a.feature) {
          b
        } else {
          a
        }
      })
  }
}

fn score(grad: f64, hess: f64, lambda: f64) -> f64 {
  let denom = hess + lambda;
  if denom <= 0.0 {
    0.0
  } else {
    grad * grad / denom
  }
}

/// Shrunk Newton step for a leaf with the given gradient sums.
pub(crate) fn leaf_output(grad: f64, hess: f64, params: &BoosterParams) -> f64 {
  let denom = hess + params.lambda_l2;
  if denom <= 0.0 {
    0.0
  } else {
    -grad / denom * params.learning_rate
  }
}
