use fibre_gbdt::{BoosterParams, CsrBuilder, CsrMatrix};

/// Two-column dataset where the label is `column0 < 30` (or the inverse).
///
/// Column 0 cycles through 0..100, column 1 is a small periodic distractor
/// that is stored sparsely (zero values are left out).
pub fn threshold_dataset(rows: usize, inverted: bool) -> (CsrMatrix, Vec<f32>) {
  let mut builder = CsrBuilder::new();
  let mut labels = Vec::with_capacity(rows);
  for i in 0..rows {
    let x0 = (i % 100) as f64;
    let x1 = ((i * 7) % 13) as f64;
    builder.push(0, x0);
    if x1 != 0.0 {
      builder.push(1, x1);
    }
    builder.finish_row();
    let positive = x0 < 30.0;
    labels.push(if positive != inverted { 1.0 } else { 0.0 });
  }
  (builder.build(2).unwrap(), labels)
}

/// Small, deterministic parameters without row or column subsampling.
pub fn test_params(num_iterations: usize) -> BoosterParams {
  BoosterParams {
    num_iterations,
    min_data_in_leaf: 20,
    feature_fraction: 1.0,
    bagging_fraction: 1.0,
    num_threads: 2,
    ..BoosterParams::default()
  }
}

pub fn accuracy(labels: &[f32], predictions: &[f64]) -> f64 {
  let correct = labels
    .iter()
    .zip(predictions)
    .filter(|&(&label, &p)| (p >= 0.5) == (label >= 0.5))
    .count();
  correct as f64 / labels.len() as f64
}
