use serde::Serialize;

/// Misclassification rates of a model against a window's true labels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ErrorRates {
  pub rows: usize,
  pub false_positives: usize,
  pub false_negatives: usize,
  /// `false_positives / rows`, or 0 for an empty window.
  pub false_positive_rate: f64,
  pub false_negative_rate: f64,
}

/// Compares `predictions` with `labels` at `cutoff`.
///
/// A row is a false positive when its label is below the cutoff and its
/// prediction is not, and a false negative the other way around.
pub fn evaluate(labels: &[f32], predictions: &[f64], cutoff: f64) -> ErrorRates {
  debug_assert_eq!(labels.len(), predictions.len());
  let mut false_positives = 0;
  let mut false_negatives = 0;
  for (&label, &predicted) in labels.iter().zip(predictions) {
    let label = f64::from(label);
    if label < cutoff && predicted >= cutoff {
      false_positives += 1;
    } else if label >= cutoff && predicted < cutoff {
      false_negatives += 1;
    }
  }

  let rows = labels.len();
  let rate = |count: usize| if rows == 0 { 0.0 } else { count as f64 / rows as f64 };
  ErrorRates {
    rows,
    false_positives,
    false_negatives,
    false_positive_rate: rate(false_positives),
    false_negative_rate: rate(false_negatives),
  }
}
