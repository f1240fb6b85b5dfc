mod common;

use common::{buffer_window, requests, zipf_trace};
use fibre_admission::{FeatureExtractor, OptLabeler, SimulatedCache, Window};
use pretty_assertions::assert_eq;

fn labeled_window(window_size: u64, cache_size: u64, trace: &[fibre_admission::Request]) -> Window {
  let mut window = buffer_window(window_size, trace);
  OptLabeler::new(cache_size).label(&mut window);
  window
}

#[test]
fn rows_and_labels_align_with_requests() {
  let trace = zipf_trace(500, 50, 1);
  let window = labeled_window(500, 5_000, &trace);
  let extractor = FeatureExtractor::new(5_000, 50);
  let features = extractor.extract(&window).unwrap();

  assert_eq!(features.labels.len(), 500);
  assert_eq!(features.matrix.indptr().len() - 1, 500);
  assert_eq!(features.matrix.num_cols(), 53);
  for (label, entry) in features.labels.iter().zip(&window.entries) {
    assert_eq!(*label == 1.0, entry.admit);
  }
}

#[test]
fn gaps_run_from_most_recent_arrival() {
  // id 1 arrives at positions 0, 2 and 5.
  let trace = requests(&[(1, 8), (2, 8), (1, 8), (3, 8), (4, 8), (1, 8)]);
  let window = labeled_window(6, 0, &trace);
  let features = FeatureExtractor::new(1_024, 50).extract(&window).unwrap();
  let m = &features.matrix;

  assert_eq!(m.row_len(0), 3);
  assert_eq!(m.value(2, 0), 2.0);
  assert_eq!(m.row_len(2), 4);
  assert_eq!(m.value(5, 0), 3.0);
  assert_eq!(m.value(5, 1), 2.0);
  assert_eq!(m.row_len(5), 5);
}

#[test]
fn trailing_slots_hold_size_capacity_and_cost() {
  let trace = vec![fibre_admission::Request::new(1, 1, 1_024, 2.5)];
  let window = labeled_window(1, 0, &trace);
  let features = FeatureExtractor::new(4_096, 50).extract(&window).unwrap();
  let m = &features.matrix;

  assert_eq!(m.value(0, 50), 1_000.0);
  assert_eq!(m.value(0, 51), 1_200.0);
  assert_eq!(m.value(0, 52), 2.5);
}

#[test]
fn history_is_capped() {
  let trace = requests(&[(1, 4), (1, 4), (1, 4), (1, 4), (1, 4)]);
  let window = labeled_window(5, 0, &trace);
  let features = FeatureExtractor::new(100, 2).extract(&window).unwrap();

  // Two gap slots plus three trailing slots.
  assert_eq!(features.matrix.num_cols(), 5);
  assert_eq!(features.matrix.row_len(4), 5);
  assert_eq!(features.matrix.value(4, 0), 1.0);
  assert_eq!(features.matrix.value(4, 1), 1.0);
}

#[test]
fn zero_size_feature_is_zero_and_counted() {
  let trace = requests(&[(1, 0), (2, 10)]);
  let window = labeled_window(2, 0, &trace);
  let features = FeatureExtractor::new(100, 50).extract(&window).unwrap();
  assert_eq!(features.degenerate_sizes, 1);
  assert_eq!(features.matrix.value(0, 50), 0.0);
  assert!(features.matrix.data().iter().all(|v| v.is_finite()));
}

#[test]
fn overshooting_admissions_are_counted() {
  let trace = requests(&[(1, 80), (2, 80), (3, 10), (1, 80), (2, 80)]);
  let mut window = buffer_window(5, &trace);
  window.entries[0].admit = true;
  window.entries[1].admit = true;
  let features = FeatureExtractor::new(100, 50).extract(&window).unwrap();

  // Requests 3 and 4 see -60 available; request 4 then releases id 1.
  assert_eq!(features.negative_capacity, 2);
  assert_eq!(features.matrix.value(2, 51), 0.0);
}

#[test]
fn replayed_occupancy_conserves_capacity() {
  let trace = zipf_trace(1_000, 80, 9);
  let cache_size = 3_000;
  let window = labeled_window(1_000, cache_size, &trace);

  let mut cache = SimulatedCache::new(cache_size);
  for entry in &window.entries {
    cache.apply(entry.id, entry.size, entry.admit);
    assert_eq!(cache.available() + cache.resident_bytes(), cache_size as i64);
  }
}
