//! Per-request features derived by replaying a labeled window.

use crate::error::{Error, Result};
use crate::window::Window;

use ahash::AHashMap;
use fibre_gbdt::{CsrBuilder, CsrMatrix};
use std::collections::VecDeque;

/// Number of inter-arrival gap slots kept per object by default.
pub const DEFAULT_HIST_FEATURES: usize = 50;

/// Feature matrix and labels of one window, row-aligned with its requests.
#[derive(Debug, Clone)]
pub struct FeatureSet {
  pub matrix: CsrMatrix,
  pub labels: Vec<f32>,
  /// Requests that saw negative simulated available capacity.
  pub negative_capacity: u64,
  /// Requests with a zero size.
  pub degenerate_sizes: u64,
}

impl FeatureSet {
  pub fn num_rows(&self) -> usize {
    self.labels.len()
  }
}

/// Occupancy of a cache that obeys every admission label.
#[derive(Debug, Clone)]
pub struct SimulatedCache {
  available: i64,
  resident: AHashMap<u64, u64>,
}

impl SimulatedCache {
  pub fn new(cache_size: u64) -> Self {
    Self {
      available: to_signed(cache_size),
      resident: AHashMap::new(),
    }
  }

  /// Bytes not held by resident objects. Negative once admissions overshoot.
  pub fn available(&self) -> i64 {
    self.available
  }

  pub fn is_resident(&self, id: u64) -> bool {
    self.resident.contains_key(&id)
  }

  /// Sum of the sizes of resident objects.
  pub fn resident_bytes(&self) -> i64 {
    self
      .resident
      .values()
      .fold(0i64, |acc, &size| acc.saturating_add(to_signed(size)))
  }

  /// Admits a non-resident object labeled for admission, and evicts a
  /// resident one whose current label rejects it.
  pub fn apply(&mut self, id: u64, size: u64, admit: bool) {
    match (self.resident.contains_key(&id), admit) {
      (false, true) => {
        self.available = self.available.saturating_sub(to_signed(size));
        self.resident.insert(id, size);
      }
      (true, false) => {
        if let Some(stored) = self.resident.remove(&id) {
          self.available = self.available.saturating_add(to_signed(stored));
        }
      }
      _ => {}
    }
  }
}

fn to_signed(size: u64) -> i64 {
  i64::try_from(size).unwrap_or(i64::MAX)
}

/// Rounded `100 * log2(value)`, the scale used for size and capacity slots.
fn log_feature(value: f64) -> f64 {
  (100.0 * value.log2()).round()
}

/// Builds the learner input for a labeled window.
///
/// Row `i` holds up to `hist_features` gaps between the previous in-window
/// arrivals of the same object (most recent first), then size, available
/// capacity and cost in the three trailing slots.
#[derive(Debug, Clone, Copy)]
pub struct FeatureExtractor {
  cache_size: u64,
  hist_features: usize,
}

impl FeatureExtractor {
  pub fn new(cache_size: u64, hist_features: usize) -> Self {
    Self {
      cache_size,
      hist_features,
    }
  }

  /// Column width of every produced matrix.
  pub fn num_features(&self) -> usize {
    self.hist_features + 3
  }

  pub fn extract(&self, window: &Window) -> Result<FeatureSet> {
    let rows = window.len();
    let mut builder = CsrBuilder::with_capacity(rows, rows * 4);
    let mut labels = Vec::with_capacity(rows);
    let mut history: AHashMap<u64, VecDeque<usize>> = AHashMap::new();
    let mut cache = SimulatedCache::new(self.cache_size);
    let mut negative_capacity = 0u64;
    let mut degenerate_sizes = 0u64;

    let size_slot = self.hist_features;
    for (i, entry) in window.entries.iter().enumerate() {
      labels.push(if entry.admit { 1.0 } else { 0.0 });

      let seen = history.entry(entry.id).or_default();
      let mut last = i;
      for (slot, &earlier) in seen.iter().enumerate() {
        builder.push(slot, (last - earlier) as f64);
        last = earlier;
      }

      if entry.size > 0 {
        builder.push(size_slot, log_feature(entry.size as f64));
      } else {
        degenerate_sizes += 1;
        builder.push(size_slot, 0.0);
      }

      let available = cache.available();
      if available > 0 {
        builder.push(size_slot + 1, log_feature(available as f64));
      } else {
        if available < 0 {
          negative_capacity += 1;
        }
        builder.push(size_slot + 1, 0.0);
      }
      builder.push(size_slot + 2, entry.cost);
      builder.finish_row();

      cache.apply(entry.id, entry.size, entry.admit);

      seen.push_front(i);
      seen.truncate(self.hist_features);
    }

    if negative_capacity > 0 {
      tracing::warn!(
        window = window.number,
        requests = negative_capacity,
        "Simulated available capacity went negative"
      );
    }
    if degenerate_sizes > 0 {
      tracing::warn!(
        window = window.number,
        requests = degenerate_sizes,
        "Window holds zero-size requests"
      );
    }

    let matrix = builder
      .build(self.num_features())
      .map_err(Error::FeatureMatrix)?;
    Ok(FeatureSet {
      matrix,
      labels,
      negative_capacity,
      degenerate_sizes,
    })
  }
}
