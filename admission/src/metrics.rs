use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crossbeam_utils::CachePadded;
use serde::Serialize;

/// Run-wide counters. All fields are atomic so the ingest and trainer
/// threads of a pipelined run can update them without locking.
#[derive(Debug)]
pub struct Metrics {
  // --- Ingestion ---
  pub(crate) requests: CachePadded<AtomicU64>,
  pub(crate) trailing_requests: CachePadded<AtomicU64>,

  // --- Windows ---
  pub(crate) windows_closed: CachePadded<AtomicU64>,
  pub(crate) windows_evaluated: CachePadded<AtomicU64>,
  pub(crate) opt_admitted: CachePadded<AtomicU64>,

  // --- Anomalies ---
  pub(crate) negative_capacity: CachePadded<AtomicU64>,
  pub(crate) zero_byte_windows: CachePadded<AtomicU64>,
  pub(crate) degenerate_sizes: CachePadded<AtomicU64>,

  // --- Time spent in learner calls ---
  pub(crate) learner_millis: CachePadded<AtomicU64>,

  created_at: Instant,
}

impl Default for Metrics {
  fn default() -> Self {
    Self {
      requests: CachePadded::new(AtomicU64::new(0)),
      trailing_requests: CachePadded::new(AtomicU64::new(0)),
      windows_closed: CachePadded::new(AtomicU64::new(0)),
      windows_evaluated: CachePadded::new(AtomicU64::new(0)),
      opt_admitted: CachePadded::new(AtomicU64::new(0)),
      negative_capacity: CachePadded::new(AtomicU64::new(0)),
      zero_byte_windows: CachePadded::new(AtomicU64::new(0)),
      degenerate_sizes: CachePadded::new(AtomicU64::new(0)),
      learner_millis: CachePadded::new(AtomicU64::new(0)),
      created_at: Instant::now(),
    }
  }
}

impl Metrics {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  pub(crate) fn add(counter: &AtomicU64, value: u64) {
    counter.fetch_add(value, Ordering::Relaxed);
  }

  pub(crate) fn add_learner_time(&self, elapsed: Duration) {
    Self::add(&self.learner_millis, elapsed.as_millis() as u64);
  }

  /// Creates a point-in-time snapshot of the counters.
  pub fn snapshot(&self) -> MetricsSnapshot {
    MetricsSnapshot {
      requests: self.requests.load(Ordering::Relaxed),
      trailing_requests: self.trailing_requests.load(Ordering::Relaxed),
      windows_closed: self.windows_closed.load(Ordering::Relaxed),
      windows_evaluated: self.windows_evaluated.load(Ordering::Relaxed),
      opt_admitted: self.opt_admitted.load(Ordering::Relaxed),
      negative_capacity: self.negative_capacity.load(Ordering::Relaxed),
      zero_byte_windows: self.zero_byte_windows.load(Ordering::Relaxed),
      degenerate_sizes: self.degenerate_sizes.load(Ordering::Relaxed),
      learner_millis: self.learner_millis.load(Ordering::Relaxed),
      uptime_secs: self.created_at.elapsed().as_secs(),
    }
  }
}

/// A point-in-time, public-facing snapshot of the run's counters.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
  /// Requests read from the trace.
  pub requests: u64,
  /// Requests of the final, never-closed window (not labeled).
  pub trailing_requests: u64,
  /// Windows that closed and were labeled.
  pub windows_closed: u64,
  /// Windows whose labels were compared against a previous model.
  pub windows_evaluated: u64,
  /// Requests the offline optimum admitted, over all windows.
  pub opt_admitted: u64,
  /// Requests that observed negative simulated available capacity.
  pub negative_capacity: u64,
  /// Windows whose request bytes summed to zero.
  pub zero_byte_windows: u64,
  /// Requests with a zero size.
  pub degenerate_sizes: u64,
  /// Milliseconds spent in learner fit/predict/refit calls.
  pub learner_millis: u64,
  /// Seconds since the run started.
  pub uptime_secs: u64,
}

impl fmt::Debug for MetricsSnapshot {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MetricsSnapshot")
      .field("requests", &self.requests)
      .field("trailing_requests", &self.trailing_requests)
      .field("windows_closed", &self.windows_closed)
      .field("windows_evaluated", &self.windows_evaluated)
      .field("opt_admitted", &self.opt_admitted)
      .field("negative_capacity", &self.negative_capacity)
      .field("zero_byte_windows", &self.zero_byte_windows)
      .field("degenerate_sizes", &self.degenerate_sizes)
      .field("learner_time", &format!("{}ms", self.learner_millis))
      .field("uptime_secs", &self.uptime_secs)
      .finish()
  }
}
