#![allow(dead_code)]

use fibre_admission::{Hyperparameters, Request, SimulationConfig, Window, WindowBuffer};

use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Zipf};
use rand_pcg::Pcg64;

/// Requests with consecutive sequence numbers from 1 and unit cost.
pub fn requests(objects: &[(u64, u64)]) -> Vec<Request> {
  objects
    .iter()
    .enumerate()
    .map(|(i, &(id, size))| Request::new(i as u64 + 1, id, size, 1.0))
    .collect()
}

/// Buffers `requests` and returns the window, closed or not.
pub fn buffer_window(window_size: u64, requests: &[Request]) -> Window {
  let mut buffer = WindowBuffer::new(window_size);
  for request in requests {
    buffer.ingest(request);
  }
  buffer.take()
}

/// A skewed trace over `objects` ids. Each id keeps one size.
pub fn zipf_trace(len: usize, objects: u64, seed: u64) -> Vec<Request> {
  let mut rng = Pcg64::seed_from_u64(seed);
  let sizes: Vec<u64> = (0..objects).map(|_| rng.random_range(1..=1000)).collect();
  let zipf = Zipf::new(objects as f64, 0.9).unwrap();
  (0..len)
    .map(|i| {
      let id = zipf.sample(&mut rng) as u64 - 1;
      let cost = rng.random_range(0.0..10.0);
      Request::new(i as u64 + 1, id, sizes[id as usize], cost)
    })
    .collect()
}

/// Learner settings small enough for windows of a few hundred rows.
pub fn small_hyperparameters() -> Hyperparameters {
  Hyperparameters::default()
    .with("num_iterations", "5")
    .with("min_data_in_leaf", "5")
    .with("min_sum_hessian_in_leaf", "0.01")
    .with("num_leaves", "8")
    .with("num_threads", "2")
}

pub fn small_config(cache_size: u64, window_size: u64) -> SimulationConfig {
  let mut config = SimulationConfig::new(cache_size, window_size, 0.5).unwrap();
  config.hyperparameters = small_hyperparameters();
  config
}
