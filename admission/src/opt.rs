//! Size-weighted offline-optimal admission labels.
//!
//! Every request whose object is reused later in the window has a volume:
//! reuse distance times size, the cache space it would hold until its next
//! hit. Admitting the cheapest volumes first until the window's budget of
//! `cache_size * window_size` is spent gives the greedy optimum for
//! variable-size objects.

use crate::window::{VolumeEntry, Window};

use serde::Serialize;

/// Outcome of labeling one window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OptStats {
  pub hits: u64,
  pub byte_hits: u64,
  /// `hits / window_size`.
  pub hit_rate: f64,
  /// `byte_hits / byte_sum`, or 0 when the window holds no bytes.
  pub byte_hit_rate: f64,
  /// Volume spent by the admitted entries.
  pub cumulative_volume: u64,
  pub budget: u64,
  pub zero_byte_window: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct OptLabeler {
  cache_size: u64,
}

impl OptLabeler {
  pub fn new(cache_size: u64) -> Self {
    Self { cache_size }
  }

  pub fn cache_size(&self) -> u64 {
    self.cache_size
  }

  /// Volume budget for a window of `window_size` requests.
  pub fn budget(&self, window_size: u64) -> u64 {
    self.cache_size.saturating_mul(window_size)
  }

  /// Writes the `admit` flag of every entry and returns the window's stats.
  ///
  /// Flags are cleared first, so labeling the same window twice yields the
  /// same result.
  pub fn label(&self, window: &mut Window) -> OptStats {
    let budget = self.budget(window.window_size);
    window.entries.iter_mut().for_each(|e| e.admit = false);

    let mut hits = 0u64;
    let mut byte_hits = 0u64;
    let mut cumulative = 0u64;
    for pos in volume_order(&window.volumes) {
      if cumulative > budget {
        break;
      }
      let volume = &window.volumes[pos];
      if volume.has_future_reuse {
        let entry = &mut window.entries[pos];
        entry.admit = true;
        hits += 1;
        byte_hits = byte_hits.saturating_add(entry.size);
        cumulative = cumulative.saturating_add(volume.volume);
      }
    }

    let zero_byte_window = window.byte_sum == 0;
    let byte_hit_rate = if zero_byte_window {
      0.0
    } else {
      byte_hits as f64 / window.byte_sum as f64
    };
    OptStats {
      hits,
      byte_hits,
      hit_rate: hits as f64 / window.window_size as f64,
      byte_hit_rate,
      cumulative_volume: cumulative,
      budget,
      zero_byte_window,
    }
  }
}

/// Positions of `volumes` in ascending volume order. Ties keep arrival order.
pub fn volume_order(volumes: &[VolumeEntry]) -> Vec<usize> {
  let mut order: Vec<usize> = (0..volumes.len()).collect();
  order.sort_by_key(|&pos| volumes[pos].volume);
  order
}
