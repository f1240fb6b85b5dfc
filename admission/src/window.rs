//! Buffering one window of requests and tracking in-window reuse.

use crate::request::Request;

use ahash::AHashMap;

/// Reuse bookkeeping for one buffered request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeEntry {
  /// Position of the request inside its window, `(seq - 1) % window_size`.
  pub index: u64,
  /// Reuse distance times size; `u64::MAX` until a later request reuses the key.
  pub volume: u64,
  pub has_future_reuse: bool,
}

impl VolumeEntry {
  fn new(index: u64) -> Self {
    Self {
      index,
      volume: u64::MAX,
      has_future_reuse: false,
    }
  }
}

/// The labeled view of one buffered request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceEntry {
  pub id: u64,
  pub size: u64,
  pub cost: f64,
  pub admit: bool,
}

/// A closed window, ready for labeling. `volumes` and `entries` are
/// index-aligned with arrival order.
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
  /// `seq / window_size` of the request that closed the window. A window
  /// taken before it closed continues the previous number.
  pub number: u64,
  /// Configured requests per window.
  pub window_size: u64,
  pub volumes: Vec<VolumeEntry>,
  pub entries: Vec<TraceEntry>,
  /// Sum of request sizes, saturating.
  pub byte_sum: u64,
}

impl Window {
  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Number of requests currently marked for admission.
  pub fn admitted(&self) -> usize {
    self.entries.iter().filter(|e| e.admit).count()
  }
}

/// Accumulates the requests of the current window.
///
/// Reuse is tracked per `(id, size)` pair: the same id reported with a
/// different size is a different object here.
#[derive(Debug)]
pub struct WindowBuffer {
  window_size: u64,
  next_number: u64,
  closing_seq: Option<u64>,
  volumes: Vec<VolumeEntry>,
  entries: Vec<TraceEntry>,
  last_seen: AHashMap<(u64, u64), usize>,
  byte_sum: u64,
}

impl WindowBuffer {
  /// # Panics
  ///
  /// Panics if `window_size` is zero.
  pub fn new(window_size: u64) -> Self {
    assert!(window_size > 0, "window_size must be positive");
    let capacity = usize::try_from(window_size).unwrap_or(usize::MAX).min(1 << 20);
    Self {
      window_size,
      next_number: 1,
      closing_seq: None,
      volumes: Vec::with_capacity(capacity),
      entries: Vec::with_capacity(capacity),
      last_seen: AHashMap::with_capacity(capacity),
      byte_sum: 0,
    }
  }

  pub fn window_size(&self) -> u64 {
    self.window_size
  }

  /// Buffered requests of the open window.
  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn byte_sum(&self) -> u64 {
    self.byte_sum
  }

  /// Buffers `request` and returns `true` if its sequence number closes the
  /// window.
  pub fn ingest(&mut self, request: &Request) -> bool {
    let idx = request.seq.saturating_sub(1) % self.window_size;
    let key = (request.id, request.size);
    let position = self.entries.len();

    if let Some(&previous) = self.last_seen.get(&key) {
      if request.size > 0 {
        let earlier = &mut self.volumes[previous];
        earlier.volume = idx.saturating_sub(earlier.index).saturating_mul(request.size);
        earlier.has_future_reuse = true;
      }
    }
    self.last_seen.insert(key, position);

    self.volumes.push(VolumeEntry::new(idx));
    self.entries.push(TraceEntry {
      id: request.id,
      size: request.size,
      cost: request.cost,
      admit: false,
    });
    self.byte_sum = self.byte_sum.saturating_add(request.size);

    let closes = request.seq != 0 && request.seq % self.window_size == 0;
    if closes {
      self.closing_seq = Some(request.seq);
    }
    closes
  }

  /// Hands out the buffered window and resets all per-window state.
  pub fn take(&mut self) -> Window {
    let number = match self.closing_seq.take() {
      Some(seq) => seq / self.window_size,
      None => self.next_number,
    };
    self.next_number = number.saturating_add(1);
    self.last_seen.clear();
    Window {
      number,
      window_size: self.window_size,
      volumes: std::mem::take(&mut self.volumes),
      entries: std::mem::take(&mut self.entries),
      byte_sum: std::mem::replace(&mut self.byte_sum, 0),
    }
  }
}
