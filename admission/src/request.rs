/// One record of an object-request trace.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Request {
  /// 1-based position in the trace; drives window boundaries.
  pub seq: u64,
  pub id: u64,
  pub size: u64,
  pub cost: f64,
}

impl Request {
  pub fn new(seq: u64, id: u64, size: u64, cost: f64) -> Self {
    Self { seq, id, size, cost }
  }
}
