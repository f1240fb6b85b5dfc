//! Compressed-sparse-row matrices, the input contract of the learner.

use crate::error::{Error, Result};

/// A row-major sparse matrix in standard CSR layout.
///
/// Entries that are not stored read as `0.0`.
#[derive(Debug, Clone, PartialEq)]
pub struct CsrMatrix {
  indptr: Vec<i32>,
  indices: Vec<i32>,
  data: Vec<f64>,
  num_cols: usize,
}

impl CsrMatrix {
  /// Builds a matrix from raw CSR triples, validating the layout.
  pub fn new(indptr: Vec<i32>, indices: Vec<i32>, data: Vec<f64>, num_cols: usize) -> Result<Self> {
    let first = match indptr.first() {
      Some(first) => *first,
      None => return Err(Error::InvalidMatrix("indptr must hold at least one offset".to_string())),
    };
    if first != 0 {
      return Err(Error::InvalidMatrix(format!(
        "indptr must start at 0, found {}",
        first
      )));
    }
    if indices.len() != data.len() {
      return Err(Error::InvalidMatrix(format!(
        "indices ({}) and data ({}) differ in length",
        indices.len(),
        data.len()
      )));
    }
    if let Some(pos) = indptr.windows(2).position(|w| w[1] < w[0]) {
      return Err(Error::InvalidMatrix(format!(
        "indptr decreases at row {}",
        pos
      )));
    }
    let last = indptr[indptr.len() - 1];
    if last as usize != data.len() || last < 0 {
      return Err(Error::InvalidMatrix(format!(
        "last indptr offset {} does not match {} stored values",
        last,
        data.len()
      )));
    }
    if let Some(bad) = indices
      .iter()
      .find(|&&col| col < 0 || col as usize >= num_cols)
    {
      return Err(Error::InvalidMatrix(format!(
        "column index {} is outside 0..{}",
        bad, num_cols
      )));
    }

    Ok(Self {
      indptr,
      indices,
      data,
      num_cols,
    })
  }

  pub fn num_rows(&self) -> usize {
    self.indptr.len() - 1
  }

  pub fn num_cols(&self) -> usize {
    self.num_cols
  }

  /// Number of stored (explicit) entries.
  pub fn nnz(&self) -> usize {
    self.data.len()
  }

  pub fn indptr(&self) -> &[i32] {
    &self.indptr
  }

  pub fn indices(&self) -> &[i32] {
    &self.indices
  }

  pub fn data(&self) -> &[f64] {
    &self.data
  }

  /// Iterates the stored `(column, value)` pairs of one row.
  pub fn row(&self, row: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
    let start = self.indptr[row] as usize;
    let end = self.indptr[row + 1] as usize;
    self.indices[start..end]
      .iter()
      .zip(&self.data[start..end])
      .map(|(&col, &value)| (col as usize, value))
  }

  /// Number of stored entries in one row.
  pub fn row_len(&self, row: usize) -> usize {
    (self.indptr[row + 1] - self.indptr[row]) as usize
  }

  /// Reads a single cell; absent entries are `0.0`.
  pub fn value(&self, row: usize, col: usize) -> f64 {
    self
      .row(row)
      .find(|&(c, _)| c == col)
      .map_or(0.0, |(_, value)| value)
  }

  /// Writes one row into a dense buffer of at least `num_cols` slots.
  pub(crate) fn fill_dense(&self, row: usize, buf: &mut [f64]) {
    buf.iter_mut().for_each(|slot| *slot = 0.0);
    for (col, value) in self.row(row) {
      buf[col] = value;
    }
  }
}

/// Builds a [`CsrMatrix`] one row at a time.
#[derive(Debug, Clone)]
pub struct CsrBuilder {
  indptr: Vec<i32>,
  indices: Vec<i32>,
  data: Vec<f64>,
  row_start: usize,
}

impl Default for CsrBuilder {
  fn default() -> Self {
    Self::new()
  }
}

impl CsrBuilder {
  pub fn new() -> Self {
    Self::with_capacity(0, 0)
  }

  /// Pre-sizes the builder for `rows` rows and `nnz` stored entries.
  pub fn with_capacity(rows: usize, nnz: usize) -> Self {
    let mut indptr = Vec::with_capacity(rows + 1);
    indptr.push(0);
    Self {
      indptr,
      indices: Vec::with_capacity(nnz),
      data: Vec::with_capacity(nnz),
      row_start: 0,
    }
  }

  /// Appends an entry to the row currently being built.
  pub fn push(&mut self, col: usize, value: f64) {
    self.indices.push(i32::try_from(col).unwrap_or(-1));
    self.data.push(value);
  }

  /// Closes the current row.
  pub fn finish_row(&mut self) {
    self.indptr.push(i32::try_from(self.data.len()).unwrap_or(-1));
    self.row_start = self.data.len();
  }

  /// Number of finished rows.
  pub fn num_rows(&self) -> usize {
    self.indptr.len() - 1
  }

  /// Validates and returns the finished matrix. Entries pushed after the last
  /// `finish_row` are discarded.
  pub fn build(mut self, num_cols: usize) -> Result<CsrMatrix> {
    self.indices.truncate(self.row_start);
    self.data.truncate(self.row_start);
    if self.indptr.iter().any(|&offset| offset < 0) {
      return Err(Error::InvalidMatrix(
        "too many stored entries for 32-bit row offsets".to_string(),
      ));
    }
    CsrMatrix::new(self.indptr, self.indices, self.data, num_cols)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn builder_produces_standard_layout() {
    let mut builder = CsrBuilder::new();
    builder.push(0, 1.5);
    builder.push(2, 3.0);
    builder.finish_row();
    builder.finish_row();
    builder.push(1, -2.0);
    builder.finish_row();

    let m = builder.build(3).unwrap();
    assert_eq!(m.indptr(), &[0, 2, 2, 3]);
    assert_eq!(m.indices(), &[0, 2, 1]);
    assert_eq!(m.num_rows(), 3);
    assert_eq!(m.value(0, 2), 3.0);
    assert_eq!(m.value(1, 0), 0.0);
    assert_eq!(m.value(2, 1), -2.0);
  }

  #[test]
  fn rejects_out_of_range_columns() {
    let err = CsrMatrix::new(vec![0, 1], vec![5], vec![1.0], 3).unwrap_err();
    assert!(matches!(err, Error::InvalidMatrix(_)));
  }

  #[test]
  fn rejects_decreasing_offsets() {
    let err = CsrMatrix::new(vec![0, 2, 1], vec![0, 1], vec![1.0, 1.0], 2).unwrap_err();
    assert!(matches!(err, Error::InvalidMatrix(_)));
  }

  #[test]
  fn unfinished_row_is_dropped() {
    let mut builder = CsrBuilder::new();
    builder.push(0, 1.0);
    builder.finish_row();
    builder.push(1, 9.0);
    let m = builder.build(2).unwrap();
    assert_eq!(m.num_rows(), 1);
    assert_eq!(m.nnz(), 1);
  }
}
