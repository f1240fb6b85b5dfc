//! Quantile bucketing of feature values into at most `max_bin` bins.

use crate::csr::CsrMatrix;

use rayon::prelude::*;

/// Maps raw values of one feature onto bin indices.
///
/// Bin `i` holds values `v` with `upper_bounds[i-1] < v <= upper_bounds[i]`;
/// the last bound is `+inf`.
#[derive(Debug, Clone)]
pub(crate) struct BinMapper {
  upper_bounds: Vec<f64>,
}

impl BinMapper {
  /// Builds bins from the stored values of one column plus `zero_count`
  /// implicit zeros.
  pub(crate) fn from_values(mut values: Vec<f64>, zero_count: usize, max_bin: usize) -> Self {
    values.retain(|v| !v.is_nan());
    values.sort_by(|a, b| a.total_cmp(b));
    let total = values.len() + zero_count;

    let mut distinct: Vec<(f64, usize)> = Vec::new();
    for v in values.iter().copied() {
      match distinct.last_mut() {
        Some((last, count)) if *last == v => *count += 1,
        _ => distinct.push((v, 1)),
      }
    }
    if zero_count > 0 {
      let pos = distinct.partition_point(|&(v, _)| v < 0.0);
      match distinct.get_mut(pos) {
        Some((v, count)) if *v == 0.0 => *count += zero_count,
        _ => distinct.insert(pos, (0.0, zero_count)),
      }
    }

    if distinct.len() <= 1 {
      return Self {
        upper_bounds: vec![f64::INFINITY],
      };
    }

    let mut upper_bounds = Vec::with_capacity(distinct.len().min(max_bin));
    if distinct.len() <= max_bin {
      for pair in distinct.windows(2) {
        upper_bounds.push(midpoint(pair[0].0, pair[1].0));
      }
    } else {
      let per_bin = total as f64 / max_bin as f64;
      let mut in_bin = 0usize;
      for i in 0..distinct.len() - 1 {
        in_bin += distinct[i].1;
        let bins_left = max_bin - upper_bounds.len() - 1;
        if in_bin as f64 >= per_bin && bins_left > 0 {
          upper_bounds.push(midpoint(distinct[i].0, distinct[i + 1].0));
          in_bin = 0;
        }
      }
    }
    upper_bounds.push(f64::INFINITY);
    Self { upper_bounds }
  }

  pub(crate) fn num_bins(&self) -> usize {
    self.upper_bounds.len()
  }

  pub(crate) fn bin_of(&self, value: f64) -> u8 {
    self.upper_bounds.partition_point(|&bound| bound < value) as u8
  }

  /// Raw threshold equivalent to "bin <= `bin`".
  pub(crate) fn upper_bound(&self, bin: u8) -> f64 {
    self.upper_bounds[bin as usize]
  }
}

fn midpoint(a: f64, b: f64) -> f64 {
  a + (b - a) / 2.0
}

/// A dense, feature-major matrix of bin indices built from a [`CsrMatrix`].
#[derive(Debug)]
pub(crate) struct BinnedMatrix {
  num_rows: usize,
  bins: Vec<u8>,
  mappers: Vec<BinMapper>,
}

impl BinnedMatrix {
  /// Buckets every column. Must be called inside the training thread pool.
  pub(crate) fn build(matrix: &CsrMatrix, max_bin: usize) -> Self {
    let num_rows = matrix.num_rows();
    let num_cols = matrix.num_cols();

    let mut columns: Vec<Vec<(u32, f64)>> = vec![Vec::new(); num_cols];
    for row in 0..num_rows {
      for (col, value) in matrix.row(row) {
        columns[col].push((row as u32, value));
      }
    }

    let per_feature: Vec<(BinMapper, Vec<u8>)> = columns
      .into_par_iter()
      .map(|column| {
        let values = column.iter().map(|&(_, v)| v).collect();
        let mapper = BinMapper::from_values(values, num_rows - column.len(), max_bin);
        let mut bins = vec![mapper.bin_of(0.0); num_rows];
        for (row, value) in column {
          bins[row as usize] = mapper.bin_of(value);
        }
        (mapper, bins)
      })
      .collect();

    let mut bins = Vec::with_capacity(num_rows * num_cols);
    let mut mappers = Vec::with_capacity(num_cols);
    for (mapper, column_bins) in per_feature {
      mappers.push(mapper);
      bins.extend(column_bins);
    }

    Self {
      num_rows,
      bins,
      mappers,
    }
  }

  pub(crate) fn num_features(&self) -> usize {
    self.mappers.len()
  }

  pub(crate) fn mapper(&self, feature: usize) -> &BinMapper {
    &self.mappers[feature]
  }

  pub(crate) fn column(&self, feature: usize) -> &[u8] {
    &self.bins[feature * self.num_rows..(feature + 1) * self.num_rows]
  }

  pub(crate) fn bin(&self, row: usize, feature: usize) -> u8 {
    self.bins[feature * self.num_rows + row]
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn few_distinct_values_get_one_bin_each() {
    let mapper = BinMapper::from_values(vec![1.0, 3.0, 3.0, 7.0], 2, 255);
    assert_eq!(mapper.num_bins(), 4);
    assert_eq!(mapper.bin_of(0.0), 0);
    assert_eq!(mapper.bin_of(1.0), 1);
    assert_eq!(mapper.bin_of(3.0), 2);
    assert_eq!(mapper.bin_of(7.0), 3);
    assert_eq!(mapper.bin_of(100.0), 3);
  }

  #[test]
  fn many_distinct_values_are_capped() {
    let values: Vec<f64> = (0..1000).map(f64::from).collect();
    let mapper = BinMapper::from_values(values, 0, 16);
    assert!(mapper.num_bins() <= 16);
    assert!(mapper.num_bins() > 8);
    for v in [0.0, 10.0, 500.0, 999.0] {
      let bin = mapper.bin_of(v);
      assert!(v <= mapper.upper_bound(bin));
    }
  }

  #[test]
  fn constant_column_has_single_bin() {
    let mapper = BinMapper::from_values(Vec::new(), 10, 255);
    assert_eq!(mapper.num_bins(), 1);
    assert_eq!(mapper.bin_of(42.0), 0);
  }
}
