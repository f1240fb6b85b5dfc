//! A compact gradient-boosted decision tree learner for binary classification.
//!
//! # Features
//! - **Sparse input**: Trains and predicts on CSR matrices; absent entries read as zero.
//! - **Leaf-wise growth**: Histogram-based, best-gain-first trees bounded by `num_leaves`.
//! - **Online adaptation**: Leaf prediction, ensemble merging, and structure-preserving
//!   refit so a trained model can track new data without regrowing its trees.
//! - **Parallel**: Binning, split search and prediction fan out over a `rayon` pool
//!   sized by `num_threads`.

pub mod booster;
pub mod csr;
pub mod error;
pub mod params;
pub mod tree;

// Internal, crate-only modules
mod binning;

pub use booster::{Booster, LeafAssignment};
pub use csr::{CsrBuilder, CsrMatrix};
pub use error::{Error, Result};
pub use params::BoosterParams;
pub use tree::Tree;
