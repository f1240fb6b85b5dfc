//! Offline evaluation of a learned cache-admission policy.
//!
//! A trace of `(seq, id, size, cost)` requests is cut into fixed-size
//! windows. Each closed window is labeled with the size-weighted offline
//! optimum, turned into a sparse feature matrix, and used to score and then
//! update a single gradient-boosted model that evolves across the whole run.
//!
//! # Pipeline
//! - [`WindowBuffer`] tracks in-window reuse and per-request volumes.
//! - [`OptLabeler`] admits the cheapest volumes under `cache_size * window_size`.
//! - [`FeatureExtractor`] replays the window against a simulated cache.
//! - [`Orchestrator`] fits the first model and refits it on every later window.
//! - [`Simulator`] ties the stages together, optionally overlapping feature
//!   extraction with training on a dedicated thread.

pub mod config;
pub mod error;
pub mod evaluator;
pub mod features;
pub mod learner;
pub mod logging;
pub mod metrics;
pub mod opt;
pub mod orchestrator;
pub mod report;
pub mod request;
pub mod simulator;
pub mod trace;
pub mod window;

pub use config::SimulationConfig;
pub use error::{Error, Result};
pub use evaluator::{evaluate, ErrorRates};
pub use features::{FeatureExtractor, FeatureSet, SimulatedCache, DEFAULT_HIST_FEATURES};
pub use learner::{GbdtLearner, Hyperparameters, Learner, LearnerStage};
pub use metrics::MetricsSnapshot;
pub use opt::{OptLabeler, OptStats};
pub use orchestrator::{ModelState, ModelUpdate, Orchestrator, RefitStrategy, WindowOutcome};
pub use report::{Collector, JsonLinesReport, ReportSink, RunSummary, TextReport, WindowReport};
pub use request::Request;
pub use simulator::Simulator;
pub use trace::{TraceReader, TraceStop};
pub use window::{TraceEntry, VolumeEntry, Window, WindowBuffer};
