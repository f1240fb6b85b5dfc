//! Drives a trace through labeling, feature extraction and the learner,
//! window by window.

use crate::config::SimulationConfig;
use crate::error::{Error, Result};
use crate::features::{FeatureExtractor, FeatureSet};
use crate::learner::Learner;
use crate::metrics::Metrics;
use crate::opt::{OptLabeler, OptStats};
use crate::orchestrator::{ModelState, Orchestrator};
use crate::report::{ReportSink, RunHeader, RunSummary, StageTimings, WindowReport};
use crate::request::Request;
use crate::trace::{TraceReader, TraceStop};
use crate::window::{Window, WindowBuffer};

use chrono::{DateTime, Local};
use std::io::BufRead;
use std::time::{Duration, Instant};

/// A labeled window with its features, waiting for the learner.
#[derive(Debug)]
struct PreparedWindow {
  number: u64,
  opt: OptStats,
  features: FeatureSet,
  opt_time: Duration,
  features_time: Duration,
  started_at: DateTime<Local>,
  started: Instant,
}

/// Replays a trace against one evolving model.
///
/// With `pipeline_depth == 0` every window is finished before the next
/// request is read. Otherwise labeling and feature extraction stay on the
/// calling thread while a trainer thread owns the model, fed through a
/// bounded channel that preserves window order.
///
/// Counters are kept per run, so a simulator can replay several traces and
/// each [`RunSummary`] describes only its own run.
pub struct Simulator<L> {
  cache_size: u64,
  window_size: u64,
  cutoff: f64,
  pipeline_depth: usize,
  trace_name: String,
  labeler: OptLabeler,
  extractor: FeatureExtractor,
  orchestrator: Orchestrator<L>,
}

impl<L: Learner> Simulator<L> {
  pub fn new(config: &SimulationConfig, learner: L) -> Self {
    Self {
      cache_size: config.cache_size,
      window_size: config.window_size,
      cutoff: config.cutoff,
      pipeline_depth: config.pipeline_depth,
      trace_name: "trace".to_string(),
      labeler: OptLabeler::new(config.cache_size),
      extractor: FeatureExtractor::new(config.cache_size, config.hist_features),
      orchestrator: Orchestrator::new(
        learner,
        config.hyperparameters.clone(),
        config.refit_strategy,
        config.refit_iterations,
        config.cutoff,
      ),
    }
  }

  /// Name printed in the run header.
  pub fn with_trace_name(mut self, name: impl Into<String>) -> Self {
    self.trace_name = name.into();
    self
  }

  pub fn orchestrator(&self) -> &Orchestrator<L> {
    &self.orchestrator
  }

  /// Labels a closed window and derives its features.
  fn prepare(&self, mut window: Window, metrics: &Metrics) -> Result<PreparedWindow> {
    let started = Instant::now();
    let started_at = Local::now();

    let opt = self.labeler.label(&mut window);
    let opt_time = started.elapsed();
    Metrics::add(&metrics.windows_closed, 1);
    Metrics::add(&metrics.opt_admitted, opt.hits);
    if opt.zero_byte_window {
      tracing::warn!(window = window.number, "Window holds no bytes, reporting byte hit rate as 0");
      Metrics::add(&metrics.zero_byte_windows, 1);
    }
    tracing::debug!(
      window = window.number,
      hits = opt.hits,
      volume = opt.cumulative_volume,
      budget = opt.budget,
      "Labeled window"
    );

    let features_started = Instant::now();
    let features = self.extractor.extract(&window)?;
    let features_time = features_started.elapsed();
    Metrics::add(&metrics.negative_capacity, features.negative_capacity);
    Metrics::add(&metrics.degenerate_sizes, features.degenerate_sizes);
    tracing::debug!(
      window = window.number,
      rows = features.num_rows(),
      nnz = features.matrix.nnz(),
      "Derived features"
    );

    Ok(PreparedWindow {
      number: window.number,
      opt,
      features,
      opt_time,
      features_time,
      started_at,
      started,
    })
  }

  fn train(
    &self,
    state: ModelState<L::Model>,
    prepared: PreparedWindow,
    metrics: &Metrics,
  ) -> Result<(ModelState<L::Model>, WindowReport)> {
    let (state, outcome) = self.orchestrator.process_window(state, &prepared.features)?;
    metrics.add_learner_time(outcome.train_time);
    if outcome.error_rates.is_some() {
      Metrics::add(&metrics.windows_evaluated, 1);
    }

    let report = WindowReport {
      number: prepared.number,
      cache_size: self.cache_size,
      window_size: self.window_size,
      cutoff: self.cutoff,
      opt: prepared.opt,
      error_rates: outcome.error_rates,
      negative_capacity: prepared.features.negative_capacity,
      degenerate_sizes: prepared.features.degenerate_sizes,
      update: outcome.update,
      timings: StageTimings {
        opt: prepared.opt_time,
        features: prepared.features_time,
        check_error: outcome.check_time,
        train: outcome.train_time,
        total: prepared.started.elapsed(),
      },
      started_at: prepared.started_at,
      finished_at: Local::now(),
    };
    match &report.error_rates {
      Some(rates) => tracing::info!(
        window = report.number,
        hit_rate = report.opt.hit_rate,
        byte_hit_rate = report.opt.byte_hit_rate,
        fpr = rates.false_positive_rate,
        fnr = rates.false_negative_rate,
        "Processed window"
      ),
      None => tracing::info!(
        window = report.number,
        hit_rate = report.opt.hit_rate,
        byte_hit_rate = report.opt.byte_hit_rate,
        "Processed first window"
      ),
    }
    Ok((state, report))
  }
}

impl<L> Simulator<L>
where
  L: Learner + Sync,
{
  /// Runs every request through the pipeline and reports to `sink`.
  pub fn run<I, S>(&self, requests: I, sink: &mut S) -> Result<RunSummary>
  where
    I: IntoIterator<Item = Request>,
    S: ReportSink + Send,
  {
    let summary = self.run_windows(requests, sink)?;
    sink.on_finish(&summary)?;
    Ok(summary)
  }

  /// Like [`Simulator::run`], also reporting where a malformed trace stopped.
  pub fn run_trace<R, S>(&self, mut reader: TraceReader<R>, sink: &mut S) -> Result<RunSummary>
  where
    R: BufRead,
    S: ReportSink + Send,
  {
    let mut summary = self.run_windows(reader.by_ref(), sink)?;
    match reader.stop_reason() {
      Some(TraceStop::Malformed { line, .. }) => summary.malformed_at_line = Some(*line),
      Some(TraceStop::Io(e)) => tracing::warn!(error = %e, "Trace read failed, stopping ingestion"),
      _ => {}
    }
    sink.on_finish(&summary)?;
    Ok(summary)
  }

  fn run_windows<I, S>(&self, requests: I, sink: &mut S) -> Result<RunSummary>
  where
    I: IntoIterator<Item = Request>,
    S: ReportSink + Send,
  {
    let header = RunHeader {
      trace_name: self.trace_name.clone(),
      cache_size: self.cache_size,
      window_size: self.window_size,
      cutoff: self.cutoff,
      started_at: Local::now(),
    };
    sink.on_start(&header)?;
    tracing::info!(
      trace = %header.trace_name,
      cache_size = self.cache_size,
      window_size = self.window_size,
      cutoff = self.cutoff,
      pipeline_depth = self.pipeline_depth,
      "Starting simulation"
    );

    let metrics = Metrics::new();
    let mut buffer = WindowBuffer::new(self.window_size);
    if self.pipeline_depth == 0 {
      self.run_sequential(requests, &mut buffer, &metrics, sink)?;
    } else {
      self.run_pipelined(requests, &mut buffer, &metrics, sink)?;
    }

    if !buffer.is_empty() {
      tracing::warn!(
        requests = buffer.len(),
        "Trace ended inside a window, trailing requests are not labeled"
      );
      Metrics::add(&metrics.trailing_requests, buffer.len() as u64);
    }

    let metrics = metrics.snapshot();
    tracing::info!(metrics = ?metrics, "Simulation finished");
    Ok(RunSummary {
      windows: metrics.windows_closed,
      trailing_requests: metrics.trailing_requests,
      malformed_at_line: None,
      metrics,
    })
  }

  fn run_sequential<I, S>(
    &self,
    requests: I,
    buffer: &mut WindowBuffer,
    metrics: &Metrics,
    sink: &mut S,
  ) -> Result<()>
  where
    I: IntoIterator<Item = Request>,
    S: ReportSink,
  {
    let mut state = ModelState::Uninitialized;
    for request in requests {
      Metrics::add(&metrics.requests, 1);
      if buffer.ingest(&request) {
        let prepared = self.prepare(buffer.take(), metrics)?;
        let (next, report) = self.train(state, prepared, metrics)?;
        state = next;
        sink.on_window(&report)?;
      }
    }
    Ok(())
  }

  fn run_pipelined<I, S>(
    &self,
    requests: I,
    buffer: &mut WindowBuffer,
    metrics: &Metrics,
    sink: &mut S,
  ) -> Result<()>
  where
    I: IntoIterator<Item = Request>,
    S: ReportSink + Send,
  {
    std::thread::scope(|scope| -> Result<()> {
      let (tx, rx) = fibre::mpsc::bounded::<PreparedWindow>(self.pipeline_depth);

      let trainer = std::thread::Builder::new()
        .name("fibre-admission-trainer".to_string())
        .spawn_scoped(scope, move || -> Result<()> {
          let mut state = ModelState::Uninitialized;
          while let Ok(prepared) = rx.recv() {
            let (next, report) = self.train(state, prepared, metrics)?;
            state = next;
            sink.on_window(&report)?;
          }
          Ok(())
        })
        .map_err(|e| Error::Pipeline(format!("Failed to spawn trainer thread: {}", e)))?;

      let mut ingest_result = Ok(());
      for request in requests {
        Metrics::add(&metrics.requests, 1);
        if buffer.ingest(&request) {
          let prepared = match self.prepare(buffer.take(), metrics) {
            Ok(prepared) => prepared,
            Err(e) => {
              ingest_result = Err(e);
              break;
            }
          };
          if tx.send(prepared).is_err() {
            // The trainer stopped; its error is reported below.
            break;
          }
        }
      }
      drop(tx);

      let trained = trainer
        .join()
        .map_err(|_| Error::Pipeline("Trainer thread panicked".to_string()))?;
      trained.and(ingest_result)
    })
  }
}
