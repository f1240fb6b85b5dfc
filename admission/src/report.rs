//! Result streams: the per-window text layout, JSON lines, and an in-memory
//! collector.

use crate::evaluator::ErrorRates;
use crate::metrics::MetricsSnapshot;
use crate::opt::OptStats;
use crate::orchestrator::ModelUpdate;

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use serde::{Serialize, Serializer};
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

/// `ctime`-style timestamp layout.
const TIMESTAMP_FORMAT: &str = "%a %b %e %H:%M:%S %Y";

fn as_millis<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
  serializer.serialize_u64(value.as_millis() as u64)
}

fn as_opt_millis<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
  match value {
    Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
    None => serializer.serialize_none(),
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunHeader {
  pub trace_name: String,
  pub cache_size: u64,
  pub window_size: u64,
  pub cutoff: f64,
  pub started_at: DateTime<Local>,
}

/// Wall-clock time spent in each stage of a window, serialized in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StageTimings {
  #[serde(rename = "opt_ms", serialize_with = "as_millis")]
  pub opt: Duration,
  #[serde(rename = "features_ms", serialize_with = "as_millis")]
  pub features: Duration,
  #[serde(rename = "check_error_ms", serialize_with = "as_opt_millis")]
  pub check_error: Option<Duration>,
  #[serde(rename = "train_ms", serialize_with = "as_millis")]
  pub train: Duration,
  #[serde(rename = "total_ms", serialize_with = "as_millis")]
  pub total: Duration,
}

#[derive(Debug, Clone, Serialize)]
pub struct WindowReport {
  pub number: u64,
  pub cache_size: u64,
  pub window_size: u64,
  pub cutoff: f64,
  pub opt: OptStats,
  pub error_rates: Option<ErrorRates>,
  pub negative_capacity: u64,
  pub degenerate_sizes: u64,
  pub update: ModelUpdate,
  pub timings: StageTimings,
  pub started_at: DateTime<Local>,
  pub finished_at: DateTime<Local>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
  pub windows: u64,
  /// Requests of the unfinished last window, never labeled.
  pub trailing_requests: u64,
  /// Set when ingestion stopped at a bad record.
  pub malformed_at_line: Option<usize>,
  pub metrics: MetricsSnapshot,
}

/// Receives a run's results as they are produced.
pub trait ReportSink {
  fn on_start(&mut self, header: &RunHeader) -> io::Result<()>;
  fn on_window(&mut self, report: &WindowReport) -> io::Result<()>;
  fn on_finish(&mut self, summary: &RunSummary) -> io::Result<()>;
}

impl<S: ReportSink + ?Sized> ReportSink for Box<S> {
  fn on_start(&mut self, header: &RunHeader) -> io::Result<()> {
    (**self).on_start(header)
  }

  fn on_window(&mut self, report: &WindowReport) -> io::Result<()> {
    (**self).on_window(report)
  }

  fn on_finish(&mut self, summary: &RunSummary) -> io::Result<()> {
    (**self).on_finish(summary)
  }
}

/// The plain-text result layout, one block per window.
pub struct TextReport<W> {
  out: W,
}

impl<W: Write> TextReport<W> {
  pub fn new(out: W) -> Self {
    Self { out }
  }

  pub fn into_inner(self) -> W {
    self.out
  }
}

impl<W: Write> ReportSink for TextReport<W> {
  fn on_start(&mut self, header: &RunHeader) -> io::Result<()> {
    writeln!(self.out, "Start: {}", header.started_at.format(TIMESTAMP_FORMAT))?;
    writeln!(
      self.out,
      "{} {} {} {}",
      header.trace_name, header.cache_size, header.window_size, header.cutoff
    )?;
    writeln!(self.out)
  }

  fn on_window(&mut self, r: &WindowReport) -> io::Result<()> {
    let out = &mut self.out;
    writeln!(
      out,
      "Start processing window {}: {}",
      r.number,
      r.started_at.format(TIMESTAMP_FORMAT)
    )?;
    writeln!(
      out,
      "{} {} {} {}",
      r.cache_size, r.window_size, r.opt.hit_rate, r.opt.byte_hit_rate
    )?;
    writeln!(out, "Calculate OPT: {} ms", r.timings.opt.as_millis())?;
    if r.negative_capacity > 0 {
      writeln!(out, "Negative cache size: {}", r.negative_capacity)?;
    }
    writeln!(out, "Derive features: {} ms", r.timings.features.as_millis())?;
    if let Some(rates) = &r.error_rates {
      writeln!(
        out,
        "{} {} {} {} {}",
        r.cache_size, r.window_size, r.cutoff, rates.false_positive_rate, rates.false_negative_rate
      )?;
      let check = r.timings.check_error.unwrap_or_default();
      writeln!(out, "Check error: {} ms", check.as_millis())?;
    }
    match r.update {
      ModelUpdate::InitialFit => {}
      ModelUpdate::Refit => writeln!(out, "Refit existing booster")?,
      ModelUpdate::Retrain => writeln!(out, "Train a new booster")?,
    }
    writeln!(out, "Train model: {} ms", r.timings.train.as_millis())?;
    writeln!(
      out,
      "Finish processing window {}: {}",
      r.number,
      r.finished_at.format(TIMESTAMP_FORMAT)
    )?;
    writeln!(out, "Process window: {} ms", r.timings.total.as_millis())?;
    writeln!(out)
  }

  fn on_finish(&mut self, _summary: &RunSummary) -> io::Result<()> {
    self.out.flush()
  }
}

/// One JSON object per line: a header, every window, then the summary.
pub struct JsonLinesReport<W> {
  out: W,
}

#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum JsonEvent<'a> {
  Start(&'a RunHeader),
  Window(&'a WindowReport),
  Finish(&'a RunSummary),
}

impl<W: Write> JsonLinesReport<W> {
  pub fn new(out: W) -> Self {
    Self { out }
  }

  pub fn into_inner(self) -> W {
    self.out
  }

  fn write_event(&mut self, event: JsonEvent<'_>) -> io::Result<()> {
    serde_json::to_writer(&mut self.out, &event).map_err(io::Error::from)?;
    self.out.write_all(b"\n")
  }
}

impl<W: Write> ReportSink for JsonLinesReport<W> {
  fn on_start(&mut self, header: &RunHeader) -> io::Result<()> {
    self.write_event(JsonEvent::Start(header))
  }

  fn on_window(&mut self, report: &WindowReport) -> io::Result<()> {
    self.write_event(JsonEvent::Window(report))
  }

  fn on_finish(&mut self, summary: &RunSummary) -> io::Result<()> {
    self.write_event(JsonEvent::Finish(summary))?;
    self.out.flush()
  }
}

#[derive(Debug, Default)]
struct Collected {
  header: Option<RunHeader>,
  windows: Vec<WindowReport>,
  summary: Option<RunSummary>,
}

/// A clonable sink that keeps every report in memory.
#[derive(Debug, Clone, Default)]
pub struct Collector {
  inner: Arc<Mutex<Collected>>,
}

impl Collector {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn header(&self) -> Option<RunHeader> {
    self.inner.lock().header.clone()
  }

  pub fn windows(&self) -> Vec<WindowReport> {
    self.inner.lock().windows.clone()
  }

  pub fn summary(&self) -> Option<RunSummary> {
    self.inner.lock().summary.clone()
  }
}

impl ReportSink for Collector {
  fn on_start(&mut self, header: &RunHeader) -> io::Result<()> {
    self.inner.lock().header = Some(header.clone());
    Ok(())
  }

  fn on_window(&mut self, report: &WindowReport) -> io::Result<()> {
    self.inner.lock().windows.push(report.clone());
    Ok(())
  }

  fn on_finish(&mut self, summary: &RunSummary) -> io::Result<()> {
    self.inner.lock().summary = Some(summary.clone());
    Ok(())
  }
}
