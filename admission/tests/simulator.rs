mod common;

use common::{small_config, zipf_trace};
use fibre_admission::{
  Collector, GbdtLearner, JsonLinesReport, LearnerStage, ModelUpdate, Simulator, TextReport, WindowReport,
};
use pretty_assertions::assert_eq;

fn outcomes(windows: &[WindowReport]) -> Vec<(u64, u64, Option<(usize, usize)>, ModelUpdate)> {
  windows
    .iter()
    .map(|w| {
      (
        w.number,
        w.opt.hits,
        w.error_rates.map(|r| (r.false_positives, r.false_negatives)),
        w.update,
      )
    })
    .collect()
}

#[test]
fn reports_every_closed_window() {
  let trace = zipf_trace(1_000, 120, 21);
  let config = small_config(5_000, 300);
  let simulator = Simulator::new(&config, GbdtLearner::new()).with_trace_name("zipf");
  let mut collector = Collector::new();
  let summary = simulator.run(trace, &mut collector).unwrap();

  let windows = collector.windows();
  assert_eq!(windows.len(), 3);
  assert_eq!(summary.windows, 3);
  assert_eq!(summary.trailing_requests, 100);
  assert_eq!(summary.metrics.requests, 1_000);
  assert_eq!(summary.metrics.windows_evaluated, 2);

  assert_eq!(windows[0].update, ModelUpdate::InitialFit);
  assert!(windows[0].error_rates.is_none());
  for window in &windows[1..] {
    assert_eq!(window.update, ModelUpdate::Refit);
    let rates = window.error_rates.unwrap();
    assert_eq!(rates.rows, 300);
    assert!(rates.false_positive_rate + rates.false_negative_rate <= 1.0);
  }
  assert_eq!(collector.header().unwrap().trace_name, "zipf");
  assert!(collector.summary().is_some());
}

#[test]
fn pipelined_run_matches_sequential_run() {
  let trace = zipf_trace(1_200, 150, 4);

  let sequential = Collector::new();
  let config = small_config(8_000, 300);
  Simulator::new(&config, GbdtLearner::new())
    .run(trace.clone(), &mut sequential.clone())
    .unwrap();

  let pipelined = Collector::new();
  let mut config = small_config(8_000, 300);
  config.pipeline_depth = 2;
  Simulator::new(&config, GbdtLearner::new())
    .run(trace, &mut pipelined.clone())
    .unwrap();

  assert_eq!(outcomes(&sequential.windows()), outcomes(&pipelined.windows()));
  assert_eq!(pipelined.windows().len(), 4);
}

#[test]
fn short_trace_closes_no_window() {
  let trace = zipf_trace(50, 10, 2);
  let config = small_config(1_000, 100);
  let mut collector = Collector::new();
  let summary = Simulator::new(&config, GbdtLearner::new())
    .run(trace, &mut collector)
    .unwrap();
  assert!(collector.windows().is_empty());
  assert_eq!(summary.trailing_requests, 50);
}

#[test]
fn invalid_hyperparameters_fail_the_first_window() {
  let trace = zipf_trace(200, 20, 2);
  let mut config = small_config(1_000, 100);
  config.hyperparameters.set("objective", "regression");
  let mut collector = Collector::new();
  let err = Simulator::new(&config, GbdtLearner::new())
    .run(trace, &mut collector)
    .unwrap_err();
  assert!(matches!(err, fibre_admission::Error::Learner { .. }));
}

#[test]
fn learner_failure_on_the_trainer_thread_is_returned() {
  let trace = zipf_trace(400, 20, 2);
  let mut config = small_config(1_000, 100);
  config.pipeline_depth = 1;
  config.hyperparameters.set("objective", "regression");
  let collector = Collector::new();
  let err = Simulator::new(&config, GbdtLearner::new())
    .run(trace, &mut collector.clone())
    .unwrap_err();
  assert!(matches!(
    err,
    fibre_admission::Error::Learner {
      stage: LearnerStage::Fit,
      ..
    }
  ));
  assert!(collector.windows().is_empty());
}

#[test]
fn repeated_runs_report_only_their_own_totals() {
  let trace = zipf_trace(1_000, 120, 21);
  let config = small_config(5_000, 300);
  let simulator = Simulator::new(&config, GbdtLearner::new());

  let first = simulator.run(trace.clone(), &mut Collector::new()).unwrap();
  let second = simulator.run(trace, &mut Collector::new()).unwrap();

  assert_eq!(first.windows, 3);
  assert_eq!(second.windows, first.windows);
  assert_eq!(second.trailing_requests, first.trailing_requests);
  assert_eq!(second.metrics.requests, 1_000);
  assert_eq!(second.metrics.windows_evaluated, first.metrics.windows_evaluated);
}

#[test]
fn text_report_uses_the_result_file_layout() {
  let trace = zipf_trace(400, 60, 8);
  let config = small_config(2_000, 200);
  let mut report = TextReport::new(Vec::new());
  Simulator::new(&config, GbdtLearner::new())
    .with_trace_name("t.tr")
    .run(trace, &mut report)
    .unwrap();
  let text = String::from_utf8(report.into_inner()).unwrap();

  assert!(text.starts_with("Start: "));
  assert!(text.contains("t.tr 2000 200 0.5\n"));
  assert!(text.contains("Start processing window 1: "));
  assert!(text.contains("Calculate OPT: "));
  assert!(text.contains("Derive features: "));
  assert!(text.contains("Check error: "));
  assert!(text.contains("Refit existing booster\n"));
  assert!(text.contains("Finish processing window 2: "));
  assert_eq!(text.matches("Train model: ").count(), 2);
  assert_eq!(text.matches("Process window: ").count(), 2);
  assert!(text
    .lines()
    .any(|line| line.starts_with("2000 200 0.5 ") && line.split(' ').count() == 5));
}

#[test]
fn json_report_emits_one_object_per_event() {
  let trace = zipf_trace(400, 60, 8);
  let config = small_config(2_000, 200);
  let mut report = JsonLinesReport::new(Vec::new());
  Simulator::new(&config, GbdtLearner::new())
    .run(trace, &mut report)
    .unwrap();
  let text = String::from_utf8(report.into_inner()).unwrap();

  let events: Vec<serde_json::Value> = text
    .lines()
    .map(|line| serde_json::from_str(line).unwrap())
    .collect();
  let kinds: Vec<&str> = events.iter().map(|e| e["event"].as_str().unwrap()).collect();
  assert_eq!(kinds, vec!["start", "window", "window", "finish"]);
  assert_eq!(events[1]["number"], 1);
  assert!(events[1]["error_rates"].is_null());
  assert_eq!(events[2]["update"], "refit");
  assert!(events[2]["timings"]["train_ms"].is_u64());
}
