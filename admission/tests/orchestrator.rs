mod common;

use common::{buffer_window, zipf_trace};
use fibre_admission::learner::{CsrMatrix, LeafAssignment};
use fibre_admission::{
  Error, FeatureExtractor, FeatureSet, Hyperparameters, Learner, LearnerStage, ModelState, ModelUpdate, OptLabeler,
  Orchestrator, RefitStrategy,
};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;

#[derive(Debug, Clone, PartialEq)]
struct MockModel {
  id: usize,
  trees: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq)]
enum Call {
  Fit { iterations: String },
  Predict { model: usize },
  PredictLeaf { model: usize },
  Merge { into: usize, other: usize },
  Refit { model: usize, trees: usize },
}

#[derive(Debug, thiserror::Error)]
#[error("mock learner failure")]
struct MockError;

#[derive(Default)]
struct MockLearner {
  calls: Mutex<Vec<Call>>,
  next_id: Mutex<usize>,
  fail_on: Option<LearnerStage>,
}

impl MockLearner {
  fn failing(stage: LearnerStage) -> Self {
    Self {
      fail_on: Some(stage),
      ..Self::default()
    }
  }

  fn calls(&self) -> Vec<Call> {
    self.calls.lock().clone()
  }

  fn check(&self, stage: LearnerStage) -> Result<(), MockError> {
    if self.fail_on == Some(stage) {
      Err(MockError)
    } else {
      Ok(())
    }
  }
}

impl Learner for MockLearner {
  type Model = MockModel;
  type Error = MockError;

  fn fit(&self, _m: &CsrMatrix, _l: &[f32], params: &Hyperparameters) -> Result<MockModel, MockError> {
    self.check(LearnerStage::Fit)?;
    let iterations = params.get("num_iterations").unwrap_or_default().to_string();
    self.calls.lock().push(Call::Fit {
      iterations: iterations.clone(),
    });
    let mut next = self.next_id.lock();
    *next += 1;
    let count: usize = iterations.parse().unwrap();
    Ok(MockModel {
      id: *next,
      trees: (0..count).map(|t| *next * 100 + t).collect(),
    })
  }

  fn predict(&self, model: &MockModel, m: &CsrMatrix, _p: &Hyperparameters) -> Result<Vec<f64>, MockError> {
    self.check(LearnerStage::Predict)?;
    self.calls.lock().push(Call::Predict { model: model.id });
    Ok(vec![1.0; m.num_rows()])
  }

  fn predict_leaf(&self, model: &MockModel, m: &CsrMatrix, _p: &Hyperparameters) -> Result<LeafAssignment, MockError> {
    self.check(LearnerStage::PredictLeaf)?;
    self.calls.lock().push(Call::PredictLeaf { model: model.id });
    Ok(LeafAssignment::new(m.num_rows(), model.trees.len(), vec![0; m.num_rows() * model.trees.len()]).unwrap())
  }

  fn merge(&self, mut model: MockModel, other: &MockModel) -> Result<MockModel, MockError> {
    self.check(LearnerStage::Merge)?;
    self.calls.lock().push(Call::Merge {
      into: model.id,
      other: other.id,
    });
    let mut trees = other.trees.clone();
    trees.append(&mut model.trees);
    model.trees = trees;
    Ok(model)
  }

  fn refit(
    &self,
    model: MockModel,
    leaves: &LeafAssignment,
    _m: &CsrMatrix,
    _l: &[f32],
  ) -> Result<MockModel, MockError> {
    self.check(LearnerStage::Refit)?;
    self.calls.lock().push(Call::Refit {
      model: model.id,
      trees: leaves.num_trees(),
    });
    Ok(model)
  }
}

fn window_features(seed: u64) -> FeatureSet {
  let trace = zipf_trace(200, 40, seed);
  let mut window = buffer_window(200, &trace);
  OptLabeler::new(1_000).label(&mut window);
  FeatureExtractor::new(1_000, 50).extract(&window).unwrap()
}

fn orchestrator(learner: MockLearner, strategy: RefitStrategy, refit_iterations: usize) -> Orchestrator<MockLearner> {
  let params = Hyperparameters::default().with("num_iterations", "3");
  Orchestrator::new(learner, params, strategy, refit_iterations, 0.5)
}

#[test]
fn first_window_only_fits() {
  let orch = orchestrator(MockLearner::default(), RefitStrategy::Refit, 0);
  let (state, outcome) = orch.process_window(ModelState::Uninitialized, &window_features(1)).unwrap();

  assert!(state.is_trained());
  assert_eq!(outcome.update, ModelUpdate::InitialFit);
  assert!(outcome.error_rates.is_none());
  assert_eq!(
    orch.learner().calls(),
    vec![Call::Fit {
      iterations: "3".to_string()
    }]
  );
}

#[test]
fn later_windows_evaluate_then_merge_and_refit() {
  let orch = orchestrator(MockLearner::default(), RefitStrategy::Refit, 0);
  let (state, _) = orch.process_window(ModelState::Uninitialized, &window_features(1)).unwrap();
  let (state, outcome) = orch.process_window(state, &window_features(2)).unwrap();

  assert_eq!(outcome.update, ModelUpdate::Refit);
  let rates = outcome.error_rates.unwrap();
  assert_eq!(rates.rows, 200);
  assert_eq!(rates.false_negatives, 0);

  assert_eq!(
    orch.learner().calls(),
    vec![
      Call::Fit {
        iterations: "3".to_string()
      },
      Call::Predict { model: 1 },
      Call::Fit {
        iterations: "0".to_string()
      },
      Call::PredictLeaf { model: 1 },
      Call::Merge { into: 2, other: 1 },
      Call::Refit { model: 2, trees: 3 },
    ]
  );
  // With no fresh rounds the merged model holds exactly the old trees.
  assert_eq!(state.model().unwrap().trees, vec![100, 101, 102]);
}

#[test]
fn fresh_rounds_follow_the_old_trees() {
  let orch = orchestrator(MockLearner::default(), RefitStrategy::Refit, 2);
  let (state, _) = orch.process_window(ModelState::Uninitialized, &window_features(1)).unwrap();
  let (state, _) = orch.process_window(state, &window_features(2)).unwrap();
  assert_eq!(state.model().unwrap().trees, vec![100, 101, 102, 200, 201]);
}

#[test]
fn retrain_replaces_the_model() {
  let orch = orchestrator(MockLearner::default(), RefitStrategy::Retrain, 0);
  let (state, _) = orch.process_window(ModelState::Uninitialized, &window_features(1)).unwrap();
  let (state, outcome) = orch.process_window(state, &window_features(2)).unwrap();

  assert_eq!(outcome.update, ModelUpdate::Retrain);
  assert!(outcome.error_rates.is_some());
  assert_eq!(state.model().unwrap().id, 2);
  assert_eq!(
    orch.learner().calls()[1..].to_vec(),
    vec![
      Call::Predict { model: 1 },
      Call::Fit {
        iterations: "3".to_string()
      },
    ]
  );
}

#[test]
fn learner_failures_are_fatal_and_name_the_stage() {
  let orch = orchestrator(MockLearner::failing(LearnerStage::Predict), RefitStrategy::Refit, 0);
  let (state, _) = orch.process_window(ModelState::Uninitialized, &window_features(1)).unwrap();
  let err = orch.process_window(state, &window_features(2)).unwrap_err();
  assert!(matches!(
    err,
    Error::Learner {
      stage: LearnerStage::Predict,
      ..
    }
  ));
}

#[test]
fn initial_fit_failure_is_reported() {
  let orch = orchestrator(MockLearner::failing(LearnerStage::Fit), RefitStrategy::Refit, 0);
  let err = orch
    .process_window(ModelState::Uninitialized, &window_features(1))
    .unwrap_err();
  assert!(matches!(err, Error::Learner { stage: LearnerStage::Fit, .. }));
  assert!(err.to_string().contains("fit"));
}
