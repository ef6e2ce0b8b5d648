//! Side-by-side comparison of the estimator families

use log::info;
use serde::Serialize;

use crate::error::Result;

use super::dataset::TrainingData;
use super::metrics::{accuracy, f1_score};
use super::{Classifier, EstimatorKind, ModelSpec, TrainedModel};

/// Held-out scores of one candidate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelResult {
    pub name: String,
    pub accuracy: f64,
    pub f1_score: f64,
}

/// Trains each candidate and keeps the most accurate
#[derive(Debug, Clone)]
pub struct ModelSelector {
    candidates: Vec<ModelSpec>,
    seed: u64,
    results: Vec<ModelResult>,
    best: Option<(usize, TrainedModel)>,
}

impl Default for ModelSelector {
    fn default() -> Self {
        Self::new(
            EstimatorKind::ALL
                .into_iter()
                .map(ModelSpec::with_defaults)
                .collect(),
        )
    }
}

impl ModelSelector {
    #[must_use]
    pub fn new(candidates: Vec<ModelSpec>) -> Self {
        Self {
            candidates,
            seed: 42,
            results: Vec::new(),
            best: None,
        }
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Fit every candidate on `train` and score it on `test`
    ///
    /// The first candidate with the highest accuracy becomes the best model.
    pub fn train_models(&mut self, train: &TrainingData, test: &TrainingData) -> Result<()> {
        self.results.clear();
        self.best = None;
        let mut best_score = f64::NEG_INFINITY;

        for spec in &self.candidates {
            let name = spec.kind.to_string();
            info!("Training {name} model");

            let model = spec.fit(train, self.seed)?;
            let predicted = model.predict_all(test.rows());
            let result = ModelResult {
                name,
                accuracy: accuracy(test.labels(), &predicted),
                f1_score: f1_score(test.labels(), &predicted),
            };

            if result.accuracy > best_score {
                best_score = result.accuracy;
                self.best = Some((self.results.len(), model));
            }
            self.results.push(result);
        }

        if let Some(name) = self.best_model_name() {
            info!("Finished training, best model is {name}");
        }
        Ok(())
    }

    /// Scores in candidate order
    #[must_use]
    pub fn results(&self) -> &[ModelResult] {
        &self.results
    }

    #[must_use]
    pub fn best_model(&self) -> Option<&TrainedModel> {
        self.best.as_ref().map(|(_, model)| model)
    }

    #[must_use]
    pub fn best_model_name(&self) -> Option<&str> {
        self.best
            .as_ref()
            .map(|(idx, _)| self.results[*idx].name.as_str())
    }

    /// Log accuracy and F1 of every candidate
    pub fn log_results(&self) {
        for result in &self.results {
            info!(
                "model: {} accuracy: {:.4} f1 score: {:.4}",
                result.name, result.accuracy, result.f1_score
            );
        }
    }
}
