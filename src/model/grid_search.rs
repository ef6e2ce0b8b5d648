//! Exhaustive hyperparameter search with stratified cross-validation
//!
//! Every grid combination is scored by mean validation accuracy over the
//! same stratified folds. Combinations are evaluated in parallel on a
//! dedicated rayon pool; the best one (earliest in grid order on ties) is
//! refitted on all training rows.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use itertools::Itertools;
use log::info;
use rayon::prelude::*;
use serde::Serialize;

use crate::config::TrainingConfig;
use crate::error::{CohortError, Result};
use crate::utils::logging::{create_main_progress_bar, finish_progress_bar};

use super::dataset::{TrainingData, stratified_k_fold};
use super::metrics::accuracy;
use super::persistence::write_json;
use super::{Classifier, EstimatorKind, ModelSpec, Params, TrainedModel};

/// Candidate values per hyperparameter
pub type ParamGrid = BTreeMap<String, Vec<f64>>;

/// Every combination of grid values, varying the last parameter fastest
#[must_use]
pub fn expand_grid(grid: &ParamGrid) -> Vec<Params> {
    if grid.is_empty() {
        return vec![Params::new()];
    }
    grid.values()
        .map(|values| values.iter().copied())
        .multi_cartesian_product()
        .map(|combination| grid.keys().cloned().zip(combination).collect())
        .collect()
}

/// Mean validation accuracy of one combination
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateScore {
    pub params: Params,
    pub mean_score: f64,
}

/// Result of a grid search
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchSummary {
    pub estimator: String,
    pub best_params: Params,
    pub best_score: f64,
    pub folds: usize,
    pub candidates: Vec<CandidateScore>,
    /// Accuracy on held-out rows, when the caller evaluated one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_accuracy: Option<f64>,
}

impl SearchSummary {
    /// Write `grid_search_summary_<timestamp>.json` into `dir`
    pub fn write_json(&self, dir: &Path, timestamp: &str) -> Result<PathBuf> {
        let path = dir.join(format!("grid_search_summary_{timestamp}.json"));
        write_json(self, &path)?;
        Ok(path)
    }
}

/// A fitted model and how it was chosen
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub model: TrainedModel,
    pub summary: SearchSummary,
}

/// Anything that can produce a fitted model from training rows
pub trait ModelTrainer {
    fn train(&self, data: &TrainingData) -> Result<TrainingOutcome>;
}

/// Grid search over one estimator family
#[derive(Debug, Clone)]
pub struct GridSearch {
    kind: EstimatorKind,
    grid: ParamGrid,
    folds: usize,
    seed: u64,
    n_jobs: usize,
}

impl GridSearch {
    /// Search `grid` with 5 folds on all available cores
    #[must_use]
    pub fn new(kind: EstimatorKind, grid: ParamGrid) -> Self {
        Self {
            kind,
            grid,
            folds: 5,
            seed: 42,
            n_jobs: num_cpus::get(),
        }
    }

    /// Search the default grid of the configured estimator
    pub fn from_config(config: &TrainingConfig) -> Result<Self> {
        let kind = EstimatorKind::from_name(&config.estimator)?;
        Ok(Self::new(kind, kind.default_grid())
            .with_folds(config.folds)
            .with_seed(config.split_seed)
            .with_n_jobs(config.n_jobs))
    }

    #[must_use]
    pub fn with_folds(mut self, folds: usize) -> Self {
        self.folds = folds;
        self
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    #[must_use]
    pub fn with_n_jobs(mut self, n_jobs: usize) -> Self {
        self.n_jobs = n_jobs.max(1);
        self
    }

    #[must_use]
    pub fn kind(&self) -> EstimatorKind {
        self.kind
    }

    fn cross_validate(
        &self,
        params: &Params,
        data: &TrainingData,
        folds: &[(Vec<usize>, Vec<usize>)],
    ) -> Result<f64> {
        let spec = ModelSpec::new(self.kind, params.clone());
        let mut total = 0.0;
        for (train, validation) in folds {
            let model = spec.fit(&data.subset(train), self.seed)?;
            let validation = data.subset(validation);
            total += accuracy(validation.labels(), &model.predict_all(validation.rows()));
        }
        Ok(total / folds.len() as f64)
    }
}

impl ModelTrainer for GridSearch {
    fn train(&self, data: &TrainingData) -> Result<TrainingOutcome> {
        let candidates = expand_grid(&self.grid);
        if candidates.is_empty() {
            return Err(CohortError::Config(format!(
                "Parameter grid for {} has an empty value list",
                self.kind
            )));
        }

        let folds = stratified_k_fold(data.labels(), self.folds, self.seed)?;
        info!(
            "Fitting {} folds for each of {} candidates, totalling {} fits",
            self.folds,
            candidates.len(),
            self.folds * candidates.len()
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.n_jobs)
            .build()
            .map_err(|e| CohortError::Config(format!("Cannot start {} workers: {e}", self.n_jobs)))?;

        let pb = create_main_progress_bar(candidates.len() as u64, Some("Grid search"));
        let scores = pool.install(|| {
            candidates
                .par_iter()
                .map(|params| {
                    let score = self.cross_validate(params, data, &folds);
                    pb.inc(1);
                    score
                })
                .collect::<Result<Vec<f64>>>()
        })?;
        finish_progress_bar(&pb, Some("Grid search complete"));

        let mut best = 0;
        for (idx, score) in scores.iter().enumerate() {
            if *score > scores[best] {
                best = idx;
            }
        }

        let best_params = candidates[best].clone();
        info!(
            "Best {} parameters {best_params:?} with mean accuracy {:.4}",
            self.kind, scores[best]
        );

        let model = ModelSpec::new(self.kind, best_params.clone()).fit(data, self.seed)?;

        let summary = SearchSummary {
            estimator: self.kind.to_string(),
            best_params,
            best_score: scores[best],
            folds: self.folds,
            candidates: candidates
                .into_iter()
                .zip(scores)
                .map(|(params, mean_score)| CandidateScore { params, mean_score })
                .collect(),
            test_accuracy: None,
        };

        Ok(TrainingOutcome { model, summary })
    }
}
