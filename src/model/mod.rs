//! Model training and selection
//!
//! Cohorts are small and tabular, so the estimators are plain in-memory
//! implementations over dense `f64` rows: L2-regularized logistic
//! regression, a CART decision tree and a random forest of such trees.
//! Every fitted model carries the [`Standardizer`] fitted on its training
//! rows, so raw feature rows can be passed to [`Classifier::predict`].

pub mod dataset;
pub mod forest;
pub mod grid_search;
pub mod logistic;
pub mod metrics;
pub mod persistence;
pub mod preprocessing;
pub mod selection;
pub mod tree;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CohortError, Result};

pub use dataset::{TrainingData, stratified_k_fold};
pub use forest::{ForestConfig, RandomForest};
pub use grid_search::{GridSearch, ModelTrainer, ParamGrid, SearchSummary, TrainingOutcome, expand_grid};
pub use logistic::{LogisticConfig, LogisticRegression};
pub use metrics::{accuracy, f1_score};
pub use persistence::{load_model, save_model, timestamp};
pub use preprocessing::Standardizer;
pub use selection::{ModelResult, ModelSelector};
pub use tree::{DecisionTree, TreeConfig};

/// Hyperparameter values by name
pub type Params = BTreeMap<String, f64>;

/// A fitted binary classifier over dense feature rows
pub trait Classifier {
    /// Probability of the positive class
    fn predict_proba(&self, row: &[f64]) -> f64;

    /// Predicted class, positive when the probability reaches 0.5
    fn predict(&self, row: &[f64]) -> u8 {
        u8::from(self.predict_proba(row) >= 0.5)
    }

    /// Predicted class for every row
    fn predict_all(&self, rows: &[Vec<f64>]) -> Vec<u8> {
        rows.iter().map(|row| self.predict(row)).collect()
    }
}

/// Supported estimator families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EstimatorKind {
    LogisticRegression,
    DecisionTree,
    RandomForest,
}

impl EstimatorKind {
    pub const ALL: [Self; 3] = [Self::LogisticRegression, Self::DecisionTree, Self::RandomForest];

    /// Parse a configuration name such as `random_forest`
    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_lowercase().replace(['-', ' '], "_").as_str() {
            "logistic_regression" | "logistic" => Ok(Self::LogisticRegression),
            "decision_tree" | "tree" => Ok(Self::DecisionTree),
            "random_forest" | "forest" => Ok(Self::RandomForest),
            _ => Err(CohortError::Config(format!("Unknown estimator '{name}'"))),
        }
    }

    /// Hyperparameter grid searched by default
    #[must_use]
    pub fn default_grid(self) -> ParamGrid {
        let grid: &[(&str, &[f64])] = match self {
            Self::LogisticRegression => &[
                ("l2", &[0.0, 0.01, 0.1, 1.0]),
                ("learning_rate", &[0.05, 0.1]),
                ("epochs", &[300.0]),
            ],
            Self::DecisionTree => &[
                ("max_depth", &[4.0, 6.0, 8.0, 10.0]),
                ("min_samples_leaf", &[1.0, 5.0, 10.0]),
            ],
            Self::RandomForest => &[
                ("n_estimators", &[50.0, 100.0]),
                ("max_depth", &[6.0, 10.0]),
                ("min_samples_leaf", &[1.0, 5.0]),
            ],
        };
        grid.iter()
            .map(|(name, values)| ((*name).to_string(), values.to_vec()))
            .collect()
    }
}

impl fmt::Display for EstimatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LogisticRegression => write!(f, "Logistic Regression"),
            Self::DecisionTree => write!(f, "Decision Tree"),
            Self::RandomForest => write!(f, "Random Forest"),
        }
    }
}

/// Read a count-like hyperparameter
pub(crate) fn param_usize(params: &Params, name: &str, default: usize) -> Result<usize> {
    match params.get(name) {
        None => Ok(default),
        Some(value) if value.is_finite() && *value >= 0.0 && value.fract() == 0.0 => {
            Ok(*value as usize)
        }
        Some(value) => Err(CohortError::Config(format!(
            "Parameter '{name}' must be a non-negative integer, got {value}"
        ))),
    }
}

/// Read a real-valued hyperparameter
pub(crate) fn param_f64(params: &Params, name: &str, default: f64) -> Result<f64> {
    match params.get(name) {
        None => Ok(default),
        Some(value) if value.is_finite() && *value >= 0.0 => Ok(*value),
        Some(value) => Err(CohortError::Config(format!(
            "Parameter '{name}' must be a non-negative number, got {value}"
        ))),
    }
}

/// An estimator family with fixed hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub kind: EstimatorKind,
    pub params: Params,
}

impl ModelSpec {
    #[must_use]
    pub fn new(kind: EstimatorKind, params: Params) -> Self {
        Self { kind, params }
    }

    /// Estimator with library default hyperparameters
    #[must_use]
    pub fn with_defaults(kind: EstimatorKind) -> Self {
        Self::new(kind, Params::new())
    }

    /// Fit on `data`; `seed` drives any randomness in the estimator
    ///
    /// # Errors
    /// Fails on empty data or invalid hyperparameters
    pub fn fit(&self, data: &TrainingData, seed: u64) -> Result<TrainedModel> {
        if data.is_empty() {
            return Err(CohortError::Precondition(
                "Cannot fit a model on zero rows".to_string(),
            ));
        }

        let standardizer = Standardizer::fit(data.rows());
        let rows = standardizer.transform(data.rows());
        let labels = data.labels();

        let estimator = match self.kind {
            EstimatorKind::LogisticRegression => {
                let config = LogisticConfig::from_params(&self.params)?;
                Estimator::Logistic(LogisticRegression::fit(&rows, labels, &config))
            }
            EstimatorKind::DecisionTree => {
                let config = TreeConfig::from_params(&self.params)?;
                Estimator::Tree(DecisionTree::fit(&rows, labels, &config, seed))
            }
            EstimatorKind::RandomForest => {
                let config = ForestConfig::from_params(&self.params)?;
                Estimator::Forest(RandomForest::fit(&rows, labels, &config, seed))
            }
        };

        Ok(TrainedModel {
            spec: self.clone(),
            feature_names: data.feature_names().to_vec(),
            standardizer,
            estimator,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Estimator {
    Logistic(LogisticRegression),
    Tree(DecisionTree),
    Forest(RandomForest),
}

/// A fitted estimator with its preprocessing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedModel {
    spec: ModelSpec,
    feature_names: Vec<String>,
    standardizer: Standardizer,
    estimator: Estimator,
}

impl TrainedModel {
    #[must_use]
    pub fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    /// Feature names the model was trained on, in column order
    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }
}

impl Classifier for TrainedModel {
    fn predict_proba(&self, row: &[f64]) -> f64 {
        let row = self.standardizer.transform_row(row);
        match &self.estimator {
            Estimator::Logistic(model) => model.predict_proba(&row),
            Estimator::Tree(model) => model.predict_proba(&row),
            Estimator::Forest(model) => model.predict_proba(&row),
        }
    }
}
