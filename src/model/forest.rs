//! Random forest of bootstrapped CART trees

use rand::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::Result;

use super::tree::{DecisionTree, TreeConfig};
use super::{Classifier, Params, param_usize};

#[derive(Debug, Clone, PartialEq)]
pub struct ForestConfig {
    pub n_estimators: usize,
    /// Per-tree limits; `max_features` of `None` means the square root
    /// of the feature count
    pub tree: TreeConfig,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            tree: TreeConfig {
                max_depth: 10,
                min_samples_leaf: 1,
                max_features: None,
            },
        }
    }
}

impl ForestConfig {
    /// Read `n_estimators`, `max_depth` and `min_samples_leaf`
    pub fn from_params(params: &Params) -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            n_estimators: param_usize(params, "n_estimators", defaults.n_estimators)?.max(1),
            tree: TreeConfig {
                max_depth: param_usize(params, "max_depth", defaults.tree.max_depth)?,
                min_samples_leaf: param_usize(
                    params,
                    "min_samples_leaf",
                    defaults.tree.min_samples_leaf,
                )?
                .max(1),
                max_features: None,
            },
        })
    }
}

/// Averaged probability of independently grown trees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    /// Grow `n_estimators` trees, each on a bootstrap sample of the rows
    #[must_use]
    pub fn fit(rows: &[Vec<f64>], labels: &[u8], config: &ForestConfig, seed: u64) -> Self {
        let n = rows.len();
        let width = rows.first().map_or(0, Vec::len);
        let tree_config = TreeConfig {
            max_features: Some(
                config
                    .tree
                    .max_features
                    .unwrap_or_else(|| (width as f64).sqrt().ceil() as usize)
                    .max(1),
            ),
            ..config.tree.clone()
        };

        let mut rng = StdRng::seed_from_u64(seed);
        let trees = (0..config.n_estimators)
            .map(|_| {
                let sample: Vec<usize> = (0..n).map(|_| rng.random_range(0..n)).collect();
                DecisionTree::fit_indices(rows, labels, &sample, &tree_config, &mut rng)
            })
            .collect();

        Self { trees }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.trees.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }
}

impl Classifier for RandomForest {
    fn predict_proba(&self, row: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.5;
        }
        self.trees.iter().map(|tree| tree.predict_proba(row)).sum::<f64>() / self.trees.len() as f64
    }
}
