//! L2-regularized logistic regression fitted by batch gradient descent

use serde::{Deserialize, Serialize};

use crate::error::Result;

use super::{Classifier, Params, param_f64, param_usize};

#[derive(Debug, Clone, PartialEq)]
pub struct LogisticConfig {
    pub learning_rate: f64,
    pub epochs: usize,
    /// L2 penalty on the weights (the bias is not penalized)
    pub l2: f64,
}

impl Default for LogisticConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            epochs: 300,
            l2: 0.01,
        }
    }
}

impl LogisticConfig {
    /// Read `learning_rate`, `epochs` and `l2`, defaulting absent ones
    pub fn from_params(params: &Params) -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            learning_rate: param_f64(params, "learning_rate", defaults.learning_rate)?,
            epochs: param_usize(params, "epochs", defaults.epochs)?,
            l2: param_f64(params, "l2", defaults.l2)?,
        })
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    weights: Vec<f64>,
    bias: f64,
}

impl LogisticRegression {
    /// Fit on standardized rows
    #[must_use]
    pub fn fit(rows: &[Vec<f64>], labels: &[u8], config: &LogisticConfig) -> Self {
        let width = rows.first().map_or(0, Vec::len);
        let mut model = Self {
            weights: vec![0.0; width],
            bias: 0.0,
        };
        if rows.is_empty() {
            return model;
        }

        let n = rows.len() as f64;
        for _ in 0..config.epochs {
            let mut grad_w = vec![0.0; width];
            let mut grad_b = 0.0;

            for (row, label) in rows.iter().zip(labels) {
                let error = model.predict_proba(row) - f64::from(*label);
                for (g, x) in grad_w.iter_mut().zip(row) {
                    *g += error * x;
                }
                grad_b += error;
            }

            for (w, g) in model.weights.iter_mut().zip(&grad_w) {
                *w -= config.learning_rate * (g / n + config.l2 * *w);
            }
            model.bias -= config.learning_rate * grad_b / n;
        }

        model
    }

    #[must_use]
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }
}

impl Classifier for LogisticRegression {
    fn predict_proba(&self, row: &[f64]) -> f64 {
        let z: f64 = self
            .weights
            .iter()
            .zip(row)
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.bias;
        sigmoid(z)
    }
}
