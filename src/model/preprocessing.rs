//! Mean imputation and z-score scaling

use serde::{Deserialize, Serialize};

/// Per-feature mean and scale learned from training rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standardizer {
    means: Vec<f64>,
    scales: Vec<f64>,
}

impl Standardizer {
    /// Learn means and standard deviations, ignoring `NaN`
    ///
    /// A feature with no observed values gets mean 0; a constant feature
    /// gets scale 1.
    #[must_use]
    pub fn fit(rows: &[Vec<f64>]) -> Self {
        let width = rows.first().map_or(0, Vec::len);
        let mut means = Vec::with_capacity(width);
        let mut scales = Vec::with_capacity(width);

        for feature in 0..width {
            let observed: Vec<f64> = rows
                .iter()
                .map(|row| row[feature])
                .filter(|v| !v.is_nan())
                .collect();

            if observed.is_empty() {
                means.push(0.0);
                scales.push(1.0);
                continue;
            }

            let n = observed.len() as f64;
            let mean = observed.iter().sum::<f64>() / n;
            let variance = observed.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            let std = variance.sqrt();

            means.push(mean);
            scales.push(if std > f64::EPSILON { std } else { 1.0 });
        }

        Self { means, scales }
    }

    /// Impute and scale one row
    #[must_use]
    pub fn transform_row(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.means.iter().zip(&self.scales))
            .map(|(value, (mean, scale))| {
                if value.is_nan() {
                    0.0
                } else {
                    (value - mean) / scale
                }
            })
            .collect()
    }

    #[must_use]
    pub fn transform(&self, rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
        rows.iter().map(|row| self.transform_row(row)).collect()
    }
}
