//! Dense training rows built from a cohort split

use rand::prelude::*;

use crate::algorithm::cohort::{FeatureMatrix, LabelVector};
use crate::error::{CohortError, Result};

/// Feature rows and binary labels; missing values are `NaN`
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingData {
    feature_names: Vec<String>,
    rows: Vec<Vec<f64>>,
    labels: Vec<u8>,
}

impl TrainingData {
    /// Create training data, checking shapes
    pub fn new(feature_names: Vec<String>, rows: Vec<Vec<f64>>, labels: Vec<u8>) -> Result<Self> {
        if rows.len() != labels.len() {
            return Err(CohortError::Schema(format!(
                "{} feature rows but {} labels",
                rows.len(),
                labels.len()
            )));
        }
        if let Some(row) = rows.iter().find(|row| row.len() != feature_names.len()) {
            return Err(CohortError::Schema(format!(
                "Row has {} values but there are {} features",
                row.len(),
                feature_names.len()
            )));
        }
        if labels.iter().any(|label| *label > 1) {
            return Err(CohortError::Schema("Labels must be 0 or 1".to_string()));
        }
        Ok(Self {
            feature_names,
            rows,
            labels,
        })
    }

    /// Convert a cohort split into dense rows
    pub fn from_features(features: &FeatureMatrix, labels: &LabelVector) -> Result<Self> {
        let mut rows = vec![Vec::with_capacity(features.num_features()); features.num_rows()];
        for feature in 0..features.num_features() {
            for (row, value) in rows.iter_mut().zip(features.values(feature)?) {
                row.push(value.unwrap_or(f64::NAN));
            }
        }
        Self::new(features.names(), rows, labels.clone())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn num_features(&self) -> usize {
        self.feature_names.len()
    }

    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    #[must_use]
    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    #[must_use]
    pub fn labels(&self) -> &[u8] {
        &self.labels
    }

    /// Rows at the given positions, in that order
    #[must_use]
    pub fn subset(&self, indices: &[usize]) -> Self {
        Self {
            feature_names: self.feature_names.clone(),
            rows: indices.iter().map(|i| self.rows[*i].clone()).collect(),
            labels: indices.iter().map(|i| self.labels[*i]).collect(),
        }
    }

    /// Shuffle and split into `(train, test)`
    ///
    /// The test set receives `ceil(len * test_size)` rows.
    ///
    /// # Errors
    /// Fails if `test_size` is outside (0, 1) or either side would be empty
    pub fn train_test_split(&self, test_size: f64, seed: u64) -> Result<(Self, Self)> {
        if !(test_size > 0.0 && test_size < 1.0) {
            return Err(CohortError::Config(format!(
                "test_size must be in (0, 1), got {test_size}"
            )));
        }

        let n = self.len();
        let n_test = (n as f64 * test_size).ceil() as usize;
        if n_test == 0 || n_test >= n {
            return Err(CohortError::Precondition(format!(
                "Cannot split {n} rows with test_size {test_size}"
            )));
        }

        let mut indices: Vec<usize> = (0..n).collect();
        let mut rng = StdRng::seed_from_u64(seed);
        indices.shuffle(&mut rng);

        let (test, train) = indices.split_at(n_test);
        Ok((self.subset(train), self.subset(test)))
    }
}

/// Stratified k-fold assignment as `(train, validation)` index pairs
///
/// Each class is shuffled and dealt round-robin over the folds, so every
/// fold keeps the overall class balance.
///
/// # Errors
/// Fails if `k < 2` or there are fewer rows than folds
pub fn stratified_k_fold(labels: &[u8], k: usize, seed: u64) -> Result<Vec<(Vec<usize>, Vec<usize>)>> {
    if k < 2 {
        return Err(CohortError::Config(format!("folds must be at least 2, got {k}")));
    }
    if labels.len() < k {
        return Err(CohortError::Precondition(format!(
            "Cannot make {k} folds from {} rows",
            labels.len()
        )));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut fold_of = vec![0usize; labels.len()];
    let mut offset = 0;
    for class in [0u8, 1] {
        let mut members: Vec<usize> = (0..labels.len()).filter(|i| labels[*i] == class).collect();
        members.shuffle(&mut rng);
        for (position, row) in members.iter().enumerate() {
            fold_of[*row] = (offset + position) % k;
        }
        offset += members.len();
    }

    Ok((0..k)
        .map(|fold| {
            let (validation, train): (Vec<usize>, Vec<usize>) =
                (0..labels.len()).partition(|row| fold_of[*row] == fold);
            (train, validation)
        })
        .collect())
}
