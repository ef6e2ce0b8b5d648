//! Study cohort construction
//!
//! A cohort starts as the wide assembled table and is transformed by a
//! fixed sequence of stages: excluding male subjects, deriving the
//! endometriosis label, balancing the classes, encoding diagnosis
//! indicators and adding the derived estrogen exposure and diagnosis count
//! columns. The result is split into a feature matrix and a label vector
//! for training.

pub mod builder;
pub mod derived;
pub mod sampling;
pub mod statistics;

use std::fmt;

use arrow::record_batch::RecordBatch;

use crate::error::Result;
use crate::utils::arrow::arrow_array_to_f64;

pub use builder::Cohort;
pub use derived::{estrogen_exposure, load_diagnosis_counts};
pub use sampling::balance_classes;
pub use statistics::{IndicatorStats, NullPercentage, indicator_stats, null_percentages};

/// Cohort construction stages in their required order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CohortStage {
    ExcludeMale,
    DeriveLabel,
    BalanceClasses,
    EncodeCategorical,
    EstrogenExposure,
    DiagnosisCount,
}

impl CohortStage {
    /// Every stage, in the order `create_cohort` runs them
    pub const STANDARD: [Self; 6] = [
        Self::ExcludeMale,
        Self::DeriveLabel,
        Self::BalanceClasses,
        Self::EncodeCategorical,
        Self::EstrogenExposure,
        Self::DiagnosisCount,
    ];

    /// Log line describing the stage
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::ExcludeMale => "Dropping male subjects",
            Self::DeriveLabel => "Creating label column",
            Self::BalanceClasses => "Sampling subjects",
            Self::EncodeCategorical => "Preprocessing categorical features",
            Self::EstrogenExposure => "Adding estrogen exposure column",
            Self::DiagnosisCount => "Adding number of diagnoses column",
        }
    }
}

impl fmt::Display for CohortStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Feature columns of a cohort, named by catalog feature name
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    batch: RecordBatch,
}

impl FeatureMatrix {
    #[must_use]
    pub fn new(batch: RecordBatch) -> Self {
        Self { batch }
    }

    /// Feature names in column order
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    #[must_use]
    pub fn num_features(&self) -> usize {
        self.batch.num_columns()
    }

    #[must_use]
    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    /// Numeric values of one feature; non-numeric entries become null
    pub fn values(&self, feature: usize) -> Result<Vec<Option<f64>>> {
        arrow_array_to_f64(self.batch.column(feature).as_ref())
    }
}

/// Binary class labels, one per cohort row
pub type LabelVector = Vec<u8>;
