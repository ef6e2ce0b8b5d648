//! Cohort summaries: missingness per feature and indicator prevalence

use std::fmt;

use arrow::array::Array;
use arrow::record_batch::RecordBatch;
use serde::Serialize;

use crate::catalog::FeatureCatalog;
use crate::error::Result;
use crate::utils::arrow::{arrow_array_to_i64, get_column};

/// Share of missing values in one column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NullPercentage {
    /// Feature name, or the column name when it is not a catalog code
    pub feature: String,
    /// Percentage of null values, rounded to two decimals
    pub percent: f64,
}

/// Counts of 0 and 1 values of one indicator column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorStats {
    pub column: String,
    pub zeros: usize,
    pub ones: usize,
    pub zero_percent: f64,
    pub one_percent: f64,
}

impl fmt::Display for IndicatorStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: 0 = {} ({:.2}%), 1 = {} ({:.2}%)",
            self.column, self.zeros, self.zero_percent, self.ones, self.one_percent
        )
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

/// Percentage of missing values per column, highest first
///
/// Columns are reported under their catalog feature name.
///
/// # Errors
/// Fails if a numeric column code is not in the catalog
pub fn null_percentages(batch: &RecordBatch, catalog: &FeatureCatalog) -> Result<Vec<NullPercentage>> {
    let schema = batch.schema();
    let mut stats = schema
        .fields()
        .iter()
        .zip(batch.columns())
        .map(|(field, column)| {
            Ok(NullPercentage {
                feature: catalog.resolve_name(field.name())?,
                percent: round2(percent(column.logical_null_count(), batch.num_rows())),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    stats.sort_by(|a, b| b.percent.total_cmp(&a.percent));
    Ok(stats)
}

/// Prevalence of each indicator column
///
/// Null entries count as neither 0 nor 1.
pub fn indicator_stats<S: AsRef<str>>(batch: &RecordBatch, columns: &[S]) -> Result<Vec<IndicatorStats>> {
    columns
        .iter()
        .map(|name| {
            let name = name.as_ref();
            let values = arrow_array_to_i64(get_column(batch, name)?.as_ref())?;
            let zeros = values.iter().filter(|v| **v == Some(0)).count();
            let ones = values.iter().filter(|v| **v == Some(1)).count();
            Ok(IndicatorStats {
                column: name.to_string(),
                zeros,
                ones,
                zero_percent: round2(percent(zeros, values.len())),
                one_percent: round2(percent(ones, values.len())),
            })
        })
        .collect()
}
