//! Core filtering functionality
//!
//! Defines the [`BatchFilter`] trait and the mask-based filter every
//! implementation funnels through.

use arrow::array::{ArrayRef, BooleanArray};
use arrow::compute::filter as arrow_filter;
use arrow::record_batch::RecordBatch;

use crate::error::{CohortError, Result};
use crate::utils::arrow::{arrow_array_to_f64, get_column};

/// Keep the rows of `batch` where `mask` is true
///
/// # Arguments
/// * `batch` - The record batch to filter
/// * `mask` - One flag per row; null flags drop the row
///
/// # Returns
/// A new record batch holding the selected rows in their original order
///
/// # Errors
/// Returns a `Schema` error if the mask and batch lengths differ
pub fn filter_record_batch(batch: &RecordBatch, mask: &BooleanArray) -> Result<RecordBatch> {
    if batch.num_rows() != mask.len() {
        return Err(CohortError::Schema(format!(
            "Mask length ({}) doesn't match batch row count ({})",
            mask.len(),
            batch.num_rows()
        )));
    }

    let filtered_columns: Vec<ArrayRef> = batch
        .columns()
        .iter()
        .map(|col| arrow_filter(col, mask))
        .collect::<std::result::Result<_, _>>()?;

    Ok(RecordBatch::try_new(batch.schema(), filtered_columns)?)
}

/// A row filter over record batches
pub trait BatchFilter: std::fmt::Debug {
    /// Filter a record batch
    ///
    /// # Arguments
    /// * `batch` - The record batch to filter
    ///
    /// # Returns
    /// A batch with the same schema holding the rows that pass
    fn filter(&self, batch: &RecordBatch) -> Result<RecordBatch>;
}

/// Keeps rows whose numeric value differs from a code
///
/// Rows where the column is null are kept.
#[derive(Debug, Clone)]
pub struct NotEqualFilter {
    column: String,
    value: f64,
}

impl NotEqualFilter {
    /// Create a filter dropping rows where `column == value`
    #[must_use]
    pub fn new(column: impl Into<String>, value: f64) -> Self {
        Self {
            column: column.into(),
            value,
        }
    }
}

impl BatchFilter for NotEqualFilter {
    fn filter(&self, batch: &RecordBatch) -> Result<RecordBatch> {
        let values = arrow_array_to_f64(get_column(batch, &self.column)?.as_ref())?;
        let mask: BooleanArray = values
            .iter()
            .map(|v| Some(v.is_none_or(|v| v != self.value)))
            .collect();
        filter_record_batch(batch, &mask)
    }
}
