//! Subject-identifier filtering and merging
//!
//! Every source extract is keyed by `eid`. Secondary extracts are first cut
//! down to the subjects of the base table with [`EidFilter`], then merged
//! with [`inner_join_on_eid`].

use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanArray};
use arrow::datatypes::Schema;
use arrow::record_batch::RecordBatch;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{CohortError, Result};
use crate::filter::core::{BatchFilter, filter_record_batch};
use crate::utils::arrow::{arrow_array_to_i64, get_column, take_rows};

/// Read the subject identifiers of a batch
///
/// # Arguments
/// * `batch` - The record batch holding the identifiers
/// * `eid_column` - Name of the identifier column
///
/// # Returns
/// One identifier per row, in row order
///
/// # Errors
/// Returns a `Schema` error if any identifier is null
pub fn eid_values(batch: &RecordBatch, eid_column: &str) -> Result<Vec<i64>> {
    arrow_array_to_i64(get_column(batch, eid_column)?.as_ref())?
        .into_iter()
        .enumerate()
        .map(|(row, eid)| {
            eid.ok_or_else(|| {
                CohortError::Schema(format!("Null subject identifier '{eid_column}' at row {row}"))
            })
        })
        .collect()
}

/// A filter that includes only rows with matching subject identifiers
#[derive(Debug, Clone)]
pub struct EidFilter {
    eids: FxHashSet<i64>,
    eid_column: String,
}

impl EidFilter {
    /// Create a new subject filter
    #[must_use]
    pub fn new(eids: impl IntoIterator<Item = i64>, eid_column: impl Into<String>) -> Self {
        Self {
            eids: eids.into_iter().collect(),
            eid_column: eid_column.into(),
        }
    }

    /// Create a filter admitting exactly the subjects of `batch`
    pub fn from_batch(batch: &RecordBatch, eid_column: &str) -> Result<Self> {
        Ok(Self::new(eid_values(batch, eid_column)?, eid_column))
    }

    /// Number of admitted subjects
    #[must_use]
    pub fn len(&self) -> usize {
        self.eids.len()
    }

    /// Whether no subject is admitted
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.eids.is_empty()
    }
}

impl BatchFilter for EidFilter {
    fn filter(&self, batch: &RecordBatch) -> Result<RecordBatch> {
        let mask: BooleanArray = eid_values(batch, &self.eid_column)?
            .iter()
            .map(|eid| Some(self.eids.contains(eid)))
            .collect();
        filter_record_batch(batch, &mask)
    }
}

/// Inner-merge two batches on the subject identifier
///
/// Output rows follow the order of `left`; each left row is paired with
/// every right row carrying the same identifier. The right identifier
/// column is dropped, and a right column whose name already exists on the
/// left is rejected rather than silently shadowed.
///
/// # Arguments
/// * `left` - The batch whose row order and identifier column are kept
/// * `right` - The batch merged into `left`
/// * `eid_column` - Name of the identifier column in both batches
///
/// # Returns
/// The left columns followed by the right columns other than the identifier
///
/// # Errors
/// Returns a `Schema` error on clashing column names or null identifiers
pub fn inner_join_on_eid(
    left: &RecordBatch,
    right: &RecordBatch,
    eid_column: &str,
) -> Result<RecordBatch> {
    let left_eids = eid_values(left, eid_column)?;
    let right_eids = eid_values(right, eid_column)?;

    let mut right_rows: FxHashMap<i64, Vec<u32>> = FxHashMap::default();
    for (row, eid) in right_eids.iter().enumerate() {
        right_rows.entry(*eid).or_default().push(row as u32);
    }

    let mut left_take = Vec::with_capacity(left_eids.len());
    let mut right_take = Vec::with_capacity(left_eids.len());
    for (row, eid) in left_eids.iter().enumerate() {
        if let Some(matches) = right_rows.get(eid) {
            for right_row in matches {
                left_take.push(row as u32);
                right_take.push(*right_row);
            }
        }
    }

    let left_part = take_rows(left, &left_take)?;
    let right_part = take_rows(right, &right_take)?;

    let left_schema = left.schema();
    let mut fields: Vec<_> = left_schema.fields().iter().cloned().collect();
    let mut columns: Vec<ArrayRef> = left_part.columns().to_vec();

    let right_schema = right.schema();
    for (idx, field) in right_schema.fields().iter().enumerate() {
        if field.name() == eid_column {
            continue;
        }
        if left_schema.index_of(field.name()).is_ok() {
            return Err(CohortError::Schema(format!(
                "Column '{}' is present in both tables being merged",
                field.name()
            )));
        }
        fields.push(Arc::clone(field));
        columns.push(Arc::clone(right_part.column(idx)));
    }

    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
}
