//! Utilities for reshaping record batches.
//!
//! Every function returns a new batch; arrays are reference counted so
//! reshaping never copies column data except in `take_rows`.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, UInt32Array};
use arrow::compute::take;
use arrow::datatypes::{Field, FieldRef, Schema};
use arrow::record_batch::RecordBatch;
use log::debug;

use crate::error::{CohortError, Result};

/// Get a column from a record batch by name
///
/// # Errors
/// Returns `MissingColumn` if the batch has no column with this name
pub fn get_column<'a>(batch: &'a RecordBatch, column_name: &str) -> Result<&'a ArrayRef> {
    batch
        .column_by_name(column_name)
        .ok_or_else(|| CohortError::MissingColumn(column_name.to_string()))
}

/// Per-row validity of `array`, true where the value is not null
///
/// Reads logical nulls, so an all-null `NullArray` (the type CSV inference
/// gives an empty column) reports every row as null.
#[must_use]
pub fn validity(array: &dyn Array) -> Vec<bool> {
    match array.logical_nulls() {
        Some(nulls) => nulls.iter().collect(),
        None => vec![true; array.len()],
    }
}

/// Drop the named columns, ignoring names the batch does not have
pub fn drop_columns<S: AsRef<str>>(batch: &RecordBatch, names: &[S]) -> Result<RecordBatch> {
    let schema = batch.schema();
    let keep: Vec<usize> = schema
        .fields()
        .iter()
        .enumerate()
        .filter(|(_, field)| !names.iter().any(|n| n.as_ref() == field.name()))
        .map(|(idx, _)| idx)
        .collect();

    if keep.len() == schema.fields().len() {
        debug!("None of the columns to drop are present");
        return Ok(batch.clone());
    }

    Ok(batch.project(&keep)?)
}

/// Add a column, replacing any existing column of the same name in place
pub fn with_column(batch: &RecordBatch, name: &str, array: ArrayRef) -> Result<RecordBatch> {
    if array.len() != batch.num_rows() {
        return Err(CohortError::Schema(format!(
            "Column '{name}' has {} rows but the table has {}",
            array.len(),
            batch.num_rows()
        )));
    }

    let field: FieldRef = Arc::new(Field::new(name, array.data_type().clone(), true));
    let schema = batch.schema();
    let mut fields: Vec<FieldRef> = schema.fields().iter().cloned().collect();
    let mut columns: Vec<ArrayRef> = batch.columns().to_vec();

    match schema.index_of(name) {
        Ok(idx) => {
            fields[idx] = field;
            columns[idx] = array;
        }
        Err(_) => {
            fields.push(field);
            columns.push(array);
        }
    }

    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
}

/// Give every column a new name, keeping types and data
pub fn rename_columns(batch: &RecordBatch, names: &[String]) -> Result<RecordBatch> {
    if names.len() != batch.num_columns() {
        return Err(CohortError::Schema(format!(
            "Expected {} column names, got {}",
            batch.num_columns(),
            names.len()
        )));
    }

    let fields: Vec<Field> = batch
        .schema()
        .fields()
        .iter()
        .zip(names)
        .map(|(field, name)| {
            Field::new(name, field.data_type().clone(), field.is_nullable())
        })
        .collect();

    Ok(RecordBatch::try_new(
        Arc::new(Schema::new(fields)),
        batch.columns().to_vec(),
    )?)
}

/// Select rows by position, in the order given
pub fn take_rows(batch: &RecordBatch, indices: &[u32]) -> Result<RecordBatch> {
    let indices = UInt32Array::from(indices.to_vec());
    let columns: Vec<ArrayRef> = batch
        .columns()
        .iter()
        .map(|col| take(col.as_ref(), &indices, None))
        .collect::<std::result::Result<_, _>>()?;

    Ok(RecordBatch::try_new(batch.schema(), columns)?)
}
