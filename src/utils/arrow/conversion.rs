//! Conversion of Arrow arrays to plain Rust values.
//!
//! Source extracts mix integer, float, string and date columns depending on
//! what CSV schema inference saw, so every reader here casts first and then
//! reads the single target type.

use arrow::array::{Array, AsArray, StringArray};
use arrow::compute::{can_cast_types, cast};
use arrow::datatypes::{DataType, Float64Type, Int64Type};

use crate::error::{CohortError, Result};

/// Read an array as nullable `f64` values
///
/// Values that cannot be represented (for example text in a numeric
/// column) become `None`. Dates are read as days since the epoch.
pub fn arrow_array_to_f64(array: &dyn Array) -> Result<Vec<Option<f64>>> {
    let source = match array.data_type() {
        DataType::Date32 => cast(array, &DataType::Int32)?,
        DataType::Date64 => cast(array, &DataType::Int64)?,
        _ => arrow::array::make_array(array.to_data()),
    };

    if !can_cast_types(source.data_type(), &DataType::Float64) {
        return Err(CohortError::Schema(format!(
            "Cannot read {} as a number",
            array.data_type()
        )));
    }

    let values = cast(source.as_ref(), &DataType::Float64)?;
    Ok(values.as_primitive::<Float64Type>().iter().collect())
}

/// Read an array as nullable `i64` values
pub fn arrow_array_to_i64(array: &dyn Array) -> Result<Vec<Option<i64>>> {
    if !can_cast_types(array.data_type(), &DataType::Int64) {
        return Err(CohortError::Schema(format!(
            "Cannot read {} as an integer",
            array.data_type()
        )));
    }

    let values = cast(array, &DataType::Int64)?;
    Ok(values.as_primitive::<Int64Type>().iter().collect())
}

/// Read an array as UTF-8 strings
pub fn arrow_array_to_utf8(array: &dyn Array) -> Result<StringArray> {
    let values = cast(array, &DataType::Utf8)?;
    Ok(values.as_string::<i32>().clone())
}
