//! Arrow data handling utilities
//!
//! Helpers for looking up, replacing and dropping columns of a record batch,
//! and for reading nullable arrays as plain Rust values.

pub mod array_utils;
pub mod conversion;

// Re-export commonly used functions for convenience
pub use array_utils::{drop_columns, get_column, rename_columns, take_rows, validity, with_column};
pub use conversion::{arrow_array_to_f64, arrow_array_to_i64, arrow_array_to_utf8};
