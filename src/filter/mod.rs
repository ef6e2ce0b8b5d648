//! Row filtering for record batches
//!
//! Filters implement [`BatchFilter`] and are applied with Arrow's vectorized
//! filter kernel. Subject-identifier filtering and the inner merge used to
//! combine source extracts live in [`eid`].

pub mod core;
pub mod eid;

pub use self::core::{BatchFilter, NotEqualFilter, filter_record_batch};
pub use self::eid::{EidFilter, eid_values, inner_join_on_eid};
