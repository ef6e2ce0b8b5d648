//! Algorithm implementations for the study workflow
//!
//! This module contains the cohort construction stages applied to the
//! assembled biobank table.

pub mod cohort;
