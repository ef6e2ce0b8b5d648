//! Logging utilities for output and progress tracking
//!
//! Pipeline progress is reported through `log` lines; long-running loops
//! additionally get an `indicatif` progress bar.

pub mod log;
pub mod progress;

// Re-export commonly used functions for convenience
pub use log::{log_operation_complete, log_operation_start, log_stage, log_warning};
pub use progress::{create_main_progress_bar, finish_progress_bar};
