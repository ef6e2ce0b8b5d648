//! Log lines for table IO and pipeline stages

use std::path::Path;
use std::time::Duration;

/// Announce a table operation on `path`
pub fn log_operation_start(operation: &str, path: &Path) {
    log::info!("{operation} {}", path.display());
}

/// Report the shape of a table that was read or written
///
/// `operation` is past tense, e.g. `"read"` or `"wrote"`.
pub fn log_operation_complete(
    operation: &str,
    path: &Path,
    rows: usize,
    columns: usize,
    elapsed: Option<Duration>,
) {
    let shape = format!("{rows} rows x {columns} columns");
    match elapsed {
        Some(duration) => log::info!(
            "Successfully {operation} {shape} ({}) in {duration:?}",
            path.display()
        ),
        None => log::info!("Successfully {operation} {shape} ({})", path.display()),
    }
}

/// Warn about recoverable drift, naming the file when there is one
pub fn log_warning(message: &str, path: Option<&Path>) {
    match path {
        Some(path) => log::warn!("{message}: {}", path.display()),
        None => log::warn!("{message}"),
    }
}

/// Announce one step of a multi-step stage
pub fn log_stage(step: usize, total: usize, description: &str) {
    log::info!("[Step {step}/{total}] {description}");
}
