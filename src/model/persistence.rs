//! Saving fitted models and search summaries

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::info;
use serde::Serialize;

use crate::error::{CohortError, Result};

use super::TrainedModel;

/// Local time formatted for artifact file names
#[must_use]
pub fn timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

fn create_file(path: &Path) -> Result<BufWriter<File>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| CohortError::file_access(parent, e))?;
    }
    let file = File::create(path).map_err(|e| CohortError::file_access(path, e))?;
    Ok(BufWriter::new(file))
}

/// Write `value` as indented JSON
pub(crate) fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let mut writer = create_file(path)?;
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    info!("Wrote {}", path.display());
    Ok(())
}

/// Write `model_<timestamp>.bin` into `dir`
pub fn save_model(model: &TrainedModel, dir: &Path, timestamp: &str) -> Result<PathBuf> {
    let path = dir.join(format!("model_{timestamp}.bin"));
    let mut writer = create_file(&path)?;
    bincode::serialize_into(&mut writer, model)?;
    writer.flush()?;
    info!("Saved {} model to {}", model.spec().kind, path.display());
    Ok(path)
}

/// Read a model written by [`save_model`]
pub fn load_model(path: &Path) -> Result<TrainedModel> {
    let file = File::open(path).map_err(|e| CohortError::file_access(path, e))?;
    Ok(bincode::deserialize_from(BufReader::new(file))?)
}
