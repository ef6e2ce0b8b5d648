//! Derived cohort columns

use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, Int64Array};
use arrow::record_batch::RecordBatch;
use log::info;
use rustc_hash::FxHashMap;

use crate::error::Result;
use crate::filter::eid_values;
use crate::reader::TableReader;
use crate::utils::arrow::{arrow_array_to_f64, get_column, validity};

/// Years of estrogen exposure between menarche and menopause
///
/// Null unless both ages are recorded, neither is an unknown-answer code,
/// and menopause comes after menarche.
#[must_use]
pub fn estrogen_exposure(
    menarche: Option<f64>,
    menopause: Option<f64>,
    unknown_codes: &[f64],
) -> Option<f64> {
    let (menarche, menopause) = (menarche?, menopause?);
    if unknown_codes.contains(&menarche) || unknown_codes.contains(&menopause) {
        return None;
    }
    (menopause > menarche).then_some(menopause - menarche)
}

/// Row-wise [`estrogen_exposure`] over two columns
pub fn estrogen_exposure_column(
    batch: &RecordBatch,
    menarche_column: &str,
    menopause_column: &str,
    unknown_codes: &[f64],
) -> Result<ArrayRef> {
    let menarche = arrow_array_to_f64(get_column(batch, menarche_column)?.as_ref())?;
    let menopause = arrow_array_to_f64(get_column(batch, menopause_column)?.as_ref())?;

    let exposure: Float64Array = menarche
        .into_iter()
        .zip(menopause)
        .map(|(start, end)| estrogen_exposure(start, end, unknown_codes))
        .collect();
    Ok(Arc::new(exposure))
}

/// 1 where `diagnosis_column` is recorded, else 0
pub fn label_column(batch: &RecordBatch, diagnosis_column: &str) -> Result<ArrayRef> {
    let diagnosis = get_column(batch, diagnosis_column)?;
    let labels: Int64Array = validity(diagnosis.as_ref())
        .into_iter()
        .map(i64::from)
        .collect::<Vec<_>>()
        .into();
    Ok(Arc::new(labels))
}

/// Count recorded diagnosis codes per subject in a hospital diagnosis log
pub fn load_diagnosis_counts(
    path: &Path,
    eid_column: &str,
    code_column: &str,
) -> Result<FxHashMap<i64, i64>> {
    let log = TableReader::for_path(path).read_columns(path, &[eid_column, code_column])?;
    let eids = eid_values(&log, eid_column)?;
    let recorded = validity(get_column(&log, code_column)?.as_ref());

    let mut counts: FxHashMap<i64, i64> = FxHashMap::default();
    for (eid, recorded) in eids.into_iter().zip(recorded) {
        *counts.entry(eid).or_insert(0) += i64::from(recorded);
    }

    info!(
        "Counted diagnoses for {} subjects from {}",
        counts.len(),
        path.display()
    );
    Ok(counts)
}

/// Per-row diagnosis count looked up by subject, 0 for unknown subjects
pub fn diagnosis_count_column(
    batch: &RecordBatch,
    counts: &FxHashMap<i64, i64>,
    eid_column: &str,
) -> Result<ArrayRef> {
    let values: Vec<i64> = eid_values(batch, eid_column)?
        .iter()
        .map(|eid| counts.get(eid).copied().unwrap_or(0))
        .collect();
    Ok(Arc::new(Int64Array::from(values)))
}
