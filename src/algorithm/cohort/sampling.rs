//! Class balancing by undersampling the negatives

use log::info;
use rand::prelude::*;
use rand::seq::index;

use arrow::record_batch::RecordBatch;

use crate::error::{CohortError, Result};
use crate::utils::arrow::{arrow_array_to_i64, get_column, take_rows};

/// Keep every positive row and as many randomly drawn negative rows
///
/// Positives come first in their original order, followed by the sampled
/// negatives. Negatives are drawn without replacement; `seed` makes the
/// draw reproducible.
///
/// # Errors
/// Fails with `Precondition` when there are no positives or fewer
/// negatives than positives.
pub fn balance_classes(
    batch: &RecordBatch,
    label_column: &str,
    seed: Option<u64>,
) -> Result<RecordBatch> {
    let labels = arrow_array_to_i64(get_column(batch, label_column)?.as_ref())?;

    let (positives, negatives): (Vec<u32>, Vec<u32>) = (0..labels.len() as u32)
        .partition(|row| labels[*row as usize] == Some(1));

    let k = positives.len();
    if k == 0 {
        return Err(CohortError::Precondition(
            "No positive subjects to balance against".to_string(),
        ));
    }
    if negatives.len() < k {
        return Err(CohortError::Precondition(format!(
            "Cannot sample {k} negative subjects from {}",
            negatives.len()
        )));
    }

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let mut selected = positives;
    selected.extend(
        index::sample(&mut rng, negatives.len(), k)
            .into_iter()
            .map(|i| negatives[i]),
    );

    info!(
        "Sampled {k} of {} negative subjects to match {k} positives",
        negatives.len()
    );
    take_rows(batch, &selected)
}
