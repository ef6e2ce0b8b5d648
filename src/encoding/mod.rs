//! Binary indicators from sparse diagnosis columns
//!
//! A diagnosis column in the extracts holds the date a condition was first
//! reported and is null otherwise. Related conditions are collapsed into
//! one 0/1 indicator; coded text columns (procedures, cancer sites) are
//! matched on their code prefix.

pub mod rules;

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Int64Array};
use arrow::record_batch::RecordBatch;
use log::{debug, info};

use crate::catalog::FeatureCatalog;
use crate::error::Result;
use crate::utils::arrow::{arrow_array_to_utf8, drop_columns, validity, with_column};
use crate::utils::logging::log_warning;

pub use rules::EncodingRule;

/// Per-row presence: true where any of `columns` is non-null
///
/// Columns absent from the batch count as all-null.
pub(crate) fn any_present<S: AsRef<str>>(batch: &RecordBatch, columns: &[S]) -> Vec<bool> {
    let mut present = vec![false; batch.num_rows()];
    for name in columns {
        let name = name.as_ref();
        let Some(array) = batch.column_by_name(name) else {
            log_warning(&format!("Column {name} is missing, treating it as absent"), None);
            continue;
        };
        for (flag, valid) in present.iter_mut().zip(validity(array.as_ref())) {
            *flag |= valid;
        }
    }
    present
}

/// Per-row prefix match on a text column; nulls never match
pub(crate) fn prefix_match<S: AsRef<str>>(
    batch: &RecordBatch,
    column: &str,
    prefixes: &[S],
) -> Result<Vec<bool>> {
    let Some(array) = batch.column_by_name(column) else {
        log_warning(&format!("Column {column} is missing, treating it as absent"), None);
        return Ok(vec![false; batch.num_rows()]);
    };
    let values = arrow_array_to_utf8(array.as_ref())?;
    Ok(values
        .iter()
        .map(|value| {
            value.is_some_and(|v| prefixes.iter().any(|prefix| v.starts_with(prefix.as_ref())))
        })
        .collect())
}

pub(crate) fn indicator_array(flags: &[bool]) -> ArrayRef {
    Arc::new(Int64Array::from_iter_values(flags.iter().map(|f| i64::from(*f))))
}

/// Replace `columns` with a single 0/1 column that is 1 where any of them
/// is non-null
pub fn encode_presence_from_nulls<S: AsRef<str>>(
    batch: &RecordBatch,
    columns: &[S],
    output: &str,
) -> Result<RecordBatch> {
    let flags = any_present(batch, columns);
    let batch = with_column(batch, output, indicator_array(&flags))?;
    drop_columns(&batch, columns)
}

/// Add a 0/1 column that is 1 where `column` starts with any of `prefixes`
///
/// The source column is kept so several indicators can be taken from it.
pub fn encode_presence_from_prefix<S: AsRef<str>>(
    batch: &RecordBatch,
    column: &str,
    prefixes: &[S],
    output: &str,
) -> Result<RecordBatch> {
    let flags = prefix_match(batch, column, prefixes)?;
    with_column(batch, output, indicator_array(&flags))
}

/// Ordered set of encoding rules
#[derive(Debug, Clone)]
pub struct CategoricalEncoder {
    rules: Vec<EncodingRule>,
}

impl Default for CategoricalEncoder {
    fn default() -> Self {
        Self::standard()
    }
}

impl CategoricalEncoder {
    /// The endometriosis study encoding
    #[must_use]
    pub fn standard() -> Self {
        Self::with_rules(rules::standard_rules())
    }

    /// Encoder applying `rules` in order
    #[must_use]
    pub fn with_rules(rules: Vec<EncodingRule>) -> Self {
        Self { rules }
    }

    /// Rules in application order
    #[must_use]
    pub fn rules(&self) -> &[EncodingRule] {
        &self.rules
    }

    /// Every indicator column the encoder produces, in rule order
    #[must_use]
    pub fn output_columns(&self) -> Vec<String> {
        self.rules
            .iter()
            .flat_map(EncodingRule::outputs)
            .map(ToString::to_string)
            .collect()
    }

    /// Apply every rule in order
    ///
    /// # Errors
    /// Fails if a rule input cannot be resolved through the catalog
    pub fn apply(&self, batch: &RecordBatch, catalog: &FeatureCatalog) -> Result<RecordBatch> {
        info!("Encoding {} categorical rules", self.rules.len());
        let mut batch = batch.clone();
        for rule in &self.rules {
            batch = rule.apply(&batch, catalog)?;
            debug!("Applied rule producing {:?}", rule.outputs());
        }
        Ok(batch)
    }
}
