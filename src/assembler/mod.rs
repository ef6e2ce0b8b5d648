//! Dataset assembly from the biobank extracts
//!
//! Requested field ids are distributed over the primary, secondary and
//! tertiary extracts according to their field listings. Each extract is
//! read with a projection onto its fields, cut down to the subjects of the
//! primary extract and merged on `eid`. The result is one wide table whose
//! rows are the subjects present in every extract that contributed a field.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;

use arrow::record_batch::RecordBatch;
use itertools::Itertools;
use log::{error, info, warn};

use crate::catalog::{INSTANCE_SUFFIX, SourceListings, SourceTable};
use crate::config::{SourceTableConfig, SourcesConfig};
use crate::error::{CohortError, Result};
use crate::filter::{BatchFilter, EidFilter, inner_join_on_eid};
use crate::reader::{TableReader, write_csv_with_index};
use crate::utils::logging::{log_stage, log_warning};

/// Default subject identifier column of the extracts
pub const EID_COLUMN: &str = "eid";

/// Builds the wide study table from the source extracts
#[derive(Debug, Clone)]
pub struct DatasetAssembler {
    sources: SourcesConfig,
    listings: SourceListings,
    requested: Vec<String>,
    eid_column: String,
    row_limit: Option<usize>,
    features: BTreeMap<SourceTable, Vec<String>>,
    fields: BTreeMap<SourceTable, Vec<String>>,
    dataset: Option<RecordBatch>,
}

impl DatasetAssembler {
    /// Create an assembler for the requested field ids
    ///
    /// # Arguments
    /// * `sources` - Paths of the three extracts and their field listings
    /// * `listings` - Field ids available in each extract
    /// * `requested` - Field ids to assemble, such as `"31"` or `"21001"`
    pub fn new<I, S>(sources: SourcesConfig, listings: SourceListings, requested: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            sources,
            listings,
            requested: requested.into_iter().map(Into::into).collect(),
            eid_column: EID_COLUMN.to_string(),
            row_limit: None,
            features: BTreeMap::new(),
            fields: BTreeMap::new(),
            dataset: None,
        }
    }

    /// Read at most `limit` rows from each extract
    #[must_use]
    pub fn with_row_limit(mut self, limit: Option<usize>) -> Self {
        self.row_limit = limit;
        self
    }

    /// Use a different subject identifier column
    #[must_use]
    pub fn with_eid_column(mut self, eid_column: impl Into<String>) -> Self {
        self.eid_column = eid_column.into();
        self
    }

    /// Field ids assigned to `table` by [`Self::sort_features`]
    #[must_use]
    pub fn features(&self, table: SourceTable) -> &[String] {
        self.features.get(&table).map_or(&[], Vec::as_slice)
    }

    /// Columns to read from `table`, identifier first
    #[must_use]
    pub fn fields(&self, table: SourceTable) -> &[String] {
        self.fields.get(&table).map_or(&[], Vec::as_slice)
    }

    /// The assembled table, once [`Self::create_dataset`] has run
    #[must_use]
    pub fn dataset(&self) -> Option<&RecordBatch> {
        self.dataset.as_ref()
    }

    /// Take ownership of the assembled table
    #[must_use]
    pub fn into_dataset(self) -> Option<RecordBatch> {
        self.dataset
    }

    /// Assign every requested field to the first extract listing it
    ///
    /// Duplicate requests are collapsed. Fields no extract lists are
    /// dropped with a warning.
    pub fn sort_features(&mut self) {
        info!("Sorting features by their dataset");
        self.features.clear();

        for feature in self.requested.iter().unique() {
            match self.listings.classify(feature) {
                Some(table) => self
                    .features
                    .entry(table)
                    .or_default()
                    .push(feature.clone()),
                None => warn!("Field {feature} is not listed by any extract, skipping it"),
            }
        }

        for table in SourceTable::ALL {
            info!("{} features from the {table} extract", self.features(table).len());
        }
    }

    /// Build the column list of every extract that has features
    pub fn generate_fields(&mut self) {
        self.sort_features();
        self.fields = self
            .features
            .iter()
            .filter(|(_, features)| !features.is_empty())
            .map(|(table, features)| {
                let columns = std::iter::once(self.eid_column.clone())
                    .chain(features.iter().map(|f| format!("{f}{INSTANCE_SUFFIX}")))
                    .collect();
                (*table, columns)
            })
            .collect();
        info!("Generated fields");
    }

    /// Drop fields missing from the extract headers
    ///
    /// Only headers are read. Missing fields are logged and removed; an
    /// unreadable secondary or tertiary extract loses all its fields.
    ///
    /// # Errors
    /// Fails if the primary extract cannot be read or lacks the identifier
    pub fn validate_fields(&mut self) -> Result<()> {
        let mut validated = BTreeMap::new();

        for (table, fields) in &self.fields {
            let source = self.source(*table);
            let header = match self.reader(source).read_header(&source.data) {
                Ok(header) => header,
                Err(e) if *table == SourceTable::Primary => {
                    error!("Cannot read the primary extract header: {e}");
                    return Err(e);
                }
                Err(e) => {
                    log_warning(
                        &format!("Cannot read the {table} extract header ({e}), dropping its fields"),
                        Some(&source.data),
                    );
                    continue;
                }
            };

            if !header.contains(&self.eid_column) {
                if *table == SourceTable::Primary {
                    return Err(CohortError::Schema(format!(
                        "Primary extract {} has no '{}' column",
                        source.data.display(),
                        self.eid_column
                    )));
                }
                log_warning(
                    &format!("The {table} extract has no '{}' column, dropping its fields", self.eid_column),
                    Some(&source.data),
                );
                continue;
            }

            let kept: Vec<String> = fields
                .iter()
                .filter(|field| {
                    let present = header.contains(*field);
                    if !present {
                        warn!("Field {field} was not found. Removing it from {table} fields");
                    }
                    present
                })
                .cloned()
                .collect();

            if kept.len() > 1 {
                validated.insert(*table, kept);
            } else if *table != SourceTable::Primary {
                warn!("No {table} fields survived validation");
            } else {
                validated.insert(*table, kept);
            }
        }

        self.fields = validated;
        info!("Done validating the fields");
        Ok(())
    }

    /// Build the wide table
    ///
    /// # Returns
    /// The assembled table: primary subjects that also appear in every
    /// merged extract, with one column per validated field
    ///
    /// # Errors
    /// Fails if the primary extract is unreadable or contributes no field
    /// besides the identifier.
    pub fn create_dataset(&mut self) -> Result<&RecordBatch> {
        let start = Instant::now();
        let total_steps = 3;

        log_stage(1, total_steps, "Generating and validating fields");
        self.generate_fields();
        self.validate_fields()?;

        let primary_fields = self.fields(SourceTable::Primary);
        if primary_fields.len() <= 1 {
            return Err(CohortError::Precondition(
                "There are no primary fields to read".to_string(),
            ));
        }

        log_stage(2, total_steps, "Reading the primary extract");
        let primary = self.source(SourceTable::Primary);
        let mut dataset = self
            .reader(primary)
            .read_columns(&primary.data, primary_fields)
            .inspect_err(|e| error!("Cannot read {}: {e}", primary.data.display()))?;
        let base = EidFilter::from_batch(&dataset, &self.eid_column)?;
        if base.is_empty() {
            log_warning("The primary extract has no subjects", Some(&primary.data));
        } else {
            info!("Primary extract holds {} subjects", base.len());
        }

        log_stage(3, total_steps, "Merging secondary extracts by eid");
        for table in [SourceTable::Secondary, SourceTable::Tertiary] {
            let fields = self.fields(table);
            if fields.is_empty() {
                continue;
            }

            let source = self.source(table);
            info!("Reading {table} extract");
            let extract = self
                .reader(source)
                .read_columns(&source.data, fields)
                .inspect_err(|e| error!("Cannot read {}: {e}", source.data.display()))?;
            let extract = base.filter(&extract)?;

            info!("Merging {table} extract by {}", self.eid_column);
            dataset = inner_join_on_eid(&dataset, &extract, &self.eid_column)?;
        }

        info!(
            "Created dataset with {} subjects and {} columns in {:?}",
            dataset.num_rows(),
            dataset.num_columns(),
            start.elapsed()
        );
        Ok(self.dataset.insert(dataset))
    }

    /// Persist the wide table as CSV with a positional index column
    pub fn save_dataset(&self, path: &Path) -> Result<()> {
        let dataset = self.dataset.as_ref().ok_or_else(|| {
            CohortError::Precondition("The dataset has not been created".to_string())
        })?;
        info!("Saving dataset to {}", path.display());
        write_csv_with_index(dataset, path)
    }

    fn source(&self, table: SourceTable) -> &SourceTableConfig {
        match table {
            SourceTable::Primary => &self.sources.primary,
            SourceTable::Secondary => &self.sources.secondary,
            SourceTable::Tertiary => &self.sources.tertiary,
        }
    }

    fn reader(&self, source: &SourceTableConfig) -> TableReader {
        TableReader::for_path(&source.data).with_row_limit(self.row_limit)
    }
}
