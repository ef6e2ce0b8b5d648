//! Feature catalog: human-readable feature names and their biobank codes.
//!
//! The catalog is loaded once and then shared by reference with every
//! component that translates between column codes (`"21001-0.0"`) and
//! feature names (`"Body mass index (BMI)"`).
//!
//! Name lookups are case-insensitive substring matches and return the
//! first matching entry in file order. Short queries can match several
//! entries; callers are expected to pass queries that are unique within the
//! catalog (diagnosis lookups use the ICD-10 code, e.g. `"N80"`).

pub mod sources;

use std::path::Path;

use log::{debug, error, info, warn};
use rustc_hash::FxHashMap;

use crate::error::{CohortError, Result};
use crate::reader::TableReader;
use crate::utils::arrow::{arrow_array_to_i64, arrow_array_to_utf8};

pub use sources::{SourceListings, SourceTable};

/// Catalog column holding the feature name
pub const FEATURE_NAME_COL: &str = "Feature Name";

/// Catalog column holding the numeric field code
pub const CODE_NUMBER_COL: &str = "UKB Number";

/// Visit/instance suffix of every extracted column
pub const INSTANCE_SUFFIX: &str = "-0.0";

/// One catalog row
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub name: String,
    pub code: u64,
    /// Extract holding the field, once listings have been attached
    pub source_table: Option<SourceTable>,
}

impl CatalogEntry {
    /// Column name of this field in the extracts
    #[must_use]
    pub fn column(&self) -> String {
        format!("{}{INSTANCE_SUFFIX}", self.code)
    }
}

/// Lookup table between feature names and field codes
#[derive(Debug, Clone, Default)]
pub struct FeatureCatalog {
    entries: Vec<CatalogEntry>,
    by_code: FxHashMap<u64, usize>,
}

impl FeatureCatalog {
    /// Load the catalog from a table with `Feature Name` and `UKB Number`
    /// columns; any other columns are ignored
    pub fn load(path: &Path) -> Result<Self> {
        let batch = TableReader::for_path(path)
            .read_columns(path, &[FEATURE_NAME_COL, CODE_NUMBER_COL])
            .inspect_err(|e| error!("Cannot load feature catalog {}: {e}", path.display()))?;

        let names = arrow_array_to_utf8(batch.column(0).as_ref())?;
        let codes = arrow_array_to_i64(batch.column(1).as_ref())?;

        let mut skipped = 0usize;
        let entries: Vec<(String, u64)> = names
            .iter()
            .zip(codes)
            .filter_map(|(name, code)| match (name, code.and_then(|c| u64::try_from(c).ok())) {
                (Some(name), Some(code)) => Some((name.to_string(), code)),
                _ => {
                    skipped += 1;
                    None
                }
            })
            .collect();

        if skipped > 0 {
            warn!("Skipped {skipped} catalog rows without a name or numeric code");
        }

        let catalog = Self::from_entries(entries);
        info!("Loaded {} catalog entries from {}", catalog.len(), path.display());
        Ok(catalog)
    }

    /// Build a catalog from `(name, code)` pairs, keeping their order
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, u64)>,
        S: Into<String>,
    {
        let entries: Vec<CatalogEntry> = entries
            .into_iter()
            .map(|(name, code)| CatalogEntry {
                name: name.into(),
                code,
                source_table: None,
            })
            .collect();

        let mut by_code = FxHashMap::default();
        for (idx, entry) in entries.iter().enumerate() {
            by_code.entry(entry.code).or_insert(idx);
        }

        Self { entries, by_code }
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog has no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in catalog order
    #[must_use]
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// Resolve a feature name to its column code (`"<code>-0.0"`)
    ///
    /// Returns the first entry whose name contains `feature_name`, ignoring
    /// case.
    ///
    /// # Errors
    /// Returns `NotFound` if no entry matches
    pub fn resolve_code(&self, feature_name: &str) -> Result<String> {
        let query = feature_name.to_lowercase();
        self.entries
            .iter()
            .find(|entry| entry.name.to_lowercase().contains(&query))
            .map(CatalogEntry::column)
            .ok_or_else(|| {
                error!("Feature name '{feature_name}' does not exist");
                CohortError::NotFound(format!("feature name '{feature_name}'"))
            })
    }

    /// Resolve a column code back to its feature name
    ///
    /// Only the part before the first `-` is compared. Names that are not
    /// numeric codes (derived columns such as `has_anemia`) are returned
    /// unchanged.
    ///
    /// # Errors
    /// Returns `NotFound` if the numeric code is not in the catalog
    pub fn resolve_name(&self, code: &str) -> Result<String> {
        let prefix = code.split('-').next().unwrap_or(code);
        if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_digit()) {
            return Ok(code.to_string());
        }

        prefix
            .parse::<u64>()
            .ok()
            .and_then(|number| self.by_code.get(&number))
            .map(|idx| self.entries[*idx].name.clone())
            .ok_or_else(|| {
                error!("Code number '{code}' does not exist");
                CohortError::NotFound(format!("code '{code}'"))
            })
    }

    /// Rename a feature in place
    ///
    /// With `is_value_code`, `old_name` is a column code and is resolved
    /// first. Unknown names are logged and otherwise ignored.
    pub fn rename(&mut self, old_name: &str, new_name: &str, is_value_code: bool) {
        let old_name = if is_value_code {
            match self.resolve_name(old_name) {
                Ok(name) => name,
                Err(e) => {
                    error!("Got an error - {e}");
                    return;
                }
            }
        } else {
            old_name.to_string()
        };

        let mut renamed = 0usize;
        for entry in self.entries.iter_mut().filter(|e| e.name == old_name) {
            entry.name = new_name.to_string();
            renamed += 1;
        }

        if renamed == 0 {
            error!("Got an error - Feature {old_name} does not exist");
            return;
        }
        info!("Renamed feature: {old_name} -> {new_name}");
    }

    /// Record which extract holds each catalog field
    pub fn annotate_sources(&mut self, listings: &SourceListings) {
        let mut unlisted = 0usize;
        for entry in &mut self.entries {
            entry.source_table = listings.classify(&entry.code.to_string());
            if entry.source_table.is_none() {
                unlisted += 1;
            }
        }
        debug!("{unlisted} catalog fields are not held by any extract");
    }

    /// Log every catalog entry
    pub fn log_features(&self, with_code: bool) {
        for entry in &self.entries {
            let source = entry
                .source_table
                .map_or_else(String::new, |t| format!(" [{t}]"));
            if with_code {
                info!("{} - {}{source}", entry.code, entry.name);
            } else {
                info!("{}{source}", entry.name);
            }
        }
    }
}
