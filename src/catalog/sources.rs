//! Which source extract holds which field
//!
//! Each biobank extract ships with a listing of its field ids, one per
//! line. A field is looked up in the primary, secondary and tertiary
//! listings in that order; the first listing holding it wins.

use std::fmt;
use std::fs;
use std::path::Path;

use log::warn;
use rustc_hash::FxHashSet;
use serde::Serialize;

use crate::config::SourcesConfig;
use crate::error::{CohortError, Result};

/// The source extracts, in lookup priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum SourceTable {
    Primary,
    Secondary,
    Tertiary,
}

impl SourceTable {
    /// All tables in priority order
    pub const ALL: [Self; 3] = [Self::Primary, Self::Secondary, Self::Tertiary];
}

impl fmt::Display for SourceTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Secondary => write!(f, "secondary"),
            Self::Tertiary => write!(f, "tertiary"),
        }
    }
}

/// Field ids held by each source extract
#[derive(Debug, Clone, Default)]
pub struct SourceListings {
    primary: FxHashSet<String>,
    secondary: FxHashSet<String>,
    tertiary: FxHashSet<String>,
}

impl SourceListings {
    /// Build listings from in-memory field ids
    pub fn from_fields<P, S, T>(primary: P, secondary: S, tertiary: T) -> Self
    where
        P: IntoIterator,
        P::Item: Into<String>,
        S: IntoIterator,
        S::Item: Into<String>,
        T: IntoIterator,
        T::Item: Into<String>,
    {
        Self {
            primary: primary.into_iter().map(Into::into).collect(),
            secondary: secondary.into_iter().map(Into::into).collect(),
            tertiary: tertiary.into_iter().map(Into::into).collect(),
        }
    }

    /// Load the three listing files
    ///
    /// # Errors
    /// The primary listing is required. A missing secondary or tertiary
    /// listing only means no field can be sourced from that extract.
    pub fn load(sources: &SourcesConfig) -> Result<Self> {
        let primary = fs::read_to_string(&sources.primary.fields)
            .map_err(|e| CohortError::file_access(&sources.primary.fields, e))?;

        Ok(Self {
            primary: parse_listing(&primary),
            secondary: load_optional_listing(&sources.secondary.fields),
            tertiary: load_optional_listing(&sources.tertiary.fields),
        })
    }

    /// Find the first table, in priority order, holding `field`
    #[must_use]
    pub fn classify(&self, field: &str) -> Option<SourceTable> {
        SourceTable::ALL
            .into_iter()
            .find(|table| self.fields(*table).contains(field))
    }

    /// Field ids held by one table
    #[must_use]
    pub fn fields(&self, table: SourceTable) -> &FxHashSet<String> {
        match table {
            SourceTable::Primary => &self.primary,
            SourceTable::Secondary => &self.secondary,
            SourceTable::Tertiary => &self.tertiary,
        }
    }
}

fn load_optional_listing(path: &Path) -> FxHashSet<String> {
    match fs::read_to_string(path) {
        Ok(content) => parse_listing(&content),
        Err(e) => {
            warn!("Field listing {} unavailable ({e}), treating it as empty", path.display());
            FxHashSet::default()
        }
    }
}

fn parse_listing(content: &str) -> FxHashSet<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ToString::to_string)
        .collect()
}
