use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, Int64Array};
use arrow::record_batch::RecordBatch;
use tempfile::TempDir;
use ukb_cohort::FeatureCatalog;
use ukb_cohort::utils::arrow::arrow_array_to_f64;

/// Diagnosis codes read by the standard categorical encoder, except O82
pub const DIAGNOSIS_CODES: [&str; 34] = [
    "O26", "O44", "O60", "O00", "O70", "G43", "G44", "E02", "E03", "E34", "D50", "D51", "D52",
    "D59", "N81", "N84", "N83", "N70", "N73", "K52", "K59", "K50", "K51", "O03", "K58", "N97",
    "M32", "N94", "M54", "N39", "K35", "N92", "E28", "N72",
];

/// First field code assigned to the generated diagnosis entries
const FIRST_DIAGNOSIS_FIELD: u64 = 140_000;

/// A scratch directory removed when dropped
pub struct Fixture {
    dir: TempDir,
}

impl Fixture {
    #[must_use]
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create temp dir"),
        }
    }

    #[must_use]
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Write `contents` to `name` inside the fixture
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.path(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create fixture dir");
        }
        fs::write(&path, contents).expect("write fixture file");
        path
    }

    /// Write the study catalog as CSV with an extra ignored column
    pub fn write_catalog(&self) -> PathBuf {
        let mut csv = String::from("Feature Name,UKB Number,Category\n");
        for (name, code) in catalog_entries() {
            csv.push_str(&format!("{name},{code},Test\n"));
        }
        self.write("features_data.csv", &csv)
    }
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Field code of a generated diagnosis entry
#[must_use]
pub fn diagnosis_field(code: &str) -> u64 {
    let position = DIAGNOSIS_CODES
        .iter()
        .position(|c| *c == code)
        .expect("known diagnosis code");
    FIRST_DIAGNOSIS_FIELD + position as u64
}

/// Column name of a generated diagnosis entry
#[must_use]
pub fn diagnosis_column(code: &str) -> String {
    format!("{}-0.0", diagnosis_field(code))
}

/// Catalog rows covering every feature the cohort stages resolve
#[must_use]
pub fn catalog_entries() -> Vec<(String, u64)> {
    let mut entries: Vec<(String, u64)> = [
        ("Sex", 31),
        ("Year of birth", 34),
        ("Age when periods started (menarche)", 2714),
        ("Had menopause", 2724),
        ("Age at hysterectomy", 2824),
        ("Age at menopause (last menstrual period)", 3581),
        ("Ever had hysterectomy (womb removed)", 3591),
        ("Body mass index (BMI)", 21001),
        ("Type of cancer: ICD10", 40006),
        ("Operative procedures - main OPCS4", 41272),
        ("Date N80 first reported (endometriosis)", 132122),
        ("Source of report of N80 (endometriosis)", 132123),
        ("Date O82 first reported (single delivery by caesarean section)", 132280),
    ]
    .into_iter()
    .map(|(name, code)| (name.to_string(), code))
    .collect();

    entries.extend(
        DIAGNOSIS_CODES
            .iter()
            .map(|code| (format!("Date {code} first reported"), diagnosis_field(code))),
    );
    entries
}

/// The study catalog, built in memory
#[must_use]
pub fn study_catalog() -> FeatureCatalog {
    FeatureCatalog::from_entries(catalog_entries())
}

/// Build a batch of nullable float columns
#[must_use]
pub fn float_batch(columns: Vec<(&str, Vec<Option<f64>>)>) -> RecordBatch {
    RecordBatch::try_from_iter(
        columns
            .into_iter()
            .map(|(name, values)| (name, Arc::new(Float64Array::from(values)) as ArrayRef)),
    )
    .expect("build batch")
}

/// Build a batch with an `eid` column followed by nullable float columns
#[must_use]
pub fn subject_batch(eids: Vec<i64>, columns: Vec<(&str, Vec<Option<f64>>)>) -> RecordBatch {
    let mut arrays: Vec<(&str, ArrayRef)> = vec![("eid", Arc::new(Int64Array::from(eids)))];
    arrays.extend(
        columns
            .into_iter()
            .map(|(name, values)| (name, Arc::new(Float64Array::from(values)) as ArrayRef)),
    );
    RecordBatch::try_from_iter(arrays).expect("build batch")
}

/// Read a column as nullable floats
#[must_use]
pub fn column_values(batch: &RecordBatch, name: &str) -> Vec<Option<f64>> {
    let column = batch
        .column_by_name(name)
        .unwrap_or_else(|| panic!("column {name} is missing"));
    arrow_array_to_f64(column.as_ref()).expect("numeric column")
}

/// Read a 0/1 indicator column
#[must_use]
pub fn indicator_values(batch: &RecordBatch, name: &str) -> Vec<i64> {
    let column = batch
        .column_by_name(name)
        .unwrap_or_else(|| panic!("column {name} is missing"));
    let values = column
        .as_any()
        .downcast_ref::<Int64Array>()
        .expect("indicator column is Int64");
    assert_eq!(values.null_count(), 0, "indicator {name} has nulls");
    values.values().to_vec()
}

/// Column names of a batch
#[must_use]
pub fn column_names(batch: &RecordBatch) -> Vec<String> {
    batch
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect()
}

/// Ensure the given path exists
pub fn assert_exists(path: &Path) {
    assert!(path.exists(), "expected {} to exist", path.display());
}
