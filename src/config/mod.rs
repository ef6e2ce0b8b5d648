//! Configuration for dataset assembly, cohort construction and training.
//!
//! Every section has a `Default` matching the standard biobank layout, so a
//! run needs no configuration file. A JSON file may override any subset of
//! fields.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{CohortError, Result};

/// Paths of one source extract and its field listing
#[derive(Debug, Clone, Deserialize)]
pub struct SourceTableConfig {
    /// Extract file, CSV or Parquet
    pub data: PathBuf,
    /// Newline separated list of field ids held by the extract
    pub fields: PathBuf,
}

impl SourceTableConfig {
    /// Create a source table configuration
    pub fn new(data: impl Into<PathBuf>, fields: impl Into<PathBuf>) -> Self {
        Self {
            data: data.into(),
            fields: fields.into(),
        }
    }
}

/// The three biobank extracts, in lookup priority order
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub primary: SourceTableConfig,
    pub secondary: SourceTableConfig,
    pub tertiary: SourceTableConfig,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            primary: SourceTableConfig::new("biobank/ukb672220.csv", "biobank/fields672220.ukb"),
            secondary: SourceTableConfig::new("biobank/ukb673316.csv", "biobank/fields673316.ukb"),
            tertiary: SourceTableConfig::new("biobank/ukb673540.csv", "biobank/fields673540.ukb"),
        }
    }
}

/// Configuration for cohort construction
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CohortConfig {
    /// Subject identifier column
    pub id_column: String,
    /// Catalog name used to locate the sex column
    pub sex_feature: String,
    /// Value of the sex column that marks a male subject
    pub male_code: f64,
    /// Name of the derived binary label
    pub label_column: String,
    /// Column whose presence marks a positive subject
    pub diagnosis_column: String,
    /// Companion date column dropped alongside the diagnosis column
    pub diagnosis_date_column: String,
    /// Catalog name of age at first menstruation
    pub menarche_feature: String,
    /// Catalog name of age at menopause
    pub menopause_feature: String,
    /// Answer codes meaning "not known"
    pub unknown_answer_codes: Vec<f64>,
    /// Name of the derived estrogen exposure column
    pub estrogen_column: String,
    /// Tab separated hospital diagnosis log
    pub diagnosis_log: PathBuf,
    /// Diagnosis code column of the log
    pub diagnosis_code_column: String,
    /// Name of the derived diagnosis count column
    pub diagnosis_count_column: String,
    /// Seed for balanced sampling; `None` draws from OS entropy
    pub random_seed: Option<u64>,
}

impl Default for CohortConfig {
    fn default() -> Self {
        Self {
            id_column: "eid".to_string(),
            sex_feature: "Sex".to_string(),
            male_code: 1.0,
            label_column: "has_endo".to_string(),
            diagnosis_column: "132123-0.0".to_string(),
            diagnosis_date_column: "132122-0.0".to_string(),
            menarche_feature: "menarche".to_string(),
            menopause_feature: "Age at menopause".to_string(),
            unknown_answer_codes: vec![-1.0, 3.0],
            estrogen_column: "estrogen_exposure".to_string(),
            diagnosis_log: PathBuf::from("biobank/hesin_diag.txt"),
            diagnosis_code_column: "diag_icd10".to_string(),
            diagnosis_count_column: "diag_count".to_string(),
            random_seed: None,
        }
    }
}

/// Configuration for model training and selection
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Share of the cohort held out for testing
    pub test_size: f64,
    /// Seed for the train/test split and cross-validation folds
    pub split_seed: u64,
    /// Number of cross-validation folds
    pub folds: usize,
    /// Estimator searched by `train`
    pub estimator: String,
    /// Worker threads for grid search
    pub n_jobs: usize,
    /// Features removed before splitting, by catalog name
    pub excluded_features: Vec<String>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_size: 0.3,
            split_seed: 42,
            folds: 5,
            estimator: "random_forest".to_string(),
            n_jobs: num_cpus::get(),
            excluded_features: vec![
                "Had menopause".to_string(),
                "Ever had hysterectomy".to_string(),
                "Age at hysterectomy".to_string(),
                "Age at menopause".to_string(),
                "Year of birth".to_string(),
            ],
        }
    }
}

/// Top-level configuration for a pipeline run
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Feature catalog (`Feature Name`, `UKB Number`)
    pub catalog: PathBuf,
    pub sources: SourcesConfig,
    /// Field ids requested from the extracts
    pub requested_fields: Vec<String>,
    /// Assembled wide table
    pub dataset: PathBuf,
    /// Optional output of the finished cohort
    pub cohort_output: Option<PathBuf>,
    /// Directory receiving model artifacts
    pub model_dir: PathBuf,
    pub cohort: CohortConfig,
    pub training: TrainingConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            catalog: PathBuf::from("Dataset/features_data.csv"),
            sources: SourcesConfig::default(),
            requested_fields: default_requested_fields(),
            dataset: PathBuf::from("Dataset/dataset_all.csv"),
            cohort_output: None,
            model_dir: PathBuf::from("."),
            cohort: CohortConfig::default(),
            training: TrainingConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load a configuration from a JSON file, filling absent fields with defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|e| CohortError::file_access(path, e))?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that would otherwise fail deep inside a stage
    pub fn validate(&self) -> Result<()> {
        let test_size = self.training.test_size;
        if !(test_size > 0.0 && test_size < 1.0) {
            return Err(CohortError::Config(format!(
                "test_size must be in (0, 1), got {test_size}"
            )));
        }
        if self.training.folds < 2 {
            return Err(CohortError::Config(format!(
                "folds must be at least 2, got {}",
                self.training.folds
            )));
        }
        if self.training.n_jobs == 0 {
            return Err(CohortError::Config("n_jobs must be positive".to_string()));
        }
        Ok(())
    }
}

impl fmt::Display for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Pipeline Configuration:")?;
        writeln!(f, "  Catalog: {}", self.catalog.display())?;
        writeln!(f, "  Primary Source: {}", self.sources.primary.data.display())?;
        writeln!(f, "  Secondary Source: {}", self.sources.secondary.data.display())?;
        writeln!(f, "  Tertiary Source: {}", self.sources.tertiary.data.display())?;
        writeln!(f, "  Requested Fields: {}", self.requested_fields.len())?;
        writeln!(f, "  Dataset: {}", self.dataset.display())?;
        writeln!(f, "  Diagnosis Log: {}", self.cohort.diagnosis_log.display())?;
        match self.cohort.random_seed {
            Some(seed) => writeln!(f, "  Sampling Seed: {seed}")?,
            None => writeln!(f, "  Sampling Seed: none")?,
        }
        writeln!(f, "  Estimator: {}", self.training.estimator)?;
        writeln!(f, "  Folds: {}", self.training.folds)?;
        writeln!(f, "  Test Size: {}", self.training.test_size)?;
        Ok(())
    }
}

/// Field ids of the endometriosis study extract
#[must_use]
pub fn default_requested_fields() -> Vec<String> {
    [
        "1369", "1309", "1408", "1349", "1299", "130622", "130624", "130626", "130638",
        "130694", "130696", "130736", "130746", "131052", "131054", "131638", "131894",
        "132122", "132123", "132150", "132156", "132157", "132168", "132206", "132234",
        "132244", "132280", "20433", "20434", "20445", "20446", "20449", "20505", "20510",
        "20515", "20516", "20519", "20520", "2090", "2100", "21001", "21002", "21022",
        "21024", "21026", "21045", "21047", "21050", "21062", "21063", "21065", "22127",
        "23099", "2714", "2724", "2734", "2754", "2774", "2784", "30010", "30020", "30030",
        "30800", "31", "34", "3591", "3710", "3720", "3839", "3849", "40006", "41272",
        "6152", "120009", "120016", "120017", "120026", "120028", "120043", "120044",
        "120114", "6154", "132128", "132106", "132112", "132146", "130736", "131628",
        "131626", "3581", "3741", "131638", "131640", "131630", "21031", "21045", "40008",
        "2976", "2754", "2764", "2824", "2794", "2804", "21050", "132124", "132130",
        "132264", "131604", "132070", "131928", "132162",
    ]
    .iter()
    .map(|s| (*s).to_string())
    .collect()
}
