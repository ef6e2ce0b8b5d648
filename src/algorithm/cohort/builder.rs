//! Cohort builder
//!
//! Owns the cohort table and applies the construction stages to it in
//! order.

use std::path::Path;
use std::time::Instant;

use log::{info, warn};

use arrow::record_batch::RecordBatch;

use crate::catalog::FeatureCatalog;
use crate::config::CohortConfig;
use crate::encoding::CategoricalEncoder;
use crate::error::{CohortError, Result};
use crate::filter::{BatchFilter, NotEqualFilter};
use crate::reader::{TableReader, strip_index_column, write_csv_with_index};
use crate::utils::arrow::{arrow_array_to_i64, drop_columns, get_column, rename_columns, with_column};
use crate::utils::logging::log_stage;

use super::derived::{
    diagnosis_count_column, estrogen_exposure_column, label_column, load_diagnosis_counts,
};
use super::sampling::balance_classes;
use super::{CohortStage, FeatureMatrix, LabelVector};

/// The study cohort and the stages already applied to it
#[derive(Debug, Clone)]
pub struct Cohort {
    batch: RecordBatch,
    config: CohortConfig,
    encoder: CategoricalEncoder,
    completed: Vec<CohortStage>,
}

impl Cohort {
    /// Wrap an assembled table
    #[must_use]
    pub fn new(batch: RecordBatch, config: CohortConfig) -> Self {
        Self {
            batch,
            config,
            encoder: CategoricalEncoder::standard(),
            completed: Vec::new(),
        }
    }

    /// Load the assembled table written by the dataset assembler
    pub fn from_csv(path: &Path, config: CohortConfig) -> Result<Self> {
        let batch = TableReader::for_path(path).read_all(path)?;
        Ok(Self::new(strip_index_column(&batch)?, config))
    }

    /// Replace the categorical encoder
    #[must_use]
    pub fn with_encoder(mut self, encoder: CategoricalEncoder) -> Self {
        self.encoder = encoder;
        self
    }

    #[must_use]
    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    #[must_use]
    pub fn into_batch(self) -> RecordBatch {
        self.batch
    }

    #[must_use]
    pub fn config(&self) -> &CohortConfig {
        &self.config
    }

    #[must_use]
    pub fn encoder(&self) -> &CategoricalEncoder {
        &self.encoder
    }

    /// Stages applied so far
    #[must_use]
    pub fn completed_stages(&self) -> &[CohortStage] {
        &self.completed
    }

    /// Run every construction stage
    pub fn create_cohort(&mut self, catalog: &FeatureCatalog) -> Result<()> {
        let start = Instant::now();
        self.run_stages(catalog, &CohortStage::STANDARD)?;
        info!(
            "Finished creating cohort: {} subjects, {} columns in {:?}",
            self.batch.num_rows(),
            self.batch.num_columns(),
            start.elapsed()
        );
        Ok(())
    }

    /// Run the given stages
    ///
    /// # Errors
    /// Stages must be given in order and each may run once; anything else
    /// is rejected with `Precondition` before any stage runs.
    pub fn run_stages(&mut self, catalog: &FeatureCatalog, stages: &[CohortStage]) -> Result<()> {
        let mut last = self.completed.last().copied();
        for stage in stages {
            if let Some(previous) = last {
                if *stage <= previous {
                    return Err(CohortError::Precondition(format!(
                        "Stage {stage} cannot run after {previous}"
                    )));
                }
            }
            last = Some(*stage);
        }

        for (step, stage) in stages.iter().enumerate() {
            log_stage(step + 1, stages.len(), stage.description());
            self.run_stage(*stage, catalog)?;
            self.completed.push(*stage);
        }
        Ok(())
    }

    fn run_stage(&mut self, stage: CohortStage, catalog: &FeatureCatalog) -> Result<()> {
        self.batch = match stage {
            CohortStage::ExcludeMale => self.exclude_male(catalog)?,
            CohortStage::DeriveLabel => self.derive_label(catalog)?,
            CohortStage::BalanceClasses => balance_classes(
                &self.batch,
                &self.config.label_column,
                self.config.random_seed,
            )?,
            CohortStage::EncodeCategorical => self.encoder.apply(&self.batch, catalog)?,
            CohortStage::EstrogenExposure => self.add_estrogen_exposure(catalog)?,
            CohortStage::DiagnosisCount => self.add_diagnosis_count()?,
        };
        Ok(())
    }

    fn exclude_male(&self, catalog: &FeatureCatalog) -> Result<RecordBatch> {
        let sex_column = catalog.resolve_code(&self.config.sex_feature)?;
        let before = self.batch.num_rows();
        let batch = NotEqualFilter::new(&sex_column, self.config.male_code).filter(&self.batch)?;
        info!(
            "Dropped {} male subjects, {} remain",
            before - batch.num_rows(),
            batch.num_rows()
        );
        info!("Dropping column {sex_column}");
        drop_columns(&batch, &[sex_column])
    }

    fn derive_label(&self, catalog: &FeatureCatalog) -> Result<RecordBatch> {
        let labels = label_column(&self.batch, &self.config.diagnosis_column)?;
        let batch = with_column(&self.batch, &self.config.label_column, labels)?;

        let dropped = [
            self.config.diagnosis_column.clone(),
            self.config.diagnosis_date_column.clone(),
        ];
        for column in &dropped {
            match catalog.resolve_name(column) {
                Ok(name) => info!("Dropping column {column} ({name})"),
                Err(_) => info!("Dropping column {column}"),
            }
        }
        drop_columns(&batch, &dropped)
    }

    fn add_estrogen_exposure(&self, catalog: &FeatureCatalog) -> Result<RecordBatch> {
        let menarche = catalog.resolve_code(&self.config.menarche_feature)?;
        let menopause = catalog.resolve_code(&self.config.menopause_feature)?;
        let exposure = estrogen_exposure_column(
            &self.batch,
            &menarche,
            &menopause,
            &self.config.unknown_answer_codes,
        )?;
        with_column(&self.batch, &self.config.estrogen_column, exposure)
    }

    fn add_diagnosis_count(&self) -> Result<RecordBatch> {
        let counts = load_diagnosis_counts(
            &self.config.diagnosis_log,
            &self.config.id_column,
            &self.config.diagnosis_code_column,
        )?;
        let column = diagnosis_count_column(&self.batch, &counts, &self.config.id_column)?;
        let batch = with_column(&self.batch, &self.config.diagnosis_count_column, column)?;
        drop_columns(&batch, &[self.config.id_column.as_str()])
    }

    /// Drop columns by name; names not in the table are ignored
    pub fn drop_columns<S: AsRef<str>>(&mut self, names: &[S]) -> Result<()> {
        self.batch = drop_columns(&self.batch, names)?;
        Ok(())
    }

    /// Drop columns by catalog feature name
    ///
    /// Names the catalog cannot resolve are skipped with a warning.
    pub fn drop_features<S: AsRef<str>>(
        &mut self,
        catalog: &FeatureCatalog,
        feature_names: &[S],
    ) -> Result<()> {
        let columns: Vec<String> = feature_names
            .iter()
            .filter_map(|name| match catalog.resolve_code(name.as_ref()) {
                Ok(code) => Some(code),
                Err(e) => {
                    warn!("Not dropping {}: {e}", name.as_ref());
                    None
                }
            })
            .collect();
        self.drop_columns(&columns)
    }

    /// Separate the label from the features
    ///
    /// Feature columns are renamed to their catalog feature names.
    ///
    /// # Errors
    /// Fails if a numeric column code is not in the catalog
    pub fn split_x_y(&self, catalog: &FeatureCatalog) -> Result<(FeatureMatrix, LabelVector)> {
        let label_column = &self.config.label_column;
        let labels: LabelVector = arrow_array_to_i64(get_column(&self.batch, label_column)?.as_ref())?
            .into_iter()
            .enumerate()
            .map(|(row, label)| match label {
                Some(0) => Ok(0),
                Some(1) => Ok(1),
                other => Err(CohortError::Schema(format!(
                    "Label '{label_column}' has value {other:?} at row {row}"
                ))),
            })
            .collect::<Result<_>>()?;

        let features = drop_columns(&self.batch, &[label_column])?;
        let names = features
            .schema()
            .fields()
            .iter()
            .map(|field| catalog.resolve_name(field.name()))
            .collect::<Result<Vec<_>>>()?;
        let features = rename_columns(&features, &names)?;

        Ok((FeatureMatrix::new(features), labels))
    }

    /// Write the cohort as CSV with a positional index column
    pub fn save(&self, path: &Path) -> Result<()> {
        info!("Saving cohort to {}", path.display());
        write_csv_with_index(&self.batch, path)
    }
}
