//! Cohort construction and model training for a biobank endometriosis study.
//!
//! The pipeline assembles one wide table from several biobank extracts,
//! turns it into a balanced study cohort with derived indicator columns,
//! and trains and compares binary classifiers on it.

pub mod algorithm;
pub mod assembler;
pub mod catalog;
pub mod config;
pub mod encoding;
pub mod error;
pub mod filter;
pub mod model;
pub mod reader;
pub mod utils;

// Core types
pub use config::{CohortConfig, PipelineConfig, SourcesConfig, TrainingConfig};
pub use error::{CohortError, Result};

// Arrow types
pub use arrow::record_batch::RecordBatch;

// Pipeline stages
pub use algorithm::cohort::{Cohort, CohortStage, FeatureMatrix, LabelVector};
pub use assembler::DatasetAssembler;
pub use catalog::{FeatureCatalog, SourceListings, SourceTable};
pub use encoding::{CategoricalEncoder, EncodingRule};

// Training
pub use model::{
    Classifier, EstimatorKind, GridSearch, ModelSelector, ModelSpec, ModelTrainer, TrainedModel,
    TrainingData,
};

// Table IO
pub use reader::{TableFormat, TableReader};
