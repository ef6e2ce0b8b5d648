use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{debug, info, warn};

use ukb_cohort::algorithm::cohort::{indicator_stats, null_percentages};
use ukb_cohort::model::{accuracy, save_model, timestamp};
use ukb_cohort::{
    Classifier, Cohort, DatasetAssembler, FeatureCatalog, GridSearch, ModelSelector, ModelTrainer,
    PipelineConfig, SourceListings, TrainingData,
};

#[derive(Parser, Debug)]
#[command(name = "ukb-cohort")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Biobank endometriosis cohort builder and model trainer", long_about = None)]
struct Args {
    /// JSON configuration file; defaults are used for absent fields
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Merge the source extracts into the wide study table
    Assemble {
        /// Output CSV, overriding the configured dataset path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Read at most this many rows from each extract
        #[arg(long)]
        rows: Option<usize>,
    },
    /// Build the cohort and grid-search the configured estimator
    Train {
        /// Directory for the model and search summary
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Build the cohort and compare every estimator family
    Compare,
    /// List the feature catalog and the extract holding each field
    Features {
        /// Print field codes next to the names
        #[arg(long)]
        codes: bool,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("Failed to load configuration {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    info!("{config}");

    let start = Instant::now();
    match args.command {
        Command::Assemble { output, rows } => assemble(&config, output, rows)?,
        Command::Train { output } => train(&config, output)?,
        Command::Compare => compare(&config)?,
        Command::Features { codes } => features(&config, codes)?,
    }
    info!("Finished in {:?}", start.elapsed());
    Ok(())
}

fn assemble(config: &PipelineConfig, output: Option<PathBuf>, rows: Option<usize>) -> Result<()> {
    let listings =
        SourceListings::load(&config.sources).context("Failed to load field listings")?;
    let mut assembler = DatasetAssembler::new(
        config.sources.clone(),
        listings,
        config.requested_fields.iter().cloned(),
    )
    .with_row_limit(rows)
    .with_eid_column(config.cohort.id_column.as_str());

    assembler
        .create_dataset()
        .context("Failed to assemble the dataset")?;

    let output = output.unwrap_or_else(|| config.dataset.clone());
    assembler
        .save_dataset(&output)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    Ok(())
}

/// Build the cohort and split it into training and test rows
fn prepare(config: &PipelineConfig) -> Result<(TrainingData, TrainingData)> {
    let catalog = FeatureCatalog::load(&config.catalog).context("Failed to load the catalog")?;

    info!("Creating the cohort");
    let mut cohort = Cohort::from_csv(&config.dataset, config.cohort.clone())
        .with_context(|| format!("Failed to read {}", config.dataset.display()))?;
    cohort
        .create_cohort(&catalog)
        .context("Failed to create the cohort")?;

    for stats in indicator_stats(cohort.batch(), &cohort.encoder().output_columns())? {
        debug!("{stats}");
    }
    for missing in null_percentages(cohort.batch(), &catalog)?.iter().take(10) {
        debug!("{:>6.2}% missing: {}", missing.percent, missing.feature);
    }

    cohort.drop_features(&catalog, &config.training.excluded_features)?;

    if let Some(path) = &config.cohort_output {
        cohort.save(path)?;
    }

    info!("Splitting to X and y");
    let (features, labels) = cohort.split_x_y(&catalog)?;
    let data = TrainingData::from_features(&features, &labels)?;
    Ok(data.train_test_split(config.training.test_size, config.training.split_seed)?)
}

fn train(config: &PipelineConfig, output: Option<PathBuf>) -> Result<()> {
    let (train, test) = prepare(config)?;

    let search = GridSearch::from_config(&config.training)?;
    info!("Running grid search for {}", search.kind());
    let mut outcome = search.train(&train).context("Grid search failed")?;

    let test_accuracy = accuracy(test.labels(), &outcome.model.predict_all(test.rows()));
    info!("{} model accuracy score: {test_accuracy:.4}", search.kind());
    outcome.summary.test_accuracy = Some(test_accuracy);

    let dir = output.unwrap_or_else(|| config.model_dir.clone());
    let ts = timestamp();
    outcome.summary.write_json(&dir, &ts)?;
    save_model(&outcome.model, &dir, &ts)?;
    info!("Grid search completed. Results saved with timestamp {ts}");
    Ok(())
}

fn compare(config: &PipelineConfig) -> Result<()> {
    let (train, test) = prepare(config)?;

    let mut selector = ModelSelector::default().with_seed(config.training.split_seed);
    selector.train_models(&train, &test)?;
    selector.log_results();
    Ok(())
}

fn features(config: &PipelineConfig, codes: bool) -> Result<()> {
    let mut catalog = FeatureCatalog::load(&config.catalog).context("Failed to load the catalog")?;
    match SourceListings::load(&config.sources) {
        Ok(listings) => catalog.annotate_sources(&listings),
        Err(e) => warn!("Field listings unavailable, extracts not shown: {e}"),
    }
    catalog.log_features(codes);
    Ok(())
}
