//! Module for reading and writing flat tabular files as Arrow record batches.
//!
//! Biobank extracts are wide (thousands of columns) so every read is a
//! projection: the header is inspected first and only the requested columns
//! are decoded. CSV and Parquet sources are supported; the format is chosen
//! from the file extension.

use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use arrow::array::{ArrayRef, UInt64Array};
use arrow::compute::concat_batches;
use arrow::csv::reader::Format;
use arrow::csv::{ReaderBuilder, WriterBuilder};
use arrow::datatypes::{Field, Schema, SchemaRef};
use arrow::record_batch::{RecordBatch, RecordBatchReader};
use parquet::arrow::ProjectionMask;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use crate::error::{CohortError, Result};
use crate::utils::arrow::drop_columns;
use crate::utils::logging::{log_operation_complete, log_operation_start};

/// Name of the positional index column written in front of every output table
pub const INDEX_COLUMN: &str = "";

/// Default number of rows decoded per batch
pub const DEFAULT_BATCH_SIZE: usize = 16384;

/// On-disk layout of a table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    /// Delimited text with a header row
    Csv { delimiter: u8 },
    /// Apache Parquet
    Parquet,
}

impl TableFormat {
    /// Pick the format from a file extension
    ///
    /// `.parquet` is Parquet, `.txt` and `.tsv` are tab separated and
    /// everything else is comma separated.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("parquet") => Self::Parquet,
            Some(ext) if ext.eq_ignore_ascii_case("txt") || ext.eq_ignore_ascii_case("tsv") => {
                Self::Csv { delimiter: b'\t' }
            }
            _ => Self::Csv { delimiter: b',' },
        }
    }
}

/// Reader for projected table reads
#[derive(Debug, Clone)]
pub struct TableReader {
    format: TableFormat,
    row_limit: Option<usize>,
    batch_size: usize,
}

impl TableReader {
    /// Create a reader whose format follows the file extension of `path`
    #[must_use]
    pub fn for_path(path: &Path) -> Self {
        Self::new(TableFormat::from_path(path))
    }

    /// Create a reader for an explicit format
    #[must_use]
    pub fn new(format: TableFormat) -> Self {
        Self {
            format,
            row_limit: None,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Read at most `limit` data rows
    #[must_use]
    pub fn with_row_limit(mut self, limit: Option<usize>) -> Self {
        self.row_limit = limit;
        self
    }

    /// Read only the column names of a table
    ///
    /// # Arguments
    /// * `path` - Path to the table
    ///
    /// # Returns
    /// Column names in file order
    pub fn read_header(&self, path: &Path) -> Result<Vec<String>> {
        let file = open(path)?;
        let names = match self.format {
            TableFormat::Csv { delimiter } => {
                let format = Format::default()
                    .with_header(true)
                    .with_delimiter(delimiter);
                let (schema, _) = format.infer_schema(file, Some(0))?;
                schema.fields().iter().map(|f| f.name().clone()).collect()
            }
            TableFormat::Parquet => {
                let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
                builder
                    .schema()
                    .fields()
                    .iter()
                    .map(|f| f.name().clone())
                    .collect()
            }
        };
        Ok(names)
    }

    /// Read the named columns of a table into a single batch
    ///
    /// Columns come back in the order requested.
    ///
    /// # Arguments
    /// * `path` - Path to the table
    /// * `columns` - Names of the columns to decode
    ///
    /// # Returns
    /// A single record batch with one column per requested name
    ///
    /// # Errors
    /// Returns `MissingColumn` if a requested column is not in the header,
    /// or the underlying IO / decoding error.
    pub fn read_columns<S: AsRef<str>>(&self, path: &Path, columns: &[S]) -> Result<RecordBatch> {
        let start = Instant::now();
        log_operation_start("Reading columns from", path);

        let batch = match self.format {
            TableFormat::Csv { delimiter } => self.read_csv(path, delimiter, Some(columns))?,
            TableFormat::Parquet => self.read_parquet(path, Some(columns))?,
        };

        log_operation_complete(
            "read",
            path,
            batch.num_rows(),
            batch.num_columns(),
            Some(start.elapsed()),
        );
        Ok(batch)
    }

    /// Read every column of a table into a single batch
    pub fn read_all(&self, path: &Path) -> Result<RecordBatch> {
        let start = Instant::now();
        log_operation_start("Reading table", path);

        let batch = match self.format {
            TableFormat::Csv { delimiter } => self.read_csv::<&str>(path, delimiter, None)?,
            TableFormat::Parquet => self.read_parquet::<&str>(path, None)?,
        };

        log_operation_complete(
            "read",
            path,
            batch.num_rows(),
            batch.num_columns(),
            Some(start.elapsed()),
        );
        Ok(batch)
    }

    fn read_csv<S: AsRef<str>>(
        &self,
        path: &Path,
        delimiter: u8,
        columns: Option<&[S]>,
    ) -> Result<RecordBatch> {
        let format = Format::default()
            .with_header(true)
            .with_delimiter(delimiter);
        let (schema, _) = format.infer_schema(open(path)?, self.row_limit)?;
        let schema = Arc::new(schema);

        let mut builder = ReaderBuilder::new(Arc::clone(&schema))
            .with_header(true)
            .with_delimiter(delimiter)
            .with_batch_size(self.batch_size);
        if let Some(columns) = columns {
            builder = builder.with_projection(projection(&schema, columns)?);
        }
        if let Some(limit) = self.row_limit {
            builder = builder.with_bounds(0, limit);
        }

        let reader = builder.build(open(path)?)?;
        let output_schema = reader.schema();
        let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(concat_batches(&output_schema, &batches)?)
    }

    fn read_parquet<S: AsRef<str>>(&self, path: &Path, columns: Option<&[S]>) -> Result<RecordBatch> {
        let mut builder =
            ParquetRecordBatchReaderBuilder::try_new(open(path)?)?.with_batch_size(self.batch_size);

        if let Some(columns) = columns {
            let indices = projection(builder.schema(), columns)?;
            let mask = ProjectionMask::roots(builder.parquet_schema(), indices.iter().copied());
            builder = builder.with_projection(mask);
            let batch = self.collect_parquet(builder)?;
            // Parquet projections keep file order; restore the requested order
            let order = columns
                .iter()
                .map(|c| batch.schema().index_of(c.as_ref()))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            return Ok(batch.project(&order)?);
        }

        self.collect_parquet(builder)
    }

    fn collect_parquet(&self, builder: ParquetRecordBatchReaderBuilder<File>) -> Result<RecordBatch> {
        let builder = match self.row_limit {
            Some(limit) => builder.with_limit(limit),
            None => builder,
        };
        let reader = builder.build()?;
        let schema = reader.schema();
        let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(concat_batches(&schema, &batches)?)
    }
}

/// Resolve column names to positions in a file schema
fn projection<S: AsRef<str>>(schema: &SchemaRef, columns: &[S]) -> Result<Vec<usize>> {
    columns
        .iter()
        .map(|name| {
            schema
                .index_of(name.as_ref())
                .map_err(|_| CohortError::MissingColumn(name.as_ref().to_string()))
        })
        .collect()
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| CohortError::file_access(path, e))
}

/// Write a table as comma separated text with a leading positional index
///
/// # Arguments
/// * `batch` - The table to write
/// * `path` - Output file; missing parent directories are created
pub fn write_csv_with_index(batch: &RecordBatch, path: &Path) -> Result<()> {
    let start = Instant::now();
    log_operation_start("Writing table to", path);

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| CohortError::file_access(parent, e))?;
    }

    let index: ArrayRef = Arc::new(UInt64Array::from_iter_values(0..batch.num_rows() as u64));
    let mut fields = vec![Arc::new(Field::new(INDEX_COLUMN, index.data_type().clone(), false))];
    fields.extend(batch.schema().fields().iter().cloned());
    let mut columns = vec![index];
    columns.extend(batch.columns().iter().cloned());
    let indexed = RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?;

    let file = File::create(path).map_err(|e| CohortError::file_access(path, e))?;
    let mut writer = WriterBuilder::new()
        .with_header(true)
        .with_delimiter(b',')
        .build(file);
    writer.write(&indexed)?;

    log_operation_complete(
        "wrote",
        path,
        batch.num_rows(),
        batch.num_columns(),
        Some(start.elapsed()),
    );
    Ok(())
}

/// Drop a leading positional index column written by `write_csv_with_index`
/// or by other tools (`Unnamed: 0`)
pub fn strip_index_column(batch: &RecordBatch) -> Result<RecordBatch> {
    let schema = batch.schema();
    match schema.fields().first() {
        Some(field) if field.name() == INDEX_COLUMN || field.name().starts_with("Unnamed: ") => {
            drop_columns(batch, &[field.name().as_str()])
        }
        _ => Ok(batch.clone()),
    }
}
