//! Table file storage (Arrow/Parquet)
//!
//! **Append-Only Design**:
//! - A table file holds named tables; each table is an ordered list of observations
//! - Write pattern: whole-file rewrite from the in-memory log (temp file + rename)
//! - Read pattern: every table is returned in the exact order rows were appended
//!
//! ## Layout
//!
//! One Parquet file, long format, one row per observation:
//!
//! ```text
//! table: Utf8 | row: UInt64 | shape: List<UInt64> | values: List<Float64>
//! ```
//!
//! The `row` column is the per-table append index. Readers verify that it
//! runs `0..n` for every table, so append order is part of the format rather
//! than an accident of Parquet row-group ordering.
//!
//! Tables whose names start with [`PARAMETER_PREFIX`] hold model parameters.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{
    Array, Float64Array, Float64Builder, ListArray, ListBuilder, StringArray, StringBuilder,
    UInt64Array, UInt64Builder,
};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use tracing::debug;

use crate::metrics::Observation;
use crate::{Error, Result};

/// Reserved table-name prefix for model parameters.
pub const PARAMETER_PREFIX: &str = "model.";

/// Arrow schema of a table file.
#[must_use]
pub fn table_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("table", DataType::Utf8, false),
        Field::new("row", DataType::UInt64, false),
        Field::new(
            "shape",
            DataType::List(Arc::new(Field::new("item", DataType::UInt64, true))),
            false,
        ),
        Field::new(
            "values",
            DataType::List(Arc::new(Field::new("item", DataType::Float64, true))),
            false,
        ),
    ]))
}

/// Model parameters restored from a checkpoint, keyed by parameter name
/// (table name without [`PARAMETER_PREFIX`]).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelParameters {
    params: BTreeMap<String, Observation>,
}

impl ModelParameters {
    /// Create an empty parameter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a parameter.
    pub fn insert(&mut self, name: impl Into<String>, value: Observation) {
        self.params.insert(name.into(), value);
    }

    /// Get a parameter by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Observation> {
        self.params.get(name)
    }

    /// Iterate over parameters in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Observation)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Check if there are no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

/// Named-table file: the persisted form of a metrics log and the checkpoint
/// a run resumes from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableFile {
    tables: BTreeMap<String, Vec<Observation>>,
}

impl TableFile {
    /// Create an empty table file (in memory).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one observation to a table, creating the table if needed.
    pub fn append(&mut self, table: impl Into<String>, observation: Observation) {
        self.tables.entry(table.into()).or_default().push(observation);
    }

    /// Load a table file from disk
    ///
    /// # Errors
    /// Returns `Storage` if the file cannot be opened or parsed, and
    /// `DataIntegrity` if its tables are not stored in append order.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            Error::Storage(format!("Failed to open table file {}: {e}", path.display()))
        })?;

        let builder = ParquetRecordBatchReaderBuilder::try_new(file).map_err(|e| {
            Error::Storage(format!("Failed to parse table file {}: {e}", path.display()))
        })?;

        let reader = builder.build().map_err(|e| {
            Error::Storage(format!("Failed to create table file reader: {e}"))
        })?;

        let mut table_file = Self::new();
        for batch in reader {
            let batch = batch.map_err(|e| {
                Error::Storage(format!("Failed to read record batch: {e}"))
            })?;
            table_file.extend_from_batch(&batch)?;
        }

        debug!(
            path = %path.display(),
            tables = table_file.tables.len(),
            "loaded table file"
        );
        Ok(table_file)
    }

    /// Write named tables to `path`, replacing any previous file.
    ///
    /// The file is written next to the target and renamed into place, so a
    /// reader never sees a half-written checkpoint.
    ///
    /// # Errors
    /// Returns error if the file cannot be written.
    pub fn write<'a, P, I>(path: P, tables: I) -> Result<()>
    where
        P: AsRef<Path>,
        I: IntoIterator<Item = (&'a str, &'a [Observation])>,
    {
        use parquet::arrow::ArrowWriter;

        let path = path.as_ref();
        let batch = to_record_batch(tables)?;

        let tmp = temp_path(path);
        let file = File::create(&tmp)?;
        let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
        writer.write(&batch)?;
        writer.close()?;
        fs::rename(&tmp, path)?;

        debug!(path = %path.display(), rows = batch.num_rows(), "wrote table file");
        Ok(())
    }

    /// Write this table file to `path`.
    ///
    /// # Errors
    /// Returns error if the file cannot be written.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        Self::write(path, self.iter())
    }

    /// Iterate over `(name, rows)` pairs; rows are in append order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Observation])> {
        self.tables.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Table names.
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// Rows of one table, in append order.
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&[Observation]> {
        self.tables.get(name).map(Vec::as_slice)
    }

    /// Number of tables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Check if the file holds no tables.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Latest value of every `model.*` table.
    #[must_use]
    pub fn model_parameters(&self) -> ModelParameters {
        let mut params = ModelParameters::new();
        for (name, rows) in &self.tables {
            if let (Some(param), Some(last)) = (name.strip_prefix(PARAMETER_PREFIX), rows.last()) {
                params.insert(param, last.clone());
            }
        }
        params
    }

    fn extend_from_batch(&mut self, batch: &RecordBatch) -> Result<()> {
        let tables: &StringArray = column(batch, "table")?;
        let rows: &UInt64Array = column(batch, "row")?;
        let shapes: &ListArray = column(batch, "shape")?;
        let values: &ListArray = column(batch, "values")?;

        for i in 0..batch.num_rows() {
            let name = tables.value(i);
            let row = rows.value(i);
            let existing = self.tables.get(name).map_or(0, Vec::len);

            if row != existing as u64 {
                return Err(Error::DataIntegrity(format!(
                    "table '{name}': expected row {existing}, found row {row}"
                )));
            }

            let shape_array = shapes.value(i);
            let shape = shape_array
                .as_any()
                .downcast_ref::<UInt64Array>()
                .ok_or_else(|| Error::DataIntegrity(format!("table '{name}': bad shape column")))?
                .values()
                .iter()
                .map(|&d| {
                    usize::try_from(d).map_err(|_| {
                        Error::DataIntegrity(format!("table '{name}': dimension {d} too large"))
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            let value_array = values.value(i);
            let data = value_array
                .as_any()
                .downcast_ref::<Float64Array>()
                .ok_or_else(|| Error::DataIntegrity(format!("table '{name}': bad values column")))?
                .values()
                .to_vec();

            let observation = Observation::array(shape, data)
                .map_err(|e| Error::DataIntegrity(format!("table '{name}' row {row}: {e}")))?;
            self.append(name, observation);
        }
        Ok(())
    }
}

fn column<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<T>())
        .ok_or_else(|| Error::DataIntegrity(format!("table file is missing column '{name}'")))
}

fn to_record_batch<'a, I>(tables: I) -> Result<RecordBatch>
where
    I: IntoIterator<Item = (&'a str, &'a [Observation])>,
{
    let mut table_builder = StringBuilder::new();
    let mut row_builder = UInt64Builder::new();
    let mut shape_builder = ListBuilder::new(UInt64Builder::new());
    let mut values_builder = ListBuilder::new(Float64Builder::new());

    for (name, rows) in tables {
        for (row, observation) in rows.iter().enumerate() {
            table_builder.append_value(name);
            row_builder.append_value(row as u64);
            for &dim in observation.shape() {
                shape_builder.values().append_value(dim as u64);
            }
            shape_builder.append(true);
            values_builder.values().append_slice(observation.values());
            values_builder.append(true);
        }
    }

    let batch = RecordBatch::try_new(
        table_schema(),
        vec![
            Arc::new(table_builder.finish()),
            Arc::new(row_builder.finish()),
            Arc::new(shape_builder.finish()),
            Arc::new(values_builder.finish()),
        ],
    )?;
    Ok(batch)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
