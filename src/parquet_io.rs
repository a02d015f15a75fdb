//! Parquet output for flattened batches
//!
//! Two writers implement [`ColumnarWriter`]:
//!
//! - [`ChunkedWriter`] writes every batch to its own `<base>_<n>.parquet` file.
//!   Only one batch is resident at a time, so memory stays bounded by the chunk size.
//! - [`AccumulatingWriter`] keeps every batch in memory and writes a single file
//!   when finalized. Peak memory grows with the full output; it is only suitable
//!   when the flattened dataset fits comfortably in RAM.
//!
//! Both follow the lifecycle `Idle -> Opened -> Streaming* -> Finalized`.
//! A failed write is fatal and files already on disk are left in place.

use crate::cf_time::TimeAxis;
use crate::errors::{ConvertError, Result};
use crate::flatten::Batch;
use arrow::array::{ArrayRef, Float64Array, RecordBatch, TimestampNanosecondArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use chrono::Utc;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use parquet::format::KeyValue;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Column layout of the output table
#[derive(Debug, Clone, PartialEq)]
pub struct TableLayout {
    pub value_field: String,
    pub time_axis: TimeAxis,
    pub source: PathBuf,
}

impl TableLayout {
    pub fn new(
        value_field: impl Into<String>,
        time_axis: TimeAxis,
        source: impl Into<PathBuf>,
    ) -> Self {
        Self {
            value_field: value_field.into(),
            time_axis,
            source: source.into(),
        }
    }

    /// Arrow schema: `time`, `latitude`, `longitude`, then the value field.
    pub fn schema(&self) -> SchemaRef {
        let time_type = if self.time_axis.is_calendar() {
            DataType::Timestamp(TimeUnit::Nanosecond, None)
        } else {
            DataType::Float64
        };
        Arc::new(Schema::new(vec![
            Field::new("time", time_type, true),
            Field::new("latitude", DataType::Float64, false),
            Field::new("longitude", DataType::Float64, false),
            Field::new(self.value_field.as_str(), DataType::Float64, true),
        ]))
    }

    /// Convert a batch into an Arrow record batch matching [`TableLayout::schema`].
    ///
    /// NaN values become nulls, as do time offsets that cannot be represented as
    /// timestamps.
    pub fn to_record_batch(
        &self,
        schema: &SchemaRef,
        batch: &Batch,
    ) -> arrow::error::Result<RecordBatch> {
        let time_col: ArrayRef = match self.time_axis {
            TimeAxis::Calendar { .. } => Arc::new(
                batch
                    .time
                    .iter()
                    .map(|&t| self.time_axis.to_timestamp_ns(t))
                    .collect::<TimestampNanosecondArray>(),
            ),
            TimeAxis::Raw => Arc::new(Float64Array::from_iter_values(batch.time.iter().copied())),
        };
        let latitude_col: ArrayRef =
            Arc::new(Float64Array::from_iter_values(batch.latitude.iter().copied()));
        let longitude_col: ArrayRef =
            Arc::new(Float64Array::from_iter_values(batch.longitude.iter().copied()));
        let value_col: ArrayRef = Arc::new(
            batch
                .value
                .iter()
                .map(|&v| (!v.is_nan()).then_some(v))
                .collect::<Float64Array>(),
        );

        RecordBatch::try_new(
            schema.clone(),
            vec![time_col, latitude_col, longitude_col, value_col],
        )
    }

    fn writer_properties(&self) -> WriterProperties {
        WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .set_key_value_metadata(Some(vec![
                KeyValue::new(
                    "nc_parquet.source".to_string(),
                    self.source.display().to_string(),
                ),
                KeyValue::new("nc_parquet.created".to_string(), Utc::now().to_rfc3339()),
            ]))
            .build()
    }
}

/// Lifecycle of a [`ColumnarWriter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    Idle,
    Opened,
    Streaming,
    Finalized,
}

impl WriterState {
    fn open(&mut self) -> Result<()> {
        match self {
            WriterState::Idle => {
                *self = WriterState::Opened;
                Ok(())
            }
            other => Err(misuse(format!("open called in state {:?}", other))),
        }
    }

    fn stream(&mut self) -> Result<()> {
        match self {
            WriterState::Opened | WriterState::Streaming => {
                *self = WriterState::Streaming;
                Ok(())
            }
            other => Err(misuse(format!("write_batch called in state {:?}", other))),
        }
    }

    fn finalize(&mut self) -> Result<()> {
        match self {
            WriterState::Opened | WriterState::Streaming => {
                *self = WriterState::Finalized;
                Ok(())
            }
            other => Err(misuse(format!("finalize called in state {:?}", other))),
        }
    }
}

fn misuse(message: String) -> ConvertError {
    ConvertError::WriterState { message }
}

/// Sink for flattened batches
pub trait ColumnarWriter {
    /// Fix the output layout. Must be called once, before any batch.
    fn open(&mut self, layout: TableLayout) -> Result<()>;

    /// Hand over the next batch, in slice order.
    fn write_batch(&mut self, batch: &Batch) -> Result<()>;

    /// Flush whatever is pending and return the files this writer produced.
    fn finalize(&mut self) -> Result<Vec<PathBuf>>;

    fn state(&self) -> WriterState;
}

/// Layout, schema and properties fixed at `open`
struct OpenTable {
    layout: TableLayout,
    schema: SchemaRef,
    props: WriterProperties,
}

impl OpenTable {
    fn new(layout: TableLayout) -> Self {
        let schema = layout.schema();
        let props = layout.writer_properties();
        Self {
            layout,
            schema,
            props,
        }
    }
}

fn opened(table: &Option<OpenTable>) -> Result<&OpenTable> {
    table
        .as_ref()
        .ok_or_else(|| misuse("writer has not been opened".to_string()))
}

/// Write record batches into one Parquet file at `path`.
fn write_parquet_file(
    path: &Path,
    schema: &SchemaRef,
    props: &WriterProperties,
    batches: &[RecordBatch],
) -> Result<()> {
    let file = File::create(path).map_err(|e| ConvertError::write(path, e))?;
    let mut writer = ArrowWriter::try_new(file, schema.clone(), Some(props.clone()))
        .map_err(|e| ConvertError::write(path, e))?;

    for batch in batches {
        writer.write(batch).map_err(|e| ConvertError::write(path, e))?;
    }

    writer.close().map_err(|e| ConvertError::write(path, e))?;
    Ok(())
}

/// Path of chunk `index` for a given base, e.g. `pq/data` -> `pq/data_3.parquet`.
pub fn chunk_path(base: &Path, index: usize) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(format!("_{}.parquet", index));
    PathBuf::from(name)
}

/// Strategy A: one Parquet file per batch
pub struct ChunkedWriter {
    base: PathBuf,
    next_index: usize,
    table: Option<OpenTable>,
    written: Vec<PathBuf>,
    state: WriterState,
}

impl ChunkedWriter {
    /// Files are named `<base>_<n>.parquet`; the parent directory must exist.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            next_index: 0,
            table: None,
            written: Vec::new(),
            state: WriterState::Idle,
        }
    }
}

impl ColumnarWriter for ChunkedWriter {
    fn open(&mut self, layout: TableLayout) -> Result<()> {
        self.state.open()?;
        self.table = Some(OpenTable::new(layout));
        Ok(())
    }

    fn write_batch(&mut self, batch: &Batch) -> Result<()> {
        self.state.stream()?;
        let table = opened(&self.table)?;
        let path = chunk_path(&self.base, self.next_index);

        let record_batch = table
            .layout
            .to_record_batch(&table.schema, batch)
            .map_err(|e| ConvertError::write(&path, e))?;
        write_parquet_file(&path, &table.schema, &table.props, &[record_batch])?;

        debug!(path = %path.display(), rows = batch.len(), "wrote chunk file");
        self.written.push(path);
        self.next_index += 1;
        Ok(())
    }

    fn finalize(&mut self) -> Result<Vec<PathBuf>> {
        self.state.finalize()?;
        info!(files = self.written.len(), "chunked output complete");
        Ok(self.written.clone())
    }

    fn state(&self) -> WriterState {
        self.state
    }
}

/// Strategy B: accumulate every batch in memory, write one file at the end
///
/// Memory is not bounded: the whole output table is resident before anything
/// reaches disk, and an interrupted run leaves no output at all.
pub struct AccumulatingWriter {
    path: PathBuf,
    table: Option<OpenTable>,
    accumulated: Vec<RecordBatch>,
    rows: usize,
    state: WriterState,
}

impl AccumulatingWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            table: None,
            accumulated: Vec::new(),
            rows: 0,
            state: WriterState::Idle,
        }
    }

    /// Rows held in memory so far.
    pub fn accumulated_rows(&self) -> usize {
        self.rows
    }
}

impl ColumnarWriter for AccumulatingWriter {
    fn open(&mut self, layout: TableLayout) -> Result<()> {
        self.state.open()?;
        self.table = Some(OpenTable::new(layout));
        Ok(())
    }

    fn write_batch(&mut self, batch: &Batch) -> Result<()> {
        self.state.stream()?;
        let table = opened(&self.table)?;

        let record_batch = table
            .layout
            .to_record_batch(&table.schema, batch)
            .map_err(|e| ConvertError::write(&self.path, e))?;
        self.rows += record_batch.num_rows();
        self.accumulated.push(record_batch);

        debug!(rows = self.rows, batches = self.accumulated.len(), "accumulated batch");
        Ok(())
    }

    fn finalize(&mut self) -> Result<Vec<PathBuf>> {
        self.state.finalize()?;
        let table = opened(&self.table)?;

        let batches = std::mem::take(&mut self.accumulated);
        write_parquet_file(&self.path, &table.schema, &table.props, &batches)?;

        info!(path = %self.path.display(), rows = self.rows, "single-file output complete");
        Ok(vec![self.path.clone()])
    }

    fn state(&self) -> WriterState {
        self.state
    }
}
