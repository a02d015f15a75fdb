//! End-to-end conversion: slice the time axis, flatten, write
//!
//! The pipeline is single-threaded and pull-based. [`Batches`] reads and
//! flattens one slice per `next()` call, so at most one slice (and, with the
//! chunked strategy, one batch) is resident at any time.

use crate::errors::{ConvertError, Result};
use crate::flatten::{flatten, Batch};
use crate::netcdf_io::{Dataset, FieldSet};
use crate::parquet_io::{AccumulatingWriter, ChunkedWriter, ColumnarWriter, TableLayout};
use std::ops::Range;
use std::path::PathBuf;
use tracing::{info, warn};

pub const DEFAULT_INPUT: &str = "copernicus_zooplankton.nc";
pub const DEFAULT_FIELD: &str = "zooc";
pub const DEFAULT_CHUNK_BASE: &str = "pq/copernicus_zooplankton_chunk";
pub const DEFAULT_SINGLE_OUTPUT: &str = "copernicus_zooplankton.parquet";

/// How batches are persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// One file per slice, bounded memory
    Chunked,
    /// One file for the whole dataset, memory grows with the output
    Single,
}

impl Strategy {
    pub fn default_chunk_size(self) -> usize {
        match self {
            Strategy::Chunked => 500,
            Strategy::Single => 100,
        }
    }

    /// Chunk base path (chunked) or output file (single) used when none is given.
    pub fn default_output(self) -> PathBuf {
        match self {
            Strategy::Chunked => PathBuf::from(DEFAULT_CHUNK_BASE),
            Strategy::Single => PathBuf::from(DEFAULT_SINGLE_OUTPUT),
        }
    }
}

/// Settings for one conversion run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertConfig {
    pub input: PathBuf,
    pub field: String,
    pub strategy: Strategy,
    pub chunk_size: usize,
    /// Chunk base path for [`Strategy::Chunked`], output file for [`Strategy::Single`]
    pub output: PathBuf,
}

impl ConvertConfig {
    /// Defaults for `strategy`: the fixed input file, value field, chunk size and output.
    pub fn new(strategy: Strategy) -> Self {
        Self {
            input: PathBuf::from(DEFAULT_INPUT),
            field: DEFAULT_FIELD.to_string(),
            strategy,
            chunk_size: strategy.default_chunk_size(),
            output: strategy.default_output(),
        }
    }

    pub fn with_input(mut self, input: impl Into<PathBuf>) -> Self {
        self.input = input.into();
        self
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = field.into();
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = output.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(ConvertError::InvalidChunkSize {
                chunk_size: self.chunk_size,
            });
        }
        Ok(())
    }
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self::new(Strategy::Chunked)
    }
}

/// Half-open range of time indices handled as one unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceRange {
    pub index: usize,
    pub start: usize,
    pub end: usize,
}

impl SliceRange {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn as_range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// Partition of `0..total` into consecutive slices of `chunk_size` steps
///
/// The last slice is clamped to `total` and may be shorter.
#[derive(Debug, Clone)]
pub struct SliceRanges {
    total: usize,
    chunk_size: usize,
    next_start: usize,
    next_index: usize,
}

impl SliceRanges {
    pub fn new(total: usize, chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(ConvertError::InvalidChunkSize { chunk_size });
        }
        Ok(Self {
            total,
            chunk_size,
            next_start: 0,
            next_index: 0,
        })
    }

    /// Number of time steps covered by the whole partition.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Number of slices in the full partition, `ceil(total / chunk_size)`.
    pub fn slice_count(total: usize, chunk_size: usize) -> usize {
        total.div_ceil(chunk_size)
    }
}

impl Iterator for SliceRanges {
    type Item = SliceRange;

    fn next(&mut self) -> Option<SliceRange> {
        if self.next_start >= self.total {
            return None;
        }
        let start = self.next_start;
        let end = (start + self.chunk_size).min(self.total);
        let slice = SliceRange {
            index: self.next_index,
            start,
            end,
        };
        self.next_start = end;
        self.next_index += 1;
        Some(slice)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.total - self.next_start.min(self.total)).div_ceil(self.chunk_size);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for SliceRanges {}

/// Lazy sequence of flattened batches, one per slice
///
/// Finite and not restartable; each item reads its slice from disk when pulled.
/// Fields and the covered time range are validated once, in [`Batches::new`].
pub struct Batches<'a> {
    dataset: &'a Dataset,
    fields: &'a FieldSet,
    ranges: SliceRanges,
}

impl<'a> Batches<'a> {
    pub fn new(
        dataset: &'a Dataset,
        fields: &'a FieldSet,
        ranges: SliceRanges,
    ) -> Result<Self> {
        dataset.check_fields(fields)?;
        if ranges.total() > 0 {
            dataset.check_time_range(&(0..ranges.total()))?;
        }
        Ok(Self {
            dataset,
            fields,
            ranges,
        })
    }
}

impl Iterator for Batches<'_> {
    type Item = Result<(SliceRange, Batch)>;

    fn next(&mut self) -> Option<Self::Item> {
        let slice = self.ranges.next()?;
        let batch = self
            .dataset
            .read_slice(self.fields, slice.as_range())
            .and_then(|block| flatten(&block));
        Some(batch.map(|b| (slice, b)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.ranges.size_hint()
    }
}

/// Outcome of a successful run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionReport {
    pub time_steps: usize,
    pub slices: usize,
    pub rows: usize,
    pub outputs: Vec<PathBuf>,
}

/// Convert `config.input` to Parquet according to `config.strategy`.
///
/// The dataset is validated (fields present, time dimension present) before the
/// writer is created, so those failures never leave output behind.
pub fn convert(config: &ConvertConfig) -> Result<ConversionReport> {
    config.validate()?;

    let dataset = Dataset::open(&config.input)?;
    println!("Successfully opened NetCDF file: {}", dataset.path().display());
    dataset.summary().print();

    let fields = FieldSet::new(config.field.as_str());
    let time_steps = dataset.time_len()?;
    let ranges = SliceRanges::new(time_steps, config.chunk_size)?;
    let slices = ranges.len();
    let batches = Batches::new(&dataset, &fields, ranges)?;
    let layout = TableLayout::new(config.field.as_str(), dataset.time_axis()?, &config.input);

    let mut writer: Box<dyn ColumnarWriter> = match config.strategy {
        Strategy::Chunked => Box::new(ChunkedWriter::new(&config.output)),
        Strategy::Single => {
            warn!("single-file strategy keeps every row in memory until the end of the run");
            println!("⚠ Single-file output holds the whole table in memory until it is written");
            Box::new(AccumulatingWriter::new(&config.output))
        }
    };
    writer.open(layout)?;

    info!(
        input = %config.input.display(),
        time_steps,
        chunk_size = config.chunk_size,
        slices,
        strategy = ?config.strategy,
        "starting conversion"
    );
    println!(
        "⚡ Converting {} time steps in {} slice(s) of up to {}",
        time_steps, slices, config.chunk_size
    );

    let mut rows = 0;
    for item in batches {
        let (slice, batch) = item?;
        writer.write_batch(&batch)?;
        rows += batch.len();

        info!(
            slice = slice.index,
            start = slice.start,
            end = slice.end,
            rows = batch.len(),
            "slice written"
        );
        println!(
            "   [{}/{}] time {}..{}: {} rows",
            slice.index + 1,
            slices,
            slice.start,
            slice.end,
            batch.len()
        );
    }

    let outputs = writer.finalize()?;
    Ok(ConversionReport {
        time_steps,
        slices,
        rows,
        outputs,
    })
}
