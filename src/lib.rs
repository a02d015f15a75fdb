//! nc_parquet: stream gridded NetCDF datasets into Parquet
//!
//! Converts a `(time, latitude, longitude)` scalar field stored in NetCDF into a
//! flat Parquet table with one row per grid point. The time axis is processed in
//! fixed-size slices so datasets larger than memory can be converted.
//!
//! ## Module Organization
//!
//! - [`netcdf_io`]: dataset handle, dimension lookup and time slicing
//! - [`flatten`]: gridded block to tabular rows
//! - [`parquet_io`]: chunked and single-file Parquet writers
//! - [`pipeline`]: configuration, slice partitioning and the end-to-end run
//! - [`cf_time`]: CF time unit decoding
//! - [`metadata`]: file structure summary
//! - [`errors`]: centralized error handling
//!
//! ## Usage
//!
//! ```rust,no_run
//! use nc_parquet::prelude::*;
//!
//! let config = ConvertConfig::new(Strategy::Chunked)
//!     .with_input("copernicus_zooplankton.nc")
//!     .with_chunk_size(500);
//! let report = convert(&config).unwrap();
//! println!("{} rows in {} files", report.rows, report.outputs.len());
//! ```
//!
//! The chunked strategy keeps at most one slice in memory. The single-file
//! strategy accumulates the whole table before writing it and is only suitable
//! for outputs that fit in memory.

pub mod cf_time;
pub mod errors;
pub mod flatten;
pub mod metadata;
pub mod netcdf_io;
pub mod parquet_io;
pub mod pipeline;

pub use errors::{ConvertError, Result, Stage};
pub use pipeline::{convert, ConversionReport, ConvertConfig, Strategy};

pub mod prelude {
    //! Commonly used imports for convenience
    pub use crate::cf_time::TimeAxis;
    pub use crate::errors::{ConvertError, Result, Stage};
    pub use crate::flatten::{flatten, Batch, Row};
    pub use crate::netcdf_io::{Block, Dataset, FieldSet};
    pub use crate::parquet_io::{
        AccumulatingWriter, ChunkedWriter, ColumnarWriter, TableLayout, WriterState,
    };
    pub use crate::pipeline::{
        convert, Batches, ConversionReport, ConvertConfig, SliceRange, SliceRanges, Strategy,
    };
}
