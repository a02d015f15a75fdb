//! Centralized error handling for nc_parquet
//!
//! Every failure in the pipeline is reported through [`ConvertError`]. Nothing is
//! recovered locally: errors propagate with `?` up to the caller, which reports the
//! failing [`Stage`] and aborts the run.

use std::fmt;
use std::path::PathBuf;

/// Pipeline stage an error originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Open,
    Slice,
    Flatten,
    Write,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Open => "open",
            Stage::Slice => "slice",
            Stage::Flatten => "flatten",
            Stage::Write => "write",
        };
        f.write_str(name)
    }
}

/// Underlying cause of a failed Parquet write
#[derive(Debug)]
pub enum WriteCause {
    Io(std::io::Error),
    Arrow(arrow::error::ArrowError),
    Parquet(parquet::errors::ParquetError),
}

impl fmt::Display for WriteCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteCause::Io(e) => write!(f, "{}", e),
            WriteCause::Arrow(e) => write!(f, "{}", e),
            WriteCause::Parquet(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for WriteCause {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WriteCause::Io(e) => Some(e),
            WriteCause::Arrow(e) => Some(e),
            WriteCause::Parquet(e) => Some(e),
        }
    }
}

/// Main error type for conversion runs
#[derive(Debug)]
pub enum ConvertError {
    /// Input file does not exist
    NotFound { path: PathBuf },

    /// Input exists but could not be parsed as NetCDF
    Format { path: PathBuf, source: netcdf::Error },

    /// Dimension not present in the dataset (or in the value variable)
    DimensionNotFound { dim: String },

    /// Requested field is not a variable of the dataset
    FieldNotFound { field: String },

    /// Value variable has a dimension layout that cannot be flattened
    UnsupportedLayout { var: String, message: String },

    /// Requested time range falls outside the dataset
    InvalidSlice { message: String },

    /// Coordinate vector length disagrees with the block shape
    CoordinateMismatch {
        axis: String,
        expected: usize,
        found: usize,
    },

    /// Chunk size must be a positive number of time steps
    InvalidChunkSize { chunk_size: usize },

    /// NetCDF read failure after the file was opened
    NetCDFError(netcdf::Error),

    /// Array shape or dimension error
    ArrayError(ndarray::ShapeError),

    /// Output could not be written
    Write { path: PathBuf, cause: WriteCause },

    /// Writer used out of order (e.g. a batch after finalize)
    WriterState { message: String },
}

impl ConvertError {
    /// Stage of the pipeline this error belongs to.
    pub fn stage(&self) -> Stage {
        match self {
            ConvertError::NotFound { .. }
            | ConvertError::Format { .. }
            | ConvertError::InvalidChunkSize { .. } => Stage::Open,
            ConvertError::DimensionNotFound { .. }
            | ConvertError::FieldNotFound { .. }
            | ConvertError::UnsupportedLayout { .. }
            | ConvertError::InvalidSlice { .. }
            | ConvertError::NetCDFError(_)
            | ConvertError::ArrayError(_) => Stage::Slice,
            ConvertError::CoordinateMismatch { .. } => Stage::Flatten,
            ConvertError::Write { .. } | ConvertError::WriterState { .. } => Stage::Write,
        }
    }

    pub(crate) fn write(path: impl Into<PathBuf>, cause: impl Into<WriteCause>) -> Self {
        ConvertError::Write {
            path: path.into(),
            cause: cause.into(),
        }
    }
}

impl fmt::Display for ConvertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConvertError::NotFound { path } => {
                write!(f, "Input file '{}' not found", path.display())
            }
            ConvertError::Format { path, source } => {
                write!(f, "Cannot read '{}' as NetCDF: {}", path.display(), source)
            }
            ConvertError::DimensionNotFound { dim } => {
                write!(f, "Dimension '{}' not found in dataset", dim)
            }
            ConvertError::FieldNotFound { field } => {
                write!(f, "Field '{}' not found in dataset", field)
            }
            ConvertError::UnsupportedLayout { var, message } => {
                write!(f, "Unsupported layout for variable '{}': {}", var, message)
            }
            ConvertError::InvalidSlice { message } => {
                write!(f, "Invalid slice specification: {}", message)
            }
            ConvertError::CoordinateMismatch {
                axis,
                expected,
                found,
            } => write!(
                f,
                "Coordinate '{}' has {} values but the block has {} along that axis",
                axis, found, expected
            ),
            ConvertError::InvalidChunkSize { chunk_size } => {
                write!(f, "Invalid chunk size {}: must be greater than 0", chunk_size)
            }
            ConvertError::NetCDFError(e) => write!(f, "NetCDF error: {}", e),
            ConvertError::ArrayError(e) => write!(f, "Array error: {}", e),
            ConvertError::Write { path, cause } => {
                write!(f, "Cannot write '{}': {}", path.display(), cause)
            }
            ConvertError::WriterState { message } => write!(f, "Writer misuse: {}", message),
        }
    }
}

impl std::error::Error for ConvertError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConvertError::Format { source, .. } => Some(source),
            ConvertError::NetCDFError(e) => Some(e),
            ConvertError::ArrayError(e) => Some(e),
            ConvertError::Write { cause, .. } => Some(cause),
            _ => None,
        }
    }
}

impl From<netcdf::Error> for ConvertError {
    fn from(error: netcdf::Error) -> Self {
        ConvertError::NetCDFError(error)
    }
}

impl From<ndarray::ShapeError> for ConvertError {
    fn from(error: ndarray::ShapeError) -> Self {
        ConvertError::ArrayError(error)
    }
}

impl From<std::io::Error> for WriteCause {
    fn from(error: std::io::Error) -> Self {
        WriteCause::Io(error)
    }
}

impl From<arrow::error::ArrowError> for WriteCause {
    fn from(error: arrow::error::ArrowError) -> Self {
        WriteCause::Arrow(error)
    }
}

impl From<parquet::errors::ParquetError> for WriteCause {
    fn from(error: parquet::errors::ParquetError) -> Self {
        WriteCause::Parquet(error)
    }
}

/// Result type alias for conversion operations
pub type Result<T> = std::result::Result<T, ConvertError>;
