//! NetCDF dataset access: opening, dimension lookup and time slicing
//!
//! A [`Dataset`] owns the open file for the duration of a run. Dropping it closes
//! the file, so every early return through `?` releases the handle as well.

use crate::cf_time::TimeAxis;
use crate::errors::{ConvertError, Result};
use crate::metadata::DatasetSummary;
use ndarray::{Array3, ArrayD, IxDyn};
use netcdf::{AttributeValue, File, Variable};
use std::ops::Range;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const TIME: &str = "time";
pub const LATITUDE: &str = "latitude";
pub const LONGITUDE: &str = "longitude";

/// The four fields a conversion reads: one scalar value plus its coordinates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSet {
    pub value: String,
}

impl FieldSet {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    /// Field names in output column order after the time coordinate.
    pub fn names(&self) -> [&str; 4] {
        [self.value.as_str(), TIME, LATITUDE, LONGITUDE]
    }
}

/// One time slice of the dataset, restricted to a [`FieldSet`]
///
/// `values` is laid out as `(time, latitude, longitude)`; missing samples are NaN.
/// Every field is widened to `f64` on read, so integer and double sources keep
/// their exact values.
#[derive(Debug, Clone)]
pub struct Block {
    pub time_range: Range<usize>,
    pub times: Vec<f64>,
    pub latitudes: Vec<f64>,
    pub longitudes: Vec<f64>,
    pub values: Array3<f64>,
}

/// CF packing and masking attributes of the value variable
#[derive(Debug, Clone, Copy, PartialEq)]
struct Packing {
    fill_value: Option<f64>,
    missing_value: Option<f64>,
    scale_factor: f64,
    add_offset: f64,
}

impl Packing {
    fn from_variable(var: &Variable) -> Self {
        Self {
            fill_value: numeric_attribute(var, "_FillValue"),
            missing_value: numeric_attribute(var, "missing_value"),
            scale_factor: numeric_attribute(var, "scale_factor").unwrap_or(1.0),
            add_offset: numeric_attribute(var, "add_offset").unwrap_or(0.0),
        }
    }

    /// Masks against the attributes at full precision, then unpacks.
    fn decode(&self, raw: f64) -> f64 {
        let is_masked = |mask: Option<f64>| mask.is_some_and(|m| raw == m);
        if is_masked(self.fill_value) || is_masked(self.missing_value) {
            return f64::NAN;
        }
        if self.scale_factor == 1.0 && self.add_offset == 0.0 {
            return raw;
        }
        raw * self.scale_factor + self.add_offset
    }
}

/// An open NetCDF dataset
pub struct Dataset {
    file: File,
    path: PathBuf,
}

impl Dataset {
    /// Open a dataset, distinguishing a missing file from an unreadable one.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConvertError::NotFound {
                path: path.to_path_buf(),
            });
        }

        let file = netcdf::open(path).map_err(|source| ConvertError::Format {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "opened dataset");

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn summary(&self) -> DatasetSummary {
        DatasetSummary::describe(&self.file)
    }

    /// Length of a named dimension.
    pub fn len_of(&self, dim: &str) -> Result<usize> {
        self.file
            .dimension(dim)
            .map(|d| d.len())
            .ok_or_else(|| ConvertError::DimensionNotFound {
                dim: dim.to_string(),
            })
    }

    pub fn time_len(&self) -> Result<usize> {
        self.len_of(TIME)
    }

    /// Fails with the first field of `fields` that is not a variable of the file.
    pub fn check_fields(&self, fields: &FieldSet) -> Result<()> {
        for name in fields.names() {
            self.variable(name)?;
        }
        Ok(())
    }

    /// Decoding rule for the `time` coordinate, from its `units` and `calendar`.
    pub fn time_axis(&self) -> Result<TimeAxis> {
        let var = self.variable(TIME)?;
        let units = string_attribute(&var, "units");
        let calendar = string_attribute(&var, "calendar");
        Ok(TimeAxis::from_cf(units.as_deref(), calendar.as_deref()))
    }

    /// Read time steps `time` of every field in `fields` into memory.
    pub fn slice(&self, fields: &FieldSet, time: Range<usize>) -> Result<Block> {
        self.check_fields(fields)?;
        self.check_time_range(&time)?;
        self.read_slice(fields, time)
    }

    /// Fails unless `time` is a non-empty range within the time dimension.
    pub fn check_time_range(&self, time: &Range<usize>) -> Result<()> {
        let time_len = self.time_len()?;
        if time.start >= time.end || time.end > time_len {
            return Err(ConvertError::InvalidSlice {
                message: format!(
                    "time range {}..{} outside dimension of length {}",
                    time.start, time.end, time_len
                ),
            });
        }
        Ok(())
    }

    /// Slice read for callers that already ran `check_fields` and
    /// `check_time_range`.
    pub(crate) fn read_slice(&self, fields: &FieldSet, time: Range<usize>) -> Result<Block> {
        let values = self.read_values(&fields.value, &time)?;
        let times = self
            .variable(TIME)?
            .get_values::<f64, _>(time.clone())?;
        let latitudes = self.variable(LATITUDE)?.get_values::<f64, _>(..)?;
        let longitudes = self.variable(LONGITUDE)?.get_values::<f64, _>(..)?;

        debug!(
            start = time.start,
            end = time.end,
            shape = ?values.shape(),
            "read slice"
        );

        Ok(Block {
            time_range: time,
            times,
            latitudes,
            longitudes,
            values,
        })
    }

    fn variable(&self, name: &str) -> Result<Variable<'_>> {
        self.file
            .variable(name)
            .ok_or_else(|| ConvertError::FieldNotFound {
                field: name.to_string(),
            })
    }

    /// Read the value variable over `time`, squeeze singleton axes and reorder to
    /// `(time, latitude, longitude)`.
    fn read_values(&self, name: &str, time: &Range<usize>) -> Result<Array3<f64>> {
        let var = self.variable(name)?;
        let dims: Vec<(String, usize)> = var
            .dimensions()
            .iter()
            .map(|d| (d.name().to_string(), d.len()))
            .collect();

        let position = |axis: &str| {
            dims.iter()
                .position(|(dim, _)| dim == axis)
                .ok_or_else(|| ConvertError::DimensionNotFound {
                    dim: axis.to_string(),
                })
        };
        let (t_axis, lat_axis, lon_axis) =
            (position(TIME)?, position(LATITUDE)?, position(LONGITUDE)?);

        let mut order = vec![t_axis, lat_axis, lon_axis];
        for (axis, (dim, len)) in dims.iter().enumerate() {
            if order[..3].contains(&axis) {
                continue;
            }
            if *len != 1 {
                return Err(ConvertError::UnsupportedLayout {
                    var: name.to_string(),
                    message: format!(
                        "extra dimension '{}' has length {} (only 1 is supported)",
                        dim, len
                    ),
                });
            }
            order.push(axis);
        }

        let ranges: Vec<Range<usize>> = dims
            .iter()
            .enumerate()
            .map(|(axis, (_, len))| {
                if axis == t_axis {
                    time.clone()
                } else {
                    0..*len
                }
            })
            .collect();

        let raw: Vec<f64> = match ranges.as_slice() {
            [a, b, c] => var.get_values::<f64, _>((a.clone(), b.clone(), c.clone()))?,
            [a, b, c, d] => {
                var.get_values::<f64, _>((a.clone(), b.clone(), c.clone(), d.clone()))?
            }
            _ => {
                return Err(ConvertError::UnsupportedLayout {
                    var: name.to_string(),
                    message: format!("expected 3 or 4 dimensions, found {}", ranges.len()),
                })
            }
        };

        let shape: Vec<usize> = ranges.iter().map(|r| r.end - r.start).collect();
        let packing = Packing::from_variable(&var);
        let stored = ArrayD::from_shape_vec(IxDyn(&shape), raw)?;
        let reordered = stored.permuted_axes(IxDyn(&order));

        let grid = (shape[t_axis], shape[lat_axis], shape[lon_axis]);
        let decoded: Vec<f64> = reordered.iter().map(|&v| packing.decode(v)).collect();
        Ok(Array3::from_shape_vec(grid, decoded)?)
    }
}

/// Numeric attribute value widened to `f64`.
fn numeric_attribute(var: &Variable, name: &str) -> Option<f64> {
    match var.attribute(name)?.value().ok()? {
        AttributeValue::Float(v) => Some(v as f64),
        AttributeValue::Double(v) => Some(v),
        AttributeValue::Short(v) => Some(v as f64),
        AttributeValue::Ushort(v) => Some(v as f64),
        AttributeValue::Int(v) => Some(v as f64),
        AttributeValue::Uint(v) => Some(v as f64),
        AttributeValue::Schar(v) => Some(v as f64),
        AttributeValue::Uchar(v) => Some(v as f64),
        _ => None,
    }
}

fn string_attribute(var: &Variable, name: &str) -> Option<String> {
    match var.attribute(name)?.value().ok()? {
        AttributeValue::Str(s) => Some(s),
        _ => None,
    }
}
