//! Flattening of gridded blocks into tabular rows
//!
//! A [`Block`] is a dense `(time, latitude, longitude)` cube. [`flatten`] walks it
//! in natural order (time outermost, longitude innermost) and emits one row per
//! grid point. Nothing is filtered or interpolated: masked samples stay in the
//! batch as NaN and become nulls only when written.

use crate::errors::{ConvertError, Result};
use crate::netcdf_io::{Block, LATITUDE, LONGITUDE, TIME};
use std::ops::Range;

/// One grid point of one time step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Row {
    pub time: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub value: f64,
}

/// Rows produced from a single slice, stored column-wise
///
/// `time` holds the stored coordinate offsets; decoding to timestamps is left to
/// the writer so flattening stays independent of the time units.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    pub time_range: Range<usize>,
    pub time: Vec<f64>,
    pub latitude: Vec<f64>,
    pub longitude: Vec<f64>,
    pub value: Vec<f64>,
}

impl Batch {
    fn with_capacity(time_range: Range<usize>, rows: usize) -> Self {
        Self {
            time_range,
            time: Vec::with_capacity(rows),
            latitude: Vec::with_capacity(rows),
            longitude: Vec::with_capacity(rows),
            value: Vec::with_capacity(rows),
        }
    }

    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item = Row> + '_ {
        (0..self.len()).map(move |i| Row {
            time: self.time[i],
            latitude: self.latitude[i],
            longitude: self.longitude[i],
            value: self.value[i],
        })
    }
}

/// Convert one block into a batch of rows.
///
/// # Errors
///
/// Returns [`ConvertError::CoordinateMismatch`] when a coordinate vector does not
/// have one entry per index of its axis.
pub fn flatten(block: &Block) -> Result<Batch> {
    let (nt, nlat, nlon) = block.values.dim();
    check_axis(TIME, nt, block.times.len())?;
    check_axis(LATITUDE, nlat, block.latitudes.len())?;
    check_axis(LONGITUDE, nlon, block.longitudes.len())?;

    let mut batch = Batch::with_capacity(block.time_range.clone(), block.values.len());
    for ((t, i, j), &value) in block.values.indexed_iter() {
        batch.time.push(block.times[t]);
        batch.latitude.push(block.latitudes[i]);
        batch.longitude.push(block.longitudes[j]);
        batch.value.push(value);
    }

    Ok(batch)
}

fn check_axis(axis: &str, expected: usize, found: usize) -> Result<()> {
    if expected == found {
        Ok(())
    } else {
        Err(ConvertError::CoordinateMismatch {
            axis: axis.to_string(),
            expected,
            found,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Stage;
    use ndarray::Array3;

    fn block(nt: usize, nlat: usize, nlon: usize) -> Block {
        let values = Array3::from_shape_fn((nt, nlat, nlon), |(t, i, j)| {
            (t * 100 + i * 10 + j) as f64
        });
        Block {
            time_range: 0..nt,
            times: (0..nt).map(|t| t as f64 * 24.0).collect(),
            latitudes: (0..nlat).map(|i| -10.0 + i as f64).collect(),
            longitudes: (0..nlon).map(|j| 100.0 + j as f64).collect(),
            values,
        }
    }

    #[test]
    fn one_row_per_grid_point() {
        let batch = flatten(&block(2, 3, 4)).unwrap();
        assert_eq!(batch.len(), 24);
        assert_eq!(batch.time_range, 0..2);
    }

    #[test]
    fn rows_follow_time_lat_lon_order() {
        let batch = flatten(&block(2, 2, 2)).unwrap();
        let rows: Vec<Row> = batch.rows().collect();

        assert_eq!(
            rows[0],
            Row {
                time: 0.0,
                latitude: -10.0,
                longitude: 100.0,
                value: 0.0
            }
        );
        assert_eq!(
            rows[1],
            Row {
                time: 0.0,
                latitude: -10.0,
                longitude: 101.0,
                value: 1.0
            }
        );
        assert_eq!(rows[2].latitude, -9.0);
        assert_eq!(rows[2].value, 10.0);
        assert_eq!(rows[4].time, 24.0);
        assert_eq!(rows[7].value, 111.0);
    }

    #[test]
    fn masked_values_are_kept() {
        let mut b = block(1, 2, 2);
        b.values[[0, 1, 0]] = f64::NAN;
        let batch = flatten(&b).unwrap();
        assert_eq!(batch.len(), 4);
        assert!(batch.value[2].is_nan());
    }

    #[test]
    fn flatten_is_deterministic() {
        let b = block(3, 2, 2);
        assert_eq!(flatten(&b).unwrap(), flatten(&b).unwrap());
    }

    #[test]
    fn coordinate_length_mismatch_is_a_flatten_error() {
        let mut b = block(1, 2, 3);
        b.longitudes.pop();
        let err = flatten(&b).unwrap_err();
        assert_eq!(err.stage(), Stage::Flatten);
        match err {
            ConvertError::CoordinateMismatch {
                axis,
                expected,
                found,
            } => {
                assert_eq!(axis, "longitude");
                assert_eq!(expected, 3);
                assert_eq!(found, 2);
            }
            other => panic!("Expected CoordinateMismatch, got {:?}", other),
        }
    }

    #[test]
    fn empty_block_gives_empty_batch() {
        let batch = flatten(&block(0, 2, 2)).unwrap();
        assert!(batch.is_empty());
    }
}
