//! CF-convention time coordinate decoding
//!
//! NetCDF stores time as numeric offsets with a `units` attribute such as
//! `"hours since 1950-01-01 00:00:00"`. When the units and calendar are understood
//! the time column is written as nanosecond timestamps, otherwise the raw offsets
//! are kept as plain floats.

use chrono::{NaiveDate, NaiveDateTime};

const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// How the `time` coordinate is represented in the output table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeAxis {
    /// Offsets from `epoch_ns` measured in steps of `unit_ns` nanoseconds
    Calendar { epoch_ns: i64, unit_ns: i64 },
    /// Units missing or not understood, keep the stored numbers
    Raw,
}

impl TimeAxis {
    /// Build a time axis from the `units` and `calendar` attributes of a time variable.
    ///
    /// Anything that cannot be decoded unambiguously (missing units, unknown unit name,
    /// non-gregorian calendars, unparsable epochs) falls back to [`TimeAxis::Raw`].
    pub fn from_cf(units: Option<&str>, calendar: Option<&str>) -> Self {
        if let Some(calendar) = calendar {
            let calendar = calendar.trim().to_lowercase();
            if !matches!(
                calendar.as_str(),
                "standard" | "gregorian" | "proleptic_gregorian"
            ) {
                return TimeAxis::Raw;
            }
        }

        let Some(units) = units else {
            return TimeAxis::Raw;
        };
        let Some((unit, epoch)) = units.trim().split_once(" since ") else {
            return TimeAxis::Raw;
        };

        let unit_ns = match unit.trim().to_lowercase().as_str() {
            "seconds" | "second" | "secs" | "sec" | "s" => NANOS_PER_SECOND,
            "minutes" | "minute" | "mins" | "min" => 60 * NANOS_PER_SECOND,
            "hours" | "hour" | "hrs" | "hr" | "h" => 3_600 * NANOS_PER_SECOND,
            "days" | "day" | "d" => 86_400 * NANOS_PER_SECOND,
            _ => return TimeAxis::Raw,
        };

        match parse_epoch(epoch).and_then(|dt| dt.and_utc().timestamp_nanos_opt()) {
            Some(epoch_ns) => TimeAxis::Calendar { epoch_ns, unit_ns },
            None => TimeAxis::Raw,
        }
    }

    pub fn is_calendar(&self) -> bool {
        matches!(self, TimeAxis::Calendar { .. })
    }

    /// Convert a stored offset to nanoseconds since the Unix epoch.
    ///
    /// Returns `None` for raw axes, non-finite offsets and results outside the
    /// representable `i64` nanosecond range.
    pub fn to_timestamp_ns(&self, offset: f64) -> Option<i64> {
        let TimeAxis::Calendar { epoch_ns, unit_ns } = *self else {
            return None;
        };
        let delta = offset * unit_ns as f64;
        if !delta.is_finite() || delta.abs() >= i64::MAX as f64 {
            return None;
        }
        epoch_ns.checked_add(delta.round() as i64)
    }
}

fn parse_epoch(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_suffix("UTC")
        .or_else(|| trimmed.strip_suffix('Z'))
        .unwrap_or(trimmed)
        .trim()
        .replacen('T', " ", 1);

    const DATETIME_FORMATS: [&str; 3] =
        ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"];
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(&trimmed, format) {
            return Some(dt);
        }
    }

    NaiveDate::parse_from_str(&trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}
