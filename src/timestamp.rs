//! Timestamp conversion utilities.
//!
//! Every log format encodes time differently. These pure functions turn each
//! raw encoding into an [`Instant`] (UTC, nanosecond precision):
//!
//! - OLE automation dates (PLC segment anchors)
//! - zero-epoch seconds (TDM time channels written by older loggers)
//! - Unix seconds as float (TDM time channels written by newer loggers)
//! - `{sec, nanosec}` JSON objects (RTI samples)
//! - integer nanoseconds since the Unix epoch (RTI reception timestamps)

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ReaderError, Result};

/// Absolute point in time
pub type Instant = DateTime<Utc>;

const NANOS_PER_SECOND: f64 = 1_000_000_000.0;
const NANOS_PER_DAY: f64 = 86_400.0 * NANOS_PER_SECOND;

/// Largest day count accepted from a float encoding (roughly ±27000 years)
const MAX_ABS_DAYS: f64 = 10_000_000.0;

/// Timestamp layout embedded in RTI JSON samples
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonTimestamp {
    pub sec: i64,
    pub nanosec: i64,
}

impl JsonTimestamp {
    pub fn to_instant(self) -> Result<Instant> {
        json_timestamp_to_instant(self.sec, self.nanosec)
    }
}

fn epoch(year: i32, month: u32, day: u32) -> Instant {
    // Constant calendar dates, always valid
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .unwrap_or_default()
}

fn check_finite(value: f64, encoding: &str) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ReaderError::InvalidTimestamp(format!(
            "{} value is not finite: {}",
            encoding, value
        )))
    }
}

fn out_of_range(encoding: &str, value: impl std::fmt::Display) -> ReaderError {
    ReaderError::InvalidTimestamp(format!("{} value out of range: {}", encoding, value))
}

/// Add whole units plus a fractional remainder (in nanoseconds) to `base`
fn offset_instant(
    base: Instant,
    whole: TimeDelta,
    frac_nanos: i64,
    encoding: &str,
    value: f64,
) -> Result<Instant> {
    base.checked_add_signed(whole)
        .and_then(|t| t.checked_add_signed(TimeDelta::nanoseconds(frac_nanos)))
        .ok_or_else(|| out_of_range(encoding, value))
}

/// Convert an OLE automation date (days since 1899-12-30) to an instant.
///
/// The integral part counts days and the fractional part is the fraction of
/// a day, so the mapping is linear in `value`.
pub fn ole_date_to_instant(value: f64) -> Result<Instant> {
    check_finite(value, "OLE date")?;
    if value.abs() > MAX_ABS_DAYS {
        return Err(out_of_range("OLE date", value));
    }

    let days = TimeDelta::try_days(value.trunc() as i64)
        .ok_or_else(|| out_of_range("OLE date", value))?;
    let frac_nanos = (value.fract() * NANOS_PER_DAY).round() as i64;
    offset_instant(epoch(1899, 12, 30), days, frac_nanos, "OLE date", value)
}

/// Convert a zero-epoch timestamp (seconds counted from year zero) to an instant.
///
/// Year zero does not exist in the proleptic calendar, so the value is added
/// to 0001-01-01T00:00:00 and exactly 365 days are subtracted afterwards.
/// This correction reproduces the dates the logging software displays.
pub fn zero_epoch_to_instant(value: f64) -> Result<Instant> {
    check_finite(value, "zero-epoch")?;
    if value.abs() / 86_400.0 > MAX_ABS_DAYS {
        return Err(out_of_range("zero-epoch", value));
    }

    let seconds = TimeDelta::try_seconds(value.trunc() as i64)
        .ok_or_else(|| out_of_range("zero-epoch", value))?;
    let frac_nanos = (value.fract() * NANOS_PER_SECOND).round() as i64;
    let instant = offset_instant(epoch(1, 1, 1), seconds, frac_nanos, "zero-epoch", value)?;

    instant
        .checked_sub_signed(TimeDelta::days(365))
        .ok_or_else(|| out_of_range("zero-epoch", value))
}

/// Convert floating point seconds since the Unix epoch to an instant
pub fn unix_seconds_to_instant(value: f64) -> Result<Instant> {
    check_finite(value, "Unix seconds")?;
    if value.abs() / 86_400.0 > MAX_ABS_DAYS {
        return Err(out_of_range("Unix seconds", value));
    }

    let seconds = TimeDelta::try_seconds(value.trunc() as i64)
        .ok_or_else(|| out_of_range("Unix seconds", value))?;
    let frac_nanos = (value.fract() * NANOS_PER_SECOND).round() as i64;
    offset_instant(epoch(1970, 1, 1), seconds, frac_nanos, "Unix seconds", value)
}

/// Convert a JSON `{sec, nanosec}` pair to an instant
pub fn json_timestamp_to_instant(sec: i64, nanosec: i64) -> Result<Instant> {
    DateTime::from_timestamp(sec, 0)
        .and_then(|t| t.checked_add_signed(TimeDelta::nanoseconds(nanosec)))
        .ok_or_else(|| out_of_range("JSON timestamp", format!("{}s {}ns", sec, nanosec)))
}

/// Convert integer nanoseconds since the Unix epoch to an instant
pub fn ns_timestamp_to_instant(ns: i64) -> Instant {
    DateTime::from_timestamp_nanos(ns)
}

/// Fractional seconds as a duration, rounded to the nanosecond
pub fn seconds_to_delta(seconds: f64) -> Result<TimeDelta> {
    check_finite(seconds, "offset")?;
    let nanos = seconds * NANOS_PER_SECOND;
    if nanos.abs() >= i64::MAX as f64 {
        return Err(out_of_range("offset", seconds));
    }
    Ok(TimeDelta::nanoseconds(nanos.round() as i64))
}
