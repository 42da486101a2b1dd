//! Rendering of temporal columns as ISO-like text.
//!
//! The engine parses date-times from text, so temporal values never cross the
//! boundary as numbers. All instants are rendered in UTC without an offset
//! suffix; nulls and out-of-range values become `NaT`.

use arrow::array::{Array, AsArray};
use arrow::compute::{cast_with_options, CastOptions};
use arrow::datatypes::{
    DataType, Date32Type, Date64Type, TimeUnit, TimestampMicrosecondType,
    TimestampMillisecondType, TimestampNanosecondType, TimestampSecondType,
};
use chrono::DateTime;

use crate::error::ExchangeError;

pub const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";
pub const NOT_A_TIME: &str = "NaT";

const SECONDS_PER_DAY: i64 = 86_400;

/// Formats a `Timestamp`, `Date32` or `Date64` array.
pub fn format_temporal(array: &dyn Array) -> Result<Vec<String>, ExchangeError> {
    let values = match array.data_type() {
        DataType::Timestamp(TimeUnit::Second, _) => {
            format_counts(array.as_primitive::<TimestampSecondType>().iter(), 1)
        }
        DataType::Timestamp(TimeUnit::Millisecond, _) => {
            format_counts(array.as_primitive::<TimestampMillisecondType>().iter(), 1_000)
        }
        DataType::Timestamp(TimeUnit::Microsecond, _) => format_counts(
            array.as_primitive::<TimestampMicrosecondType>().iter(),
            1_000_000,
        ),
        DataType::Timestamp(TimeUnit::Nanosecond, _) => format_counts(
            array.as_primitive::<TimestampNanosecondType>().iter(),
            1_000_000_000,
        ),
        DataType::Date32 => format_counts(
            array
                .as_primitive::<Date32Type>()
                .iter()
                .map(|days| days.and_then(|d| i64::from(d).checked_mul(SECONDS_PER_DAY))),
            1,
        ),
        DataType::Date64 => format_counts(array.as_primitive::<Date64Type>().iter(), 1_000),
        other => {
            return Err(ExchangeError::UnsupportedType(format!(
                "{:?} is not a temporal type",
                other
            )))
        }
    };
    Ok(values)
}

/// Reinterprets an array of an unlisted type as date-times.
///
/// Any value the cast cannot parse fails the whole column.
pub fn reinterpret_as_datetime(array: &dyn Array) -> Result<Vec<String>, ExchangeError> {
    let target = DataType::Timestamp(TimeUnit::Nanosecond, None);
    // `safe: false` makes an unparsable value an error instead of a null.
    let strict = CastOptions {
        safe: false,
        ..Default::default()
    };
    let cast = cast_with_options(array, &target, &strict).map_err(|e| {
        ExchangeError::UnsupportedType(format!(
            "Cannot interpret {:?} as date-time: {}",
            array.data_type(),
            e
        ))
    })?;
    format_temporal(cast.as_ref())
}

fn format_counts<I>(values: I, units_per_second: i64) -> Vec<String>
where
    I: Iterator<Item = Option<i64>>,
{
    values
        .map(|value| match value {
            Some(count) => format_instant(count, units_per_second),
            None => NOT_A_TIME.to_string(),
        })
        .collect()
}

fn format_instant(count: i64, units_per_second: i64) -> String {
    let seconds = count.div_euclid(units_per_second);
    let fraction = count.rem_euclid(units_per_second);
    let nanos = fraction * (1_000_000_000 / units_per_second);
    match DateTime::from_timestamp(seconds, nanos as u32) {
        Some(instant) => instant.naive_utc().format(DATETIME_FORMAT).to_string(),
        None => NOT_A_TIME.to_string(),
    }
}
