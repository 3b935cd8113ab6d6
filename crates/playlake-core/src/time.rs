// Calendar breakdown of event timestamps
//
// `ts` is epoch milliseconds. It is truncated to whole seconds and read as
// UTC; every calendar field is a function of that second alone, so the time
// dimension can be recomputed at any point with the same result.

use arrow::array::{Array, ArrayRef, AsArray, BooleanArray, Int32Array, RecordBatch};
use arrow::array::TimestampMicrosecondArray;
use arrow::compute::filter_record_batch;
use arrow::datatypes::{DataType, Field, Int64Type};
use chrono::{DateTime, Datelike, Timelike};
use std::sync::Arc;

use crate::engine::arrow_engine::column_by_name;
use crate::error::{Result, TransformError};
use crate::schema::field_names::{log, star};
use crate::schema::{start_time_type, START_TIME_ZONE};
use crate::table::append_columns;

/// Calendar fields derived from one event timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarParts {
    /// Whole-second start time in microseconds since Unix epoch
    pub start_time_micros: i64,
    pub hour: i32,
    pub day: i32,
    /// ISO 8601 week of year
    pub week: i32,
    pub month: i32,
    pub year: i32,
}

impl CalendarParts {
    /// Decompose an epoch-millisecond timestamp. Returns `None` when the
    /// instant cannot be represented.
    pub fn from_epoch_millis(ts_millis: i64) -> Option<Self> {
        let secs = ts_millis / 1_000;
        let dt = DateTime::from_timestamp(secs, 0)?;
        Some(Self {
            start_time_micros: secs.checked_mul(1_000_000)?,
            hour: dt.hour() as i32,
            day: dt.day() as i32,
            week: dt.iso_week().week() as i32,
            month: dt.month() as i32,
            year: dt.year(),
        })
    }

    pub fn start_time_secs(&self) -> i64 {
        self.start_time_micros / 1_000_000
    }
}

/// Append `start_time`, `hour`, `day`, `week`, `month` and `year` to every
/// event. Rows whose `ts` is null or unrepresentable are dropped.
pub fn derive(events: &RecordBatch) -> Result<RecordBatch> {
    let ts_column = column_by_name(events, log::TS)?;
    let ts = ts_column
        .as_primitive_opt::<Int64Type>()
        .ok_or_else(|| TransformError::unexpected_type(log::TS, "Int64", ts_column.data_type()))?;

    let mut keep = Vec::with_capacity(ts.len());
    let mut parts = Vec::with_capacity(ts.len());
    for value in ts.iter() {
        match value.and_then(CalendarParts::from_epoch_millis) {
            Some(p) => {
                keep.push(true);
                parts.push(p);
            }
            None => keep.push(false),
        }
    }

    let dropped = ts.len() - parts.len();
    if dropped > 0 {
        tracing::debug!(dropped, "dropped events without a usable timestamp");
    }

    let kept = filter_record_batch(events, &BooleanArray::from(keep))?;

    let start_time: ArrayRef = Arc::new(
        TimestampMicrosecondArray::from_iter_values(parts.iter().map(|p| p.start_time_micros))
            .with_timezone(START_TIME_ZONE),
    );
    let int_column = |f: fn(&CalendarParts) -> i32| -> ArrayRef {
        Arc::new(Int32Array::from_iter_values(parts.iter().map(f)))
    };

    append_columns(
        &kept,
        vec![
            (Field::new(star::START_TIME, start_time_type(), false), start_time),
            (Field::new(star::HOUR, DataType::Int32, false), int_column(|p| p.hour)),
            (Field::new(star::DAY, DataType::Int32, false), int_column(|p| p.day)),
            (Field::new(star::WEEK, DataType::Int32, false), int_column(|p| p.week)),
            (Field::new(star::MONTH, DataType::Int32, false), int_column(|p| p.month)),
            (Field::new(star::YEAR, DataType::Int32, false), int_column(|p| p.year)),
        ],
    )
}
