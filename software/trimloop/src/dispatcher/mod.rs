//! Dispatchers send per-cycle data to an outside consumer, usually a file or display

use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

mod csv;
mod latest;

pub use csv::CsvDispatcher;
pub use latest::{LatestValueDispatcher, LatestValueHandle};

use crate::driver::RunCtx;

/// One flattened cycle as seen by a dispatcher
#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq)]
pub struct Row {
    pub system_time: String,
    pub timestamp: i64,
    pub channel_values: Vec<f64>,
}

/// A data pipeline plugin that receives data from the run loop
/// one row at a time.
#[typetag::serde(tag = "type")]
pub trait Dispatcher: Send + Sync {
    /// Set up the dispatcher at the start of a run
    fn init(&mut self, ctx: &RunCtx, channel_names: &[String]) -> Result<(), String>;

    /// Ingest a row of data
    fn consume(
        &mut self,
        time: SystemTime,
        timestamp: i64,
        channel_values: Vec<f64>,
    ) -> Result<(), String>;

    /// Shut down the dispatcher and reset internal state for the next run
    fn terminate(&mut self) -> Result<(), String>;
}

/// Header strings including the time indices given some channel names
pub fn header_columns(channel_names: &[String]) -> Vec<String> {
    let mut out = vec!["timestamp".to_owned(), "time".to_owned()];
    out.extend(channel_names.iter().cloned());
    out
}

/// CSV header row given some channel names
pub fn csv_header(channel_names: &[String]) -> String {
    let mut header_string = header_columns(channel_names).join(",");
    header_string.push('\n');
    header_string
}

/// ISO-8601 UTC time with nanoseconds and Z-suffix
pub fn fmt_time(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).to_rfc3339_opts(chrono::SecondsFormat::Nanos, true)
}

/// Format one CSV row into `stringbuf`, reusing its allocation.
/// Corrections that were not computed appear as `NaN`.
pub fn csv_row(stringbuf: &mut String, time: SystemTime, timestamp: i64, channel_values: &[f64]) {
    use std::fmt::Write;

    stringbuf.clear();
    let _ = write!(stringbuf, "{timestamp},{}", fmt_time(time));
    for v in channel_values {
        let _ = write!(stringbuf, ",{v}");
    }
    stringbuf.push('\n');
}
