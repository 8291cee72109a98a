use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::job::{LoadJob, Method, TableType};
use super::timing::{rate, TimingSplit};
use crate::error::BenchError;
use crate::utils::constants::{STATUS_OK, UNITS_LABEL};

/// A record type that owns a fixed CSV header.
pub trait LogRecord: Serialize + Send + 'static {
    const HEADER: &'static [&'static str];

    fn header_line() -> String {
        Self::HEADER.join(",")
    }
}

/// One completed (or failed) load job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkRecord {
    pub method: Method,
    pub table_type: TableType,
    pub workers: usize,
    pub hour: usize,
    pub num_rows: usize,
    pub seconds_full: f64,
    pub rate_full: Option<f64>,
    pub seconds_pure: Option<f64>,
    pub rate_pure: Option<f64>,
    pub units: String,
    pub status: String,
}

impl LogRecord for BenchmarkRecord {
    const HEADER: &'static [&'static str] = &[
        "method",
        "table_type",
        "workers",
        "hour",
        "num_rows",
        "seconds_full",
        "rate_full",
        "seconds_pure",
        "rate_pure",
        "units",
        "status",
    ];
}

impl BenchmarkRecord {
    pub fn success(job: &LoadJob, workers: usize, rows: usize, timing: TimingSplit) -> Self {
        Self {
            method: job.method,
            table_type: job.table_type,
            workers,
            hour: job.index,
            num_rows: rows,
            seconds_full: timing.full().as_secs_f64(),
            rate_full: rate(rows, timing.full()),
            seconds_pure: Some(timing.pure().as_secs_f64()),
            rate_pure: rate(rows, timing.pure()),
            units: UNITS_LABEL.to_string(),
            status: STATUS_OK.to_string(),
        }
    }

    /// Failed jobs keep the elapsed time but carry no rows or rates.
    pub fn failure(job: &LoadJob, workers: usize, elapsed: Duration, error: &BenchError) -> Self {
        Self {
            method: job.method,
            table_type: job.table_type,
            workers,
            hour: job.index,
            num_rows: 0,
            seconds_full: elapsed.as_secs_f64(),
            rate_full: None,
            seconds_pure: None,
            rate_pure: None,
            units: UNITS_LABEL.to_string(),
            status: error.kind().to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == STATUS_OK
    }
}

/// Aggregate over a whole run, one line per invocation of the harness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub method: Method,
    pub table_type: TableType,
    pub workers: usize,
    pub hours: usize,
    pub num_rows: usize,
    pub seconds_full: f64,
    pub rate_full: Option<f64>,
    pub seconds_pure: f64,
    pub rate_pure: Option<f64>,
    pub units: String,
    pub failed_jobs: usize,
}

impl LogRecord for RunRecord {
    const HEADER: &'static [&'static str] = &[
        "method",
        "table_type",
        "workers",
        "hours",
        "num_rows",
        "seconds_full",
        "rate_full",
        "seconds_pure",
        "rate_pure",
        "units",
        "failed_jobs",
    ];
}

impl RunRecord {
    pub fn summarize(
        method: Method,
        table_type: TableType,
        workers: usize,
        hours: usize,
        records: &[BenchmarkRecord],
        timing: TimingSplit,
    ) -> Self {
        let num_rows = records
            .iter()
            .filter(|r| r.is_success())
            .map(|r| r.num_rows)
            .sum();
        let failed_jobs = records.iter().filter(|r| !r.is_success()).count();

        Self {
            method,
            table_type,
            workers,
            hours,
            num_rows,
            seconds_full: timing.full().as_secs_f64(),
            rate_full: rate(num_rows, timing.full()),
            seconds_pure: timing.pure().as_secs_f64(),
            rate_pure: rate(num_rows, timing.pure()),
            units: UNITS_LABEL.to_string(),
            failed_jobs,
        }
    }
}
