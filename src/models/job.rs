use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::BenchError;

/// Loading methods that can be benchmarked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    RowInsert,
    MultiRowInsert,
    CopyBinary,
    CopyCsv,
    PgBulkload,
    TimescaledbParallelCopy,
}

impl Method {
    pub const ALL: [Method; 6] = [
        Method::RowInsert,
        Method::MultiRowInsert,
        Method::CopyBinary,
        Method::CopyCsv,
        Method::PgBulkload,
        Method::TimescaledbParallelCopy,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Method::RowInsert => "row_insert",
            Method::MultiRowInsert => "multi_row_insert",
            Method::CopyBinary => "copy_binary",
            Method::CopyCsv => "copy_csv",
            Method::PgBulkload => "pg_bulkload",
            Method::TimescaledbParallelCopy => "timescaledb_parallel_copy",
        }
    }

    /// Methods that shell out to a loader binary instead of using a session.
    pub fn is_external(&self) -> bool {
        matches!(self, Method::PgBulkload | Method::TimescaledbParallelCopy)
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Method {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Method::ALL
            .iter()
            .find(|m| m.name() == s)
            .copied()
            .ok_or_else(|| {
                let known: Vec<&str> = Method::ALL.iter().map(|m| m.name()).collect();
                BenchError::Config(format!(
                    "Unknown method '{}'. Expected one of: {}",
                    s,
                    known.join(", ")
                ))
            })
    }
}

/// Plain PostgreSQL table or TimescaleDB hypertable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableType {
    Regular,
    Hyper,
}

impl TableType {
    pub fn name(&self) -> &'static str {
        match self {
            TableType::Regular => "regular",
            TableType::Hyper => "hyper",
        }
    }

    pub fn is_hypertable(&self) -> bool {
        matches!(self, TableType::Hyper)
    }
}

impl std::fmt::Display for TableType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TableType {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "regular" => Ok(TableType::Regular),
            "hyper" => Ok(TableType::Hyper),
            _ => Err(BenchError::Config(format!(
                "Unknown table type '{}'. Expected 'regular' or 'hyper'",
                s
            ))),
        }
    }
}

/// One hour of data to be loaded by one strategy invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadJob {
    pub index: usize,
    pub table: String,
    pub method: Method,
    pub table_type: TableType,
}

impl LoadJob {
    pub fn plan(hours: usize, table: &str, method: Method, table_type: TableType) -> Vec<Self> {
        (0..hours)
            .map(|index| LoadJob {
                index,
                table: table.to_string(),
                method,
                table_type,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_names_round_trip() {
        for method in Method::ALL {
            assert_eq!(method.name().parse::<Method>().unwrap(), method);
        }
        assert!(Method::TimescaledbParallelCopy.is_external());
        assert!(!Method::CopyCsv.is_external());
    }

    #[test]
    fn test_unknown_method_is_config_error() {
        let err = "pandas".parse::<Method>().unwrap_err();
        assert!(err.to_string().contains("Unknown method 'pandas'"));
    }

    #[test]
    fn test_plan_builds_one_job_per_hour() {
        let jobs = LoadJob::plan(3, "weather", Method::CopyBinary, TableType::Hyper);
        let indices: Vec<usize> = jobs.iter().map(|j| j.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert!(LoadJob::plan(0, "weather", Method::RowInsert, TableType::Regular).is_empty());
    }
}
