//! Loading strategies.
//!
//! Every method is a [`LoadStrategy`] over some session type. The database
//! strategies work on [`PgSession`]; tests drive the scheduler with fake
//! sessions through the same trait.

pub mod copy_binary;
pub mod copy_csv;
pub mod external_tool;
pub mod multi_row_insert;
pub mod row_insert;

pub use copy_binary::CopyBinary;
pub use copy_csv::CopyCsv;
pub use external_tool::ExternalTool;
pub use multi_row_insert::MultiRowInsert;
pub use row_insert::RowInsert;

use async_trait::async_trait;
use std::sync::Arc;
use tokio_postgres::types::{ToSql, Type};

use crate::config::{DatabaseConfig, LoadOptions};
use crate::db::{PgSession, Session};
use crate::error::{BenchError, LoadPhase, Result};
use crate::models::{Batch, Method, TimingSplit, WeatherRow, WEATHER_COLUMNS};

/// Postgres types of the weather columns, in column order.
pub const COLUMN_TYPES: [Type; 10] = [
    Type::TIMESTAMPTZ,
    Type::INT4,
    Type::FLOAT4,
    Type::FLOAT4,
    Type::FLOAT4,
    Type::FLOAT4,
    Type::FLOAT4,
    Type::FLOAT4,
    Type::FLOAT4,
    Type::FLOAT4,
];

/// One unit of work handed to a strategy.
#[derive(Debug, Clone, Copy)]
pub struct LoadUnit<'a> {
    pub index: usize,
    /// Absent for strategies that read pre-existing files.
    pub batch: Option<&'a Batch>,
}

impl<'a> LoadUnit<'a> {
    pub fn new(index: usize, batch: Option<&'a Batch>) -> Self {
        Self { index, batch }
    }

    pub fn require_batch(&self, method: Method) -> Result<&'a Batch> {
        self.batch.ok_or_else(|| {
            BenchError::load(
                method,
                LoadPhase::MissingInput,
                format!("no rows materialized for hour {}", self.index),
            )
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadOutcome {
    pub rows: usize,
    pub timing: TimingSplit,
}

#[async_trait]
pub trait LoadStrategy<S: Session>: Send + Sync {
    fn method(&self) -> Method;

    /// False when the strategy loads files that already exist on disk.
    fn needs_batch(&self) -> bool {
        true
    }

    /// Runs once per run, before any job is dispatched.
    async fn prepare(&self, _session: &mut S) -> Result<()> {
        Ok(())
    }

    /// False when the strategy drives its own client. Such jobs never open a
    /// harness session and run through [`LoadStrategy::load_detached`].
    fn needs_session(&self) -> bool {
        true
    }

    async fn load(&self, unit: LoadUnit<'_>, session: &mut S) -> Result<LoadOutcome>;

    async fn load_detached(&self, _unit: LoadUnit<'_>) -> Result<LoadOutcome> {
        Err(BenchError::Config(format!(
            "{} needs a database session",
            self.method()
        )))
    }
}

/// Shared inputs for building a strategy.
#[derive(Debug, Clone)]
pub struct StrategyContext {
    pub table: String,
    pub options: LoadOptions,
    pub database: DatabaseConfig,
}

type Constructor = fn(&StrategyContext) -> Arc<dyn LoadStrategy<PgSession>>;

const REGISTRY: &[(Method, Constructor)] = &[
    (Method::RowInsert, make_row_insert),
    (Method::MultiRowInsert, make_multi_row_insert),
    (Method::CopyBinary, make_copy_binary),
    (Method::CopyCsv, make_copy_csv),
    (Method::PgBulkload, make_pg_bulkload),
    (Method::TimescaledbParallelCopy, make_parallel_copy),
];

fn make_row_insert(ctx: &StrategyContext) -> Arc<dyn LoadStrategy<PgSession>> {
    Arc::new(RowInsert::new(&ctx.table))
}

fn make_multi_row_insert(ctx: &StrategyContext) -> Arc<dyn LoadStrategy<PgSession>> {
    Arc::new(MultiRowInsert::new(&ctx.table, &ctx.options))
}

fn make_copy_binary(ctx: &StrategyContext) -> Arc<dyn LoadStrategy<PgSession>> {
    Arc::new(CopyBinary::new(&ctx.table))
}

fn make_copy_csv(ctx: &StrategyContext) -> Arc<dyn LoadStrategy<PgSession>> {
    Arc::new(CopyCsv::new(&ctx.table, &ctx.options))
}

fn make_pg_bulkload(ctx: &StrategyContext) -> Arc<dyn LoadStrategy<PgSession>> {
    Arc::new(ExternalTool::pg_bulkload(&ctx.table, &ctx.options, &ctx.database))
}

fn make_parallel_copy(ctx: &StrategyContext) -> Arc<dyn LoadStrategy<PgSession>> {
    Arc::new(ExternalTool::parallel_copy(&ctx.table, &ctx.options, &ctx.database))
}

/// Look up the constructor for `method` and build the strategy.
pub fn build_strategy(
    method: Method,
    context: &StrategyContext,
) -> Result<Arc<dyn LoadStrategy<PgSession>>> {
    REGISTRY
        .iter()
        .find(|(m, _)| *m == method)
        .map(|(_, construct)| construct(context))
        .ok_or_else(|| BenchError::Config(format!("No strategy registered for {}", method)))
}

/// Names accepted by `--method`.
pub fn registered_methods() -> Vec<&'static str> {
    REGISTRY.iter().map(|(m, _)| m.name()).collect()
}

pub(crate) fn column_list() -> String {
    WEATHER_COLUMNS.join(", ")
}

pub(crate) fn row_params(row: &WeatherRow) -> [&(dyn ToSql + Sync); 10] {
    [
        &row.time,
        &row.location_id,
        &row.latitude,
        &row.longitude,
        &row.temperature_2m,
        &row.zonal_wind_10m,
        &row.meridional_wind_10m,
        &row.total_cloud_cover,
        &row.total_precipitation,
        &row.snowfall,
    ]
}

/// `($1, $2, ...), ($11, ...)` for `rows` rows of `columns` parameters.
pub(crate) fn values_placeholders(rows: usize, columns: usize) -> String {
    (0..rows)
        .map(|r| {
            let params: Vec<String> = (1..=columns).map(|c| format!("${}", r * columns + c)).collect();
            format!("({})", params.join(", "))
        })
        .collect::<Vec<_>>()
        .join(", ")
}
