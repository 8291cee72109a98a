use async_trait::async_trait;
use futures::{stream, StreamExt, TryStreamExt};
use tokio_postgres::types::{ToSql, Type};
use tracing::debug;

use super::{column_list, row_params, values_placeholders, LoadOutcome, LoadStrategy, LoadUnit, COLUMN_TYPES};
use crate::config::LoadOptions;
use crate::db::PgSession;
use crate::error::{BenchError, LoadPhase, Result};
use crate::models::{Method, Stopwatch, WEATHER_COLUMNS};

const METHOD: Method = Method::MultiRowInsert;

/// Multi-VALUES INSERT statements, pipelined over one session.
///
/// Up to `pipeline_depth` statements are in flight at once; tokio-postgres
/// writes them back to back without waiting for each response.
pub struct MultiRowInsert {
    table: String,
    chunk_rows: usize,
    pipeline_depth: usize,
}

impl MultiRowInsert {
    pub fn new(table: &str, options: &LoadOptions) -> Self {
        Self {
            table: table.to_string(),
            chunk_rows: options.rows_per_statement(WEATHER_COLUMNS.len()),
            pipeline_depth: options.pipeline_depth.max(1),
        }
    }

    pub fn chunk_rows(&self) -> usize {
        self.chunk_rows
    }

    fn statement_sql(&self, rows: usize) -> String {
        format!(
            "INSERT INTO {} ({}) VALUES {}",
            self.table,
            column_list(),
            values_placeholders(rows, WEATHER_COLUMNS.len())
        )
    }

    fn statement_types(rows: usize) -> Vec<Type> {
        COLUMN_TYPES.iter().cloned().cycle().take(rows * COLUMN_TYPES.len()).collect()
    }
}

#[async_trait]
impl LoadStrategy<PgSession> for MultiRowInsert {
    fn method(&self) -> Method {
        METHOD
    }

    async fn load(&self, unit: LoadUnit<'_>, session: &mut PgSession) -> Result<LoadOutcome> {
        let batch = unit.require_batch(METHOD)?;
        let mut watch = Stopwatch::start();

        // Parameter lists are built up front so the pure phase only covers
        // the statements themselves.
        let chunks: Vec<Vec<&(dyn ToSql + Sync)>> = batch
            .rows
            .chunks(self.chunk_rows)
            .map(|chunk| chunk.iter().flat_map(row_params).collect())
            .collect();

        let tx = session
            .client_mut()
            .transaction()
            .await
            .map_err(|e| BenchError::load(METHOD, LoadPhase::Prepare, e))?;

        let full_rows = self.chunk_rows.min(batch.row_count());
        let tail_rows = batch.row_count() % self.chunk_rows;
        let full_statement = if full_rows > 0 {
            Some(
                tx.prepare_typed(&self.statement_sql(full_rows), &Self::statement_types(full_rows))
                    .await
                    .map_err(|e| BenchError::load(METHOD, LoadPhase::Prepare, e))?,
            )
        } else {
            None
        };
        let tail_statement = if tail_rows > 0 && tail_rows != full_rows {
            Some(
                tx.prepare_typed(&self.statement_sql(tail_rows), &Self::statement_types(tail_rows))
                    .await
                    .map_err(|e| BenchError::load(METHOD, LoadPhase::Prepare, e))?,
            )
        } else {
            None
        };

        let inserted = watch
            .pure(async {
                let tx = &tx;
                let pending: Vec<_> = chunks
                    .iter()
                    .map(|params| {
                        let statement = if params.len() == full_rows * WEATHER_COLUMNS.len() {
                            full_statement.as_ref()
                        } else {
                            tail_statement.as_ref()
                        };
                        async move {
                            match statement {
                                Some(statement) => tx.execute(statement, params.as_slice()).await,
                                None => Ok(0),
                            }
                        }
                    })
                    .collect();
                let inserted = stream::iter(pending)
                    .buffered(self.pipeline_depth)
                    .try_fold(0u64, |total, n| async move { Ok(total + n) })
                    .await
                    .map_err(|e| BenchError::load(METHOD, LoadPhase::Insert, e))?;
                Ok::<u64, BenchError>(inserted)
            })
            .await?;

        watch
            .pure(tx.commit())
            .await
            .map_err(|e| BenchError::load(METHOD, LoadPhase::Commit, e))?;

        debug!(
            "Inserted hour {} in {} statements ({} rows)",
            unit.index,
            chunks.len(),
            inserted
        );
        Ok(LoadOutcome {
            rows: batch.row_count(),
            timing: watch.finish(),
        })
    }
}
