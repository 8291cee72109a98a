use async_trait::async_trait;
use tracing::debug;

use super::{column_list, row_params, values_placeholders, LoadOutcome, LoadStrategy, LoadUnit, COLUMN_TYPES};
use crate::db::PgSession;
use crate::error::{BenchError, LoadPhase, Result};
use crate::models::{Method, Stopwatch, WEATHER_COLUMNS};

const METHOD: Method = Method::RowInsert;

/// One prepared INSERT per row, all inside a single transaction.
pub struct RowInsert {
    sql: String,
}

impl RowInsert {
    pub fn new(table: &str) -> Self {
        Self {
            sql: format!(
                "INSERT INTO {} ({}) VALUES {}",
                table,
                column_list(),
                values_placeholders(1, WEATHER_COLUMNS.len())
            ),
        }
    }
}

#[async_trait]
impl LoadStrategy<PgSession> for RowInsert {
    fn method(&self) -> Method {
        METHOD
    }

    async fn load(&self, unit: LoadUnit<'_>, session: &mut PgSession) -> Result<LoadOutcome> {
        let batch = unit.require_batch(METHOD)?;
        let mut watch = Stopwatch::start();

        let tx = session
            .client_mut()
            .transaction()
            .await
            .map_err(|e| BenchError::load(METHOD, LoadPhase::Prepare, e))?;
        let statement = tx
            .prepare_typed(&self.sql, &COLUMN_TYPES)
            .await
            .map_err(|e| BenchError::load(METHOD, LoadPhase::Prepare, e))?;

        watch
            .pure(async move {
                for row in &batch.rows {
                    tx.execute(&statement, &row_params(row))
                        .await
                        .map_err(|e| BenchError::load(METHOD, LoadPhase::Insert, e))?;
                }
                tx.commit()
                    .await
                    .map_err(|e| BenchError::load(METHOD, LoadPhase::Commit, e))
            })
            .await?;

        debug!("Inserted hour {} row by row ({} rows)", unit.index, batch.row_count());
        Ok(LoadOutcome {
            rows: batch.row_count(),
            timing: watch.finish(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_statement_shape() {
        let strategy = RowInsert::new("weather");
        assert!(strategy.sql.starts_with("INSERT INTO weather (time, location_id,"));
        assert!(strategy.sql.ends_with("VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"));
    }
}
