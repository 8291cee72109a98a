use async_trait::async_trait;
use tokio_postgres::binary_copy::BinaryCopyInWriter;
use tokio_postgres::types::ToSql;
use tracing::debug;

use super::{column_list, row_params, LoadOutcome, LoadStrategy, LoadUnit, COLUMN_TYPES};
use crate::db::PgSession;
use crate::error::{BenchError, LoadPhase, Result};
use crate::models::{Method, Stopwatch};

const METHOD: Method = Method::CopyBinary;

/// `COPY ... FROM STDIN (FORMAT binary)` straight from the in-memory batch.
pub struct CopyBinary {
    sql: String,
}

impl CopyBinary {
    pub fn new(table: &str) -> Self {
        Self {
            sql: format!(
                "COPY {} ({}) FROM STDIN (FORMAT binary)",
                table,
                column_list()
            ),
        }
    }
}

#[async_trait]
impl LoadStrategy<PgSession> for CopyBinary {
    fn method(&self) -> Method {
        METHOD
    }

    async fn load(&self, unit: LoadUnit<'_>, session: &mut PgSession) -> Result<LoadOutcome> {
        let batch = unit.require_batch(METHOD)?;
        let mut watch = Stopwatch::start();

        let tuples: Vec<[&(dyn ToSql + Sync); 10]> = batch.rows.iter().map(row_params).collect();
        let client = session.client();

        let copied = watch
            .pure(async {
                let sink = client
                    .copy_in(&self.sql)
                    .await
                    .map_err(|e| BenchError::load(METHOD, LoadPhase::Copy, e))?;
                let writer = BinaryCopyInWriter::new(sink, &COLUMN_TYPES);
                futures::pin_mut!(writer);
                for tuple in &tuples {
                    writer
                        .as_mut()
                        .write(tuple)
                        .await
                        .map_err(|e| BenchError::load(METHOD, LoadPhase::Copy, e))?;
                }
                writer
                    .finish()
                    .await
                    .map_err(|e| BenchError::load(METHOD, LoadPhase::Commit, e))
            })
            .await?;

        debug!("Copied hour {} in binary ({} rows)", unit.index, copied);
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
    fn test_copy_statement() {
        let strategy = CopyBinary::new("weather");
        assert_eq!(
            strategy.sql,
            "COPY weather (time, location_id, latitude, longitude, temperature_2m, \
             zonal_wind_10m, meridional_wind_10m, total_cloud_cover, total_precipitation, \
             snowfall) FROM STDIN (FORMAT binary)"
        );
    }
}
