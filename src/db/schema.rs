use async_trait::async_trait;
use tokio_postgres::Client;
use tracing::info;

use crate::config::TablePreparation;
use crate::db::PgSession;
use crate::error::{BenchError, Result};

/// DDL for the weather table.
pub struct TableDdl {
    table: String,
}

impl TableDdl {
    /// Table names are interpolated into SQL, so only plain identifiers
    /// (optionally schema-qualified) are accepted.
    pub fn new(table: &str) -> Result<Self> {
        let valid = !table.is_empty()
            && table.split('.').all(|part| {
                !part.is_empty()
                    && part
                        .chars()
                        .next()
                        .map_or(false, |c| c.is_ascii_alphabetic() || c == '_')
                    && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
            });
        if !valid {
            return Err(BenchError::Config(format!("Invalid table name '{}'", table)));
        }
        Ok(Self {
            table: table.to_string(),
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn create_sql(&self, unlogged: bool) -> String {
        format!(
            "CREATE {}TABLE IF NOT EXISTS {} (
                time timestamptz NOT NULL,
                location_id int,
                latitude float4,
                longitude float4,
                temperature_2m float4,
                zonal_wind_10m float4,
                meridional_wind_10m float4,
                total_cloud_cover float4,
                total_precipitation float4,
                snowfall float4
            )",
            if unlogged { "UNLOGGED " } else { "" },
            self.table
        )
    }

    pub fn hypertable_sql(&self) -> String {
        format!(
            "SELECT create_hypertable('{}', 'time', if_not_exists => TRUE)",
            self.table
        )
    }

    pub fn drop_sql(&self) -> String {
        format!("DROP TABLE IF EXISTS {}", self.table)
    }

    /// Create the table (and hypertable) if missing. Running it twice is a no-op.
    pub async fn create(&self, client: &Client, unlogged: bool, hypertable: bool) -> Result<()> {
        client.batch_execute(&self.create_sql(unlogged)).await?;
        if hypertable {
            client.batch_execute(&self.hypertable_sql()).await?;
        }
        info!(
            "Table {} ready ({}{})",
            self.table,
            if unlogged { "unlogged " } else { "" },
            if hypertable { "hypertable" } else { "regular" }
        );
        Ok(())
    }

    pub async fn drop(&self, client: &Client) -> Result<()> {
        client.batch_execute(&self.drop_sql()).await?;
        info!("Dropped table {}", self.table);
        Ok(())
    }

    pub async fn count_rows(&self, client: &Client) -> Result<i64> {
        let row = client
            .query_one(&format!("SELECT count(*) FROM {}", self.table), &[])
            .await?;
        Ok(row.get(0))
    }
}

/// Table work the harness runs while preparing, over one session.
#[async_trait]
pub trait TableSetup<S>: Send + Sync {
    async fn apply(&self, session: &mut S) -> Result<()>;
}

/// Create (and optionally first drop) the target table.
pub struct TablePlan {
    pub ddl: TableDdl,
    pub preparation: TablePreparation,
    pub hypertable: bool,
}

#[async_trait]
impl TableSetup<PgSession> for TablePlan {
    async fn apply(&self, session: &mut PgSession) -> Result<()> {
        let client = session.client();
        if self.preparation.drop_first {
            self.ddl.drop(client).await?;
        }
        if self.preparation.create {
            self.ddl
                .create(client, self.preparation.unlogged, self.hypertable)
                .await?;
        }
        Ok(())
    }
}
