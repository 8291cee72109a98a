use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_postgres::{Client, NoTls};
use tracing::{debug, warn};

use crate::config::DatabaseConfig;
use crate::error::{BenchError, Result};

/// One open database session, owned by exactly one worker at a time.
pub trait Session: Send + 'static {
    /// False once the session can no longer run statements.
    fn is_usable(&self) -> bool;
}

/// Opens sessions. The scheduler holds one per run and asks it for a new
/// session whenever a worker has none (or its last one broke).
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Session: Session;

    async fn connect(&self) -> Result<Self::Session>;

    /// Printable target for logs and error messages.
    fn target(&self) -> String;
}

pub struct PgConnector {
    config: DatabaseConfig,
}

impl PgConnector {
    pub fn new(config: DatabaseConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for PgConnector {
    type Session = PgSession;

    async fn connect(&self) -> Result<PgSession> {
        let (client, connection) = self
            .config
            .pg_config()
            .connect(NoTls)
            .await
            .map_err(|e| BenchError::connection(self.config.target(), e))?;

        let driver = tokio::spawn(async move {
            if let Err(e) = connection.await {
                warn!("Database connection closed with error: {}", e);
            }
        });
        debug!("Connected to {}", self.config.target());

        Ok(PgSession { client, driver })
    }

    fn target(&self) -> String {
        self.config.target()
    }
}

/// A `tokio_postgres` client plus the task driving its connection.
///
/// Dropping the session closes the connection, including when the owning
/// worker unwinds.
pub struct PgSession {
    client: Client,
    driver: JoinHandle<()>,
}

impl PgSession {
    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut Client {
        &mut self.client
    }
}

impl Session for PgSession {
    fn is_usable(&self) -> bool {
        !self.client.is_closed() && !self.driver.is_finished()
    }
}

impl Drop for PgSession {
    fn drop(&mut self) {
        self.driver.abort();
    }
}
