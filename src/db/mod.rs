pub mod schema;
pub mod session;

pub use schema::{TableDdl, TablePlan, TableSetup};
pub use session::{Connector, PgConnector, PgSession, Session};
