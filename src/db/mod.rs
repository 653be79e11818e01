//! Database access for plan capture.
//!
//! The capture engine talks to the server through the narrow
//! `ExplainConnection` trait, and obtains connections per database through
//! a `Connector`. The PostgreSQL implementation uses sqlx; the mock records
//! every statement for tests.

mod mock;
mod postgres;

pub use mock::{LoggedStatement, MockConnector, RecordingConnection, StatementLog, MOCK_PLAN};
pub use postgres::{PostgresConnection, PostgresConnector};

use crate::error::Result;
use async_trait::async_trait;

/// One exclusive session against a single database.
///
/// Statements run in the order they are issued; session state such as
/// prepared statements persists between calls.
#[async_trait]
pub trait ExplainConnection: Send {
    /// Runs a statement that yields one row with one textual column.
    async fn fetch_text(&mut self, sql: &str) -> Result<String>;

    /// Runs `sql` with the query text bound as `$1` and the parameter list
    /// bound as a `text[]` array in `$2`, returning the single text column.
    async fn fetch_text_bound(
        &mut self,
        sql: &str,
        query: &str,
        parameters: &[String],
    ) -> Result<String>;

    /// Runs a statement that yields one boolean, binding `args` as text.
    async fn fetch_bool(&mut self, sql: &str, args: &[&str]) -> Result<bool>;

    /// Runs a statement and discards its result.
    async fn execute(&mut self, sql: &str) -> Result<()>;

    /// Closes the connection. Further calls are invalid.
    async fn close(&mut self) -> Result<()>;
}

/// Opens connections to databases on the monitored server.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connects to `database`; the empty name means the configured database.
    async fn connect(&self, database: &str) -> Result<Box<dyn ExplainConnection>>;
}
