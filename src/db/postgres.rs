//! PostgreSQL connection implementation.
//!
//! Provides `PostgresConnector` and `PostgresConnection`, implementing the
//! connection traits on top of a single sqlx `PgConnection`. A pool is not
//! used: prepared statements live in the session, so every statement for a
//! database must go over the same physical connection.

use crate::config::ServerConfig;
use crate::db::{Connector, ExplainConnection};
use crate::error::{CaptureError, Result};
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::{ConnectOptions, Connection, Row};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

/// Maximum number of connection attempts.
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Base delay between retry attempts (doubles each retry).
const RETRY_BASE_DELAY_MS: u64 = 500;

/// Reported to the server as `application_name`.
const APPLICATION_NAME: &str = "pg-explain-capture";

/// Opens sqlx connections to databases on one server.
#[derive(Debug, Clone)]
pub struct PostgresConnector {
    server: ServerConfig,
}

impl PostgresConnector {
    /// Creates a connector for the given server.
    pub fn new(server: ServerConfig) -> Self {
        Self { server }
    }

    fn connect_options(&self, database: &str) -> Result<PgConnectOptions> {
        let url = self.server.connection_string_for(database)?;
        let options = PgConnectOptions::from_str(&url)
            .map_err(|e| CaptureError::config(format!("Invalid connection options: {e}")))?
            .application_name(APPLICATION_NAME);
        Ok(options)
    }
}

#[async_trait]
impl Connector for PostgresConnector {
    async fn connect(&self, database: &str) -> Result<Box<dyn ExplainConnection>> {
        let options = self.connect_options(database)?;

        let mut last_error = None;
        let mut delay = Duration::from_millis(RETRY_BASE_DELAY_MS);

        for attempt in 1..=MAX_RETRY_ATTEMPTS {
            debug!("Connection attempt {} of {}", attempt, MAX_RETRY_ATTEMPTS);

            match options.connect().await {
                Ok(conn) => {
                    debug!("Connected to database \"{}\"", database);
                    return Ok(Box::new(PostgresConnection::new(conn)));
                }
                Err(e) => {
                    let is_transient = is_transient_error(&e);
                    last_error = Some(e);

                    if attempt < MAX_RETRY_ATTEMPTS && is_transient {
                        warn!(
                            "Connection attempt {} failed (transient error), retrying in {:?}",
                            attempt, delay
                        );
                        tokio::time::sleep(delay).await;
                        delay *= 2;
                    } else {
                        break;
                    }
                }
            }
        }

        Err(match last_error {
            Some(e) => map_connection_error(e, &self.server, database),
            None => CaptureError::internal("no connection attempt was made"),
        })
    }
}

/// A single sqlx connection used for one database's samples.
#[derive(Debug)]
pub struct PostgresConnection {
    conn: Option<PgConnection>,
}

impl PostgresConnection {
    /// Wraps an already established connection.
    pub fn new(conn: PgConnection) -> Self {
        Self { conn: Some(conn) }
    }

    fn conn(&mut self) -> Result<&mut PgConnection> {
        self.conn
            .as_mut()
            .ok_or_else(|| CaptureError::internal("connection already closed"))
    }
}

#[async_trait]
impl ExplainConnection for PostgresConnection {
    async fn fetch_text(&mut self, sql: &str) -> Result<String> {
        // Simple query protocol: the statement text carries no bind
        // parameters of its own (PREPARE bodies keep their `$n` references).
        let conn = self.conn()?;
        let row = sqlx::Executor::fetch_one(&mut *conn, sqlx::raw_sql(sql))
            .await
            .map_err(|e| CaptureError::query(format_query_error(e)))?;

        // EXPLAIN returns `json`, which decodes fine from its text form.
        row.try_get_unchecked::<String, _>(0)
            .map_err(|e| CaptureError::query(format_query_error(e)))
    }

    async fn fetch_text_bound(
        &mut self,
        sql: &str,
        query: &str,
        parameters: &[String],
    ) -> Result<String> {
        let row = sqlx::query(sql)
            .bind(query)
            .bind(parameters.to_vec())
            .fetch_one(self.conn()?)
            .await
            .map_err(|e| CaptureError::query(format_query_error(e)))?;

        row.try_get_unchecked::<String, _>(0)
            .map_err(|e| CaptureError::query(format_query_error(e)))
    }

    async fn fetch_bool(&mut self, sql: &str, args: &[&str]) -> Result<bool> {
        let mut query = sqlx::query_scalar::<_, bool>(sql);
        for arg in args {
            query = query.bind(*arg);
        }
        query
            .fetch_one(self.conn()?)
            .await
            .map_err(|e| CaptureError::query(format_query_error(e)))
    }

    async fn execute(&mut self, sql: &str) -> Result<()> {
        let conn = self.conn()?;
        sqlx::Executor::execute(&mut *conn, sqlx::raw_sql(sql))
            .await
            .map(|_| ())
            .map_err(|e| CaptureError::query(format_query_error(e)))
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            conn.close()
                .await
                .map_err(|e| CaptureError::connection(e.to_string()))?;
        }
        Ok(())
    }
}

/// Determines if an error is transient and worth retrying.
fn is_transient_error(error: &sqlx::Error) -> bool {
    let error_str = error.to_string().to_lowercase();

    error_str.contains("connection refused")
        || error_str.contains("timed out")
        || error_str.contains("timeout")
        || error_str.contains("temporarily unavailable")
        || error_str.contains("connection reset")
        || error_str.contains("broken pipe")
}

/// Maps sqlx connection errors to readable messages.
fn map_connection_error(error: sqlx::Error, server: &ServerConfig, database: &str) -> CaptureError {
    let host = server.host.as_deref().unwrap_or("localhost");
    let port = server.port;
    let user = server.user.as_deref().unwrap_or("unknown");
    let database = if database.is_empty() {
        server.dbname.as_deref().unwrap_or("unknown")
    } else {
        database
    };

    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") || error_str.contains("could not connect") {
        CaptureError::connection(format!(
            "Cannot connect to {host}:{port}. Check that the server is running."
        ))
    } else if error_str.contains("authentication failed") {
        CaptureError::connection(format!("Authentication failed for user '{user}'."))
    } else if error_str.contains("does not exist") && error_str.contains("database") {
        CaptureError::connection(format!("Database '{database}' does not exist."))
    } else if error_str.contains("timed out") || error_str.contains("timeout") {
        CaptureError::connection(format!("Connection to {host}:{port} timed out."))
    } else {
        CaptureError::connection(error.to_string())
    }
}

/// Formats a driver error the way it is stored on a sample.
fn format_query_error(error: sqlx::Error) -> String {
    let Some(db_error) = error.as_database_error() else {
        return error.to_string();
    };

    let mut result = format!("ERROR: {}", db_error.message());

    if let Some(pg_error) = db_error.try_downcast_ref::<sqlx::postgres::PgDatabaseError>() {
        if let Some(detail) = pg_error.detail() {
            result.push_str("\n  DETAIL: ");
            result.push_str(detail);
        }
        if let Some(hint) = pg_error.hint() {
            result.push_str("\n  HINT: ");
            result.push_str(hint);
        }
    }

    result
}
