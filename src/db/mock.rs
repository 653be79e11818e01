//! Mock connections for testing.
//!
//! `MockConnector` hands out `RecordingConnection`s that log every statement
//! they receive into a shared `StatementLog` and answer from a script.

use super::{Connector, ExplainConnection};
use crate::error::{CaptureError, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Plan text returned by a mock EXPLAIN.
pub const MOCK_PLAN: &str = r#"[{"Plan": {"Node Type": "Result"}}]"#;

/// One statement received by a mock connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggedStatement {
    pub database: String,
    pub sql: String,
    /// Values bound to the statement, in order. Empty for unbound statements.
    pub bound: Vec<String>,
    /// Issued through `fetch_bool`, i.e. a capability check.
    pub capability_check: bool,
}

#[derive(Debug, Default)]
struct LogInner {
    statements: Vec<LoggedStatement>,
    connects: Vec<String>,
    closes: Vec<String>,
}

/// Shared record of everything the mock connections saw.
#[derive(Debug, Clone, Default)]
pub struct StatementLog {
    inner: Arc<Mutex<LogInner>>,
}

impl StatementLog {
    fn with<T>(&self, f: impl FnOnce(&mut LogInner) -> T) -> T {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut *guard)
    }

    fn push(&self, database: &str, sql: &str, bound: Vec<String>, capability_check: bool) {
        self.with(|log| {
            log.statements.push(LoggedStatement {
                database: database.to_string(),
                sql: sql.to_string(),
                bound,
                capability_check,
            })
        });
    }

    /// All statements, in the order they were issued.
    pub fn statements(&self) -> Vec<LoggedStatement> {
        self.with(|log| log.statements.clone())
    }

    /// SQL text of statements issued against `database`, excluding capability checks.
    pub fn sql_for(&self, database: &str) -> Vec<String> {
        self.with(|log| {
            log.statements
                .iter()
                .filter(|s| s.database == database && !s.capability_check)
                .map(|s| s.sql.clone())
                .collect()
        })
    }

    /// Databases a connection was successfully opened for.
    pub fn connects(&self) -> Vec<String> {
        self.with(|log| log.connects.clone())
    }

    /// Databases whose connection was closed.
    pub fn closes(&self) -> Vec<String> {
        self.with(|log| log.closes.clone())
    }
}

/// Scripted connector producing recording connections.
#[derive(Debug, Clone)]
pub struct MockConnector {
    log: StatementLog,
    helper_available: bool,
    superuser: bool,
    unreachable: HashSet<String>,
    failing_probes: bool,
    failing_statements: Vec<String>,
    plan: String,
}

impl Default for MockConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl MockConnector {
    /// Creates a connector for a server without helper and without superuser.
    pub fn new() -> Self {
        Self {
            log: StatementLog::default(),
            helper_available: false,
            superuser: false,
            unreachable: HashSet::new(),
            failing_probes: false,
            failing_statements: Vec::new(),
            plan: MOCK_PLAN.to_string(),
        }
    }

    /// Reports `pganalyze.explain()` as installed.
    pub fn with_helper(mut self) -> Self {
        self.helper_available = true;
        self
    }

    /// Reports the session as superuser.
    pub fn with_superuser(mut self) -> Self {
        self.superuser = true;
        self
    }

    /// Makes connecting to `database` fail.
    pub fn with_unreachable(mut self, database: impl Into<String>) -> Self {
        self.unreachable.insert(database.into());
        self
    }

    /// Makes the helper lookup fail on every connection.
    pub fn with_failing_probes(mut self) -> Self {
        self.failing_probes = true;
        self
    }

    /// Makes any statement containing `fragment` fail.
    pub fn failing_on(mut self, fragment: impl Into<String>) -> Self {
        self.failing_statements.push(fragment.into());
        self
    }

    /// Returns the shared statement log.
    pub fn log(&self) -> StatementLog {
        self.log.clone()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, database: &str) -> Result<Box<dyn ExplainConnection>> {
        if self.unreachable.contains(database) {
            return Err(CaptureError::connection(format!(
                "Database '{database}' does not exist."
            )));
        }
        self.log.with(|log| log.connects.push(database.to_string()));
        Ok(Box::new(RecordingConnection {
            database: database.to_string(),
            script: self.clone(),
        }))
    }
}

/// A connection that records statements and answers from its script.
#[derive(Debug)]
pub struct RecordingConnection {
    database: String,
    script: MockConnector,
}

impl RecordingConnection {
    fn record(&self, sql: &str, bound: Vec<String>, capability_check: bool) -> Result<()> {
        self.script.log.push(&self.database, sql, bound, capability_check);
        match self
            .script
            .failing_statements
            .iter()
            .find(|fragment| sql.contains(fragment.as_str()))
        {
            Some(fragment) => Err(CaptureError::query(format!(
                "ERROR: mock failure on \"{fragment}\""
            ))),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ExplainConnection for RecordingConnection {
    async fn fetch_text(&mut self, sql: &str) -> Result<String> {
        self.record(sql, Vec::new(), false)?;
        Ok(self.script.plan.clone())
    }

    async fn fetch_text_bound(
        &mut self,
        sql: &str,
        query: &str,
        parameters: &[String],
    ) -> Result<String> {
        let mut bound = vec![query.to_string()];
        bound.extend(parameters.iter().cloned());
        self.record(sql, bound, false)?;
        Ok(self.script.plan.clone())
    }

    async fn fetch_bool(&mut self, sql: &str, args: &[&str]) -> Result<bool> {
        self.record(sql, args.iter().map(|a| a.to_string()).collect(), true)?;
        if sql.contains("pg_proc") {
            if self.script.failing_probes {
                return Err(CaptureError::query("ERROR: permission denied for pg_proc"));
            }
            Ok(self.script.helper_available)
        } else {
            Ok(self.script.superuser)
        }
    }

    async fn execute(&mut self, sql: &str) -> Result<()> {
        self.record(sql, Vec::new(), false)
    }

    async fn close(&mut self) -> Result<()> {
        self.script
            .log
            .with(|log| log.closes.push(self.database.clone()));
        Ok(())
    }
}
