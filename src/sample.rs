//! Query sample types.
//!
//! A `QuerySample` is one previously observed statement execution together
//! with its bound parameter values. It is the unit of work for the capture
//! engine and is returned, possibly annotated with a plan or an error.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a captured plan came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExplainSource {
    /// No plan has been captured yet.
    #[default]
    Unknown,
    /// Plan logged by the server itself (e.g. auto_explain).
    AutoExplain,
    /// Plan captured by re-running the logged statement under EXPLAIN.
    StatementLogExplain,
}

impl fmt::Display for ExplainSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::AutoExplain => write!(f, "auto_explain"),
            Self::StatementLogExplain => write!(f, "statement_log_explain"),
        }
    }
}

/// Encoding of a captured plan payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExplainFormat {
    #[default]
    Text,
    Json,
}

impl fmt::Display for ExplainFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// A previously observed SQL execution, eligible for plan capture.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuerySample {
    /// Owning database; empty means the default monitored database.
    #[serde(default)]
    pub database: String,

    /// Raw SQL text as originally observed.
    pub query: String,

    /// Parameter values aligned positionally with `$n` placeholders.
    #[serde(default)]
    pub parameters: Vec<String>,

    /// True if a plan was already captured by another source.
    #[serde(default)]
    pub has_explain: bool,

    #[serde(default)]
    pub explain_source: ExplainSource,

    #[serde(default)]
    pub explain_format: ExplainFormat,

    /// Plan payload, present only on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explain_output: Option<String>,

    /// Failure description, present only on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explain_error: Option<String>,
}

impl QuerySample {
    /// Creates a sample with the given database, query text and parameters.
    pub fn new(
        database: impl Into<String>,
        query: impl Into<String>,
        parameters: Vec<String>,
    ) -> Self {
        Self {
            database: database.into(),
            query: query.into(),
            parameters,
            ..Default::default()
        }
    }

    /// Returns true if this sample carries bound parameter values.
    pub fn has_parameters(&self) -> bool {
        !self.parameters.is_empty()
    }

    /// Returns true if an explain attempt left either a plan or an error.
    pub fn explain_attempted(&self) -> bool {
        self.explain_output.is_some() || self.explain_error.is_some()
    }

    /// Applies the resubmission contract: a sample that already carries an
    /// explain result is flagged so that later passes leave it alone.
    pub fn mark_explained(&mut self) {
        if self.explain_attempted() {
            self.has_explain = true;
        }
    }
}
