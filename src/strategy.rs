//! Execution strategy selection.
//!
//! The strategy is derived from the capabilities probed once per database
//! and from whether a sample carries parameters. Statement text for each
//! strategy is built here by pure functions so that the exact SQL issued can
//! be checked without a connection.

use std::fmt;

use crate::encode::quoted_params;
use crate::router::QUERY_MARKER_SQL;
use crate::sample::QuerySample;

/// Name of the prepared statement used on the fallback path.
///
/// The name is shared by all samples on one connection, which is why a
/// database's samples are processed strictly one at a time.
pub const PREPARED_STATEMENT_NAME: &str = "pganalyze_explain";

/// Schema holding the privileged helper functions.
pub const HELPER_SCHEMA: &str = "pganalyze";

/// Name of the explain helper function inside `HELPER_SCHEMA`.
pub const EXPLAIN_HELPER: &str = "explain";

const EXPLAIN_PREFIX: &str = "EXPLAIN (VERBOSE, FORMAT JSON) ";

/// What the probe found out about a connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// `pganalyze.explain()` is installed in the connected database.
    pub helper_available: bool,
    /// The session holds superuser-equivalent privileges.
    pub is_elevated_session: bool,
}

impl Capabilities {
    /// Returns true if operators should be told to install the helper.
    pub fn needs_helper_advisory(&self) -> bool {
        !self.helper_available && !self.is_elevated_session
    }
}

/// How a single eligible sample is explained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Call the helper function with bind parameters.
    HelperFunction,
    /// PREPARE, EXPLAIN EXECUTE with literal arguments, DEALLOCATE.
    PreparedStatement,
    /// EXPLAIN the query text directly.
    DirectExplain,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HelperFunction => write!(f, "helper function"),
            Self::PreparedStatement => write!(f, "prepared statement"),
            Self::DirectExplain => write!(f, "direct explain"),
        }
    }
}

/// Chooses the strategy for a sample. The helper is preferred whenever present.
pub fn select_strategy(capabilities: &Capabilities, has_parameters: bool) -> Strategy {
    if capabilities.helper_available {
        Strategy::HelperFunction
    } else if has_parameters {
        Strategy::PreparedStatement
    } else {
        Strategy::DirectExplain
    }
}

/// Statements to issue for one sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExplainPlan {
    HelperFunction {
        sql: String,
        query: String,
        parameters: Vec<String>,
    },
    PreparedStatement {
        prepare: String,
        execute: String,
        deallocate: String,
    },
    DirectExplain {
        sql: String,
    },
}

impl ExplainPlan {
    /// Builds the statements for `sample` under `strategy`.
    pub fn build(strategy: Strategy, sample: &QuerySample) -> Self {
        match strategy {
            Strategy::HelperFunction => Self::HelperFunction {
                sql: helper_call_sql(),
                query: sample.query.clone(),
                parameters: sample.parameters.clone(),
            },
            Strategy::PreparedStatement => Self::PreparedStatement {
                prepare: prepare_sql(&sample.query),
                execute: explain_execute_sql(&sample.parameters),
                deallocate: deallocate_sql(),
            },
            Strategy::DirectExplain => Self::DirectExplain {
                sql: direct_explain_sql(&sample.query),
            },
        }
    }
}

/// `SELECT pganalyze.explain($1, $2)`, to be bound with query text and a text array.
pub fn helper_call_sql() -> String {
    format!("{QUERY_MARKER_SQL}SELECT {HELPER_SCHEMA}.{EXPLAIN_HELPER}($1, $2)")
}

pub fn prepare_sql(query: &str) -> String {
    format!("{QUERY_MARKER_SQL}PREPARE {PREPARED_STATEMENT_NAME} AS {query}")
}

pub fn explain_execute_sql(parameters: &[String]) -> String {
    format!(
        "{QUERY_MARKER_SQL}{EXPLAIN_PREFIX}EXECUTE {PREPARED_STATEMENT_NAME}({})",
        quoted_params(parameters)
    )
}

pub fn deallocate_sql() -> String {
    format!("{QUERY_MARKER_SQL}DEALLOCATE {PREPARED_STATEMENT_NAME}")
}

pub fn direct_explain_sql(query: &str) -> String {
    format!("{QUERY_MARKER_SQL}{EXPLAIN_PREFIX}{query}")
}
