//! SQL parsing and eligibility logic.
//!
//! Uses sqlparser-rs with PostgreSQL dialect. Only a full parse is trusted;
//! anything the parser rejects is declined.

use sqlparser::ast::Statement;
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

use super::{Eligibility, Rejection, StatementKind};

/// Classifier that parses query text and checks statement eligibility.
#[derive(Debug)]
pub struct StatementClassifier {
    dialect: PostgreSqlDialect,
}

impl Default for StatementClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl StatementClassifier {
    /// Creates a new classifier.
    pub fn new() -> Self {
        Self {
            dialect: PostgreSqlDialect {},
        }
    }

    /// Classifies a SQL string.
    ///
    /// Never fails: parse errors, empty input and multi-statement text are
    /// all reported as `Eligibility::Ineligible`.
    pub fn classify(&self, sql: &str) -> Eligibility {
        let statements = match Parser::parse_sql(&self.dialect, sql) {
            Ok(statements) => statements,
            Err(e) => return Eligibility::Ineligible(Rejection::Unparseable(e.to_string())),
        };

        match statements.as_slice() {
            [] => Eligibility::Ineligible(Rejection::Empty),
            [statement] => match statement_kind(statement) {
                Some(kind) => Eligibility::Eligible(kind),
                None => Eligibility::Ineligible(Rejection::UnsupportedKind(leading_keyword(
                    statement,
                ))),
            },
            many => Eligibility::Ineligible(Rejection::MultipleStatements(many.len())),
        }
    }
}

/// Maps a parsed statement to an eligible kind.
///
/// A query body (including VALUES, set operations and CTEs) plans as a select.
fn statement_kind(statement: &Statement) -> Option<StatementKind> {
    match statement {
        Statement::Query(_) => Some(StatementKind::Select),
        Statement::Insert(_) => Some(StatementKind::Insert),
        Statement::Update { .. } => Some(StatementKind::Update),
        Statement::Delete(_) => Some(StatementKind::Delete),
        _ => None,
    }
}

/// First keyword of the rendered statement, for diagnostics.
fn leading_keyword(statement: &Statement) -> String {
    statement
        .to_string()
        .split_whitespace()
        .next()
        .map(str::to_uppercase)
        .unwrap_or_default()
}
