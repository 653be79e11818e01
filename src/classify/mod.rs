//! Statement eligibility classification.
//!
//! Parses captured SQL and decides whether it is exactly one statement of a
//! kind that may be re-executed under an EXPLAIN wrapper.

mod parser;

pub use parser::StatementClassifier;

use std::fmt;

/// Statement kinds that may be planned by re-execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Select => write!(f, "SELECT"),
            Self::Insert => write!(f, "INSERT"),
            Self::Update => write!(f, "UPDATE"),
            Self::Delete => write!(f, "DELETE"),
        }
    }
}

/// Why a statement was declined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// The parser rejected the text.
    Unparseable(String),
    /// The text contains no statement at all.
    Empty,
    /// More than one top-level statement.
    MultipleStatements(usize),
    /// A single statement of a kind that is never re-executed.
    UnsupportedKind(String),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unparseable(e) => write!(f, "could not parse: {e}"),
            Self::Empty => write!(f, "empty statement"),
            Self::MultipleStatements(n) => write!(f, "{n} statements"),
            Self::UnsupportedKind(kind) => write!(f, "unsupported statement kind {kind}"),
        }
    }
}

/// Outcome of classifying one sample's query text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eligibility {
    Eligible(StatementKind),
    Ineligible(Rejection),
}
