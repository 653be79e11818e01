//! Parameter encoding.
//!
//! `EXPLAIN EXECUTE` only accepts literal arguments, so captured parameter
//! values are rendered as quoted PostgreSQL string literals on that path.
//! The helper path binds parameters natively and never goes through here.

/// Quotes a value as a PostgreSQL string literal.
///
/// Single quotes are doubled. Values containing a backslash are emitted as
/// an escape string (` E'...'`) with backslashes doubled, so the result is
/// read the same way regardless of `standard_conforming_strings`.
pub fn quote_literal(value: &str) -> String {
    let escaped = value.replace('\'', "''");
    if escaped.contains('\\') {
        format!(" E'{}'", escaped.replace('\\', "\\\\"))
    } else {
        format!("'{escaped}'")
    }
}

/// Renders parameters as a comma separated list of quoted literals.
pub fn quoted_params(parameters: &[String]) -> String {
    parameters
        .iter()
        .map(|p| quote_literal(p))
        .collect::<Vec<_>>()
        .join(", ")
}
