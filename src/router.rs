//! Sample routing.
//!
//! Partitions an incoming batch by target database and filters out samples
//! that must never be re-executed, before any connection is opened.

use std::collections::BTreeMap;

use crate::sample::QuerySample;

/// Prefix attached to every statement this crate issues, so that the
/// statements themselves are recognised and skipped in later batches.
pub const QUERY_MARKER_SQL: &str = "/* pganalyze-collector */ ";

/// Phrases identifying hot-backup control calls.
const BACKUP_CONTROL_PHRASES: [&str; 2] = ["pg_start_backup", "pg_stop_backup"];

/// Decides whether a database falls within the monitored scope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonitoredDatabases {
    /// The configured database name.
    pub db_name: String,
    /// Wildcard: every database is monitored.
    pub all_names: bool,
    /// Additional databases monitored besides `db_name`.
    pub extra_names: Vec<String>,
}

impl MonitoredDatabases {
    /// Creates a predicate that only monitors the given database.
    pub fn single(db_name: impl Into<String>) -> Self {
        Self {
            db_name: db_name.into(),
            ..Default::default()
        }
    }

    /// Returns true if samples for `database` may be captured.
    ///
    /// The empty name stands for the default monitored database.
    pub fn contains(&self, database: &str) -> bool {
        database.is_empty()
            || database == self.db_name
            || self.all_names
            || self.extra_names.iter().any(|name| name == database)
    }
}

/// Why a sample was excluded by the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotMonitored,
    AlreadyExplained,
    CollectorQuery,
    BackupControl,
}

/// Returns the reason a sample must not be captured, if any.
pub fn skip_reason(sample: &QuerySample, monitored: &MonitoredDatabases) -> Option<SkipReason> {
    if !monitored.contains(&sample.database) {
        Some(SkipReason::NotMonitored)
    } else if sample.has_explain {
        Some(SkipReason::AlreadyExplained)
    } else if sample.query.starts_with(QUERY_MARKER_SQL) {
        Some(SkipReason::CollectorQuery)
    } else if BACKUP_CONTROL_PHRASES
        .iter()
        .any(|phrase| sample.query.contains(phrase))
    {
        Some(SkipReason::BackupControl)
    } else {
        None
    }
}

/// Positions of routed samples within the input batch, grouped by database.
///
/// Groups iterate in database-name order; indices within a group keep the
/// order in which samples were supplied.
pub type RoutedBatch = BTreeMap<String, Vec<usize>>;

/// Groups the indices of capturable samples by database.
///
/// Excluded samples do not appear in any group; the caller leaves them
/// where they are in the output batch.
pub fn route(samples: &[QuerySample], monitored: &MonitoredDatabases) -> RoutedBatch {
    let mut groups = RoutedBatch::new();
    for (idx, sample) in samples.iter().enumerate() {
        if skip_reason(sample, monitored).is_some() {
            continue;
        }
        groups.entry(sample.database.clone()).or_default().push(idx);
    }
    groups
}
