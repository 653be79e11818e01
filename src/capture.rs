//! Explain capture.
//!
//! Routes a batch of samples by database, opens and probes one connection per
//! database, and captures a plan for every eligible sample on it.
//!
//! Samples of one database run strictly one after another on that
//! database's connection: the prepared statement name is shared, so the
//! PREPARE / EXPLAIN EXECUTE / DEALLOCATE sequence must never interleave.
//! Different databases are independent and may run concurrently.

use futures::stream::{self, StreamExt};
use tracing::{debug, info};

use crate::classify::{Eligibility, StatementClassifier};
use crate::config::SystemType;
use crate::db::{Connector, ExplainConnection};
use crate::error::Result;
use crate::probe::probe_capabilities;
use crate::router::{route, MonitoredDatabases};
use crate::sample::{ExplainFormat, ExplainSource, QuerySample};
use crate::strategy::{select_strategy, Capabilities, ExplainPlan};

/// Settings for one capture run.
#[derive(Debug, Clone)]
pub struct CaptureOptions {
    pub monitored: MonitoredDatabases,
    pub system_type: SystemType,
    /// Databases processed at the same time; values below 1 count as 1.
    pub concurrency: usize,
}

impl CaptureOptions {
    /// Options for a single monitored database on a self-hosted server.
    pub fn new(monitored: MonitoredDatabases) -> Self {
        Self {
            monitored,
            system_type: SystemType::default(),
            concurrency: 1,
        }
    }
}

/// What happened to one sample handed to a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleOutcome {
    Captured,
    Failed,
    Ineligible,
}

/// Counters for a capture run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureSummary {
    /// Samples excluded by the router.
    pub filtered: usize,
    /// Databases whose connection or probe failed.
    pub skipped_databases: usize,
    /// Samples left untouched because their database was skipped.
    pub skipped_samples: usize,
    pub captured: usize,
    pub failed: usize,
    pub ineligible: usize,
    /// Databases where the missing-helper advisory was logged.
    pub missing_helper: usize,
}

impl CaptureSummary {
    fn record(&mut self, outcome: SampleOutcome) {
        match outcome {
            SampleOutcome::Captured => self.captured += 1,
            SampleOutcome::Failed => self.failed += 1,
            SampleOutcome::Ineligible => self.ineligible += 1,
        }
    }

    fn merge(&mut self, other: &CaptureSummary) {
        self.filtered += other.filtered;
        self.skipped_databases += other.skipped_databases;
        self.skipped_samples += other.skipped_samples;
        self.captured += other.captured;
        self.failed += other.failed;
        self.ineligible += other.ineligible;
        self.missing_helper += other.missing_helper;
    }
}

/// One open, probed connection and the state kept while its samples run.
pub struct ConnectionContext {
    database: String,
    conn: Box<dyn ExplainConnection>,
    capabilities: Capabilities,
    classifier: StatementClassifier,
    /// A DEALLOCATE failed, so the prepared statement may still exist.
    stale_prepared: bool,
}

impl ConnectionContext {
    /// Connects to `database` and probes the connection.
    ///
    /// If the probe fails the connection is closed before returning.
    pub async fn open(
        connector: &dyn Connector,
        database: &str,
        system_type: SystemType,
    ) -> Result<Self> {
        let mut conn = connector.connect(database).await?;

        let capabilities = match probe_capabilities(conn.as_mut(), system_type).await {
            Ok(capabilities) => capabilities,
            Err(e) => {
                close_quietly(conn.as_mut(), database).await;
                return Err(e);
            }
        };

        Ok(Self {
            database: database.to_string(),
            conn,
            capabilities,
            classifier: StatementClassifier::new(),
            stale_prepared: false,
        })
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Captures the plan for one sample and returns the updated copy.
    ///
    /// Ineligible samples come back unchanged. Eligible samples are tagged
    /// as statement-log JSON explains before the attempt, then carry either
    /// the plan or the driver's error text.
    pub async fn explain_sample(&mut self, sample: &QuerySample) -> (QuerySample, SampleOutcome) {
        let kind = match self.classifier.classify(&sample.query) {
            Eligibility::Eligible(kind) => kind,
            Eligibility::Ineligible(reason) => {
                debug!("Not explaining query ({})", reason);
                return (sample.clone(), SampleOutcome::Ineligible);
            }
        };

        let mut output = sample.clone();
        output.explain_source = ExplainSource::StatementLogExplain;
        output.explain_format = ExplainFormat::Json;

        let strategy = select_strategy(&self.capabilities, sample.has_parameters());
        match self.run_plan(ExplainPlan::build(strategy, sample)).await {
            Ok(plan) => {
                debug!("Captured plan for {} statement via {}", kind, strategy);
                output.explain_output = Some(plan);
                (output, SampleOutcome::Captured)
            }
            Err(e) => {
                debug!("Explain via {} failed: {}", strategy, e);
                output.explain_error = Some(e.message().to_string());
                (output, SampleOutcome::Failed)
            }
        }
    }

    async fn run_plan(&mut self, plan: ExplainPlan) -> Result<String> {
        match plan {
            ExplainPlan::HelperFunction {
                sql,
                query,
                parameters,
            } => self.conn.fetch_text_bound(&sql, &query, &parameters).await,
            ExplainPlan::DirectExplain { sql } => self.conn.fetch_text(&sql).await,
            ExplainPlan::PreparedStatement {
                prepare,
                execute,
                deallocate,
            } => {
                if self.stale_prepared {
                    // Leftover from an earlier failed cleanup.
                    if let Err(e) = self.conn.execute(&deallocate).await {
                        debug!("Cleanup of stale prepared statement failed: {}", e);
                    }
                    self.stale_prepared = false;
                }

                // Nothing to clean up if the prepare itself failed.
                self.conn.execute(&prepare).await?;

                let result = self.conn.fetch_text(&execute).await;

                if let Err(e) = self.conn.execute(&deallocate).await {
                    debug!("Could not deallocate prepared statement: {}", e);
                    self.stale_prepared = true;
                }

                result
            }
        }
    }

    /// Closes the connection; failures are only logged.
    pub async fn close(mut self) {
        close_quietly(self.conn.as_mut(), &self.database).await;
    }
}

async fn close_quietly(conn: &mut dyn ExplainConnection, database: &str) {
    if let Err(e) = conn.close().await {
        debug!(
            "Error closing connection to {}: {}",
            display_database(database),
            e
        );
    }
}

fn display_database(database: &str) -> String {
    if database.is_empty() {
        "default database".to_string()
    } else {
        format!("database \"{database}\"")
    }
}

/// Result of processing one database's samples.
#[derive(Debug)]
pub struct DatabaseResult {
    /// Samples in the order they were supplied.
    pub samples: Vec<QuerySample>,
    pub summary: CaptureSummary,
}

/// Processes all samples routed to one database.
///
/// If the database cannot be reached or probed, its samples are returned
/// untouched.
pub async fn explain_database(
    connector: &dyn Connector,
    database: &str,
    samples: Vec<QuerySample>,
    system_type: SystemType,
) -> DatabaseResult {
    let mut summary = CaptureSummary::default();

    let mut ctx = match ConnectionContext::open(connector, database, system_type).await {
        Ok(ctx) => ctx,
        Err(e) => {
            debug!(
                "Could not connect to {} to run explain: {}; skipping",
                display_database(database),
                e
            );
            summary.skipped_databases = 1;
            summary.skipped_samples = samples.len();
            return DatabaseResult { samples, summary };
        }
    };

    let capabilities = ctx.capabilities();
    if capabilities.helper_available {
        debug!(
            "Found pganalyze.explain() helper in {}",
            display_database(database)
        );
    } else if capabilities.needs_helper_advisory() {
        summary.missing_helper = 1;
        info!(
            "Warning: pganalyze.explain() helper function not found in {}. Please set up the \
             monitoring helper functions in every database you want to monitor to avoid \
             permission issues when running log-based EXPLAIN.",
            display_database(database)
        );
    }

    let mut output = Vec::with_capacity(samples.len());
    for sample in &samples {
        let (explained, outcome) = ctx.explain_sample(sample).await;
        summary.record(outcome);
        output.push(explained);
    }

    ctx.close().await;

    DatabaseResult {
        samples: output,
        summary,
    }
}

/// Captures plans for a batch of samples.
///
/// Every input sample appears exactly once in the output, at its input
/// position. Filtered samples, samples of unreachable databases and
/// ineligible statements are returned unchanged.
pub async fn run_explain(
    connector: &dyn Connector,
    samples: Vec<QuerySample>,
    options: &CaptureOptions,
) -> (Vec<QuerySample>, CaptureSummary) {
    let mut samples = samples;
    let groups = route(&samples, &options.monitored);

    let mut summary = CaptureSummary {
        filtered: samples.len() - groups.values().map(Vec::len).sum::<usize>(),
        ..Default::default()
    };

    let units: Vec<(String, Vec<usize>, Vec<QuerySample>)> = groups
        .into_iter()
        .map(|(database, indices)| {
            let batch = indices.iter().map(|&idx| samples[idx].clone()).collect();
            (database, indices, batch)
        })
        .collect();

    let results: Vec<(Vec<usize>, DatabaseResult)> = stream::iter(units)
        .map(|(database, indices, batch)| async move {
            let result = explain_database(connector, &database, batch, options.system_type).await;
            (indices, result)
        })
        .buffer_unordered(options.concurrency.max(1))
        .collect()
        .await;

    for (indices, result) in results {
        summary.merge(&result.summary);
        for (idx, sample) in indices.into_iter().zip(result.samples) {
            samples[idx] = sample;
        }
    }

    info!(
        "Explain run finished: {} captured, {} failed, {} ineligible, {} filtered, {} databases skipped",
        summary.captured,
        summary.failed,
        summary.ineligible,
        summary.filtered,
        summary.skipped_databases
    );

    (samples, summary)
}
