//! pg-explain-capture - safe EXPLAIN plan capture for observed PostgreSQL queries.
//!
//! Given a batch of query samples, decides per sample whether re-running it
//! under `EXPLAIN` is safe, picks an execution strategy from the privileges
//! available on each database, and records the resulting plan or error.

pub mod batch;
pub mod capture;
pub mod classify;
pub mod cli;
pub mod config;
pub mod db;
pub mod encode;
pub mod error;
pub mod logging;
pub mod probe;
pub mod router;
pub mod sample;
pub mod strategy;

pub use capture::{run_explain, CaptureOptions, CaptureSummary};
pub use sample::{ExplainFormat, ExplainSource, QuerySample};
