//! Integration tests for pg-explain-capture.
//!
//! Capture tests run against the recording mock connector. Live tests
//! require a running PostgreSQL database; set DATABASE_URL to run them.
//!
//! Run with: `cargo test --test integration_tests`

mod integration;
