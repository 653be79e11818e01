//! Integration tests for pg-explain-capture.

pub mod capture_test;
pub mod live_test;
