//! Integration tests for the Telepipe ingestion node.
//!
//! These tests drive payloads through the HTTP API, the pipeline and into
//! an in-memory sink.

mod admin_tests;
mod common;
mod health_tests;
mod logs_tests;
mod metrics_tests;
mod traces_tests;
