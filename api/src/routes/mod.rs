//! API route definitions.
//!
//! This module organizes all HTTP routes for the Telepipe ingestion node.

mod admin;
mod health;
mod ingest;

pub use admin::admin_routes;
pub use health::health_routes;
pub use ingest::ingest_routes;
