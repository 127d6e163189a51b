//! Observability module for the Roster Controller.
//!
//! Provides metrics definitions and instrumentation helpers.

pub mod metrics;
