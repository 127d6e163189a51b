//! Middleware for the Roster Controller.
//!
//! # Components
//!
//! - `actor` - Caller identity middleware for protected routes
//! - `http_metrics` - HTTP request metrics middleware

pub mod actor;
pub mod http_metrics;

pub use actor::require_actor;
pub use http_metrics::http_metrics_middleware;
