//! Roster Controller (RC) Service Library
//!
//! This library provides the core functionality for the Muster
//! Roster Controller - the attendance service responsible for:
//!
//! - Meeting lifecycle management (schedule, start, end, cancel, postpone)
//! - Attendance token issuance and verification (checksum-protected payloads)
//! - Redemption of tokens into durable, at-most-once presence records
//! - The pending -> approved/rejected review workflow and bulk reconciliation
//!
//! # Architecture
//!
//! The RC follows the Handler -> Service -> Repository pattern:
//!
//! ```text
//! routes/mod.rs -> handlers/*.rs -> services/*.rs -> repositories/*.rs
//! ```
//!
//! # Modules
//!
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - Actor extraction and HTTP metrics layers
//! - `models` - Data models
//! - `observability` - Metrics recorder setup
//! - `repositories` - Storage trait plus Postgres and in-memory backends
//! - `routes` - Axum router setup
//! - `services` - Lifecycle, ledger, and approval business logic
//! - `token` - Token payload codec (issue / verify)

pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod token;
