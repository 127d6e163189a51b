//! Metrics definitions for the Roster Controller.
//!
//! All metrics follow Prometheus naming conventions:
//! - `rc_` prefix for Roster Controller
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `method`: 7 values max (GET, POST, PATCH, DELETE, PUT, HEAD, OPTIONS)
//! - `endpoint`: ~15 values (parameterized paths)
//! - `status`: 3 values (success, error, timeout)
//! - `operation`: bounded by code (create_meeting, insert_submission, etc.)
//! - `rejection_reason`: bounded by the error taxonomy

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("rc_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.150, 0.200, 0.300, 0.500, 1.000, 2.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("rc_db_query".to_string()),
            &[
                0.001, 0.002, 0.005, 0.010, 0.020, 0.050, 0.100, 0.250, 0.500, 1.000,
            ],
        )
        .map_err(|e| format!("Failed to set DB query buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("rc_redemption".to_string()),
            &[
                0.002, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000,
            ],
        )
        .map_err(|e| format!("Failed to set redemption buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("rc_approval".to_string()),
            &[
                0.002, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500,
            ],
        )
        .map_err(|e| format!("Failed to set approval buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `rc_http_requests_total`, `rc_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
///
/// This captures ALL HTTP responses including framework-level errors like:
/// - 415 Unsupported Media Type (wrong Content-Type)
/// - 400 Bad Request (JSON parse errors)
/// - 404 Not Found
/// - 405 Method Not Allowed
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    // Normalize endpoint to prevent cardinality explosion
    let normalized_endpoint = normalize_endpoint(endpoint);

    // Determine status category for simplified querying
    let status = categorize_status_code(status_code);

    histogram!("rc_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint.clone(),
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("rc_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

/// Categorize HTTP status code into success/error/timeout
fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Normalize endpoint path to prevent label cardinality explosion
///
/// Replaces dynamic segments (meeting and record IDs) with placeholders.
fn normalize_endpoint(path: &str) -> String {
    // Known static paths
    match path {
        "/" => "/".to_string(),
        "/health" => "/health".to_string(),
        "/metrics" => "/metrics".to_string(),
        "/api/v1/meetings" => "/api/v1/meetings".to_string(),
        "/api/v1/redemptions" => "/api/v1/redemptions".to_string(),
        _ => normalize_dynamic_endpoint(path),
    }
}

/// Actions valid under `/api/v1/meetings/{id}/`.
const MEETING_ACTIONS: [&str; 6] = [
    "start",
    "end",
    "cancel",
    "postpone",
    "attendance",
    "redemption-log",
];

/// Actions valid under `/api/v1/records/{id}/`.
const RECORD_ACTIONS: [&str; 3] = ["checkout", "approve", "reject"];

/// Normalize paths with dynamic segments.
fn normalize_dynamic_endpoint(path: &str) -> String {
    let parts: Vec<&str> = path.split('/').collect();

    // /api/v1/meetings/{id} and /api/v1/meetings/{id}/{action}
    if path.starts_with("/api/v1/meetings/") {
        if parts.len() == 5 {
            return "/api/v1/meetings/{id}".to_string();
        }

        if parts.len() == 6 {
            if let Some(action) = parts.get(5) {
                if *action == "approve-all" {
                    return "/api/v1/meetings/{id}/approve-all".to_string();
                }
                if MEETING_ACTIONS.contains(action) {
                    return format!("/api/v1/meetings/{{id}}/{action}");
                }
            }
        }
    }

    // /api/v1/records/{id} and /api/v1/records/{id}/{action}
    if path.starts_with("/api/v1/records/") {
        if parts.len() == 5 {
            return "/api/v1/records/{id}".to_string();
        }

        if parts.len() == 6 {
            if let Some(action) = parts.get(5) {
                if RECORD_ACTIONS.contains(action) {
                    return format!("/api/v1/records/{{id}}/{action}");
                }
            }
        }
    }

    // Unknown paths normalized to "/other" to bound cardinality
    "/other".to_string()
}

// ============================================================================
// Redemption Metrics
// ============================================================================

/// Record a redemption attempt's duration and outcome.
///
/// Metric: `rc_redemption_duration_seconds`, `rc_redemptions_total`
/// Labels: `status`, `rejection_reason`
///
/// Status values: "accepted", "rejected", "error". The rejection reason
/// is the error kind from the taxonomy (e.g. "NOT_ENROLLED"), "none" for
/// accepted redemptions.
pub fn record_redemption(status: &str, rejection_reason: Option<&str>, duration: Duration) {
    let reason = rejection_reason.unwrap_or("none");

    histogram!("rc_redemption_duration_seconds",
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("rc_redemptions_total",
        "status" => status.to_string(),
        "rejection_reason" => reason.to_string()
    )
    .increment(1);
}

// ============================================================================
// Database Metrics
// ============================================================================

/// Record database query execution
///
/// Metric: `rc_db_query_duration_seconds`, `rc_db_queries_total`
/// Labels: `operation`, `status`
///
/// Operations: create_meeting, activate_meeting, insert_submission,
///             reconcile_approved_present, recompute_attendance_count, etc.
pub fn record_db_query(operation: &str, status: &str, duration: Duration) {
    histogram!("rc_db_query_duration_seconds",
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("rc_db_queries_total",
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

// ============================================================================
// Approval Metrics
// ============================================================================

/// Record a reviewer operation's duration and outcome.
///
/// Metric: `rc_approval_duration_seconds`, `rc_approvals_total`
/// Labels: `operation`, `status`
///
/// Operations: "approve_one", "reject_one", "bulk_approve", "modify",
/// "remove". Status: "success", "error".
pub fn record_approval(operation: &str, status: &str, duration: Duration) {
    histogram!("rc_approval_duration_seconds",
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("rc_approvals_total",
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

// ============================================================================
// Lifecycle Metrics
// ============================================================================

/// Record a lifecycle transition attempt.
///
/// Metric: `rc_lifecycle_transitions_total`
/// Labels: `transition`, `status`
///
/// Transitions: "create", "start", "end", "cancel", "postpone".
/// Status: "success", "error".
pub fn record_lifecycle_transition(transition: &str, status: &str) {
    counter!("rc_lifecycle_transitions_total",
        "transition" => transition.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

// ============================================================================
// Tests
// ============================================================================
