//! Route configuration for the Roster Controller HTTP API.
//!
//! Routes are partitioned into three groups:
//! - Public: `/health` (no authentication, used by probes)
//! - Metrics: `/metrics` (no authentication, scraped by Prometheus)
//! - Protected: everything under `/api/v1`, which requires the actor
//!   headers and carries an [`Actor`](crate::models::Actor) extension

use crate::config::Config;
use crate::handlers;
use crate::middleware::{http_metrics_middleware, require_actor};
use crate::repositories::AttendanceRepository;
use crate::token::TokenCodec;
use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Request timeout applied to every route.
const REQUEST_TIMEOUT_SECONDS: u64 = 30;

/// Shared application state for the Roster Controller.
#[derive(Clone)]
pub struct AppState {
    /// Storage backend for meetings, records, and scan trails.
    pub repository: Arc<dyn AttendanceRepository>,

    /// Service configuration.
    pub config: Config,

    /// Codec for issuing and verifying attendance tokens.
    pub codec: Arc<TokenCodec>,
}

/// Build the complete router for the Roster Controller.
///
/// The metrics handler takes the Prometheus handle as its own state so
/// the rest of the application state stays free of exporter plumbing.
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .with_state(state.clone());

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    let protected_routes = Router::new()
        .route("/api/v1/meetings", post(handlers::create_meeting))
        .route("/api/v1/meetings/:id", get(handlers::get_meeting))
        .route("/api/v1/meetings/:id/start", post(handlers::start_meeting))
        .route("/api/v1/meetings/:id/end", post(handlers::end_meeting))
        .route("/api/v1/meetings/:id/cancel", post(handlers::cancel_meeting))
        .route(
            "/api/v1/meetings/:id/postpone",
            post(handlers::postpone_meeting),
        )
        .route(
            "/api/v1/meetings/:id/attendance",
            get(handlers::get_attendance),
        )
        .route(
            "/api/v1/meetings/:id/redemption-log",
            get(handlers::get_redemption_log),
        )
        .route(
            "/api/v1/meetings/:id/approve-all",
            post(handlers::bulk_approve),
        )
        .route("/api/v1/redemptions", post(handlers::redeem_token))
        .route(
            "/api/v1/records/:id/checkout",
            post(handlers::checkout_record),
        )
        .route(
            "/api/v1/records/:id/approve",
            post(handlers::approve_record),
        )
        .route("/api/v1/records/:id/reject", post(handlers::reject_record))
        .route(
            "/api/v1/records/:id",
            patch(handlers::modify_record).delete(handlers::remove_record),
        )
        .route_layer(middleware::from_fn(require_actor))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(metrics_routes)
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(
            REQUEST_TIMEOUT_SECONDS,
        )))
        .layer(middleware::from_fn(http_metrics_middleware))
}
