//! Health check handler.
//!
//! Provides the `/health` endpoint for liveness probing. The check pings
//! the storage backend; a failing backend reports as unhealthy with 503
//! rather than erroring, so probes always get a well-formed body.
//!
//! # Security
//!
//! Error messages are intentionally generic to avoid leaking
//! infrastructure details. Actual errors are logged server-side.

use crate::models::HealthResponse;
use crate::routes::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use std::sync::Arc;

/// Handler for GET /health
///
/// Returns 200 with the region and backend status when the repository
/// responds, 503 when it does not.
#[tracing::instrument(skip_all, name = "rc.health.check")]
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.repository.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy",
                region: state.config.region.clone(),
                database: Some("healthy"),
            }),
        ),
        Err(e) => {
            // Log actual error server-side for operators
            tracing::warn!(target: "rc.handlers.health", error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unhealthy",
                    region: state.config.region.clone(),
                    database: Some("unhealthy"),
                }),
            )
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use crate::models::HealthResponse;

    #[test]
    fn test_health_response_serialization() {
        let healthy = HealthResponse {
            status: "healthy",
            region: "us-east-1".to_string(),
            database: Some("healthy"),
        };

        let json = serde_json::to_string(&healthy).unwrap();
        assert!(json.contains("\"status\":\"healthy\""));
        assert!(json.contains("\"region\":\"us-east-1\""));
        assert!(json.contains("\"database\":\"healthy\""));

        let bare = HealthResponse {
            status: "unhealthy",
            region: "us-east-1".to_string(),
            database: None,
        };
        let json = serde_json::to_string(&bare).unwrap();
        assert!(!json.contains("\"database\""));
    }

    // The full handler is exercised through the integration tests, which
    // run it against the in-memory repository.
}
