//! Redemption handler for the Roster Controller.
//!
//! Implements `POST /api/v1/redemptions`: a participant submits a
//! scanned token payload and receives an attendance record (pending or
//! auto-approved per the meeting policy).
//!
//! # Security
//!
//! - The scanning participant is the authenticated caller; the body
//!   never names the scanner, only an optional proxy target
//! - Rejections map to the error taxonomy and are recorded per reason
//!   in the redemption metrics

use crate::errors::RcError;
use crate::handlers::parse_json;
use crate::models::{Actor, RedemptionRequest, RedemptionResponse};
use crate::observability::metrics;
use crate::routes::AppState;
use crate::services::RedemptionService;
use axum::{extract::State, http::StatusCode, Extension, Json};
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// Handler for POST /api/v1/redemptions
///
/// # Response
///
/// - 201 Created: Record created; body carries the record ID and
///   whether it is pending approval
/// - 400 Bad Request: Malformed body, malformed payload, bad checksum,
///   or missing required location evidence
/// - 403 Forbidden: Not enrolled, late entry closed, or proxy policy
/// - 404 Not Found: The meeting the token names no longer exists
/// - 409 Conflict: Meeting not accepting redemptions, or a record for
///   this participant already exists
/// - 410 Gone: Token expired
#[instrument(
    skip_all,
    name = "rc.redemption.redeem",
    fields(method = "POST", endpoint = "/api/v1/redemptions")
)]
pub async fn redeem_token(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    body: axum::body::Bytes,
) -> Result<(StatusCode, Json<RedemptionResponse>), RcError> {
    let start = Instant::now();

    let request: RedemptionRequest = parse_json(&body).inspect_err(|e| {
        metrics::record_redemption("rejected", Some(e.kind()), start.elapsed());
    })?;

    request.validate().map_err(|e| {
        let err = RcError::BadRequest(e.to_string());
        metrics::record_redemption("rejected", Some(err.kind()), start.elapsed());
        err
    })?;

    let record = RedemptionService::redeem(
        state.repository.as_ref(),
        &state.codec,
        actor.participant_id(),
        request,
    )
    .await
    .inspect_err(|e| {
        let status = match e {
            RcError::Database(_) | RcError::Internal => "error",
            _ => "rejected",
        };
        metrics::record_redemption(status, Some(e.kind()), start.elapsed());
    })?;

    metrics::record_redemption("accepted", None, start.elapsed());

    let status = if record.is_pending_approval {
        "pending_approval"
    } else {
        "approved"
    };

    Ok((
        StatusCode::CREATED,
        Json(RedemptionResponse {
            record_id: record.id,
            status,
            submitted_at: record.submitted_at,
        }),
    ))
}
