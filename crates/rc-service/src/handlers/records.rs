//! Attendance record handlers for the Roster Controller.
//!
//! Covers the per-record operations (checkout, approve, reject, modify,
//! remove) plus the bulk reconciliation endpoint on a meeting. Review
//! operations are gated to the meeting owner or an admin inside the
//! approval service; checkout additionally admits the record's own
//! participant.

use crate::errors::RcError;
use crate::handlers::{parse_json, parse_json_or_default};
use crate::models::{
    Actor, ApproveRequest, BulkApproveResponse, CheckoutRequest, ModifyRequest, RecordResponse,
    RejectRequest, SubmissionRecord,
};
use crate::observability::metrics;
use crate::repositories::AttendanceRepository;
use crate::routes::AppState;
use crate::services::{ApprovalService, RedemptionService};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use common::types::{MeetingId, RecordId};
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;
use uuid::Uuid;

/// Build the API view of a record, deriving lateness from its meeting.
async fn record_response(
    repo: &dyn AttendanceRepository,
    record: SubmissionRecord,
) -> Result<RecordResponse, RcError> {
    let meeting = repo.get_meeting(record.meeting_id).await?.ok_or_else(|| {
        RcError::MeetingNotFound(format!("Meeting {} not found", record.meeting_id))
    })?;
    Ok(RecordResponse::from_parts(record, &meeting))
}

/// Handler for POST /api/v1/records/:id/checkout
///
/// Stamps the checkout time on an attendance record. The body is
/// optional; an absent or empty body checks out at the current time.
///
/// # Response
///
/// - 200 OK: Record with the checkout time stamped
/// - 403 Forbidden: Caller is neither the record's participant nor a reviewer
/// - 404 Not Found: Record missing or removed
/// - 409 Conflict: Already checked out and the policy forbids re-checkout
#[instrument(
    skip_all,
    name = "rc.record.checkout",
    fields(method = "POST", endpoint = "/api/v1/records/{id}/checkout")
)]
pub async fn checkout_record(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(record_id): Path<Uuid>,
    body: axum::body::Bytes,
) -> Result<Json<RecordResponse>, RcError> {
    let request: CheckoutRequest = parse_json_or_default(&body)?;

    let record = RedemptionService::checkout(
        state.repository.as_ref(),
        RecordId(record_id),
        actor,
        request.check_out_time,
    )
    .await?;

    let response = record_response(state.repository.as_ref(), record).await?;
    Ok(Json(response))
}

/// Handler for POST /api/v1/records/:id/approve
///
/// Settles a pending record with a final status. Approving an already
/// settled record with the same status is a no-op.
///
/// # Response
///
/// - 200 OK: The settled record
/// - 400 Bad Request: Malformed body or over-length notes
/// - 403 Forbidden: Caller is not the meeting owner or an admin
/// - 404 Not Found: Record missing or removed
#[instrument(
    skip_all,
    name = "rc.record.approve",
    fields(method = "POST", endpoint = "/api/v1/records/{id}/approve")
)]
pub async fn approve_record(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(record_id): Path<Uuid>,
    body: axum::body::Bytes,
) -> Result<Json<RecordResponse>, RcError> {
    let start = Instant::now();

    let request: ApproveRequest = parse_json(&body)?;
    request
        .validate()
        .map_err(|e| RcError::BadRequest(e.to_string()))?;

    let record = ApprovalService::approve_one(
        state.repository.as_ref(),
        RecordId(record_id),
        actor,
        request.final_status,
        request.notes,
    )
    .await
    .inspect_err(|_| metrics::record_approval("approve_one", "error", start.elapsed()))?;

    metrics::record_approval("approve_one", "success", start.elapsed());

    let response = record_response(state.repository.as_ref(), record).await?;
    Ok(Json(response))
}

/// Handler for POST /api/v1/records/:id/reject
///
/// Rejects a record: the participant is marked absent and the reason is
/// kept in the reviewer notes.
///
/// # Response
///
/// - 200 OK: The rejected record
/// - 400 Bad Request: Missing or over-length reason
/// - 403 Forbidden: Caller is not the meeting owner or an admin
/// - 404 Not Found: Record missing or removed
#[instrument(
    skip_all,
    name = "rc.record.reject",
    fields(method = "POST", endpoint = "/api/v1/records/{id}/reject")
)]
pub async fn reject_record(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(record_id): Path<Uuid>,
    body: axum::body::Bytes,
) -> Result<Json<RecordResponse>, RcError> {
    let start = Instant::now();

    let request: RejectRequest = parse_json(&body)?;
    request
        .validate()
        .map_err(|e| RcError::BadRequest(e.to_string()))?;

    let record = ApprovalService::reject_one(
        state.repository.as_ref(),
        RecordId(record_id),
        actor,
        request.reason,
    )
    .await
    .inspect_err(|_| metrics::record_approval("reject_one", "error", start.elapsed()))?;

    metrics::record_approval("reject_one", "success", start.elapsed());

    let response = record_response(state.repository.as_ref(), record).await?;
    Ok(Json(response))
}

/// Handler for PATCH /api/v1/records/:id
///
/// Corrects a settled record's status after the fact. Re-stamps the
/// verification fields but never reopens the approval workflow.
///
/// # Response
///
/// - 200 OK: The corrected record
/// - 400 Bad Request: Malformed body or over-length notes
/// - 403 Forbidden: Caller is not the meeting owner or an admin
/// - 404 Not Found: Record missing or removed
#[instrument(
    skip_all,
    name = "rc.record.modify",
    fields(method = "PATCH", endpoint = "/api/v1/records/{id}")
)]
pub async fn modify_record(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(record_id): Path<Uuid>,
    body: axum::body::Bytes,
) -> Result<Json<RecordResponse>, RcError> {
    let start = Instant::now();

    let request: ModifyRequest = parse_json(&body)?;
    request
        .validate()
        .map_err(|e| RcError::BadRequest(e.to_string()))?;

    let record = ApprovalService::modify(
        state.repository.as_ref(),
        RecordId(record_id),
        actor,
        request.new_status,
        request.notes,
    )
    .await
    .inspect_err(|_| metrics::record_approval("modify", "error", start.elapsed()))?;

    metrics::record_approval("modify", "success", start.elapsed());

    let response = record_response(state.repository.as_ref(), record).await?;
    Ok(Json(response))
}

/// Handler for DELETE /api/v1/records/:id
///
/// Tombstones a record. It drops out of listings and counts and cannot
/// be reviewed or resurrected afterwards.
///
/// # Response
///
/// - 204 No Content: Record removed
/// - 403 Forbidden: Caller is not the meeting owner or an admin
/// - 404 Not Found: Record missing or already removed
#[instrument(
    skip_all,
    name = "rc.record.remove",
    fields(method = "DELETE", endpoint = "/api/v1/records/{id}")
)]
pub async fn remove_record(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(record_id): Path<Uuid>,
) -> Result<StatusCode, RcError> {
    let start = Instant::now();

    ApprovalService::remove(state.repository.as_ref(), RecordId(record_id), actor)
        .await
        .inspect_err(|_| metrics::record_approval("remove", "error", start.elapsed()))?;

    metrics::record_approval("remove", "success", start.elapsed());
    Ok(StatusCode::NO_CONTENT)
}

/// Handler for POST /api/v1/meetings/:id/approve-all
///
/// Reconciles the whole roster as approved-present: pending records are
/// promoted, missing ones are created, and settled or removed records
/// are left untouched.
///
/// # Response
///
/// - 200 OK: Summary of created/approved/untouched plus the final count
/// - 403 Forbidden: Caller is not the meeting owner or an admin
/// - 404 Not Found: Meeting does not exist
#[instrument(
    skip_all,
    name = "rc.record.bulk_approve",
    fields(method = "POST", endpoint = "/api/v1/meetings/{id}/approve-all")
)]
pub async fn bulk_approve(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(meeting_id): Path<Uuid>,
) -> Result<Json<BulkApproveResponse>, RcError> {
    let start = Instant::now();

    let summary =
        ApprovalService::bulk_approve_all_present(state.repository.as_ref(), MeetingId(meeting_id), actor)
            .await
            .inspect_err(|_| metrics::record_approval("bulk_approve", "error", start.elapsed()))?;

    metrics::record_approval("bulk_approve", "success", start.elapsed());
    Ok(Json(summary))
}
