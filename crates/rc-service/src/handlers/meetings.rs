//! Meeting handlers for the Roster Controller.
//!
//! Implements the meeting endpoints:
//!
//! - `POST /api/v1/meetings` - Create meeting (faculty/admin)
//! - `GET /api/v1/meetings/{id}` - Fetch meeting details
//! - `POST /api/v1/meetings/{id}/start` - Start and issue the token
//! - `POST /api/v1/meetings/{id}/end` - Complete the meeting
//! - `POST /api/v1/meetings/{id}/cancel` - Cancel the meeting
//! - `POST /api/v1/meetings/{id}/postpone` - Postpone the meeting
//! - `GET /api/v1/meetings/{id}/attendance` - Attendance feed (reviewers)
//! - `GET /api/v1/meetings/{id}/redemption-log` - Audit view (reviewers)
//!
//! # Security
//!
//! - Caller identity comes from the `require_actor` middleware
//! - The encoded token payload is only ever returned to the meeting
//!   owner; other viewers see token metadata without the checksum
//! - Request bodies are parsed manually so malformed JSON yields 400

use crate::errors::RcError;
use crate::handlers::{parse_json, parse_json_or_default};
use crate::models::{
    Actor, ActorRole, AttendanceListResponse, CreateMeetingRequest, MeetingResponse,
    RecordResponse, RedemptionLogResponse, ScanEntry, StartMeetingRequest, StartMeetingResponse,
};
use crate::observability::metrics;
use crate::routes::AppState;
use crate::services::MeetingLifecycleService;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use common::types::MeetingId;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Roles allowed to create meetings.
const MEETING_CREATE_ROLES: &[ActorRole] = &[ActorRole::Faculty, ActorRole::Admin];

// ============================================================================
// Handler: POST /api/v1/meetings
// ============================================================================

/// Handler for POST /api/v1/meetings
///
/// Create a new meeting owned by the caller.
///
/// # Response
///
/// - 201 Created: Meeting created in `scheduled` status
/// - 400 Bad Request: Invalid request body
/// - 403 Forbidden: Caller is not faculty or admin
#[instrument(
    skip_all,
    name = "rc.meeting.create",
    fields(method = "POST", endpoint = "/api/v1/meetings")
)]
pub async fn create_meeting(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    body: axum::body::Bytes,
) -> Result<(StatusCode, Json<MeetingResponse>), RcError> {
    let request: CreateMeetingRequest = parse_json(&body).inspect_err(|_| {
        metrics::record_lifecycle_transition("create", "error");
    })?;

    if !MEETING_CREATE_ROLES.contains(&actor.role) {
        metrics::record_lifecycle_transition("create", "error");
        tracing::warn!(
            target: "rc.handlers.meetings",
            actor_id = %actor.id,
            role = actor.role.as_str(),
            "Caller lacks required role for meeting creation"
        );
        return Err(RcError::Forbidden(
            "Only faculty or admins can create meetings".to_string(),
        ));
    }

    request.validate().map_err(|e| {
        metrics::record_lifecycle_transition("create", "error");
        RcError::BadRequest(e.to_string())
    })?;

    let meeting = MeetingLifecycleService::create_meeting(state.repository.as_ref(), actor.id, request)
        .await
        .inspect_err(|_| {
            metrics::record_lifecycle_transition("create", "error");
        })?;

    metrics::record_lifecycle_transition("create", "success");
    Ok((StatusCode::CREATED, Json(MeetingResponse::from(meeting))))
}

// ============================================================================
// Handler: GET /api/v1/meetings/{id}
// ============================================================================

/// Handler for GET /api/v1/meetings/{id}
///
/// Fetch meeting details. The serialized token payload is included only
/// when the caller owns the meeting; everyone else sees the token
/// metadata (code and expiry) without the payload or checksum.
#[instrument(
    skip_all,
    name = "rc.meeting.get",
    fields(method = "GET", endpoint = "/api/v1/meetings/{id}")
)]
pub async fn get_meeting(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(meeting_id): Path<Uuid>,
) -> Result<Json<MeetingResponse>, RcError> {
    let meeting =
        MeetingLifecycleService::get_meeting(state.repository.as_ref(), MeetingId(meeting_id))
            .await?;

    let is_owner = meeting.owner_id == actor.id;
    let mut response = MeetingResponse::from(meeting.clone());
    if is_owner {
        response.token_payload =
            MeetingLifecycleService::token_payload_for_owner(&state.codec, &meeting);
    }

    Ok(Json(response))
}

// ============================================================================
// Handler: POST /api/v1/meetings/{id}/start
// ============================================================================

/// Handler for POST /api/v1/meetings/{id}/start
///
/// Transition the meeting to `active`, issue the attendance token, and
/// open the redemption log. The body is optional; `ttl_minutes`
/// overrides the configured token TTL for this session.
///
/// # Response
///
/// - 200 OK: Meeting started, token issued
/// - 403 Forbidden: Caller is neither the owner nor an admin
/// - 404 Not Found: No such meeting
/// - 409 Conflict: Meeting is not `scheduled` (includes losing a
///   concurrent start race)
#[instrument(
    skip_all,
    name = "rc.meeting.start",
    fields(method = "POST", endpoint = "/api/v1/meetings/{id}/start")
)]
pub async fn start_meeting(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(meeting_id): Path<Uuid>,
    body: axum::body::Bytes,
) -> Result<Json<StartMeetingResponse>, RcError> {
    let request: StartMeetingRequest = parse_json_or_default(&body).inspect_err(|_| {
        metrics::record_lifecycle_transition("start", "error");
    })?;
    request.validate().map_err(|e| {
        metrics::record_lifecycle_transition("start", "error");
        RcError::BadRequest(e.to_string())
    })?;

    let ttl_minutes = request
        .ttl_minutes
        .unwrap_or(state.config.token_ttl_minutes);

    let (started, issued) = MeetingLifecycleService::start_meeting(
        state.repository.as_ref(),
        &state.codec,
        ttl_minutes,
        MeetingId(meeting_id),
        actor,
    )
    .await
    .inspect_err(|_| {
        metrics::record_lifecycle_transition("start", "error");
    })?;

    let redemption_code = started
        .token
        .as_ref()
        .map(|t| t.redemption_code.clone())
        .ok_or(RcError::Internal)?;

    metrics::record_lifecycle_transition("start", "success");
    Ok(Json(StartMeetingResponse {
        meeting: MeetingResponse::from(started),
        token_payload: issued.encoded,
        redemption_code,
        expires_at: issued.payload.expires_at,
    }))
}

// ============================================================================
// Handlers: POST /api/v1/meetings/{id}/end | cancel | postpone
// ============================================================================

/// Handler for POST /api/v1/meetings/{id}/end
///
/// Transition `active` -> `completed`, clearing the token.
#[instrument(
    skip_all,
    name = "rc.meeting.end",
    fields(method = "POST", endpoint = "/api/v1/meetings/{id}/end")
)]
pub async fn end_meeting(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(meeting_id): Path<Uuid>,
) -> Result<Json<MeetingResponse>, RcError> {
    let meeting =
        MeetingLifecycleService::end_meeting(state.repository.as_ref(), MeetingId(meeting_id), actor)
            .await
            .inspect_err(|_| {
                metrics::record_lifecycle_transition("end", "error");
            })?;

    metrics::record_lifecycle_transition("end", "success");
    Ok(Json(MeetingResponse::from(meeting)))
}

/// Handler for POST /api/v1/meetings/{id}/cancel
///
/// Cancel from `scheduled` or `active`.
#[instrument(
    skip_all,
    name = "rc.meeting.cancel",
    fields(method = "POST", endpoint = "/api/v1/meetings/{id}/cancel")
)]
pub async fn cancel_meeting(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(meeting_id): Path<Uuid>,
) -> Result<Json<MeetingResponse>, RcError> {
    let meeting = MeetingLifecycleService::cancel_meeting(
        state.repository.as_ref(),
        MeetingId(meeting_id),
        actor,
    )
    .await
    .inspect_err(|_| {
        metrics::record_lifecycle_transition("cancel", "error");
    })?;

    metrics::record_lifecycle_transition("cancel", "success");
    Ok(Json(MeetingResponse::from(meeting)))
}

/// Handler for POST /api/v1/meetings/{id}/postpone
///
/// Postpone from `scheduled` only.
#[instrument(
    skip_all,
    name = "rc.meeting.postpone",
    fields(method = "POST", endpoint = "/api/v1/meetings/{id}/postpone")
)]
pub async fn postpone_meeting(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(meeting_id): Path<Uuid>,
) -> Result<Json<MeetingResponse>, RcError> {
    let meeting = MeetingLifecycleService::postpone_meeting(
        state.repository.as_ref(),
        MeetingId(meeting_id),
        actor,
    )
    .await
    .inspect_err(|_| {
        metrics::record_lifecycle_transition("postpone", "error");
    })?;

    metrics::record_lifecycle_transition("postpone", "success");
    Ok(Json(MeetingResponse::from(meeting)))
}

// ============================================================================
// Handler: GET /api/v1/meetings/{id}/attendance
// ============================================================================

/// Handler for GET /api/v1/meetings/{id}/attendance
///
/// Read-only attendance feed for the reporting collaborator: the cached
/// count plus one entry per live record, with the `late` flag derived
/// from the meeting's cutoff.
///
/// # Response
///
/// - 200 OK: Attendance listing
/// - 403 Forbidden: Caller is neither the owner nor an admin
/// - 404 Not Found: No such meeting
#[instrument(
    skip_all,
    name = "rc.meeting.attendance",
    fields(method = "GET", endpoint = "/api/v1/meetings/{id}/attendance")
)]
pub async fn get_attendance(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(meeting_id): Path<Uuid>,
) -> Result<Json<AttendanceListResponse>, RcError> {
    let meeting =
        MeetingLifecycleService::get_meeting(state.repository.as_ref(), MeetingId(meeting_id))
            .await?;
    if !actor.can_review(meeting.owner_id) {
        return Err(RcError::Forbidden(
            "Only the meeting owner or an admin can view attendance".to_string(),
        ));
    }

    let records = state.repository.list_submissions(meeting.id).await?;
    let records = records
        .into_iter()
        .map(|record| RecordResponse::from_parts(record, &meeting))
        .collect();

    Ok(Json(AttendanceListResponse {
        meeting_id: meeting.id,
        attendance_count: meeting.attendance_count,
        records,
    }))
}

// ============================================================================
// Handler: GET /api/v1/meetings/{id}/redemption-log
// ============================================================================

/// Handler for GET /api/v1/meetings/{id}/redemption-log
///
/// Audit view of every scan attempt against the meeting's token, valid
/// and invalid alike.
#[instrument(
    skip_all,
    name = "rc.meeting.redemption_log",
    fields(method = "GET", endpoint = "/api/v1/meetings/{id}/redemption-log")
)]
pub async fn get_redemption_log(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(meeting_id): Path<Uuid>,
) -> Result<Json<RedemptionLogResponse>, RcError> {
    let (log, scans) = MeetingLifecycleService::get_redemption_log(
        state.repository.as_ref(),
        MeetingId(meeting_id),
        actor,
    )
    .await?;

    Ok(Json(RedemptionLogResponse {
        meeting_id: log.meeting_id,
        redemption_code: log.redemption_code,
        issuer_id: log.issuer_id,
        is_active: log.is_active,
        created_at: log.created_at,
        deactivated_at: log.deactivated_at,
        scans: scans.into_iter().map(ScanEntry::from).collect(),
    }))
}
