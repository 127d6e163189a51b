//! Submission ledger service.
//!
//! Owns the redemption pipeline: verify the token payload, gate on
//! meeting state and policy, then create the submission record with an
//! insert-if-absent so concurrent redemptions for the same participant
//! resolve to exactly one record. Every attempt against an
//! authenticated token lands in the redemption scan trail, valid or
//! not; unauthenticated payloads (malformed, bad checksum) are never
//! logged because their meeting binding cannot be trusted.
//!
//! # Security
//!
//! - No payload field is used before the checksum verifies
//! - The (meeting, participant) uniqueness contract lives in storage,
//!   not in application locks
//! - A rejected redemption leaves no partial record

use crate::errors::RcError;
use crate::models::{
    Actor, AttendanceStatus, NewScan, NewSubmission, RedemptionRequest, SubmissionRecord,
};
use crate::repositories::{AttendanceRepository, SubmissionInsert};
use crate::token::{TokenCodec, TokenError};
use chrono::{DateTime, Utc};
use common::types::{MeetingId, ParticipantId, RecordId};
use tracing::instrument;
use uuid::Uuid;

/// Service for token redemption and checkout.
pub struct RedemptionService;

impl RedemptionService {
    /// Redeem a token payload into a submission record.
    ///
    /// Pipeline order:
    /// 1. Verify the payload (checksum before any field is trusted)
    /// 2. Load the meeting the token is bound to
    /// 3. Require the meeting to be accepting redemptions
    /// 4. Enrollment and per-meeting policy gates
    /// 5. Insert-if-absent on the (meeting, participant) key
    /// 6. Append the scan entry and, when auto-approved, recount
    ///
    /// # Arguments
    ///
    /// * `repo` - Attendance storage
    /// * `codec` - Token codec holding the service master key
    /// * `participant_id` - The authenticated participant scanning
    /// * `request` - Validated redemption request
    ///
    /// # Errors
    ///
    /// `MalformedPayload`, `ChecksumMismatch`, `Expired`,
    /// `MeetingNotFound`, `SessionNotActive`, `NotEnrolled`,
    /// `Forbidden` (proxy policy), `BadRequest` (missing location
    /// evidence), `LateEntryNotAllowed`, `AlreadySubmitted`.
    #[instrument(skip_all, fields(participant_id = %participant_id))]
    pub async fn redeem(
        repo: &dyn AttendanceRepository,
        codec: &TokenCodec,
        participant_id: ParticipantId,
        request: RedemptionRequest,
    ) -> Result<SubmissionRecord, RcError> {
        let now = Utc::now();
        let target = request.proxy_for.unwrap_or(participant_id);
        let location_value = request
            .location
            .as_ref()
            .and_then(|loc| serde_json::to_value(loc).ok());

        // Step 1: Verify the payload before trusting any field.
        let payload = match codec.verify(&request.token_payload) {
            Ok(payload) => payload,
            Err(TokenError::Expired { meeting_id }) => {
                // Expiry is decided on an authenticated payload, so the
                // attempt still lands in the scan trail.
                if let Ok(raw_id) = Uuid::parse_str(&meeting_id) {
                    record_scan(
                        repo,
                        scan_entry(
                            MeetingId(raw_id),
                            target,
                            now,
                            request.device_info.clone(),
                            location_value.clone(),
                            Some("token expired".to_string()),
                        ),
                    )
                    .await;
                }
                return Err(TokenError::Expired { meeting_id }.into());
            }
            Err(e) => return Err(e.into()),
        };

        // Step 2: Load the meeting the token is bound to.
        let meeting = repo.get_meeting(payload.meeting_id).await?.ok_or_else(|| {
            RcError::MeetingNotFound(format!("Meeting {} not found", payload.meeting_id))
        })?;

        // Step 3: The meeting must be active with a live token.
        if !meeting.is_redeemable(now) {
            record_scan(
                repo,
                scan_entry(
                    meeting.id,
                    target,
                    now,
                    request.device_info.clone(),
                    location_value.clone(),
                    Some(format!(
                        "meeting is {}, not accepting redemptions",
                        meeting.status.as_str()
                    )),
                ),
            )
            .await;
            return Err(RcError::SessionNotActive(format!(
                "Meeting {} is not accepting redemptions",
                meeting.id
            )));
        }

        // Step 4a: The scanning participant must be enrolled.
        if !meeting.is_enrolled(participant_id) {
            record_scan(
                repo,
                scan_entry(
                    meeting.id,
                    target,
                    now,
                    request.device_info.clone(),
                    location_value.clone(),
                    Some("participant not enrolled".to_string()),
                ),
            )
            .await;
            return Err(RcError::NotEnrolled(format!(
                "Participant {participant_id} is not enrolled in meeting {}",
                meeting.id
            )));
        }

        // Step 4b: Proxy submissions are a per-meeting policy.
        if request.proxy_for.is_some() {
            if !meeting.policy.allow_proxy {
                record_scan(
                    repo,
                    scan_entry(
                        meeting.id,
                        target,
                        now,
                        request.device_info.clone(),
                        location_value.clone(),
                        Some("proxy submissions not allowed".to_string()),
                    ),
                )
                .await;
                return Err(RcError::Forbidden(format!(
                    "Meeting {} does not accept proxy submissions",
                    meeting.id
                )));
            }

            if !meeting.is_enrolled(target) {
                record_scan(
                    repo,
                    scan_entry(
                        meeting.id,
                        target,
                        now,
                        request.device_info.clone(),
                        location_value.clone(),
                        Some("proxy target not enrolled".to_string()),
                    ),
                )
                .await;
                return Err(RcError::NotEnrolled(format!(
                    "Participant {target} is not enrolled in meeting {}",
                    meeting.id
                )));
            }
        }

        // Step 4c: Location evidence is a per-meeting policy.
        if meeting.policy.location_verification && request.location.is_none() {
            record_scan(
                repo,
                scan_entry(
                    meeting.id,
                    target,
                    now,
                    request.device_info.clone(),
                    None,
                    Some("location evidence required".to_string()),
                ),
            )
            .await;
            return Err(RcError::BadRequest(format!(
                "Meeting {} requires location evidence",
                meeting.id
            )));
        }

        // Step 4d: Late-entry gate. Checked before the insert so a
        // rejected attempt leaves no record.
        if now > meeting.late_entry_deadline() && !meeting.policy.allow_late_entry {
            record_scan(
                repo,
                scan_entry(
                    meeting.id,
                    target,
                    now,
                    request.device_info.clone(),
                    location_value.clone(),
                    Some("late entry not allowed".to_string()),
                ),
            )
            .await;
            return Err(RcError::LateEntryNotAllowed(format!(
                "Meeting {} closed to entry {} minutes after start",
                meeting.id, meeting.policy.late_entry_cutoff_minutes
            )));
        }

        // Step 5: Insert-if-absent on the (meeting, participant) key.
        // When approval is not required the record is born approved,
        // attributed to the meeting owner.
        let auto_approve = !meeting.policy.require_approval;
        let submission = NewSubmission {
            id: RecordId::new(),
            meeting_id: meeting.id,
            participant_id: target,
            status: AttendanceStatus::Present,
            check_in_time: now,
            submitted_at: now,
            is_pending_approval: !auto_approve,
            is_approved: auto_approve,
            approved_by: auto_approve.then_some(meeting.owner_id),
            approved_at: auto_approve.then_some(now),
            token_checksum: Some(payload.checksum.clone()),
            scanned_at: Some(now),
            device_info: request.device_info.clone(),
            location: location_value.clone(),
            is_proxy: request.proxy_for.is_some(),
            proxy_reason: request.proxy_reason.clone(),
        };

        let record = match repo.insert_submission(submission).await? {
            SubmissionInsert::Created(record) => record,
            SubmissionInsert::Conflict => {
                record_scan(
                    repo,
                    scan_entry(
                        meeting.id,
                        target,
                        now,
                        request.device_info.clone(),
                        location_value.clone(),
                        Some("record already exists".to_string()),
                    ),
                )
                .await;
                return Err(RcError::AlreadySubmitted(format!(
                    "Participant {target} already has a record for meeting {}",
                    meeting.id
                )));
            }
        };

        // Step 6: The scan trail records the accepted redemption whether
        // or not the record counts toward attendance yet.
        record_scan(
            repo,
            scan_entry(
                meeting.id,
                target,
                now,
                request.device_info,
                location_value,
                None,
            ),
        )
        .await;

        if auto_approve {
            repo.recompute_attendance_count(meeting.id).await?;
        }

        tracing::info!(
            target: "rc.services.ledger",
            meeting_id = %meeting.id,
            participant_id = %target,
            record_id = %record.id,
            is_proxy = record.is_proxy,
            pending_approval = record.is_pending_approval,
            "Redemption accepted"
        );

        Ok(record)
    }

    /// Set the checkout time on a submission record.
    ///
    /// The record's participant, the meeting owner, or an admin may
    /// check out. When the meeting requires checkout, a second checkout
    /// of the same record fails `AlreadyCheckedOut`; otherwise re-entry
    /// simply re-stamps the time. `at` defaults to now.
    #[instrument(skip_all, fields(record_id = %record_id, actor_id = %actor.id))]
    pub async fn checkout(
        repo: &dyn AttendanceRepository,
        record_id: RecordId,
        actor: Actor,
        at: Option<DateTime<Utc>>,
    ) -> Result<SubmissionRecord, RcError> {
        let mut record = repo
            .get_submission(record_id)
            .await?
            .filter(|r| r.is_active)
            .ok_or_else(|| RcError::NotFound(format!("Record {record_id} not found")))?;

        let meeting = repo.get_meeting(record.meeting_id).await?.ok_or_else(|| {
            RcError::MeetingNotFound(format!("Meeting {} not found", record.meeting_id))
        })?;

        let is_own_record = record.participant_id == actor.participant_id();
        if !is_own_record && !actor.can_review(meeting.owner_id) {
            return Err(RcError::Forbidden(
                "Only the record's participant or a reviewer can check out".to_string(),
            ));
        }

        if record.check_out_time.is_some() && meeting.policy.require_checkout {
            return Err(RcError::AlreadyCheckedOut(format!(
                "Record {record_id} is already checked out"
            )));
        }

        record.check_out_time = Some(at.unwrap_or_else(Utc::now));
        repo.update_submission(&record)
            .await?
            .ok_or_else(|| RcError::NotFound(format!("Record {record_id} not found")))
    }
}

/// Build a scan entry; validity is implied by the absence of a reason.
fn scan_entry(
    meeting_id: MeetingId,
    participant_id: ParticipantId,
    scanned_at: DateTime<Utc>,
    device_info: Option<serde_json::Value>,
    location: Option<serde_json::Value>,
    invalid_reason: Option<String>,
) -> NewScan {
    NewScan {
        meeting_id,
        participant_id,
        scanned_at,
        device_info,
        location,
        is_valid: invalid_reason.is_none(),
        invalid_reason,
    }
}

/// Append a scan entry, logging storage failures instead of
/// propagating them. The scan trail is diagnostic; losing an entry
/// must not fail the redemption it describes.
async fn record_scan(repo: &dyn AttendanceRepository, scan: NewScan) {
    if let Err(e) = repo.append_scan(scan).await {
        tracing::warn!(
            target: "rc.services.ledger",
            error = %e,
            "Failed to append redemption scan entry"
        );
    }
}
