//! Approval workflow service.
//!
//! Reviewer-facing operations over submission records: approve or
//! reject a single record, reconcile a whole roster in one pass, amend
//! a record after review, and tombstone a record. Every operation
//! verifies the caller may review the record's meeting before touching
//! anything, and every mutation that can change the attendance count
//! ends by recomputing it from the records rather than adjusting it.

use crate::errors::RcError;
use crate::models::{
    Actor, AttendanceStatus, BulkApproveResponse, Meeting, SubmissionRecord,
};
use crate::repositories::AttendanceRepository;
use chrono::Utc;
use common::types::{MeetingId, RecordId};
use tracing::instrument;

/// Service for reviewer operations on submission records.
pub struct ApprovalService;

impl ApprovalService {
    /// Approve a record with a final status.
    ///
    /// Sets the status, marks the record approved, and clears the
    /// pending flag. Idempotent: repeating the same verdict on an
    /// already-approved record succeeds without re-stamping.
    ///
    /// # Errors
    ///
    /// - `NotFound` - no such record (or it is tombstoned)
    /// - `MeetingNotFound` - the record's meeting disappeared
    /// - `Forbidden` - caller is neither the meeting owner nor an admin
    #[instrument(skip_all, fields(record_id = %record_id, actor_id = %actor.id))]
    pub async fn approve_one(
        repo: &dyn AttendanceRepository,
        record_id: RecordId,
        actor: Actor,
        final_status: AttendanceStatus,
        notes: Option<String>,
    ) -> Result<SubmissionRecord, RcError> {
        let (mut record, meeting) = Self::load_for_review(repo, record_id, actor).await?;

        if record.is_approved && !record.is_pending_approval && record.status == final_status {
            tracing::debug!(
                target: "rc.services.approval",
                record_id = %record_id,
                "Record already approved with this status, no-op"
            );
            return Ok(record);
        }

        let now = Utc::now();
        record.status = final_status;
        record.is_pending_approval = false;
        record.is_approved = true;
        record.approved_by = Some(actor.id);
        record.approved_at = Some(now);
        if notes.is_some() {
            record.notes = notes;
        }

        let updated = repo
            .update_submission(&record)
            .await?
            .ok_or_else(|| RcError::NotFound(format!("Record {record_id} not found")))?;
        repo.recompute_attendance_count(meeting.id).await?;

        tracing::info!(
            target: "rc.services.approval",
            meeting_id = %meeting.id,
            record_id = %record_id,
            final_status = final_status.as_str(),
            "Record approved"
        );

        Ok(updated)
    }

    /// Reject a record: mark it absent with the reason in the notes.
    ///
    /// A rejection is a reviewed verdict, so the record leaves the
    /// pending state rather than being deleted.
    #[instrument(skip_all, fields(record_id = %record_id, actor_id = %actor.id))]
    pub async fn reject_one(
        repo: &dyn AttendanceRepository,
        record_id: RecordId,
        actor: Actor,
        reason: String,
    ) -> Result<SubmissionRecord, RcError> {
        let (mut record, meeting) = Self::load_for_review(repo, record_id, actor).await?;

        let now = Utc::now();
        record.status = AttendanceStatus::Absent;
        record.is_pending_approval = false;
        record.is_approved = true;
        record.approved_by = Some(actor.id);
        record.approved_at = Some(now);
        record.notes = Some(reason);

        let updated = repo
            .update_submission(&record)
            .await?
            .ok_or_else(|| RcError::NotFound(format!("Record {record_id} not found")))?;
        repo.recompute_attendance_count(meeting.id).await?;

        tracing::info!(
            target: "rc.services.approval",
            meeting_id = %meeting.id,
            record_id = %record_id,
            "Record rejected"
        );

        Ok(updated)
    }

    /// Reconcile every roster participant to approved-present.
    ///
    /// Per participant: no record -> create an approved one, pending
    /// record -> promote in place, reviewed or tombstoned record ->
    /// leave alone. The per-participant step is atomic in storage, so
    /// the pass tolerates interleaved redemptions and repeated runs.
    /// Finishes by recomputing the attendance count.
    #[instrument(skip_all, fields(meeting_id = %meeting_id, actor_id = %actor.id))]
    pub async fn bulk_approve_all_present(
        repo: &dyn AttendanceRepository,
        meeting_id: MeetingId,
        actor: Actor,
    ) -> Result<BulkApproveResponse, RcError> {
        let meeting = repo
            .get_meeting(meeting_id)
            .await?
            .ok_or_else(|| RcError::MeetingNotFound(format!("Meeting {meeting_id} not found")))?;
        Self::require_reviewer(actor, &meeting)?;

        let now = Utc::now();
        let mut created = 0;
        let mut approved = 0;
        let mut untouched = 0;

        for participant in &meeting.roster {
            match repo
                .reconcile_approved_present(meeting_id, *participant, actor.id, now)
                .await?
            {
                // A promoted record was scanned in; a created one never was.
                Some(record) if record.scanned_at.is_some() => approved += 1,
                Some(_) => created += 1,
                None => untouched += 1,
            }
        }

        let attendance_count = repo.recompute_attendance_count(meeting_id).await?;

        tracing::info!(
            target: "rc.services.approval",
            meeting_id = %meeting_id,
            created,
            approved,
            untouched,
            attendance_count,
            "Bulk approval pass finished"
        );

        Ok(BulkApproveResponse {
            meeting_id,
            created,
            approved,
            untouched,
            attendance_count,
        })
    }

    /// Amend a record's status after review.
    ///
    /// Stamps `verified_by`/`verified_at` on every call and never
    /// reopens the pending state; a pending record stays pending (and
    /// uncounted) until a reviewer approves or rejects it.
    #[instrument(skip_all, fields(record_id = %record_id, actor_id = %actor.id))]
    pub async fn modify(
        repo: &dyn AttendanceRepository,
        record_id: RecordId,
        actor: Actor,
        new_status: AttendanceStatus,
        notes: Option<String>,
    ) -> Result<SubmissionRecord, RcError> {
        let (mut record, meeting) = Self::load_for_review(repo, record_id, actor).await?;

        let now = Utc::now();
        record.status = new_status;
        record.verified_by = Some(actor.id);
        record.verified_at = Some(now);
        if notes.is_some() {
            record.notes = notes;
        }

        let updated = repo
            .update_submission(&record)
            .await?
            .ok_or_else(|| RcError::NotFound(format!("Record {record_id} not found")))?;
        repo.recompute_attendance_count(meeting.id).await?;

        tracing::info!(
            target: "rc.services.approval",
            meeting_id = %meeting.id,
            record_id = %record_id,
            new_status = new_status.as_str(),
            "Record modified"
        );

        Ok(updated)
    }

    /// Tombstone a record.
    ///
    /// The record drops out of targeted reads, listings, the count, and
    /// future bulk passes; its row stays behind for audit.
    #[instrument(skip_all, fields(record_id = %record_id, actor_id = %actor.id))]
    pub async fn remove(
        repo: &dyn AttendanceRepository,
        record_id: RecordId,
        actor: Actor,
    ) -> Result<(), RcError> {
        let (mut record, meeting) = Self::load_for_review(repo, record_id, actor).await?;

        record.is_active = false;

        repo.update_submission(&record)
            .await?
            .ok_or_else(|| RcError::NotFound(format!("Record {record_id} not found")))?;
        repo.recompute_attendance_count(meeting.id).await?;

        tracing::info!(
            target: "rc.services.approval",
            meeting_id = %meeting.id,
            record_id = %record_id,
            "Record removed"
        );

        Ok(())
    }

    /// Load an active record and its meeting, then gate on reviewer
    /// access. Any failure happens before a mutation.
    async fn load_for_review(
        repo: &dyn AttendanceRepository,
        record_id: RecordId,
        actor: Actor,
    ) -> Result<(SubmissionRecord, Meeting), RcError> {
        let record = repo
            .get_submission(record_id)
            .await?
            .filter(|r| r.is_active)
            .ok_or_else(|| RcError::NotFound(format!("Record {record_id} not found")))?;

        let meeting = repo.get_meeting(record.meeting_id).await?.ok_or_else(|| {
            RcError::MeetingNotFound(format!("Meeting {} not found", record.meeting_id))
        })?;

        Self::require_reviewer(actor, &meeting)?;
        Ok((record, meeting))
    }

    fn require_reviewer(actor: Actor, meeting: &Meeting) -> Result<(), RcError> {
        if !actor.can_review(meeting.owner_id) {
            return Err(RcError::Forbidden(
                "Only the meeting owner or an admin can review records".to_string(),
            ));
        }
        Ok(())
    }
}
