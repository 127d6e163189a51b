//! Repository layer for attendance storage.
//!
//! All storage access goes through the [`AttendanceRepository`] trait so
//! services never touch a concrete backend. Two implementations exist:
//!
//! - [`PgAttendanceRepository`] - PostgreSQL, used in production
//! - [`InMemoryAttendanceRepository`] - process-local, used by tests
//!
//! # Concurrency
//!
//! Implementations are responsible for atomicity. Lifecycle transitions
//! are compare-and-set on the current status, and submission inserts
//! enforce the one-record-per-participant invariant at the storage layer
//! so concurrent redemptions resolve to exactly one winner.

use crate::errors::RcError;
use crate::models::{
    ActiveToken, Meeting, NewMeeting, NewScan, NewSubmission, RedemptionLog, RedemptionScan,
    SubmissionRecord,
};
use chrono::{DateTime, Utc};
use common::types::{MeetingId, ParticipantId, RecordId, UserId};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryAttendanceRepository;
pub use postgres::PgAttendanceRepository;

/// Outcome of a submission insert attempt.
///
/// `Conflict` means a record for the (meeting, participant) pair already
/// exists and nothing was written.
#[derive(Debug)]
pub enum SubmissionInsert {
    /// The record was created.
    Created(SubmissionRecord),
    /// Another record for the pair already exists.
    Conflict,
}

/// Trait for attendance storage operations (enables swapping backends).
#[async_trait::async_trait]
pub trait AttendanceRepository: Send + Sync {
    /// Verify the backend is reachable.
    async fn health_check(&self) -> Result<(), RcError>;

    /// Insert a new meeting in `scheduled` status.
    async fn create_meeting(&self, meeting: NewMeeting) -> Result<Meeting, RcError>;

    /// Fetch a meeting by ID.
    async fn get_meeting(&self, meeting_id: MeetingId) -> Result<Option<Meeting>, RcError>;

    /// Atomically transition `scheduled` -> `active`, store the token
    /// material, and open the redemption log.
    ///
    /// Returns `None` when the meeting is missing or not in `scheduled`
    /// status; callers re-fetch to distinguish the two.
    async fn activate_meeting(
        &self,
        meeting_id: MeetingId,
        token: &ActiveToken,
        issuer_id: UserId,
        started_at: DateTime<Utc>,
    ) -> Result<Option<Meeting>, RcError>;

    /// Atomically transition `active` -> `completed`, clear the token
    /// material, and deactivate the redemption log.
    ///
    /// Returns `None` when the meeting is missing or not `active`.
    async fn complete_meeting(
        &self,
        meeting_id: MeetingId,
        ended_at: DateTime<Utc>,
    ) -> Result<Option<Meeting>, RcError>;

    /// Atomically transition `scheduled` or `active` -> `cancelled`,
    /// clearing any token material and deactivating the redemption log.
    ///
    /// Returns `None` when the meeting is missing or in a terminal status.
    async fn cancel_meeting(
        &self,
        meeting_id: MeetingId,
        cancelled_at: DateTime<Utc>,
    ) -> Result<Option<Meeting>, RcError>;

    /// Atomically transition `scheduled` -> `postponed`.
    ///
    /// Returns `None` when the meeting is missing or not `scheduled`.
    async fn postpone_meeting(&self, meeting_id: MeetingId) -> Result<Option<Meeting>, RcError>;

    /// Insert a submission record, enforcing the unique
    /// (meeting, participant) constraint.
    ///
    /// Under concurrent inserts for the same pair exactly one call
    /// returns `Created`; the rest return `Conflict` with no partial
    /// state written.
    async fn insert_submission(&self, submission: NewSubmission)
        -> Result<SubmissionInsert, RcError>;

    /// Fetch a submission record by ID.
    async fn get_submission(&self, record_id: RecordId)
        -> Result<Option<SubmissionRecord>, RcError>;

    /// Fetch the submission record for a (meeting, participant) pair.
    async fn get_submission_by_participant(
        &self,
        meeting_id: MeetingId,
        participant_id: ParticipantId,
    ) -> Result<Option<SubmissionRecord>, RcError>;

    /// List active submission records for a meeting, oldest first.
    async fn list_submissions(
        &self,
        meeting_id: MeetingId,
    ) -> Result<Vec<SubmissionRecord>, RcError>;

    /// Persist the mutable review fields of a record.
    ///
    /// Returns `None` when the record no longer exists.
    async fn update_submission(
        &self,
        record: &SubmissionRecord,
    ) -> Result<Option<SubmissionRecord>, RcError>;

    /// Upsert one participant to approved-present for the bulk
    /// reconciliation pass.
    ///
    /// Creates an approved `present` record when none exists, promotes a
    /// pending record in place, and leaves already-reviewed or inactive
    /// records untouched. Returns the written record, or `None` when the
    /// row was left untouched.
    async fn reconcile_approved_present(
        &self,
        meeting_id: MeetingId,
        participant_id: ParticipantId,
        reviewer_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<SubmissionRecord>, RcError>;

    /// Recount counted records and store the result on the meeting.
    ///
    /// The count is always recomputed from the records, never
    /// incremented, so repeated calls converge on the same value.
    async fn recompute_attendance_count(&self, meeting_id: MeetingId) -> Result<i64, RcError>;

    /// Append a scan entry to the meeting's redemption log.
    ///
    /// No-op when the meeting has no redemption log.
    async fn append_scan(&self, scan: NewScan) -> Result<(), RcError>;

    /// Fetch the redemption log and its scan entries, oldest scan first.
    async fn get_redemption_log(
        &self,
        meeting_id: MeetingId,
    ) -> Result<Option<(RedemptionLog, Vec<RedemptionScan>)>, RcError>;
}
