//! In-memory implementation of the attendance repository.
//!
//! Backs the HTTP test harness so the full service stack can run
//! without PostgreSQL. Mirrors the storage guarantees of the Postgres
//! implementation: lifecycle transitions are compare-and-set on the
//! current status, and submission inserts enforce the unique
//! (meeting, participant) constraint. A single mutex makes every
//! operation atomic.

use crate::errors::RcError;
use crate::models::{
    ActiveToken, AttendanceStatus, Meeting, MeetingStatus, NewMeeting, NewScan, NewSubmission,
    RedemptionLog, RedemptionScan, SubmissionRecord,
};
use crate::repositories::{AttendanceRepository, SubmissionInsert};
use chrono::{DateTime, Utc};
use common::types::{MeetingId, ParticipantId, RecordId, UserId};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

#[derive(Default)]
struct StoreInner {
    /// Meetings by meeting ID.
    meetings: HashMap<Uuid, Meeting>,
    /// Submission records by record ID.
    records: HashMap<Uuid, SubmissionRecord>,
    /// Unique (meeting_id, participant_id) index into `records`.
    pair_index: HashMap<(Uuid, Uuid), Uuid>,
    /// Redemption logs by meeting ID.
    logs: HashMap<Uuid, RedemptionLog>,
    /// Scan entries, append-only.
    scans: Vec<RedemptionScan>,
}

/// Process-local attendance repository.
#[derive(Default)]
pub struct InMemoryAttendanceRepository {
    inner: Mutex<StoreInner>,
}

impl InMemoryAttendanceRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the store, recovering from poisoning. State is only mutated
    /// under the lock, so a panicking writer cannot leave a torn update.
    fn locked(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait::async_trait]
impl AttendanceRepository for InMemoryAttendanceRepository {
    async fn health_check(&self) -> Result<(), RcError> {
        Ok(())
    }

    async fn create_meeting(&self, meeting: NewMeeting) -> Result<Meeting, RcError> {
        let now = Utc::now();
        let stored = Meeting {
            id: meeting.id,
            owner_id: meeting.owner_id,
            title: meeting.title,
            location: meeting.location,
            start_time: meeting.start_time,
            end_time: meeting.end_time,
            status: MeetingStatus::Scheduled,
            roster: meeting.roster,
            policy: meeting.policy,
            token: None,
            attendance_count: 0,
            actual_start_time: None,
            actual_end_time: None,
            created_at: now,
            updated_at: now,
        };

        let mut inner = self.locked();
        inner.meetings.insert(stored.id.0, stored.clone());
        Ok(stored)
    }

    async fn get_meeting(&self, meeting_id: MeetingId) -> Result<Option<Meeting>, RcError> {
        let inner = self.locked();
        Ok(inner.meetings.get(&meeting_id.0).cloned())
    }

    async fn activate_meeting(
        &self,
        meeting_id: MeetingId,
        token: &ActiveToken,
        issuer_id: UserId,
        started_at: DateTime<Utc>,
    ) -> Result<Option<Meeting>, RcError> {
        let mut inner = self.locked();

        let updated = match inner.meetings.get_mut(&meeting_id.0) {
            Some(meeting) if meeting.status == MeetingStatus::Scheduled => {
                meeting.status = MeetingStatus::Active;
                meeting.token = Some(token.clone());
                meeting.actual_start_time = Some(started_at);
                meeting.updated_at = Utc::now();
                meeting.clone()
            }
            _ => return Ok(None),
        };

        inner.logs.insert(
            meeting_id.0,
            RedemptionLog {
                id: Uuid::new_v4(),
                meeting_id,
                redemption_code: token.redemption_code.clone(),
                issuer_id,
                is_active: true,
                created_at: started_at,
                deactivated_at: None,
            },
        );

        Ok(Some(updated))
    }

    async fn complete_meeting(
        &self,
        meeting_id: MeetingId,
        ended_at: DateTime<Utc>,
    ) -> Result<Option<Meeting>, RcError> {
        let mut inner = self.locked();

        let updated = match inner.meetings.get_mut(&meeting_id.0) {
            Some(meeting) if meeting.status == MeetingStatus::Active => {
                meeting.status = MeetingStatus::Completed;
                meeting.token = None;
                meeting.actual_end_time = Some(ended_at);
                meeting.updated_at = Utc::now();
                meeting.clone()
            }
            _ => return Ok(None),
        };

        if let Some(log) = inner.logs.get_mut(&meeting_id.0) {
            if log.is_active {
                log.is_active = false;
                log.deactivated_at = Some(ended_at);
            }
        }

        Ok(Some(updated))
    }

    async fn cancel_meeting(
        &self,
        meeting_id: MeetingId,
        cancelled_at: DateTime<Utc>,
    ) -> Result<Option<Meeting>, RcError> {
        let mut inner = self.locked();

        let updated = match inner.meetings.get_mut(&meeting_id.0) {
            Some(meeting)
                if matches!(
                    meeting.status,
                    MeetingStatus::Scheduled | MeetingStatus::Active
                ) =>
            {
                meeting.status = MeetingStatus::Cancelled;
                meeting.token = None;
                meeting.updated_at = Utc::now();
                meeting.clone()
            }
            _ => return Ok(None),
        };

        if let Some(log) = inner.logs.get_mut(&meeting_id.0) {
            if log.is_active {
                log.is_active = false;
                log.deactivated_at = Some(cancelled_at);
            }
        }

        Ok(Some(updated))
    }

    async fn postpone_meeting(&self, meeting_id: MeetingId) -> Result<Option<Meeting>, RcError> {
        let mut inner = self.locked();

        match inner.meetings.get_mut(&meeting_id.0) {
            Some(meeting) if meeting.status == MeetingStatus::Scheduled => {
                meeting.status = MeetingStatus::Postponed;
                meeting.updated_at = Utc::now();
                Ok(Some(meeting.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn insert_submission(
        &self,
        submission: NewSubmission,
    ) -> Result<SubmissionInsert, RcError> {
        let mut inner = self.locked();
        let pair = (submission.meeting_id.0, submission.participant_id.0);

        if inner.pair_index.contains_key(&pair) {
            return Ok(SubmissionInsert::Conflict);
        }

        let now = Utc::now();
        let record = SubmissionRecord {
            id: submission.id,
            meeting_id: submission.meeting_id,
            participant_id: submission.participant_id,
            status: submission.status,
            check_in_time: submission.check_in_time,
            check_out_time: None,
            is_pending_approval: submission.is_pending_approval,
            is_approved: submission.is_approved,
            approved_by: submission.approved_by,
            approved_at: submission.approved_at,
            verified_by: None,
            verified_at: None,
            notes: None,
            submitted_at: submission.submitted_at,
            token_checksum: submission.token_checksum,
            scanned_at: submission.scanned_at,
            is_valid_scan: true,
            device_info: submission.device_info,
            location: submission.location,
            is_proxy: submission.is_proxy,
            proxy_reason: submission.proxy_reason,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        inner.pair_index.insert(pair, record.id.0);
        inner.records.insert(record.id.0, record.clone());
        Ok(SubmissionInsert::Created(record))
    }

    async fn get_submission(
        &self,
        record_id: RecordId,
    ) -> Result<Option<SubmissionRecord>, RcError> {
        let inner = self.locked();
        Ok(inner.records.get(&record_id.0).cloned())
    }

    async fn get_submission_by_participant(
        &self,
        meeting_id: MeetingId,
        participant_id: ParticipantId,
    ) -> Result<Option<SubmissionRecord>, RcError> {
        let inner = self.locked();
        let record = inner
            .pair_index
            .get(&(meeting_id.0, participant_id.0))
            .and_then(|id| inner.records.get(id))
            .cloned();
        Ok(record)
    }

    async fn list_submissions(
        &self,
        meeting_id: MeetingId,
    ) -> Result<Vec<SubmissionRecord>, RcError> {
        let inner = self.locked();
        let mut records: Vec<SubmissionRecord> = inner
            .records
            .values()
            .filter(|r| r.meeting_id == meeting_id && r.is_active)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.submitted_at);
        Ok(records)
    }

    async fn update_submission(
        &self,
        record: &SubmissionRecord,
    ) -> Result<Option<SubmissionRecord>, RcError> {
        let mut inner = self.locked();

        match inner.records.get_mut(&record.id.0) {
            Some(stored) => {
                stored.status = record.status;
                stored.check_out_time = record.check_out_time;
                stored.is_pending_approval = record.is_pending_approval;
                stored.is_approved = record.is_approved;
                stored.approved_by = record.approved_by;
                stored.approved_at = record.approved_at;
                stored.verified_by = record.verified_by;
                stored.verified_at = record.verified_at;
                stored.notes = record.notes.clone();
                stored.is_active = record.is_active;
                stored.updated_at = Utc::now();
                Ok(Some(stored.clone()))
            }
            None => Ok(None),
        }
    }

    async fn reconcile_approved_present(
        &self,
        meeting_id: MeetingId,
        participant_id: ParticipantId,
        reviewer_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<SubmissionRecord>, RcError> {
        let mut inner = self.locked();
        let pair = (meeting_id.0, participant_id.0);

        if let Some(record_id) = inner.pair_index.get(&pair).copied() {
            match inner.records.get_mut(&record_id) {
                Some(stored) if stored.is_pending_approval && stored.is_active => {
                    stored.status = AttendanceStatus::Present;
                    stored.is_pending_approval = false;
                    stored.is_approved = true;
                    stored.approved_by = Some(reviewer_id);
                    stored.approved_at = Some(now);
                    stored.updated_at = Utc::now();
                    return Ok(Some(stored.clone()));
                }
                _ => return Ok(None),
            }
        }

        let record = SubmissionRecord {
            id: RecordId::new(),
            meeting_id,
            participant_id,
            status: AttendanceStatus::Present,
            check_in_time: now,
            check_out_time: None,
            is_pending_approval: false,
            is_approved: true,
            approved_by: Some(reviewer_id),
            approved_at: Some(now),
            verified_by: None,
            verified_at: None,
            notes: None,
            submitted_at: now,
            token_checksum: None,
            scanned_at: None,
            is_valid_scan: true,
            device_info: None,
            location: None,
            is_proxy: false,
            proxy_reason: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        inner.pair_index.insert(pair, record.id.0);
        inner.records.insert(record.id.0, record.clone());
        Ok(Some(record))
    }

    async fn recompute_attendance_count(&self, meeting_id: MeetingId) -> Result<i64, RcError> {
        let mut inner = self.locked();

        let count = inner
            .records
            .values()
            .filter(|r| {
                r.meeting_id == meeting_id
                    && r.status == AttendanceStatus::Present
                    && r.is_approved
                    && r.is_active
            })
            .count() as i64;

        match inner.meetings.get_mut(&meeting_id.0) {
            Some(meeting) => {
                meeting.attendance_count = count;
                meeting.updated_at = Utc::now();
                Ok(count)
            }
            None => Err(RcError::MeetingNotFound(format!(
                "Meeting {meeting_id} not found"
            ))),
        }
    }

    async fn append_scan(&self, scan: NewScan) -> Result<(), RcError> {
        let mut inner = self.locked();

        let log_id = match inner.logs.get(&scan.meeting_id.0) {
            Some(log) => log.id,
            None => return Ok(()),
        };

        inner.scans.push(RedemptionScan {
            id: Uuid::new_v4(),
            log_id,
            participant_id: scan.participant_id,
            scanned_at: scan.scanned_at,
            device_info: scan.device_info,
            location: scan.location,
            is_valid: scan.is_valid,
            invalid_reason: scan.invalid_reason,
        });

        Ok(())
    }

    async fn get_redemption_log(
        &self,
        meeting_id: MeetingId,
    ) -> Result<Option<(RedemptionLog, Vec<RedemptionScan>)>, RcError> {
        let inner = self.locked();

        let log = match inner.logs.get(&meeting_id.0) {
            Some(log) => log.clone(),
            None => return Ok(None),
        };

        let mut scans: Vec<RedemptionScan> = inner
            .scans
            .iter()
            .filter(|s| s.log_id == log.id)
            .cloned()
            .collect();
        scans.sort_by_key(|s| s.scanned_at);

        Ok(Some((log, scans)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::models::AttendancePolicy;
    use chrono::Duration;
    use std::sync::Arc;

    fn sample_meeting(owner: UserId) -> NewMeeting {
        NewMeeting {
            id: MeetingId::new(),
            owner_id: owner,
            title: "Weekly standup".to_string(),
            location: Some("Room 4".to_string()),
            start_time: Utc::now(),
            end_time: Utc::now() + Duration::hours(1),
            roster: vec![],
            policy: AttendancePolicy::default(),
        }
    }

    fn sample_token() -> ActiveToken {
        ActiveToken {
            redemption_code: "3xKp9QmT2bVa".to_string(),
            issued_at: Utc::now(),
            expires_at: Utc::now() + Duration::minutes(30),
            checksum: "deadbeef".to_string(),
        }
    }

    fn sample_submission(meeting_id: MeetingId, participant_id: ParticipantId) -> NewSubmission {
        NewSubmission {
            id: RecordId::new(),
            meeting_id,
            participant_id,
            status: AttendanceStatus::Present,
            check_in_time: Utc::now(),
            submitted_at: Utc::now(),
            is_pending_approval: true,
            is_approved: false,
            approved_by: None,
            approved_at: None,
            token_checksum: Some("feedface".to_string()),
            scanned_at: Some(Utc::now()),
            device_info: None,
            location: None,
            is_proxy: false,
            proxy_reason: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_meeting() {
        let repo = InMemoryAttendanceRepository::new();
        let owner = UserId::new();

        let created = repo.create_meeting(sample_meeting(owner)).await.unwrap();
        assert_eq!(created.status, MeetingStatus::Scheduled);
        assert_eq!(created.attendance_count, 0);
        assert!(created.token.is_none());

        let fetched = repo.get_meeting(created.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, created.id);
        assert_eq!(fetched.owner_id, owner);
        assert_eq!(fetched.title, "Weekly standup");
    }

    #[tokio::test]
    async fn test_get_meeting_missing_returns_none() {
        let repo = InMemoryAttendanceRepository::new();
        assert!(repo.get_meeting(MeetingId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_activate_is_compare_and_set() {
        let repo = InMemoryAttendanceRepository::new();
        let meeting = repo
            .create_meeting(sample_meeting(UserId::new()))
            .await
            .unwrap();
        let issuer = meeting.owner_id;

        let first = repo
            .activate_meeting(meeting.id, &sample_token(), issuer, Utc::now())
            .await
            .unwrap();
        let activated = first.unwrap();
        assert_eq!(activated.status, MeetingStatus::Active);
        assert!(activated.token.is_some());
        assert!(activated.actual_start_time.is_some());

        // Second activation finds the meeting no longer scheduled.
        let second = repo
            .activate_meeting(meeting.id, &sample_token(), issuer, Utc::now())
            .await
            .unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn test_activate_opens_redemption_log() {
        let repo = InMemoryAttendanceRepository::new();
        let meeting = repo
            .create_meeting(sample_meeting(UserId::new()))
            .await
            .unwrap();
        let token = sample_token();

        repo.activate_meeting(meeting.id, &token, meeting.owner_id, Utc::now())
            .await
            .unwrap()
            .unwrap();

        let (log, scans) = repo.get_redemption_log(meeting.id).await.unwrap().unwrap();
        assert!(log.is_active);
        assert_eq!(log.redemption_code, token.redemption_code);
        assert_eq!(log.issuer_id, meeting.owner_id);
        assert!(scans.is_empty());
    }

    #[tokio::test]
    async fn test_complete_clears_token_and_closes_log() {
        let repo = InMemoryAttendanceRepository::new();
        let meeting = repo
            .create_meeting(sample_meeting(UserId::new()))
            .await
            .unwrap();
        repo.activate_meeting(meeting.id, &sample_token(), meeting.owner_id, Utc::now())
            .await
            .unwrap()
            .unwrap();

        let ended_at = Utc::now();
        let completed = repo
            .complete_meeting(meeting.id, ended_at)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(completed.status, MeetingStatus::Completed);
        assert!(completed.token.is_none());
        assert_eq!(completed.actual_end_time, Some(ended_at));

        let (log, _) = repo.get_redemption_log(meeting.id).await.unwrap().unwrap();
        assert!(!log.is_active);
        assert_eq!(log.deactivated_at, Some(ended_at));
    }

    #[tokio::test]
    async fn test_complete_requires_active() {
        let repo = InMemoryAttendanceRepository::new();
        let meeting = repo
            .create_meeting(sample_meeting(UserId::new()))
            .await
            .unwrap();

        let result = repo.complete_meeting(meeting.id, Utc::now()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_cancel_from_scheduled_and_active() {
        let repo = InMemoryAttendanceRepository::new();

        let scheduled = repo
            .create_meeting(sample_meeting(UserId::new()))
            .await
            .unwrap();
        let cancelled = repo
            .cancel_meeting(scheduled.id, Utc::now())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cancelled.status, MeetingStatus::Cancelled);

        let active = repo
            .create_meeting(sample_meeting(UserId::new()))
            .await
            .unwrap();
        repo.activate_meeting(active.id, &sample_token(), active.owner_id, Utc::now())
            .await
            .unwrap()
            .unwrap();
        let cancelled = repo
            .cancel_meeting(active.id, Utc::now())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cancelled.status, MeetingStatus::Cancelled);
        assert!(cancelled.token.is_none());

        // Terminal states cannot be cancelled again.
        assert!(repo
            .cancel_meeting(scheduled.id, Utc::now())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_postpone_requires_scheduled() {
        let repo = InMemoryAttendanceRepository::new();
        let meeting = repo
            .create_meeting(sample_meeting(UserId::new()))
            .await
            .unwrap();

        let postponed = repo
            .postpone_meeting(meeting.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(postponed.status, MeetingStatus::Postponed);

        assert!(repo.postpone_meeting(meeting.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_submission_conflict_on_same_pair() {
        let repo = InMemoryAttendanceRepository::new();
        let meeting_id = MeetingId::new();
        let participant = ParticipantId::new();

        let first = repo
            .insert_submission(sample_submission(meeting_id, participant))
            .await
            .unwrap();
        assert!(matches!(first, SubmissionInsert::Created(_)));

        let second = repo
            .insert_submission(sample_submission(meeting_id, participant))
            .await
            .unwrap();
        assert!(matches!(second, SubmissionInsert::Conflict));

        let records = repo.list_submissions(meeting_id).await.unwrap();
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_inserts_have_single_winner() {
        let repo = Arc::new(InMemoryAttendanceRepository::new());
        let meeting_id = MeetingId::new();
        let participant = ParticipantId::new();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let repo = Arc::clone(&repo);
            handles.push(tokio::spawn(async move {
                repo.insert_submission(sample_submission(meeting_id, participant))
                    .await
            }));
        }

        let mut created = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap().unwrap() {
                SubmissionInsert::Created(_) => created += 1,
                SubmissionInsert::Conflict => conflicts += 1,
            }
        }

        assert_eq!(created, 1);
        assert_eq!(conflicts, 7);
    }

    #[tokio::test]
    async fn test_update_submission_missing_returns_none() {
        let repo = InMemoryAttendanceRepository::new();
        let record = match repo
            .insert_submission(sample_submission(MeetingId::new(), ParticipantId::new()))
            .await
            .unwrap()
        {
            SubmissionInsert::Created(record) => record,
            SubmissionInsert::Conflict => panic!("fresh pair should insert"),
        };

        let mut ghost = record;
        ghost.id = RecordId::new();
        assert!(repo.update_submission(&ghost).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_submission_persists_review_fields() {
        let repo = InMemoryAttendanceRepository::new();
        let reviewer = UserId::new();
        let mut record = match repo
            .insert_submission(sample_submission(MeetingId::new(), ParticipantId::new()))
            .await
            .unwrap()
        {
            SubmissionInsert::Created(record) => record,
            SubmissionInsert::Conflict => panic!("fresh pair should insert"),
        };

        record.status = AttendanceStatus::Excused;
        record.is_pending_approval = false;
        record.is_approved = true;
        record.approved_by = Some(reviewer);
        record.approved_at = Some(Utc::now());
        record.notes = Some("documented absence".to_string());

        let updated = repo.update_submission(&record).await.unwrap().unwrap();
        assert_eq!(updated.status, AttendanceStatus::Excused);
        assert!(!updated.is_pending_approval);
        assert!(updated.is_approved);
        assert_eq!(updated.approved_by, Some(reviewer));
        assert_eq!(updated.notes.as_deref(), Some("documented absence"));

        let fetched = repo.get_submission(record.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, AttendanceStatus::Excused);
    }

    #[tokio::test]
    async fn test_reconcile_creates_missing_record_as_approved_present() {
        let repo = InMemoryAttendanceRepository::new();
        let meeting_id = MeetingId::new();
        let participant = ParticipantId::new();
        let reviewer = UserId::new();

        let record = repo
            .reconcile_approved_present(meeting_id, participant, reviewer, Utc::now())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, AttendanceStatus::Present);
        assert!(record.is_approved);
        assert!(!record.is_pending_approval);
        assert_eq!(record.approved_by, Some(reviewer));
        assert!(record.scanned_at.is_none());
    }

    #[tokio::test]
    async fn test_reconcile_promotes_pending_record() {
        let repo = InMemoryAttendanceRepository::new();
        let meeting_id = MeetingId::new();
        let participant = ParticipantId::new();
        let reviewer = UserId::new();

        let original = match repo
            .insert_submission(sample_submission(meeting_id, participant))
            .await
            .unwrap()
        {
            SubmissionInsert::Created(record) => record,
            SubmissionInsert::Conflict => panic!("fresh pair should insert"),
        };

        let promoted = repo
            .reconcile_approved_present(meeting_id, participant, reviewer, Utc::now())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(promoted.id, original.id);
        assert!(promoted.is_approved);
        assert!(!promoted.is_pending_approval);
        // The original scan evidence is preserved.
        assert_eq!(promoted.scanned_at, original.scanned_at);
    }

    #[tokio::test]
    async fn test_reconcile_leaves_reviewed_record_untouched() {
        let repo = InMemoryAttendanceRepository::new();
        let meeting_id = MeetingId::new();
        let participant = ParticipantId::new();

        let mut record = match repo
            .insert_submission(sample_submission(meeting_id, participant))
            .await
            .unwrap()
        {
            SubmissionInsert::Created(record) => record,
            SubmissionInsert::Conflict => panic!("fresh pair should insert"),
        };
        record.status = AttendanceStatus::Excused;
        record.is_pending_approval = false;
        record.is_approved = true;
        repo.update_submission(&record).await.unwrap().unwrap();

        let result = repo
            .reconcile_approved_present(meeting_id, participant, UserId::new(), Utc::now())
            .await
            .unwrap();
        assert!(result.is_none());

        let fetched = repo.get_submission(record.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, AttendanceStatus::Excused);
    }

    #[tokio::test]
    async fn test_reconcile_skips_tombstoned_record() {
        let repo = InMemoryAttendanceRepository::new();
        let meeting_id = MeetingId::new();
        let participant = ParticipantId::new();

        let mut record = match repo
            .insert_submission(sample_submission(meeting_id, participant))
            .await
            .unwrap()
        {
            SubmissionInsert::Created(record) => record,
            SubmissionInsert::Conflict => panic!("fresh pair should insert"),
        };
        record.is_active = false;
        repo.update_submission(&record).await.unwrap().unwrap();

        let result = repo
            .reconcile_approved_present(meeting_id, participant, UserId::new(), Utc::now())
            .await
            .unwrap();
        assert!(result.is_none());

        let fetched = repo.get_submission(record.id).await.unwrap().unwrap();
        assert!(!fetched.is_active);
    }

    #[tokio::test]
    async fn test_recompute_counts_approved_present_active_only() {
        let repo = InMemoryAttendanceRepository::new();
        let meeting = repo
            .create_meeting(sample_meeting(UserId::new()))
            .await
            .unwrap();

        // Approved, present, active: counted.
        let mut approved = match repo
            .insert_submission(sample_submission(meeting.id, ParticipantId::new()))
            .await
            .unwrap()
        {
            SubmissionInsert::Created(record) => record,
            SubmissionInsert::Conflict => panic!("fresh pair should insert"),
        };
        approved.is_pending_approval = false;
        approved.is_approved = true;
        repo.update_submission(&approved).await.unwrap().unwrap();

        // Pending approval: not counted.
        repo.insert_submission(sample_submission(meeting.id, ParticipantId::new()))
            .await
            .unwrap();

        // Absent: not counted.
        let mut absent = sample_submission(meeting.id, ParticipantId::new());
        absent.status = AttendanceStatus::Absent;
        repo.insert_submission(absent).await.unwrap();

        // Present but tombstoned: not counted.
        let mut tombstoned = match repo
            .insert_submission(sample_submission(meeting.id, ParticipantId::new()))
            .await
            .unwrap()
        {
            SubmissionInsert::Created(record) => record,
            SubmissionInsert::Conflict => panic!("fresh pair should insert"),
        };
        tombstoned.is_active = false;
        repo.update_submission(&tombstoned).await.unwrap().unwrap();

        let count = repo.recompute_attendance_count(meeting.id).await.unwrap();
        assert_eq!(count, 1);

        let fetched = repo.get_meeting(meeting.id).await.unwrap().unwrap();
        assert_eq!(fetched.attendance_count, 1);
    }

    #[tokio::test]
    async fn test_recompute_missing_meeting_errors() {
        let repo = InMemoryAttendanceRepository::new();
        let result = repo.recompute_attendance_count(MeetingId::new()).await;
        assert!(matches!(result, Err(RcError::MeetingNotFound(_))));
    }

    #[tokio::test]
    async fn test_append_scan_without_log_is_noop() {
        let repo = InMemoryAttendanceRepository::new();
        let meeting_id = MeetingId::new();

        repo.append_scan(NewScan {
            meeting_id,
            participant_id: ParticipantId::new(),
            scanned_at: Utc::now(),
            device_info: None,
            location: None,
            is_valid: false,
            invalid_reason: Some("meeting is not accepting redemptions".to_string()),
        })
        .await
        .unwrap();

        assert!(repo.get_redemption_log(meeting_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_scans_ordered_by_time() {
        let repo = InMemoryAttendanceRepository::new();
        let meeting = repo
            .create_meeting(sample_meeting(UserId::new()))
            .await
            .unwrap();
        repo.activate_meeting(meeting.id, &sample_token(), meeting.owner_id, Utc::now())
            .await
            .unwrap()
            .unwrap();

        let base = Utc::now();
        for offset in [2i64, 0, 1] {
            repo.append_scan(NewScan {
                meeting_id: meeting.id,
                participant_id: ParticipantId::new(),
                scanned_at: base + Duration::seconds(offset),
                device_info: None,
                location: None,
                is_valid: true,
                invalid_reason: None,
            })
            .await
            .unwrap();
        }

        let (_, scans) = repo.get_redemption_log(meeting.id).await.unwrap().unwrap();
        let times: Vec<_> = scans.iter().map(|s| s.scanned_at).collect();
        assert_eq!(
            times,
            vec![
                base,
                base + Duration::seconds(1),
                base + Duration::seconds(2)
            ]
        );
    }
}
