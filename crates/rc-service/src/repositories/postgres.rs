//! PostgreSQL implementation of the attendance repository.
//!
//! Provides meeting lifecycle transitions, submission inserts, and
//! redemption log bookkeeping over a `sqlx` connection pool.
//!
//! # Security
//!
//! - Lifecycle transitions are single compare-and-set UPDATEs, so two
//!   concurrent Start calls cannot both succeed
//! - Submission inserts rely on the unique (meeting_id, participant_id)
//!   constraint; a losing insert writes nothing
//! - All queries use parameterized statements (SQL injection safe)

use crate::errors::RcError;
use crate::models::{
    ActiveToken, AttendancePolicy, AttendanceStatus, Meeting, MeetingStatus, NewMeeting, NewScan,
    NewSubmission, RedemptionLog, RedemptionScan, SubmissionRecord,
};
use crate::observability::metrics;
use crate::repositories::{AttendanceRepository, SubmissionInsert};
use chrono::{DateTime, Utc};
use common::types::{MeetingId, ParticipantId, RecordId, UserId};
use sqlx::{PgPool, Row};
use std::str::FromStr;
use std::time::Instant;
use tracing::instrument;
use uuid::Uuid;

/// PostgreSQL-backed attendance repository.
#[derive(Clone)]
pub struct PgAttendanceRepository {
    pool: PgPool,
}

impl PgAttendanceRepository {
    /// Create a repository over an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl AttendanceRepository for PgAttendanceRepository {
    #[instrument(skip_all, name = "rc.repo.health_check")]
    async fn health_check(&self) -> Result<(), RcError> {
        let start = Instant::now();

        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                metrics::record_db_query("health_check", "error", start.elapsed());
                RcError::Database(e.to_string())
            })?;

        metrics::record_db_query("health_check", "success", start.elapsed());
        Ok(())
    }

    #[instrument(skip_all, name = "rc.repo.create_meeting")]
    async fn create_meeting(&self, meeting: NewMeeting) -> Result<Meeting, RcError> {
        let start = Instant::now();
        let roster: Vec<Uuid> = meeting.roster.iter().map(|p| p.0).collect();

        let row = sqlx::query(
            r#"
            INSERT INTO meetings (
                id, owner_id, title, location, start_time, end_time, status,
                roster, require_approval, allow_late_entry,
                late_entry_cutoff_minutes, require_checkout, allow_proxy,
                location_verification
            )
            VALUES ($1, $2, $3, $4, $5, $6, 'scheduled', $7, $8, $9, $10, $11, $12, $13)
            RETURNING
                id, owner_id, title, location, start_time, end_time, status,
                roster, require_approval, allow_late_entry,
                late_entry_cutoff_minutes, require_checkout, allow_proxy,
                location_verification, token_redemption_code, token_issued_at,
                token_expires_at, token_checksum, attendance_count,
                actual_start_time, actual_end_time, created_at, updated_at
            "#,
        )
        .bind(meeting.id.0) // $1
        .bind(meeting.owner_id.0) // $2
        .bind(&meeting.title) // $3
        .bind(&meeting.location) // $4
        .bind(meeting.start_time) // $5
        .bind(meeting.end_time) // $6
        .bind(&roster) // $7
        .bind(meeting.policy.require_approval) // $8
        .bind(meeting.policy.allow_late_entry) // $9
        .bind(meeting.policy.late_entry_cutoff_minutes) // $10
        .bind(meeting.policy.require_checkout) // $11
        .bind(meeting.policy.allow_proxy) // $12
        .bind(meeting.policy.location_verification) // $13
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("create_meeting", "error", start.elapsed());
            RcError::Database(e.to_string())
        })?;

        metrics::record_db_query("create_meeting", "success", start.elapsed());
        map_row_to_meeting(row)
    }

    #[instrument(skip_all, name = "rc.repo.get_meeting")]
    async fn get_meeting(&self, meeting_id: MeetingId) -> Result<Option<Meeting>, RcError> {
        let start = Instant::now();

        let row = sqlx::query(
            r#"
            SELECT
                id, owner_id, title, location, start_time, end_time, status,
                roster, require_approval, allow_late_entry,
                late_entry_cutoff_minutes, require_checkout, allow_proxy,
                location_verification, token_redemption_code, token_issued_at,
                token_expires_at, token_checksum, attendance_count,
                actual_start_time, actual_end_time, created_at, updated_at
            FROM meetings
            WHERE id = $1
            "#,
        )
        .bind(meeting_id.0) // $1
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("get_meeting", "error", start.elapsed());
            RcError::Database(e.to_string())
        })?;

        metrics::record_db_query("get_meeting", "success", start.elapsed());

        match row {
            Some(row) => Ok(Some(map_row_to_meeting(row)?)),
            None => Ok(None),
        }
    }

    /// Compare-and-set on `scheduled` status. The CTE opens the
    /// redemption log in the same statement, so a successful transition
    /// and its log row commit atomically.
    #[instrument(skip_all, name = "rc.repo.activate_meeting")]
    async fn activate_meeting(
        &self,
        meeting_id: MeetingId,
        token: &ActiveToken,
        issuer_id: UserId,
        started_at: DateTime<Utc>,
    ) -> Result<Option<Meeting>, RcError> {
        let start = Instant::now();

        let row = sqlx::query(
            r#"
            WITH activated AS (
                UPDATE meetings
                SET status = 'active',
                    token_redemption_code = $2,
                    token_issued_at = $3,
                    token_expires_at = $4,
                    token_checksum = $5,
                    actual_start_time = $6,
                    updated_at = NOW()
                WHERE id = $1 AND status = 'scheduled'
                RETURNING
                    id, owner_id, title, location, start_time, end_time, status,
                    roster, require_approval, allow_late_entry,
                    late_entry_cutoff_minutes, require_checkout, allow_proxy,
                    location_verification, token_redemption_code, token_issued_at,
                    token_expires_at, token_checksum, attendance_count,
                    actual_start_time, actual_end_time, created_at, updated_at
            ),
            log_open AS (
                INSERT INTO redemption_logs (
                    id, meeting_id, redemption_code, issuer_id, is_active, created_at
                )
                SELECT $7, id, $2, $8, TRUE, $6
                FROM activated
            )
            SELECT * FROM activated
            "#,
        )
        .bind(meeting_id.0) // $1
        .bind(&token.redemption_code) // $2
        .bind(token.issued_at) // $3
        .bind(token.expires_at) // $4
        .bind(&token.checksum) // $5
        .bind(started_at) // $6
        .bind(Uuid::new_v4()) // $7
        .bind(issuer_id.0) // $8
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("activate_meeting", "error", start.elapsed());
            RcError::Database(e.to_string())
        })?;

        metrics::record_db_query("activate_meeting", "success", start.elapsed());

        match row {
            Some(row) => Ok(Some(map_row_to_meeting(row)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip_all, name = "rc.repo.complete_meeting")]
    async fn complete_meeting(
        &self,
        meeting_id: MeetingId,
        ended_at: DateTime<Utc>,
    ) -> Result<Option<Meeting>, RcError> {
        let start = Instant::now();

        let row = sqlx::query(
            r#"
            WITH completed AS (
                UPDATE meetings
                SET status = 'completed',
                    token_redemption_code = NULL,
                    token_issued_at = NULL,
                    token_expires_at = NULL,
                    token_checksum = NULL,
                    actual_end_time = $2,
                    updated_at = NOW()
                WHERE id = $1 AND status = 'active'
                RETURNING
                    id, owner_id, title, location, start_time, end_time, status,
                    roster, require_approval, allow_late_entry,
                    late_entry_cutoff_minutes, require_checkout, allow_proxy,
                    location_verification, token_redemption_code, token_issued_at,
                    token_expires_at, token_checksum, attendance_count,
                    actual_start_time, actual_end_time, created_at, updated_at
            ),
            log_close AS (
                UPDATE redemption_logs
                SET is_active = FALSE, deactivated_at = $2
                WHERE meeting_id IN (SELECT id FROM completed) AND is_active
            )
            SELECT * FROM completed
            "#,
        )
        .bind(meeting_id.0) // $1
        .bind(ended_at) // $2
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("complete_meeting", "error", start.elapsed());
            RcError::Database(e.to_string())
        })?;

        metrics::record_db_query("complete_meeting", "success", start.elapsed());

        match row {
            Some(row) => Ok(Some(map_row_to_meeting(row)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip_all, name = "rc.repo.cancel_meeting")]
    async fn cancel_meeting(
        &self,
        meeting_id: MeetingId,
        cancelled_at: DateTime<Utc>,
    ) -> Result<Option<Meeting>, RcError> {
        let start = Instant::now();

        let row = sqlx::query(
            r#"
            WITH cancelled AS (
                UPDATE meetings
                SET status = 'cancelled',
                    token_redemption_code = NULL,
                    token_issued_at = NULL,
                    token_expires_at = NULL,
                    token_checksum = NULL,
                    updated_at = NOW()
                WHERE id = $1 AND status IN ('scheduled', 'active')
                RETURNING
                    id, owner_id, title, location, start_time, end_time, status,
                    roster, require_approval, allow_late_entry,
                    late_entry_cutoff_minutes, require_checkout, allow_proxy,
                    location_verification, token_redemption_code, token_issued_at,
                    token_expires_at, token_checksum, attendance_count,
                    actual_start_time, actual_end_time, created_at, updated_at
            ),
            log_close AS (
                UPDATE redemption_logs
                SET is_active = FALSE, deactivated_at = $2
                WHERE meeting_id IN (SELECT id FROM cancelled) AND is_active
            )
            SELECT * FROM cancelled
            "#,
        )
        .bind(meeting_id.0) // $1
        .bind(cancelled_at) // $2
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("cancel_meeting", "error", start.elapsed());
            RcError::Database(e.to_string())
        })?;

        metrics::record_db_query("cancel_meeting", "success", start.elapsed());

        match row {
            Some(row) => Ok(Some(map_row_to_meeting(row)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip_all, name = "rc.repo.postpone_meeting")]
    async fn postpone_meeting(&self, meeting_id: MeetingId) -> Result<Option<Meeting>, RcError> {
        let start = Instant::now();

        let row = sqlx::query(
            r#"
            UPDATE meetings
            SET status = 'postponed', updated_at = NOW()
            WHERE id = $1 AND status = 'scheduled'
            RETURNING
                id, owner_id, title, location, start_time, end_time, status,
                roster, require_approval, allow_late_entry,
                late_entry_cutoff_minutes, require_checkout, allow_proxy,
                location_verification, token_redemption_code, token_issued_at,
                token_expires_at, token_checksum, attendance_count,
                actual_start_time, actual_end_time, created_at, updated_at
            "#,
        )
        .bind(meeting_id.0) // $1
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("postpone_meeting", "error", start.elapsed());
            RcError::Database(e.to_string())
        })?;

        metrics::record_db_query("postpone_meeting", "success", start.elapsed());

        match row {
            Some(row) => Ok(Some(map_row_to_meeting(row)?)),
            None => Ok(None),
        }
    }

    /// `ON CONFLICT DO NOTHING` resolves the concurrent-redemption race:
    /// the constraint admits one row per pair, and the losing insert
    /// returns no row and writes nothing.
    #[instrument(skip_all, name = "rc.repo.insert_submission")]
    async fn insert_submission(
        &self,
        submission: NewSubmission,
    ) -> Result<SubmissionInsert, RcError> {
        let start = Instant::now();

        let row = sqlx::query(
            r#"
            INSERT INTO submission_records (
                id, meeting_id, participant_id, status, check_in_time,
                is_pending_approval, is_approved, approved_by, approved_at,
                submitted_at, token_checksum, scanned_at, is_valid_scan,
                device_info, location, is_proxy, proxy_reason
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, TRUE, $13, $14, $15, $16)
            ON CONFLICT (meeting_id, participant_id) DO NOTHING
            RETURNING
                id, meeting_id, participant_id, status, check_in_time,
                check_out_time, is_pending_approval, is_approved, approved_by,
                approved_at, verified_by, verified_at, notes, submitted_at,
                token_checksum, scanned_at, is_valid_scan, device_info,
                location, is_proxy, proxy_reason, is_active, created_at,
                updated_at
            "#,
        )
        .bind(submission.id.0) // $1
        .bind(submission.meeting_id.0) // $2
        .bind(submission.participant_id.0) // $3
        .bind(submission.status.as_str()) // $4
        .bind(submission.check_in_time) // $5
        .bind(submission.is_pending_approval) // $6
        .bind(submission.is_approved) // $7
        .bind(submission.approved_by.map(|u| u.0)) // $8
        .bind(submission.approved_at) // $9
        .bind(submission.submitted_at) // $10
        .bind(&submission.token_checksum) // $11
        .bind(submission.scanned_at) // $12
        .bind(&submission.device_info) // $13
        .bind(&submission.location) // $14
        .bind(submission.is_proxy) // $15
        .bind(&submission.proxy_reason) // $16
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("insert_submission", "error", start.elapsed());
            RcError::Database(e.to_string())
        })?;

        metrics::record_db_query("insert_submission", "success", start.elapsed());

        match row {
            Some(row) => Ok(SubmissionInsert::Created(map_row_to_record(row)?)),
            None => Ok(SubmissionInsert::Conflict),
        }
    }

    #[instrument(skip_all, name = "rc.repo.get_submission")]
    async fn get_submission(
        &self,
        record_id: RecordId,
    ) -> Result<Option<SubmissionRecord>, RcError> {
        let start = Instant::now();

        let row = sqlx::query(
            r#"
            SELECT
                id, meeting_id, participant_id, status, check_in_time,
                check_out_time, is_pending_approval, is_approved, approved_by,
                approved_at, verified_by, verified_at, notes, submitted_at,
                token_checksum, scanned_at, is_valid_scan, device_info,
                location, is_proxy, proxy_reason, is_active, created_at,
                updated_at
            FROM submission_records
            WHERE id = $1
            "#,
        )
        .bind(record_id.0) // $1
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("get_submission", "error", start.elapsed());
            RcError::Database(e.to_string())
        })?;

        metrics::record_db_query("get_submission", "success", start.elapsed());

        match row {
            Some(row) => Ok(Some(map_row_to_record(row)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip_all, name = "rc.repo.get_submission_by_participant")]
    async fn get_submission_by_participant(
        &self,
        meeting_id: MeetingId,
        participant_id: ParticipantId,
    ) -> Result<Option<SubmissionRecord>, RcError> {
        let start = Instant::now();

        let row = sqlx::query(
            r#"
            SELECT
                id, meeting_id, participant_id, status, check_in_time,
                check_out_time, is_pending_approval, is_approved, approved_by,
                approved_at, verified_by, verified_at, notes, submitted_at,
                token_checksum, scanned_at, is_valid_scan, device_info,
                location, is_proxy, proxy_reason, is_active, created_at,
                updated_at
            FROM submission_records
            WHERE meeting_id = $1 AND participant_id = $2
            "#,
        )
        .bind(meeting_id.0) // $1
        .bind(participant_id.0) // $2
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("get_submission_by_participant", "error", start.elapsed());
            RcError::Database(e.to_string())
        })?;

        metrics::record_db_query("get_submission_by_participant", "success", start.elapsed());

        match row {
            Some(row) => Ok(Some(map_row_to_record(row)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip_all, name = "rc.repo.list_submissions")]
    async fn list_submissions(
        &self,
        meeting_id: MeetingId,
    ) -> Result<Vec<SubmissionRecord>, RcError> {
        let start = Instant::now();

        let rows = sqlx::query(
            r#"
            SELECT
                id, meeting_id, participant_id, status, check_in_time,
                check_out_time, is_pending_approval, is_approved, approved_by,
                approved_at, verified_by, verified_at, notes, submitted_at,
                token_checksum, scanned_at, is_valid_scan, device_info,
                location, is_proxy, proxy_reason, is_active, created_at,
                updated_at
            FROM submission_records
            WHERE meeting_id = $1 AND is_active
            ORDER BY submitted_at ASC
            "#,
        )
        .bind(meeting_id.0) // $1
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("list_submissions", "error", start.elapsed());
            RcError::Database(e.to_string())
        })?;

        metrics::record_db_query("list_submissions", "success", start.elapsed());

        rows.into_iter().map(map_row_to_record).collect()
    }

    #[instrument(skip_all, name = "rc.repo.update_submission")]
    async fn update_submission(
        &self,
        record: &SubmissionRecord,
    ) -> Result<Option<SubmissionRecord>, RcError> {
        let start = Instant::now();

        let row = sqlx::query(
            r#"
            UPDATE submission_records
            SET status = $2,
                check_out_time = $3,
                is_pending_approval = $4,
                is_approved = $5,
                approved_by = $6,
                approved_at = $7,
                verified_by = $8,
                verified_at = $9,
                notes = $10,
                is_active = $11,
                updated_at = NOW()
            WHERE id = $1
            RETURNING
                id, meeting_id, participant_id, status, check_in_time,
                check_out_time, is_pending_approval, is_approved, approved_by,
                approved_at, verified_by, verified_at, notes, submitted_at,
                token_checksum, scanned_at, is_valid_scan, device_info,
                location, is_proxy, proxy_reason, is_active, created_at,
                updated_at
            "#,
        )
        .bind(record.id.0) // $1
        .bind(record.status.as_str()) // $2
        .bind(record.check_out_time) // $3
        .bind(record.is_pending_approval) // $4
        .bind(record.is_approved) // $5
        .bind(record.approved_by.map(|u| u.0)) // $6
        .bind(record.approved_at) // $7
        .bind(record.verified_by.map(|u| u.0)) // $8
        .bind(record.verified_at) // $9
        .bind(&record.notes) // $10
        .bind(record.is_active) // $11
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("update_submission", "error", start.elapsed());
            RcError::Database(e.to_string())
        })?;

        metrics::record_db_query("update_submission", "success", start.elapsed());

        match row {
            Some(row) => Ok(Some(map_row_to_record(row)?)),
            None => Ok(None),
        }
    }

    /// Upsert with a conditional `DO UPDATE`: rows that are no longer
    /// pending (or are tombstoned) fail the WHERE clause and come back
    /// as no row, which keeps the pass idempotent.
    #[instrument(skip_all, name = "rc.repo.reconcile_approved_present")]
    async fn reconcile_approved_present(
        &self,
        meeting_id: MeetingId,
        participant_id: ParticipantId,
        reviewer_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<SubmissionRecord>, RcError> {
        let start = Instant::now();

        let row = sqlx::query(
            r#"
            INSERT INTO submission_records (
                id, meeting_id, participant_id, status, check_in_time,
                is_pending_approval, is_approved, approved_by, approved_at,
                submitted_at, is_valid_scan
            )
            VALUES ($1, $2, $3, 'present', $4, FALSE, TRUE, $5, $4, $4, TRUE)
            ON CONFLICT (meeting_id, participant_id) DO UPDATE SET
                status = 'present',
                is_pending_approval = FALSE,
                is_approved = TRUE,
                approved_by = $5,
                approved_at = $4,
                updated_at = NOW()
            WHERE submission_records.is_pending_approval
              AND submission_records.is_active
            RETURNING
                id, meeting_id, participant_id, status, check_in_time,
                check_out_time, is_pending_approval, is_approved, approved_by,
                approved_at, verified_by, verified_at, notes, submitted_at,
                token_checksum, scanned_at, is_valid_scan, device_info,
                location, is_proxy, proxy_reason, is_active, created_at,
                updated_at
            "#,
        )
        .bind(Uuid::new_v4()) // $1
        .bind(meeting_id.0) // $2
        .bind(participant_id.0) // $3
        .bind(now) // $4
        .bind(reviewer_id.0) // $5
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("reconcile_approved_present", "error", start.elapsed());
            RcError::Database(e.to_string())
        })?;

        metrics::record_db_query("reconcile_approved_present", "success", start.elapsed());

        match row {
            Some(row) => Ok(Some(map_row_to_record(row)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip_all, name = "rc.repo.recompute_attendance_count")]
    async fn recompute_attendance_count(&self, meeting_id: MeetingId) -> Result<i64, RcError> {
        let start = Instant::now();

        let row = sqlx::query(
            r#"
            UPDATE meetings
            SET attendance_count = (
                SELECT COUNT(*)
                FROM submission_records
                WHERE meeting_id = $1 AND status = 'present' AND is_approved AND is_active
            ),
                updated_at = NOW()
            WHERE id = $1
            RETURNING attendance_count
            "#,
        )
        .bind(meeting_id.0) // $1
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("recompute_attendance_count", "error", start.elapsed());
            RcError::Database(e.to_string())
        })?;

        metrics::record_db_query("recompute_attendance_count", "success", start.elapsed());

        match row {
            Some(row) => Ok(row.get("attendance_count")),
            None => Err(RcError::MeetingNotFound(format!(
                "Meeting {meeting_id} not found"
            ))),
        }
    }

    /// `INSERT ... SELECT` against the log row, so a meeting that never
    /// opened a log absorbs the append as a no-op.
    #[instrument(skip_all, name = "rc.repo.append_scan")]
    async fn append_scan(&self, scan: NewScan) -> Result<(), RcError> {
        let start = Instant::now();

        sqlx::query(
            r#"
            INSERT INTO redemption_scans (
                id, log_id, participant_id, scanned_at, device_info, location,
                is_valid, invalid_reason
            )
            SELECT $1, rl.id, $2, $3, $4, $5, $6, $7
            FROM redemption_logs rl
            WHERE rl.meeting_id = $8
            "#,
        )
        .bind(Uuid::new_v4()) // $1
        .bind(scan.participant_id.0) // $2
        .bind(scan.scanned_at) // $3
        .bind(&scan.device_info) // $4
        .bind(&scan.location) // $5
        .bind(scan.is_valid) // $6
        .bind(&scan.invalid_reason) // $7
        .bind(scan.meeting_id.0) // $8
        .execute(&self.pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("append_scan", "error", start.elapsed());
            RcError::Database(e.to_string())
        })?;

        metrics::record_db_query("append_scan", "success", start.elapsed());
        Ok(())
    }

    #[instrument(skip_all, name = "rc.repo.get_redemption_log")]
    async fn get_redemption_log(
        &self,
        meeting_id: MeetingId,
    ) -> Result<Option<(RedemptionLog, Vec<RedemptionScan>)>, RcError> {
        let start = Instant::now();

        let log_row = sqlx::query(
            r#"
            SELECT id, meeting_id, redemption_code, issuer_id, is_active,
                   created_at, deactivated_at
            FROM redemption_logs
            WHERE meeting_id = $1
            "#,
        )
        .bind(meeting_id.0) // $1
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("get_redemption_log", "error", start.elapsed());
            RcError::Database(e.to_string())
        })?;

        let log_row = match log_row {
            Some(row) => row,
            None => {
                metrics::record_db_query("get_redemption_log", "success", start.elapsed());
                return Ok(None);
            }
        };

        let log = map_row_to_log(&log_row);

        let scan_rows = sqlx::query(
            r#"
            SELECT id, log_id, participant_id, scanned_at, device_info,
                   location, is_valid, invalid_reason
            FROM redemption_scans
            WHERE log_id = $1
            ORDER BY scanned_at ASC
            "#,
        )
        .bind(log.id) // $1
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("get_redemption_log", "error", start.elapsed());
            RcError::Database(e.to_string())
        })?;

        metrics::record_db_query("get_redemption_log", "success", start.elapsed());

        let scans = scan_rows.iter().map(map_row_to_scan).collect();
        Ok(Some((log, scans)))
    }
}

/// Map a database row to a Meeting.
///
/// Shared by all queries that return meeting rows to avoid
/// field-by-field mapping duplication. Fails only when the stored
/// status does not parse, which indicates schema drift.
fn map_row_to_meeting(row: sqlx::postgres::PgRow) -> Result<Meeting, RcError> {
    let status: String = row.get("status");
    let status = MeetingStatus::from_str(&status).map_err(RcError::Database)?;

    let token = match (
        row.get::<Option<String>, _>("token_redemption_code"),
        row.get::<Option<DateTime<Utc>>, _>("token_issued_at"),
        row.get::<Option<DateTime<Utc>>, _>("token_expires_at"),
        row.get::<Option<String>, _>("token_checksum"),
    ) {
        (Some(redemption_code), Some(issued_at), Some(expires_at), Some(checksum)) => {
            Some(ActiveToken {
                redemption_code,
                issued_at,
                expires_at,
                checksum,
            })
        }
        _ => None,
    };

    let roster: Vec<Uuid> = row.get("roster");

    Ok(Meeting {
        id: MeetingId(row.get("id")),
        owner_id: UserId(row.get("owner_id")),
        title: row.get("title"),
        location: row.get("location"),
        start_time: row.get("start_time"),
        end_time: row.get("end_time"),
        status,
        roster: roster.into_iter().map(ParticipantId).collect(),
        policy: AttendancePolicy {
            require_approval: row.get("require_approval"),
            allow_late_entry: row.get("allow_late_entry"),
            late_entry_cutoff_minutes: row.get("late_entry_cutoff_minutes"),
            require_checkout: row.get("require_checkout"),
            allow_proxy: row.get("allow_proxy"),
            location_verification: row.get("location_verification"),
        },
        token,
        attendance_count: row.get("attendance_count"),
        actual_start_time: row.get("actual_start_time"),
        actual_end_time: row.get("actual_end_time"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

/// Map a database row to a SubmissionRecord.
fn map_row_to_record(row: sqlx::postgres::PgRow) -> Result<SubmissionRecord, RcError> {
    let status: String = row.get("status");
    let status = AttendanceStatus::from_str(&status).map_err(RcError::Database)?;

    Ok(SubmissionRecord {
        id: RecordId(row.get("id")),
        meeting_id: MeetingId(row.get("meeting_id")),
        participant_id: ParticipantId(row.get("participant_id")),
        status,
        check_in_time: row.get("check_in_time"),
        check_out_time: row.get("check_out_time"),
        is_pending_approval: row.get("is_pending_approval"),
        is_approved: row.get("is_approved"),
        approved_by: row.get::<Option<Uuid>, _>("approved_by").map(UserId),
        approved_at: row.get("approved_at"),
        verified_by: row.get::<Option<Uuid>, _>("verified_by").map(UserId),
        verified_at: row.get("verified_at"),
        notes: row.get("notes"),
        submitted_at: row.get("submitted_at"),
        token_checksum: row.get("token_checksum"),
        scanned_at: row.get("scanned_at"),
        is_valid_scan: row.get("is_valid_scan"),
        device_info: row.get("device_info"),
        location: row.get("location"),
        is_proxy: row.get("is_proxy"),
        proxy_reason: row.get("proxy_reason"),
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

/// Map a database row to a RedemptionLog.
fn map_row_to_log(row: &sqlx::postgres::PgRow) -> RedemptionLog {
    RedemptionLog {
        id: row.get("id"),
        meeting_id: MeetingId(row.get("meeting_id")),
        redemption_code: row.get("redemption_code"),
        issuer_id: UserId(row.get("issuer_id")),
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
        deactivated_at: row.get("deactivated_at"),
    }
}

/// Map a database row to a RedemptionScan.
fn map_row_to_scan(row: &sqlx::postgres::PgRow) -> RedemptionScan {
    RedemptionScan {
        id: row.get("id"),
        log_id: row.get("log_id"),
        participant_id: ParticipantId(row.get("participant_id")),
        scanned_at: row.get("scanned_at"),
        device_info: row.get("device_info"),
        location: row.get("location"),
        is_valid: row.get("is_valid"),
        invalid_reason: row.get("invalid_reason"),
    }
}
