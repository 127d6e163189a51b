//! Roster Controller models.
//!
//! Contains the meeting, submission record, and redemption log types plus
//! the request/response models for the HTTP API.

use chrono::{DateTime, Duration, Utc};
use common::types::{MeetingId, ParticipantId, RecordId, UserId};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Meeting status enumeration.
///
/// Represents the lifecycle state of a meeting. Tokens may only be
/// redeemed while the meeting is `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeetingStatus {
    /// Meeting is scheduled but not yet started.
    Scheduled,

    /// Meeting is currently in progress with a live token.
    Active,

    /// Meeting has ended normally.
    Completed,

    /// Meeting was cancelled before or during the session.
    Cancelled,

    /// Meeting was postponed before it started.
    Postponed,
}

impl MeetingStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            MeetingStatus::Scheduled => "scheduled",
            MeetingStatus::Active => "active",
            MeetingStatus::Completed => "completed",
            MeetingStatus::Cancelled => "cancelled",
            MeetingStatus::Postponed => "postponed",
        }
    }
}

impl FromStr for MeetingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(MeetingStatus::Scheduled),
            "active" => Ok(MeetingStatus::Active),
            "completed" => Ok(MeetingStatus::Completed),
            "cancelled" => Ok(MeetingStatus::Cancelled),
            "postponed" => Ok(MeetingStatus::Postponed),
            other => Err(format!("unknown meeting status: {other}")),
        }
    }
}

/// Attendance status stored on a submission record.
///
/// `late` is intentionally not a stored status. It is derived from the
/// check-in time relative to the meeting's late entry cutoff and only
/// affects presentation, never counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    /// Participant was present (includes late arrivals).
    Present,

    /// Participant was absent.
    Absent,

    /// Participant was excused by a reviewer.
    Excused,
}

impl AttendanceStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
            AttendanceStatus::Excused => "excused",
        }
    }

    /// Whether this status counts toward `attendance_count`.
    #[must_use]
    pub fn is_counted(&self) -> bool {
        matches!(self, AttendanceStatus::Present)
    }
}

impl FromStr for AttendanceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "present" => Ok(AttendanceStatus::Present),
            "absent" => Ok(AttendanceStatus::Absent),
            "excused" => Ok(AttendanceStatus::Excused),
            other => Err(format!("unknown attendance status: {other}")),
        }
    }
}

/// Per-meeting attendance policy.
///
/// All fields have server-side defaults applied at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendancePolicy {
    /// Whether redemptions land as pending records requiring reviewer
    /// approval (true) or are auto-approved on submission (false).
    pub require_approval: bool,

    /// Whether redemptions after the late entry cutoff are accepted.
    pub allow_late_entry: bool,

    /// Minutes after the scheduled start time before a check-in counts
    /// as late.
    pub late_entry_cutoff_minutes: i32,

    /// Whether participants are expected to check out, forbidding
    /// repeated checkout of the same record.
    pub require_checkout: bool,

    /// Whether proxy submissions (one participant scanning on behalf of
    /// another) are accepted.
    pub allow_proxy: bool,

    /// Whether redemptions must carry location evidence.
    pub location_verification: bool,
}

impl Default for AttendancePolicy {
    fn default() -> Self {
        Self {
            require_approval: true,
            allow_late_entry: true,
            late_entry_cutoff_minutes: DEFAULT_LATE_ENTRY_CUTOFF_MINUTES,
            require_checkout: false,
            allow_proxy: false,
            location_verification: false,
        }
    }
}

/// Token material held by an active meeting.
///
/// Present only while the meeting status is `active`. The serialized
/// payload is not stored; it is rebuilt deterministically from the
/// meeting fields and `issued_at` when needed.
#[derive(Debug, Clone, Serialize)]
pub struct ActiveToken {
    /// Unique redemption code used for audit correlation.
    pub redemption_code: String,

    /// When the token was issued.
    pub issued_at: DateTime<Utc>,

    /// Absolute expiry. Redemptions after this instant are rejected.
    pub expires_at: DateTime<Utc>,

    /// Keyed checksum over the canonical payload fields.
    #[serde(skip_serializing)]
    pub checksum: String,
}

/// A meeting as stored in the database.
#[derive(Debug, Clone)]
pub struct Meeting {
    /// Unique meeting identifier.
    pub id: MeetingId,

    /// User who owns the meeting and reviews its attendance.
    pub owner_id: UserId,

    /// Meeting display title.
    pub title: String,

    /// Free-form location description.
    pub location: Option<String>,

    /// Scheduled start time.
    pub start_time: DateTime<Utc>,

    /// Scheduled end time.
    pub end_time: DateTime<Utc>,

    /// Current lifecycle status.
    pub status: MeetingStatus,

    /// Enrolled participant identifiers.
    pub roster: Vec<ParticipantId>,

    /// Attendance policy for this meeting.
    pub policy: AttendancePolicy,

    /// Active token material, non-null only while status is `active`.
    pub token: Option<ActiveToken>,

    /// Cached count of counted (present) records.
    pub attendance_count: i64,

    /// Actual start time, recorded when the meeting was started.
    pub actual_start_time: Option<DateTime<Utc>>,

    /// Actual end time, recorded when the meeting ended.
    pub actual_end_time: Option<DateTime<Utc>>,

    /// Creation timestamp.
    pub created_at: DateTime<Utc>,

    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Meeting {
    /// Whether a token redemption is currently possible: the meeting is
    /// active, holds a token, and the token has not expired.
    #[must_use]
    pub fn is_redeemable(&self, now: DateTime<Utc>) -> bool {
        self.status == MeetingStatus::Active
            && self.token.as_ref().is_some_and(|t| now <= t.expires_at)
    }

    /// Whether the given participant is enrolled in this meeting.
    #[must_use]
    pub fn is_enrolled(&self, participant: ParticipantId) -> bool {
        self.roster.contains(&participant)
    }

    /// The instant after which a check-in counts as late.
    #[must_use]
    pub fn late_entry_deadline(&self) -> DateTime<Utc> {
        self.start_time + Duration::minutes(i64::from(self.policy.late_entry_cutoff_minutes))
    }
}

/// A durable presence record for one (meeting, participant) pair.
#[derive(Debug, Clone)]
pub struct SubmissionRecord {
    /// Unique record identifier.
    pub id: RecordId,

    /// Meeting this record belongs to.
    pub meeting_id: MeetingId,

    /// Participant this record belongs to.
    pub participant_id: ParticipantId,

    /// Attendance status. Counted statuses feed `attendance_count`.
    pub status: AttendanceStatus,

    /// When the participant checked in.
    pub check_in_time: DateTime<Utc>,

    /// When the participant checked out, if they have.
    pub check_out_time: Option<DateTime<Utc>>,

    /// Whether the record is awaiting reviewer approval.
    pub is_pending_approval: bool,

    /// Whether a reviewer (or auto-approval) has confirmed the record.
    pub is_approved: bool,

    /// Reviewer who approved the record.
    pub approved_by: Option<UserId>,

    /// When the record was approved.
    pub approved_at: Option<DateTime<Utc>>,

    /// Reviewer who last verified (modified) the record.
    pub verified_by: Option<UserId>,

    /// When the record was last verified.
    pub verified_at: Option<DateTime<Utc>>,

    /// Reviewer notes.
    pub notes: Option<String>,

    /// When the redemption was submitted.
    pub submitted_at: DateTime<Utc>,

    /// Checksum of the token that produced this record, if any.
    pub token_checksum: Option<String>,

    /// When the token was scanned, if the record came from a redemption.
    pub scanned_at: Option<DateTime<Utc>>,

    /// Whether the originating scan passed verification.
    pub is_valid_scan: bool,

    /// Device metadata captured at redemption.
    pub device_info: Option<serde_json::Value>,

    /// Location evidence captured at redemption.
    pub location: Option<serde_json::Value>,

    /// Whether this was a proxy submission.
    pub is_proxy: bool,

    /// Stated reason for the proxy submission.
    pub proxy_reason: Option<String>,

    /// Tombstone flag. Inactive records are excluded from counts and
    /// listings but retained for audit.
    pub is_active: bool,

    /// Creation timestamp.
    pub created_at: DateTime<Utc>,

    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl SubmissionRecord {
    /// Whether this record represents a late arrival. Derived from the
    /// check-in time, never stored.
    #[must_use]
    pub fn is_late(&self, meeting: &Meeting) -> bool {
        self.status == AttendanceStatus::Present && self.check_in_time > meeting.late_entry_deadline()
    }
}

/// Append-only audit log of token usage for one meeting.
#[derive(Debug, Clone)]
pub struct RedemptionLog {
    /// Unique log identifier.
    pub id: Uuid,

    /// Meeting this log belongs to.
    pub meeting_id: MeetingId,

    /// The token's redemption code.
    pub redemption_code: String,

    /// User who started the meeting and issued the token.
    pub issuer_id: UserId,

    /// Whether the token is still live. Cleared when the meeting ends
    /// or is cancelled.
    pub is_active: bool,

    /// Creation timestamp.
    pub created_at: DateTime<Utc>,

    /// When the log was deactivated.
    pub deactivated_at: Option<DateTime<Utc>>,
}

/// One redemption attempt recorded against a log.
#[derive(Debug, Clone)]
pub struct RedemptionScan {
    /// Unique scan identifier.
    pub id: Uuid,

    /// Log this scan belongs to.
    pub log_id: Uuid,

    /// Participant who scanned.
    pub participant_id: ParticipantId,

    /// When the scan happened.
    pub scanned_at: DateTime<Utc>,

    /// Device metadata supplied by the client.
    pub device_info: Option<serde_json::Value>,

    /// Location evidence supplied by the client.
    pub location: Option<serde_json::Value>,

    /// Whether the scan passed all redemption checks.
    pub is_valid: bool,

    /// Rejection reason for invalid scans.
    pub invalid_reason: Option<String>,
}

// ============================================================================
// Repository Input Models
// ============================================================================

/// Input for creating a meeting row.
#[derive(Debug, Clone)]
pub struct NewMeeting {
    pub id: MeetingId,
    pub owner_id: UserId,
    pub title: String,
    pub location: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub roster: Vec<ParticipantId>,
    pub policy: AttendancePolicy,
}

/// Input for inserting a submission record.
///
/// The caller pre-generates the record ID; on a uniqueness conflict the
/// ID is discarded along with the insert.
#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub id: RecordId,
    pub meeting_id: MeetingId,
    pub participant_id: ParticipantId,
    pub status: AttendanceStatus,
    pub check_in_time: DateTime<Utc>,
    pub submitted_at: DateTime<Utc>,
    pub is_pending_approval: bool,
    pub is_approved: bool,
    pub approved_by: Option<UserId>,
    pub approved_at: Option<DateTime<Utc>>,
    pub token_checksum: Option<String>,
    pub scanned_at: Option<DateTime<Utc>>,
    pub device_info: Option<serde_json::Value>,
    pub location: Option<serde_json::Value>,
    pub is_proxy: bool,
    pub proxy_reason: Option<String>,
}

/// Input for appending a redemption scan entry.
#[derive(Debug, Clone)]
pub struct NewScan {
    pub meeting_id: MeetingId,
    pub participant_id: ParticipantId,
    pub scanned_at: DateTime<Utc>,
    pub device_info: Option<serde_json::Value>,
    pub location: Option<serde_json::Value>,
    pub is_valid: bool,
    pub invalid_reason: Option<String>,
}

// ============================================================================
// Actor Identity
// ============================================================================

/// Role asserted for a caller by the upstream API gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    /// Regular participant; may redeem tokens and check out of their
    /// own records.
    Participant,

    /// Faculty member; may create and run meetings they own.
    Faculty,

    /// Administrator; may review any meeting.
    Admin,
}

impl ActorRole {
    /// Returns the string representation of the role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorRole::Participant => "participant",
            ActorRole::Faculty => "faculty",
            ActorRole::Admin => "admin",
        }
    }
}

impl FromStr for ActorRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "participant" => Ok(ActorRole::Participant),
            "faculty" => Ok(ActorRole::Faculty),
            "admin" => Ok(ActorRole::Admin),
            other => Err(format!("unknown actor role: {other}")),
        }
    }
}

/// Authenticated caller identity, extracted from gateway headers by the
/// `require_actor` middleware and stored in request extensions.
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    /// Caller's user identifier.
    pub id: UserId,

    /// Caller's asserted role.
    pub role: ActorRole,
}

impl Actor {
    /// Creates an actor from an ID and role.
    #[must_use]
    pub fn new(id: UserId, role: ActorRole) -> Self {
        Self { id, role }
    }

    /// Whether the actor holds the admin role.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == ActorRole::Admin
    }

    /// Whether the actor may review (approve, reject, modify, remove)
    /// records for a meeting owned by `owner_id`.
    #[must_use]
    pub fn can_review(&self, owner_id: UserId) -> bool {
        self.is_admin() || self.id == owner_id
    }

    /// The actor's identity viewed as a roster participant.
    #[must_use]
    pub fn participant_id(&self) -> ParticipantId {
        ParticipantId(self.id.0)
    }
}

// ============================================================================
// Meeting API Models
// ============================================================================

/// Maximum meeting title length (in bytes).
pub const MAX_MEETING_TITLE_LENGTH: usize = 255;

/// Minimum meeting title length (in bytes, after trimming).
pub const MIN_MEETING_TITLE_LENGTH: usize = 1;

/// Maximum roster size per meeting.
pub const MAX_ROSTER_SIZE: usize = 1000;

/// Maximum length for reviewer notes and rejection reasons (in bytes).
pub const MAX_NOTES_LENGTH: usize = 1000;

/// Default late entry cutoff in minutes.
pub const DEFAULT_LATE_ENTRY_CUTOFF_MINUTES: i32 = 15;

/// Request to create a new meeting.
///
/// Sent by the scheduling subsystem. Policy fields are optional; secure
/// defaults are applied server-side.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateMeetingRequest {
    /// Meeting display title (required, 1-255 bytes after trimming).
    pub title: String,

    /// Free-form location description (optional).
    pub location: Option<String>,

    /// Scheduled start time.
    pub start_time: DateTime<Utc>,

    /// Scheduled end time. Must be after `start_time`.
    pub end_time: DateTime<Utc>,

    /// Enrolled participant identifiers (optional, default empty).
    pub roster: Option<Vec<ParticipantId>>,

    /// Whether redemptions require reviewer approval (default: true).
    pub require_approval: Option<bool>,

    /// Whether late redemptions are accepted (default: true).
    pub allow_late_entry: Option<bool>,

    /// Minutes after start before a check-in is late (default: 15).
    pub late_entry_cutoff_minutes: Option<i32>,

    /// Whether checkout is required (default: false).
    pub require_checkout: Option<bool>,

    /// Whether proxy submissions are accepted (default: false).
    pub allow_proxy: Option<bool>,

    /// Whether redemptions must carry location evidence (default: false).
    pub location_verification: Option<bool>,
}

impl CreateMeetingRequest {
    /// Validate the request fields.
    ///
    /// # Errors
    ///
    /// Returns an error message if validation fails.
    pub fn validate(&self) -> Result<(), &'static str> {
        let title = self.title.trim();

        if title.len() < MIN_MEETING_TITLE_LENGTH {
            return Err("Title is required");
        }

        if title.len() > MAX_MEETING_TITLE_LENGTH {
            return Err("Title must be at most 255 characters");
        }

        if self.start_time >= self.end_time {
            return Err("Start time must be before end time");
        }

        if let Some(cutoff) = self.late_entry_cutoff_minutes {
            if cutoff < 0 {
                return Err("Late entry cutoff must not be negative");
            }
        }

        if let Some(roster) = &self.roster {
            if roster.len() > MAX_ROSTER_SIZE {
                return Err("Roster must have at most 1000 participants");
            }
        }

        Ok(())
    }

    /// Builds the effective policy from request fields and defaults.
    #[must_use]
    pub fn policy(&self) -> AttendancePolicy {
        let defaults = AttendancePolicy::default();
        AttendancePolicy {
            require_approval: self.require_approval.unwrap_or(defaults.require_approval),
            allow_late_entry: self.allow_late_entry.unwrap_or(defaults.allow_late_entry),
            late_entry_cutoff_minutes: self
                .late_entry_cutoff_minutes
                .unwrap_or(defaults.late_entry_cutoff_minutes),
            require_checkout: self.require_checkout.unwrap_or(defaults.require_checkout),
            allow_proxy: self.allow_proxy.unwrap_or(defaults.allow_proxy),
            location_verification: self
                .location_verification
                .unwrap_or(defaults.location_verification),
        }
    }
}

/// Active token metadata exposed to meeting viewers.
///
/// Excludes the checksum; the full payload is only returned to the
/// meeting owner.
#[derive(Debug, Clone, Serialize)]
pub struct TokenInfo {
    /// Redemption code for audit correlation.
    pub redemption_code: String,

    /// When the token was issued.
    pub issued_at: DateTime<Utc>,

    /// Absolute expiry.
    pub expires_at: DateTime<Utc>,
}

/// Response for meeting details.
///
/// Returned by `POST /api/v1/meetings`, `GET /api/v1/meetings/{id}`, and
/// the lifecycle transition endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct MeetingResponse {
    /// Unique meeting identifier.
    pub meeting_id: MeetingId,

    /// User who owns the meeting.
    pub owner_id: UserId,

    /// Meeting display title.
    pub title: String,

    /// Free-form location description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    /// Scheduled start time.
    pub start_time: DateTime<Utc>,

    /// Scheduled end time.
    pub end_time: DateTime<Utc>,

    /// Current lifecycle status.
    pub status: MeetingStatus,

    /// Enrolled participant identifiers.
    pub roster: Vec<ParticipantId>,

    /// Attendance policy.
    pub policy: AttendancePolicy,

    /// Active token metadata, present only while the meeting is active.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<TokenInfo>,

    /// Serialized token payload for QR display. Only populated for the
    /// meeting owner.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_payload: Option<String>,

    /// Cached count of counted (present) records.
    pub attendance_count: i64,

    /// Actual start time, if the meeting was started.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_start_time: Option<DateTime<Utc>>,

    /// Actual end time, if the meeting ended.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_end_time: Option<DateTime<Utc>>,

    /// Creation timestamp.
    pub created_at: DateTime<Utc>,

    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl From<Meeting> for MeetingResponse {
    fn from(meeting: Meeting) -> Self {
        let token = meeting.token.as_ref().map(|t| TokenInfo {
            redemption_code: t.redemption_code.clone(),
            issued_at: t.issued_at,
            expires_at: t.expires_at,
        });

        Self {
            meeting_id: meeting.id,
            owner_id: meeting.owner_id,
            title: meeting.title,
            location: meeting.location,
            start_time: meeting.start_time,
            end_time: meeting.end_time,
            status: meeting.status,
            roster: meeting.roster,
            policy: meeting.policy,
            token,
            token_payload: None,
            attendance_count: meeting.attendance_count,
            actual_start_time: meeting.actual_start_time,
            actual_end_time: meeting.actual_end_time,
            created_at: meeting.created_at,
            updated_at: meeting.updated_at,
        }
    }
}

/// Request to start a meeting.
///
/// An empty body is accepted; `ttl_minutes` overrides the configured
/// token TTL for this session only.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StartMeetingRequest {
    /// Token lifetime override in minutes (1-1440).
    pub ttl_minutes: Option<i64>,
}

impl StartMeetingRequest {
    /// Validate the request fields.
    ///
    /// # Errors
    ///
    /// Returns an error message if validation fails.
    pub fn validate(&self) -> Result<(), &'static str> {
        if let Some(ttl) = self.ttl_minutes {
            if !(1..=1440).contains(&ttl) {
                return Err("Token TTL must be between 1 and 1440 minutes");
            }
        }

        Ok(())
    }
}

/// Response after starting a meeting.
///
/// The only place the full encoded token payload is handed out besides
/// the owner's meeting view.
#[derive(Debug, Clone, Serialize)]
pub struct StartMeetingResponse {
    /// The updated meeting.
    pub meeting: MeetingResponse,

    /// Serialized token payload for QR display.
    pub token_payload: String,

    /// Redemption code for audit correlation.
    pub redemption_code: String,

    /// Absolute token expiry.
    pub expires_at: DateTime<Utc>,
}

// ============================================================================
// Redemption API Models
// ============================================================================

/// Location evidence attached to a redemption.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeoLocation {
    /// Latitude in degrees.
    pub lat: f64,

    /// Longitude in degrees.
    pub lng: f64,

    /// Reported accuracy in meters (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
}

impl GeoLocation {
    /// Validate coordinate ranges.
    ///
    /// # Errors
    ///
    /// Returns an error message if validation fails.
    pub fn validate(&self) -> Result<(), &'static str> {
        if !(-90.0..=90.0).contains(&self.lat) {
            return Err("Latitude must be between -90 and 90");
        }

        if !(-180.0..=180.0).contains(&self.lng) {
            return Err("Longitude must be between -180 and 180");
        }

        if let Some(accuracy) = self.accuracy {
            if accuracy < 0.0 {
                return Err("Accuracy must not be negative");
            }
        }

        Ok(())
    }
}

/// Request to redeem an attendance token.
///
/// Sent by a participant client after scanning the meeting QR payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RedemptionRequest {
    /// The serialized token payload exactly as scanned.
    pub token_payload: String,

    /// Location evidence (required when the meeting policy demands it).
    pub location: Option<GeoLocation>,

    /// Client device metadata.
    pub device_info: Option<serde_json::Value>,

    /// Set when submitting on behalf of another participant.
    pub proxy_for: Option<ParticipantId>,

    /// Stated reason for a proxy submission.
    pub proxy_reason: Option<String>,
}

impl RedemptionRequest {
    /// Validate the request fields.
    ///
    /// # Errors
    ///
    /// Returns an error message if validation fails.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.token_payload.is_empty() {
            return Err("Token payload is required");
        }

        if let Some(location) = &self.location {
            location.validate()?;
        }

        if self.proxy_for.is_some() && self.proxy_reason.as_deref().map_or(true, str::is_empty) {
            return Err("Proxy submissions require a reason");
        }

        Ok(())
    }
}

/// Response after a successful redemption.
#[derive(Debug, Clone, Serialize)]
pub struct RedemptionResponse {
    /// The created record's identifier.
    pub record_id: RecordId,

    /// Resulting approval state: "pending_approval" or "approved".
    pub status: &'static str,

    /// When the redemption was recorded.
    pub submitted_at: DateTime<Utc>,
}

// ============================================================================
// Review API Models
// ============================================================================

/// Request to check a participant out of a meeting.
///
/// An empty body stamps the current time.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CheckoutRequest {
    /// Explicit checkout time; defaults to now.
    pub check_out_time: Option<DateTime<Utc>>,
}

/// Request to approve a single record with a final status.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApproveRequest {
    /// Final status to record.
    pub final_status: AttendanceStatus,

    /// Reviewer notes (optional).
    pub notes: Option<String>,
}

impl ApproveRequest {
    /// Validate the request fields.
    ///
    /// # Errors
    ///
    /// Returns an error message if validation fails.
    pub fn validate(&self) -> Result<(), &'static str> {
        if let Some(notes) = &self.notes {
            if notes.len() > MAX_NOTES_LENGTH {
                return Err("Notes must be at most 1000 characters");
            }
        }

        Ok(())
    }
}

/// Request to reject a single record.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RejectRequest {
    /// Reason for the rejection (required).
    pub reason: String,
}

impl RejectRequest {
    /// Validate the request fields.
    ///
    /// # Errors
    ///
    /// Returns an error message if validation fails.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.reason.trim().is_empty() {
            return Err("Rejection reason is required");
        }

        if self.reason.len() > MAX_NOTES_LENGTH {
            return Err("Rejection reason must be at most 1000 characters");
        }

        Ok(())
    }
}

/// Request to modify a record's status after review.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModifyRequest {
    /// New status to record.
    pub new_status: AttendanceStatus,

    /// Reviewer notes (optional).
    pub notes: Option<String>,
}

impl ModifyRequest {
    /// Validate the request fields.
    ///
    /// # Errors
    ///
    /// Returns an error message if validation fails.
    pub fn validate(&self) -> Result<(), &'static str> {
        if let Some(notes) = &self.notes {
            if notes.len() > MAX_NOTES_LENGTH {
                return Err("Notes must be at most 1000 characters");
            }
        }

        Ok(())
    }
}

/// Response for a single submission record.
#[derive(Debug, Clone, Serialize)]
pub struct RecordResponse {
    /// Unique record identifier.
    pub record_id: RecordId,

    /// Meeting this record belongs to.
    pub meeting_id: MeetingId,

    /// Participant this record belongs to.
    pub participant_id: ParticipantId,

    /// Attendance status.
    pub status: AttendanceStatus,

    /// Whether the check-in was after the late entry cutoff. Derived,
    /// not stored.
    pub is_late: bool,

    /// When the participant checked in.
    pub check_in_time: DateTime<Utc>,

    /// When the participant checked out.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_out_time: Option<DateTime<Utc>>,

    /// Whether the record awaits reviewer approval.
    pub is_pending_approval: bool,

    /// Whether the record has been approved.
    pub is_approved: bool,

    /// Reviewer who approved the record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<UserId>,

    /// When the record was approved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,

    /// Reviewer who last verified the record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_by: Option<UserId>,

    /// When the record was last verified.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<DateTime<Utc>>,

    /// Reviewer notes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    /// When the redemption was submitted.
    pub submitted_at: DateTime<Utc>,

    /// Whether this was a proxy submission.
    pub is_proxy: bool,

    /// Whether the record is live (not tombstoned).
    pub is_active: bool,
}

impl RecordResponse {
    /// Builds a response from a record and its meeting. The meeting is
    /// needed to derive lateness from the policy cutoff.
    #[must_use]
    pub fn from_parts(record: SubmissionRecord, meeting: &Meeting) -> Self {
        let is_late = record.is_late(meeting);

        Self {
            record_id: record.id,
            meeting_id: record.meeting_id,
            participant_id: record.participant_id,
            status: record.status,
            is_late,
            check_in_time: record.check_in_time,
            check_out_time: record.check_out_time,
            is_pending_approval: record.is_pending_approval,
            is_approved: record.is_approved,
            approved_by: record.approved_by,
            approved_at: record.approved_at,
            verified_by: record.verified_by,
            verified_at: record.verified_at,
            notes: record.notes,
            submitted_at: record.submitted_at,
            is_proxy: record.is_proxy,
            is_active: record.is_active,
        }
    }
}

/// Response listing all attendance records for a meeting.
#[derive(Debug, Clone, Serialize)]
pub struct AttendanceListResponse {
    /// Meeting identifier.
    pub meeting_id: MeetingId,

    /// Cached count of counted (present) records.
    pub attendance_count: i64,

    /// All live records for the meeting.
    pub records: Vec<RecordResponse>,
}

/// Response after a bulk approval pass.
#[derive(Debug, Clone, Serialize)]
pub struct BulkApproveResponse {
    /// Meeting identifier.
    pub meeting_id: MeetingId,

    /// Roster participants who had no record; one was created.
    pub created: usize,

    /// Pending records promoted to approved-present.
    pub approved: usize,

    /// Records left alone (already reviewed or tombstoned).
    pub untouched: usize,

    /// Recomputed attendance count after the pass.
    pub attendance_count: i64,
}

/// One scan entry in the redemption log response.
#[derive(Debug, Clone, Serialize)]
pub struct ScanEntry {
    /// Participant who scanned.
    pub participant_id: ParticipantId,

    /// When the scan happened.
    pub scanned_at: DateTime<Utc>,

    /// Whether the scan passed all redemption checks.
    pub is_valid: bool,

    /// Rejection reason for invalid scans.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invalid_reason: Option<String>,

    /// Device metadata supplied by the client.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_info: Option<serde_json::Value>,

    /// Location evidence supplied by the client.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<serde_json::Value>,
}

impl From<RedemptionScan> for ScanEntry {
    fn from(scan: RedemptionScan) -> Self {
        Self {
            participant_id: scan.participant_id,
            scanned_at: scan.scanned_at,
            is_valid: scan.is_valid,
            invalid_reason: scan.invalid_reason,
            device_info: scan.device_info,
            location: scan.location,
        }
    }
}

/// Response for the health endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// "healthy" or "unhealthy".
    pub status: &'static str,

    /// Region this instance serves.
    pub region: String,

    /// Storage backend health, when checked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<&'static str>,
}

/// Response for a meeting's redemption log.
#[derive(Debug, Clone, Serialize)]
pub struct RedemptionLogResponse {
    /// Meeting identifier.
    pub meeting_id: MeetingId,

    /// The token's redemption code.
    pub redemption_code: String,

    /// User who issued the token.
    pub issuer_id: UserId,

    /// Whether the token is still live.
    pub is_active: bool,

    /// When the log was created.
    pub created_at: DateTime<Utc>,

    /// When the log was deactivated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deactivated_at: Option<DateTime<Utc>>,

    /// All scan entries, oldest first.
    pub scans: Vec<ScanEntry>,
}
