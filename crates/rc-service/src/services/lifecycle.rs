//! Meeting lifecycle service.
//!
//! Drives the meeting state machine:
//! `scheduled -(Start)-> active -(End)-> completed`, with cancellation
//! allowed from `scheduled` or `active` and postponement from
//! `scheduled` only. Start issues the attendance token and opens the
//! redemption log; End and Cancel deactivate both.
//!
//! # Security
//!
//! - Lifecycle mutations are gated to the meeting owner or an admin
//!   and fail `Forbidden` before any state change
//! - Redemption codes come from a CSPRNG
//! - Concurrent Start calls race on a conditional transition in
//!   storage, so exactly one caller issues a token

use crate::errors::RcError;
use crate::models::{
    ActiveToken, Actor, CreateMeetingRequest, Meeting, NewMeeting, RedemptionLog, RedemptionScan,
};
use crate::repositories::AttendanceRepository;
use crate::token::{IssuedToken, TokenCodec};
use chrono::Utc;
use common::types::{MeetingId, ParticipantId, UserId};
use ring::rand::{SecureRandom, SystemRandom};
use std::collections::HashSet;
use tracing::instrument;

/// Base62 alphabet for redemption codes.
const BASE62_CHARS: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Length of generated redemption codes.
const REDEMPTION_CODE_LENGTH: usize = 12;

/// Largest multiple of 62 that fits in a byte. Random bytes at or
/// above this bound are discarded so every alphabet character is
/// equally likely.
const BASE62_REJECTION_BOUND: u8 = 248;

/// Service for meeting lifecycle operations.
pub struct MeetingLifecycleService;

impl MeetingLifecycleService {
    /// Create a meeting in `scheduled` status.
    ///
    /// Duplicate roster entries are collapsed, keeping first-seen order.
    ///
    /// # Arguments
    ///
    /// * `repo` - Attendance storage
    /// * `owner_id` - User who will own and review the meeting
    /// * `request` - Validated creation request
    #[instrument(skip_all, fields(owner_id = %owner_id))]
    pub async fn create_meeting(
        repo: &dyn AttendanceRepository,
        owner_id: UserId,
        request: CreateMeetingRequest,
    ) -> Result<Meeting, RcError> {
        let policy = request.policy();

        let mut roster: Vec<ParticipantId> = Vec::new();
        let mut seen: HashSet<ParticipantId> = HashSet::new();
        for participant in request.roster.unwrap_or_default() {
            if seen.insert(participant) {
                roster.push(participant);
            }
        }

        let meeting = repo
            .create_meeting(NewMeeting {
                id: MeetingId::new(),
                owner_id,
                title: request.title.trim().to_string(),
                location: request.location,
                start_time: request.start_time,
                end_time: request.end_time,
                roster,
                policy,
            })
            .await?;

        tracing::info!(
            target: "rc.services.lifecycle",
            meeting_id = %meeting.id,
            owner_id = %owner_id,
            roster_size = meeting.roster.len(),
            "Meeting created"
        );

        Ok(meeting)
    }

    /// Fetch a meeting, failing `MeetingNotFound` when absent.
    pub async fn get_meeting(
        repo: &dyn AttendanceRepository,
        meeting_id: MeetingId,
    ) -> Result<Meeting, RcError> {
        repo.get_meeting(meeting_id)
            .await?
            .ok_or_else(|| RcError::MeetingNotFound(format!("Meeting {meeting_id} not found")))
    }

    /// Start a meeting: transition `scheduled` -> `active`, issue the
    /// attendance token, and open the redemption log.
    ///
    /// The transition is conditional in storage; when two Start calls
    /// race, one wins and the other observes `InvalidTransition`.
    ///
    /// # Errors
    ///
    /// - `MeetingNotFound` - no such meeting
    /// - `Forbidden` - caller is neither the owner nor an admin
    /// - `InvalidTransition` - meeting is not `scheduled`
    #[instrument(skip_all, fields(meeting_id = %meeting_id, actor_id = %actor.id))]
    pub async fn start_meeting(
        repo: &dyn AttendanceRepository,
        codec: &TokenCodec,
        token_ttl_minutes: i64,
        meeting_id: MeetingId,
        actor: Actor,
    ) -> Result<(Meeting, IssuedToken), RcError> {
        let meeting = Self::get_meeting(repo, meeting_id).await?;
        if !actor.can_review(meeting.owner_id) {
            return Err(RcError::Forbidden(
                "Only the meeting owner or an admin can start it".to_string(),
            ));
        }

        let redemption_code = generate_redemption_code()?;
        let issued = codec.issue(&meeting, token_ttl_minutes);
        let token = ActiveToken {
            redemption_code,
            issued_at: issued.payload.issued_at,
            expires_at: issued.payload.expires_at,
            checksum: issued.payload.checksum.clone(),
        };

        match repo
            .activate_meeting(meeting_id, &token, actor.id, Utc::now())
            .await?
        {
            Some(updated) => {
                tracing::info!(
                    target: "rc.services.lifecycle",
                    meeting_id = %meeting_id,
                    redemption_code = %token.redemption_code,
                    expires_at = %token.expires_at,
                    "Meeting started, token issued"
                );
                Ok((updated, issued))
            }
            None => Err(Self::transition_rejection(repo, meeting_id, "scheduled").await?),
        }
    }

    /// End a meeting: transition `active` -> `completed`, clear the
    /// token, and deactivate the redemption log.
    #[instrument(skip_all, fields(meeting_id = %meeting_id, actor_id = %actor.id))]
    pub async fn end_meeting(
        repo: &dyn AttendanceRepository,
        meeting_id: MeetingId,
        actor: Actor,
    ) -> Result<Meeting, RcError> {
        let meeting = Self::get_meeting(repo, meeting_id).await?;
        if !actor.can_review(meeting.owner_id) {
            return Err(RcError::Forbidden(
                "Only the meeting owner or an admin can end it".to_string(),
            ));
        }

        match repo.complete_meeting(meeting_id, Utc::now()).await? {
            Some(updated) => {
                tracing::info!(
                    target: "rc.services.lifecycle",
                    meeting_id = %meeting_id,
                    attendance_count = updated.attendance_count,
                    "Meeting completed"
                );
                Ok(updated)
            }
            None => Err(Self::transition_rejection(repo, meeting_id, "active").await?),
        }
    }

    /// Cancel a meeting from `scheduled` or `active`.
    #[instrument(skip_all, fields(meeting_id = %meeting_id, actor_id = %actor.id))]
    pub async fn cancel_meeting(
        repo: &dyn AttendanceRepository,
        meeting_id: MeetingId,
        actor: Actor,
    ) -> Result<Meeting, RcError> {
        let meeting = Self::get_meeting(repo, meeting_id).await?;
        if !actor.can_review(meeting.owner_id) {
            return Err(RcError::Forbidden(
                "Only the meeting owner or an admin can cancel it".to_string(),
            ));
        }

        match repo.cancel_meeting(meeting_id, Utc::now()).await? {
            Some(updated) => {
                tracing::info!(
                    target: "rc.services.lifecycle",
                    meeting_id = %meeting_id,
                    "Meeting cancelled"
                );
                Ok(updated)
            }
            None => Err(Self::transition_rejection(repo, meeting_id, "scheduled or active").await?),
        }
    }

    /// Postpone a meeting from `scheduled`.
    #[instrument(skip_all, fields(meeting_id = %meeting_id, actor_id = %actor.id))]
    pub async fn postpone_meeting(
        repo: &dyn AttendanceRepository,
        meeting_id: MeetingId,
        actor: Actor,
    ) -> Result<Meeting, RcError> {
        let meeting = Self::get_meeting(repo, meeting_id).await?;
        if !actor.can_review(meeting.owner_id) {
            return Err(RcError::Forbidden(
                "Only the meeting owner or an admin can postpone it".to_string(),
            ));
        }

        match repo.postpone_meeting(meeting_id).await? {
            Some(updated) => {
                tracing::info!(
                    target: "rc.services.lifecycle",
                    meeting_id = %meeting_id,
                    "Meeting postponed"
                );
                Ok(updated)
            }
            None => Err(Self::transition_rejection(repo, meeting_id, "scheduled").await?),
        }
    }

    /// Rebuild the wire payload for a meeting's stored token.
    ///
    /// Issuance is deterministic given the stored instants, so the
    /// owner can re-display the QR payload without the service keeping
    /// the encoded form around.
    #[must_use]
    pub fn token_payload_for_owner(codec: &TokenCodec, meeting: &Meeting) -> Option<String> {
        meeting
            .token
            .as_ref()
            .map(|token| codec.issue_at(meeting, token.issued_at, token.expires_at).encoded)
    }

    /// Fetch the redemption log for a meeting, gated to the owner or an
    /// admin.
    ///
    /// # Errors
    ///
    /// - `MeetingNotFound` - no such meeting
    /// - `Forbidden` - caller is neither the owner nor an admin
    /// - `NotFound` - the meeting was never started
    #[instrument(skip_all, fields(meeting_id = %meeting_id, actor_id = %actor.id))]
    pub async fn get_redemption_log(
        repo: &dyn AttendanceRepository,
        meeting_id: MeetingId,
        actor: Actor,
    ) -> Result<(RedemptionLog, Vec<RedemptionScan>), RcError> {
        let meeting = Self::get_meeting(repo, meeting_id).await?;
        if !actor.can_review(meeting.owner_id) {
            return Err(RcError::Forbidden(
                "Only the meeting owner or an admin can view the redemption log".to_string(),
            ));
        }

        repo.get_redemption_log(meeting_id)
            .await?
            .ok_or_else(|| RcError::NotFound(format!("Meeting {meeting_id} has no redemption log")))
    }

    /// Resolve why a conditional transition returned no row: the
    /// meeting either disappeared or sits in a status the transition
    /// does not accept.
    async fn transition_rejection(
        repo: &dyn AttendanceRepository,
        meeting_id: MeetingId,
        expected: &str,
    ) -> Result<RcError, RcError> {
        match repo.get_meeting(meeting_id).await? {
            Some(current) => Ok(RcError::InvalidTransition(format!(
                "Meeting {meeting_id} is {}, expected {expected}",
                current.status.as_str()
            ))),
            None => Ok(RcError::MeetingNotFound(format!(
                "Meeting {meeting_id} not found"
            ))),
        }
    }
}

/// Generate a cryptographically secure redemption code.
///
/// Produces 12 base62 characters (~71 bits of entropy) from the
/// CSPRNG. Each character is drawn by rejection sampling: bytes at or
/// above [`BASE62_REJECTION_BOUND`] are discarded before the modulo,
/// so the alphabet is sampled uniformly.
fn generate_redemption_code() -> Result<String, RcError> {
    let rng = SystemRandom::new();
    let mut code = Vec::with_capacity(REDEMPTION_CODE_LENGTH);
    // ~12.4 accepted bytes needed on average, so one refill is rare.
    let mut buf = [0u8; 16];

    while code.len() < REDEMPTION_CODE_LENGTH {
        rng.fill(&mut buf).map_err(|_| {
            tracing::error!(target: "rc.services.lifecycle", "Failed to generate random bytes for redemption code");
            RcError::Internal
        })?;

        for &b in &buf {
            if code.len() == REDEMPTION_CODE_LENGTH {
                break;
            }
            if b >= BASE62_REJECTION_BOUND {
                continue;
            }
            let ch = BASE62_CHARS.get(usize::from(b % 62)).ok_or(RcError::Internal)?;
            code.push(*ch);
        }
    }

    String::from_utf8(code).map_err(|_| RcError::Internal)
}
