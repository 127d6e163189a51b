//! Attendance token payload codec.
//!
//! Implements the checksum-protected token payloads displayed as meeting
//! QR codes and redeemed by participants:
//!
//! - **Checksum**: `HMAC-SHA256(meeting_key, canonical_fields)` hex-encoded
//! - **Key derivation**: `HKDF-SHA256(master_secret, salt=meeting_id, info="attendance-token")`
//! - **Wire format**: URL-safe unpadded base64 over canonical JSON
//! - **Verification**: Constant-time comparison via `ring::hmac::verify`
//!
//! The canonical form is the sorted `key=value` lines of every payload
//! field except the checksum itself, so any field change invalidates the
//! checksum. The checksum defends against corruption and naive tampering;
//! it is keyed so a payload cannot be minted without the master secret,
//! but it is not a substitute for transport security.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use common::types::MeetingId;
use ring::{hkdf, hmac};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::models::Meeting;

/// Required value of the payload `type` field.
pub const TOKEN_TYPE: &str = "attendance_session";

/// Maximum accepted serialized payload size in bytes. Checked before any
/// decoding work.
pub const MAX_PAYLOAD_BYTES: usize = 8192;

/// HKDF info string binding derived keys to this codec.
const TOKEN_KEY_INFO: &[u8] = b"attendance-token";

/// Token codec errors.
///
/// Ordered by verification stage: a payload that fails parsing never
/// reaches the checksum check, and a payload that fails the checksum
/// check never reaches the expiry check.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Malformed payload: {0}")]
    Malformed(String),

    #[error("Checksum mismatch")]
    ChecksumMismatch,

    #[error("Token expired for meeting {meeting_id}")]
    Expired { meeting_id: String },
}

/// The token payload serialized into the meeting QR code.
///
/// All fields participate in the checksum except `checksum` itself,
/// which is always computed last over the others.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenPayload {
    /// Payload discriminator, always `attendance_session`.
    #[serde(rename = "type")]
    pub token_type: String,

    /// Meeting this token belongs to.
    pub meeting_id: MeetingId,

    /// Meeting display title.
    pub title: String,

    /// Scheduled start time.
    pub start_time: DateTime<Utc>,

    /// Scheduled end time.
    pub end_time: DateTime<Utc>,

    /// Free-form location description, omitted when the meeting has none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    /// When the token was issued.
    pub issued_at: DateTime<Utc>,

    /// Absolute expiry instant.
    pub expires_at: DateTime<Utc>,

    /// Keyed checksum over the canonical form of the other fields.
    pub checksum: String,
}

impl TokenPayload {
    /// Builds the canonical form the checksum is computed over: sorted
    /// `key=value` lines of every field except the checksum.
    #[must_use]
    pub fn canonical_string(&self) -> String {
        let mut fields: BTreeMap<&str, String> = BTreeMap::new();

        fields.insert("type", self.token_type.clone());
        fields.insert("meeting_id", self.meeting_id.to_string());
        fields.insert("title", self.title.clone());
        fields.insert("start_time", canonical_timestamp(self.start_time));
        fields.insert("end_time", canonical_timestamp(self.end_time));
        if let Some(location) = &self.location {
            fields.insert("location", location.clone());
        }
        fields.insert("issued_at", canonical_timestamp(self.issued_at));
        fields.insert("expires_at", canonical_timestamp(self.expires_at));

        fields
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A freshly issued token: the typed payload plus its wire encoding.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// The payload with its checksum populated.
    pub payload: TokenPayload,

    /// URL-safe unpadded base64 over the payload JSON.
    pub encoded: String,
}

/// Issues and verifies attendance token payloads.
///
/// Checksums are keyed per meeting: the meeting key is derived from the
/// service master secret with the meeting ID as HKDF salt, so a token
/// for one meeting can never validate against another.
pub struct TokenCodec {
    /// Master secret for HKDF key derivation.
    master_secret: Vec<u8>,
}

impl TokenCodec {
    /// Create a new token codec with the given master secret.
    ///
    /// # Arguments
    ///
    /// * `master_secret` - Must be at least 32 bytes for security.
    ///
    /// # Panics
    ///
    /// Panics if master_secret is less than 32 bytes (security requirement).
    #[must_use]
    pub fn new(master_secret: Vec<u8>) -> Self {
        assert!(
            master_secret.len() >= 32,
            "Master secret must be at least 32 bytes"
        );
        Self { master_secret }
    }

    /// Issue a token for an active meeting, expiring `ttl_minutes` from now.
    #[must_use]
    pub fn issue(&self, meeting: &Meeting, ttl_minutes: i64) -> IssuedToken {
        let issued_at = Utc::now();
        let expires_at = issued_at + Duration::minutes(ttl_minutes);
        self.issue_at(meeting, issued_at, expires_at)
    }

    /// Issue a token with explicit issue and expiry instants.
    ///
    /// Deterministic: the same meeting and instants always produce the
    /// same payload and encoding. Used to rebuild the QR payload for a
    /// meeting whose token material is already persisted.
    #[must_use]
    pub fn issue_at(
        &self,
        meeting: &Meeting,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> IssuedToken {
        let mut payload = TokenPayload {
            token_type: TOKEN_TYPE.to_string(),
            meeting_id: meeting.id,
            title: meeting.title.clone(),
            start_time: meeting.start_time,
            end_time: meeting.end_time,
            location: meeting.location.clone(),
            issued_at,
            expires_at,
            checksum: String::new(),
        };

        payload.checksum = self.compute_checksum(&payload);
        let encoded = encode_payload(&payload);

        IssuedToken { payload, encoded }
    }

    /// Verify a raw payload against the current time.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Malformed` if the payload cannot be decoded
    /// or parsed, `TokenError::ChecksumMismatch` if any field fails the
    /// integrity check, and `TokenError::Expired` if the (authenticated)
    /// expiry has passed.
    pub fn verify(&self, raw: &str) -> Result<TokenPayload, TokenError> {
        self.verify_at(raw, Utc::now())
    }

    /// Verify a raw payload against an explicit instant.
    ///
    /// The checks run in a fixed order: size, decoding, parsing, field
    /// integrity, then expiry. Expiry is checked last so the verdict is
    /// based on an authenticated `expires_at`, not an attacker-supplied
    /// one.
    ///
    /// # Errors
    ///
    /// See [`TokenCodec::verify`].
    pub fn verify_at(&self, raw: &str, now: DateTime<Utc>) -> Result<TokenPayload, TokenError> {
        if raw.len() > MAX_PAYLOAD_BYTES {
            return Err(TokenError::Malformed(format!(
                "payload exceeds maximum size of {MAX_PAYLOAD_BYTES} bytes"
            )));
        }

        let decoded = URL_SAFE_NO_PAD
            .decode(raw.trim())
            .map_err(|e| TokenError::Malformed(format!("invalid base64 encoding: {e}")))?;

        let payload: TokenPayload = serde_json::from_slice(&decoded)
            .map_err(|e| TokenError::Malformed(format!("invalid payload structure: {e}")))?;

        if payload.token_type != TOKEN_TYPE {
            return Err(TokenError::Malformed(format!(
                "unexpected payload type '{}'",
                payload.token_type
            )));
        }

        // Recompute the checksum over everything except the checksum
        // field and compare in constant time.
        let meeting_key = self.derive_meeting_key(payload.meeting_id);
        let hmac_key = hmac::Key::new(hmac::HMAC_SHA256, &meeting_key);
        let provided = hex::decode(&payload.checksum).map_err(|_| TokenError::ChecksumMismatch)?;

        hmac::verify(
            &hmac_key,
            payload.canonical_string().as_bytes(),
            &provided,
        )
        .map_err(|_| TokenError::ChecksumMismatch)?;

        if now > payload.expires_at {
            return Err(TokenError::Expired {
                meeting_id: payload.meeting_id.to_string(),
            });
        }

        Ok(payload)
    }

    /// Compute the hex-encoded checksum for a payload.
    fn compute_checksum(&self, payload: &TokenPayload) -> String {
        let meeting_key = self.derive_meeting_key(payload.meeting_id);
        let hmac_key = hmac::Key::new(hmac::HMAC_SHA256, &meeting_key);
        let tag = hmac::sign(&hmac_key, payload.canonical_string().as_bytes());
        hex::encode(tag.as_ref())
    }

    /// Derive a meeting-specific key using HKDF-SHA256.
    ///
    /// ```text
    /// meeting_key = HKDF-SHA256(
    ///     ikm: master_secret,
    ///     salt: meeting_id,
    ///     info: b"attendance-token"
    /// )
    /// ```
    ///
    /// The expect() calls here are unreachable invariants:
    /// - HKDF expand with fixed info and 32-byte output cannot fail
    /// - fill() with matching array size cannot fail
    #[allow(clippy::expect_used)]
    fn derive_meeting_key(&self, meeting_id: MeetingId) -> [u8; 32] {
        let meeting_id = meeting_id.to_string();
        let salt = hkdf::Salt::new(hkdf::HKDF_SHA256, meeting_id.as_bytes());
        let prk = salt.extract(&self.master_secret);
        let okm = prk
            .expand(&[TOKEN_KEY_INFO], TokenKeyLen)
            .expect("HKDF expand with fixed info and 32-byte output cannot fail");

        let mut key = [0u8; 32];
        okm.fill(&mut key)
            .expect("fill with matching array size cannot fail");
        key
    }
}

/// HKDF output key length for meeting token keys.
struct TokenKeyLen;

impl hkdf::KeyType for TokenKeyLen {
    fn len(&self) -> usize {
        32
    }
}

/// Fixed-precision timestamp format for the canonical form. Microsecond
/// precision matches what the storage layer retains, so a payload round
/// trip through JSON always reproduces the same canonical string.
fn canonical_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Encode a payload into its wire form.
///
/// The expect() here is an unreachable invariant: JSON serialization of
/// a struct with only string and timestamp fields cannot fail.
#[allow(clippy::expect_used)]
fn encode_payload(payload: &TokenPayload) -> String {
    let json = serde_json::to_vec(payload)
        .expect("JSON serialization of a plain payload struct cannot fail");
    URL_SAFE_NO_PAD.encode(json)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::models::{AttendancePolicy, MeetingStatus};
    use common::types::UserId;

    const TEST_MASTER_KEY: [u8; 32] = [7u8; 32];

    fn test_codec() -> TokenCodec {
        TokenCodec::new(TEST_MASTER_KEY.to_vec())
    }

    fn test_meeting() -> Meeting {
        let start = DateTime::parse_from_rfc3339("2026-03-01T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        Meeting {
            id: MeetingId::new(),
            owner_id: UserId::new(),
            title: "Weekly Seminar".to_string(),
            location: Some("Room 204".to_string()),
            start_time: start,
            end_time: start + Duration::hours(1),
            status: MeetingStatus::Active,
            roster: Vec::new(),
            policy: AttendancePolicy::default(),
            token: None,
            attendance_count: 0,
            actual_start_time: None,
            actual_end_time: None,
            created_at: start,
            updated_at: start,
        }
    }

    /// Decode a wire payload into a JSON value for tampering.
    fn decode_json(encoded: &str) -> serde_json::Value {
        let bytes = URL_SAFE_NO_PAD.decode(encoded).unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    /// Re-encode a (possibly tampered) JSON value into wire form.
    fn encode_json(value: &serde_json::Value) -> String {
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(value).unwrap())
    }

    #[test]
    fn test_issue_populates_checksum_and_expiry() {
        let codec = test_codec();
        let meeting = test_meeting();

        let issued = codec.issue(&meeting, 30);

        assert_eq!(issued.payload.token_type, TOKEN_TYPE);
        assert_eq!(issued.payload.meeting_id, meeting.id);
        assert!(!issued.payload.checksum.is_empty());
        assert_eq!(
            issued.payload.expires_at - issued.payload.issued_at,
            Duration::minutes(30)
        );
    }

    #[test]
    fn test_issue_at_is_deterministic() {
        let codec = test_codec();
        let meeting = test_meeting();
        let issued_at = meeting.start_time;
        let expires_at = issued_at + Duration::minutes(30);

        let first = codec.issue_at(&meeting, issued_at, expires_at);
        let second = codec.issue_at(&meeting, issued_at, expires_at);

        assert_eq!(first.payload, second.payload);
        assert_eq!(first.encoded, second.encoded);
    }

    #[test]
    fn test_round_trip_verifies() {
        let codec = test_codec();
        let meeting = test_meeting();

        let issued = codec.issue(&meeting, 30);
        let verified = codec
            .verify_at(&issued.encoded, issued.payload.issued_at)
            .expect("freshly issued token should verify");

        assert_eq!(verified, issued.payload);
    }

    #[test]
    fn test_canonical_string_is_sorted_and_excludes_checksum() {
        let codec = test_codec();
        let meeting = test_meeting();

        let issued = codec.issue(&meeting, 30);
        let canonical = issued.payload.canonical_string();

        let keys: Vec<&str> = canonical
            .lines()
            .map(|line| line.split_once('=').expect("key=value line").0)
            .collect();

        let mut sorted = keys.clone();
        sorted.sort_unstable();
        assert_eq!(keys, sorted, "canonical keys must be sorted");
        assert!(!keys.contains(&"checksum"));
        assert!(keys.contains(&"type"));
        assert!(keys.contains(&"location"));
    }

    #[test]
    fn test_canonical_string_omits_absent_location() {
        let codec = test_codec();
        let mut meeting = test_meeting();
        meeting.location = None;

        let issued = codec.issue(&meeting, 30);
        let canonical = issued.payload.canonical_string();

        assert!(!canonical.contains("location="));
    }

    #[test]
    fn test_verify_rejects_oversized_payload() {
        let codec = test_codec();
        let raw = "A".repeat(MAX_PAYLOAD_BYTES + 1);

        let result = codec.verify_at(&raw, Utc::now());
        assert!(
            matches!(result, Err(TokenError::Malformed(msg)) if msg.contains("maximum size"))
        );
    }

    #[test]
    fn test_verify_rejects_invalid_base64() {
        let codec = test_codec();

        let result = codec.verify_at("!!!not-base64!!!", Utc::now());
        assert!(matches!(result, Err(TokenError::Malformed(msg)) if msg.contains("base64")));
    }

    #[test]
    fn test_verify_rejects_non_json_payload() {
        let codec = test_codec();
        let raw = URL_SAFE_NO_PAD.encode(b"definitely not json");

        let result = codec.verify_at(&raw, Utc::now());
        assert!(matches!(result, Err(TokenError::Malformed(_))));
    }

    #[test]
    fn test_verify_rejects_missing_checksum_field() {
        let codec = test_codec();
        let meeting = test_meeting();
        let issued = codec.issue(&meeting, 30);

        let mut value = decode_json(&issued.encoded);
        value.as_object_mut().unwrap().remove("checksum");

        let result = codec.verify_at(&encode_json(&value), Utc::now());
        assert!(matches!(result, Err(TokenError::Malformed(_))));
    }

    #[test]
    fn test_verify_rejects_unknown_fields() {
        let codec = test_codec();
        let meeting = test_meeting();
        let issued = codec.issue(&meeting, 30);

        let mut value = decode_json(&issued.encoded);
        value
            .as_object_mut()
            .unwrap()
            .insert("bonus".to_string(), serde_json::json!(true));

        let result = codec.verify_at(&encode_json(&value), Utc::now());
        assert!(matches!(result, Err(TokenError::Malformed(_))));
    }

    #[test]
    fn test_verify_rejects_wrong_type() {
        let codec = test_codec();
        let meeting = test_meeting();
        let issued = codec.issue(&meeting, 30);

        let mut value = decode_json(&issued.encoded);
        value
            .as_object_mut()
            .unwrap()
            .insert("type".to_string(), serde_json::json!("lunch_order"));

        let result = codec.verify_at(&encode_json(&value), issued.payload.issued_at);
        assert!(
            matches!(result, Err(TokenError::Malformed(msg)) if msg.contains("unexpected payload type"))
        );
    }

    #[test]
    fn test_tampered_title_fails_checksum() {
        let codec = test_codec();
        let meeting = test_meeting();
        let issued = codec.issue(&meeting, 30);

        let mut value = decode_json(&issued.encoded);
        value
            .as_object_mut()
            .unwrap()
            .insert("title".to_string(), serde_json::json!("Other Seminar"));

        let result = codec.verify_at(&encode_json(&value), issued.payload.issued_at);
        assert!(matches!(result, Err(TokenError::ChecksumMismatch)));
    }

    #[test]
    fn test_tampered_expiry_fails_checksum_before_expiry_check() {
        let codec = test_codec();
        let meeting = test_meeting();
        let issued = codec.issue(&meeting, 30);

        // Push the expiry far into the future; the checksum no longer
        // matches, so the extension is rejected as tampering.
        let mut value = decode_json(&issued.encoded);
        value.as_object_mut().unwrap().insert(
            "expires_at".to_string(),
            serde_json::json!("2099-01-01T00:00:00Z"),
        );

        let result = codec.verify_at(&encode_json(&value), issued.payload.issued_at);
        assert!(matches!(result, Err(TokenError::ChecksumMismatch)));
    }

    #[test]
    fn test_tampered_meeting_id_fails_checksum() {
        let codec = test_codec();
        let meeting = test_meeting();
        let issued = codec.issue(&meeting, 30);

        let mut value = decode_json(&issued.encoded);
        value.as_object_mut().unwrap().insert(
            "meeting_id".to_string(),
            serde_json::json!(MeetingId::new().to_string()),
        );

        let result = codec.verify_at(&encode_json(&value), issued.payload.issued_at);
        assert!(matches!(result, Err(TokenError::ChecksumMismatch)));
    }

    #[test]
    fn test_expired_token_reports_meeting_id() {
        let codec = test_codec();
        let meeting = test_meeting();
        let issued_at = meeting.start_time;
        let expires_at = issued_at + Duration::minutes(30);

        let issued = codec.issue_at(&meeting, issued_at, expires_at);
        let result = codec.verify_at(&issued.encoded, expires_at + Duration::seconds(1));

        match result {
            Err(TokenError::Expired { meeting_id }) => {
                assert_eq!(meeting_id, meeting.id.to_string());
            }
            other => panic!("expected Expired, got {other:?}"),
        }
    }

    #[test]
    fn test_verify_accepts_token_at_exact_expiry() {
        let codec = test_codec();
        let meeting = test_meeting();
        let issued_at = meeting.start_time;
        let expires_at = issued_at + Duration::minutes(30);

        let issued = codec.issue_at(&meeting, issued_at, expires_at);

        // `now == expires_at` is still within the validity window
        assert!(codec.verify_at(&issued.encoded, expires_at).is_ok());
    }

    #[test]
    fn test_checksum_is_keyed_per_master_secret() {
        let meeting = test_meeting();
        let issued = test_codec().issue(&meeting, 30);

        let other_codec = TokenCodec::new([9u8; 32].to_vec());
        let result = other_codec.verify_at(&issued.encoded, issued.payload.issued_at);

        assert!(matches!(result, Err(TokenError::ChecksumMismatch)));
    }

    #[test]
    fn test_checksum_is_keyed_per_meeting() {
        let codec = test_codec();
        let meeting_a = test_meeting();
        let mut meeting_b = test_meeting();
        // Same fields apart from the ID
        meeting_b.title = meeting_a.title.clone();

        let key_a = codec.derive_meeting_key(meeting_a.id);
        let key_b = codec.derive_meeting_key(meeting_b.id);

        assert_ne!(key_a, key_b);
    }

    #[test]
    #[should_panic(expected = "at least 32 bytes")]
    fn test_codec_rejects_short_master_secret() {
        let _ = TokenCodec::new(vec![1u8; 16]);
    }
}
