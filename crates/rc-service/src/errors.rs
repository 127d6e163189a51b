//! Roster Controller error types.
//!
//! All errors map to appropriate HTTP status codes via the `IntoResponse` impl.
//! Business outcomes (expired token, duplicate submission, bad transition) are
//! returned verbatim to the requester as typed kinds. Storage failures are
//! logged server-side and surfaced with a generic message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::token::TokenError;

/// Roster Controller error type.
///
/// Maps to appropriate HTTP status codes:
/// - MalformedPayload, ChecksumMismatch, BadRequest: 400 Bad Request
/// - InvalidActor: 401 Unauthorized
/// - NotEnrolled, LateEntryNotAllowed, Forbidden: 403 Forbidden
/// - MeetingNotFound, NotFound: 404 Not Found
/// - SessionNotActive, AlreadySubmitted, AlreadyCheckedOut,
///   InvalidTransition: 409 Conflict
/// - Expired: 410 Gone
/// - Database, Internal: 500 Internal Server Error
#[derive(Debug, Error)]
pub enum RcError {
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Checksum mismatch")]
    ChecksumMismatch,

    #[error("Token expired: {0}")]
    Expired(String),

    #[error("Meeting not found: {0}")]
    MeetingNotFound(String),

    #[error("Session not active: {0}")]
    SessionNotActive(String),

    #[error("Not enrolled: {0}")]
    NotEnrolled(String),

    #[error("Already submitted: {0}")]
    AlreadySubmitted(String),

    #[error("Late entry not allowed: {0}")]
    LateEntryNotAllowed(String),

    #[error("Already checked out: {0}")]
    AlreadyCheckedOut(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid actor: {0}")]
    InvalidActor(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error")]
    Internal,
}

impl RcError {
    /// Returns the HTTP status code for this error (for metrics recording).
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            RcError::MalformedPayload(_) | RcError::ChecksumMismatch | RcError::BadRequest(_) => {
                400
            }
            RcError::InvalidActor(_) => 401,
            RcError::NotEnrolled(_) | RcError::LateEntryNotAllowed(_) | RcError::Forbidden(_) => {
                403
            }
            RcError::MeetingNotFound(_) | RcError::NotFound(_) => 404,
            RcError::SessionNotActive(_)
            | RcError::AlreadySubmitted(_)
            | RcError::AlreadyCheckedOut(_)
            | RcError::InvalidTransition(_) => 409,
            RcError::Expired(_) => 410,
            RcError::Database(_) | RcError::Internal => 500,
        }
    }

    /// Returns the stable error kind string used in responses and metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            RcError::MalformedPayload(_) => "MALFORMED_PAYLOAD",
            RcError::ChecksumMismatch => "CHECKSUM_MISMATCH",
            RcError::Expired(_) => "EXPIRED",
            RcError::MeetingNotFound(_) => "MEETING_NOT_FOUND",
            RcError::SessionNotActive(_) => "SESSION_NOT_ACTIVE",
            RcError::NotEnrolled(_) => "NOT_ENROLLED",
            RcError::AlreadySubmitted(_) => "ALREADY_SUBMITTED",
            RcError::LateEntryNotAllowed(_) => "LATE_ENTRY_NOT_ALLOWED",
            RcError::AlreadyCheckedOut(_) => "ALREADY_CHECKED_OUT",
            RcError::InvalidTransition(_) => "INVALID_TRANSITION",
            RcError::Forbidden(_) => "FORBIDDEN",
            RcError::NotFound(_) => "NOT_FOUND",
            RcError::InvalidActor(_) => "INVALID_ACTOR",
            RcError::BadRequest(_) => "BAD_REQUEST",
            RcError::Database(_) => "DATABASE_ERROR",
            RcError::Internal => "INTERNAL_ERROR",
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for RcError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let code = self.kind();

        let message = match &self {
            RcError::Database(err) => {
                // Log actual error server-side, return generic message to client
                tracing::error!(target: "rc.database", error = %err, "Database operation failed");
                "An internal database error occurred".to_string()
            }
            RcError::Internal => "An internal error occurred".to_string(),
            RcError::ChecksumMismatch => "Token integrity check failed".to_string(),
            RcError::MalformedPayload(reason) => reason.clone(),
            RcError::Expired(reason) => reason.clone(),
            RcError::MeetingNotFound(reason) => reason.clone(),
            RcError::SessionNotActive(reason) => reason.clone(),
            RcError::NotEnrolled(reason) => reason.clone(),
            RcError::AlreadySubmitted(reason) => reason.clone(),
            RcError::LateEntryNotAllowed(reason) => reason.clone(),
            RcError::AlreadyCheckedOut(reason) => reason.clone(),
            RcError::InvalidTransition(reason) => reason.clone(),
            RcError::Forbidden(reason) => reason.clone(),
            RcError::NotFound(reason) => reason.clone(),
            RcError::InvalidActor(reason) => reason.clone(),
            RcError::BadRequest(reason) => reason.clone(),
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        (status, Json(error_response)).into_response()
    }
}

/// Convert sqlx errors to RcError
impl From<sqlx::Error> for RcError {
    fn from(err: sqlx::Error) -> Self {
        RcError::Database(err.to_string())
    }
}

/// Convert token codec errors to RcError
impl From<TokenError> for RcError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Malformed(reason) => RcError::MalformedPayload(reason),
            TokenError::ChecksumMismatch => RcError::ChecksumMismatch,
            TokenError::Expired { meeting_id } => {
                RcError::Expired(format!("Token for meeting {meeting_id} has expired"))
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;

    // Helper function to read the response body as JSON
    async fn read_body_json(body: Body) -> serde_json::Value {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_display_malformed_payload() {
        let error = RcError::MalformedPayload("missing type field".to_string());
        assert_eq!(
            format!("{}", error),
            "Malformed payload: missing type field"
        );
    }

    #[test]
    fn test_display_checksum_mismatch() {
        let error = RcError::ChecksumMismatch;
        assert_eq!(format!("{}", error), "Checksum mismatch");
    }

    #[test]
    fn test_display_expired() {
        let error = RcError::Expired("token lapsed".to_string());
        assert_eq!(format!("{}", error), "Token expired: token lapsed");
    }

    #[test]
    fn test_display_session_not_active() {
        let error = RcError::SessionNotActive("meeting is completed".to_string());
        assert_eq!(
            format!("{}", error),
            "Session not active: meeting is completed"
        );
    }

    #[test]
    fn test_display_already_submitted() {
        let error = RcError::AlreadySubmitted("record exists".to_string());
        assert_eq!(format!("{}", error), "Already submitted: record exists");
    }

    #[test]
    fn test_display_database_error() {
        let error = RcError::Database("connection failed".to_string());
        assert_eq!(format!("{}", error), "Database error: connection failed");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            RcError::MalformedPayload("test".to_string()).status_code(),
            400
        );
        assert_eq!(RcError::ChecksumMismatch.status_code(), 400);
        assert_eq!(RcError::Expired("test".to_string()).status_code(), 410);
        assert_eq!(
            RcError::MeetingNotFound("test".to_string()).status_code(),
            404
        );
        assert_eq!(
            RcError::SessionNotActive("test".to_string()).status_code(),
            409
        );
        assert_eq!(RcError::NotEnrolled("test".to_string()).status_code(), 403);
        assert_eq!(
            RcError::AlreadySubmitted("test".to_string()).status_code(),
            409
        );
        assert_eq!(
            RcError::LateEntryNotAllowed("test".to_string()).status_code(),
            403
        );
        assert_eq!(
            RcError::AlreadyCheckedOut("test".to_string()).status_code(),
            409
        );
        assert_eq!(
            RcError::InvalidTransition("test".to_string()).status_code(),
            409
        );
        assert_eq!(RcError::Forbidden("test".to_string()).status_code(), 403);
        assert_eq!(RcError::NotFound("test".to_string()).status_code(), 404);
        assert_eq!(RcError::InvalidActor("test".to_string()).status_code(), 401);
        assert_eq!(RcError::BadRequest("test".to_string()).status_code(), 400);
        assert_eq!(RcError::Database("test".to_string()).status_code(), 500);
        assert_eq!(RcError::Internal.status_code(), 500);
    }

    #[test]
    fn test_kind_strings_are_stable() {
        assert_eq!(
            RcError::MalformedPayload("x".to_string()).kind(),
            "MALFORMED_PAYLOAD"
        );
        assert_eq!(RcError::ChecksumMismatch.kind(), "CHECKSUM_MISMATCH");
        assert_eq!(RcError::Expired("x".to_string()).kind(), "EXPIRED");
        assert_eq!(
            RcError::AlreadySubmitted("x".to_string()).kind(),
            "ALREADY_SUBMITTED"
        );
        assert_eq!(
            RcError::InvalidTransition("x".to_string()).kind(),
            "INVALID_TRANSITION"
        );
    }

    #[tokio::test]
    async fn test_into_response_database_error() {
        let error = RcError::Database("connection failed".to_string());
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"]["code"], "DATABASE_ERROR");
        assert_eq!(
            body_json["error"]["message"],
            "An internal database error occurred"
        );
    }

    #[tokio::test]
    async fn test_into_response_checksum_mismatch() {
        let error = RcError::ChecksumMismatch;
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"]["code"], "CHECKSUM_MISMATCH");
        assert_eq!(body_json["error"]["message"], "Token integrity check failed");
    }

    #[tokio::test]
    async fn test_into_response_expired() {
        let error = RcError::Expired("Token for meeting m1 has expired".to_string());
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::GONE);

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"]["code"], "EXPIRED");
        assert_eq!(
            body_json["error"]["message"],
            "Token for meeting m1 has expired"
        );
    }

    #[tokio::test]
    async fn test_into_response_already_submitted() {
        let error = RcError::AlreadySubmitted("Attendance already recorded".to_string());
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::CONFLICT);

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"]["code"], "ALREADY_SUBMITTED");
        assert_eq!(body_json["error"]["message"], "Attendance already recorded");
    }

    #[tokio::test]
    async fn test_into_response_forbidden() {
        let error = RcError::Forbidden("Access denied".to_string());
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"]["code"], "FORBIDDEN");
        assert_eq!(body_json["error"]["message"], "Access denied");
    }

    #[tokio::test]
    async fn test_into_response_invalid_actor() {
        let error = RcError::InvalidActor("Missing x-actor-id header".to_string());
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"]["code"], "INVALID_ACTOR");
        assert_eq!(body_json["error"]["message"], "Missing x-actor-id header");
    }

    #[tokio::test]
    async fn test_from_token_error() {
        let error: RcError = TokenError::ChecksumMismatch.into();
        assert!(matches!(error, RcError::ChecksumMismatch));

        let error: RcError = TokenError::Malformed("bad json".to_string()).into();
        assert!(matches!(error, RcError::MalformedPayload(_)));

        let error: RcError = TokenError::Expired {
            meeting_id: "abc".to_string(),
        }
        .into();
        assert_eq!(error.status_code(), 410);
    }
}
