//! HTTP request handlers for the Roster Controller.

pub mod health;
pub mod meetings;
pub mod metrics;
pub mod records;
pub mod redemptions;

pub use health::health_check;
pub use meetings::{
    cancel_meeting, create_meeting, end_meeting, get_attendance, get_meeting, get_redemption_log,
    postpone_meeting, start_meeting,
};
pub use metrics::metrics_handler;
pub use records::{
    approve_record, bulk_approve, checkout_record, modify_record, reject_record, remove_record,
};
pub use redemptions::redeem_token;

use crate::errors::RcError;
use axum::body::Bytes;
use serde::de::DeserializeOwned;

/// Deserialize a request body manually so malformed JSON yields 400
/// rather than Axum's default 422.
pub(crate) fn parse_json<T: DeserializeOwned>(body: &Bytes) -> Result<T, RcError> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::debug!(target: "rc.handlers", error = %e, "Invalid request body");
        RcError::BadRequest("Invalid request body".to_string())
    })
}

/// Like [`parse_json`], but an empty body produces the default value.
/// Used by endpoints whose bodies are entirely optional.
pub(crate) fn parse_json_or_default<T: DeserializeOwned + Default>(
    body: &Bytes,
) -> Result<T, RcError> {
    if body.is_empty() {
        return Ok(T::default());
    }
    parse_json(body)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::models::StartMeetingRequest;

    #[test]
    fn test_parse_json_rejects_malformed_body() {
        let result: Result<StartMeetingRequest, _> = parse_json(&Bytes::from_static(b"{not json"));
        assert!(matches!(result, Err(RcError::BadRequest(_))));
    }

    #[test]
    fn test_parse_json_rejects_unknown_fields() {
        let result: Result<StartMeetingRequest, _> =
            parse_json(&Bytes::from_static(b"{\"bogus\":1}"));
        assert!(matches!(result, Err(RcError::BadRequest(_))));
    }

    #[test]
    fn test_parse_json_or_default_accepts_empty_body() {
        let request: StartMeetingRequest = parse_json_or_default(&Bytes::new()).unwrap();
        assert!(request.ttl_minutes.is_none());
    }

    #[test]
    fn test_parse_json_or_default_parses_present_body() {
        let request: StartMeetingRequest =
            parse_json_or_default(&Bytes::from_static(b"{\"ttl_minutes\":5}")).unwrap();
        assert_eq!(request.ttl_minutes, Some(5));
    }
}
