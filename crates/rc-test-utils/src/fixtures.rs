//! Deterministic fixtures for Roster Controller tests.
//!
//! Fixed key material and canned request bodies so tests are
//! reproducible across runs and machines.

use chrono::{Duration, Utc};
use rc_service::config::Config;
use rc_service::token::TokenCodec;
use std::collections::HashMap;
use uuid::Uuid;

/// Fixed 32-byte master key, hex-encoded. Never use outside tests.
pub const TEST_MASTER_KEY_HEX: &str =
    "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

/// Decoded test master key bytes.
pub fn test_master_key() -> Vec<u8> {
    hex::decode(TEST_MASTER_KEY_HEX).expect("test master key is valid hex")
}

/// A token codec keyed with the fixed test master key.
///
/// Matches the codec inside a [`TestRcServer`](crate::TestRcServer), so
/// tests can mint their own payloads (expired ones included) that the
/// server will accept as authentically keyed.
pub fn test_codec() -> TokenCodec {
    TokenCodec::new(test_master_key())
}

/// Environment variables for a test configuration.
pub fn test_config_vars() -> HashMap<String, String> {
    HashMap::from([
        (
            "DATABASE_URL".to_string(),
            "postgresql://localhost/rc_test".to_string(),
        ),
        ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
        ("RC_REGION".to_string(), "test-region".to_string()),
        (
            "RC_TOKEN_MASTER_KEY".to_string(),
            TEST_MASTER_KEY_HEX.to_string(),
        ),
        ("RC_ID".to_string(), "rc-test-001".to_string()),
    ])
}

/// A loaded test configuration.
pub fn test_config() -> Config {
    Config::from_vars(&test_config_vars()).expect("test config is valid")
}

/// JSON body for creating a meeting scheduled around the current time.
///
/// The meeting starts five minutes ago and ends in an hour, so it can
/// be started and redeemed against immediately.
pub fn meeting_request_body(title: &str, roster: &[Uuid]) -> serde_json::Value {
    let now = Utc::now();
    serde_json::json!({
        "title": title,
        "start_time": now - Duration::minutes(5),
        "end_time": now + Duration::hours(1),
        "roster": roster,
    })
}
