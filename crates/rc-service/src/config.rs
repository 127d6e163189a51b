//! Roster Controller configuration.
//!
//! Configuration is loaded from environment variables. All sensitive
//! fields are redacted in Debug output.

use common::secret::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::env;
use std::fmt;
use thiserror::Error;

/// Default token time-to-live in minutes.
pub const DEFAULT_TOKEN_TTL_MINUTES: i64 = 30;

/// Maximum token time-to-live in minutes (24 hours).
pub const MAX_TOKEN_TTL_MINUTES: i64 = 1440;

/// Minimum token master key length in bytes (decoded from hex).
pub const MIN_TOKEN_MASTER_KEY_BYTES: usize = 32;

/// Default RC instance ID prefix.
pub const DEFAULT_RC_ID_PREFIX: &str = "rc";

/// Roster Controller configuration.
///
/// Loaded from environment variables with sensible defaults.
/// Database URL and token master key are redacted in Debug output to
/// prevent credential leakage.
#[derive(Clone)]
pub struct Config {
    /// PostgreSQL connection URL.
    pub database_url: String,

    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Deployment region identifier (e.g., "us-east-1").
    pub region: String,

    /// Master key for deriving per-meeting token checksum keys (hex-encoded,
    /// at least 32 bytes).
    pub token_master_key: SecretString,

    /// Token time-to-live in minutes for issued attendance tokens.
    pub token_ttl_minutes: i64,

    /// Unique identifier for this RC instance.
    /// Used for audit stamping and debugging.
    pub rc_id: String,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &"[REDACTED]")
            .field("bind_address", &self.bind_address)
            .field("region", &self.region)
            .field("token_master_key", &"[REDACTED]")
            .field("token_ttl_minutes", &self.token_ttl_minutes)
            .field("rc_id", &self.rc_id)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid token master key configuration: {0}")]
    InvalidTokenMasterKey(String),

    #[error("Invalid token TTL configuration: {0}")]
    InvalidTokenTtl(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let database_url = vars
            .get("DATABASE_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))?
            .clone();

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| "0.0.0.0:8080".to_string());

        let region = vars
            .get("RC_REGION")
            .cloned()
            .unwrap_or_else(|| "us-east-1".to_string());

        // Parse and validate the token master key. The key is hex-encoded
        // and must decode to at least 32 bytes of material.
        let master_key_hex = vars
            .get("RC_TOKEN_MASTER_KEY")
            .ok_or_else(|| ConfigError::MissingEnvVar("RC_TOKEN_MASTER_KEY".to_string()))?;

        let decoded = hex::decode(master_key_hex).map_err(|e| {
            ConfigError::InvalidTokenMasterKey(format!(
                "RC_TOKEN_MASTER_KEY must be valid hex: {}",
                e
            ))
        })?;

        if decoded.len() < MIN_TOKEN_MASTER_KEY_BYTES {
            return Err(ConfigError::InvalidTokenMasterKey(format!(
                "RC_TOKEN_MASTER_KEY must decode to at least {} bytes, got {}",
                MIN_TOKEN_MASTER_KEY_BYTES,
                decoded.len()
            )));
        }

        let token_master_key = SecretString::from(master_key_hex.clone());

        // Parse token TTL with validation
        let token_ttl_minutes = if let Some(value_str) = vars.get("RC_TOKEN_TTL_MINUTES") {
            let value: i64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidTokenTtl(format!(
                    "RC_TOKEN_TTL_MINUTES must be a valid integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value <= 0 {
                return Err(ConfigError::InvalidTokenTtl(format!(
                    "RC_TOKEN_TTL_MINUTES must be positive, got {}",
                    value
                )));
            }

            if value > MAX_TOKEN_TTL_MINUTES {
                return Err(ConfigError::InvalidTokenTtl(format!(
                    "RC_TOKEN_TTL_MINUTES must not exceed {}, got {}",
                    MAX_TOKEN_TTL_MINUTES, value
                )));
            }

            value
        } else {
            DEFAULT_TOKEN_TTL_MINUTES
        };

        // Generate RC instance ID
        let rc_id = vars.get("RC_ID").cloned().unwrap_or_else(|| {
            // Generate a unique ID based on hostname and UUID suffix
            let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string());
            // Use first 8 chars of UUID for uniqueness
            let uuid_suffix = uuid::Uuid::new_v4().to_string();
            let short_suffix = uuid_suffix.get(..8).unwrap_or("00000000");
            format!("{}-{}-{}", DEFAULT_RC_ID_PREFIX, hostname, short_suffix)
        });

        Ok(Config {
            database_url,
            bind_address,
            region,
            token_master_key,
            token_ttl_minutes,
            rc_id,
        })
    }

    /// Returns the decoded master key bytes.
    ///
    /// The hex encoding was validated at load time, so this only fails if
    /// the config was constructed without `from_vars` validation.
    pub fn master_key_bytes(&self) -> Result<Vec<u8>, ConfigError> {
        hex::decode(self.token_master_key.expose_secret()).map_err(|e| {
            ConfigError::InvalidTokenMasterKey(format!("RC_TOKEN_MASTER_KEY must be valid hex: {}", e))
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    // 32 bytes of key material, hex-encoded
    const TEST_MASTER_KEY: &str =
        "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    fn base_vars() -> HashMap<String, String> {
        HashMap::from([
            (
                "DATABASE_URL".to_string(),
                "postgresql://localhost/rc_test".to_string(),
            ),
            ("RC_TOKEN_MASTER_KEY".to_string(), TEST_MASTER_KEY.to_string()),
        ])
    }

    #[test]
    fn test_from_vars_success_with_defaults() {
        let vars = base_vars();

        let config = Config::from_vars(&vars).expect("Config should load successfully");

        assert_eq!(config.database_url, "postgresql://localhost/rc_test");
        assert_eq!(config.bind_address, "0.0.0.0:8080");
        assert_eq!(config.region, "us-east-1");
        assert_eq!(config.token_master_key.expose_secret(), TEST_MASTER_KEY);
        assert_eq!(config.token_ttl_minutes, DEFAULT_TOKEN_TTL_MINUTES);
        // RC ID should be auto-generated
        assert!(config.rc_id.starts_with("rc-"));
    }

    #[test]
    fn test_from_vars_success_with_custom_values() {
        let mut vars = base_vars();
        vars.insert("BIND_ADDRESS".to_string(), "127.0.0.1:9000".to_string());
        vars.insert("RC_REGION".to_string(), "eu-west-1".to_string());
        vars.insert("RC_TOKEN_TTL_MINUTES".to_string(), "90".to_string());

        let config = Config::from_vars(&vars).expect("Config should load successfully");

        assert_eq!(config.bind_address, "127.0.0.1:9000");
        assert_eq!(config.region, "eu-west-1");
        assert_eq!(config.token_ttl_minutes, 90);
    }

    #[test]
    fn test_rc_id_custom_value() {
        let mut vars = base_vars();
        vars.insert("RC_ID".to_string(), "rc-custom-001".to_string());

        let config = Config::from_vars(&vars).expect("Config should load successfully");
        assert_eq!(config.rc_id, "rc-custom-001");
    }

    #[test]
    fn test_from_vars_missing_database_url() {
        let mut vars = base_vars();
        vars.remove("DATABASE_URL");

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(v)) if v == "DATABASE_URL"));
    }

    #[test]
    fn test_from_vars_missing_master_key() {
        let mut vars = base_vars();
        vars.remove("RC_TOKEN_MASTER_KEY");

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::MissingEnvVar(v)) if v == "RC_TOKEN_MASTER_KEY")
        );
    }

    #[test]
    fn test_master_key_rejects_non_hex() {
        let mut vars = base_vars();
        vars.insert(
            "RC_TOKEN_MASTER_KEY".to_string(),
            "not-hex-material".to_string(),
        );

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidTokenMasterKey(msg)) if msg.contains("must be valid hex"))
        );
    }

    #[test]
    fn test_master_key_rejects_short_key() {
        let mut vars = base_vars();
        // 16 bytes, below the 32-byte minimum
        vars.insert(
            "RC_TOKEN_MASTER_KEY".to_string(),
            "000102030405060708090a0b0c0d0e0f".to_string(),
        );

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidTokenMasterKey(msg)) if msg.contains("at least 32 bytes"))
        );
    }

    #[test]
    fn test_token_ttl_rejects_zero() {
        let mut vars = base_vars();
        vars.insert("RC_TOKEN_TTL_MINUTES".to_string(), "0".to_string());

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidTokenTtl(msg)) if msg.contains("must be positive"))
        );
    }

    #[test]
    fn test_token_ttl_rejects_negative() {
        let mut vars = base_vars();
        vars.insert("RC_TOKEN_TTL_MINUTES".to_string(), "-30".to_string());

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidTokenTtl(msg)) if msg.contains("must be positive"))
        );
    }

    #[test]
    fn test_token_ttl_rejects_too_large() {
        let mut vars = base_vars();
        vars.insert("RC_TOKEN_TTL_MINUTES".to_string(), "1441".to_string());

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidTokenTtl(msg)) if msg.contains("must not exceed 1440"))
        );
    }

    #[test]
    fn test_token_ttl_accepts_max() {
        let mut vars = base_vars();
        vars.insert("RC_TOKEN_TTL_MINUTES".to_string(), "1440".to_string());

        let config = Config::from_vars(&vars).expect("Config should load successfully");
        assert_eq!(config.token_ttl_minutes, 1440);
    }

    #[test]
    fn test_token_ttl_rejects_non_numeric() {
        let mut vars = base_vars();
        vars.insert("RC_TOKEN_TTL_MINUTES".to_string(), "half-hour".to_string());

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidTokenTtl(msg)) if msg.contains("must be a valid integer"))
        );
    }

    #[test]
    fn test_master_key_bytes_round_trip() {
        let vars = base_vars();
        let config = Config::from_vars(&vars).expect("Config should load successfully");

        let bytes = config.master_key_bytes().expect("key decodes");
        assert_eq!(bytes.len(), 32);
        assert_eq!(bytes.first(), Some(&0x00));
        assert_eq!(bytes.last(), Some(&0x1f));
    }

    #[test]
    fn test_debug_redacts_sensitive_fields() {
        let vars = base_vars();
        let config = Config::from_vars(&vars).expect("Config should load successfully");

        let debug_output = format!("{:?}", config);

        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("postgresql://"));
        assert!(!debug_output.contains(TEST_MASTER_KEY));
    }
}
