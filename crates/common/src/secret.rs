//! Secret types for protecting sensitive values from accidental logging.
//!
//! This module re-exports types from the [`secrecy`] crate with Muster-specific
//! guidance. Use these types for all sensitive values like keys, tokens,
//! and cryptographic material.
//!
//! # Compile-Time Safety
//!
//! The key insight is that `SecretBox<T>` and `SecretString` implement `Debug`
//! with redaction, so any code that derives `Debug` on a struct containing secrets
//! will automatically get safe logging behavior. This makes it **impossible** to
//! accidentally log secrets via `{:?}` or tracing.
//!
//! # Memory Safety
//!
//! Secrets are automatically zeroized when dropped, preventing sensitive
//! data from lingering in memory after use.
//!
//! # Example
//!
//! ```rust
//! use common::secret::SecretString;
//! use secrecy::ExposeSecret;
//!
//! #[derive(Debug)]
//! struct ServiceConfig {
//!     instance_id: String,
//!     token_master_key: SecretString,  // Safe: Debug shows "[REDACTED]"
//! }
//!
//! let config = ServiceConfig {
//!     instance_id: "rc-host-1".to_string(),
//!     token_master_key: SecretString::from("deadbeef"),
//! };
//!
//! // This is safe - the key is redacted
//! println!("{:?}", config);
//!
//! // To access the actual value, you must explicitly call expose_secret()
//! let key: &str = config.token_master_key.expose_secret();
//! ```
//!
//! # Muster Usage Guidelines
//!
//! Use `SecretString` for:
//! - Token master keys (as hex strings)
//! - Database credentials embedded in URLs
//! - Any forwarded credential material
//!
//! Use `SecretBox<T>` for:
//! - Custom secret types (e.g., `SecretBox<[u8]>` for binary keys)
//!
//! # Serde Integration
//!
//! With the `serde` feature enabled, secrets can be deserialized from JSON:
//!
//! ```rust
//! use serde::Deserialize;
//! use common::secret::SecretString;
//!
//! #[derive(Debug, Deserialize)]
//! struct SigningKeys {
//!     key_id: String,
//!     master_key: SecretString,
//! }
//!
//! let json = r#"{"key_id": "primary", "master_key": "secret-key"}"#;
//! let keys: SigningKeys = serde_json::from_str(json).unwrap();
//!
//! // Debug output is safe
//! println!("{:?}", keys);
//! // key_id is visible, master_key is redacted
//! ```

// Re-export the main types from secrecy
pub use secrecy::{ExposeSecret, SecretBox, SecretString};

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn test_debug_is_redacted() {
        let secret = SecretString::from("hunter2");
        let debug_str = format!("{secret:?}");

        assert!(debug_str.contains("REDACTED"));
        assert!(!debug_str.contains("hunter2"));
    }

    #[test]
    fn test_expose_secret_returns_inner_value() {
        let secret = SecretString::from("master-key-hex");
        assert_eq!(secret.expose_secret(), "master-key-hex");
    }

    #[test]
    fn test_struct_with_secret_is_safe() {
        #[allow(dead_code)]
        #[derive(Debug)]
        struct KeyMaterial {
            key_id: String,
            key: SecretString,
        }

        let material = KeyMaterial {
            key_id: "primary".to_string(),
            key: SecretString::from("super-secret"),
        };

        let debug_str = format!("{material:?}");

        // Key ID should be visible
        assert!(debug_str.contains("primary"));
        // Key should be redacted
        assert!(debug_str.contains("REDACTED"));
        assert!(!debug_str.contains("super-secret"));
    }

    #[test]
    fn test_deserialize() {
        #[allow(dead_code)]
        #[derive(Debug, Deserialize)]
        struct SigningKeys {
            key_id: String,
            master_key: SecretString,
        }

        let json = r#"{"key_id": "primary", "master_key": "my-secret-value"}"#;
        let keys: SigningKeys = serde_json::from_str(json).expect("deserialize");

        // Verify we can access the secret
        assert_eq!(keys.master_key.expose_secret(), "my-secret-value");

        // Verify debug doesn't expose the value
        let debug = format!("{keys:?}");
        assert!(!debug.contains("my-secret-value"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_clone_works() {
        let secret = SecretString::from("cloneable");
        let cloned = secret.clone();
        assert_eq!(cloned.expose_secret(), "cloneable");
    }
}
