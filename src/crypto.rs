//! Token codec: opaque bearer tokens and their one-way storage keys.
//!
//! A session token is the only secret in the system. The stores never see
//! it: every lookup key is the SHA-256 digest of the token, so a compromised
//! store (or a leaked backup) yields nothing a client could present.

use data_encoding::BASE32_NOPAD;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;

/// Entropy drawn for each session token, in bytes.
///
/// 160 bits keeps the collision probability negligible at any realistic
/// session count (birthday bound) while the base32 encoding stays at a
/// compact 32 characters.
pub const TOKEN_ENTROPY_BYTES: usize = 20;

/// A wrapper for sensitive string data that prevents accidental logging.
///
/// `SecretString` implements `Debug` and `Display` to show `[REDACTED]`
/// instead of the actual content. The plaintext session token lives in one
/// of these from generation until it is written into the client cookie.
///
/// # Example
///
/// ```rust
/// use gatehouse::SecretString;
///
/// let token = SecretString::new("kxt2...");
/// assert_eq!(format!("{:?}", token), "SecretString([REDACTED])");
/// assert_eq!(token.expose_secret(), "kxt2...");
/// ```
#[derive(Clone)]
pub struct SecretString(String);

impl SecretString {
    /// Creates a new `SecretString` from any type that can be converted to a `String`.
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Exposes the secret value.
    ///
    /// Use this method only when you need the actual token, such as when
    /// setting the client cookie or deriving the session id.
    #[must_use]
    pub fn expose_secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretString([REDACTED])")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl PartialEq for SecretString {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for SecretString {}

impl Serialize for SecretString {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        // Expose the actual value for serialization (e.g., handing the token
        // to the cookie layer)
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for SecretString {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(SecretString(s))
    }
}

/// Generates a new session token from the OS random source.
///
/// The token is 20 random bytes encoded as lowercase base32 without padding:
/// 32 characters over `a-z2-7`, URL- and cookie-safe, case-insensitive.
pub fn generate_token() -> SecretString {
    use rand::RngCore;

    let mut bytes = [0u8; TOKEN_ENTROPY_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    SecretString::new(BASE32_NOPAD.encode(&bytes).to_ascii_lowercase())
}

/// Derives the storage key for a token.
///
/// SHA-256 over the token's UTF-8 bytes, hex-encoded lowercase. Tokens are
/// high-entropy random strings, so a fast unsalted hash is appropriate; the
/// mapping is deterministic so the same token always resolves to the same
/// session row and cache entry.
pub fn derive_session_id(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_token_length_and_alphabet() {
        let token = generate_token();
        let token = token.expose_secret();
        // 20 bytes -> exactly 32 base32 characters, no padding
        assert_eq!(token.len(), 32);
        assert!(token
            .chars()
            .all(|c| c.is_ascii_lowercase() || ('2'..='7').contains(&c)));
    }

    #[test]
    fn test_generate_token_unique() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a.expose_secret(), b.expose_secret());
    }

    #[test]
    fn test_derive_session_id_deterministic() {
        let id1 = derive_session_id("abc123");
        let id2 = derive_session_id("abc123");
        assert_eq!(id1, id2);
        // known SHA-256 digest of "abc123"
        assert_eq!(
            id1,
            "6ca13d52ca70c883e0f0bb101e425a89e8624de51db2d2392593af6a84118090"
        );
    }

    #[test]
    fn test_derive_session_id_shape() {
        let id = derive_session_id("anytoken");
        assert_eq!(id.len(), 64);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_derive_session_id_distinct_inputs() {
        assert_ne!(derive_session_id("token1"), derive_session_id("token2"));
    }

    #[test]
    fn test_secret_string_redacts_debug_and_display() {
        let secret = SecretString::new("supersecret");
        assert_eq!(format!("{secret:?}"), "SecretString([REDACTED])");
        assert_eq!(format!("{secret}"), "[REDACTED]");
        assert_eq!(secret.expose_secret(), "supersecret");
    }

    #[test]
    fn test_secret_string_from_conversions() {
        let from_str: SecretString = "tok".into();
        let from_string: SecretString = String::from("tok").into();
        assert_eq!(from_str, from_string);
    }
}
