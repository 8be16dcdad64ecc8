//! Salted PIN credential
//!
//! The stored digest is `SHA-256(salt || "::" || pin)`, hex encoded, with a
//! fresh 16-byte salt from the OS RNG on every setup. The plaintext PIN is
//! never stored.

use std::fmt;

use chrono::{DateTime, Utc};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

/// Salt length in bytes (before hex encoding)
pub const SALT_LEN: usize = 16;

const HASH_SEPARATOR: &[u8] = b"::";

/// Credential record held by the external credential store
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCredential {
    /// Secondary label checked on unlock; not a secret
    pub username: String,
    /// Hex-encoded random salt
    pub salt: String,
    /// Hex-encoded salted SHA-256 digest
    pub salted_hash: String,
    pub last_changed_at: DateTime<Utc>,
}

impl StoredCredential {
    /// Build a new credential with a freshly generated salt
    pub fn create(
        username: &str,
        pin: &str,
        now: DateTime<Utc>,
    ) -> Result<Self, rand::Error> {
        let salt = generate_salt()?;
        let salted_hash = hash_pin(&salt, pin);
        Ok(Self {
            username: username.to_string(),
            salt,
            salted_hash,
            last_changed_at: now,
        })
    }

    /// Check a username/PIN pair against this record
    ///
    /// Both checks always run so the result does not reveal which one failed.
    pub fn matches(&self, username: &str, pin: &str) -> bool {
        let candidate = hash_pin(&self.salt, pin);
        let username_ok = self.username.as_bytes().ct_eq(username.as_bytes());
        let hash_ok = self.salted_hash.as_bytes().ct_eq(candidate.as_bytes());
        (username_ok & hash_ok).into()
    }
}

impl fmt::Debug for StoredCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredCredential")
            .field("username", &self.username)
            .field("salt", &"<redacted>")
            .field("salted_hash", &"<redacted>")
            .field("last_changed_at", &self.last_changed_at)
            .finish()
    }
}

/// Generate a hex-encoded salt of [`SALT_LEN`] random bytes
pub fn generate_salt() -> Result<String, rand::Error> {
    let mut bytes = [0u8; SALT_LEN];
    OsRng.try_fill_bytes(&mut bytes)?;
    Ok(hex::encode(bytes))
}

/// Hex-encoded `SHA-256(salt || "::" || pin)`
pub fn hash_pin(salt: &str, pin: &str) -> String {
    let mut input = Zeroizing::new(Vec::with_capacity(
        salt.len() + HASH_SEPARATOR.len() + pin.len(),
    ));
    input.extend_from_slice(salt.as_bytes());
    input.extend_from_slice(HASH_SEPARATOR);
    input.extend_from_slice(pin.as_bytes());

    hex::encode(Sha256::digest(input.as_slice()))
}
