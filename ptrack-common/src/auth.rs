//! Password hashing and session token generation
//!
//! Passwords are stored as a random per-user salt plus a PBKDF2-HMAC-SHA256
//! derived key, both hex encoded. Session tokens are random v4 UUIDs in
//! simple (undashed) form.

use rand::Rng;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use uuid::Uuid;

/// PBKDF2 iterations applied when stretching a password
const PBKDF2_ROUNDS: u32 = 100_000;

/// Minimum accepted password length
pub const MIN_PASSWORD_LEN: usize = 8;

/// Generate a fresh 16-byte salt as 32 hex characters
pub fn generate_salt() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 16] = rng.gen();
    hex::encode(bytes)
}

/// Hash `password` with `salt`
///
/// ```
/// use ptrack_common::auth::hash_password;
///
/// let hash = hash_password("correct horse", "00112233445566778899aabbccddeeff");
/// assert_eq!(hash.len(), 64); // SHA-256 is 64 hex chars
/// ```
pub fn hash_password(password: &str, salt: &str) -> String {
    derive_key(password, salt, PBKDF2_ROUNDS)
}

fn derive_key(password: &str, salt: &str, rounds: u32) -> String {
    let key = pbkdf2::pbkdf2_hmac_array::<Sha256, 32>(password.as_bytes(), salt.as_bytes(), rounds);
    hex::encode(key)
}

/// Check a password against a stored hash and salt
///
/// Accounts with an empty stored hash cannot log in.
pub fn verify_password(password: &str, salt: &str, stored_hash: &str) -> bool {
    if stored_hash.is_empty() {
        return false;
    }
    let computed = hash_password(password, salt);
    computed.as_bytes().ct_eq(stored_hash.as_bytes()).into()
}

/// New opaque session token
pub fn generate_session_token() -> String {
    Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_deterministic_per_salt() {
        let a = hash_password("secret-pass", "salt-one");
        let b = hash_password("secret-pass", "salt-one");
        let c = hash_password("secret-pass", "salt-two");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_hash_matches_pbkdf2_sha256() {
        // RFC 7914 section 11, c = 1, first 32 bytes
        assert_eq!(
            derive_key("passwd", "salt", 1),
            "55ac046e56e3089fec1691c22544b605f94185216dde0465e68b9d57c20dacbc"
        );
        assert_eq!(hash_password("passwd", "salt"), derive_key("passwd", "salt", PBKDF2_ROUNDS));
        assert_ne!(hash_password("passwd", "salt"), derive_key("passwd", "salt", 1));
    }

    #[test]
    fn test_verify_password() {
        let salt = generate_salt();
        let hash = hash_password("hunter22", &salt);
        assert!(verify_password("hunter22", &salt, &hash));
        assert!(!verify_password("hunter23", &salt, &hash));
        assert!(!verify_password("", &salt, ""));
    }

    #[test]
    fn test_salts_and_tokens_are_random() {
        let salt = generate_salt();
        assert_eq!(salt.len(), 32);
        assert_ne!(salt, generate_salt());

        let token = generate_session_token();
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, generate_session_token());
    }
}
