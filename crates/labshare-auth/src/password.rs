//! PBKDF2-SHA256 password hashing and verification.
//!
//! Hashes are encoded as `pbkdf2_sha256$iterations$salt_hex$digest_hex`,
//! the same format the original deployment's admin records carry, so
//! existing `admins.json` files keep working.

use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::Sha256;
use subtle::ConstantTimeEq;

/// Algorithm tag stored in the encoded hash.
const ALGORITHM: &str = "pbkdf2_sha256";
/// PBKDF2 iteration count for newly hashed passwords.
const ITERATIONS: u32 = 390_000;
/// Salt length in bytes.
const SALT_LEN: usize = 16;
/// SHA-256 digest length in bytes.
const DIGEST_LEN: usize = 32;

/// Handles password hashing and verification using PBKDF2-HMAC-SHA256.
#[derive(Debug, Clone, Default)]
pub struct PasswordHasher;

impl PasswordHasher {
    /// Creates a new password hasher instance.
    pub fn new() -> Self {
        Self
    }

    /// Hashes a plaintext password with a fresh random salt.
    pub fn hash_password(&self, password: &str) -> String {
        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        encode(password, &salt, ITERATIONS)
    }

    /// Verifies a plaintext password against a stored encoded hash.
    ///
    /// Re-derives with the stored salt and iteration count and compares
    /// in constant time. A malformed encoding, an unknown algorithm tag,
    /// or a wrong password all verify as `false`; this never fails.
    pub fn verify_password(&self, password: &str, encoded: &str) -> bool {
        let mut parts = encoded.splitn(4, '$');
        let (Some(algorithm), Some(iterations), Some(salt_hex), Some(digest_hex)) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return false;
        };
        if algorithm != ALGORITHM {
            return false;
        }
        let Ok(iterations) = iterations.parse::<u32>() else {
            return false;
        };
        if iterations == 0 {
            return false;
        }
        let Ok(salt) = hex::decode(salt_hex) else {
            return false;
        };
        let Ok(stored_digest) = hex::decode(digest_hex) else {
            return false;
        };
        if stored_digest.len() != DIGEST_LEN {
            return false;
        }

        let mut derived = [0u8; DIGEST_LEN];
        pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, iterations, &mut derived);
        derived.ct_eq(&stored_digest[..]).into()
    }
}

fn encode(password: &str, salt: &[u8], iterations: u32) -> String {
    let mut digest = [0u8; DIGEST_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut digest);
    format!(
        "{ALGORITHM}${iterations}${}${}",
        hex::encode(salt),
        hex::encode(digest)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    // Derivation in tests uses a low round count to keep them fast.
    fn quick_hash(password: &str) -> String {
        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        encode(password, &salt, 1_000)
    }

    #[test]
    fn verify_accepts_correct_password() {
        let hasher = PasswordHasher::new();
        let encoded = quick_hash("hunter2!");
        assert!(hasher.verify_password("hunter2!", &encoded));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let hasher = PasswordHasher::new();
        let encoded = quick_hash("hunter2!");
        assert!(!hasher.verify_password("hunter3!", &encoded));
    }

    #[test]
    fn verify_rejects_wrong_algorithm_tag() {
        let hasher = PasswordHasher::new();
        let encoded = quick_hash("hunter2!").replacen("pbkdf2_sha256", "argon2id", 1);
        assert!(!hasher.verify_password("hunter2!", &encoded));
    }

    #[test]
    fn verify_rejects_tampered_digest() {
        let hasher = PasswordHasher::new();
        let mut encoded = quick_hash("hunter2!");
        let last = encoded.pop().unwrap();
        encoded.push(if last == '0' { '1' } else { '0' });
        assert!(!hasher.verify_password("hunter2!", &encoded));
    }

    #[test]
    fn malformed_encodings_verify_false_without_panicking() {
        let hasher = PasswordHasher::new();
        for bad in [
            "",
            "pbkdf2_sha256",
            "pbkdf2_sha256$notanumber$aa$bb",
            "pbkdf2_sha256$0$aa$bb",
            "pbkdf2_sha256$1000$zz$bb",
            "pbkdf2_sha256$1000$aabb$zz",
            "pbkdf2_sha256$1000$aabb$aabb",
            "$$$",
        ] {
            assert!(!hasher.verify_password("whatever", bad), "accepted: {bad}");
        }
    }

    #[test]
    fn hash_uses_production_iteration_count() {
        let hasher = PasswordHasher::new();
        let encoded = hasher.hash_password("pw");
        assert!(encoded.starts_with("pbkdf2_sha256$390000$"));
        assert!(hasher.verify_password("pw", &encoded));
    }
}
