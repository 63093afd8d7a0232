//! Random record identifiers.

use rand::RngCore;
use rand::rngs::OsRng;

/// Generate a random 16-hex-character record id (8 random bytes).
///
/// Used for admins, uploaders, batches, and files. Session tokens need
/// more entropy and are generated separately.
pub fn new_record_id() -> String {
    let mut bytes = [0u8; 8];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_sixteen_hex_chars() {
        let id = new_record_id();
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn ids_are_unique_enough() {
        let a = new_record_id();
        let b = new_record_id();
        assert_ne!(a, b);
    }
}
